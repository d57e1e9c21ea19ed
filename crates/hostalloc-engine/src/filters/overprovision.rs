//! Overprovision ratio match.
//!
//! Workloads sold with the same oversubscription guarantees must share
//! servers configured with the same ratios. Ratios are compared as whole
//! hundredths, never as raw floats.

use hostalloc_core::{Constraints, OverprovisionRatios as Ratios, Server};

use crate::error::EngineResult;
use crate::plugin::{Plugin, Step, retain_with_reasons};
use crate::state::PluginState;

pub struct OverprovisionRatios;

/// A ratio in hundredths; absent means 1.00.
fn hundredths(ratio: Option<f64>) -> i64 {
    (ratio.unwrap_or(1.0) * 100.0).round() as i64
}

fn display(hundredths: i64) -> String {
    format!("{}.{:02}", hundredths / 100, hundredths % 100)
}

fn mismatch(server: &Ratios, wanted: &Ratios) -> Option<String> {
    let classes = [
        ("cpu", server.cpu, wanted.cpu),
        ("ram", server.ram, wanted.ram),
        ("disk", server.disk, wanted.disk),
    ];
    classes.into_iter().find_map(|(class, have, want)| {
        let (have, want) = (hundredths(have), hundredths(want));
        (have != want).then(|| {
            format!(
                "Server's {class} overprovision ratio {} does not match requested {}",
                display(have),
                display(want)
            )
        })
    })
}

impl Plugin for OverprovisionRatios {
    fn name(&self) -> &'static str {
        "hard-filter-overprovision-ratios"
    }

    fn description(&self) -> &'static str {
        "Remove servers whose overprovision ratios differ from the request's"
    }

    fn run(
        &self,
        _state: &mut PluginState,
        servers: Vec<Server>,
        constraints: &Constraints,
    ) -> EngineResult<Step> {
        let wanted = constraints.vm.overprovision_ratios;
        Ok(retain_with_reasons(servers, |server| {
            mismatch(&server.overprovision_ratios, &wanted)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostalloc_core::VmRequest;

    fn server(id: &str, cpu: Option<f64>, ram: Option<f64>) -> Server {
        let mut s = Server::new(id, 4, 1 << 30);
        s.overprovision_ratios.cpu = cpu;
        s.overprovision_ratios.ram = ram;
        s
    }

    fn run(servers: Vec<Server>, cpu: Option<f64>, ram: Option<f64>) -> Step {
        let mut c = Constraints::new(VmRequest::new("vm", "owner", 128));
        c.vm.overprovision_ratios.cpu = cpu;
        c.vm.overprovision_ratios.ram = ram;
        OverprovisionRatios
            .run(&mut PluginState::default(), servers, &c)
            .unwrap()
    }

    #[test]
    fn matching_ratios_survive() {
        let step = run(
            vec![server("a", Some(4.0), Some(1.0)), server("b", Some(2.0), None)],
            Some(4.0),
            None,
        );
        assert_eq!(step.servers.len(), 1);
        assert_eq!(step.servers[0].uuid, "a");
        assert_eq!(
            step.reasons["b"],
            "Server's cpu overprovision ratio 2.00 does not match requested 4.00"
        );
    }

    #[test]
    fn absent_ratio_means_one() {
        let step = run(vec![server("a", None, Some(1.0)), server("b", Some(1.0), None)], None, None);
        assert_eq!(step.servers.len(), 2);
    }

    #[test]
    fn ratios_compare_after_rounding() {
        // 0.1 + 0.2 != 0.3 as floats, but both are 0.30.
        let step = run(vec![server("a", Some(0.1 + 0.2), None)], Some(0.3), None);
        assert_eq!(step.servers.len(), 1);

        let step = run(vec![server("a", Some(1.504), None)], Some(1.5), None);
        assert_eq!(step.servers.len(), 1);

        let step = run(vec![server("a", Some(1.51), None)], Some(1.5), None);
        assert!(step.servers.is_empty());
    }
}
