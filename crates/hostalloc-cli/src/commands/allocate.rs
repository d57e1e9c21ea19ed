use std::fmt::Write;

use hostalloc_engine::{Allocation, Allocator};

use super::Inputs;

pub fn run(inputs: &Inputs, format: &str) -> anyhow::Result<()> {
    println!("{}", render(inputs, format)?);
    Ok(())
}

pub fn render(inputs: &Inputs, format: &str) -> anyhow::Result<String> {
    let (config, servers, constraints) = inputs.load()?;
    let allocator = Allocator::from_config(&config)?;
    let allocation = allocator.allocate(servers, &constraints)?;

    match format {
        "json" => Ok(serde_json::to_string_pretty(&allocation)?),
        _ => Ok(format_allocation(&allocation)),
    }
}

pub fn format_allocation(allocation: &Allocation) -> String {
    let mut out = String::new();

    match &allocation.server {
        Some(server) if server.hostname.is_empty() => {
            let _ = writeln!(out, "✓ Chose {}", server.uuid);
        }
        Some(server) => {
            let _ = writeln!(out, "✓ Chose {} ({})", server.uuid, server.hostname);
        }
        None => {
            let _ = writeln!(out, "✗ No server satisfies the request");
        }
    }

    let _ = writeln!(out, "\nSteps:");
    let width = allocation.steps.iter().map(|s| s.plugin.len()).max().unwrap_or(0);
    for step in &allocation.steps {
        let _ = writeln!(out, "  {:<width$}  {}", step.plugin, step.remaining);
    }

    if let Some(reasons) = allocation.reasons.as_ref().filter(|r| !r.is_empty()) {
        let _ = writeln!(out, "\nExcluded ({}):", reasons.len());
        for (uuid, reason) in reasons {
            let _ = writeln!(out, "  {uuid}  {reason}");
        }
    }

    out.trim_end().to_string()
}
