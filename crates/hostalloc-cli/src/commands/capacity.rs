use std::collections::BTreeMap;
use std::fmt::Write;

use hostalloc_core::ServerUuid;
use hostalloc_engine::{Allocator, Capacity};

use super::Inputs;

pub fn run(inputs: &Inputs, format: &str) -> anyhow::Result<()> {
    println!("{}", render(inputs, format)?);
    Ok(())
}

pub fn render(inputs: &Inputs, format: &str) -> anyhow::Result<String> {
    let (config, servers, constraints) = inputs.load()?;
    let allocator = Allocator::from_config(&config)?;
    let capacity = allocator.capacity(servers, &constraints)?;

    match format {
        "json" => Ok(serde_json::to_string_pretty(&capacity)?),
        _ => Ok(format_capacity(&capacity)),
    }
}

pub fn format_capacity(capacity: &BTreeMap<ServerUuid, Capacity>) -> String {
    let width = capacity.keys().map(String::len).max().unwrap_or(6).max(6);
    let mut out = format!("{:<width$}  {:>8}  {:>10}  {:>10}\n", "SERVER", "CPU %", "RAM MiB", "DISK MiB");
    for (uuid, c) in capacity {
        let _ = writeln!(
            out,
            "{uuid:<width$}  {:>8}  {:>10}  {:>10}",
            c.cpu, c.ram_mib, c.disk_mib
        );
    }
    out.trim_end().to_string()
}
