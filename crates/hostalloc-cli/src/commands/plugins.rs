use std::fmt::Write;

use hostalloc_engine::Registry;

use super::load_config;

pub fn run(config: Option<&str>) -> anyhow::Result<()> {
    println!("{}", render(config)?);
    Ok(())
}

/// Every built-in plugin, or just the configured chain when a config is given.
pub fn render(config: Option<&str>) -> anyhow::Result<String> {
    let engine = load_config(config)?;
    let registry = Registry::builtin(&engine.tuning);

    let listing: Vec<(&str, &str)> = match config {
        Some(_) => registry
            .resolve(&engine.chain())?
            .iter()
            .map(|p| (p.name(), p.description()))
            .collect(),
        None => registry.describe(),
    };

    let width = listing.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    let mut out = String::new();
    for (name, description) in listing {
        let _ = writeln!(out, "{name:<width$}  {description}");
    }
    Ok(out.trim_end().to_string())
}
