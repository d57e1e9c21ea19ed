use std::path::Path;

use hostalloc_core::EngineConfig;

pub fn run(path: &str) -> anyhow::Result<()> {
    let output = Path::new(path).join("engine.toml");
    if output.exists() {
        anyhow::bail!("{} already exists", output.display());
    }

    std::fs::write(&output, EngineConfig::recommended().to_toml_string()?)?;
    println!("✓ Generated {}", output.display());
    Ok(())
}
