//! Print the default analysis config.

use std::path::PathBuf;

use strokelab_analysis::AnalysisConfig;

pub fn run(output: Option<PathBuf>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&AnalysisConfig::default())?;
    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", path.display()))?;
            println!("Default analysis config written to: {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
