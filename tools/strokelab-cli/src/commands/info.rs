//! Show a written analysis bundle.

use std::path::PathBuf;

use strokelab_model::artifacts::AnalysisBundle;
use strokelab_model::evaluation::{Category, Rating};

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let manifest = AnalysisBundle::load_manifest(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load manifest: {e}"))?;
    let evaluation = AnalysisBundle::load_evaluation(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load evaluation: {e}"))?;

    println!("Bundle: {}", path.display());
    println!("  Generator: {}", manifest.generator);
    println!("  Generated: {}", manifest.generated_at);
    println!("  Input: {}", manifest.input_fingerprint);
    println!("  Config: {}", manifest.config_fingerprint);
    println!(
        "  Frames: {} ({})",
        manifest.frames_processed,
        if manifest.complete { "complete" } else { "partial" }
    );
    println!();

    super::analyze::print_evaluation(&evaluation);

    let unscored = Category::ALL
        .iter()
        .filter(|c| evaluation.rating(**c) == Rating::Unscored)
        .count();
    if unscored > 0 {
        println!("\n{unscored} category(ies) lacked data to score.");
    }

    Ok(())
}
