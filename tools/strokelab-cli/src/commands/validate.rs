//! Validate a pose stream before analysis.

use std::path::PathBuf;

use strokelab_analysis::source::FrameOrderValidator;
use strokelab_common::timing::FrameRateEstimate;
use strokelab_model::frame::{parse_frames, parse_header};

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating frames at: {}", path.display());

    let content = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
    let frames =
        parse_frames(&content).map_err(|e| anyhow::anyhow!("Failed to parse frames: {e}"))?;

    if let Some(header) = parse_header(&content) {
        println!("  Schema: {}", header.schema_version);
        println!("  Source: {}", header.source);
        if let Some(fps) = header.fps_hint {
            println!("  FPS hint: {fps}");
        }
    }
    println!("  Frames: {}", frames.len());

    let mut issues = Vec::new();
    if frames.is_empty() {
        issues.push("stream contains no frames".to_string());
    }

    let mut validator = FrameOrderValidator::new();
    for frame in &frames {
        if let Err(e) = validator.check(frame) {
            issues.push(e.to_string());
            break;
        }
    }

    let with_keypoints = frames.iter().filter(|f| f.has_any_keypoint()).count();
    let with_bat = frames.iter().filter(|f| f.bat.is_some()).count();
    if !frames.is_empty() {
        let coverage = with_keypoints as f64 / frames.len() as f64;
        println!("  Keypoint coverage: {:.1}%", coverage * 100.0);
        println!("  Frames with bat box: {with_bat}");
        if coverage < 0.5 {
            issues.push(format!(
                "only {:.1}% of frames have keypoints",
                coverage * 100.0
            ));
        }
    }

    let timestamps: Vec<u64> = frames.iter().map(|f| f.timestamp_ns).collect();
    match FrameRateEstimate::from_timestamps(&timestamps) {
        Some(rate) => {
            println!("  Estimated FPS: {:.2}", rate.fps);
            if rate.has_dropped_frames(1.5) {
                issues.push(format!(
                    "irregular frame timing (largest gap {:.1}x the median)",
                    rate.irregularity
                ));
            }
        }
        None if frames.len() > 1 => {
            issues.push("timestamps do not increase".to_string());
        }
        None => {}
    }

    if issues.is_empty() {
        println!("\nStream is valid.");
    } else {
        println!("\nValidation issues:");
        for issue in &issues {
            println!("  - {issue}");
        }
        println!(
            "\n{} issue(s) found. Analysis may be unreliable or fail.",
            issues.len()
        );
    }

    Ok(())
}
