//! Analyze a pose stream and write the evaluation bundle.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use strokelab_analysis::{AnalysisConfig, JsonlFrameSource, StrokeAnalyzer, StreamingAnalyzer};
use strokelab_cache::{FsCacheStore, PipelineCache};
use strokelab_common::config::AppConfig;
use strokelab_model::artifacts::{AnalysisBundle, Manifest, EVALUATION_FILE};
use strokelab_model::evaluation::{Category, EvaluationResult, Rating};
use strokelab_model::frame::{best_detections, parse_detections, BatBox, FrameIndex};
use strokelab_model::phase::Contact;

const GENERATOR: &str = concat!("strokelab ", env!("CARGO_PKG_VERSION"));

pub async fn run(
    app_config: &AppConfig,
    frames: PathBuf,
    detections: Option<PathBuf>,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
    no_cache: bool,
    cache_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    println!("Analyzing frames at: {}", frames.display());

    let config_path = config.or_else(|| app_config.analysis_config.clone());
    let analysis_config = match &config_path {
        Some(path) => {
            println!("  Config: {}", path.display());
            AnalysisConfig::load(path)
                .map_err(|e| anyhow::anyhow!("Failed to load analysis config: {e}"))?
        }
        None => AnalysisConfig::default(),
    };

    let mut source = JsonlFrameSource::open(&frames)
        .map_err(|e| anyhow::anyhow!("Failed to open frames: {e}"))?;
    if let Some(path) = &detections {
        let boxes = load_detections(path)?;
        println!("  Loaded bat detections for {} frames", boxes.len());
        source = source.with_detections(boxes);
    }

    let mut analyzer = StrokeAnalyzer::new(analysis_config)?;
    if !no_cache && app_config.cache_enabled {
        let dir = cache_dir.unwrap_or_else(|| app_config.cache_dir.clone());
        match FsCacheStore::open(&dir) {
            Ok(store) => {
                println!("  Cache: {}", dir.display());
                analyzer = analyzer.with_cache(Arc::new(PipelineCache::new(Arc::new(store))));
            }
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Cache unavailable, running without it");
            }
        }
    }

    let streaming = StreamingAnalyzer::new(Arc::new(analyzer));
    let cancel = streaming.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing with the frames read so far");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    println!("Press Ctrl+C to stop early...");
    let result = streaming.run(source).await?;

    let output_dir = output.unwrap_or_else(|| default_output_dir(app_config, &frames));
    let manifest = Manifest::new(
        GENERATOR,
        result.input_fingerprint.to_string(),
        result.config_fingerprint.to_string(),
        &result.evaluation,
    );
    let bundle = AnalysisBundle {
        evaluation: result.evaluation,
        metrics_log: result.metrics_log,
        manifest,
    };
    bundle
        .write(&output_dir)
        .map_err(|e| anyhow::anyhow!("Failed to write bundle: {e}"))?;

    println!();
    print_evaluation(&bundle.evaluation);
    println!(
        "\nEvaluation saved to: {}",
        output_dir.join(EVALUATION_FILE).display()
    );
    if !bundle.evaluation.complete {
        println!("Run was interrupted; the result covers a partial stream.");
    }

    Ok(())
}

fn load_detections(path: &Path) -> anyhow::Result<BTreeMap<FrameIndex, BatBox>> {
    let content = std::fs::read_to_string(path)
        .map_err(|_| anyhow::anyhow!("Detections file not found: {}", path.display()))?;
    let detections = parse_detections(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse detections: {e}"))?;
    Ok(best_detections(&detections))
}

fn default_output_dir(app_config: &AppConfig, frames: &Path) -> PathBuf {
    let stem = frames
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "analysis".to_string());
    app_config.output_dir.join(stem)
}

/// Human-readable summary of an evaluation.
pub fn print_evaluation(evaluation: &EvaluationResult) {
    println!("Phases:");
    for (phase, range) in evaluation.phases.boundaries() {
        match range {
            Some((start, end)) => println!("  {:<15} frames {start}-{end}", phase.name()),
            None => println!("  {:<15} (not observed)", phase.name()),
        }
    }

    match &evaluation.contact {
        Contact::Found(event) => println!(
            "Contact: frame {} (confidence {:.2}, {:?})",
            event.frame, event.confidence, event.method
        ),
        Contact::NotFound { reason } => println!("Contact: not found ({reason})"),
    }
    println!();

    println!("Ratings:");
    for category in Category::ALL {
        let Some(result) = evaluation.categories.get(&category) else {
            continue;
        };
        let rating = match result.rating {
            Rating::Scored { value } => format!("{value:>2}/10"),
            Rating::Unscored => "  -- ".to_string(),
        };
        println!("  {:<15} {rating}  {}", category.label(), result.feedback);
    }
    match evaluation.overall {
        Some(overall) => println!("  {:<15} {overall:.1}/10", "Overall"),
        None => println!("  {:<15} --", "Overall"),
    }
    println!(
        "\nFrames: {} (keypoint coverage {:.1}%)",
        evaluation.frames_processed,
        evaluation.data_coverage * 100.0
    );
}
