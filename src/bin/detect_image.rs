//! detect_image - run one detection pass over a single image
//!
//! Prints the same JSON tuple array as the /detect-image endpoint:
//! `[[x1, y1, x2, y2, "LABEL", confidence], ...]`.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde_json::json;

use crashwatch::detect::json_confidence;
use crashwatch::{DetectorBackend, StubBackend};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image file to analyze (png or jpeg).
    #[arg(long)]
    image: PathBuf,
    /// Detector backend name (stub, tract).
    #[arg(long, default_value = "stub", env = "CRASHWATCH_DETECTOR_BACKEND")]
    backend: String,
    /// ONNX model weights for the tract backend.
    #[arg(long, env = "CRASHWATCH_MODEL_PATH")]
    model: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let image = image::open(&args.image)
        .with_context(|| format!("failed to open image {}", args.image.display()))?
        .to_rgb8();
    let (width, height) = image.dimensions();

    let mut backend = build_backend(&args, width, height)?;
    backend.warm_up()?;
    let detections = backend.detect(image.as_raw(), width, height)?;

    let tuples: Vec<serde_json::Value> = detections
        .iter()
        .map(|d| {
            json!([
                d.bbox.x1,
                d.bbox.y1,
                d.bbox.x2,
                d.bbox.y2,
                d.label,
                json_confidence(d.confidence)
            ])
        })
        .collect();
    println!("{}", serde_json::to_string(&tuples)?);
    Ok(())
}

#[cfg_attr(not(feature = "backend-tract"), allow(unused_variables))]
fn build_backend(args: &Args, width: u32, height: u32) -> Result<Box<dyn DetectorBackend>> {
    match args.backend.as_str() {
        "stub" => Ok(Box::new(StubBackend::new())),
        #[cfg(feature = "backend-tract")]
        "tract" => {
            let model = args
                .model
                .as_ref()
                .ok_or_else(|| anyhow!("--model is required for the tract backend"))?;
            Ok(Box::new(crashwatch::detect::TractBackend::new(
                model, width, height,
            )?))
        }
        other => Err(anyhow!("unknown detector backend '{}'", other)),
    }
}
