//! brainscan CLI for classifying and explaining brain scans.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use burn::module::Module;
use scan_core::backend::CpuAutodiff;
use scan_core::LayerId;
use scan_models::{load_classifier, ModelManifest};
use scan_pipeline::{CpuPipeline, PipelineConfig, ScanReport};

#[derive(Parser)]
#[command(name = "brainscan")]
#[command(author, version)]
#[command(about = "Brain scan tumor triage with Grad-CAM explanations")]
#[command(long_about = "brainscan: classify brain MRI scans as Tumor / No Tumor and show where the classifier looked.

EXAMPLES:
  # Write a default configuration
  brainscan init-config brainscan.json

  # Classify a scan and save the attention overlay
  brainscan classify scan.jpg --weights weights/classifier.mpk --out-dir out/

  # Classify several scans, print JSON
  brainscan classify a.png b.png --json

  # Show what a weight file contains
  brainscan inspect --weights weights/classifier.mpk")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify scans and render their attention maps
    Classify {
        /// Image files to classify
        #[arg(required = true, value_name = "IMAGE")]
        images: Vec<PathBuf>,

        /// Pipeline configuration file (JSON)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Classifier weights, overrides the configuration
        #[arg(long, value_name = "FILE")]
        weights: Option<PathBuf>,

        /// Layer to explain: stem, layer1, layer2, layer3, layer4
        #[arg(long, value_name = "LAYER")]
        layer: Option<LayerId>,

        /// Directory for original / heatmap / overlay PNGs
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Print one JSON summary per image
        #[arg(long, default_value = "false")]
        json: bool,
    },
    /// Load a weight file and describe it
    Inspect {
        /// Classifier weights
        #[arg(long, value_name = "FILE")]
        weights: PathBuf,
    },
    /// Write the default pipeline configuration
    InitConfig {
        /// Output path
        #[arg(default_value = "brainscan.json")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long, default_value = "false")]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Classify {
            images,
            config,
            weights,
            layer,
            out_dir,
            json,
        } => handle_classify(images, config, weights, layer, out_dir, json),
        Commands::Inspect { weights } => handle_inspect(weights),
        Commands::InitConfig { output, force } => handle_init_config(output, force),
    }
}

fn handle_classify(
    images: Vec<PathBuf>,
    config_path: Option<PathBuf>,
    weights: Option<PathBuf>,
    layer: Option<LayerId>,
    out_dir: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to read config '{}'", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(weights) = weights {
        config.weights = weights;
    }
    if let Some(layer) = layer {
        config.target_layer = layer;
    }

    let device = Default::default();
    let pipeline = CpuPipeline::load(config, &device).context("Failed to load classifier")?;

    if let Some(dir) = &out_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create '{}'", dir.display()))?;
    }

    let mut failures = 0usize;
    for image in &images {
        let report = match std::fs::read(image)
            .with_context(|| format!("Failed to read '{}'", image.display()))
            .and_then(|bytes| Ok(pipeline.classify_and_explain(&bytes)?))
        {
            Ok(report) => report,
            Err(e) => {
                eprintln!("{}: {e:#}", image.display());
                failures += 1;
                continue;
            }
        };

        if json {
            println!("{}", serde_json::to_string(&report.summary())?);
        } else {
            print_report(image, &report);
        }

        if let Some(dir) = &out_dir {
            write_images(dir, image, &report)?;
        }
    }

    if failures > 0 {
        bail!("{failures} of {} images could not be classified", images.len());
    }
    Ok(())
}

fn print_report(image: &Path, report: &ScanReport) {
    println!("{}", image.display());
    println!("  Diagnosis:   {}", report.label);
    println!("  P(tumor):    {:.4}", report.probability);
    println!("  Confidence:  {:.1}%", report.confidence * 100.0);
    if report.degenerate_explanation {
        println!("  Attention:   none (no gradient reached the explained layer)");
    }
}

fn write_images(dir: &Path, image: &Path, report: &ScanReport) -> Result<()> {
    let stem = image
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("scan");

    for (suffix, bytes) in [
        ("original", &report.original_image),
        ("heatmap", &report.heatmap_image),
        ("overlay", &report.overlay_image),
    ] {
        let path = dir.join(format!("{stem}_{suffix}.png"));
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write '{}'", path.display()))?;
        tracing::info!("Wrote {}", path.display());
    }
    Ok(())
}

fn handle_inspect(weights: PathBuf) -> Result<()> {
    let device = Default::default();
    let requested = PipelineConfig::default().classifier.unwrap_or_default();

    let (model, config) = load_classifier::<CpuAutodiff>(&weights, &requested, &device)
        .with_context(|| format!("Failed to load '{}'", weights.display()))?;

    println!("Weights: {}", weights.display());
    println!("─────────────────────────────────────────");
    println!("  Architecture: {}", scan_models::ARCH_NAME);
    println!("  Base width:   {}", config.base_width);
    println!("  Head:         {:?} -> 1", config.hidden);
    println!("  Parameters:   {}", model.num_params());
    println!(
        "  Layers:       {}",
        LayerId::ALL.map(|l| l.name()).join(", ")
    );

    if let Some(manifest) = ModelManifest::load_beside(&weights)? {
        println!();
        println!("  Version:      {}", manifest.version);
        if let Some(acc) = manifest.val_acc {
            println!("  Val accuracy: {:.2}%", acc * 100.0);
        }
        for (key, value) in &manifest.extra {
            println!("  {key}: {value}");
        }
    }

    Ok(())
}

fn handle_init_config(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!("'{}' already exists (use --force to overwrite)", output.display());
    }

    PipelineConfig::default()
        .save(&output)
        .with_context(|| format!("Failed to write '{}'", output.display()))?;
    println!("Wrote default configuration to {}", output.display());
    Ok(())
}
