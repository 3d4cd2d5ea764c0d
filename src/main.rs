//! FormLabels - Field label extraction for paper forms
//!
//! Reads a scanned or photographed form (image, PDF, or base64 data URL),
//! prepares it for OCR, and reports the field labels it finds with a
//! confidence score for each.

mod analysis;
mod config;
mod document;
mod error;
mod export;
mod pipeline;
mod storage;
mod vision;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::analysis::PipelineEvent;
use crate::config::AppConfig;
use crate::document::DocumentSource;
use crate::export::ExportFormat;
use crate::pipeline::{FormLabelPipeline, STAGE_NAMES};
use crate::storage::ProfileSet;

/// FormLabels - Extract field labels from scanned forms
#[derive(Parser, Debug)]
#[command(name = "form-labels")]
#[command(about = "Extract field labels from scanned and photographed forms")]
struct Args {
    /// Image, PDF, or text file holding a data URL; `-` reads stdin
    #[arg(required_unless_present_any = ["list_profiles", "print_config", "export_profiles"])]
    input: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: ExportFormat,

    /// Write the export here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file (default: config.toml in the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// OCR language code, e.g. "eng"
    #[arg(long)]
    lang: Option<String>,

    /// Send the page to OCR without preprocessing
    #[arg(long)]
    no_preprocess: bool,

    /// Save the page exactly as sent to OCR
    #[arg(long)]
    save_preprocessed: Option<PathBuf>,

    /// Save the page with detected lines and input areas outlined
    #[arg(long)]
    annotate: Option<PathBuf>,

    /// List form-type profiles and exit
    #[arg(long)]
    list_profiles: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Write the active profile set as JSON and exit
    #[arg(long)]
    export_profiles: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for the export
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &args.config {
        Some(path) => {
            let config = config::load_config(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => load_or_create_config(),
    };
    if let Some(lang) = &args.lang {
        config.ocr.language = lang.clone();
    }
    if args.no_preprocess {
        config.preprocess.enabled = false;
    }

    if args.print_config {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let profiles = load_profile_set(&config)?;

    if args.list_profiles {
        print_profiles(&profiles);
        return Ok(());
    }

    if let Some(path) = &args.export_profiles {
        storage::profiles::save_profiles(&profiles, path)
            .with_context(|| format!("Failed to write profiles to {:?}", path))?;
        info!("Wrote {} profiles to {:?}", profiles.definitions().len(), path);
        return Ok(());
    }

    let input = args.input.clone().context("No input document given")?;
    run_extraction(&args, input, config, profiles).await
}

async fn run_extraction(args: &Args, input: PathBuf, config: AppConfig, profiles: Arc<ProfileSet>) -> Result<()> {
    let source = if input.as_os_str() == "-" {
        let mut bytes = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut bytes)
            .await
            .context("Failed to read document from stdin")?;
        info!("Extracting labels from stdin ({} bytes)", bytes.len());
        DocumentSource::Bytes { bytes, name: None }
    } else {
        info!("Extracting labels from {:?}", input);
        DocumentSource::Path(input)
    };

    let pipeline = FormLabelPipeline::from_config(config, profiles);
    let started = Instant::now();
    pipeline.events().subscribe(move |event| {
        let elapsed = event.timestamp.saturating_duration_since(started);
        match &event.event {
            PipelineEvent::StageChanged { run_id, index, stage } => info!(
                run_id = %run_id,
                "[{}/{}] {:?} {}: {} ({:.2?})",
                index + 1,
                STAGE_NAMES.len(),
                stage.status,
                stage.name,
                stage.description,
                elapsed
            ),
            PipelineEvent::RunFinished {
                run_id,
                success: true,
                label_count,
            } => info!(run_id = %run_id, "Found {} labels in {:.2?}", label_count, elapsed),
            PipelineEvent::RunFinished { run_id, .. } => {
                warn!(run_id = %run_id, "Run aborted after {:.2?}", elapsed)
            }
        }
    });

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling extraction");
            on_interrupt.cancel();
        }
    });

    let run = match pipeline.run(&source, &cancel).await {
        Ok(run) => run,
        Err(failure) => {
            match failure.failed_stage() {
                Some(stage) => error!("Extraction failed during {}: {}", stage.name, failure),
                None => error!("Extraction failed: {}", failure),
            }
            for stage in &failure.result.stages {
                eprintln!("  {:<22} {:<10?} {}", stage.name, stage.status, stage.description);
            }
            return Err(failure.into());
        }
    };

    if let Some(path) = &args.save_preprocessed {
        run.page
            .save(path)
            .with_context(|| format!("Failed to save preprocessed page to {:?}", path))?;
        info!("Saved preprocessed page to {:?}", path);
    }

    if let Some(path) = &args.annotate {
        match &run.layout {
            Some(layout) => {
                let annotated = vision::annotate::annotate_layout(&run.page, layout)?;
                annotated
                    .save(path)
                    .with_context(|| format!("Failed to save annotated page to {:?}", path))?;
                info!("Saved annotated page to {:?}", path);
            }
            None => warn!("No word positions available; skipping annotation"),
        }
    }

    let rendered = export::render(&run.result, args.format)?;
    write_output(args.output.as_deref(), &rendered)
}

/// Load configuration from file or create default
fn load_or_create_config() -> AppConfig {
    if let Ok(config_path) = storage::default_config_path() {
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return config;
                }
                Err(e) => warn!("Ignoring config: {:#}", e),
            }
        } else if let Err(e) = create_default_config(&config_path) {
            warn!("Could not write default config: {:#}", e);
        }
    }
    info!("Using default configuration");
    AppConfig::default()
}

fn create_default_config(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    config::save_config(&AppConfig::default(), path)?;
    info!("Wrote default configuration to {:?}", path);
    Ok(())
}

/// Built-in profiles unless the config names a profile file
fn load_profile_set(config: &AppConfig) -> Result<Arc<ProfileSet>> {
    match &config.profiles_path {
        Some(path) => {
            let set = storage::profiles::load_profiles(path)?;
            info!("Loaded {} profiles from {:?}", set.profiles().len(), path);
            Ok(Arc::new(set))
        }
        None => Ok(ProfileSet::builtin()),
    }
}

fn print_profiles(profiles: &ProfileSet) {
    println!("Form-type profiles:");
    for profile in profiles.profiles().iter().chain(std::iter::once(profiles.generic())) {
        println!(
            "  [{}] {} - {} keywords, {} patterns, boost +{}",
            profile.id,
            profile.name,
            profile.keywords.len(),
            profile.pattern_count(),
            profile.confidence_boost
        );
        if !profile.sections.is_empty() {
            println!("      sections: {}", profile.sections.join(", "));
        }
    }
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, format!("{}\n", content))
                .with_context(|| format!("Failed to write {:?}", path))?;
            info!("Wrote export to {:?}", path);
        }
        None => println!("{}", content),
    }
    Ok(())
}
