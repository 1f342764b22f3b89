use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sceneforge_contracts::media::decode_upload;
use sceneforge_contracts::{AspectRatio, ImageSize, StudioConfig, StyleCatalog, UploadFile, UuidIds};
use sceneforge_engine::{
    default_backend_registry, BatchOutcome, GeminiBackend, Studio, StudioBackend,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "sceneforge", version, about = "Product scene studio CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload, analyze, expand selling points, render and export.
    Render(RenderArgs),
    /// Print the visual analysis of one image as JSON.
    Analyze(AnalyzeArgs),
    /// List the scene styles.
    Styles,
}

#[derive(Debug, Parser)]
struct RenderArgs {
    #[arg(long = "image", required = true)]
    images: Vec<PathBuf>,
    /// Selling points separated by newlines, commas or semicolons.
    #[arg(long)]
    points: Option<String>,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long, default_value = "dryrun")]
    backend: String,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    style: Option<String>,
    #[arg(long)]
    aspect_ratio: Option<AspectRatio>,
    #[arg(long)]
    image_size: Option<ImageSize>,
    #[arg(long)]
    competitor: Option<String>,
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long, default_value = "dryrun")]
    backend: String,
    #[arg(long)]
    competitor: Option<String>,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("sceneforge error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("SCENEFORGE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Render(args) => run_render(args),
        Command::Analyze(args) => run_analyze(args),
        Command::Styles => {
            for style in StyleCatalog::default().list() {
                println!("{}\t{}\t{}", style.id, style.name, style.description);
            }
            Ok(0)
        }
    }
}

fn resolve_backend(name: &str) -> Result<Arc<dyn StudioBackend>> {
    if name.trim() == "gemini" {
        return Ok(Arc::new(GeminiBackend::from_env()));
    }
    let registry = default_backend_registry();
    match registry.get(name) {
        Some(backend) => Ok(backend),
        None => bail!(
            "unknown backend '{name}' (available: {})",
            registry.names().join(", ")
        ),
    }
}

fn run_render(args: RenderArgs) -> Result<i32> {
    let mut config = match &args.config {
        Some(path) => StudioConfig::load(path)?,
        None => StudioConfig::default(),
    };
    if let Some(points) = args.points {
        config.selling_points = points;
    }
    if let Some(style) = args.style {
        config.style_id = style;
    }
    if let Some(aspect_ratio) = args.aspect_ratio {
        config.aspect_ratio = aspect_ratio;
    }
    if let Some(image_size) = args.image_size {
        config.image_size = image_size;
    }
    if let Some(competitor) = args.competitor {
        config.competitor_link = competitor;
    }

    let backend = resolve_backend(&args.backend)?;
    tracing::debug!(
        backend = backend.name(),
        images = args.images.len(),
        image_size = %config.image_size,
        "render requested"
    );
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let mut studio = Studio::new(
        &args.out,
        &events_path,
        backend,
        Arc::new(UuidIds),
        config,
    )?;

    let files = args
        .images
        .iter()
        .map(|path| UploadFile::read(path))
        .collect::<Result<Vec<_>>>()?;
    let report = studio.upload(files)?;
    for (name, reason) in &report.rejected {
        eprintln!("skipped {name}: {reason}");
    }
    if report.clamped > 0 {
        eprintln!("skipped {} image(s) beyond the limit", report.clamped);
    }

    studio.analyze()?;
    if studio.generate_points()?.is_none() {
        bail!("nothing to render: need at least one readable image and one selling point");
    }

    let produced = match studio.start_batch()? {
        BatchOutcome::Completed { results, failures } => {
            for failure in &failures {
                eprintln!("render {} failed: {}", failure.index, failure.error);
            }
            results
        }
        BatchOutcome::Skipped => Vec::new(),
    };
    for result_id in &produced {
        let path = studio
            .export_result(result_id, &args.out)
            .with_context(|| format!("failed exporting {result_id}"))?;
        println!("{}", path.display());
    }

    let summary_path = studio.finish()?;
    eprintln!(
        "{} of {} scene(s) rendered; summary at {}",
        produced.len(),
        studio.points().len(),
        summary_path.display()
    );
    Ok(if produced.is_empty() { 1 } else { 0 })
}

fn run_analyze(args: AnalyzeArgs) -> Result<i32> {
    let backend = resolve_backend(&args.backend)?;
    let file = UploadFile::read(&args.image)?;
    let (payload, _) = decode_upload(&file)?;
    let analysis = backend.analyze(&payload, args.competitor.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(0)
}
