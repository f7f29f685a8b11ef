use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use opal_clip_factory::config::Config;
use opal_clip_factory::inspect::inspect_run;
use opal_clip_factory::materialize::Materializer;
use opal_clip_factory::{ClipFactory, OperatingMode, ProviderPool, RunSettings};
use opal_clip_factory::{init, prompts_file};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const EXIT_CLIPS_MISSING: i32 = 2;

#[derive(Debug, Parser)]
#[command(
    name = "opal-factory",
    version,
    about = "Resilient short-clip generation across image/video providers"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate one clip per prompt and export the run artifacts
    Run {
        /// JSON prompt file (list, {"prompts": [...]} or {"beats": [...]})
        #[arg(long, conflicts_with = "topic")]
        prompts: Option<PathBuf>,

        /// Build the prompt list from the topic templates
        #[arg(long)]
        topic: Option<String>,

        /// SAFE (120s between clips) or ACCELERATED (30s)
        #[arg(long, default_value = "SAFE", value_parser = OperatingMode::from_str)]
        mode: OperatingMode,

        /// Base directory for run output, overrides config
        #[arg(long)]
        output_dir: Option<PathBuf>,

        #[arg(long, default_value = "config.json")]
        config: PathBuf,

        /// Seconds to wait after each clip, overrides the mode
        #[arg(long)]
        pause_secs: Option<u64>,

        /// Skip fetching and rendering generated assets
        #[arg(long)]
        no_render: bool,
    },
    /// Summarise an existing run directory
    Inspect { run_dir: PathBuf },
}

#[allow(clippy::too_many_arguments)]
async fn run(
    prompts: Option<PathBuf>,
    topic: Option<String>,
    mode: OperatingMode,
    output_dir: Option<PathBuf>,
    config: PathBuf,
    pause_secs: Option<u64>,
    no_render: bool,
) -> Result<i32> {
    let mut cfg = Config::load_or_default(&config).await?;
    if let Some(dir) = output_dir {
        cfg.output_base = dir;
    }

    let prompts = match (prompts, topic) {
        (Some(path), _) => prompts_file::load_prompts(&path).await?,
        (None, Some(topic)) => prompts_file::topic_prompts(&topic),
        (None, None) => prompts_file::default_prompts(),
    };

    let client = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;
    let pool = ProviderPool::from_config(&cfg, client.clone())
        .context("No usable providers; set at least one API key")?;

    let mut settings = RunSettings::from_config(&cfg, mode);
    settings.pause_override = pause_secs.map(Duration::from_secs);

    let mut factory = ClipFactory::new(pool, settings.clone());
    if !no_render {
        let render_video = init::check_ffmpeg().await;
        if !render_video {
            eprintln!("[WARNING] FFmpeg not found in PATH. Clips will be saved as stills only.");
        }
        factory = factory.with_materializer(Materializer::new(client, &settings, render_video));
    }

    let outcome = factory.run(&prompts).await?;

    println!("Output: {}", outcome.output_dir.display());
    println!(
        "Clips: {} total, {} success, {} recovered, {} failed",
        outcome.results.len(),
        outcome.succeeded(),
        outcome.recovered(),
        outcome.failed()
    );
    for path in &outcome.artifacts.written {
        println!("  {}", path.display());
    }
    for (path, err) in &outcome.artifacts.failed {
        eprintln!("  [WARNING] {} not written: {}", path.display(), err);
    }

    if outcome.assembly_ready() {
        println!("Assembly ready");
        Ok(0)
    } else {
        println!("Assembly blocked: {} clip(s) missing", outcome.failed());
        Ok(EXIT_CLIPS_MISSING)
    }
}

async fn inspect(run_dir: PathBuf) -> Result<i32> {
    let report = inspect_run(&run_dir)
        .await
        .with_context(|| format!("Failed to inspect {}", run_dir.display()))?;

    println!("Run {} ({})", report.run_id, report.operating_mode);
    println!("  clips in manifest: {}", report.clips_listed);
    println!("  prompts logged:    {}", report.prompts_logged);
    println!("  clip files found:  {}", report.clip_files.len());
    println!("  recovered/failed:  {}/{}", report.recovered, report.failed);
    println!("  est. duration:     {:.1}s", report.estimated_duration);
    println!("  assembly ready:    {}", report.assembly_ready);
    if !report.missing_clips.is_empty() {
        println!("  missing:           {}", report.missing_clips.join(", "));
    }
    if !report.consistent {
        eprintln!("[WARNING] manifest assembly_ready disagrees with missing_clips");
    }
    for rec in &report.recommendations {
        println!("  - {}", rec);
    }

    Ok(if report.assembly_ready { 0 } else { EXIT_CLIPS_MISSING })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Run {
            prompts,
            topic,
            mode,
            output_dir,
            config,
            pause_secs,
            no_render,
        } => run(prompts, topic, mode, output_dir, config, pause_secs, no_render).await?,
        Commands::Inspect { run_dir } => inspect(run_dir).await?,
    };
    std::process::exit(code);
}
