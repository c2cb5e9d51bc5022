//! HybridResize CLI - batch image resizer with remote/local routing
//!
//! Resizes a file or directory of images, routing the batch to a remote
//! service or to in-process resizing, and prints an analytics summary.

use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use hybridresize::analytics::{format_file_size, AnalyticsReport};
use hybridresize::config::{builtin_presets, BackgroundColor, NamingConfig, Watermark};
use hybridresize::parallel::{ConsoleProgressReporter, NoProgress, ProgressSink};
use hybridresize::processing::{
    available_memory, check_memory_capacity, estimate_processing_time, is_supported_input_path,
};
use hybridresize::remote::HttpTransport;
use hybridresize::routing::HealthProbe;
use hybridresize::{
    build_cascade, init_with_config, summarize, Config, ExecutionPath, OutputFormat, Outcome,
    ProcessingOptions, Quality, ResizeAlgorithm, RoutingDecision, RoutingMode, WorkItem,
};

/// HybridResize - batch image resizer with remote/local routing
#[derive(Parser)]
#[command(
    name = "hybridresize",
    version,
    about = "Batch image resizer that routes work between a remote service and local processing",
    long_about = "HybridResize resizes batches of images. Each batch is scored against the \
                  health of a remote processing service and the shape of the workload, then \
                  runs remotely or in-process. A failed remote run falls back to local \
                  processing."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input file or directory
    #[arg(short, long, value_name = "PATH", global = true)]
    input: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, value_name = "PATH", global = true)]
    output: Option<PathBuf>,

    /// Target width in pixels
    #[arg(short, long, value_name = "PIXELS", global = true)]
    width: Option<u32>,

    /// Target height in pixels
    #[arg(short = 'H', long, value_name = "PIXELS", global = true)]
    height: Option<u32>,

    /// Output quality, as a fraction (0.1-1.0) or a percentage (1-100)
    #[arg(short, long, value_name = "QUALITY", global = true)]
    quality: Option<f32>,

    /// Output format
    #[arg(short, long, value_enum, value_name = "FORMAT", global = true)]
    format: Option<CliFormat>,

    /// Resampling algorithm
    #[arg(short, long, value_enum, value_name = "ALGORITHM", global = true)]
    algorithm: Option<CliAlgorithm>,

    /// Resize to the exact target box instead of keeping the aspect ratio
    #[arg(long, global = true)]
    stretch: bool,

    /// Background color for flattened output (#rgb, #rrggbb or transparent)
    #[arg(long, value_name = "COLOR", global = true)]
    background: Option<String>,

    /// Watermark text (applied by the remote service)
    #[arg(long, value_name = "TEXT", global = true)]
    watermark: Option<String>,

    /// Size preset name
    #[arg(short, long, value_name = "NAME", global = true)]
    preset: Option<String>,

    /// Routing mode
    #[arg(short, long, value_enum, value_name = "MODE", global = true)]
    mode: Option<CliMode>,

    /// Base URL of the remote processing functions
    #[arg(long, value_name = "URL", env = "HYBRIDRESIZE_REMOTE_URL", global = true)]
    remote_url: Option<String>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Process directories recursively
    #[arg(short = 'R', long, global = true)]
    recursive: bool,

    /// Show the routing plan without processing
    #[arg(long)]
    dry_run: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short = 'Q', long, conflicts_with = "verbose", global = true)]
    quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Clone)]
enum Commands {
    /// Probe the remote processing service
    Health,
    /// Show the routing decision and estimates for the input without processing
    Route,
    /// List available presets
    Presets {
        /// Show preset dimensions
        #[arg(long)]
        detailed: bool,
    },
    /// Validate configuration file
    Config {
        /// Configuration file to validate
        file: PathBuf,
    },
    /// Generate example configuration file
    ExampleConfig {
        /// Output file path
        #[arg(default_value = "hybridresize.toml")]
        file: PathBuf,
        /// Use YAML format instead of TOML
        #[arg(long)]
        yaml: bool,
    },
}

/// CLI-compatible output format enum
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliFormat {
    #[value(alias = "jpg")]
    Jpeg,
    Png,
    Webp,
}

impl From<CliFormat> for OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Jpeg => OutputFormat::Jpeg,
            CliFormat::Png => OutputFormat::Png,
            CliFormat::Webp => OutputFormat::Webp,
        }
    }
}

/// CLI-compatible resampling algorithm enum
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliAlgorithm {
    Lanczos,
    Bicubic,
    Bilinear,
    Nearest,
}

impl From<CliAlgorithm> for ResizeAlgorithm {
    fn from(algorithm: CliAlgorithm) -> Self {
        match algorithm {
            CliAlgorithm::Lanczos => ResizeAlgorithm::Lanczos,
            CliAlgorithm::Bicubic => ResizeAlgorithm::Bicubic,
            CliAlgorithm::Bilinear => ResizeAlgorithm::Bilinear,
            CliAlgorithm::Nearest => ResizeAlgorithm::Nearest,
        }
    }
}

/// CLI-compatible routing mode enum
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliMode {
    Auto,
    Local,
    Remote,
}

impl From<CliMode> for RoutingMode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Auto => RoutingMode::Auto,
            CliMode::Local => RoutingMode::Local,
            CliMode::Remote => RoutingMode::Remote,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command.clone() {
        Some(command) => handle_subcommand(&cli, command).await,
        None => run_batch(&cli).await,
    };

    if let Err(e) = result {
        eprintln!("{}: {:#}", style("Error").red().bold(), e);
        process::exit(1);
    }
}

/// Handle subcommands
async fn handle_subcommand(cli: &Cli, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Health => show_health(cli).await,
        Commands::Route => {
            let batch = prepare(cli).await?;
            show_plan(cli, &batch).await
        }
        Commands::Presets { detailed } => show_presets(&load_config(cli)?, detailed),
        Commands::Config { file } => validate_config_file(&file),
        Commands::ExampleConfig { file, yaml } => generate_example_config(file, yaml),
    }
}

/// Load the configuration file (if any) and apply command-line overrides
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(url) = &cli.remote_url {
        config.remote.base_url = Some(url.clone());
    }
    if let Some(mode) = cli.mode {
        config.routing.mode = mode.into();
    }
    if cli.quiet {
        config.logging.level = "error".to_string();
    } else if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    Ok(config)
}

/// Build processing options from a preset plus explicit flags
fn create_options(cli: &Cli, config: &Config) -> anyhow::Result<ProcessingOptions> {
    let mut options = match &cli.preset {
        Some(name) => config.get_preset(name)?,
        None => ProcessingOptions::default(),
    };

    if let Some(width) = cli.width {
        options = options.width(width);
    }
    if let Some(height) = cli.height {
        options = options.height(height);
    }
    if let Some(quality) = cli.quality {
        options = options.quality(Quality::try_from(quality)?);
    }
    if let Some(format) = cli.format {
        options = options.format(format.into());
    }
    if let Some(algorithm) = cli.algorithm {
        options = options.algorithm(algorithm.into());
    }
    if cli.stretch {
        options = options.maintain_aspect_ratio(false);
    }
    if let Some(color) = &cli.background {
        options = options.background(BackgroundColor::parse(color)?);
    }
    if let Some(text) = &cli.watermark {
        options = options.watermark(Watermark::text(text.clone()));
    }

    options.validate()?;
    Ok(options)
}

/// Inputs shared by the run and `route`
struct PreparedBatch {
    config: Config,
    files: Vec<PathBuf>,
    items: Vec<WorkItem>,
    options: ProcessingOptions,
}

/// Load config, options and input items
async fn prepare(cli: &Cli) -> anyhow::Result<PreparedBatch> {
    let config = load_config(cli)?;
    init_with_config(&config)?;

    let input = cli
        .input
        .as_deref()
        .context("Input path is required (use --input)")?;
    let options = create_options(cli, &config)?;

    let files = discover_files(input, cli.recursive)?;
    if files.is_empty() {
        bail!("No supported image files found in {}", input.display());
    }
    info!("Found {} files to process", files.len());

    let mut items = Vec::with_capacity(files.len());
    for path in &files {
        let item = WorkItem::from_path(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        items.push(item);
    }

    Ok(PreparedBatch {
        config,
        files,
        items,
        options,
    })
}

/// Resize the input batch and write outputs
async fn run_batch(cli: &Cli) -> anyhow::Result<()> {
    let batch = prepare(cli).await?;

    if cli.dry_run {
        return show_plan(cli, &batch).await;
    }

    let input = cli.input.as_deref().context("Input path is required")?;
    let output = cli
        .output
        .as_deref()
        .context("Output directory is required (use --output)")?;
    let PreparedBatch {
        config,
        files,
        items,
        options,
    } = batch;

    let cascade = build_cascade(&config)?;

    let bar = if cli.json || cli.quiet {
        None
    } else {
        let pb = ProgressBar::new(items.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        Some(pb)
    };
    let sink: Box<dyn ProgressSink> = match &bar {
        Some(pb) => Box::new(ConsoleProgressReporter::new(pb.clone())),
        None => Box::new(NoProgress),
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current chunk");
            interrupt.cancel();
        }
    });

    let start_time = Instant::now();
    let outcome = cascade
        .execute(&items, &options, sink.as_ref(), &cancel)
        .await?;
    let elapsed_ms = start_time.elapsed().as_secs_f64() * 1000.0;

    if let Some(pb) = &bar {
        pb.finish_and_clear();
    }

    let written = write_outputs(&outcome.outcomes, &files, input, output).await?;
    let report = summarize(&outcome.outcomes, elapsed_ms);

    if cli.json {
        let run = RunReport {
            path_used: outcome.path_used,
            decision: &outcome.decision,
            fallback_reason: outcome.fallback_reason.as_deref(),
            outcomes: &outcome.outcomes,
            written: written.iter().map(|p| p.display().to_string()).collect(),
            analytics: &report,
        };
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else if !cli.quiet {
        print_summary(
            &outcome.outcomes,
            &report,
            outcome.path_used,
            outcome.fallback_reason.as_deref(),
        );
    }

    Ok(())
}

/// Discover supported input files, sorted for a stable order
fn discover_files(input_path: &Path, recursive: bool) -> anyhow::Result<Vec<PathBuf>> {
    if input_path.is_file() {
        return Ok(vec![input_path.to_path_buf()]);
    }
    if !input_path.is_dir() {
        bail!("Input path does not exist: {}", input_path.display());
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(input_path)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_supported_input_path(entry.path()))
        .map(walkdir::DirEntry::into_path)
        .collect();

    files.sort();
    Ok(files)
}

/// Write each successful payload under the output directory, mirroring input subdirectories
async fn write_outputs(
    outcomes: &[Outcome],
    files: &[PathBuf],
    input_root: &Path,
    output_root: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    let naming = NamingConfig::default();
    let mut written = Vec::new();

    for success in outcomes.iter().filter_map(Outcome::as_success) {
        let source = &files[success.index];
        let relative_dir = source
            .strip_prefix(input_root)
            .ok()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new(""));
        let dir = output_root.join(relative_dir);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let path = dir.join(naming.generate_filename(&success.item_name, success.format));
        tokio::fs::write(&path, &success.payload)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Wrote {}", path.display());
        written.push(path);
    }

    Ok(written)
}

/// JSON document printed by `--json`
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReport<'a> {
    path_used: ExecutionPath,
    decision: &'a RoutingDecision,
    fallback_reason: Option<&'a str>,
    outcomes: &'a [Outcome],
    written: Vec<String>,
    analytics: &'a AnalyticsReport,
}

/// Print the routing decision and estimates without processing
async fn show_plan(cli: &Cli, batch: &PreparedBatch) -> anyhow::Result<()> {
    let (items, options) = (&batch.items, &batch.options);
    let cascade = build_cascade(&batch.config)?;
    let decision = cascade.plan(items, options).await;

    let total_bytes: u64 = items.iter().map(WorkItem::size).sum();
    let avg_bytes = total_bytes / items.len().max(1) as u64;
    let estimate = estimate_processing_time(items, options);
    let memory = check_memory_capacity(items.len(), avg_bytes, available_memory());

    if cli.json {
        let plan = serde_json::json!({
            "items": items.len(),
            "totalBytes": total_bytes,
            "decision": decision,
            "estimate": estimate,
            "memory": memory,
        });
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("{}", style("Routing Plan:").bold());
    println!(
        "  {}: {} ({})",
        style("Files").cyan(),
        items.len(),
        format_file_size(total_bytes as f64)
    );
    println!(
        "  {}: {} (local {} / remote {})",
        style("Path").cyan(),
        style(decision.chosen_path).bold(),
        decision.local_score,
        decision.remote_score
    );
    for clause in &decision.reasoning {
        println!("    - {}", clause);
    }
    println!(
        "  {}: {}",
        style("Estimated time").cyan(),
        estimate.estimated_time_formatted
    );
    println!(
        "  {}: {:.1}MB of {:.1}MB ({})",
        style("Memory").cyan(),
        memory.estimated_memory_mb,
        memory.available_memory_mb,
        memory.recommendation
    );

    if cli.dry_run {
        println!();
        println!("{} files would be processed:", style(items.len()).bold());
        for file in &batch.files {
            println!("  {}", file.display());
        }
    }

    Ok(())
}

/// Probe the remote service once and print the sample
async fn show_health(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    init_with_config(&config)?;

    if config.remote.base_url.is_none() {
        bail!("No remote service configured (use --remote-url or HYBRIDRESIZE_REMOTE_URL)");
    }

    let transport = HttpTransport::new(&config.remote)?;
    let sample = transport.probe().await;

    if cli.json {
        let health = serde_json::json!({
            "available": sample.available,
            "latencyMs": sample.latency_ms(),
            "status": sample.status,
            "deploymentUnavailable": sample.deployment_unavailable,
            "error": sample.error,
            "recommendation": sample.recommendation(),
        });
        println!("{}", serde_json::to_string_pretty(&health)?);
        return Ok(());
    }

    let state = if sample.available {
        style("available").green().bold()
    } else {
        style("unavailable").red().bold()
    };
    println!("{}: {}", style("Remote").bold(), state);
    if let Some(latency) = sample.latency_ms() {
        println!("  Latency: {}ms", latency);
    }
    if let Some(status) = sample.status {
        println!("  Status: {}", status);
    }
    if sample.deployment_unavailable {
        println!("  Remote functions are not deployed in this environment");
    }
    if let Some(error) = &sample.error {
        println!("  Error: {}", error);
    }
    println!("  Recommendation: {} processing", sample.recommendation());

    Ok(())
}

/// Show available presets
fn show_presets(config: &Config, detailed: bool) -> anyhow::Result<()> {
    println!("{}", style("Available Presets:").bold());
    println!();

    let mut presets = builtin_presets();
    let mut custom: Vec<_> = config
        .presets
        .iter()
        .filter(|(name, _)| !presets.iter().any(|(builtin, _)| builtin == *name))
        .map(|(name, options)| (name.clone(), options.clone()))
        .collect();
    custom.sort_by(|a, b| a.0.cmp(&b.0));
    presets.extend(custom);

    for (name, options) in &presets {
        if detailed {
            let size = match (options.width, options.height) {
                (Some(w), Some(h)) => format!("{}x{}", w, h),
                (Some(w), None) => format!("{}px wide", w),
                (None, Some(h)) => format!("{}px high", h),
                (None, None) => "original size".to_string(),
            };
            println!(
                "{}  {} ({}, {}% quality)",
                style(name).cyan().bold(),
                size,
                options.format.label(),
                options.quality.as_percent()
            );
        } else {
            println!("{}", style(name).cyan().bold());
        }
    }

    if !detailed {
        println!();
        println!("Use {} for detailed information", style("--detailed").dim());
    }
    Ok(())
}

/// Validate configuration file
fn validate_config_file(file_path: &Path) -> anyhow::Result<()> {
    let config = Config::from_file(file_path)?;
    config.validate()?;

    println!("{}: Configuration file is valid", style("Success").green().bold());
    println!("Presets: {}", config.presets.len());
    println!(
        "Remote: {}",
        config.remote.base_url.as_deref().unwrap_or("not configured")
    );
    println!("Routing mode: {:?}", config.routing.mode);

    Ok(())
}

/// Generate example configuration file
fn generate_example_config(mut output_path: PathBuf, use_yaml: bool) -> anyhow::Result<()> {
    if use_yaml {
        let is_yaml = matches!(
            output_path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        );
        if !is_yaml {
            output_path.set_extension("yaml");
        }
    }

    Config::example().to_file(&output_path)?;

    let format = if use_yaml { "YAML" } else { "TOML" };
    println!(
        "{}: Generated example {} configuration: {}",
        style("Success").green().bold(),
        format,
        output_path.display()
    );

    Ok(())
}

/// Print processing summary
fn print_summary(
    outcomes: &[Outcome],
    report: &AnalyticsReport,
    path_used: ExecutionPath,
    fallback_reason: Option<&str>,
) {
    println!();
    println!("{}", style("Processing Summary:").bold());
    println!("  {}: {}", style("Path").blue(), path_used);
    if let Some(reason) = fallback_reason {
        println!("  {}: {}", style("Fallback").yellow(), reason);
    }
    println!(
        "  {}: {} of {} ({}%)",
        style("Processed").green(),
        report.successful,
        outcomes.len(),
        report.success_rate
    );

    for outcome in outcomes {
        if let Outcome::Failure(failure) = outcome {
            println!(
                "  {}: {}: {}",
                style("Failed").red(),
                failure.item_name,
                failure.reason
            );
        }
    }

    if report.is_empty() {
        return;
    }

    println!(
        "  {}: {} → {} ({}, {})",
        style("Size").cyan(),
        report.original_total_display,
        report.processed_total_display,
        report.size_change_display,
        report.size_change_percentage_display
    );
    println!(
        "  {}: avg {:.1}% (best {:.1}%, worst {:.1}%), {}",
        style("Compression").cyan(),
        report.average_compression,
        report.best_compression,
        report.worst_compression,
        report.quality_impact
    );
    println!(
        "  {}: {} ({:.1} files/sec, {:.1} MP/s)",
        style("Duration").cyan(),
        report.processing_time_display,
        report.items_per_second,
        report.megapixel_throughput
    );
    println!("  {}: {}", style("Efficiency").cyan(), report.efficiency);
}
