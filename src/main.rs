use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use cosmic_detect::error::CameraError;
use cosmic_detect::{DetectConfig, DetectError, DetectionSession, ResultRecord};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "cosmic-detect")]
#[command(about = "Capture or pick an image, run object detection on it and fetch use cases")]
#[command(version)]
#[command(long_about = "Submits a single image, either read from disk or captured from a \
camera, to a remote object detection service and prints the normalized result. Detected \
objects can be enriched with use-case descriptions through additional lookups.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "cosmic-detect.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Use the synthetic camera instead of hardware
    #[arg(long)]
    mock_camera: bool,

    /// Fetch use cases for all detections with one batched lookup
    #[arg(long)]
    use_cases: bool,

    /// Fetch use cases with one lookup per detection, run concurrently
    #[arg(long, conflicts_with = "use_cases")]
    use_case_each: bool,

    /// Download the processed image into this directory
    #[arg(long, value_name = "DIR")]
    save_dir: Option<PathBuf>,

    /// Print the result record as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit an image file for detection
    Detect {
        /// Image to submit
        image: PathBuf,
    },
    /// Capture a still from the camera and submit it
    Camera {
        /// Capture attempts while the camera warms up
        #[arg(long, default_value_t = 10)]
        attempts: u32,
    },
    /// Query the detection service health endpoint
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting cosmic-detect v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match DetectConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }
    config.validate()?;

    let Some(command) = args.command.as_ref() else {
        eprintln!("No command given; try `cosmic-detect detect <IMAGE>` or `--help`");
        std::process::exit(2);
    };

    let session = DetectionSession::from_config(config, args.mock_camera).map_err(|e| {
        error!("Failed to create detection session: {}", e);
        e
    })?;

    match command {
        Command::Health => run_health(&session).await,
        Command::Detect { image } => {
            stage_file(&session, image).await?;
            run_submission(&session, &args).await
        }
        Command::Camera { attempts } => {
            stage_capture(&session, *attempts).await?;
            run_submission(&session, &args).await
        }
    }
}

async fn run_health(session: &DetectionSession) -> Result<()> {
    let health = session
        .service()
        .health()
        .await
        .context("Detection service is not reachable")?;

    println!("{}", serde_json::to_string_pretty(&health)?);
    Ok(())
}

async fn stage_file(session: &DetectionSession, path: &Path) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let mut controller = session.controller().lock().await;
    controller.open();
    controller.pick_file(name, Bytes::from(bytes))?;
    Ok(())
}

async fn stage_capture(session: &DetectionSession, attempts: u32) -> Result<()> {
    let frame_wait = session.config().camera.frame_wait();
    let mut controller = session.controller().lock().await;
    controller.open();
    controller.start_camera().await?;

    for attempt in 1..=attempts.max(1) {
        match controller.capture().await {
            Ok(image) => {
                info!("Captured {} bytes on attempt {}", image.len(), attempt);
                return Ok(());
            }
            Err(DetectError::Camera(CameraError::FrameNotReady { .. })) => {
                warn!("Camera frame not ready (attempt {}/{})", attempt, attempts);
                tokio::time::sleep(frame_wait).await;
            }
            Err(e) => {
                controller.close();
                return Err(e.into());
            }
        }
    }

    controller.close();
    anyhow::bail!("Camera produced no usable frame after {} attempts", attempts)
}

async fn run_submission(session: &DetectionSession, args: &Args) -> Result<()> {
    let record = match session.submit().await {
        Ok(record) => record,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Err(e.into());
        }
    };

    if args.use_cases {
        if let Err(e) = session.scheduler().enrich_all_by_id(record.id).await {
            warn!("{}", e.user_message());
        }
    } else if args.use_case_each {
        let lookups = (0..record.detections.len())
            .map(|index| session.scheduler().enrich_one_by_id(record.id, index));
        for outcome in join_all(lookups).await {
            if let Err(e) = outcome {
                warn!("{}", e.user_message());
            }
        }
    }

    // Re-read so merged use cases are included
    let record = session
        .store()
        .read()
        .await
        .get_by_id(record.id)
        .cloned()
        .unwrap_or(record);

    if let Some(dir) = &args.save_dir {
        save_processed_image(session, &record, dir).await?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_record(&record);
    }
    Ok(())
}

async fn save_processed_image(
    session: &DetectionSession,
    record: &ResultRecord,
    dir: &Path,
) -> Result<()> {
    let bytes = session
        .service()
        .fetch_image(&record.processed_handle)
        .await
        .context("Failed to download processed image")?;

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("detected_{}.jpg", record.id));
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Saved processed image to {}", path.display());
    Ok(())
}

fn print_record(record: &ResultRecord) {
    println!("Result {} ({})", record.id, record.timestamp);
    println!("  Image: {}", record.processed_handle);
    println!("  {}", record.description);
    println!(
        "  Objects: {} total, {} unique classes",
        record.summary.total_objects, record.summary.unique_classes
    );

    for (index, detection) in record.detections.iter().enumerate() {
        println!(
            "  [{}] {} {:.1}%",
            index,
            detection.class,
            detection.confidence * 100.0
        );
        if let (Some(w), Some(h)) = (detection.estimated_width_cm, detection.estimated_height_cm) {
            println!("      size ≈ {:.1} x {:.1} cm", w, h);
        }
        if let Some(uses) = &detection.uses {
            println!("      uses: {}", uses);
        }
    }

    if !record.detailed_analysis.is_empty() {
        println!();
        println!("{}", record.detailed_analysis);
    }
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cosmic_detect={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .boxed()
        }
    };

    let mut layers = vec![fmt_layer];
    let mut guard = None;
    if let Some(dir) = &args.log_dir {
        let appender = tracing_appender::rolling::daily(dir, "cosmic-detect.log");
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt::layer().with_writer(writer).with_ansi(false).boxed());
        guard = Some(worker_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# cosmic-detect configuration file");
    println!("# Every key is optional; environment variables such as");
    println!("# COSMIC_DETECT_SERVICE__BASE_URL override file values.");
    println!();
    print!("{}", DetectConfig::default().to_toml()?);
    Ok(())
}
