mod dashboard;
mod logging;
mod monitor;
mod summary;

use std::io::{self, stdout, Stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{cursor, execute, terminal};
use fluidvid::{
    build_queue, error::ensure_input_exists, hardware, prompt, Config, EventLog, FfmpegExecutor,
    JobRunner, LogTail, PreflightError, ProgressState, QueueSpec, Shutdown, APP_NAME, VERSION,
};
use log::{info, warn};
use ratatui::{backend::CrosstermBackend, Terminal};
use crate::dashboard::Header;
use crate::monitor::Monitor;

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG: &str = "config.json";

/// Batch-transcode one video into several heights as MP4 and WebM, with posters
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Source video; prompted for when omitted
    input: Option<PathBuf>,

    /// Output directory, overrides `output_dir` from the config
    output_dir: Option<PathBuf>,

    /// Path to configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Kill a job that runs longer than this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = Args::parse();

    if args.input.is_none() {
        prompt_for_paths(&mut args)?;
    }
    let input = args.input.clone().context("No input file given")?;

    let default_config_path = PathBuf::from(DEFAULT_CONFIG);
    let config_path = match args.config.as_deref() {
        Some(path) => Some(path),
        None if default_config_path.exists() => Some(default_config_path.as_path()),
        None => None,
    };
    let mut cfg = Config::load_config(config_path).context("Failed to load configuration")?;
    if let Some(dir) = args.output_dir.take() {
        cfg.output_dir = dir;
    }
    if args.timeout.is_some() {
        cfg.job_timeout_secs = args.timeout;
    }
    cfg.validate()?;

    ensure_input_exists(&input)?;

    std::fs::create_dir_all(&cfg.output_dir)
        .with_context(|| format!("Failed to create output directory: {}", cfg.output_dir.display()))?;
    cfg.output_dir = cfg
        .output_dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve output directory: {}", cfg.output_dir.display()))?;

    let event_log = EventLog::open(&cfg.log_path())?;
    logging::init(event_log.clone(), args.verbose)?;

    let input_name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| input.display().to_string());

    info!("{} v{} starting", APP_NAME, VERSION);
    info!("Input: {}", input.display());
    info!("Output directory: {}", cfg.output_dir.display());
    info!("Sizes: {:?}", cfg.sizes);

    set_title(&format!("{} v{} - {}", APP_NAME, VERSION, input_name));

    let gpus = hardware::detect_accelerators().await;
    let selected = {
        let stdin = io::stdin();
        hardware::select_accelerator(&gpus, &mut stdin.lock(), &mut stdout())?
    };
    let hardware_text = hardware::hardware_summary(selected.as_ref());
    let profiles = hardware::resolve_encoder_profiles(selected.as_ref());
    info!("Hardware: {}", hardware_text);
    info!("MP4 encoder: {} ({})", profiles.mp4.encoder, profiles.mp4.description);
    info!("WebM encoder: {} ({})", profiles.webm.encoder, profiles.webm.description);

    let queue = build_queue(
        &QueueSpec {
            input: &input,
            output_dir: &cfg.output_dir,
            sizes: &cfg.sizes,
        },
        &profiles,
    );
    let progress = ProgressState::new(queue.len());

    let header = Header {
        title: format!(
            "{} v{} - Optimising {} to {}",
            APP_NAME,
            VERSION,
            input_name,
            cfg.output_dir.display()
        ),
        hardware: hardware_text,
    };

    if !args.yes {
        println!("{}\n{}\n", header.title, header.hardware);
        let question = format!("Proceed with optimising {} to {}?", input_name, cfg.output_dir.display());
        let stdin = io::stdin();
        if !prompt::confirm(&question, &mut stdin.lock(), &mut stdout())? {
            warn!("Conversion aborted by user");
            return Err(PreflightError::Declined.into());
        }
    }
    info!("Queued {} jobs", queue.len());

    let screen = ScreenGuard::enter()?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout())).context("Failed to create terminal")?;

    let (shutdown, listener) = Shutdown::new();
    let monitor = Monitor::new(
        terminal,
        header,
        Arc::clone(&progress),
        LogTail::from_offset(event_log.path(), event_log.start_offset()),
        cfg.refresh_hz,
    );
    let monitor_handle = tokio::spawn(monitor.run(listener));

    let runner = JobRunner::new(
        FfmpegExecutor::new(cfg.job_timeout_secs.map(Duration::from_secs)),
        cfg.ffmpeg_path.clone(),
        cfg.thumbnail_at.clone(),
        Arc::clone(&progress),
        event_log.clone(),
    );
    let report = runner.run(&queue).await;

    // drain, signal, final render, join, restore
    shutdown.signal();
    let monitor_result = monitor_handle.await;
    drop(screen);

    match monitor_result {
        Ok(Ok(exit)) => info!("Dashboard stopped after {} frames", exit.frames),
        Ok(Err(e)) => warn!("Dashboard failed: {:#}", e),
        Err(e) => warn!("Dashboard task panicked: {}", e),
    }
    info!(
        "Run finished: {} succeeded, {} failed",
        report.succeeded,
        report.failed.len()
    );

    summary::print(&report, &queue, &cfg.output_dir, event_log.path());
    Ok(())
}

/// Ask for input file and output directory when none were given
fn prompt_for_paths(args: &mut Args) -> Result<()> {
    println!("No parameters supplied. Please provide the input file and output directory.");
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = stdout();

    let path = prompt::ask("Enter input file path", None, &mut input, &mut out)?;
    let dir = prompt::ask(
        "Enter output directory (press Enter to keep the configured one)",
        None,
        &mut input,
        &mut out,
    )?;

    args.input = Some(PathBuf::from(path));
    if args.output_dir.is_none() && !dir.is_empty() {
        args.output_dir = Some(PathBuf::from(dir));
    }
    Ok(())
}

fn set_title(title: &str) {
    // cosmetic; some terminals reject it
    let mut out = stdout();
    if let Err(e) = execute!(out, terminal::SetTitle(title)) {
        warn!("Could not set terminal title: {}", e);
    }
}

/// Alternate screen with a hidden cursor for as long as it lives
struct ScreenGuard {
    out: Stdout,
}

impl ScreenGuard {
    fn enter() -> Result<Self> {
        let mut out = stdout();
        execute!(out, terminal::EnterAlternateScreen, cursor::Hide)
            .context("Failed to enter alternate screen")?;
        Ok(Self { out })
    }
}

impl Drop for ScreenGuard {
    fn drop(&mut self) {
        let _ = execute!(self.out, terminal::LeaveAlternateScreen, cursor::Show);
    }
}
