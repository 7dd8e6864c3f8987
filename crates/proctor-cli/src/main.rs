use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use proctor_core::ScrfdDetector;
use proctor_hw::Camera;

mod config;
mod display;
mod evidence;
mod font;
mod monitor;
mod overlay;
mod report;

use config::Config;
use display::{Display, DisplayError, HeadlessDisplay};
use evidence::EvidenceLog;
use monitor::SessionEnd;

#[cfg(feature = "preview")]
const WINDOW_TITLE: &str = "Exam Monitoring - Cheating Detection";

#[derive(Parser)]
#[command(name = "proctor", about = "Webcam exam proctoring monitor")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the webcam and record violations (default)
    Monitor,
    /// List V4L2 capture devices
    Devices {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    // stdout carries the session transcript; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Monitor) {
        Commands::Monitor => run_monitor(&Config::from_env()),
        Commands::Devices { json } => list_devices(json),
    }
}

fn run_monitor(config: &Config) -> Result<()> {
    tracing::info!(?config, "proctor starting");

    let evidence = EvidenceLog::create(&config.log_path, &config.screenshot_dir)?;
    let detector = ScrfdDetector::load(&config.scrfd_model_path())?;

    println!("{}", report::banner());

    // A camera that cannot be opened ends the session like a failed read.
    let camera = Camera::open(&config.camera_device).map_err(|e| e.to_string());
    let (outcome, counts) = {
        let source = match &camera {
            Ok(camera) => camera
                .stream()
                .map(|mut stream| {
                    stream.discard(config.warmup_frames);
                    stream
                })
                .map_err(|e| e.to_string()),
            Err(reason) => Err(reason.clone()),
        };
        monitor::run_session(source, detector, || open_display(config), evidence.clone())
    };
    // Stream and display are closed; release the device before the summary.
    drop(camera);

    match &outcome {
        Ok(SessionEnd::CaptureFailed(reason)) => println!("{}", report::capture_failed(reason)),
        Ok(SessionEnd::Quit) => tracing::info!("quit requested"),
        Err(e) => tracing::error!(error = %e, "session aborted"),
    }

    println!("{}", report::summary(&counts, &evidence));

    outcome?;
    Ok(())
}

#[cfg(feature = "preview")]
fn open_display(config: &Config) -> Result<Box<dyn Display>, DisplayError> {
    if config.headless {
        Ok(Box::new(HeadlessDisplay::new()?))
    } else {
        Ok(Box::new(display::WindowDisplay::open(WINDOW_TITLE)?))
    }
}

#[cfg(not(feature = "preview"))]
fn open_display(config: &Config) -> Result<Box<dyn Display>, DisplayError> {
    if !config.headless {
        tracing::debug!("built without the preview feature; running headless");
    }
    Ok(Box::new(HeadlessDisplay::new()?))
}

fn list_devices(json: bool) -> Result<()> {
    let devices = Camera::list_devices();

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No V4L2 capture devices found");
    }
    for device in &devices {
        println!(
            "{}  {} (driver: {}, bus: {})",
            device.path, device.name, device.driver, device.bus
        );
    }
    Ok(())
}
