/* iptsd: userspace driver that reads IPTS heatmap reports from a hidraw device (or replays a
 * captured transport log) and feeds decoded multi-touch contacts to a sink. */
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use iptsd::pipeline::Pipeline;
use iptsd::sink::LoggingSink;
use iptsd::source::ReplayFileSource;

/// iptsd — Intel Precise Touch & Stylus heatmap-to-multitouch driver.
#[derive(Parser)]
#[command(name = "iptsd", version, about)]
struct Cli {
    /// hidraw character device to open. Ignored if `--replay` is given.
    #[arg(long, default_value = "/dev/hidraw0")]
    device: PathBuf,

    /// Replay a captured transport-buffer file instead of a live device.
    #[arg(long, conflicts_with = "device")]
    replay: Option<PathBuf>,

    /// Overrides IPTSD_LOG/RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,

    /// Device name registered with the virtual multi-touch sink (uhid feature only).
    #[arg(long, default_value = "iptsd touch")]
    uhid_name: String,
}

fn init_logging(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_env("IPTSD_LOG")
            .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
            .unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn install_shutdown_handler() -> Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .context("failed to install Ctrl-C handler")?;
    Ok(shutdown)
}

fn run(cli: &Cli) -> Result<()> {
    let shutdown = install_shutdown_handler()?;

    #[cfg(feature = "uhid")]
    let sink_result = iptsd::sink::uhid::UhidSink::new(&cli.uhid_name);
    #[cfg(feature = "uhid")]
    let sink = sink_result.map_err(|e| iptsd::PipelineError::SinkSetupFailed(Box::new(e)))?;
    #[cfg(not(feature = "uhid"))]
    let sink = LoggingSink::new();
    #[cfg(not(feature = "uhid"))]
    tracing::warn!("built without the uhid feature; contacts will be logged, not injected into any input subsystem");

    if let Some(path) = &cli.replay {
        let source = ReplayFileSource::open(path).with_context(|| format!("opening replay file {}", path.display()))?;
        let mut pipeline = Pipeline::new(source, sink);
        pipeline
            .run(&shutdown, |stylus| {
                tracing::trace!(elements = stylus.elements, "stylus sub-record");
            })
            .context("pipeline aborted")?;
        return Ok(());
    }

    #[cfg(feature = "hidraw")]
    {
        let source = iptsd::source::hidraw::HidrawSource::open(&cli.device)
            .with_context(|| format!("opening hidraw device {}", cli.device.display()))?;
        let mut pipeline = Pipeline::new(source, sink);
        pipeline
            .run(&shutdown, |stylus| {
                tracing::trace!(elements = stylus.elements, "stylus sub-record");
            })
            .context("pipeline aborted")?;
        Ok(())
    }

    #[cfg(not(feature = "hidraw"))]
    {
        anyhow::bail!("built without the hidraw feature; pass --replay instead")
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());
    run(&cli)
}
