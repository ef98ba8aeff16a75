pub mod config;
pub mod knob;
pub mod transmit;
pub mod wire;

use crate::config::KnobConfig;
use crate::knob::knob_handle::KnobHandle;
use color_eyre::Result;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = KnobConfig::load()?;
    setup_logging(config.log_enabled);

    info!("rotary knob starting");
    if let Some(path) = KnobConfig::file_location() {
        info!("Config file: {}", path.display());
    }
    info!("{}", config);

    // Installed before anything touches the GPIO lines so an early signal
    // still goes through the cleanup path
    let mut terminate = signal(SignalKind::terminate())?;
    let stop = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
            _ = terminate.recv() => info!("Received SIGTERM"),
        }
    };

    let knob = KnobHandle::spawn(&config).await?;
    knob.run_until(stop).await?;

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    Ok(())
}

// Errors and warnings always reach the log, chatter only with LOG_ENABLED=1
fn setup_logging(log_enabled: bool) {
    let level = if log_enabled { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}
