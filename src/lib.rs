pub mod checklist;
pub mod clock;
pub mod db;
pub mod errors;
pub mod models;
pub mod notifications;
pub mod reconstruct;
pub mod recorder;
pub mod scheduler;
pub mod sweeper;
pub mod window;

pub use crate::checklist::ChecklistCore;
pub use crate::errors::{AppError, AppResult};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

pub const DATA_DIR_ENV: &str = "CHECKLIST_DATA_DIR";

pub fn data_dir_from_env() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// Opens the store under `app_data_dir` and runs the closed-card sweeper
/// until Ctrl-C.
pub async fn serve(app_data_dir: PathBuf) -> AppResult<()> {
    std::fs::create_dir_all(&app_data_dir)?;
    init_tracing(&app_data_dir).map_err(AppError::Io)?;

    let core: Arc<ChecklistCore> = ChecklistCore::new(app_data_dir.clone())?;
    let settings = core.get_settings()?;
    tracing::info!(
        data_dir = %app_data_dir.display(),
        interval_secs = settings.sweep_interval_seconds,
        lookback_secs = settings.sweep_lookback_seconds,
        utc_offset_minutes = settings.utc_offset_minutes,
        "checklist daemon starting"
    );
    core.start_sweeper();

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    core.stop_sweeper();
    Ok(())
}

fn init_tracing(app_data_dir: &Path) -> Result<(), String> {
    let log_dir = app_data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "checklist.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
