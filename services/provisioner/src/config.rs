use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub cycle_interval: Duration,
    pub cycle_deadline: Option<Duration>,
    pub worker_classes_path: Option<PathBuf>,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let log_level = std::env::var("STRATUS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let cycle_interval = std::env::var("STRATUS_CYCLE_INTERVAL_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map(Duration::from_secs)
            .context("parsing STRATUS_CYCLE_INTERVAL_SECS")?;

        let cycle_deadline = match std::env::var("STRATUS_CYCLE_DEADLINE_SECS") {
            Ok(raw) => Some(
                raw.parse()
                    .map(Duration::from_secs)
                    .context("parsing STRATUS_CYCLE_DEADLINE_SECS")?,
            ),
            Err(_) => None,
        };

        let worker_classes_path = std::env::var("STRATUS_WORKER_CLASSES")
            .ok()
            .map(PathBuf::from);

        let dev_mode = std::env::var("STRATUS_DEV")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            log_level,
            cycle_interval,
            cycle_deadline,
            worker_classes_path,
            dev_mode,
        })
    }
}
