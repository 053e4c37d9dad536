//! Session configuration.
//!
//! Read from `config.json` in the app config directory (or an explicit
//! `--config` path), then overridden by `REACHD_*` environment variables.
//! Every field has a default, so an absent file is a valid configuration.

use std::path::Path;
use std::time::Duration;

use reachgrid::grid::DEFAULT_GRID_NUMBER;
use reachgrid::phase::PhaseTimings;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ReachError, Result};
use crate::paths::AppPaths;
use crate::service::PlannerParams;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Push-channel peer, `host:port`.
    pub peer_addr: String,
    /// Base URL of the game service.
    pub service_url: String,
    pub grid_number: u32,
    pub total_trials: usize,
    pub fixation_ms: u64,
    pub feedback_ms: u64,
    pub gamma: f64,
    pub theta: f64,
    pub request_timeout_ms: u64,
    /// Draw frames to the terminal.
    pub render: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            peer_addr: "127.0.0.1:3000".to_string(),
            service_url: "http://localhost:3000".to_string(),
            grid_number: DEFAULT_GRID_NUMBER,
            total_trials: 3,
            fixation_ms: 2000,
            feedback_ms: 1000,
            gamma: 0.9,
            theta: 0.1,
            request_timeout_ms: 5000,
            render: true,
        }
    }
}

impl SessionConfig {
    /// Load from `explicit` if given, otherwise from the default config file
    /// when it exists. Environment overrides are applied last.
    pub fn load(explicit: Option<&Path>, paths: &AppPaths) -> Result<Self> {
        let mut cfg = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = paths.config_file();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    info!("No config at {:?}; using defaults", path);
                    Self::default()
                }
            }
        };
        cfg.apply_overrides(|key| std::env::var(key).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ReachError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let cfg = serde_json::from_str(&text)
            .map_err(|e| ReachError::Config(format!("invalid {}: {}", path.display(), e)))?;
        info!("Loaded config from {:?}", path);
        Ok(cfg)
    }

    /// Apply `REACHD_*` overrides through `lookup`. Values that do not parse
    /// are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("REACHD_PEER_ADDR") {
            self.peer_addr = v;
        }
        if let Some(v) = lookup("REACHD_SERVICE_URL") {
            self.service_url = v;
        }
        if let Some(v) = lookup("REACHD_TOTAL_TRIALS") {
            match v.trim().parse() {
                Ok(n) => self.total_trials = n,
                Err(_) => warn!("Unknown REACHD_TOTAL_TRIALS value: {}", v),
            }
        }
        if let Some(v) = lookup("REACHD_GRID_NUMBER") {
            match v.trim().parse() {
                Ok(n) => self.grid_number = n,
                Err(_) => warn!("Unknown REACHD_GRID_NUMBER value: {}", v),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid_number == 0 {
            return Err(ReachError::Config("grid_number must be at least 1".into()));
        }
        if self.total_trials == 0 {
            return Err(ReachError::Config("total_trials must be at least 1".into()));
        }
        Ok(())
    }

    pub fn timings(&self) -> PhaseTimings {
        PhaseTimings {
            fixation: Duration::from_millis(self.fixation_ms),
            feedback: Duration::from_millis(self.feedback_ms),
        }
    }

    pub fn planner(&self) -> PlannerParams {
        PlannerParams {
            gamma: self.gamma,
            theta: self.theta,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
