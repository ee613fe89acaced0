use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fifteen minutes, enough for a cold Windows boot.
const DEFAULT_TIMEOUT_SECS: u64 = 900;

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

// ── Requests ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StartMachineRequest {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub location_id: Option<String>,
}

impl StartMachineRequest {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct StopMachineRequest {
    pub address: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct StartFleetRequest {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// ── Responses ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct StopMachineResponse {
    pub address: String,
    pub stopped: bool,
}

#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub provider: String,
    pub valid: bool,
}
