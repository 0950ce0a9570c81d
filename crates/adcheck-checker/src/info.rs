//! The checker's self-description, returned by the `info` action.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exclusive upper bound for a declared timeout, in seconds.
pub const MAX_TIMEOUT_SECS: i64 = 60;

/// Parsed and validated `info` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContractInfo {
    /// Number of vulnerability slots; each round exercises `1..=count`.
    #[serde(rename = "vulns")]
    pub vulnerability_count: u32,

    /// Per-action timeout, `0 < timeout_secs < 60`.
    #[serde(rename = "timeout")]
    pub timeout_secs: u64,

    /// Whether `put` publishes attack data, in which case its public output
    /// must never contain the flag.
    #[serde(rename = "attack_data")]
    pub uses_attack_data: bool,
}

#[derive(Debug, Deserialize)]
struct RawContractInfo {
    vulns: u32,
    timeout: i64,
    attack_data: bool,
}

/// Reasons an `info` response is rejected.
#[derive(Debug, thiserror::Error)]
pub enum InfoError {
    #[error("invalid info output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid timeout: {0}")]
    Timeout(i64),
}

impl ContractInfo {
    /// Parse the JSON object printed by `info`.
    pub fn parse(stdout: &[u8]) -> Result<Self, InfoError> {
        let raw: RawContractInfo = serde_json::from_slice(stdout)?;

        if !(1..MAX_TIMEOUT_SECS).contains(&raw.timeout) {
            return Err(InfoError::Timeout(raw.timeout));
        }

        Ok(Self {
            vulnerability_count: raw.vulns,
            timeout_secs: raw.timeout as u64,
            uses_attack_data: raw.attack_data,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
