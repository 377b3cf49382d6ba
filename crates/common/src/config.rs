use serde::{Deserialize, Serialize};

/// Cluster-wide tuning knobs, optionally loaded from a `titan.toml` (§4.5 of
/// SPEC_FULL.md). The Manager reads `scheduler_tick_seconds` and
/// `heartbeat_timeout_seconds`; a Worker reads `status_report_retry` from the
/// same file. Every field has a default matching the distilled spec's
/// literals, so a missing file — or a missing field within one — is not an
/// error.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Scheduler tick period in seconds (distilled spec default: 5).
    pub scheduler_tick_seconds: u64,
    /// Heartbeat timeout: a worker is healthy iff now - last_heartbeat is
    /// under this many seconds (distilled spec default: 30, invariant W2).
    pub heartbeat_timeout_seconds: u64,
    /// Status-report retry policy used by the Worker's reporting outbox.
    pub status_report_retry: RetryConfig,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            scheduler_tick_seconds: 5,
            heartbeat_timeout_seconds: 30,
            status_report_retry: RetryConfig::default(),
        }
    }
}

impl ClusterConfig {
    /// Load from a TOML file, falling back to defaults for any field the
    /// file omits. Returns `Ok(default)` if the file does not exist at all —
    /// a `titan.toml` is tuning, not a requirement.
    pub fn load(path: &std::path::Path) -> Result<Self, crate::TitanError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no cluster config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::TitanError::Config(format!("reading {}: {e}", path.display())))?;

        toml::from_str(&content)
            .map_err(|e| crate::TitanError::Config(format!("parsing {}: {e}", path.display())))
    }
}

/// Heartbeat interval for Workers (distilled spec default: 10 seconds,
/// fixed — not operator-tunable in the original design, so this lives as
/// a plain constant rather than a config field).
pub const HEARTBEAT_INTERVAL_SECONDS: u64 = 10;

/// Retry parameters for the Worker's bounded status-report outbox (§4.3's
/// adopted redesign flag: "fire-and-forget status reports"). Mirrors the
/// shape of a conventional exponential-backoff retry policy: bounded
/// attempts, capped backoff, optional jitter.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 2_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = ClusterConfig::load(std::path::Path::new("/nonexistent/titan.toml")).unwrap();
        assert_eq!(config.scheduler_tick_seconds, 5);
        assert_eq!(config.heartbeat_timeout_seconds, 30);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = std::env::temp_dir().join(format!("titan-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("titan.toml");
        std::fs::write(&path, "scheduler_tick_seconds = 2\n").unwrap();

        let config = ClusterConfig::load(&path).unwrap();
        assert_eq!(config.scheduler_tick_seconds, 2);
        assert_eq!(config.heartbeat_timeout_seconds, 30);

        std::fs::remove_dir_all(&dir).ok();
    }
}
