//! Runtime configuration, merged from environment variables over defaults.
//!
//! Mirrors the application's `Figment::new().merge(Env::raw())...extract()`
//! pattern: every field has a sane default so the engine runs unconfigured,
//! but every knob spec.md §5/§6 names as a tunable is overridable via
//! `SCHEDGRAPH_*` environment variables.

use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the upstream directory/timetable site.
    pub base_url: String,
    /// Directory the file-cache tier writes `prebuilt_*.json` into.
    pub cache_dir: String,
    /// Per-request timeout (§5: "10-15s total timeout").
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// Retry attempts for the index fetch (§4.2: "retry up to 3 attempts").
    pub index_retry_attempts: u32,
    /// Exponential back-off bounds for the index fetch.
    #[serde(with = "duration_secs")]
    pub index_retry_min: Duration,
    #[serde(with = "duration_secs")]
    pub index_retry_max: Duration,
    /// Retry attempts for a single per-target timetable fetch (§5).
    pub timetable_retry_attempts: u32,
    #[serde(with = "duration_secs")]
    pub timetable_retry_min: Duration,
    #[serde(with = "duration_secs")]
    pub timetable_retry_max: Duration,
    /// Bounded concurrency for bulk preload (§5, default 5).
    pub preload_max_concurrent: usize,
    /// Optional per-request pacing delay during bulk preload.
    #[serde(with = "duration_secs")]
    pub preload_delay: Duration,
    /// Default DFS depth bound for rotation/swap searches.
    pub default_max_depth: u32,
    /// Log level fallback when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://w3.example-school.edu/deanofstudies/course/".to_owned(),
            cache_dir: "cache".to_owned(),
            request_timeout: Duration::from_secs(12),
            index_retry_attempts: 3,
            index_retry_min: Duration::from_secs(4),
            index_retry_max: Duration::from_secs(10),
            timetable_retry_attempts: 3,
            timetable_retry_min: Duration::from_secs(1),
            timetable_retry_max: Duration::from_secs(5),
            preload_max_concurrent: 5,
            preload_delay: Duration::from_secs(0),
            default_max_depth: 3,
            log_level: "info".to_owned(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment (`SCHEDGRAPH_*`),
    /// falling back to [`Config::default`] for anything unset.
    pub fn load() -> anyhow::Result<Self> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("SCHEDGRAPH_"))
            .extract()?;
        Ok(config)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_retry_bounds() {
        let config = Config::default();
        assert_eq!(config.index_retry_attempts, 3);
        assert_eq!(config.index_retry_min, Duration::from_secs(4));
        assert_eq!(config.index_retry_max, Duration::from_secs(10));
        assert_eq!(config.preload_max_concurrent, 5);
    }

    #[test]
    fn env_override_takes_precedence() {
        // SAFETY: test runs single-threaded within this process's env access.
        unsafe {
            std::env::set_var("SCHEDGRAPH_PRELOAD_MAX_CONCURRENT", "9");
        }
        let config = Config::load().expect("config loads");
        assert_eq!(config.preload_max_concurrent, 9);
        unsafe {
            std::env::remove_var("SCHEDGRAPH_PRELOAD_MAX_CONCURRENT");
        }
    }
}
