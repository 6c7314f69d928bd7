//! `--config` file support

use anyhow::Context;
use lso_core::{EngineOptions, DEFAULT_TIME_SLICE};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Settings read from a TOML file
///
/// ```toml
/// time_slice_ms = 5
///
/// [engine]
/// gc_threshold = 8192
///
/// [engine.limits]
/// max_heap_bytes = 65536
/// max_instructions_per_quantum = 10000
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Engine limits and tuning
    pub engine: EngineOptions,
    /// Quantum length in milliseconds
    pub time_slice_ms: Option<u64>,
}

impl CliConfig {
    /// Read a config file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Quantum length, falling back to the engine default
    pub fn time_slice(&self) -> Duration {
        self.time_slice_ms
            .map_or(DEFAULT_TIME_SLICE, Duration::from_millis)
    }
}

/// Convert `--time-slice` seconds, clamping negatives and NaN to zero
pub fn slice_from_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        Duration::ZERO
    } else {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: CliConfig = toml::from_str(
            r#"
            time_slice_ms = 5

            [engine]
            gc_threshold = 8192

            [engine.limits]
            max_heap_bytes = 65536
            max_instructions_per_quantum = 10000
            "#,
        )
        .unwrap();

        assert_eq!(config.time_slice(), Duration::from_millis(5));
        assert_eq!(config.engine.gc_threshold, Some(8192));
        assert_eq!(config.engine.limits.max_heap_bytes, Some(65536));
        assert_eq!(config.engine.limits.max_instructions_per_quantum, Some(10000));
        assert_eq!(config.engine.limits.max_call_depth, 128);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: CliConfig = toml::from_str("").unwrap();
        assert_eq!(config.time_slice(), DEFAULT_TIME_SLICE);
        assert_eq!(config.engine, EngineOptions::default());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let config: CliConfig = toml::from_str("colour = \"blue\"").unwrap();
        assert_eq!(config.time_slice_ms, None);
    }

    #[test]
    fn test_slice_clamps_negative_to_zero() {
        assert_eq!(slice_from_secs(-1.0), Duration::ZERO);
        assert_eq!(slice_from_secs(f64::NAN), Duration::ZERO);
        assert_eq!(slice_from_secs(0.25), Duration::from_millis(250));
    }
}
