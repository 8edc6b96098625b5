//! Ledger configuration.
//!
//! Defaults impose no description limit and leave record logging to the sink.
//! Override via environment variables or a YAML document.

use serde::{Deserialize, Serialize};

/// Tunables for an [`EscrowLedger`](crate::EscrowLedger).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    /// Upper bound on a description's UTF-8 length. `None` means unbounded.
    pub max_description_bytes: Option<usize>,
    /// Also log each sealed record through `tracing`, alongside the sink.
    /// Off by default; leave it off when the sink is a `TracingSink`.
    pub trace_events: bool,
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `TLOCK_MAX_DESCRIPTION_BYTES` (default: unbounded)
    /// - `TLOCK_TRACE_EVENTS` (`true`/`false`/`1`/`0`, default: `false`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_MAX_DESCRIPTION_BYTES) {
            let max = raw
                .trim()
                .parse::<usize>()
                .map_err(|e| ConfigError::InvalidValue {
                    var: ENV_MAX_DESCRIPTION_BYTES.to_string(),
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
            config.max_description_bytes = Some(max);
        }

        if let Some(raw) = lookup(ENV_TRACE_EVENTS) {
            config.trace_events = parse_flag(&raw).ok_or_else(|| ConfigError::InvalidValue {
                var: ENV_TRACE_EVENTS.to_string(),
                value: raw.clone(),
                reason: "expected true, false, 1 or 0".to_string(),
            })?;
        }

        Ok(config)
    }

    /// Parse configuration from YAML. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

const ENV_MAX_DESCRIPTION_BYTES: &str = "TLOCK_MAX_DESCRIPTION_BYTES";
const ENV_TRACE_EVENTS: &str = "TLOCK_TRACE_EVENTS";

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        var: String,
        value: String,
        reason: String,
    },
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
