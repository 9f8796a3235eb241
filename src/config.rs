//! Engine configuration from the environment

use std::time::Duration;

/// Output format for `:graph`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphFormat {
    #[default]
    Json,
    Dot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How often the background sweeper drops expired sessions
    pub sweep_interval: Duration,
    /// Overrides per-state timeouts for session expiry
    pub session_ttl: Option<Duration>,
    pub graph_format: GraphFormat,
}

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            session_ttl: None,
            graph_format: GraphFormat::Json,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparsable values fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let secs = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let sweep_interval = secs("REFILL_SWEEP_INTERVAL_SECS")
            .filter(|s| *s > 0)
            .map_or(DEFAULT_SWEEP_INTERVAL, Duration::from_secs);

        let session_ttl = secs("REFILL_SESSION_TTL_SECS")
            .filter(|s| *s > 0)
            .map(Duration::from_secs);

        let graph_format = match lookup("REFILL_GRAPH_FORMAT").as_deref().map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("dot") => GraphFormat::Dot,
            _ => GraphFormat::Json,
        };

        Self {
            sweep_interval,
            session_ttl,
            graph_format,
        }
    }
}
