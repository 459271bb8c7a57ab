//! Configuration loading and representation.
//!
//! Everything comes from `STOCKROOM_*` environment variables. Unparseable
//! values are logged and replaced by the default; only an unusable bind
//! address is an error.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use stockroom_ai::DEFAULT_CV_BOUND;
pub use stockroom_observability::LogFormat;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_SHARED_SECRET: &str = "dev-secret";
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_NOTIFY_BUFFER: usize = 64;
pub const DEFAULT_WINDOW_MONTHS: usize = 6;
/// The rolling window never shrinks below this many months.
pub const MIN_WINDOW_MONTHS: usize = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Reservation engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Upper bound on waiting for every row lock of one submission.
    pub lock_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
        }
    }
}

impl EngineConfig {
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }
}

/// Trend & reorder predictor settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorConfig {
    pub window_months: usize,
    pub cv_bound: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            window_months: DEFAULT_WINDOW_MONTHS,
            cv_bound: DEFAULT_CV_BOUND,
        }
    }
}

impl PredictorConfig {
    /// Windows shorter than [`MIN_WINDOW_MONTHS`] are clamped up.
    pub fn with_window_months(mut self, months: usize) -> Self {
        self.window_months = months.max(MIN_WINDOW_MONTHS);
        self
    }

    pub fn with_cv_bound(mut self, cv_bound: f64) -> Self {
        self.cv_bound = cv_bound;
        self
    }
}

/// Notification fan-out settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyConfig {
    /// Per-subscriber queue depth before events are dropped for that subscriber.
    pub buffer: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            buffer: DEFAULT_NOTIFY_BUFFER,
        }
    }
}

impl NotifyConfig {
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }
}

/// Process configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub shared_secret: String,
    pub engine: EngineConfig,
    pub predictor: PredictorConfig,
    pub notify: NotifyConfig,
    pub seed_file: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            shared_secret: DEFAULT_SHARED_SECRET.to_string(),
            engine: EngineConfig::default(),
            predictor: PredictorConfig::default(),
            notify: NotifyConfig::default(),
            seed_file: None,
            log_format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Log format alone, read before tracing is installed so the rest of
    /// the loading can log. Silent; `from_lookup` reports bad values.
    pub fn log_format_from_env() -> LogFormat {
        Self::log_format_from_lookup(|key| std::env::var(key).ok())
    }

    pub fn log_format_from_lookup<F>(lookup: F) -> LogFormat
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup("STOCKROOM_LOG_FORMAT")
            .and_then(|raw| LogFormat::parse(&raw))
            .unwrap_or_default()
    }

    /// Build from an arbitrary variable source (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(raw) = lookup("STOCKROOM_BIND_ADDR") {
            cfg.bind_addr = raw.trim().parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                var: "STOCKROOM_BIND_ADDR",
                value: raw.clone(),
                reason: e.to_string(),
            })?;
        }

        match lookup("STOCKROOM_SHARED_SECRET").filter(|s| !s.trim().is_empty()) {
            Some(secret) => cfg.shared_secret = secret,
            None => warn!("STOCKROOM_SHARED_SECRET not set; using the development secret"),
        }

        if let Some(ms) = parsed::<u64>(&lookup, "STOCKROOM_LOCK_TIMEOUT_MS") {
            cfg.engine = cfg.engine.with_lock_timeout(Duration::from_millis(ms));
        }
        if let Some(buffer) = parsed::<usize>(&lookup, "STOCKROOM_NOTIFY_BUFFER") {
            cfg.notify = cfg.notify.with_buffer(buffer);
        }
        if let Some(months) = parsed::<usize>(&lookup, "STOCKROOM_TREND_WINDOW_MONTHS") {
            cfg.predictor = cfg.predictor.with_window_months(months);
        }
        if let Some(bound) = parsed::<f64>(&lookup, "STOCKROOM_CONFIDENCE_CV_BOUND") {
            if bound.is_finite() && bound > 0.0 {
                cfg.predictor = cfg.predictor.with_cv_bound(bound);
            } else {
                warn!(value = bound, "STOCKROOM_CONFIDENCE_CV_BOUND must be positive; using default");
            }
        }

        cfg.seed_file = lookup("STOCKROOM_SEED_FILE")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        if let Some(raw) = lookup("STOCKROOM_LOG_FORMAT") {
            cfg.log_format = LogFormat::parse(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "unknown STOCKROOM_LOG_FORMAT; using json");
                LogFormat::Json
            });
        }

        Ok(cfg)
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(var)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(var, value = %raw, error = %e, "ignoring invalid configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = from(&[]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(cfg.shared_secret, DEFAULT_SHARED_SECRET);
        assert_eq!(cfg.engine.lock_timeout, Duration::from_millis(2_000));
        assert_eq!(cfg.notify.buffer, 64);
        assert_eq!(cfg.predictor.window_months, 6);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert!(cfg.seed_file.is_none());
    }

    #[test]
    fn overrides_are_parsed_and_clamped() {
        let cfg = from(&[
            ("STOCKROOM_BIND_ADDR", "127.0.0.1:9000"),
            ("STOCKROOM_SHARED_SECRET", "s3cret"),
            ("STOCKROOM_LOCK_TIMEOUT_MS", "150"),
            ("STOCKROOM_TREND_WINDOW_MONTHS", "1"),
            ("STOCKROOM_CONFIDENCE_CV_BOUND", "0.25"),
            ("STOCKROOM_LOG_FORMAT", "pretty"),
            ("STOCKROOM_SEED_FILE", "/tmp/seed.json"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.shared_secret, "s3cret");
        assert_eq!(cfg.engine.lock_timeout, Duration::from_millis(150));
        assert_eq!(cfg.predictor.window_months, MIN_WINDOW_MONTHS);
        assert_eq!(cfg.predictor.cv_bound, 0.25);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.seed_file, Some(PathBuf::from("/tmp/seed.json")));
    }

    #[test]
    fn log_format_is_readable_on_its_own() {
        let lookup = |pairs: &'static [(&'static str, &'static str)]| {
            move |k: &str| pairs.iter().find(|(key, _)| *key == k).map(|(_, v)| v.to_string())
        };
        assert_eq!(AppConfig::log_format_from_lookup(lookup(&[])), LogFormat::Json);
        assert_eq!(
            AppConfig::log_format_from_lookup(lookup(&[("STOCKROOM_LOG_FORMAT", "Pretty")])),
            LogFormat::Pretty
        );
        assert_eq!(
            AppConfig::log_format_from_lookup(lookup(&[("STOCKROOM_LOG_FORMAT", "xml")])),
            LogFormat::Json
        );
    }

    #[test]
    fn garbage_numbers_fall_back_but_bad_bind_addr_fails() {
        let cfg = from(&[("STOCKROOM_NOTIFY_BUFFER", "lots")]).unwrap();
        assert_eq!(cfg.notify.buffer, DEFAULT_NOTIFY_BUFFER);

        let err = from(&[("STOCKROOM_BIND_ADDR", "nowhere")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "STOCKROOM_BIND_ADDR", .. }));
    }
}
