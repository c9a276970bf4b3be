use std::time::Duration;

use crate::error::CoreError;

/// Session-wide constants for the sync engine.
///
/// All fields have defaults matching the annotation tool's reference setup;
/// override via environment variables with [`SyncConfig::from_env`].
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Fixed frame rate used to derive frame indices (default: `30`).
    pub fps: f64,
    /// Width of the canonical box coordinate space (default: `848`).
    pub reference_width: f64,
    /// Height of the canonical box coordinate space (default: `480`).
    pub reference_height: f64,
    /// Largest tolerated playhead gap between the streams (default: `0.05`s).
    pub drift_tolerance: f64,
    /// Upper bound on waiting for both streams to finish a seek (default: `1000`ms).
    pub seek_timeout: Duration,
    /// Whether the engine emits structured observability events (default: `false`).
    pub trace_events: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,
            reference_width: 848.0,
            reference_height: 480.0,
            drift_tolerance: 0.05,
            seek_timeout: Duration::from_millis(1000),
            trace_events: false,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default |
    /// |-----------------------------|---------|
    /// | `SYNC_FPS`                  | `30`    |
    /// | `SYNC_REFERENCE_WIDTH`      | `848`   |
    /// | `SYNC_REFERENCE_HEIGHT`     | `480`   |
    /// | `SYNC_DRIFT_TOLERANCE_SECS` | `0.05`  |
    /// | `SYNC_SEEK_TIMEOUT_MS`      | `1000`  |
    /// | `SYNC_TRACE_EVENTS`         | `false` |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Split out from [`from_env`](Self::from_env) so tests do not have to
    /// mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let fps = parse_positive(&lookup, "SYNC_FPS", defaults.fps)?;
        let reference_width =
            parse_positive(&lookup, "SYNC_REFERENCE_WIDTH", defaults.reference_width)?;
        let reference_height =
            parse_positive(&lookup, "SYNC_REFERENCE_HEIGHT", defaults.reference_height)?;
        let drift_tolerance =
            parse_positive(&lookup, "SYNC_DRIFT_TOLERANCE_SECS", defaults.drift_tolerance)?;

        let seek_timeout = match lookup("SYNC_SEEK_TIMEOUT_MS") {
            Some(raw) => {
                let ms: u64 = raw.trim().parse().map_err(|_| {
                    CoreError::Validation(format!(
                        "SYNC_SEEK_TIMEOUT_MS must be a valid u64, got '{raw}'"
                    ))
                })?;
                Duration::from_millis(ms)
            }
            None => defaults.seek_timeout,
        };

        let trace_events = match lookup("SYNC_TRACE_EVENTS") {
            Some(raw) => parse_flag(&raw).ok_or_else(|| {
                CoreError::Validation(format!(
                    "SYNC_TRACE_EVENTS must be true/false, got '{raw}'"
                ))
            })?,
            None => defaults.trace_events,
        };

        Ok(Self {
            fps,
            reference_width,
            reference_height,
            drift_tolerance,
            seek_timeout,
            trace_events,
        })
    }
}

fn parse_positive<F>(lookup: &F, key: &str, default: f64) -> Result<f64, CoreError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(CoreError::Validation(format!(
            "{key} must be a positive number, got '{raw}'"
        ))),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = SyncConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.fps, 30.0);
        assert_eq!(config.seek_timeout, Duration::from_millis(1000));
    }

    #[test]
    fn overrides_are_applied() {
        let config = SyncConfig::from_lookup(lookup_from(&[
            ("SYNC_FPS", "25"),
            ("SYNC_REFERENCE_WIDTH", "1280"),
            ("SYNC_REFERENCE_HEIGHT", "720"),
            ("SYNC_DRIFT_TOLERANCE_SECS", "0.1"),
            ("SYNC_SEEK_TIMEOUT_MS", "250"),
            ("SYNC_TRACE_EVENTS", "yes"),
        ]))
        .unwrap();
        assert_eq!(config.fps, 25.0);
        assert_eq!(config.reference_width, 1280.0);
        assert_eq!(config.reference_height, 720.0);
        assert_eq!(config.drift_tolerance, 0.1);
        assert_eq!(config.seek_timeout, Duration::from_millis(250));
        assert!(config.trace_events);
    }

    #[test]
    fn non_positive_fps_rejected() {
        let err = SyncConfig::from_lookup(lookup_from(&[("SYNC_FPS", "0")])).unwrap_err();
        assert!(err.to_string().contains("SYNC_FPS"));
    }

    #[test]
    fn garbage_timeout_rejected() {
        assert!(SyncConfig::from_lookup(lookup_from(&[("SYNC_SEEK_TIMEOUT_MS", "soon")])).is_err());
    }

    #[test]
    fn garbage_flag_rejected() {
        assert!(SyncConfig::from_lookup(lookup_from(&[("SYNC_TRACE_EVENTS", "maybe")])).is_err());
    }
}
