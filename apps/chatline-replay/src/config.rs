//! Environment-backed configuration for `chatline-replay`.

use std::{env, path::PathBuf};

use chatline_core::{CurrentUser, DayBoundary, EngineConfig};
use thiserror::Error;

const DEFAULT_EVENT_BUFFER: usize = 256;
const DEFAULT_USER_UID: &str = "replay-user";
const DEFAULT_USER_NAME: &str = "Replay";

/// Runtime configuration used by the replay tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayConfig {
    /// JSON-lines event file. `None` reads stdin.
    pub input_path: Option<PathBuf>,
    /// Identity logged in before events are replayed.
    pub user: CurrentUser,
    /// Engine tuning forwarded to the runtime.
    pub engine: EngineConfig,
    /// Command and update channel capacity.
    pub event_buffer: usize,
}

impl ReplayConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let input_path = optional_trimmed_env("CHATLINE_REPLAY_INPUT", &mut lookup)
            .filter(|path| path != "-")
            .map(PathBuf::from);

        let user = CurrentUser {
            uid: optional_trimmed_env("CHATLINE_USER_UID", &mut lookup)
                .unwrap_or_else(|| DEFAULT_USER_UID.to_owned()),
            name: optional_trimmed_env("CHATLINE_USER_NAME", &mut lookup)
                .unwrap_or_else(|| DEFAULT_USER_NAME.to_owned()),
        };

        let mut engine = EngineConfig::default();
        if let Some(value) = optional_trimmed_env("CHATLINE_DAY_BOUNDARY", &mut lookup) {
            engine.day_boundary =
                value
                    .parse::<DayBoundary>()
                    .map_err(|err| ConfigError::InvalidValue {
                        key: "CHATLINE_DAY_BOUNDARY",
                        reason: err.to_string(),
                        value,
                    })?;
        }
        if let Some(cooldown) = parse_optional_u64("CHATLINE_PAGINATION_COOLDOWN_MS", &mut lookup)? {
            engine.pagination_cooldown_ms = cooldown;
        }

        let event_buffer = parse_optional_usize("CHATLINE_EVENT_BUFFER", &mut lookup)?
            .unwrap_or(DEFAULT_EVENT_BUFFER);
        if event_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CHATLINE_EVENT_BUFFER",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        Ok(Self {
            input_path,
            user,
            engine,
            event_buffer,
        })
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("invalid {key}='{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

fn optional_trimmed_env<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_optional_u64<F>(key: &'static str, lookup: &mut F) -> Result<Option<u64>, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(None);
    };
    value
        .parse::<u64>()
        .map(Some)
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

fn parse_optional_usize<F>(key: &'static str, lookup: &mut F) -> Result<Option<usize>, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(None);
    };
    value
        .parse::<usize>()
        .map(Some)
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatline_core::DEFAULT_PAGINATION_COOLDOWN_MS;
    use std::collections::HashMap;

    fn config_from_pairs(pairs: &[(&str, &str)]) -> Result<ReplayConfig, ConfigError> {
        let map = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect::<HashMap<_, _>>();
        ReplayConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_to_stdin_and_local_days() {
        let cfg = config_from_pairs(&[]).expect("empty config should parse");
        assert_eq!(cfg.input_path, None);
        assert_eq!(cfg.user.uid, DEFAULT_USER_UID);
        assert_eq!(cfg.engine.day_boundary, DayBoundary::Local);
        assert_eq!(
            cfg.engine.pagination_cooldown_ms,
            DEFAULT_PAGINATION_COOLDOWN_MS
        );
        assert_eq!(cfg.event_buffer, DEFAULT_EVENT_BUFFER);
    }

    #[test]
    fn parses_overrides() {
        let cfg = config_from_pairs(&[
            ("CHATLINE_REPLAY_INPUT", " events.jsonl "),
            ("CHATLINE_USER_UID", "u9"),
            ("CHATLINE_USER_NAME", "Nia"),
            ("CHATLINE_DAY_BOUNDARY", "+05:30"),
            ("CHATLINE_PAGINATION_COOLDOWN_MS", "100"),
            ("CHATLINE_EVENT_BUFFER", "16"),
        ])
        .expect("config should parse");

        assert_eq!(cfg.input_path, Some(PathBuf::from("events.jsonl")));
        assert_eq!(cfg.user.uid, "u9");
        assert_eq!(cfg.user.name, "Nia");
        assert_eq!(
            cfg.engine.day_boundary,
            "+05:30".parse::<DayBoundary>().expect("offset")
        );
        assert_eq!(cfg.engine.pagination_cooldown_ms, 100);
        assert_eq!(cfg.event_buffer, 16);
    }

    #[test]
    fn dash_input_means_stdin() {
        let cfg = config_from_pairs(&[("CHATLINE_REPLAY_INPUT", "-")]).expect("should parse");
        assert_eq!(cfg.input_path, None);
    }

    #[test]
    fn rejects_invalid_values() {
        let err = config_from_pairs(&[("CHATLINE_DAY_BOUNDARY", "mars")])
            .expect_err("unknown zone should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "CHATLINE_DAY_BOUNDARY",
                ..
            }
        ));

        let err = config_from_pairs(&[("CHATLINE_PAGINATION_COOLDOWN_MS", "soon")])
            .expect_err("non-numeric cooldown should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "CHATLINE_PAGINATION_COOLDOWN_MS",
                ..
            }
        ));

        let err = config_from_pairs(&[("CHATLINE_EVENT_BUFFER", "0")])
            .expect_err("zero buffer should fail");
        assert_eq!(
            err.to_string(),
            "invalid CHATLINE_EVENT_BUFFER='0': must be at least 1"
        );
    }
}
