//! Tracing bootstrap for the replay tool.

use std::env;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,chatline_replay=debug,chatline_core=debug";
const FILTER_KEYS: [&str; 3] = ["RUST_LOG", "CHATLINE_REPLAY_LOG", "CHATLINE_LOG"];

/// Initialize the global tracing subscriber with severity gating from environment.
///
/// Precedence:
/// 1) `RUST_LOG`
/// 2) `CHATLINE_REPLAY_LOG`
/// 3) `CHATLINE_LOG`
/// 4) internal default filter
///
/// Output goes to stderr so stdout carries only the rendered timelines.
pub fn init() {
    let directives = filter_directives(|key| env::var(key).ok());
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::new(directives))
        .try_init();
}

/// First non-blank, parsable directive string in precedence order.
fn filter_directives<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    FILTER_KEYS
        .into_iter()
        .filter_map(lookup)
        .map(|value| value.trim().to_owned())
        .find(|value| !value.is_empty() && EnvFilter::try_new(value).is_ok())
        .unwrap_or_else(|| DEFAULT_FILTER.to_owned())
}
