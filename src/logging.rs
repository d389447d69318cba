//! Logging setup, powered by tracing-subscriber
//!
//! Filter directives come from `RUST_LOG`, then `TABLEGATE_LOG`, then `info`.
//! Output goes to stderr so stdout stays clean for JSON responses.

use tracing_subscriber::EnvFilter;

pub const ENV_LOG: &str = "TABLEGATE_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

/// Noisy transport crates capped below the gateway's own level
const QUIET_TARGETS: &[(&str, &str)] = &[("hyper", "warn"), ("hyper_util", "warn"), ("reqwest", "warn"), ("h2", "warn")];

/// Pick the directive string: first non-empty of `RUST_LOG`, `TABLEGATE_LOG`, default.
fn directive_from<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    [EnvFilter::DEFAULT_ENV, ENV_LOG]
        .iter()
        .filter_map(|key| lookup(*key))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string())
}

fn build_filter(directive: &str) -> EnvFilter {
    let mut directives = vec![directive.to_string()];
    for (target, level) in QUIET_TARGETS {
        directives.push(format!("{}={}", target, level));
    }
    let joined = directives.join(",");
    EnvFilter::try_new(&joined).unwrap_or_else(|e| {
        eprintln!("Invalid log filter '{}': {}; falling back to '{}'", directive, e, DEFAULT_DIRECTIVE);
        EnvFilter::new(DEFAULT_DIRECTIVE)
    })
}

/// Install the global subscriber. A second call is a no-op.
pub fn init() {
    let filter = build_filter(&directive_from(|key| std::env::var(key).ok()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
