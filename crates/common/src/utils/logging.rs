use std::io;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment switch selecting JSON output in [`init_logging_from_env`].
pub const LOG_JSON_ENV: &str = "SAFERICE_LOG_JSON";

/// Initialize tracing subscriber with sensible defaults and stderr writer.
/// - Respects `RUST_LOG` if set
/// - Falls back to `info,service=info`
/// - Writes to stderr so command output on stdout stays machine readable
pub fn init_logging_default() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,service=info"));
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_writer(io::stderr)
        .try_init();
}

/// Initialize tracing subscriber with JSON structured output.
/// - Respects `RUST_LOG` if set, defaults to `info`
/// - Dispatch spans under `service::dispatch` are raised to debug
pub fn init_logging_json() {
    // 可通过 RUST_LOG 覆盖，例如 RUST_LOG=info,service::dispatch=trace
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,service::dispatch=debug"));
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .json()
        .with_writer(io::stderr)
        .try_init();
}

/// Pick the JSON or compact format depending on `SAFERICE_LOG_JSON`.
pub fn init_logging_from_env() {
    if json_requested(std::env::var(LOG_JSON_ENV).ok().as_deref()) {
        init_logging_json();
    } else {
        init_logging_default();
    }
}

fn json_requested(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "json")
    )
}
