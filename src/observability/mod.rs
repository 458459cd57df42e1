use std::time::Instant;

use tracing_subscriber::EnvFilter;

use crate::protocol::canonical::Usage;

/// Map a config log level onto a tracing filter directive.
///
/// `DISABLED` yields `None`; `WARNING` and `CRITICAL` become `WARN` and
/// `ERROR`; other names pass through.
#[must_use]
pub fn tracing_directive(log_level: &str) -> Option<String> {
    let level = log_level.to_uppercase();
    match level.as_str() {
        "DISABLED" => None,
        "WARNING" => Some("WARN".to_string()),
        "CRITICAL" => Some("ERROR".to_string()),
        _ => Some(level),
    }
}

/// Initialize the tracing subscriber with the configured log level.
pub fn init_tracing(log_level: &str) {
    let Some(directive) = tracing_directive(log_level) else {
        return;
    };

    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("INFO"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Log usage and elapsed time for a finished completion.
///
/// Streaming requests never see usage, so it is reported as zeros there.
pub fn log_request_complete(
    model: &str,
    chat_id: &str,
    stream: bool,
    usage: Option<&Usage>,
    start_time: Instant,
) {
    let usage = usage.copied().unwrap_or_default();
    tracing::info!(
        model,
        chat_id,
        stream,
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        total_tokens = usage.total_tokens,
        duration_seconds = start_time.elapsed().as_secs_f64(),
        "request completed"
    );
}
