//! Tracing initialisation and invocation-scoped spans.
//!
//! Call [`init_tracing`] once at program start. Diagnostics are written to
//! stderr so they never interleave with the report on stdout.

use tracing::{info, warn, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

/// Initialise the global tracing subscriber.
///
/// * `json`: when `true`, emit newline-delimited JSON log lines.
/// * `level`: default verbosity when `RUST_LOG` is not set.
///
/// Only the first call takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()
            .ok();
    }
}

/// RAII guard that tags every log line of one launcher invocation.
pub struct InvocationSpan {
    invocation_id: Uuid,
    _span: tracing::span::EnteredSpan,
}

impl InvocationSpan {
    pub fn enter(command: &str) -> Self {
        let invocation_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "launchpad.invocation",
            invocation_id = %invocation_id,
            command = %command
        );
        Self {
            invocation_id,
            _span: span.entered(),
        }
    }

    pub fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }
}

/// Emit event: command started.
pub fn emit_command_started(command: &str) {
    info!(event = "command.started", command = %command);
}

/// Emit event: command finished with duration and outcome.
pub fn emit_command_finished(command: &str, duration_ms: u64, success: bool) {
    info!(
        event = "command.finished",
        command = %command,
        duration_ms = duration_ms,
        success = success,
    );
}

/// Emit event: command aborted by an error (warning level).
pub fn emit_command_error(command: &str, error: &dyn std::fmt::Display) {
    warn!(event = "command.error", command = %command, error = %error);
}
