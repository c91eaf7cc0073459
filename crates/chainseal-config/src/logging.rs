//! Structured logging utilities for chainseal components.
//!
//! Library code logs through these macros so every event carries a
//! `component` field; the CLI decides what reaches the terminal.
//!
//! # Usage
//!
//! ```ignore
//! use chainseal_config::log_update_info;
//!
//! log_update_info!("installer rewritten", bytes = 412);
//! ```

/// Component identifiers for log filtering
pub struct Component;

impl Component {
    pub const BACKUP: &'static str = "BACKUP";
    pub const UPDATE: &'static str = "UPDATE";
    pub const VERIFY: &'static str = "VERIFY";
    pub const PIPELINE: &'static str = "PIPELINE";
    pub const CLI: &'static str = "CLI";
}

/// Log levels for runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

// === BACKUP logging macros ===

#[macro_export]
macro_rules! log_backup_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "BACKUP", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_backup_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "BACKUP", $($key = $value,)* $msg)
    };
}

// === UPDATE logging macros ===

#[macro_export]
macro_rules! log_update_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "UPDATE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_update_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "UPDATE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_update_error {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::error!(component = "UPDATE", $($key = $value,)* $msg)
    };
}

// === VERIFY logging macros ===

#[macro_export]
macro_rules! log_verify_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "VERIFY", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_verify_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "VERIFY", $($key = $value,)* $msg)
    };
}

// === PIPELINE logging macros ===

#[macro_export]
macro_rules! log_pipeline_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "PIPELINE", $($key = $value,)* $msg)
    };
}

// === CLI logging macros ===

#[macro_export]
macro_rules! log_cli_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "CLI", $($key = $value,)* $msg)
    };
}

/// Initialize logging. Call this once at application startup.
///
/// `CHAINSEAL_LOG` wins over `RUST_LOG`; `level` applies when neither is set.
pub fn init_logging(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_env("CHAINSEAL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level.directive()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_constants() {
        assert_eq!(Component::BACKUP, "BACKUP");
        assert_eq!(Component::UPDATE, "UPDATE");
        assert_eq!(Component::VERIFY, "VERIFY");
    }

    #[test]
    fn test_level_directives() {
        assert_eq!(LogLevel::Warn.directive(), "warn");
        assert_eq!(LogLevel::Trace.directive(), "trace");
    }

    #[test]
    fn test_macros_expand() {
        // No subscriber installed: events are dropped, but the macros must
        // accept literal-only and key/value forms.
        log_update_info!("plain");
        log_verify_debug!("with fields", link = 1, ok = true);
        log_backup_warn!("display field", path = tracing::field::display("x"));
    }
}
