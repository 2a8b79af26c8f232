//! Logging setup and per-module switchable logging macros.
//!
//! Usage:
//! ```ignore
//! // In your module, define the flag first:
//! const ENABLE_LOGS: bool = true;
//!
//! // Then use the macros (they're exported at the crate root):
//! use crate::{log_info, log_warn, log_error};
//!
//! log_info!("This will log if ENABLE_LOGS is true");
//! ```

const DEBUG_ENV: &str = "SANDWATCH_DEBUG";

/// Installs `env_logger` reading `RUST_LOG`, defaulting to `info`
/// (`debug` when `SANDWATCH_DEBUG` is `1` or `true`). Safe to call twice.
pub fn init_logging() {
    let debug_mode = std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let default_level = if debug_mode {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let _ = env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .try_init();
}

/// Conditional info logging, gated on the caller's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Conditional warn logging, gated on the caller's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Conditional error logging, gated on the caller's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
