//! Structured logging for debugging swarm.
//!
//! Events are emitted with the `tracing` macros throughout the crate and
//! written to `~/.swarm/swarm.log` by a `tracing-subscriber` fmt layer.
//!
//! Log levels:
//! - ERROR: a batch could not complete (setup failure, aborted graph)
//! - WARN: a unit failed or a submission was rejected
//! - INFO: batch start and completion
//! - DEBUG: unit lifecycle, config loading, dependency waits
//!
//! Debug mode can be enabled with `--debug` flag or `SWARM_DEBUG=1` env var.
//! `RUST_LOG` overrides both.

use std::fs::File;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Environment variable enabling debug output.
pub const DEBUG_ENV: &str = "SWARM_DEBUG";

/// Initialize logging to ~/.swarm/swarm.log, at debug level when `debug` is
/// set or `SWARM_DEBUG` asks for it.
///
/// The log file is truncated on startup. Calling this more than once, or
/// without a usable home directory, leaves logging as it was.
pub fn init_with_debug(debug: bool) {
    let debug_enabled = debug || env_requests_debug(std::env::var(DEBUG_ENV).ok().as_deref());

    if Config::ensure_dirs().is_err() {
        return;
    }
    let Ok(path) = Config::log_path() else {
        return;
    };
    let Ok(file) = File::create(&path) else {
        return;
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug_enabled)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init();
}

fn env_requests_debug(value: Option<&str>) -> bool {
    value
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn default_directive(debug: bool) -> &'static str {
    if debug {
        "swarm=debug"
    } else {
        "swarm=info"
    }
}
