//! Threshold alarm engine for streaming message pipelines
//!
//! Each inbound message carries one scalar observation. The engine compares
//! it against an alarm threshold and a reset threshold and emits a single
//! notification per alarm episode, optionally after a debounce window and
//! with periodic re-notification until the reset condition is seen.
//!
//! Sends decided by the background re-evaluation task leave the engine on
//! the next message tagged with the `ping` metadata key (see
//! [`Message::ping`] and [`pipeline::PingGenerator`]).
//!
//! # Examples
//!
//! ```rust
//! use serde_json::json;
//! use threshold_alarm::{AlarmConfig, AlarmEngine, Message, Outcome};
//!
//! let config = AlarmConfig::from_yaml(r#"
//! json: sensor.temp
//! value: 80
//! reset: 60
//! alarmText: Overheat
//! addValue: true
//! "#)?;
//! let engine = AlarmEngine::new(&config)?;
//!
//! let outcome = engine.process(Message::new(json!({"sensor": {"temp": 85}})))?;
//! match outcome {
//!     Outcome::Emit(alarm) => assert_eq!(alarm.payload["msg"], "Overheat, value: 85"),
//!     other => panic!("unexpected {:?}", other),
//! }
//! # Ok::<(), threshold_alarm::AlarmError>(())
//! ```

// ============================================================================
// CORE MODULES
// ============================================================================

/// Crate error type
pub mod error;

/// Scalar observations and payload extraction
pub mod value;

/// Duration literal parsing
pub mod duration;

/// Operators and trigger/reset conditions
pub mod condition;

/// YAML/JSON configuration
pub mod config;

/// Message envelope and processing outcomes
pub mod message;

/// Alarm state record
pub mod state;

/// Cancellable periodic tasks
pub mod scheduler;

/// Alarm message rendering
pub mod builder;

/// The alarm engine
pub mod engine;

/// Stand-alone NDJSON host
pub mod pipeline;

// ============================================================================
// PUBLIC API EXPORTS
// ============================================================================

pub use condition::{evaluate, Checks, Conditions, Operator};
pub use config::{AlarmConfig, AlarmSettings, HostConfig};
pub use duration::{format_duration, parse_duration};
pub use engine::{AlarmEngine, AlarmStats};
pub use error::{AlarmError, Result};
pub use message::{DropReason, Message, Outcome, PING_META_KEY};
pub use pipeline::{Pipeline, PingGenerator, RunSummary};
pub use state::AlarmStatus;
pub use value::{extract, Scalar};

// ============================================================================
// VERSION INFORMATION
// ============================================================================

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build information stamped by build.rs
pub mod build_info {
    /// Git commit hash, `"unknown"` outside a checkout
    pub const GIT_HASH: &str = env!("ALARM_GIT_HASH");

    /// Build timestamp (RFC 3339)
    pub const BUILD_TIMESTAMP: &str = env!("ALARM_BUILD_TIMESTAMP");

    /// Rust version used for compilation
    pub const RUSTC_VERSION: &str = env!("ALARM_RUST_VERSION");

    /// Target triple
    pub const TARGET: &str = env!("ALARM_TARGET");

    /// Build profile (debug/release)
    pub const PROFILE: &str = env!("ALARM_PROFILE");

    /// One-line summary for `--version` style output
    pub fn summary() -> String {
        format!(
            "{} ({} {}, {}, built {})",
            super::VERSION,
            GIT_HASH,
            PROFILE,
            TARGET,
            BUILD_TIMESTAMP
        )
    }
}

// ============================================================================
// INITIALIZATION
// ============================================================================

/// Default log directive when `RUST_LOG` is unset
pub const DEFAULT_LOG_DIRECTIVE: &str = "threshold_alarm=info";

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins over `directive`; `None` falls back to
/// [`DEFAULT_LOG_DIRECTIVE`]. Calling it again is harmless.
pub fn init(directive: Option<&str>) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive.unwrap_or(DEFAULT_LOG_DIRECTIVE)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr));

    if subscriber.try_init().is_err() {
        // Already initialized
        return;
    }

    tracing::debug!("threshold-alarm {} logging initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice() {
        init(Some("threshold_alarm=debug"));
        init(None);
    }

    #[test]
    fn test_build_info() {
        assert!(!build_info::TARGET.is_empty());
        assert!(build_info::summary().starts_with(VERSION));
    }
}
