//! # legate
//!
//! Out-of-process capability plugin workers for a task orchestrator.
//!
//! A worker reads one JSON event per line on stdin and writes one JSON
//! directive per line on stdout. It never acts on its own authority:
//! side-effecting work is proposed as a capability request with a risk
//! tier, and executed only after the orchestrator sends the matching
//! approval event. Two runtimes ship in this crate: mail triage
//! (`mail-plugin`) and browser automation (`browser-plugin`).

pub mod browser;
pub mod checkpoint;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod mail;
pub mod protocol;
pub mod risk;
pub mod rules;
pub mod session;
pub mod transport;

pub use dispatch::Dispatcher;
pub use error::{PluginError, PluginResult};
pub use protocol::{EventEnvelope, PluginDirective, RiskTier};

/// Crate version, stamped into logs at startup.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
