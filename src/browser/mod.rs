//! Browser automation plugin runtime.
//!
//! Actions run against a remote automation engine through a single lazily
//! opened session owned by the session manager. Every target URL is checked
//! against the domain allowlist before a capability request goes out;
//! out-of-allowlist targets still get requested, at the highest risk tier,
//! so the call stays with the orchestrator.

pub mod dispatcher;
pub mod engine;

pub use dispatcher::BrowserDispatcher;
pub use engine::{BrowserEngine, EngineSessionFactory, RestBrowserEngine, SessionId};
