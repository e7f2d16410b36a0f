//! Mail triage plugin runtime.
//!
//! The dispatcher proposes capability requests for scheduled mail tasks and,
//! once approved, executes them against a [`provider::MailProvider`]. The
//! composite triage task runs the rule engine over an inbox page inside one
//! approved scan envelope, escalating only the actions that need their own
//! authorization.

pub mod dispatcher;
pub mod provider;

pub use dispatcher::MailDispatcher;
pub use provider::{normalize, InboxPage, MailDraft, MailHeader, MailMessage, MailProvider, RestMailProvider};
