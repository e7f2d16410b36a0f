//! Event dispatch boundary shared by the plugin runtimes.

use async_trait::async_trait;

use crate::protocol::{EventEnvelope, PluginDirective};

/// Turns one inbound event into zero-or-more outbound directives.
///
/// Implementations are driven by the transport loop one event at a time,
/// in arrival order. Recognized events yield at least one directive;
/// failures are converted into `status: failed` task directives rather
/// than propagated, so the loop never dies on a bad event.
#[async_trait]
pub trait Dispatcher {
    async fn handle_event(&mut self, event: &EventEnvelope) -> Vec<PluginDirective>;

    /// Called once at end-of-input, before the transport loop returns.
    async fn shutdown(&mut self) {}
}
