//! Browser automation plugin worker.
//!
//! Reads orchestrator events on stdin, writes directives on stdout.
//! Diagnostics go to stderr; stdout is reserved for the protocol.
//!
//! # Environment Variables
//!
//! - `BROWSER_ENGINE_URL` — automation endpoint (default: http://127.0.0.1:3900)
//! - `BROWSER_ALLOWED_DOMAINS` — comma-separated host allowlist (default: empty)
//! - `LEGATE_PROJECT` — project scope for requests (default: default)
//! - `LEGATE_IDLE_TIMEOUT_SECS` — session idle window (default: 300)
//! - `RUST_LOG` — tracing filter (default: info)

use std::sync::Arc;

use legate::browser::{BrowserDispatcher, RestBrowserEngine};
use legate::config::{BrowserConfig, RuntimeConfig};
use legate::guard::DomainGuard;
use legate::transport;
use legate::Dispatcher;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let runtime = RuntimeConfig::from_env();
    let browser = BrowserConfig::from_env();
    tracing::info!(
        version = legate::VERSION,
        engine = %browser.engine_url,
        "browser plugin starting"
    );

    let guard = DomainGuard::new(&browser.allowed_domains);
    if guard.is_empty() {
        tracing::warn!("domain allowlist is empty, every target will escalate");
    }

    let engine = Arc::new(RestBrowserEngine::new(browser.engine_url));
    let mut dispatcher =
        BrowserDispatcher::new(engine, guard, runtime.idle_timeout, runtime.project);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    tokio::select! {
        result = transport::run(&mut dispatcher, stdin, stdout) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, exiting");
        }
    }

    // Covers the interrupt path; after a clean EOF this is a no-op.
    dispatcher.shutdown().await;
    Ok(())
}
