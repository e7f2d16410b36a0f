//! Mail triage plugin worker.
//!
//! Reads orchestrator events on stdin, writes directives on stdout.
//! Diagnostics go to stderr; stdout is reserved for the protocol.
//!
//! # Environment Variables
//!
//! - `MAIL_API_TOKEN` — mail bridge bearer token (required)
//! - `MAIL_API_BASE` — mail bridge base URL (default: http://127.0.0.1:8970)
//! - `MAIL_PLUGIN_ACCOUNT` — account identity (default: primary)
//! - `MAIL_PLUGIN_RULES` — triage rule file (default: rules.yaml)
//! - `LEGATE_PROJECT` — project scope for requests (default: default)
//! - `LEGATE_CHECKPOINT_DIR` — cursor directory (default: ~/.legate/checkpoints)
//! - `RUST_LOG` — tracing filter (default: info)

use anyhow::Context;

use legate::checkpoint::CheckpointStore;
use legate::config::{MailConfig, RuntimeConfig};
use legate::mail::{MailDispatcher, RestMailProvider};
use legate::rules::RuleSet;
use legate::transport;

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
    let mail = MailConfig::from_env().context("mail plugin configuration")?;
    tracing::info!(
        version = legate::VERSION,
        account = %mail.account,
        "mail plugin starting"
    );

    let rules = RuleSet::load_or_default(&mail.rules_path);
    let checkpoint = CheckpointStore::new(runtime.checkpoint_dir, "mail", &mail.account);
    let provider = RestMailProvider::new(mail.api_base, mail.api_token);
    let mut dispatcher =
        MailDispatcher::new(provider, rules, checkpoint, mail.account, runtime.project);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    tokio::select! {
        result = transport::run(&mut dispatcher, stdin, stdout) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, exiting");
        }
    }
    Ok(())
}
