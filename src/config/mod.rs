//! Environment-driven configuration.
//!
//! Everything comes from the process environment with documented defaults.
//! Unset values fall back rather than fail; the one exception is the mail
//! provider token, which has no safe default and aborts startup when absent.
//!
//! | Variable                  | Default                          |
//! |---------------------------|----------------------------------|
//! | `LEGATE_PROJECT`          | `default`                        |
//! | `LEGATE_CHECKPOINT_DIR`   | `$HOME/.legate/checkpoints`      |
//! | `LEGATE_IDLE_TIMEOUT_SECS`| `300`                            |
//! | `MAIL_PLUGIN_ACCOUNT`     | `primary`                        |
//! | `MAIL_PLUGIN_RULES`       | `rules.yaml`                     |
//! | `MAIL_API_BASE`           | `http://127.0.0.1:8970`          |
//! | `MAIL_API_TOKEN`          | required, no default             |
//! | `BROWSER_ENGINE_URL`      | `http://127.0.0.1:3900`          |
//! | `BROWSER_ALLOWED_DOMAINS` | empty (everything escalates)     |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{PluginError, PluginResult};
use crate::protocol::DEFAULT_PROJECT;

/// Upper bound on messages pulled in one scan pass.
pub const SCAN_LIMIT: usize = 50;

const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAIL_API_BASE: &str = "http://127.0.0.1:8970";
const DEFAULT_BROWSER_ENGINE_URL: &str = "http://127.0.0.1:3900";

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Settings shared by every plugin binary.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Project scope stamped on outgoing capability requests.
    pub project: String,
    /// Directory for checkpoint cursors.
    pub checkpoint_dir: PathBuf,
    /// Idle window before the session handle is torn down.
    pub idle_timeout: Duration,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self {
            project: env_or("LEGATE_PROJECT", DEFAULT_PROJECT),
            checkpoint_dir: env::var("LEGATE_CHECKPOINT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_checkpoint_dir()),
            idle_timeout: parse_idle_timeout(env::var("LEGATE_IDLE_TIMEOUT_SECS").ok()),
        }
    }
}

/// Mail binary settings. `MAIL_API_TOKEN` is required; a worker without
/// credentials cannot do anything useful, so startup fails instead.
#[derive(Clone, Debug)]
pub struct MailConfig {
    pub account: String,
    pub rules_path: PathBuf,
    pub api_base: String,
    pub api_token: String,
}

impl MailConfig {
    pub fn from_env() -> PluginResult<Self> {
        let api_token = env::var("MAIL_API_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                PluginError::Config("MAIL_API_TOKEN is not set".to_string())
            })?;
        Ok(Self {
            account: env_or("MAIL_PLUGIN_ACCOUNT", "primary"),
            rules_path: PathBuf::from(env_or("MAIL_PLUGIN_RULES", "rules.yaml")),
            api_base: env_or("MAIL_API_BASE", DEFAULT_MAIL_API_BASE),
            api_token,
        })
    }
}

/// Browser binary settings.
#[derive(Clone, Debug)]
pub struct BrowserConfig {
    pub engine_url: String,
    /// Comma-separated allowlist; empty means every target escalates.
    pub allowed_domains: Vec<String>,
}

impl BrowserConfig {
    pub fn from_env() -> Self {
        Self {
            engine_url: env_or("BROWSER_ENGINE_URL", DEFAULT_BROWSER_ENGINE_URL),
            allowed_domains: parse_domain_list(env::var("BROWSER_ALLOWED_DOMAINS").ok()),
        }
    }
}

fn parse_idle_timeout(raw: Option<String>) -> Duration {
    let secs = raw
        .as_deref()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or_else(|| {
            if let Some(value) = raw.as_deref() {
                tracing::warn!(value, "invalid LEGATE_IDLE_TIMEOUT_SECS, using default");
            }
            DEFAULT_IDLE_TIMEOUT_SECS
        });
    Duration::from_secs(secs)
}

fn parse_domain_list(raw: Option<String>) -> Vec<String> {
    raw.map(|csv| {
        csv.split(',')
            .map(|entry| entry.trim().to_ascii_lowercase())
            .filter(|entry| !entry.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn default_checkpoint_dir() -> PathBuf {
    match env::var("HOME") {
        Ok(home) if !home.is_empty() => {
            PathBuf::from(home).join(".legate").join("checkpoints")
        }
        _ => env::temp_dir().join("legate-checkpoints"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_timeout_default() {
        assert_eq!(parse_idle_timeout(None), Duration::from_secs(300));
    }

    #[test]
    fn test_idle_timeout_parses_seconds() {
        assert_eq!(
            parse_idle_timeout(Some("42".to_string())),
            Duration::from_secs(42)
        );
    }

    #[test]
    fn test_idle_timeout_invalid_falls_back() {
        assert_eq!(
            parse_idle_timeout(Some("soon".to_string())),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_domain_list_parsing() {
        assert_eq!(
            parse_domain_list(Some(" Example.com, docs.example.com ,,".to_string())),
            vec!["example.com".to_string(), "docs.example.com".to_string()]
        );
        assert!(parse_domain_list(None).is_empty());
        assert!(parse_domain_list(Some(String::new())).is_empty());
    }
}
