//! Domain allowlist guard for browser targets.
//!
//! The guard never blocks anything by itself: a target outside the
//! allowlist is escalated to the orchestrator at destructive tier, so a
//! human or policy layer decides. What the guard does guarantee is that a
//! target it cannot parse is treated as disallowed: fail closed, never
//! fail open.

use url::Url;

/// Host allowlist built from configuration.
#[derive(Clone, Debug, Default)]
pub struct DomainGuard {
    allowed: Vec<String>,
}

impl DomainGuard {
    /// Build a guard from allowlist entries. Entries are lowercased and
    /// blank entries are dropped.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = entries
            .into_iter()
            .map(|entry| entry.as_ref().trim().to_ascii_lowercase())
            .filter(|entry| !entry.is_empty())
            .collect();
        Self { allowed }
    }

    /// Whether the allowlist has any entries at all.
    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Whether a target resource locator may be touched.
    ///
    /// The target's host must equal an allowlist entry exactly or be a
    /// subdomain of one. Unparseable targets and targets without a host
    /// component return `false`.
    pub fn is_allowed(&self, target: &str) -> bool {
        let url = match Url::parse(target) {
            Ok(url) => url,
            Err(_) => return false,
        };
        let host = match url.host_str() {
            Some(host) => host.to_ascii_lowercase(),
            None => return false,
        };

        self.allowed
            .iter()
            .any(|entry| host == *entry || host.ends_with(&format!(".{entry}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_host_allowed() {
        let guard = DomainGuard::new(["example.com"]);
        assert!(guard.is_allowed("https://example.com/x"));
        assert!(guard.is_allowed("https://example.com?x=1"));
    }

    #[test]
    fn test_subdomain_allowed() {
        let guard = DomainGuard::new(["example.com"]);
        assert!(guard.is_allowed("https://sub.example.com/x"));
        assert!(guard.is_allowed("https://deep.sub.example.com/"));
    }

    #[test]
    fn test_other_host_rejected() {
        let guard = DomainGuard::new(["example.com"]);
        assert!(!guard.is_allowed("https://evil.com"));
        assert!(!guard.is_allowed("https://notexample.com"));
        assert!(!guard.is_allowed("https://example.com.evil.com"));
    }

    #[test]
    fn test_unparseable_target_fails_closed() {
        let guard = DomainGuard::new(["example.com"]);
        assert!(!guard.is_allowed("not a url"));
        assert!(!guard.is_allowed(""));
        assert!(!guard.is_allowed("/relative/path"));
    }

    #[test]
    fn test_hostless_target_rejected() {
        let guard = DomainGuard::new(["example.com"]);
        assert!(!guard.is_allowed("file:///etc/passwd"));
        assert!(!guard.is_allowed("mailto:someone@example.com"));
    }

    #[test]
    fn test_entry_and_host_case_normalization() {
        let guard = DomainGuard::new(["Example.com", " docs.rs ", ""]);
        assert!(guard.is_allowed("https://EXAMPLE.com/"));
        assert!(guard.is_allowed("https://docs.rs/tokio"));
        assert!(!guard.is_allowed("https://crates.io"));
    }

    #[test]
    fn test_empty_allowlist_rejects_everything() {
        let guard = DomainGuard::default();
        assert!(guard.is_empty());
        assert!(!guard.is_allowed("https://example.com"));
    }
}
