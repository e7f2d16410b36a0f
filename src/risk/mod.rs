//! Risk classification for capability identifiers.
//!
//! Pure and total: every identifier maps to a tier, with `Safe` as the
//! default for anything unrecognized. The two elevated sets are static
//! because a capability's tier describes what the capability can do; it
//! never depends on the arguments of a particular invocation.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use crate::protocol::RiskTier;

/// Reversible but consequential capabilities.
static SENSITIVE: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "mail.send",
        "mail.unsubscribe",
        "mail.trash",
        "browser.act",
    ])
});

/// Irreversible capabilities.
static DESTRUCTIVE: Lazy<HashSet<&'static str>> =
    Lazy::new(|| HashSet::from(["mail.delete.permanent"]));

/// Map a capability identifier to its risk tier.
///
/// Membership is tested destructive first so that an identifier listed in
/// both sets resolves to the most severe tier.
pub fn classify(capability_id: &str) -> RiskTier {
    if DESTRUCTIVE.contains(capability_id) {
        RiskTier::Destructive
    } else if SENSITIVE.contains(capability_id) {
        RiskTier::Sensitive
    } else {
        RiskTier::Safe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destructive_set() {
        for id in DESTRUCTIVE.iter() {
            assert_eq!(classify(id), RiskTier::Destructive, "{id}");
        }
    }

    #[test]
    fn test_sensitive_set() {
        for id in SENSITIVE.iter() {
            if DESTRUCTIVE.contains(id) {
                continue;
            }
            assert_eq!(classify(id), RiskTier::Sensitive, "{id}");
        }
    }

    #[test]
    fn test_everything_else_is_safe() {
        assert_eq!(classify("mail.inbox.list"), RiskTier::Safe);
        assert_eq!(classify("mail.label"), RiskTier::Safe);
        assert_eq!(classify("browser.observe"), RiskTier::Safe);
        assert_eq!(classify(""), RiskTier::Safe);
        assert_eq!(classify("never.seen.before"), RiskTier::Safe);
    }
}
