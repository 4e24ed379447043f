//! Stealth tiers and request profile assembly.
//!
//! The profile selector turns an identity-pool pick into a complete,
//! attempt-ready [`RequestProfile`]: the user-agent, a header list whose
//! order is part of the fingerprint, and (at the top tier) a TLS identity
//! consistent with the spoofed browser.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::stealth::identity::{BrowserIdentity, IdentityPool};
use crate::stealth::tls::TlsIdentity;

/// Escalation level controlling how strongly a request mimics a browser.
///
/// Totally ordered; escalation only ever moves upward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum StealthTier {
    /// No evasion: fixed default identity, deterministic.
    #[default]
    Off,
    /// User-agent rotation only.
    Low,
    /// Randomized but mutually consistent browser header sets.
    Medium,
    /// Adds TLS client fingerprint impersonation.
    High,
}

impl StealthTier {
    /// All tiers in escalation order.
    pub const ALL: [StealthTier; 4] = [
        StealthTier::Off,
        StealthTier::Low,
        StealthTier::Medium,
        StealthTier::High,
    ];

    /// The next tier up, or `None` at the top.
    pub fn next(self) -> Option<StealthTier> {
        match self {
            StealthTier::Off => Some(StealthTier::Low),
            StealthTier::Low => Some(StealthTier::Medium),
            StealthTier::Medium => Some(StealthTier::High),
            StealthTier::High => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StealthTier::Off => "off",
            StealthTier::Low => "low",
            StealthTier::Medium => "medium",
            StealthTier::High => "high",
        }
    }
}

impl fmt::Display for StealthTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StealthTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(StealthTier::Off),
            "low" => Ok(StealthTier::Low),
            "medium" => Ok(StealthTier::Medium),
            "high" => Ok(StealthTier::High),
            other => Err(format!("unknown stealth tier '{other}'")),
        }
    }
}

/// Immutable, attempt-ready request shape.
///
/// Constructed fresh per attempt, never mutated afterwards. Header order is
/// preserved because the order itself is part of the client fingerprint.
#[derive(Debug, Clone)]
pub struct RequestProfile {
    pub tier: StealthTier,
    pub user_agent: String,
    headers: Vec<(String, String)>,
    pub tls_identity: Option<TlsIdentity>,
}

impl RequestProfile {
    /// Ordered header pairs, user-agent included.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Header names in send order.
    pub fn header_names(&self) -> impl Iterator<Item = &str> {
        self.headers.iter().map(|(name, _)| name.as_str())
    }

    /// Look up a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Plausible referers for the randomized medium-tier header set.
static REFERERS: &[&str] = &[
    "https://www.google.com/",
    "https://www.bing.com/",
    "https://duckduckgo.com/",
];

/// Builds a [`RequestProfile`] for a tier and attempt index.
///
/// Deterministic for a seeded identity pool: the pool drives identity
/// selection and the attempt index drives the remaining varied fields.
pub struct ProfileSelector {
    pool: Arc<IdentityPool>,
}

impl ProfileSelector {
    pub fn new(pool: Arc<IdentityPool>) -> Self {
        Self { pool }
    }

    /// Assemble the profile for one attempt. Infallible: [`StealthTier`] is a
    /// closed enum, so there is no out-of-range tier to reject.
    pub fn build_profile(&self, tier: StealthTier, attempt_index: usize) -> RequestProfile {
        let identity = self.pool.next_identity(tier);
        let mut headers = Vec::with_capacity(16);

        if tier >= StealthTier::Medium {
            // Chromium sends client hints ahead of the user-agent.
            if let Some(ref ch) = identity.sec_ch_ua {
                headers.push(("sec-ch-ua".into(), ch.clone()));
                headers.push(("sec-ch-ua-mobile".into(), "?0".into()));
                if let Some(ref platform) = identity.sec_ch_ua_platform {
                    headers.push(("sec-ch-ua-platform".into(), platform.clone()));
                }
            }
            headers.push(("Upgrade-Insecure-Requests".into(), "1".into()));
        }

        headers.push(("User-Agent".into(), identity.user_agent.clone()));
        headers.push(("Accept".into(), identity.accept.clone()));

        if tier >= StealthTier::Medium {
            headers.push(("Sec-Fetch-Site".into(), "cross-site".into()));
            headers.push(("Sec-Fetch-Mode".into(), "navigate".into()));
            headers.push(("Sec-Fetch-User".into(), "?1".into()));
            headers.push(("Sec-Fetch-Dest".into(), "document".into()));
            headers.push((
                "Referer".into(),
                REFERERS[attempt_index % REFERERS.len()].to_string(),
            ));
        }

        headers.push(("Accept-Encoding".into(), identity.accept_encoding.clone()));
        headers.push(("Accept-Language".into(), identity.accept_language.clone()));

        let tls_identity =
            (tier == StealthTier::High).then(|| TlsIdentity::for_family(identity.family));

        RequestProfile {
            tier,
            user_agent: identity.user_agent,
            headers,
            tls_identity,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn selector(seed: u64) -> ProfileSelector {
        ProfileSelector::new(Arc::new(IdentityPool::with_seed(seed)))
    }

    fn name_set(profile: &RequestProfile) -> HashSet<String> {
        profile
            .header_names()
            .map(|n| n.to_ascii_lowercase())
            .collect()
    }

    #[test]
    fn tier_ordering_is_total() {
        assert!(StealthTier::Off < StealthTier::Low);
        assert!(StealthTier::Low < StealthTier::Medium);
        assert!(StealthTier::Medium < StealthTier::High);
        assert_eq!(StealthTier::High.next(), None);
        assert_eq!(StealthTier::Off.next(), Some(StealthTier::Low));
    }

    #[test]
    fn tier_parses_from_str() {
        assert_eq!("HIGH".parse::<StealthTier>().unwrap(), StealthTier::High);
        assert!("max".parse::<StealthTier>().is_err());
    }

    #[test]
    fn off_profile_is_identical_across_calls() {
        let selector = selector(1);
        let a = selector.build_profile(StealthTier::Off, 0);
        let b = selector.build_profile(StealthTier::Off, 5);
        assert_eq!(a.user_agent, b.user_agent);
        assert_eq!(a.headers(), b.headers());
        assert!(a.tls_identity.is_none());
    }

    #[test]
    fn escalation_never_drops_headers() {
        let selector = selector(99);
        for pair in StealthTier::ALL.windows(2) {
            let lower = selector.build_profile(pair[0], 0);
            let higher = selector.build_profile(pair[1], 0);
            let lower_names = name_set(&lower);
            let higher_names = name_set(&higher);
            assert!(
                higher_names.is_superset(&lower_names),
                "{:?} -> {:?} dropped headers",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn high_tier_carries_matching_tls_identity() {
        let selector = selector(3);
        let profile = selector.build_profile(StealthTier::High, 0);
        let tls = profile.tls_identity.as_ref().expect("tls identity");
        assert!(!tls.cipher_suites.is_empty());
        // Chromium client hints imply a Chromium TLS identity.
        if profile.header("sec-ch-ua").is_some() {
            use crate::stealth::identity::BrowserFamily;
            assert!(matches!(
                tls.family,
                BrowserFamily::Chrome | BrowserFamily::Edge
            ));
        }
    }

    #[test]
    fn medium_headers_stay_consistent_with_identity() {
        let selector = selector(11);
        for index in 0..32 {
            let profile = selector.build_profile(StealthTier::Medium, index);
            let is_firefox = profile.user_agent.contains("Firefox");
            if is_firefox {
                assert!(profile.header("sec-ch-ua").is_none());
            }
            assert!(profile.header("sec-fetch-mode").is_some());
            assert!(profile.header("referer").is_some());
        }
    }
}
