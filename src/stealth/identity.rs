//! Browser identity pool.
//!
//! Responsibilities:
//! - Hold identity templates (user-agent + correlated base headers) per
//!   browser family, weighted toward common browser/OS combinations.
//! - Hand out a pseudo-random identity for any tier above `Off`.
//! - Return a single fixed identity at `Off` so the disabled path stays
//!   deterministic and auditable.
//!
//! The random source is an explicit seedable generator rather than process
//! globals, so identity selection is reproducible in tests and independent
//! per pool instance.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::stealth::profile::StealthTier;

/// Browser families the pool can impersonate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrowserFamily {
    Chrome,
    Firefox,
    Safari,
    Edge,
}

/// A user-agent plus the header values that must stay consistent with it.
///
/// A Chrome user-agent never pairs with Firefox-only headers: everything a
/// profile builder derives from an identity comes from the same template.
#[derive(Debug, Clone)]
pub struct BrowserIdentity {
    pub family: BrowserFamily,
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub accept_encoding: String,
    /// `sec-ch-ua` client-hint triple; Chromium-based families only.
    pub sec_ch_ua: Option<String>,
    /// `sec-ch-ua-platform` value, quoted as browsers send it.
    pub sec_ch_ua_platform: Option<String>,
}

struct IdentityTemplate {
    family: BrowserFamily,
    user_agents: &'static [&'static str],
    accept: &'static str,
    accept_language: &'static [&'static str],
    accept_encoding: &'static str,
    sec_ch_ua: Option<&'static str>,
    sec_ch_ua_platform: Option<&'static str>,
    /// Relative selection weight; roughly mirrors market share.
    weight: u32,
}

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

static TEMPLATES: &[IdentityTemplate] = &[
    IdentityTemplate {
        family: BrowserFamily::Chrome,
        user_agents: &[
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
        ],
        accept: ACCEPT_HTML,
        accept_language: &["en-US,en;q=0.9", "en-GB,en;q=0.8"],
        accept_encoding: "gzip, deflate, br",
        sec_ch_ua: Some(r#""Chromium";v="131", "Google Chrome";v="131", "Not_A Brand";v="24""#),
        sec_ch_ua_platform: Some(r#""Windows""#),
        weight: 6,
    },
    IdentityTemplate {
        family: BrowserFamily::Firefox,
        user_agents: &[
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
            "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
        ],
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        accept_language: &["en-US,en;q=0.5"],
        accept_encoding: "gzip, deflate, br, zstd",
        sec_ch_ua: None,
        sec_ch_ua_platform: None,
        weight: 2,
    },
    IdentityTemplate {
        family: BrowserFamily::Safari,
        user_agents: &[
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
        ],
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        accept_language: &["en-US,en;q=0.9"],
        accept_encoding: "gzip, deflate, br",
        sec_ch_ua: None,
        sec_ch_ua_platform: None,
        weight: 2,
    },
    IdentityTemplate {
        family: BrowserFamily::Edge,
        user_agents: &[
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
        ],
        accept: ACCEPT_HTML,
        accept_language: &["en-US,en;q=0.9"],
        accept_encoding: "gzip, deflate, br",
        sec_ch_ua: Some(r#""Chromium";v="131", "Microsoft Edge";v="131", "Not_A Brand";v="24""#),
        sec_ch_ua_platform: Some(r#""Windows""#),
        weight: 1,
    },
];

/// Fixed identity used when stealth is disabled. No rotation, no RNG.
fn default_identity() -> BrowserIdentity {
    BrowserIdentity {
        family: BrowserFamily::Chrome,
        user_agent: format!(
            "Mozilla/5.0 (compatible; {}/{})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ),
        accept: "*/*".into(),
        accept_language: "en".into(),
        accept_encoding: "gzip, deflate".into(),
        sec_ch_ua: None,
        sec_ch_ua_platform: None,
    }
}

/// Supplies browser identities for the profile selector.
///
/// Safe for concurrent use; the generator sits behind a mutex. Give each
/// worker its own seeded pool when per-worker reproducibility matters.
#[derive(Debug)]
pub struct IdentityPool {
    rng: Mutex<StdRng>,
}

impl IdentityPool {
    /// Pool seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Pool with a fixed seed; selection becomes fully deterministic.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Select an identity for the given tier. Never fails.
    ///
    /// At [`StealthTier::Off`] the same fixed identity is returned on every
    /// call and the random source is not consulted.
    pub fn next_identity(&self, tier: StealthTier) -> BrowserIdentity {
        if tier == StealthTier::Off {
            return default_identity();
        }

        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let template = weighted_pick(&mut rng, TEMPLATES);
        let user_agent = template.user_agents[rng.gen_range(0..template.user_agents.len())];
        let accept_language =
            template.accept_language[rng.gen_range(0..template.accept_language.len())];

        BrowserIdentity {
            family: template.family,
            user_agent: user_agent.to_string(),
            accept: template.accept.to_string(),
            accept_language: accept_language.to_string(),
            accept_encoding: template.accept_encoding.to_string(),
            sec_ch_ua: template.sec_ch_ua.map(str::to_string),
            sec_ch_ua_platform: template.sec_ch_ua_platform.map(str::to_string),
        }
    }
}

impl Default for IdentityPool {
    fn default() -> Self {
        Self::new()
    }
}

fn weighted_pick<'a>(rng: &mut StdRng, templates: &'a [IdentityTemplate]) -> &'a IdentityTemplate {
    let total: u32 = templates.iter().map(|t| t.weight).sum();
    let mut roll = rng.gen_range(0..total);
    for template in templates {
        if roll < template.weight {
            return template;
        }
        roll -= template.weight;
    }
    &templates[templates.len() - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_tier_is_deterministic() {
        let pool = IdentityPool::new();
        let a = pool.next_identity(StealthTier::Off);
        let b = pool.next_identity(StealthTier::Off);
        assert_eq!(a.user_agent, b.user_agent);
        assert_eq!(a.accept, b.accept);
        assert_eq!(a.accept_language, b.accept_language);
    }

    #[test]
    fn seeded_pools_agree() {
        let first = IdentityPool::with_seed(7);
        let second = IdentityPool::with_seed(7);
        for _ in 0..16 {
            let a = first.next_identity(StealthTier::Low);
            let b = second.next_identity(StealthTier::Low);
            assert_eq!(a.user_agent, b.user_agent);
        }
    }

    #[test]
    fn client_hints_stay_chromium_only() {
        let pool = IdentityPool::with_seed(42);
        for _ in 0..64 {
            let identity = pool.next_identity(StealthTier::Medium);
            match identity.family {
                BrowserFamily::Chrome | BrowserFamily::Edge => {
                    assert!(identity.sec_ch_ua.is_some())
                }
                BrowserFamily::Firefox | BrowserFamily::Safari => {
                    assert!(identity.sec_ch_ua.is_none())
                }
            }
        }
    }
}
