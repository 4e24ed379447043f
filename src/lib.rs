//! # stealthfetch
//!
//! Fetches remote web pages on behalf of automated clients while evading
//! bot-mitigation systems and classifying when such mitigation has blocked a
//! request.
//!
//! The core is an escalation engine: each fetch runs a sequence of attempts
//! at increasing stealth tiers (user-agent rotation, full browser header
//! sets, TLS fingerprint impersonation) until the response classifies clean,
//! the tiers are exhausted, or the transport fails. Every attempt is recorded
//! on the result with its tier, vendor verdict, matched evidence, and elapsed
//! time, so callers can always see why a fetch ended the way it did.
//!
//! ## Features
//!
//! - Four ordered stealth tiers, `off` through `high`, with strictly growing
//!   request fingerprints
//! - Declarative protection-signature table covering Cloudflare, reCAPTCHA,
//!   hCaptcha, DataDome, Akamai, PerimeterX, Imperva, and Kasada; extensible
//!   from JSON at runtime
//! - Explicit escalation state machine with an inspectable attempt history
//! - Bounded-concurrency batch fetching with independent per-URL outcomes
//! - Seedable identity selection for reproducible tests
//!
//! ## Example
//!
//! ```no_run
//! use stealthfetch::{FetchOutcome, StealthFetcher, StealthTier};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = StealthFetcher::builder()
//!         .with_tier(StealthTier::Off)
//!         .with_auto_bypass(true)
//!         .build();
//!
//!     let result = fetcher.fetch("https://example.com").await?;
//!     match result.outcome {
//!         FetchOutcome::Success => println!("fetched {} bytes", result.body.unwrap().len()),
//!         FetchOutcome::Blocked => {
//!             println!("blocked by {:?} after {} attempts",
//!                 result.blocked_vendor(), result.attempts.len())
//!         }
//!         FetchOutcome::TransportFailure => println!("host unreachable"),
//!     }
//!     Ok(())
//! }
//! ```

mod fetcher;

pub mod batch;
pub mod engine;
pub mod protection;
pub mod stealth;

pub use crate::fetcher::{
    ContentExtractor,
    FetchError,
    StealthFetchResult,
    StealthFetcher,
    StealthFetcherBuilder,
    StealthFetcherConfig,
};

pub use crate::engine::{
    EscalationEngine,
    FetchAttempt,
    FetchOptions,
    FetchOutcome,
    FetchResult,
    ReqwestTransport,
    Transport,
    TransportError,
    TransportResponse,
};

pub use crate::batch::{BatchEntry, BatchResult};

pub use crate::protection::{
    ClassificationVerdict,
    ProtectionClassifier,
    ProtectionSignature,
    ProtectionVendor,
    ResponseView,
    SignatureError,
    SignatureSpec,
};

pub use crate::stealth::{
    BrowserFamily,
    BrowserIdentity,
    IdentityPool,
    ProfileSelector,
    RequestProfile,
    StealthTier,
    TlsIdentity,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
