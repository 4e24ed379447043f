//! Stealth request shaping.
//!
//! Identity rotation, tiered header assembly, and TLS identities used to make
//! automated requests look like browser traffic.

pub mod identity;
pub mod profile;
pub mod tls;

pub use identity::{BrowserFamily, BrowserIdentity, IdentityPool};
pub use profile::{ProfileSelector, RequestProfile, StealthTier};
pub use tls::TlsIdentity;
