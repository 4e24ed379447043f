//! Bot-protection detection.
//!
//! A declarative signature table plus the pure classifier that evaluates it
//! against completed HTTP responses.

pub mod classifier;
pub mod signatures;

pub use classifier::{ClassificationVerdict, ProtectionClassifier};
pub use signatures::{
    HeaderRule, ProtectionSignature, ProtectionVendor, ResponseView, SignatureError,
    SignatureSpec, builtin_signatures, signatures_from_json,
};
