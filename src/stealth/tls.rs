//! TLS client identities.
//!
//! Supplies per-browser TLS handshake parameters (JA3 string, cipher suite
//! order, ALPN list, extension order) so the top stealth tier can present a
//! handshake consistent with the user-agent it claims to be.

use super::identity::BrowserFamily;

/// TLS handshake parameters matching a spoofed browser.
///
/// Carried on a [`RequestProfile`](super::profile::RequestProfile) at the
/// `High` tier and applied by the transport layer. Ordering of cipher suites
/// and extensions is significant: it is part of the fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TlsIdentity {
    pub family: BrowserFamily,
    pub ja3: String,
    pub cipher_suites: Vec<String>,
    pub alpn_protocols: Vec<String>,
    pub tls_extensions: Vec<u16>,
}

impl TlsIdentity {
    /// Builtin identity for a browser family.
    pub fn for_family(family: BrowserFamily) -> Self {
        match family {
            BrowserFamily::Chrome | BrowserFamily::Edge => Self {
                family,
                ja3: "771,4866-4865-4867-49196-49195-52393,0-11-10-35-13-45-16-43,29-23-24,0"
                    .into(),
                cipher_suites: vec![
                    "TLS_AES_128_GCM_SHA256".into(),
                    "TLS_AES_256_GCM_SHA384".into(),
                    "TLS_CHACHA20_POLY1305_SHA256".into(),
                ],
                alpn_protocols: vec!["h2".into(), "http/1.1".into()],
                tls_extensions: vec![0, 11, 10, 35, 13, 45, 16, 43],
            },
            BrowserFamily::Firefox => Self {
                family,
                ja3: "771,4866-4865-4867-49196-49200,0-11-10-35-13-27,23-24,0".into(),
                cipher_suites: vec![
                    "TLS_AES_128_GCM_SHA256".into(),
                    "TLS_AES_256_GCM_SHA384".into(),
                    "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256".into(),
                ],
                alpn_protocols: vec!["h2".into(), "http/1.1".into()],
                tls_extensions: vec![0, 11, 10, 35, 13, 27],
            },
            BrowserFamily::Safari => Self {
                family,
                ja3: "771,4865-4866-4867-49195-49196,0-11-10-35-13-16,29-23-24,0".into(),
                cipher_suites: vec![
                    "TLS_AES_128_GCM_SHA256".into(),
                    "TLS_CHACHA20_POLY1305_SHA256".into(),
                    "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256".into(),
                ],
                alpn_protocols: vec!["h2".into(), "http/1.1".into()],
                tls_extensions: vec![0, 11, 10, 35, 13, 16],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_matches_family() {
        let identity = TlsIdentity::for_family(BrowserFamily::Firefox);
        assert_eq!(identity.family, BrowserFamily::Firefox);
        assert!(!identity.cipher_suites.is_empty());
        assert!(identity.alpn_protocols.contains(&"h2".to_string()));
    }

    #[test]
    fn families_differ_in_ja3() {
        let chrome = TlsIdentity::for_family(BrowserFamily::Chrome);
        let safari = TlsIdentity::for_family(BrowserFamily::Safari);
        assert_ne!(chrome.ja3, safari.ja3);
    }
}
