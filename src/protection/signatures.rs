//! Declarative bot-protection signatures.
//!
//! Responsibilities:
//! - Define the vendor set and its fixed priority order.
//! - Hold the builtin signature table: per-vendor detection predicates over
//!   status code, header presence/value, and body patterns.
//! - Deserialize additional signatures from JSON so the table can track
//!   vendor drift as configuration, not code.
//!
//! A signature is a conjunction: every listed predicate must hold for the
//! signature to match. New vendors and heuristics are added as table rows;
//! the status-code + tiny-body heuristic is itself just one more row.

use http::HeaderMap;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bot-mitigation products the classifier recognizes.
///
/// Declaration order is priority order: when multiple vendors' signatures
/// match one response, the earliest listed vendor is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectionVendor {
    Cloudflare,
    #[serde(rename = "recaptcha")]
    ReCaptcha,
    #[serde(rename = "hcaptcha")]
    HCaptcha,
    DataDome,
    Akamai,
    PerimeterX,
    Imperva,
    Kasada,
    Unknown,
}

impl ProtectionVendor {
    /// Lower value wins when several vendors match.
    pub fn priority(self) -> u8 {
        match self {
            ProtectionVendor::Cloudflare => 0,
            ProtectionVendor::ReCaptcha => 1,
            ProtectionVendor::HCaptcha => 2,
            ProtectionVendor::DataDome => 3,
            ProtectionVendor::Akamai => 4,
            ProtectionVendor::PerimeterX => 5,
            ProtectionVendor::Imperva => 6,
            ProtectionVendor::Kasada => 7,
            ProtectionVendor::Unknown => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProtectionVendor::Cloudflare => "cloudflare",
            ProtectionVendor::ReCaptcha => "recaptcha",
            ProtectionVendor::HCaptcha => "hcaptcha",
            ProtectionVendor::DataDome => "datadome",
            ProtectionVendor::Akamai => "akamai",
            ProtectionVendor::PerimeterX => "perimeterx",
            ProtectionVendor::Imperva => "imperva",
            ProtectionVendor::Kasada => "kasada",
            ProtectionVendor::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ProtectionVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The slice of an HTTP response the predicates evaluate over.
#[derive(Debug, Clone, Copy)]
pub struct ResponseView<'a> {
    pub status: u16,
    pub headers: &'a HeaderMap,
    pub body: &'a str,
}

/// Header presence/value predicate.
#[derive(Debug, Clone)]
pub struct HeaderRule {
    pub name: String,
    /// `None` means presence alone satisfies the rule.
    pub value_pattern: Option<Regex>,
}

impl HeaderRule {
    fn matches(&self, headers: &HeaderMap) -> bool {
        let Some(value) = headers.get(self.name.as_str()) else {
            return false;
        };
        match &self.value_pattern {
            None => true,
            Some(pattern) => value
                .to_str()
                .is_ok_and(|text| pattern.is_match(text)),
        }
    }
}

/// One row of the detection table: a vendor plus a predicate conjunction.
#[derive(Debug, Clone)]
pub struct ProtectionSignature {
    pub id: String,
    pub vendor: ProtectionVendor,
    /// Status codes the response must be in; empty = any status.
    pub statuses: Vec<u16>,
    /// Header rules; all must match.
    pub headers: Vec<HeaderRule>,
    /// Body patterns; all must match.
    pub body_patterns: Vec<Regex>,
    /// Upper bound on body length in bytes, for challenge-stub heuristics.
    pub max_body_len: Option<usize>,
    /// Reported on the verdict when this signature contributes.
    pub confidence: f32,
}

impl ProtectionSignature {
    /// Whether every predicate holds for the response.
    pub fn matches(&self, response: &ResponseView<'_>) -> bool {
        let has_predicate = !self.statuses.is_empty()
            || !self.headers.is_empty()
            || !self.body_patterns.is_empty()
            || self.max_body_len.is_some();
        if !has_predicate {
            return false;
        }

        if !self.statuses.is_empty() && !self.statuses.contains(&response.status) {
            return false;
        }
        if let Some(limit) = self.max_body_len
            && response.body.len() > limit
        {
            return false;
        }
        if !self.headers.iter().all(|rule| rule.matches(response.headers)) {
            return false;
        }
        self.body_patterns
            .iter()
            .all(|pattern| pattern.is_match(response.body))
    }
}

/// Serde shape for signatures supplied as JSON configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureSpec {
    pub id: String,
    pub vendor: ProtectionVendor,
    #[serde(default)]
    pub statuses: Vec<u16>,
    #[serde(default)]
    pub headers: Vec<HeaderRuleSpec>,
    #[serde(default)]
    pub body_patterns: Vec<String>,
    #[serde(default)]
    pub max_body_len: Option<usize>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderRuleSpec {
    pub name: String,
    #[serde(default)]
    pub value_pattern: Option<String>,
}

fn default_confidence() -> f32 {
    0.8
}

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature JSON invalid: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("signature '{id}' has invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        id: String,
        pattern: String,
        source: regex::Error,
    },
}

impl TryFrom<SignatureSpec> for ProtectionSignature {
    type Error = SignatureError;

    fn try_from(spec: SignatureSpec) -> Result<Self, Self::Error> {
        let compile = |pattern: &str| {
            build_regex_checked(pattern).map_err(|source| SignatureError::InvalidPattern {
                id: spec.id.clone(),
                pattern: pattern.to_string(),
                source,
            })
        };

        let mut body_patterns = Vec::with_capacity(spec.body_patterns.len());
        for pattern in &spec.body_patterns {
            body_patterns.push(compile(pattern)?);
        }

        let mut headers = Vec::with_capacity(spec.headers.len());
        for rule in &spec.headers {
            let value_pattern = match &rule.value_pattern {
                Some(pattern) => Some(compile(pattern)?),
                None => None,
            };
            headers.push(HeaderRule {
                name: rule.name.to_ascii_lowercase(),
                value_pattern,
            });
        }

        Ok(ProtectionSignature {
            id: spec.id,
            vendor: spec.vendor,
            statuses: spec.statuses,
            headers,
            body_patterns,
            max_body_len: spec.max_body_len,
            confidence: spec.confidence.clamp(0.0, 1.0),
        })
    }
}

/// Parse a JSON array of [`SignatureSpec`]s into compiled signatures.
pub fn signatures_from_json(json: &str) -> Result<Vec<ProtectionSignature>, SignatureError> {
    let specs: Vec<SignatureSpec> = serde_json::from_str(json)?;
    specs.into_iter().map(ProtectionSignature::try_from).collect()
}

/// Builtin table, loaded once, never mutated at runtime.
pub fn builtin_signatures() -> &'static [ProtectionSignature] {
    &BUILTIN
}

static BUILTIN: Lazy<Vec<ProtectionSignature>> = Lazy::new(|| {
    let mut table = Vec::new();

    // Cloudflare
    table.push(header_signature(
        "cf_mitigated_challenge",
        ProtectionVendor::Cloudflare,
        "cf-mitigated",
        Some("challenge"),
        0.99,
    ));
    table.push(body_signature(
        "cf_just_a_moment",
        ProtectionVendor::Cloudflare,
        r"<title>\s*Just a moment",
        0.95,
    ));
    table.push(body_signature(
        "cf_browser_verification",
        ProtectionVendor::Cloudflare,
        r#"cf-browser-verification|cf_chl_opt|/cdn-cgi/challenge-platform/"#,
        0.92,
    ));
    table.push(ProtectionSignature {
        id: "cf_blocked_status".into(),
        vendor: ProtectionVendor::Cloudflare,
        statuses: vec![403, 429, 503],
        headers: vec![HeaderRule {
            name: "server".into(),
            value_pattern: Some(build_regex(r"^cloudflare")),
        }],
        body_patterns: Vec::new(),
        max_body_len: None,
        confidence: 0.85,
    });

    // reCAPTCHA
    table.push(body_signature(
        "recaptcha_widget",
        ProtectionVendor::ReCaptcha,
        r"www\.google\.com/recaptcha|g-recaptcha(?:-response)?",
        0.9,
    ));

    // hCaptcha
    table.push(body_signature(
        "hcaptcha_widget",
        ProtectionVendor::HCaptcha,
        r"hcaptcha\.com/1/api\.js|\bh-captcha\b",
        0.9,
    ));

    // DataDome
    table.push(header_signature(
        "datadome_header",
        ProtectionVendor::DataDome,
        "x-datadome",
        None,
        0.95,
    ));
    table.push(body_signature(
        "datadome_captcha",
        ProtectionVendor::DataDome,
        r"captcha-delivery\.com|datadome",
        0.9,
    ));

    // Akamai
    table.push(body_signature(
        "akamai_sensor",
        ProtectionVendor::Akamai,
        r"_abck|akam/1[0-9]/",
        0.85,
    ));
    table.push(ProtectionSignature {
        id: "akamai_denied".into(),
        vendor: ProtectionVendor::Akamai,
        statuses: vec![403],
        headers: vec![HeaderRule {
            name: "server".into(),
            value_pattern: Some(build_regex(r"AkamaiGHost")),
        }],
        body_patterns: Vec::new(),
        max_body_len: None,
        confidence: 0.9,
    });

    // PerimeterX
    table.push(body_signature(
        "perimeterx_block",
        ProtectionVendor::PerimeterX,
        r"px-captcha|_pxhd|perimeterx",
        0.9,
    ));

    // Imperva / Incapsula
    table.push(body_signature(
        "imperva_resource",
        ProtectionVendor::Imperva,
        r"_Incapsula_Resource|Incapsula incident",
        0.9,
    ));
    table.push(header_signature(
        "imperva_cdn",
        ProtectionVendor::Imperva,
        "x-cdn",
        Some("Incapsula"),
        0.9,
    ));

    // Kasada
    table.push(header_signature(
        "kasada_header",
        ProtectionVendor::Kasada,
        "x-kpsdk-ct",
        None,
        0.95,
    ));
    table.push(body_signature(
        "kasada_script",
        ProtectionVendor::Kasada,
        r"kpsdk|kasada",
        0.85,
    ));

    // Generic heuristic: deny-class status with a challenge-stub-sized body.
    // One row like any other, so further heuristics compose uniformly.
    table.push(ProtectionSignature {
        id: "generic_small_deny".into(),
        vendor: ProtectionVendor::Unknown,
        statuses: vec![403, 429, 503],
        headers: Vec::new(),
        body_patterns: Vec::new(),
        max_body_len: Some(2048),
        confidence: 0.6,
    });

    table
});

fn body_signature(
    id: &str,
    vendor: ProtectionVendor,
    pattern: &str,
    confidence: f32,
) -> ProtectionSignature {
    ProtectionSignature {
        id: id.into(),
        vendor,
        statuses: Vec::new(),
        headers: Vec::new(),
        body_patterns: vec![build_regex(pattern)],
        max_body_len: None,
        confidence,
    }
}

fn header_signature(
    id: &str,
    vendor: ProtectionVendor,
    name: &str,
    value_pattern: Option<&str>,
    confidence: f32,
) -> ProtectionSignature {
    ProtectionSignature {
        id: id.into(),
        vendor,
        statuses: Vec::new(),
        headers: vec![HeaderRule {
            name: name.into(),
            value_pattern: value_pattern.map(build_regex),
        }],
        body_patterns: Vec::new(),
        max_body_len: None,
        confidence,
    }
}

fn build_regex_checked(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .dot_matches_new_line(true)
        .build()
}

fn build_regex(pattern: &str) -> Regex {
    build_regex_checked(pattern)
        .unwrap_or_else(|err| panic!("invalid builtin signature regex `{pattern}`: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn view<'a>(status: u16, headers: &'a HeaderMap, body: &'a str) -> ResponseView<'a> {
        ResponseView {
            status,
            headers,
            body,
        }
    }

    #[test]
    fn builtin_table_has_every_vendor() {
        let vendors: std::collections::HashSet<_> =
            builtin_signatures().iter().map(|s| s.vendor).collect();
        for vendor in [
            ProtectionVendor::Cloudflare,
            ProtectionVendor::ReCaptcha,
            ProtectionVendor::HCaptcha,
            ProtectionVendor::DataDome,
            ProtectionVendor::Akamai,
            ProtectionVendor::PerimeterX,
            ProtectionVendor::Imperva,
            ProtectionVendor::Kasada,
            ProtectionVendor::Unknown,
        ] {
            assert!(vendors.contains(&vendor), "missing {vendor}");
        }
    }

    #[test]
    fn header_value_rule_requires_match() {
        let signature = header_signature(
            "test",
            ProtectionVendor::Cloudflare,
            "cf-mitigated",
            Some("challenge"),
            0.9,
        );
        let mut headers = HeaderMap::new();
        headers.insert("cf-mitigated", HeaderValue::from_static("challenge"));
        assert!(signature.matches(&view(503, &headers, "")));

        let mut other = HeaderMap::new();
        other.insert("cf-mitigated", HeaderValue::from_static("logged"));
        assert!(!signature.matches(&view(503, &other, "")));
    }

    #[test]
    fn small_deny_heuristic_bounds_body_length() {
        let heuristic = builtin_signatures()
            .iter()
            .find(|s| s.id == "generic_small_deny")
            .expect("heuristic row");
        let headers = HeaderMap::new();
        assert!(heuristic.matches(&view(403, &headers, "denied")));
        assert!(!heuristic.matches(&view(200, &headers, "denied")));
        let long_body = "x".repeat(4096);
        assert!(!heuristic.matches(&view(403, &headers, &long_body)));
    }

    #[test]
    fn empty_signature_never_matches() {
        let empty = ProtectionSignature {
            id: "empty".into(),
            vendor: ProtectionVendor::Unknown,
            statuses: Vec::new(),
            headers: Vec::new(),
            body_patterns: Vec::new(),
            max_body_len: None,
            confidence: 1.0,
        };
        let headers = HeaderMap::new();
        assert!(!empty.matches(&view(403, &headers, "anything")));
    }

    #[test]
    fn json_signatures_compile() {
        let json = r#"[
            {
                "id": "custom_vendor_block",
                "vendor": "datadome",
                "statuses": [403],
                "body_patterns": ["interstitial"],
                "confidence": 0.7
            }
        ]"#;
        let signatures = signatures_from_json(json).expect("parse");
        assert_eq!(signatures.len(), 1);
        assert_eq!(signatures[0].vendor, ProtectionVendor::DataDome);
        let headers = HeaderMap::new();
        assert!(signatures[0].matches(&view(403, &headers, "an interstitial page")));
    }

    #[test]
    fn json_rejects_bad_pattern() {
        let json = r#"[{"id": "broken", "vendor": "kasada", "body_patterns": ["("]}]"#;
        assert!(matches!(
            signatures_from_json(json),
            Err(SignatureError::InvalidPattern { .. })
        ));
    }
}
