//! Response classification.
//!
//! Evaluates the signature table against a completed HTTP response and decides
//! whether it is a genuine page or a bot-mitigation challenge. Pure and total:
//! the same response always produces the same verdict, and a response nothing
//! matched is reported clean (the deliberate false-negative bias: blocking is
//! never assumed without positive evidence).

use crate::protection::signatures::{
    ProtectionSignature, ProtectionVendor, ResponseView, builtin_signatures,
};

/// Outcome of classifying one response.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationVerdict {
    pub is_blocked: bool,
    pub vendor: ProtectionVendor,
    /// Identifiers of every signature that matched, across all vendors.
    pub evidence: Vec<String>,
    /// Highest base confidence among the matched signatures.
    pub confidence: f32,
}

impl ClassificationVerdict {
    fn clean() -> Self {
        Self {
            is_blocked: false,
            vendor: ProtectionVendor::Unknown,
            evidence: Vec::new(),
            confidence: 0.0,
        }
    }
}

/// Signature-table classifier.
///
/// The builtin table is process-wide static data; extra signatures merged at
/// construction are evaluated alongside it. Evaluation order is vendor
/// priority, so the reported vendor is deterministic even when several
/// vendors' signatures match.
pub struct ProtectionClassifier {
    extra: Vec<ProtectionSignature>,
}

impl ProtectionClassifier {
    pub fn new() -> Self {
        Self { extra: Vec::new() }
    }

    /// Classifier with additional signatures merged into the builtin table.
    pub fn with_signatures(extra: Vec<ProtectionSignature>) -> Self {
        Self { extra }
    }

    /// Evaluate every signature and report the verdict.
    ///
    /// All matched signature ids are retained as evidence even though only
    /// the highest-priority vendor is reported, so callers can see the full
    /// picture when vendors overlap.
    pub fn classify(&self, response: &ResponseView<'_>) -> ClassificationVerdict {
        let matched: Vec<&ProtectionSignature> = builtin_signatures()
            .iter()
            .chain(self.extra.iter())
            .filter(|signature| signature.matches(response))
            .collect();

        let Some(winner) = matched
            .iter()
            .min_by_key(|signature| signature.vendor.priority())
        else {
            return ClassificationVerdict::clean();
        };

        let vendor = winner.vendor;
        let confidence = matched
            .iter()
            .filter(|signature| signature.vendor == vendor)
            .map(|signature| signature.confidence)
            .fold(0.0, f32::max);

        ClassificationVerdict {
            is_blocked: true,
            vendor,
            evidence: matched.iter().map(|s| s.id.clone()).collect(),
            confidence,
        }
    }
}

impl Default for ProtectionClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protection::signatures::signatures_from_json;
    use http::{HeaderMap, HeaderValue};

    struct ResponseFixture {
        status: u16,
        headers: HeaderMap,
        body: String,
    }

    impl ResponseFixture {
        fn new(status: u16, body: &str) -> Self {
            Self {
                status,
                headers: HeaderMap::new(),
                body: body.to_string(),
            }
        }

        fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
            self.headers.insert(name, HeaderValue::from_static(value));
            self
        }

        fn view(&self) -> ResponseView<'_> {
            ResponseView {
                status: self.status,
                headers: &self.headers,
                body: &self.body,
            }
        }
    }

    #[test]
    fn clean_page_is_not_blocked() {
        let fixture = ResponseFixture::new(
            200,
            "<html><head><title>Weather</title></head><body>Sunny, 24C. Lorem ipsum dolor \
             sit amet, consectetur adipiscing elit, sed do eiusmod tempor incididunt.</body></html>",
        );
        let classifier = ProtectionClassifier::new();
        let verdict = classifier.classify(&fixture.view());
        assert!(!verdict.is_blocked);
        assert!(verdict.evidence.is_empty());
    }

    #[test]
    fn cf_mitigated_header_classifies_as_cloudflare() {
        let fixture = ResponseFixture::new(503, "<html>checking your browser</html>")
            .with_header("cf-mitigated", "challenge");
        let verdict = ProtectionClassifier::new().classify(&fixture.view());
        assert!(verdict.is_blocked);
        assert_eq!(verdict.vendor, ProtectionVendor::Cloudflare);
        assert!(verdict.evidence.contains(&"cf_mitigated_challenge".to_string()));
    }

    #[test]
    fn classification_is_idempotent() {
        let fixture = ResponseFixture::new(403, "<title>Just a moment...</title>")
            .with_header("server", "cloudflare");
        let classifier = ProtectionClassifier::new();
        let first = classifier.classify(&fixture.view());
        let second = classifier.classify(&fixture.view());
        assert_eq!(first, second);
    }

    #[test]
    fn highest_priority_vendor_wins_with_full_evidence() {
        // Body carries both hCaptcha and Cloudflare markers; Cloudflare is
        // earlier in the priority order and must be reported.
        let body = r#"<title>Just a moment...</title><div class="h-captcha"></div>"#;
        let fixture = ResponseFixture::new(403, body);
        let verdict = ProtectionClassifier::new().classify(&fixture.view());
        assert_eq!(verdict.vendor, ProtectionVendor::Cloudflare);
        assert!(verdict.evidence.contains(&"cf_just_a_moment".to_string()));
        assert!(verdict.evidence.contains(&"hcaptcha_widget".to_string()));
    }

    #[test]
    fn small_deny_body_reports_unknown_vendor() {
        let fixture = ResponseFixture::new(429, "slow down");
        let verdict = ProtectionClassifier::new().classify(&fixture.view());
        assert!(verdict.is_blocked);
        assert_eq!(verdict.vendor, ProtectionVendor::Unknown);
    }

    #[test]
    fn near_empty_200_stays_clean() {
        // Suspicious but unproven: no signature matched, so no block.
        let fixture = ResponseFixture::new(200, "");
        let verdict = ProtectionClassifier::new().classify(&fixture.view());
        assert!(!verdict.is_blocked);
    }

    #[test]
    fn merged_json_signatures_participate() {
        let extra = signatures_from_json(
            r#"[{"id": "acme_shield", "vendor": "perimeterx", "body_patterns": ["acme-shield-widget"]}]"#,
        )
        .expect("parse");
        let classifier = ProtectionClassifier::with_signatures(extra);
        let fixture = ResponseFixture::new(200, "<div id='acme-shield-widget'></div>");
        let verdict = classifier.classify(&fixture.view());
        assert!(verdict.is_blocked);
        assert_eq!(verdict.vendor, ProtectionVendor::PerimeterX);
        assert_eq!(verdict.evidence, vec!["acme_shield".to_string()]);
    }

    #[test]
    fn datadome_header_detection() {
        let fixture = ResponseFixture::new(403, "<html>blocked</html>")
            .with_header("x-datadome", "protected");
        let verdict = ProtectionClassifier::new().classify(&fixture.view());
        assert!(verdict.is_blocked);
        assert_eq!(verdict.vendor, ProtectionVendor::DataDome);
    }
}
