//! Escalation engine.
//!
//! Drives one URL to a terminal [`FetchResult`] through a sequence of
//! attempts at increasing stealth tiers. The engine is an explicit finite
//! state machine: every exit path (success, blocked, transport failure) is an
//! enumerated terminal state, and every attempt is appended to the result's
//! history whether it succeeded or not, so callers can always answer *why* a
//! fetch ended the way it did.

pub mod transport;

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use url::Url;

use crate::protection::{ClassificationVerdict, ProtectionClassifier, ProtectionVendor};
use crate::stealth::{ProfileSelector, RequestProfile, StealthTier};

pub use transport::{ReqwestTransport, Transport, TransportError, TransportResponse};

/// Caller-supplied parameters for one escalation run.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Starting tier; escalation moves strictly upward from here.
    pub tier: StealthTier,
    /// Whether a blocked verdict may escalate to the next tier.
    pub auto_bypass: bool,
    /// Per-attempt deadline covering connect, send, and body read.
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            tier: StealthTier::Off,
            auto_bypass: true,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Engine states. `Attempting` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Attempting(StealthTier),
    Success,
    Blocked,
    TransportFailed,
}

/// Terminal outcome of one escalation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Success,
    Blocked,
    TransportFailure,
}

/// One attempt and everything observed during it. Never mutated once pushed
/// onto the history.
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    pub tier: StealthTier,
    pub profile: RequestProfile,
    /// Status of the received response; `None` on transport failure.
    pub status: Option<u16>,
    /// Classifier verdict; `None` when no response was received.
    pub verdict: Option<ClassificationVerdict>,
    pub elapsed: Duration,
    pub started_at: DateTime<Utc>,
    pub transport_error: Option<TransportError>,
}

impl FetchAttempt {
    /// Whether the classifier judged this attempt's response blocked.
    pub fn is_blocked(&self) -> bool {
        self.verdict.as_ref().is_some_and(|v| v.is_blocked)
    }
}

/// Terminal result of one escalation run, immutable once returned.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub url: Url,
    pub outcome: FetchOutcome,
    /// Tier of the last attempt made.
    pub final_tier: StealthTier,
    /// Ordered attempt history; tiers are strictly non-decreasing.
    pub attempts: Vec<FetchAttempt>,
    /// Response body, present only on success.
    pub body: Option<Bytes>,
    /// Declared content type of the successful response.
    pub content_type: Option<String>,
    /// URL after redirects on the successful attempt.
    pub final_url: Option<Url>,
    /// Output of the configured content extractor, when one ran.
    pub extracted: Option<String>,
}

impl FetchResult {
    /// Vendor that blocked the final attempt, when the run ended blocked.
    pub fn blocked_vendor(&self) -> Option<ProtectionVendor> {
        if self.outcome != FetchOutcome::Blocked {
            return None;
        }
        self.attempts
            .last()
            .and_then(|attempt| attempt.verdict.as_ref())
            .map(|verdict| verdict.vendor)
    }

    /// Sum of per-attempt elapsed times.
    pub fn total_elapsed(&self) -> Duration {
        self.attempts.iter().map(|attempt| attempt.elapsed).sum()
    }
}

/// Runs the attempt/classify/escalate loop for a single URL.
pub struct EscalationEngine {
    transport: Arc<dyn Transport>,
    classifier: Arc<ProtectionClassifier>,
    selector: ProfileSelector,
}

impl EscalationEngine {
    pub fn new(
        transport: Arc<dyn Transport>,
        classifier: Arc<ProtectionClassifier>,
        selector: ProfileSelector,
    ) -> Self {
        Self {
            transport,
            classifier,
            selector,
        }
    }

    /// Drive `url` to a terminal result.
    ///
    /// The history length is bounded by the number of tiers above and
    /// including the starting tier; transport failures terminate on first
    /// occurrence without escalation.
    pub async fn run(&self, url: Url, options: &FetchOptions) -> FetchResult {
        let mut state = EngineState::Attempting(options.tier);
        let mut attempts: Vec<FetchAttempt> = Vec::new();
        let mut body: Option<Bytes> = None;
        let mut content_type: Option<String> = None;
        let mut final_url: Option<Url> = None;

        loop {
            match state {
                EngineState::Attempting(tier) => {
                    let profile = self.selector.build_profile(tier, attempts.len());
                    let started_at = Utc::now();
                    let started = Instant::now();
                    log::debug!("fetch {} attempt {} tier={}", url, attempts.len() + 1, tier);

                    match self.transport.execute(&url, &profile, options.timeout).await {
                        Err(err) => {
                            log::debug!("fetch {url} transport failure: {err}");
                            attempts.push(FetchAttempt {
                                tier,
                                profile,
                                status: None,
                                verdict: None,
                                elapsed: started.elapsed(),
                                started_at,
                                transport_error: Some(err),
                            });
                            state = EngineState::TransportFailed;
                        }
                        Ok(response) => {
                            let text = response.body_text().into_owned();
                            let verdict = self.classifier.classify(&response.view(&text));
                            let blocked = verdict.is_blocked;
                            if blocked {
                                log::info!(
                                    "fetch {} blocked by {} at tier {} (evidence: {:?})",
                                    url,
                                    verdict.vendor,
                                    tier,
                                    verdict.evidence
                                );
                            }
                            attempts.push(FetchAttempt {
                                tier,
                                profile,
                                status: Some(response.status),
                                verdict: Some(verdict),
                                elapsed: started.elapsed(),
                                started_at,
                                transport_error: None,
                            });

                            if !blocked {
                                body = Some(response.body);
                                content_type = response.content_type;
                                final_url = Some(response.final_url);
                                state = EngineState::Success;
                            } else {
                                match tier.next() {
                                    Some(next) if options.auto_bypass => {
                                        log::debug!("fetch {url} escalating to tier {next}");
                                        state = EngineState::Attempting(next);
                                    }
                                    _ => state = EngineState::Blocked,
                                }
                            }
                        }
                    }
                }
                EngineState::Success => {
                    return self.finish(
                        url,
                        FetchOutcome::Success,
                        attempts,
                        body,
                        content_type,
                        final_url,
                    );
                }
                EngineState::Blocked => {
                    return self.finish(url, FetchOutcome::Blocked, attempts, None, None, None);
                }
                EngineState::TransportFailed => {
                    return self.finish(
                        url,
                        FetchOutcome::TransportFailure,
                        attempts,
                        None,
                        None,
                        None,
                    );
                }
            }
        }
    }

    fn finish(
        &self,
        url: Url,
        outcome: FetchOutcome,
        attempts: Vec<FetchAttempt>,
        body: Option<Bytes>,
        content_type: Option<String>,
        final_url: Option<Url>,
    ) -> FetchResult {
        debug_assert!(
            attempts.windows(2).all(|pair| pair[0].tier <= pair[1].tier),
            "attempt tiers must be non-decreasing"
        );
        debug_assert!(attempts.len() <= StealthTier::ALL.len());

        let final_tier = attempts
            .last()
            .map(|attempt| attempt.tier)
            .unwrap_or_default();

        FetchResult {
            url,
            outcome,
            final_tier,
            attempts,
            body,
            content_type,
            final_url,
            extracted: None,
        }
    }
}
