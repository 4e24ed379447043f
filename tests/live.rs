//! Network smoke test. Ignored by default: requires outbound connectivity.

use std::time::Duration;

use stealthfetch::{FetchOptions, FetchOutcome, StealthFetcher, StealthTier};

#[tokio::test]
#[ignore = "Requires network access"]
async fn fetches_a_public_page() {
    let fetcher = StealthFetcher::builder()
        .with_timeout(Duration::from_secs(15))
        .build();

    let options = FetchOptions {
        tier: StealthTier::Low,
        auto_bypass: true,
        timeout: Duration::from_secs(15),
    };
    let result = fetcher
        .fetch_with("https://example.com/", &options)
        .await
        .expect("fetch");

    println!(
        "outcome={:?} final_tier={} attempts={}",
        result.outcome,
        result.final_tier,
        result.attempts.len()
    );
    for attempt in &result.attempts {
        println!(
            "  tier={} status={:?} blocked={} elapsed={:?}",
            attempt.tier,
            attempt.status,
            attempt.is_blocked(),
            attempt.elapsed
        );
    }

    assert_eq!(result.outcome, FetchOutcome::Success);
    assert!(result.body.is_some());
}
