//! Bounded-concurrency batch fetching.
//!
//! Fans an escalation run out over a list of URLs under a fixed worker cap.
//! Every URL yields exactly one entry: a terminal [`FetchResult`] or a
//! captured per-URL error. One URL's failure never cancels or delays its
//! siblings, and the output order always matches the input order regardless
//! of completion order.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use url::Url;

use crate::engine::{EscalationEngine, FetchOptions, FetchOutcome, FetchResult};
use crate::fetcher::FetchError;

/// One input URL's slot in the batch output.
#[derive(Debug)]
pub struct BatchEntry {
    /// The input string as supplied, kept even when it failed to parse.
    pub url: String,
    pub result: Result<FetchResult, FetchError>,
}

/// Frozen outcome of a whole batch.
#[derive(Debug)]
pub struct BatchResult {
    /// Entries in input order.
    pub entries: Vec<BatchEntry>,
    /// Entries whose fetch ended in [`FetchOutcome::Success`].
    pub succeeded: usize,
    /// Everything else: blocked, transport failures, rejected inputs.
    pub failed: usize,
}

enum Job {
    /// Rejected before dispatch; no network I/O happened.
    Rejected(FetchError),
    Running(JoinHandle<FetchResult>),
}

/// Run the engine over `urls` with at most `concurrency` fetches in flight.
///
/// Zero concurrency is rejected up front; malformed URLs become per-entry
/// errors without consuming a worker slot.
pub async fn run_batch(
    engine: Arc<EscalationEngine>,
    urls: &[String],
    options: &FetchOptions,
    concurrency: usize,
) -> Result<BatchResult, FetchError> {
    if concurrency == 0 {
        return Err(FetchError::InvalidInput(
            "concurrency limit must be at least 1".into(),
        ));
    }

    log::debug!(
        "batch of {} urls, tier={}, concurrency={}",
        urls.len(),
        options.tier,
        concurrency
    );

    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut jobs = Vec::with_capacity(urls.len());

    for raw in urls {
        match parse_fetch_url(raw) {
            Err(err) => jobs.push((raw.clone(), Job::Rejected(err))),
            Ok(url) => {
                let engine = Arc::clone(&engine);
                let semaphore = Arc::clone(&semaphore);
                let options = options.clone();
                let handle = tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .expect("batch semaphore closed");
                    engine.run(url, &options).await
                });
                jobs.push((raw.clone(), Job::Running(handle)));
            }
        }
    }

    // Awaiting handles in input order freezes the output ordering without
    // constraining completion order.
    let mut entries = Vec::with_capacity(jobs.len());
    for (url, job) in jobs {
        let result = match job {
            Job::Rejected(err) => Err(err),
            Job::Running(handle) => match handle.await {
                Ok(result) => Ok(result),
                Err(err) => Err(FetchError::TaskFailure(err.to_string())),
            },
        };
        entries.push(BatchEntry { url, result });
    }

    let succeeded = entries
        .iter()
        .filter(|entry| {
            matches!(&entry.result, Ok(result) if result.outcome == FetchOutcome::Success)
        })
        .count();
    let failed = entries.len() - succeeded;

    log::info!("batch complete: {succeeded} succeeded, {failed} failed");
    Ok(BatchResult {
        entries,
        succeeded,
        failed,
    })
}

/// Validate a batch input before any network call.
pub(crate) fn parse_fetch_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw)
        .map_err(|err| FetchError::InvalidInput(format!("malformed url '{raw}': {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidInput(format!(
            "unsupported scheme '{other}' in '{raw}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_schemes() {
        assert!(parse_fetch_url("https://example.com/").is_ok());
        assert!(parse_fetch_url("http://example.com/a?b=c").is_ok());
        assert!(matches!(
            parse_fetch_url("ftp://example.com/"),
            Err(FetchError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_fetch_url("not a url"),
            Err(FetchError::InvalidInput(_))
        ));
    }
}
