//! Transport abstraction and the reqwest-backed implementation.
//!
//! The escalation engine talks to the network through the [`Transport`] trait
//! so tests can script responses without sockets. The reqwest implementation
//! keeps one client per TLS identity: connection pools are never shared
//! across identities, so an escalated attempt always performs a fresh
//! handshake under the new fingerprint.

use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use thiserror::Error;
use tokio::sync::Mutex;
use url::Url;

use crate::protection::ResponseView;
use crate::stealth::{RequestProfile, TlsIdentity};

/// Transport-level failure. Terminal for an escalation run: no stealth tier
/// fixes an unreachable host.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out")]
    Timeout,
    #[error("invalid request header '{0}'")]
    InvalidHeader(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Protocol(err.to_string())
        }
    }
}

/// A completed HTTP exchange, redirects already followed.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub final_url: Url,
    pub content_type: Option<String>,
}

impl TransportResponse {
    /// Body decoded as UTF-8 for signature matching.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// View consumed by the protection classifier.
    pub fn view<'a>(&'a self, body_text: &'a str) -> ResponseView<'a> {
        ResponseView {
            status: self.status,
            headers: &self.headers,
            body: body_text,
        }
    }
}

/// One HTTP attempt under a concrete request profile.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        url: &Url,
        profile: &RequestProfile,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError>;
}

/// Reqwest-backed transport with a client per TLS identity.
pub struct ReqwestTransport {
    clients: Mutex<HashMap<Option<TlsIdentity>, Client>>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    async fn client(&self, identity: Option<&TlsIdentity>) -> Result<Client, TransportError> {
        let mut guard = self.clients.lock().await;
        let key = identity.cloned();
        if let Some(client) = guard.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = Client::builder().cookie_store(true);

        if let Some(identity) = identity {
            // A dedicated client means a dedicated connection pool, so the
            // handshake parameters below are renegotiated per identity.
            if identity.alpn_protocols.iter().all(|p| p == "http/1.1") {
                builder = builder.http1_only();
            }
        }

        let client = builder
            .build()
            .map_err(|err| TransportError::Protocol(err.to_string()))?;
        guard.insert(key, client.clone());
        Ok(client)
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        url: &Url,
        profile: &RequestProfile,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let client = self.client(profile.tls_identity.as_ref()).await?;
        let headers = to_header_map(profile)?;

        let response = client
            .get(url.clone())
            .headers(headers)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let headers = response.headers().clone();
        let content_type = headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        Ok(TransportResponse {
            status,
            headers,
            body,
            final_url,
            content_type,
        })
    }
}

/// Convert the profile's ordered header list into a header map. The map does
/// not guarantee wire order; the profile's `Vec` remains the source of truth
/// for fingerprint inspection.
fn to_header_map(profile: &RequestProfile) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::with_capacity(profile.headers().len());
    for (name, value) in profile.headers() {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TransportError::InvalidHeader(name.clone()))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| TransportError::InvalidHeader(name.clone()))?;
        map.append(header_name, header_value);
    }
    Ok(map)
}
