//! HTTP client for the remote sync store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::envelope::{Envelope, FailureKind};
use crate::config::{normalize_endpoint, SyncConfig};
use crate::identity::UserId;
use crate::payload::SyncPayload;
use crate::util::{compact_text, normalize_text_option};
use crate::{Error, Result};

/// Remote side of a sync cycle.
///
/// Implementations never fail with `Err`: every outcome, including transport
/// failures, is reported through the returned [`Envelope`].
pub trait RemoteStore: Send + Sync + 'static {
    /// Fetch the stored payload for `id`. A missing document is a failed
    /// envelope with `Server(404)`.
    fn read(&self, id: &UserId) -> impl Future<Output = Envelope<SyncPayload>> + Send;

    /// Overwrite the stored payload for `id`.
    fn write(&self, id: &UserId, payload: &SyncPayload)
        -> impl Future<Output = Envelope<Value>> + Send;
}

impl<T: RemoteStore> RemoteStore for Arc<T> {
    fn read(&self, id: &UserId) -> impl Future<Output = Envelope<SyncPayload>> + Send {
        (**self).read(id)
    }

    fn write(
        &self,
        id: &UserId,
        payload: &SyncPayload,
    ) -> impl Future<Output = Envelope<Value>> + Send {
        (**self).write(id, payload)
    }
}

#[derive(Clone)]
pub struct RemoteStoreClient {
    sync_url: String,
    http: reqwest::Client,
    max_retries: u32,
    initial_retry_delay: Duration,
    request_timeout: Duration,
}

impl RemoteStoreClient {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let sync_url = normalize_endpoint(&config.sync_url())?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|error| Error::Transport(format!("failed to build HTTP client: {error}")))?;
        Ok(Self {
            sync_url,
            http,
            max_retries: config.max_retries,
            initial_retry_delay: config.initial_retry_delay,
            request_timeout: config.request_timeout,
        })
    }

    pub fn sync_url(&self) -> &str {
        &self.sync_url
    }

    fn user_url(&self, id: &UserId) -> String {
        format!("{}?userId={}", self.sync_url, id)
    }

    /// Run one logical call: up to `1 + max_retries` attempts, each bounded by
    /// the request timeout, with doubling backoff between retryable failures.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        url: &str,
        method: Method,
        body: Option<&Value>,
    ) -> Envelope<T> {
        let mut attempt: u32 = 0;
        let mut delay = self.initial_retry_delay;
        let mut waited = Duration::ZERO;

        loop {
            let envelope = match tokio::time::timeout(
                self.request_timeout,
                self.attempt::<T>(url, &method, body),
            )
            .await
            {
                Ok(envelope) => envelope,
                Err(_) => Envelope::failed(
                    FailureKind::Timeout,
                    format!(
                        "request timed out after {}ms",
                        self.request_timeout.as_millis()
                    ),
                ),
            };

            if !envelope.is_retryable() || attempt >= self.max_retries {
                if attempt > 0 {
                    tracing::debug!(
                        %method,
                        attempts = attempt + 1,
                        waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                        success = envelope.success,
                        "Remote call settled after retries"
                    );
                }
                return envelope;
            }

            attempt += 1;
            tracing::warn!(
                %method,
                attempt,
                max_retries = self.max_retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                reason = envelope.message_or("unknown"),
                "Remote call failed, retrying"
            );
            tokio::time::sleep(delay).await;
            waited += delay;
            delay = delay.saturating_mul(2);
        }
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        url: &str,
        method: &Method,
        body: Option<&Value>,
    ) -> Envelope<T> {
        let mut request = self
            .http
            .request(method.clone(), url)
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(error) => return Envelope::failed(FailureKind::Transport, error.to_string()),
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(error) => return Envelope::failed(FailureKind::Transport, error.to_string()),
        };

        if !status.is_success() {
            return Envelope::failed(
                FailureKind::Server(status.as_u16()),
                parse_api_error(status, &text),
            );
        }

        match serde_json::from_str::<Envelope<T>>(&text) {
            Ok(envelope) if envelope.success => envelope,
            Ok(envelope) => Envelope::failed(
                FailureKind::Server(status.as_u16()),
                envelope.message_or("remote store reported failure"),
            ),
            Err(error) => {
                tracing::warn!(%error, body = %compact_text(&text), "Undecodable sync response");
                Envelope::failed(
                    FailureKind::Parse,
                    format!("invalid response body: {error}"),
                )
            }
        }
    }
}

impl RemoteStore for RemoteStoreClient {
    async fn read(&self, id: &UserId) -> Envelope<SyncPayload> {
        self.execute::<Value>(&self.user_url(id), Method::GET, None)
            .await
            .map(SyncPayload::from_value)
    }

    async fn write(&self, id: &UserId, payload: &SyncPayload) -> Envelope<Value> {
        let body = match serde_json::to_value(payload) {
            Ok(body) => body,
            Err(error) => {
                return Envelope::failed(
                    FailureKind::Validation,
                    format!("payload is not serializable: {error}"),
                )
            }
        };
        self.execute(&self.user_url(id), Method::POST, Some(&body))
            .await
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    error: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = normalize_text_option(payload.message.or(payload.error)) {
            return message;
        }
    }
    format!("HTTP {}", status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_url_is_validated_and_trimmed() {
        assert!(normalize_endpoint("").is_err());
        assert!(normalize_endpoint("api.example.com/user-sync").is_err());
        assert_eq!(
            normalize_endpoint(" https://tv.example/user-sync/ ").unwrap(),
            "https://tv.example/user-sync"
        );

        let mut config = SyncConfig::default();
        config.endpoint = "not a url".to_string();
        assert!(RemoteStoreClient::new(&config).is_err());
    }

    #[test]
    fn api_error_prefers_json_message() {
        assert_eq!(
            parse_api_error(
                StatusCode::NOT_FOUND,
                r#"{"success":false,"message":"No sync data found"}"#
            ),
            "No sync data found"
        );
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, r#"{"error":"upstream"}"#),
            "upstream"
        );
        assert_eq!(
            parse_api_error(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>"),
            "HTTP 500"
        );
    }

    #[test]
    fn user_url_appends_identifier() {
        let client = RemoteStoreClient::new(&SyncConfig::default()).unwrap();
        let id = UserId::parse("123456").unwrap();
        assert_eq!(
            client.user_url(&id),
            "http://127.0.0.1:8787/user-sync?userId=123456"
        );
    }
}
