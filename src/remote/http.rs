use crate::error::Result;
use crate::models::{RevisionAck, RevisionStatus, SectionRevision};
use crate::remote::provider::RevisionApi;
use crate::RevisionError;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// How many times a request is attempted, and how long to wait between attempts.
///
/// The wait before attempt `n + 1` is `base_delay * 2^(n - 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::none()
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

pub struct HttpRevisionApi {
    client: Client,
    base_url: Url,
    fetch_retry: RetryPolicy,
}

impl HttpRevisionApi {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(&base_url)
            .map_err(|e| RevisionError::Config(format!("Invalid API base URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RevisionError::Config(format!(
                "API base URL {} cannot carry a path",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RevisionError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(HttpRevisionApi {
            client,
            base_url,
            fetch_retry: RetryPolicy::none(),
        })
    }

    /// Opts revision list fetches into retrying.
    pub fn with_fetch_retry(mut self, policy: RetryPolicy) -> Self {
        self.fetch_retry = policy;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RevisionError::Internal(format!("Cannot extend URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends a request and decodes a JSON body, retrying transport failures and
    /// 5xx responses as `retry` allows.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        retry: RetryPolicy,
    ) -> Result<T> {
        let url = self.endpoint(segments)?;
        let mut attempt = 1;

        loop {
            debug!("{} {} (attempt {}/{})", method, url, attempt, retry.max_attempts);
            match self.send_once(method.clone(), url.clone()).await {
                Err(err) if err.is_retryable() && attempt < retry.max_attempts => {
                    let delay = retry.delay_for(attempt);
                    warn!(
                        "{} {} failed ({}), retrying in {:?}",
                        method, url, err, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(&self, method: Method, url: Url) -> Result<T> {
        let response = self
            .client
            .request(method, url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| RevisionError::Network(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));
            return Err(RevisionError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| RevisionError::Network(format!("Failed to read response: {}", e)))?;
        // An empty 2xx body decodes as JSON null
        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(body)
            .map_err(|e| RevisionError::Decode(format!("Failed to parse response: {}", e)))
    }

    /// Posts an accept/reject action. Any 2xx status commits the action on the
    /// server, so a body that is not a `RevisionAck` is logged and replaced by
    /// the expected acknowledgement.
    async fn resolve(&self, revision_id: &str, action: &str, expected: RevisionStatus) -> Result<RevisionAck> {
        let body: serde_json::Value = self
            .request(
                Method::POST,
                &["api", "revisions", revision_id, action],
                RetryPolicy::none(),
            )
            .await?;

        let ack = match serde_json::from_value::<RevisionAck>(body) {
            Ok(ack) => ack,
            Err(e) => {
                warn!("Unrecognized {} acknowledgement for {}: {}", action, revision_id, e);
                return Ok(RevisionAck {
                    id: revision_id.to_string(),
                    status: expected,
                });
            }
        };

        if ack.id != revision_id || ack.status != expected {
            warn!(
                "Server acknowledged {} as {} {}, expected {} {}",
                action, ack.id, ack.status, revision_id, expected
            );
        }
        Ok(ack)
    }
}

#[async_trait]
impl RevisionApi for HttpRevisionApi {
    async fn get_revisions_by_document(&self, document_id: &str) -> Result<Vec<SectionRevision>> {
        self.request(
            Method::GET,
            &["api", "documents", document_id, "revisions"],
            self.fetch_retry,
        )
        .await
    }

    async fn accept_revision(&self, revision_id: &str) -> Result<RevisionAck> {
        self.resolve(revision_id, "accept", RevisionStatus::Accepted).await
    }

    async fn reject_revision(&self, revision_id: &str) -> Result<RevisionAck> {
        self.resolve(revision_id, "reject", RevisionStatus::Rejected).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned response per connection, recording each request line.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&chunk[..n]);
                    if request.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let line = String::from_utf8_lossy(&request)
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .to_string();
                log.lock().unwrap().push(line);

                let response = format!(
                    "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}", addr), seen)
    }

    fn client(base_url: String) -> HttpRevisionApi {
        HttpRevisionApi::new(base_url, Duration::from_secs(5)).unwrap()
    }

    const REVISIONS: &str = r#"[{
        "id": "rev-1",
        "sectionId": "section-1",
        "documentId": "doc-1",
        "originalText": "Original",
        "proposedText": "Proposed",
        "aiGenerated": true,
        "riskLevel": "low",
        "status": "pending",
        "createdAt": "2024-05-01T12:00:00Z",
        "createdBy": "AI Assistant"
    }]"#;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::exponential(4, Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(RetryPolicy::exponential(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let result = HttpRevisionApi::new("not a url".to_string(), Duration::from_secs(1));
        assert!(matches!(result, Err(RevisionError::Config(_))));
    }

    #[tokio::test]
    async fn test_fetches_revisions_for_document() {
        let (base_url, seen) = serve(vec![(200, REVISIONS)]).await;

        let revisions = client(base_url).get_revisions_by_document("doc-1").await.unwrap();

        assert_eq!(revisions.len(), 1);
        assert_eq!(revisions[0].id, "rev-1");
        assert_eq!(revisions[0].status, RevisionStatus::Pending);
        assert_eq!(
            seen.lock().unwrap()[0],
            "GET /api/documents/doc-1/revisions HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn test_accept_posts_to_action_endpoint() {
        let (base_url, seen) = serve(vec![(200, r#"{"id": "rev-1", "status": "accepted"}"#)]).await;

        let ack = client(base_url).accept_revision("rev-1").await.unwrap();

        assert_eq!(ack.status, RevisionStatus::Accepted);
        assert_eq!(seen.lock().unwrap()[0], "POST /api/revisions/rev-1/accept HTTP/1.1");
    }

    #[tokio::test]
    async fn test_reject_posts_to_action_endpoint() {
        let (base_url, seen) = serve(vec![(200, r#"{"id": "rev-2", "status": "rejected"}"#)]).await;

        let ack = client(format!("{}/", base_url)).reject_revision("rev-2").await.unwrap();

        assert_eq!(ack.status, RevisionStatus::Rejected);
        assert_eq!(seen.lock().unwrap()[0], "POST /api/revisions/rev-2/reject HTTP/1.1");
    }

    #[tokio::test]
    async fn test_error_body_message_is_surfaced() {
        let (base_url, _) = serve(vec![(409, r#"{"message": "Revision already resolved"}"#)]).await;

        let err = client(base_url).accept_revision("rev-1").await.unwrap_err();

        match err {
            RevisionError::Http { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, "Revision already resolved");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_without_message_uses_status() {
        let (base_url, _) = serve(vec![(404, "not json")]).await;

        let err = client(base_url).get_revisions_by_document("doc-9").await.unwrap_err();

        match err {
            RevisionError::Http { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Request failed with status 404");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_revision_calls_do_not_retry() {
        let (base_url, seen) = serve(vec![
            (503, r#"{"message": "busy"}"#),
            (200, r#"{"id": "rev-1", "status": "accepted"}"#),
        ])
        .await;

        let err = client(base_url).accept_revision("rev-1").await.unwrap_err();

        assert!(matches!(err, RevisionError::Http { status: 503, .. }));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_opt_in_fetch_retry_recovers_from_5xx() {
        let (base_url, seen) = serve(vec![(502, "{}"), (200, REVISIONS)]).await;
        let api = client(base_url)
            .with_fetch_retry(RetryPolicy::exponential(3, Duration::from_millis(1)));

        let revisions = api.get_revisions_by_document("doc-1").await.unwrap();

        assert_eq!(revisions.len(), 1);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let (base_url, seen) = serve(vec![(400, r#"{"message": "bad id"}"#), (200, REVISIONS)]).await;
        let api = client(base_url)
            .with_fetch_retry(RetryPolicy::exponential(3, Duration::from_millis(1)));

        let err = api.get_revisions_by_document("doc-1").await.unwrap_err();

        assert!(matches!(err, RevisionError::Http { status: 400, .. }));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_connection_failure_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(format!("http://{}", addr))
            .accept_revision("rev-1")
            .await
            .unwrap_err();

        assert!(matches!(err, RevisionError::Network(_)));
    }

    #[tokio::test]
    async fn test_malformed_revision_list_is_decode_error() {
        let (base_url, _) = serve(vec![(200, r#"{"unexpected": true}"#)]).await;

        let err = client(base_url).get_revisions_by_document("doc-1").await.unwrap_err();

        assert!(matches!(err, RevisionError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unrecognized_success_body_still_acknowledges() {
        let (base_url, seen) = serve(vec![
            (200, r#"{"success": true}"#),
            (200, ""),
            (200, r#"{"id": 42, "status": "rejected"}"#),
        ])
        .await;
        let api = client(base_url);

        let ack = api.accept_revision("rev-1").await.unwrap();
        assert_eq!(ack.id, "rev-1");
        assert_eq!(ack.status, RevisionStatus::Accepted);

        let ack = api.accept_revision("rev-2").await.unwrap();
        assert_eq!(ack.status, RevisionStatus::Accepted);

        let ack = api.reject_revision("rev-3").await.unwrap();
        assert_eq!(ack.id, "rev-3");
        assert_eq!(ack.status, RevisionStatus::Rejected);
        assert_eq!(seen.lock().unwrap().len(), 3);
    }
}
