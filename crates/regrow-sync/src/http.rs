//! HTTP client for a regrow-server progress store.

use std::time::Duration;

use async_trait::async_trait;
use regrow_progress::{PartialProgress, ProgressState};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::trace;

use crate::error::{Result, StoreError};
use crate::identity::UserKey;
use crate::store::RemoteProgressStore;

/// Response envelope used by every progress endpoint.
#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    progress: Option<PartialProgress>,
    #[serde(default)]
    error: Option<String>,
}

/// [`RemoteProgressStore`] backed by the regrow-server REST API.
#[derive(Debug, Clone)]
pub struct HttpProgressStore {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpProgressStore {
    /// Create a client for the server at `base_url` with a 10s timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(10))
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url: String = base_url.into();
        let parsed = Url::parse(&base_url)
            .map_err(|e| StoreError::InvalidUrl(format!("{base_url}: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl(format!("{base_url}: not a base URL")));
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: parsed,
            http,
        })
    }

    /// Endpoint for `user`. The key is a single percent-encoded path
    /// segment, so `?`, `#` and `/` in a key never reach another record.
    fn url(&self, user: &UserKey) -> Result<Url> {
        // Dot segments would be dropped from the path rather than encoded
        if matches!(user.as_str(), "" | "." | "..") {
            return Err(StoreError::InvalidUrl(format!("unusable user key {user:?}")));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::InvalidUrl(format!("{}: not a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "v1", "progress", user.as_str()]);
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }
}

/// Check the status and body of a progress response.
///
/// A body that is not an envelope is only an error of its own when the
/// status claimed success; otherwise the status is what gets reported.
fn decode_envelope(status: StatusCode, body: &[u8]) -> Result<Envelope> {
    match serde_json::from_slice::<Envelope>(body) {
        Ok(envelope) if status.is_success() && envelope.ok => Ok(envelope),
        Ok(envelope) => Err(StoreError::Status {
            status: status.as_u16(),
            message: envelope.error.unwrap_or_default(),
        }),
        Err(e) if status.is_success() => Err(StoreError::Malformed(e.to_string())),
        Err(_) => Err(StoreError::Status {
            status: status.as_u16(),
            message: String::from_utf8_lossy(body).into_owned(),
        }),
    }
}

#[async_trait]
impl RemoteProgressStore for HttpProgressStore {
    async fn fetch(&self, user: &UserKey) -> Result<Option<PartialProgress>> {
        let response = self.http.get(self.url(user)?).send().await?;
        let status = response.status();
        trace!(%user, %status, "Fetched progress");

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response.bytes().await?;
        decode_envelope(status, &body)?
            .progress
            .map(Some)
            .ok_or_else(|| StoreError::Malformed("response has no progress record".into()))
    }

    async fn upsert(&self, user: &UserKey, state: &ProgressState) -> Result<()> {
        let response = self
            .http
            .patch(self.url(user)?)
            .json(state)
            .send()
            .await?;
        let status = response.status();
        trace!(%user, %status, "Saved progress");

        let body = response.bytes().await?;
        decode_envelope(status, &body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let store = HttpProgressStore::new("http://localhost:4000/").unwrap();
        assert_eq!(
            store.url(&UserKey::new("kim")).unwrap().as_str(),
            "http://localhost:4000/api/v1/progress/kim"
        );

        let store = HttpProgressStore::new("http://localhost:4000/game").unwrap();
        assert_eq!(
            store.url(&UserKey::new("kim")).unwrap().as_str(),
            "http://localhost:4000/game/api/v1/progress/kim"
        );
    }

    #[test]
    fn user_key_stays_in_one_path_segment() {
        let store = HttpProgressStore::new("http://localhost:4000").unwrap();

        for key in ["kim?x=1", "kim#top", "kim/../lee", "50%"] {
            let url = store.url(&UserKey::new(key)).unwrap();
            assert_eq!(url.query(), None, "{key}");
            assert_eq!(url.fragment(), None, "{key}");
            let segments: Vec<_> = url.path_segments().unwrap().collect();
            assert_eq!(segments.len(), 4, "{key}: {url}");
            assert_ne!(segments[3], "kim", "{key}");
        }

        assert_eq!(
            store.url(&UserKey::new("kim?x=1")).unwrap().path(),
            "/api/v1/progress/kim%3Fx=1"
        );
        assert!(matches!(
            store.url(&UserKey::new("..")),
            Err(StoreError::InvalidUrl(_))
        ));
    }

    #[test]
    fn bad_base_url_is_rejected() {
        assert!(matches!(
            HttpProgressStore::new("not a url"),
            Err(StoreError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpProgressStore::new("mailto:kim@example.com"),
            Err(StoreError::InvalidUrl(_))
        ));
    }

    #[test]
    fn envelope_parses_partial_record() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"ok":true,"progress":{"level":3}}"#).unwrap();
        assert!(envelope.ok);
        assert_eq!(envelope.progress.unwrap().level, Some(3));

        let envelope: Envelope =
            serde_json::from_str(r#"{"ok":false,"error":"boom"}"#).unwrap();
        assert!(!envelope.ok);
        assert_eq!(envelope.error.as_deref(), Some("boom"));
    }

    #[test]
    fn decode_reports_status_over_body() {
        let body = br#"{"ok":false,"error":"Invalid input: empty user key"}"#;
        match decode_envelope(StatusCode::BAD_REQUEST, body) {
            Err(StoreError::Status { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid input: empty user key");
            }
            other => panic!("unexpected {other:?}"),
        }

        match decode_envelope(StatusCode::BAD_GATEWAY, b"upstream down") {
            Err(StoreError::Status { status, message }) => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_garbage_on_success() {
        assert!(matches!(
            decode_envelope(StatusCode::OK, b"<html>"),
            Err(StoreError::Malformed(_))
        ));
        assert!(matches!(
            decode_envelope(StatusCode::OK, br#"{"ok":false}"#),
            Err(StoreError::Status { status: 200, .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        // Port 9 (discard) on localhost is not expected to serve HTTP.
        let store =
            HttpProgressStore::with_timeout("http://127.0.0.1:9", Duration::from_millis(500))
                .unwrap();
        let err = store.fetch(&UserKey::new("kim")).await.unwrap_err();
        assert!(matches!(err, StoreError::Network(_)));
    }
}
