//! HTTP access to the changes feed and the patch endpoint.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use bloomsync_core::types::{CardStateView, OrderCardPatch};

use crate::error::ClientError;

/// One page of the polling feed.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangesPage {
    pub changes: Vec<CardStateView>,
    /// Watermark for the next poll.
    pub server_timestamp: DateTime<Utc>,
}

/// The two server calls [`crate::SyncSession`] depends on, behind a trait so
/// session logic is testable without a server.
pub trait ChangesApi {
    fn fetch_changes(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<ChangesPage, ClientError>>;

    fn patch_card(
        &self,
        card_id: &str,
        patch: &OrderCardPatch,
    ) -> impl Future<Output = Result<CardStateView, ClientError>>;
}

/// Server error envelope, `{"error": {"code", "message"}, ...}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Success envelope, `{"data": ..., "meta": ...}`.
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// [`ChangesApi`] over HTTP against a bloomsync server.
#[derive(Debug, Clone)]
pub struct HttpChangesApi {
    http: reqwest::Client,
    base_url: String,
    tenant_id: String,
    actor_id: String,
    api_key: Option<String>,
}

impl HttpChangesApi {
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        base_url: &str,
        tenant_id: &str,
        actor_id: &str,
        api_key: Option<String>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tenant_id: tenant_id.to_string(),
            actor_id: actor_id.to_string(),
            api_key,
        })
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method, url)
            .header("x-actor-id", &self.actor_id);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    async fn decode_error(response: reqwest::Response, card_id: Option<&str>) -> ClientError {
        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return ClientError::Http(e),
        };
        let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) else {
            return ClientError::Api {
                status,
                code: "unknown".to_string(),
                message: body,
            };
        };

        if envelope.error.code == "conflict_stale" {
            if let Some(card_id) = card_id {
                return ClientError::StaleCard {
                    card_id: card_id.to_string(),
                };
            }
        }
        ClientError::Api {
            status,
            code: envelope.error.code,
            message: envelope.error.message,
        }
    }
}

impl ChangesApi for HttpChangesApi {
    async fn fetch_changes(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<ChangesPage, ClientError> {
        let url = format!("{}/api/v1/card-states/changes", self.base_url);
        let mut request = self
            .request(reqwest::Method::GET, url)
            .query(&[("tenant_id", self.tenant_id.as_str())]);
        if let Some(since) = since {
            // RFC 3339 carries a '+' in the offset; the query builder
            // percent-encodes it so the server does not read a space.
            request = request.query(&[("since", since.to_rfc3339())]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Self::decode_error(response, None).await);
        }

        let body = response.text().await?;
        let envelope: DataEnvelope<ChangesPage> =
            serde_json::from_str(&body).map_err(|e| ClientError::Deserialize {
                context: "changes page".to_string(),
                source: e,
            })?;
        Ok(envelope.data)
    }

    async fn patch_card(
        &self,
        card_id: &str,
        patch: &OrderCardPatch,
    ) -> Result<CardStateView, ClientError> {
        let url = format!("{}/api/v1/card-states/{card_id}", self.base_url);

        let response = self
            .request(reqwest::Method::PATCH, url)
            .query(&[("tenant_id", self.tenant_id.as_str())])
            .json(patch)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::decode_error(response, Some(card_id)).await);
        }

        let body = response.text().await?;
        let envelope: DataEnvelope<CardStateView> =
            serde_json::from_str(&body).map_err(|e| ClientError::Deserialize {
                context: "patched card state".to_string(),
                source: e,
            })?;
        Ok(envelope.data)
    }
}
