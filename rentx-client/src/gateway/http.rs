//! HTTP gateway backed by reqwest.

use super::{GatewayError, RemoteGateway};
use crate::config::RemoteConfig;
use async_trait::async_trait;
use rentx_types::{collections, Car, Changes, Checkpoint, PullResponse, RecordId, Rental};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Longest error body kept in a [`GatewayError::Status`].
const MAX_ERROR_BODY: usize = 512;

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GatewayError::Decode(e.to_string())
        } else {
            GatewayError::Network(e.to_string())
        }
    }
}

/// Gateway speaking the RentX JSON API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
}

impl HttpGateway {
    /// Create a gateway for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Network(format!("http client init: {}", e)))?;

        let base_url = Url::parse(base_url)
            .map_err(|e| GatewayError::Network(format!("invalid base url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Network(format!(
                "base url cannot carry a path: {}",
                base_url
            )));
        }

        Ok(Self { client, base_url })
    }

    /// Create a gateway from the `[remote]` config section.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, GatewayError> {
        Self::new(&config.base_url, config.request_timeout())
    }

    /// Base URL requests are issued against.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Endpoint URL under the base path. Each segment is percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                GatewayError::Network(format!("base url cannot carry a path: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, GatewayError> {
        debug!(%url, "GET");
        let response = self.client.get(url.clone()).send().await?;
        let response = check_status(response, url.path()).await?;
        decode(response).await
    }
}

/// Map non-success statuses onto the gateway taxonomy.
async fn check_status(response: Response, path: &str) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    Err(match status {
        StatusCode::NOT_FOUND => GatewayError::NotFound(path.to_string()),
        StatusCode::CONFLICT => GatewayError::Conflict(body),
        other => GatewayError::Status {
            status: other.as_u16(),
            body,
        },
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode(e.to_string()))
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn fetch_car_by_id(&self, id: &RecordId) -> Result<Car, GatewayError> {
        let url = self.url(&["cars", id.as_str()])?;
        self.get_json(url).await
    }

    async fn fetch_rentals(&self) -> Result<Vec<Rental>, GatewayError> {
        let url = self.url(&["rentals"])?;
        self.get_json(url).await
    }

    async fn pull_changes_since(
        &self,
        since: Option<Checkpoint>,
    ) -> Result<PullResponse, GatewayError> {
        // The server treats 0 as "from the beginning".
        let since = since.unwrap_or_else(Checkpoint::zero);
        let mut url = self.url(&["cars", "sync", "pull"])?;
        url.query_pairs_mut()
            .append_pair("lastPulledVersion", &since.to_string());
        self.get_json(url).await
    }

    async fn push_local_changes(&self, changes: &Changes) -> Result<(), GatewayError> {
        let users = changes.get(collections::USERS).cloned().unwrap_or_default();
        let url = self.url(&["users", "sync"])?;
        debug!(%url, records = users.len(), "POST");

        let response = self.client.post(url.clone()).json(&users).send().await?;
        check_status(response, url.path()).await?;
        Ok(())
    }
}
