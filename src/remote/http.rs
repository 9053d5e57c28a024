//! reqwest-backed remote client and connectivity probe

use super::{ConnectivityProbe, RemoteApi, RemoteError};
use crate::local_db::AssetMeta;
use crate::shared::config::AppConfig;
use crate::shared::types::{CatalogRoom, InspectionState};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde_json::Value;
use std::time::Duration;

/// Upper bound for a single probe request
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// HTTP client for the remote system of record
#[derive(Debug, Clone)]
pub struct HttpRemote {
    config: AppConfig,
    client: Client,
}

impl HttpRemote {
    pub fn new(config: AppConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RemoteError::Network(format!("failed to build client: {e}")))?;

        Ok(Self { config, client })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            return Err(RemoteError::http(status.as_u16(), error_text));
        }

        Ok(response)
    }

    fn classify(&self, error: reqwest::Error) -> RemoteError {
        if error.is_timeout() {
            RemoteError::Timeout(self.config.request_timeout)
        } else if error.is_decode() {
            RemoteError::Decode(error.to_string())
        } else {
            RemoteError::Network(error.to_string())
        }
    }

    /// `/api/entities/{entity_id}[/{resource}]` with the id as one encoded segment
    fn entity_url(&self, entity_id: &str, resource: Option<&str>) -> Result<Url, RemoteError> {
        let base = self.config.api_url("/api/entities");
        let mut url = Url::parse(&base)
            .map_err(|e| RemoteError::Network(format!("invalid server url {base}: {e}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| RemoteError::Network(format!("server url {base} cannot be a base")))?;
            segments.pop_if_empty().push(entity_id);
            if let Some(resource) = resource {
                segments.push(resource);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn update_entity(&self, entity_id: &str, data: &Value) -> Result<(), RemoteError> {
        let url = self.entity_url(entity_id, None)?;
        self.send(self.client.put(url).json(data)).await?;
        Ok(())
    }

    async fn save_inspection(
        &self,
        entity_id: &str,
        snapshot: &InspectionState,
    ) -> Result<(), RemoteError> {
        let url = self.entity_url(entity_id, Some("inspection"))?;
        self.send(self.client.put(url).json(snapshot)).await?;
        Ok(())
    }

    async fn upload_asset(
        &self,
        entity_id: &str,
        meta: &AssetMeta,
        bytes: Bytes,
    ) -> Result<(), RemoteError> {
        let url = self.entity_url(entity_id, Some("assets"))?;
        let request = self
            .client
            .post(url)
            .query(&[("roomId", meta.parent_room_id.to_string())])
            .header("Content-Type", meta.content_type.as_str())
            .header("X-Asset-Id", meta.id.as_str())
            .body(bytes);
        self.send(request).await?;
        Ok(())
    }

    async fn update_offer(&self, entity_id: &str, offer_data: &Value) -> Result<(), RemoteError> {
        let url = self.entity_url(entity_id, Some("offer"))?;
        self.send(self.client.put(url).json(offer_data)).await?;
        Ok(())
    }

    async fn fetch_catalog(&self) -> Result<Vec<CatalogRoom>, RemoteError> {
        let url = self.config.api_url("/api/catalog/rooms");
        let response = self.send(self.client.get(&url)).await?;

        response
            .json::<Vec<CatalogRoom>>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

/// Lightweight reachability probe against the health endpoint
///
/// Any answer below 500 means the server is reachable, even an auth error.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: String,
    client: Client,
}

impl HttpProbe {
    pub fn new(config: &AppConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::Network(format!("failed to build client: {e}")))?;

        Ok(Self {
            url: config.api_url(&config.probe_path),
            client,
        })
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn probe(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => !response.status().is_server_error(),
            Err(e) => {
                tracing::debug!(error = %e, "connectivity probe failed");
                false
            }
        }
    }
}
