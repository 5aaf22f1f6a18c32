#![doc = "Sigma API client: bridges the core `ModelApi` trait to the vendor's REST endpoints."]
//
//! # Sigma client (CLI <-> Core)
//!
//! [`SigmaClient`] implements [`model_sync_core::contract::ModelApi`] on top
//! of reqwest. A bearer token is obtained once per process through the
//! client-credentials exchange and sent with every request.
//!
//! - Construct with [`SigmaClient::from_env`] (reads `SIGMA_CLIENT_ID`,
//!   `SIGMA_SECRET`, `SIGMA_CLOUD`, `SIGMA_BASE_URL`) or [`SigmaClient::connect`].
//! - Non-success statuses become [`ApiError`] variants via
//!   [`ApiError::from_status`]; no retries beyond reqwest's defaults.

use async_trait::async_trait;
use model_sync_core::contract::{ApiError, CreatedModel, ModelApi, RemoteModel};
use model_sync_core::mapping::ModelMapping;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

use crate::load_config::{credentials_from_env, resolve_base_url, Credentials};

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    entries: Vec<RemoteModel>,
    #[serde(rename = "nextPage", default)]
    next_page: Option<Value>,
}

pub struct SigmaClient {
    http: Client,
    base_url: String,
    access_token: String,
}

impl SigmaClient {
    /// Exchange the credentials for a token against `base_url`.
    pub async fn connect(base_url: &str, credentials: &Credentials) -> Result<Self, ApiError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let http = Client::new();
        tracing::info!(base_url = %base_url, "Authenticating with Sigma");

        let resp = http
            .post(format!("{base_url}/v2/auth/token"))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Token request failed");
                ApiError::Transport(e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(status = %status, "Authentication failed");
            return Err(ApiError::Auth(format!("status {status}: {body}")));
        }
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("token response: {e}")))?;

        tracing::info!("Authenticated successfully");
        Ok(SigmaClient {
            http,
            base_url,
            access_token: token.access_token,
        })
    }

    pub async fn from_env(mapping: &ModelMapping) -> anyhow::Result<Self> {
        let credentials = credentials_from_env()?;
        let base_url = resolve_base_url(mapping)?;
        let client = Self::connect(&base_url, &credentials).await?;
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, req: RequestBuilder, what: &str) -> Result<Value, ApiError> {
        let resp = req
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| ApiError::Transport(format!("{what}: {e}")))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ApiError::Transport(format!("{what}: {e}")))?;
        if !status.is_success() {
            tracing::error!(status = %status, what, "API request failed");
            return Err(ApiError::from_status(status.as_u16(), body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(format!("{what}: {e}")))
    }
}

#[async_trait]
impl ModelApi for SigmaClient {
    async fn list_models(&self) -> Result<Vec<RemoteModel>, ApiError> {
        let mut models = Vec::new();
        let mut page: Option<String> = None;
        let mut seen_pages: HashSet<String> = HashSet::new();
        loop {
            let mut req = self.http.get(format!("{}/v2/datamodels", self.base_url));
            if let Some(token) = &page {
                req = req.query(&[("page", token.as_str())]);
            }
            let value = self.send(req, "list data models").await?;
            let listed: ListResponse = serde_json::from_value(value)
                .map_err(|e| ApiError::Decode(format!("list data models: {e}")))?;
            models.extend(listed.entries);

            let next = match listed.next_page {
                Some(Value::String(s)) if !s.is_empty() => Some(s),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };
            match next {
                Some(token) if seen_pages.insert(token.clone()) => page = Some(token),
                Some(token) => {
                    tracing::warn!(page = %token, "Listing returned a page token seen before, stopping");
                    break;
                }
                None => break,
            }
        }
        tracing::info!(count = models.len(), "Listed data models");
        Ok(models)
    }

    async fn get_model(&self, data_model_id: &str) -> Result<Value, ApiError> {
        tracing::info!(data_model_id, "Fetching data model spec");
        let req = self.http.get(format!(
            "{}/v3alpha/datamodels/{data_model_id}/spec",
            self.base_url
        ));
        self.send(req, "get data model spec").await
    }

    async fn create_model(&self, spec: &Value) -> Result<CreatedModel, ApiError> {
        tracing::info!(name = ?spec.get("name"), "Creating data model");
        let req = self
            .http
            .post(format!("{}/v3alpha/datamodels/spec", self.base_url))
            .json(spec);
        let created = self.send(req, "create data model").await?;
        match created.get("dataModelId").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => {
                tracing::info!(data_model_id = id, "Created data model");
                Ok(CreatedModel {
                    data_model_id: id.to_string(),
                })
            }
            _ => Err(ApiError::Decode(
                "create data model: response has no dataModelId".to_string(),
            )),
        }
    }

    async fn update_model(&self, data_model_id: &str, spec: &Value) -> Result<Value, ApiError> {
        tracing::info!(data_model_id, "Updating data model");
        let req = self
            .http
            .put(format!(
                "{}/v3alpha/datamodels/{data_model_id}/spec",
                self.base_url
            ))
            .json(spec);
        self.send(req, "update data model").await
    }
}
