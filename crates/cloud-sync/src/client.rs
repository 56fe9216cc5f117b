//! HTTP client for the per-tenant document API.
//!
//! Layout: `{base}/tenants/{tenant}/{collection}` lists a collection and
//! `{base}/tenants/{tenant}/{collection}/{id}` addresses one document.

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;

use rentdesk_core::sync::{RemoteStore, SyncEntity};

use crate::config::RemoteConfig;
use crate::error::{CloudError, Result};

const MAX_LOG_BODY_CHARS: usize = 512;

#[derive(Deserialize)]
#[serde(untagged)]
enum CollectionResponse {
    Bare(Vec<Value>),
    Wrapped { documents: Vec<Value> },
}

impl CollectionResponse {
    fn into_documents(self) -> Vec<Value> {
        match self {
            Self::Bare(documents) | Self::Wrapped { documents } => documents,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpRemoteStore {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url,
            access_token: config.access_token,
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.access_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| CloudError::auth("Invalid access token format"))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn collection_url(&self, tenant_id: &str, entity: SyncEntity) -> Result<String> {
        let tenant_id = tenant_id.trim();
        if tenant_id.is_empty() {
            return Err(CloudError::invalid_request("tenant id must not be empty"));
        }
        Ok(format!(
            "{}/tenants/{}/{}",
            self.base_url,
            urlencoding::encode(tenant_id),
            entity.table_name()
        ))
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("[Remote] Response status: {}", status);
            return;
        }
        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("[Remote] Error response ({}): {}", status, preview);
    }

    async fn read_body(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);
        if !status.is_success() {
            return Err(CloudError::api(
                status.as_u16(),
                format!("Request failed: {}", body),
            ));
        }
        Ok(body)
    }

    pub async fn list_documents(&self, tenant_id: &str, entity: SyncEntity) -> Result<Vec<Value>> {
        let url = self.collection_url(tenant_id, entity)?;
        let response = self.client.get(&url).headers(self.headers()?).send().await?;

        // A tenant that never pushed this collection has nothing to restore.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("[Remote] {} not found, treating as empty", url);
            return Ok(Vec::new());
        }

        let body = Self::read_body(response).await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let parsed: CollectionResponse = serde_json::from_str(&body)?;
        Ok(parsed.into_documents())
    }

    pub async fn upsert_document(
        &self,
        tenant_id: &str,
        entity: SyncEntity,
        document_id: &str,
        document: &Value,
    ) -> Result<()> {
        let document_id = document_id.trim();
        if document_id.is_empty() {
            return Err(CloudError::invalid_request("document id must not be empty"));
        }
        let url = format!(
            "{}/{}",
            self.collection_url(tenant_id, entity)?,
            urlencoding::encode(document_id)
        );
        let response = self
            .client
            .put(&url)
            .headers(self.headers()?)
            .json(document)
            .send()
            .await?;
        Self::read_body(response).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn fetch_collection(
        &self,
        tenant_id: &str,
        entity: SyncEntity,
    ) -> rentdesk_core::Result<Vec<Value>> {
        Ok(self.list_documents(tenant_id, entity).await?)
    }

    async fn put_document(
        &self,
        tenant_id: &str,
        entity: SyncEntity,
        document_id: &str,
        document: &Value,
    ) -> rentdesk_core::Result<()> {
        Ok(self
            .upsert_document(tenant_id, entity, document_id, document)
            .await?)
    }
}
