//! HTTP remote client.
//!
//! JSON over HTTPS against the records API described in
//! [`tally_sync_protocol`]. Every request carries the bearer token from the
//! [`TokenStore`]. A 401 triggers one token refresh and one replay; other
//! retryable failures are retried with exponential backoff.

use crate::config::RemoteConfig;
use crate::error::{Result, SyncError};
use crate::remote::RemoteApi;
use crate::token::TokenStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use std::sync::Arc;
use tally_core::{Record, SyncId};
use tally_sync_protocol::{
    decode, routes, ApiErrorBody, CreateRecordResponse, ListQuery, ProtocolError, RecordPage,
};
use tracing::{debug, warn};

/// [`RemoteApi`] over HTTP.
pub struct HttpRemoteApi {
    base_url: String,
    config: RemoteConfig,
    client: reqwest::Client,
    tokens: Arc<dyn TokenStore>,
}

impl HttpRemoteApi {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if the base URL is empty or lacks
    /// an `http://` or `https://` scheme.
    pub fn new(config: RemoteConfig, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let base_url = normalize_base_url(&config.base_url)?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SyncError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            base_url,
            config,
            client,
            tokens,
        })
    }

    /// Returns the normalized base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Sends a request, retrying retryable failures with backoff.
    async fn execute<F>(&self, build: F) -> Result<Vec<u8>>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder + Sync,
    {
        let retry = &self.config.retry;
        let mut attempt = 0;

        loop {
            let delay = retry.delay_for_attempt(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.execute_once(&build).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt + 1 < retry.max_attempts => {
                    warn!(attempt, error = %e, "request failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Sends a request once, refreshing the token and replaying on a 401.
    async fn execute_once<F>(&self, build: &F) -> Result<Vec<u8>>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder + Sync,
    {
        let mut refreshed = false;

        loop {
            let token = self
                .tokens
                .access_token()
                .await
                .ok_or_else(|| SyncError::AuthenticationFailed("no access token".into()))?;

            let response = build(&self.client)
                .bearer_auth(&token)
                .header(ACCEPT, "application/json")
                .send()
                .await
                .map_err(map_transport_error)?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED && !refreshed {
                refreshed = true;
                if self.tokens.refresh().await? {
                    debug!("access token refreshed, replaying request");
                    continue;
                }
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(status_error(status, &body));
            }

            let body = response.bytes().await.map_err(map_transport_error)?;
            return Ok(body.to_vec());
        }
    }

    async fn list(&self, query: ListQuery) -> Result<Vec<Record>> {
        let url = self.url(routes::RECORDS);
        let mut query = query.with_limit(self.config.page_size);
        let mut records = Vec::new();

        loop {
            let body = self
                .execute(|client| client.get(&url).query(&query))
                .await?;
            let page: RecordPage = decode(&body)?;
            page.validate()?;
            records.extend(page.records);

            match page.next_page_token {
                Some(token) if query.page_token.as_deref() == Some(token.as_str()) => {
                    return Err(ProtocolError::invalid("server repeated a page token").into());
                }
                Some(token) => query.page_token = Some(token),
                None => break,
            }
        }

        debug!(count = records.len(), "listed remote records");
        Ok(records)
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn create(&self, record: &Record) -> Result<SyncId> {
        let url = self.url(routes::RECORDS);
        let body = self
            .execute(|client| client.post(&url).json(record))
            .await?;
        let response: CreateRecordResponse = decode(&body)?;
        Ok(response.sync_id)
    }

    async fn update(&self, sync_id: &SyncId, record: &Record) -> Result<()> {
        let url = self.url(&routes::record(sync_id.as_str()));
        self.execute(|client| client.put(&url).json(record)).await?;
        Ok(())
    }

    async fn list_changed_since(&self, since: DateTime<Utc>) -> Result<Vec<Record>> {
        self.list(ListQuery::changed_since(since)).await
    }

    async fn list_all(&self) -> Result<Vec<Record>> {
        self.list(ListQuery::all()).await
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SyncError::InvalidConfig("base URL must not be empty".into()));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(SyncError::InvalidConfig(
            "base URL must include http:// or https://".into(),
        ));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

fn map_transport_error(error: reqwest::Error) -> SyncError {
    if error.is_timeout() {
        SyncError::Timeout
    } else if error.is_connect() || error.is_request() || error.is_body() {
        SyncError::transport_retryable(error.to_string())
    } else {
        SyncError::transport_fatal(error.to_string())
    }
}

fn status_error(status: StatusCode, body: &str) -> SyncError {
    let message = parse_api_error(status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::AuthenticationFailed(message),
        StatusCode::REQUEST_TIMEOUT => SyncError::Timeout,
        StatusCode::TOO_MANY_REQUESTS => SyncError::ServerError(message),
        s if s.is_server_error() => SyncError::ServerError(message),
        s => SyncError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        return format!("{} ({})", payload.describe().trim(), status.as_u16());
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
