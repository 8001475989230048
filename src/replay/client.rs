use futures::{StreamExt, TryStreamExt};
use reqwest::StatusCode;
use serde_json::json;
use std::fmt;
use tokio_util::sync::CancellationToken;

use super::error::ReplayError;
use super::retry::{retry_with_backoff, RetryPolicy};
use crate::config::ReplayConfig;
use crate::indexer::payload::ChainhookPayload;

const API_KEY_HEADER: &str = "x-api-key";

/// Which historical block to replay. Exactly one selector per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockSelector {
    Height(u64),
    /// `0x`-prefixed, 32-byte hex index block hash.
    IndexBlockHash(String),
}

impl BlockSelector {
    fn validate(&self) -> Result<(), ReplayError> {
        match self {
            Self::Height(_) => Ok(()),
            Self::IndexBlockHash(hash) => {
                let digits = hash.strip_prefix("0x").ok_or_else(|| {
                    ReplayError::InvalidRequest(format!("block hash '{}' must start with 0x", hash))
                })?;
                match hex::decode(digits) {
                    Ok(bytes) if bytes.len() == 32 => Ok(()),
                    Ok(bytes) => Err(ReplayError::InvalidRequest(format!(
                        "block hash '{}' is {} bytes, expected 32",
                        hash,
                        bytes.len()
                    ))),
                    Err(e) => Err(ReplayError::InvalidRequest(format!(
                        "block hash '{}' is not hex: {}",
                        hash, e
                    ))),
                }
            }
        }
    }

    fn request_body(&self) -> serde_json::Value {
        match self {
            Self::Height(height) => json!({ "block_height": height }),
            Self::IndexBlockHash(hash) => json!({ "index_block_hash": hash }),
        }
    }
}

impl fmt::Display for BlockSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Height(height) => write!(f, "height {}", height),
            Self::IndexBlockHash(hash) => write!(f, "hash {}", hash),
        }
    }
}

/// Client for the hosted chainhook service's block evaluation endpoint.
///
/// Cheap to clone; clones share the underlying connection pool and nothing else.
#[derive(Debug, Clone)]
pub struct ReplayClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
    concurrency: usize,
}

impl ReplayClient {
    pub fn new(config: &ReplayConfig) -> Result<Self, ReplayError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("chainhook-ingest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ReplayError::InvalidRequest(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            retry: RetryPolicy::from_config(config),
            concurrency: config.concurrency.max(1),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn evaluate_url(&self, stream_id: &str) -> String {
        format!("{}/chainhooks/v1/me/{}/evaluate", self.base_url, stream_id)
    }

    /// Fetch the payload for one historical block.
    ///
    /// Returns `Ok(None)` if the service has not produced the block (HTTP 404/204).
    /// Transient failures are retried with bounded exponential backoff; "not found",
    /// auth failures and other rejections are returned immediately.
    pub async fn replay_block(
        &self,
        stream_id: &str,
        selector: &BlockSelector,
    ) -> Result<Option<ChainhookPayload>, ReplayError> {
        validate_stream_id(stream_id)?;
        selector.validate()?;

        let url = self.evaluate_url(stream_id);
        let body = selector.request_body();

        tracing::debug!(stream = %stream_id, block = %selector, "Replaying block");

        let payload = retry_with_backoff(&self.retry, || self.send_once(&url, &body)).await?;

        match &payload {
            Some(p) => tracing::info!(
                stream = %stream_id,
                block = %selector,
                apply = p.apply.len(),
                rollback = p.rollback.len(),
                "Block replayed"
            ),
            None => tracing::info!(
                stream = %stream_id,
                block = %selector,
                "Block not available for replay"
            ),
        }

        Ok(payload)
    }

    /// Like [`replay_block`](Self::replay_block), but gives up with
    /// [`ReplayError::Cancelled`] as soon as `cancel` fires.
    pub async fn replay_block_cancellable(
        &self,
        stream_id: &str,
        selector: &BlockSelector,
        cancel: &CancellationToken,
    ) -> Result<Option<ChainhookPayload>, ReplayError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(stream = %stream_id, block = %selector, "Replay cancelled");
                Err(ReplayError::Cancelled)
            }
            result = self.replay_block(stream_id, selector) => result,
        }
    }

    /// Replay heights `from..=to` with bounded parallelism.
    ///
    /// Results come back in ascending height order regardless of completion order.
    /// The first hard error aborts the range.
    pub async fn replay_range(
        &self,
        stream_id: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<(u64, Option<ChainhookPayload>)>, ReplayError> {
        if from > to {
            return Err(ReplayError::InvalidRequest(format!(
                "empty height range {}..={}",
                from, to
            )));
        }
        validate_stream_id(stream_id)?;

        tracing::info!(
            stream = %stream_id,
            from,
            to,
            concurrency = self.concurrency,
            "Replaying block range"
        );

        futures::stream::iter(from..=to)
            .map(|height| async move {
                self.replay_block(stream_id, &BlockSelector::Height(height))
                    .await
                    .map(|payload| (height, payload))
            })
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    async fn send_once(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<Option<ChainhookPayload>, ReplayError> {
        let mut request = self.http.post(url).json(body);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReplayError::from_status(status.as_u16(), body));
        }

        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        serde_json::from_slice::<Option<ChainhookPayload>>(&bytes)
            .map_err(|e| ReplayError::Decode(e.to_string()))
    }
}

fn validate_stream_id(stream_id: &str) -> Result<(), ReplayError> {
    if stream_id.is_empty() {
        return Err(ReplayError::InvalidRequest("stream id is empty".to_string()));
    }
    if !stream_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ReplayError::InvalidRequest(format!(
            "stream id '{}' contains invalid characters",
            stream_id
        )));
    }
    Ok(())
}
