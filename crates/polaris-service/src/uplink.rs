//! Upload client for the collection endpoint.
//!
//! [`Uplink`] is the seam the sync loop talks to; [`HttpUplink`] is the
//! production implementation that POSTs `{ "logs": [...] }` to
//! `<endpoint>/api/v1/panel/submitLogs`.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use polaris_types::wire::{LogPayload, WireRecord};

use crate::config::UplinkConfig;

/// Something that can accept a batch of records.
#[async_trait]
pub trait Uplink: Send + Sync {
    /// Submit a batch. Returns true only if the endpoint accepted it.
    async fn submit(&self, logs: &[WireRecord]) -> bool;
}

/// Error type for upload attempts.
#[derive(Debug, thiserror::Error)]
pub enum UplinkError {
    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request never produced a response (connect error, timeout, ...).
    #[error("Upload to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered with a non-2xx status.
    #[error("Upload rejected with HTTP {status}")]
    Status { status: u16 },
}

/// HTTP implementation of [`Uplink`].
#[derive(Debug, Clone)]
pub struct HttpUplink {
    client: Client,
    url: String,
}

impl HttpUplink {
    /// Create a client for the configured endpoint.
    pub fn new(config: &UplinkConfig) -> Result<Self, UplinkError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(UplinkError::Client)?;

        Ok(Self {
            client,
            url: config.submit_url(),
        })
    }

    /// The URL batches are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Submit a batch, reporting why it failed.
    pub async fn try_submit(&self, logs: &[WireRecord]) -> Result<(), UplinkError> {
        let payload = LogPayload::new(logs.to_vec());

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|source| UplinkError::Transport {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            debug!("Endpoint accepted {} record(s) ({})", logs.len(), status);
            Ok(())
        } else {
            Err(UplinkError::Status {
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl Uplink for HttpUplink {
    async fn submit(&self, logs: &[WireRecord]) -> bool {
        match self.try_submit(logs).await {
            Ok(()) => true,
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }
}
