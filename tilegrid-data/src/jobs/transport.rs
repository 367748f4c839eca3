//! Package transport seam and its HTTP implementation.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// User agent reported by the HTTP transport unless overridden.
pub const DEFAULT_USER_AGENT: &str = "tilegrid-engine/0.1";

/// Transport-level errors encountered while fetching a package.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The server returned an HTTP error status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Fully qualified request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Short error description supplied by the server.
        message: String,
    },
    /// The request failed due to an I/O error.
    #[error("network error contacting {url}: {source}")]
    Network {
        /// Fully qualified request URL.
        url: String,
        /// I/O error reported by the transport.
        #[source]
        source: io::Error,
    },
    /// The fetched bytes could not be written to the destination file.
    #[error("failed to write download to {path:?}: {source}")]
    Write {
        /// Destination file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Fetches one package from a URL into a destination file.
#[async_trait]
pub trait PackageTransport: Send + Sync {
    /// Stream the package at `url` into `destination` and return the number
    /// of bytes written.
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, TransportError>;
}

/// HTTP implementation of [`PackageTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    user_agent: String,
}

impl HttpTransport {
    /// Construct an HTTP-backed transport.
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("client builder only fails with invalid configuration");
        Self {
            client,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }

    /// Override the default user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PackageTransport for HttpTransport {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, TransportError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent.as_str())
            .send()
            .await
            .map_err(|error| convert_reqwest_error(error, url))?
            .error_for_status()
            .map_err(|error| convert_reqwest_error(error, url))?;

        let mut file = tokio::fs::File::create(destination).await.map_err(|source| {
            TransportError::Write {
                path: destination.to_path_buf(),
                source,
            }
        })?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|error| convert_reqwest_error(error, url))?;
            file.write_all(&chunk)
                .await
                .map_err(|source| TransportError::Write {
                    path: destination.to_path_buf(),
                    source,
                })?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|source| TransportError::Write {
                path: destination.to_path_buf(),
                source,
            })?;
        Ok(written)
    }
}

fn convert_reqwest_error(error: reqwest::Error, url: &str) -> TransportError {
    if let Some(status) = error.status() {
        return TransportError::Http {
            url: url.to_owned(),
            status: status.as_u16(),
            message: error.to_string(),
        };
    }

    let kind = if error.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::Other
    };
    TransportError::Network {
        url: url.to_owned(),
        source: io::Error::new(kind, error),
    }
}
