//! Retrieval of archive bytes.
//!
//! `http(s)://` URLs go through a blocking `reqwest` client, `file://` URLs
//! are read from disk. The [`Fetcher`] trait lets the installer be driven
//! without a network.

use std::time::Duration;
use reqwest::blocking::Client;
use tracing::debug;

const USER_AGENT: &str = concat!("brewlet/", env!("CARGO_PKG_VERSION"));
const FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors arising while retrieving an archive.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request could not be sent or the body not read.
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {status}")]
    Status { status: u16 },

    /// A `file://` URL could not be read.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// The URL scheme is not supported.
    #[error("unsupported url scheme")]
    UnsupportedScheme,
}

/// Something that can turn a URL into bytes.
pub trait Fetcher {
    /// Retrieve the full content addressed by `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] describing why the content is unavailable.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Default fetcher for `http(s)://` and `file://` URLs.
#[derive(Debug, Default)]
pub struct UrlFetcher;

impl Fetcher for UrlFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if let Some(path) = url.strip_prefix("file://") {
            debug!(path, "reading local archive");
            return Ok(std::fs::read(path)?);
        }
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(FetchError::UnsupportedScheme);
        }
        debug!(url, "downloading");
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()?;
        let response = client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.bytes()?.to_vec())
    }
}
