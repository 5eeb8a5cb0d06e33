//! Keyset resolution.
//!
//! Fetches a key-publication document from an authority and turns it into a
//! `Keyset`. Failures to obtain or parse the document as a whole are returned
//! as `FetchError`; failures of individual entries are logged and skipped.
//!
//! # Pre-conditions
//! - The authority URL is an absolute `http` or `https` URL.
//!
//! # Post-conditions
//! - A returned keyset contains exactly the entries that decoded.
//! - No retry happens here; retrying is up to the caller.

mod base64url;
mod key;
mod keyset;
pub mod refresh;

pub use base64url::{Base64UrlError, decode_base64url};
pub use key::{KeyEntry, KeyEntryError, VerifiablePublicKey};
pub use keyset::{KeyPublicationDocument, Keyset, KeysetHandle};
pub use refresh::{KeysetRefresher, spawn_refresh_task};

use std::time::Duration;

/// Largest key-publication document accepted, in bytes.
pub const MAX_DOCUMENT_SIZE: usize = 64 * 1024;

/// Error returned when a keyset cannot be obtained.
#[derive(Debug)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read.
    Network(reqwest::Error),
    /// The request did not complete within the configured timeout.
    Timeout,
    /// The authority answered with a non-success status.
    Status(u16),
    /// The document exceeds `MAX_DOCUMENT_SIZE`.
    DocumentTooLarge {
        /// The size limit in bytes.
        limit: usize,
    },
    /// The document is not a JSON object with a `keys` array.
    Document(serde_json::Error),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(e) => write!(f, "keyset request failed: {e}"),
            Self::Timeout => write!(f, "keyset request timed out"),
            Self::Status(status) => write!(f, "keyset request returned HTTP {status}"),
            Self::DocumentTooLarge { limit } => {
                write!(f, "keyset document exceeds {limit} bytes")
            }
            Self::Document(e) => write!(f, "invalid keyset document: {e}"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Network(e) => Some(e),
            Self::Document(e) => Some(e),
            Self::Timeout | Self::Status(_) | Self::DocumentTooLarge { .. } => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(e)
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        Self::Document(e)
    }
}

/// Build the HTTP client used for keyset fetches.
///
/// # Errors
/// Returns `FetchError::Network` if the TLS backend cannot be initialised.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, FetchError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("keygate/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Fetch the keyset published at `url`, bounded by `timeout`.
///
/// # Errors
/// Returns `FetchError` on network failure, timeout, non-2xx status, an
/// oversized body, or a document that is not `{"keys": [...]}`.
pub async fn fetch_keyset(url: &str, timeout: Duration) -> Result<Keyset, FetchError> {
    let client = http_client(timeout)?;
    fetch_keyset_with(&client, url).await
}

/// Fetch the keyset published at `url` with an existing client.
///
/// The client's own timeout bounds the request.
///
/// # Errors
/// See `fetch_keyset`.
pub async fn fetch_keyset_with(client: &reqwest::Client, url: &str) -> Result<Keyset, FetchError> {
    let mut response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    if response
        .content_length()
        .is_some_and(|len| len > MAX_DOCUMENT_SIZE as u64)
    {
        return Err(FetchError::DocumentTooLarge {
            limit: MAX_DOCUMENT_SIZE,
        });
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > MAX_DOCUMENT_SIZE {
            return Err(FetchError::DocumentTooLarge {
                limit: MAX_DOCUMENT_SIZE,
            });
        }
        body.extend_from_slice(&chunk);
    }

    let keyset = parse_keyset(&body)?;
    tracing::info!("fetched keyset from {url} with {} keys", keyset.len());
    Ok(keyset)
}

/// Parse a key-publication document.
///
/// # Errors
/// Returns `FetchError::Document` if the body is not a JSON object with a
/// `keys` array. Individual entries never cause an error.
pub fn parse_keyset(body: &[u8]) -> Result<Keyset, FetchError> {
    let document: KeyPublicationDocument = serde_json::from_slice(body)?;
    Ok(Keyset::from_document(document))
}
