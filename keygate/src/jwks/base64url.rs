//! Base64url decoding for key-publication documents.
//!
//! Authorities publish RSA components as base64url text, usually without
//! padding but not always. The decoder translates the URL-safe alphabet back
//! to the standard one and restores padding from the residue length before
//! handing the text to the standard engine.
//!
//! # Invariants
//! - A residue of 1 (`len % 4 == 1`) is never valid base64 and is rejected
//!   before decoding.
//! - Already padded input decodes to the same bytes as its unpadded form.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Error returned when a base64url value cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Base64UrlError {
    /// The input length leaves a residue of 1 modulo 4.
    InvalidLength(usize),
    /// The input contains invalid characters or trailing bits.
    InvalidEncoding(String),
}

impl std::fmt::Display for Base64UrlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLength(len) => {
                write!(f, "invalid base64url length {len} (residue 1 modulo 4)")
            }
            Self::InvalidEncoding(reason) => write!(f, "invalid base64url: {reason}"),
        }
    }
}

impl std::error::Error for Base64UrlError {}

/// Decodes base64url text, restoring any missing padding.
///
/// # Errors
/// Returns `Base64UrlError::InvalidLength` for a residue of 1 and
/// `Base64UrlError::InvalidEncoding` when the engine rejects the text.
pub fn decode_base64url(input: &str) -> Result<Vec<u8>, Base64UrlError> {
    let mut text: String = input
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    match text.len() % 4 {
        1 => return Err(Base64UrlError::InvalidLength(text.len())),
        2 => text.push_str("=="),
        3 => text.push('='),
        _ => {}
    }

    STANDARD
        .decode(text.as_bytes())
        .map_err(|e| Base64UrlError::InvalidEncoding(e.to_string()))
}
