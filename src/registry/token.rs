//! Decoding of the registry's combined authorization token.
//!
//! The identity layer hands out a base64 payload of the form `principal:secret`. Only the
//! secret is used as a password; the principal is replaced by the registry's fixed identity
//! (see `SyncConfig::username`).

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to decode authorization token: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    #[error("authorization token is not valid UTF-8")]
    NotUtf8,

    #[error("unexpected authorization token format: expected one ':' separator, found {0}")]
    WrongFormat(usize),
}

/// Principal and secret split out of an authorization token
#[derive(PartialEq, Eq)]
pub struct DecodedToken {
    pub principal: String,
    pub secret: String,
}

impl std::fmt::Debug for DecodedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedToken")
            .field("principal", &self.principal)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Decode a base64url authorization token into its two parts.
///
/// Exactly one `:` separator is accepted; anything else is a format error.
pub fn decode(raw_token: &str) -> Result<DecodedToken, TokenError> {
    let raw_token = raw_token.trim();
    // Some identity layers hand out the standard alphabet despite documenting base64url
    let bytes = URL_SAFE
        .decode(raw_token)
        .or_else(|err| STANDARD.decode(raw_token).map_err(|_| err))?;
    let decoded = String::from_utf8(bytes).map_err(|_| TokenError::NotUtf8)?;

    let separators = decoded.matches(':').count();
    if separators != 1 {
        return Err(TokenError::WrongFormat(separators));
    }

    let (principal, secret) = decoded
        .split_once(':')
        .ok_or(TokenError::WrongFormat(separators))?;

    Ok(DecodedToken {
        principal: principal.to_string(),
        secret: secret.to_string(),
    })
}
