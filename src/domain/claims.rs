//! Bearer token decoding.
//!
//! The client never verifies signatures; it only reads the payload segment of
//! the JWT to learn who is logged in and when the token stops being usable.
//! A token that cannot be decoded into every required claim is treated
//! exactly like a missing token.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::entities::User;

pub const CLAIM_NAME_ID: &str =
    "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier";
pub const CLAIM_NAME: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token must have three segments, found {0}")]
    Segments(usize),
    #[error("token payload is not base64url: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("token payload is not a valid claim set: {0}")]
    Claims(#[from] serde_json::Error),
}

// Claim set carried by the backend's tokens.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Claims {
    #[serde(
        rename = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier",
        alias = "sub"
    )]
    pub subject: String,
    #[serde(
        rename = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name",
        alias = "name"
    )]
    pub name: String,
    pub exp: u64,
    #[serde(default)]
    pub iss: Option<String>,
    // A single audience string or an array of them.
    #[serde(default)]
    pub aud: Option<Value>,
}

impl Claims {
    // Expired once the expiry lies strictly before `now`.
    pub fn is_expired(&self, now_epoch_seconds: u64) -> bool {
        self.exp < now_epoch_seconds
    }

    pub fn user(&self) -> User {
        User {
            id: self.subject.clone(),
            username: self.name.clone(),
        }
    }
}

pub fn decode_token(token: &str) -> Result<Claims, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::Segments(segments.len()));
    }

    // Some issuers keep the base64 padding; the URL-safe alphabet is mandatory.
    let payload = URL_SAFE_NO_PAD.decode(segments[1].trim_end_matches('='))?;
    Ok(serde_json::from_slice(&payload)?)
}
