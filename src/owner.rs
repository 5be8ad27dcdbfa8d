use std::fmt;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::error::AppError;

pub const OWNER_HEADER: &str = "x-owner-id";

/// Opaque user/session identifier a meal log belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Owner(String);

impl Owner {
    pub fn parse(raw: &str) -> Option<Self> {
        lazy_static! {
            static ref OWNER_RE: Regex = Regex::new(r"^[A-Za-z0-9_.:@-]{1,128}$").unwrap();
        }
        let raw = raw.trim();
        OWNER_RE.is_match(raw).then(|| Owner(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reads the owner from the `X-Owner-Id` header. How the caller was
/// authenticated is decided upstream of this service.
#[async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|h| h.to_str().ok())
            .and_then(Owner::parse)
            .ok_or(AppError::MissingOwner)
    }
}
