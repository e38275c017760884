use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use subtle::ConstantTimeEq;

use crate::error::FeedError;
use crate::router::FeedState;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const API_KEY_QUERY: &str = "api_key";

/// Ensure the inbound request carries the shared API key.
/// Accepts either:
/// - Header: `X-Api-Key: ...` (any casing)
/// - Query string: `?api_key=...`
///
/// An empty `expected` key rejects everything.
pub fn ensure_authorized(
    headers: &HeaderMap,
    query: Option<&str>,
    expected: &str,
) -> Result<(), FeedError> {
    if expected.is_empty() {
        return Err(FeedError::AuthFailure);
    }

    // 1) header: x-api-key
    if let Some(hv) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok())
        && key_matches(hv.trim(), expected)
    {
        return Ok(());
    }

    // 2) query: api_key=...
    if let Some(qs) = query {
        for (k, v) in url::form_urlencoded::parse(qs.as_bytes()) {
            if k == API_KEY_QUERY && key_matches(&v, expected) {
                return Ok(());
            }
        }
    }

    Err(FeedError::AuthFailure)
}

fn key_matches(provided: &str, expected: &str) -> bool {
    bool::from(provided.as_bytes().ct_eq(expected.as_bytes()))
}

/// Extractor guarding the feed handlers.
#[derive(Debug, Clone, Copy)]
pub struct RequireApiKey;

impl FromRequestParts<FeedState> for RequireApiKey {
    type Rejection = FeedError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &FeedState,
    ) -> Result<Self, Self::Rejection> {
        ensure_authorized(&parts.headers, parts.uri.query(), state.api_key())?;
        Ok(Self)
    }
}
