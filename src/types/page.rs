use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::Serialize;

use crate::db::source::Row;

pub const DEFAULT_DAYS: i64 = 2;
pub const MIN_DAYS: i64 = 1;
pub const MAX_DAYS: i64 = 30;
pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 5000;
pub const MAX_LIMIT: i64 = 10_000;

/// Clamped pagination and window parameters for one feed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub days: i64,
    pub page: i64,
    pub limit: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

impl PageRequest {
    /// Missing values take their defaults; `days` is clamped to [1, 30],
    /// `page` is at least 1, `limit` ≤ 0 takes the default and is capped at 10000.
    pub fn new(days: Option<i64>, page: Option<i64>, limit: Option<i64>) -> Self {
        let days = days.unwrap_or(DEFAULT_DAYS).clamp(MIN_DAYS, MAX_DAYS);
        let page = page.unwrap_or(DEFAULT_PAGE).max(1);
        let limit = match limit {
            Some(l) if l > 0 => l.min(MAX_LIMIT),
            _ => DEFAULT_LIMIT,
        };
        Self { days, page, limit }
    }

    /// Parse from a raw query string. Non-numeric values count as missing;
    /// unrelated keys (such as `api_key`) are ignored.
    pub fn from_query(query: Option<&str>) -> Self {
        let (mut days, mut page, mut limit) = (None, None, None);
        for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            let parsed = value.trim().parse::<i64>().ok();
            match key.as_ref() {
                "days" => days = parsed,
                "page" => page = parsed,
                "limit" => limit = parsed,
                _ => {}
            }
        }
        Self::new(days, page, limit)
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn has_more(&self, total: i64) -> bool {
        self.offset().saturating_add(self.limit) < total
    }
}

impl<S> FromRequestParts<S> for PageRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_query(parts.uri.query()))
    }
}

/// Success envelope returned by both feeds.
#[derive(Debug, Serialize)]
pub struct PageResult {
    pub success: bool,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub has_more: bool,
    pub data: Vec<Row>,
}

impl PageResult {
    pub fn new(request: &PageRequest, total: i64, data: Vec<Row>) -> Self {
        Self {
            success: true,
            total,
            page: request.page,
            limit: request.limit,
            has_more: request.has_more(total),
            data,
        }
    }
}
