use axum::{Json, extract::State};
use tracing::info;

use crate::db::{CHECKOUT_JOURNEY, Feed, TRANSACTIONS, TablePrefix};
use crate::error::FeedError;
use crate::middleware::RequireApiKey;
use crate::router::FeedState;
use crate::types::{PageRequest, PageResult};

/// GET /get_checkout_journey.php
pub async fn checkout_journey_handler(
    State(state): State<FeedState>,
    _auth: RequireApiKey,
    page: PageRequest,
) -> Result<Json<PageResult>, FeedError> {
    serve_page(&state, &CHECKOUT_JOURNEY, page).await.map(Json)
}

/// GET /get_transactions.php
pub async fn transactions_handler(
    State(state): State<FeedState>,
    _auth: RequireApiKey,
    page: PageRequest,
) -> Result<Json<PageResult>, FeedError> {
    serve_page(&state, &TRANSACTIONS, page).await.map(Json)
}

/// Resolve credentials, open a request-scoped connection, count then fetch.
pub async fn serve_page(
    state: &FeedState,
    feed: &Feed,
    page: PageRequest,
) -> Result<PageResult, FeedError> {
    // Resolution reads files from disk.
    let resolver = state.resolver.clone();
    let creds = tokio::task::spawn_blocking(move || resolver.resolve())
        .await
        .map_err(|e| FeedError::Internal(format!("credential resolution task failed: {e}")))?;

    if !creds.is_complete() {
        return Err(FeedError::ConfigIncomplete { tag: creds.source });
    }

    let prefix = match creds.table_prefix.as_deref() {
        Some(p) => TablePrefix::parse(p)?,
        None => state.table_prefix().clone(),
    };

    let mut source = state.connector.connect(&creds).await?;
    let total = source.count(feed, &prefix, &page).await?;
    let data = source.fetch(feed, &prefix, &page).await?;

    info!(
        feed = feed.name,
        source = %creds.source,
        days = page.days,
        page = page.page,
        limit = page.limit,
        total,
        rows = data.len(),
        "served feed page"
    );
    Ok(PageResult::new(&page, total, data))
}
