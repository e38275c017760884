use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::db::credentials::ConnectionConfig;
use crate::db::feeds::{Feed, TablePrefix};
use crate::error::FeedError;
use crate::types::page::PageRequest;

/// One result row: column name to JSON value, in projection order.
pub type Row = Map<String, Value>;

/// Opens a request-scoped database session.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Failures map to [`FeedError::ConnectionFailure`] tagged with `config.source`.
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn RecordSource>, FeedError>;
}

/// Queries available on an open session.
#[async_trait]
pub trait RecordSource: Send {
    /// Rows in the feed's recency window with a non-empty reference.
    async fn count(
        &mut self,
        feed: &Feed,
        prefix: &TablePrefix,
        page: &PageRequest,
    ) -> Result<i64, FeedError>;

    /// One page of those rows, newest id first.
    async fn fetch(
        &mut self,
        feed: &Feed,
        prefix: &TablePrefix,
        page: &PageRequest,
    ) -> Result<Vec<Row>, FeedError>;
}
