use std::sync::Arc;

use axum::{Router, routing::get};

use crate::config::Config;
use crate::db::{Connector, CredentialResolver, TablePrefix};
use crate::error::FeedError;
use crate::handlers::feeds::{checkout_journey_handler, transactions_handler};

/// Immutable state shared by every request.
#[derive(Clone)]
pub struct FeedState {
    api_key: Arc<str>,
    table_prefix: TablePrefix,
    pub resolver: Arc<CredentialResolver>,
    pub connector: Arc<dyn Connector>,
}

impl FeedState {
    pub fn new(
        api_key: impl Into<Arc<str>>,
        table_prefix: TablePrefix,
        resolver: CredentialResolver,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            table_prefix,
            resolver: Arc::new(resolver),
            connector,
        }
    }

    /// Build from the loaded service configuration; fails on an invalid table prefix.
    pub fn from_config(cfg: &Config, connector: Arc<dyn Connector>) -> Result<Self, FeedError> {
        let table_prefix = TablePrefix::parse(&cfg.database.table_prefix)?;
        Ok(Self::new(
            cfg.basic.api_key.as_str(),
            table_prefix,
            CredentialResolver::from_config(cfg),
            connector,
        ))
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn table_prefix(&self) -> &TablePrefix {
        &self.table_prefix
    }
}

pub fn feed_router(state: FeedState) -> Router {
    Router::new()
        .route("/get_checkout_journey.php", get(checkout_journey_handler))
        .route("/get_checkout_journey", get(checkout_journey_handler))
        .route("/get_transactions.php", get(transactions_handler))
        .route("/get_transactions", get(transactions_handler))
        .with_state(state)
}
