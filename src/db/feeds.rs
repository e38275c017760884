//! The two paginated feeds and the SQL they issue.
//!
//! Table and column names are the only non-bound fragments; they come from
//! static descriptors plus a validated [`TablePrefix`]. Every filter value
//! (`days`, `limit`, `offset`) is a bound parameter.

use crate::error::FeedError;

/// Identifier prefix prepended to feed tables (`pw_` in `pw_transactions`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePrefix(String);

impl TablePrefix {
    /// Accepts ASCII alphanumerics and `_` only. Empty is allowed.
    pub fn parse(raw: &str) -> Result<Self, FeedError> {
        if raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            Ok(Self(raw.to_string()))
        } else {
            Err(FeedError::InvalidTablePrefix(raw.to_string()))
        }
    }

    pub fn table(&self, suffix: &str) -> String {
        format!("{}{}", self.0, suffix)
    }
}

/// Static description of one paginated endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feed {
    pub name: &'static str,
    pub table_suffix: &'static str,
    /// Rows with a NULL or empty value here are excluded.
    pub reference_column: &'static str,
    /// Recency window column.
    pub recency_column: &'static str,
    pub columns: &'static [&'static str],
}

pub const CHECKOUT_JOURNEY: Feed = Feed {
    name: "checkout_journey",
    table_suffix: "checkout_journey",
    reference_column: "stripe_payment_intent_id",
    recency_column: "created_at",
    columns: &[
        "id",
        "invoiceid",
        "order_no",
        "stripe_payment_intent_id",
        "payment_status",
        "total_amount",
        "currency",
        "donor_email",
        "donor_name",
        "created_at",
    ],
};

pub const TRANSACTIONS: Feed = Feed {
    name: "transactions",
    table_suffix: "transactions",
    reference_column: "paya_reference",
    recency_column: "date",
    columns: &["id", "paya_reference", "amount", "currency", "status", "date"],
};

impl Feed {
    fn where_clause(&self) -> String {
        let reference = quote_ident(self.reference_column);
        format!(
            "{reference} IS NOT NULL AND {reference} <> '' AND {} >= DATE_SUB(NOW(), INTERVAL ? DAY)",
            quote_ident(self.recency_column)
        )
    }

    /// Binds: `days`.
    pub fn count_sql(&self, prefix: &TablePrefix) -> String {
        format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            quote_ident(&prefix.table(self.table_suffix)),
            self.where_clause()
        )
    }

    /// Binds: `days`, `limit`, `offset`.
    pub fn select_sql(&self, prefix: &TablePrefix) -> String {
        let projection = self
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "SELECT {projection} FROM {} WHERE {} ORDER BY `id` DESC LIMIT ? OFFSET ?",
            quote_ident(&prefix.table(self.table_suffix)),
            self.where_clause()
        )
    }
}

fn quote_ident(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}
