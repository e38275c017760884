//! Database access: credential resolution and paginated feed queries.
//!
//! Layout:
//! - `credentials.rs`: resolved connection parameters and their source tag
//! - `resolver.rs`: ordered fallback cascade producing credentials
//! - `feeds.rs`: the two paginated feeds and the SQL they issue
//! - `source.rs`: connector / record source seams used by handlers
//! - `mysql.rs`: MySQL-backed implementation of those seams

pub mod credentials;
pub mod feeds;
pub mod mysql;
pub mod resolver;
pub mod source;

pub use credentials::{ConnectionConfig, CredentialSource};
pub use feeds::{CHECKOUT_JOURNEY, Feed, TRANSACTIONS, TablePrefix};
pub use mysql::MySqlConnector;
pub use resolver::{
    CredentialResolver, CredentialStrategy, EnvFileStrategy, HardcodedStrategy, WpConfigStrategy,
};
pub use source::{Connector, RecordSource, Row};
