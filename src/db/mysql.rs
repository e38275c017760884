use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column, ConnectOptions, Decode, MySql, Row as _, Type, TypeInfo, ValueRef};
use tracing::{debug, warn};

use crate::db::credentials::ConnectionConfig;
use crate::db::feeds::{Feed, TablePrefix};
use crate::db::source::{Connector, RecordSource, Row};
use crate::error::FeedError;
use crate::types::page::PageRequest;

/// Opens one `MySqlConnection` per request. sqlx prepares every bound query
/// server-side and surfaces driver errors as `Result`s.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnector;

#[async_trait]
impl Connector for MySqlConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn RecordSource>, FeedError> {
        let conn = connect_options(config)
            .connect()
            .await
            .map_err(|error| FeedError::ConnectionFailure {
                tag: config.source,
                error,
            })?;
        debug!(source = %config.source, host = %config.host, database = %config.database, "database connection opened");
        Ok(Box::new(MySqlRecordSource { conn }))
    }
}

pub struct MySqlRecordSource {
    conn: MySqlConnection,
}

#[async_trait]
impl RecordSource for MySqlRecordSource {
    async fn count(
        &mut self,
        feed: &Feed,
        prefix: &TablePrefix,
        page: &PageRequest,
    ) -> Result<i64, FeedError> {
        let sql = feed.count_sql(prefix);
        let (total,): (i64,) = sqlx::query_as(&sql)
            .bind(page.days)
            .fetch_one(&mut self.conn)
            .await?;
        Ok(total)
    }

    async fn fetch(
        &mut self,
        feed: &Feed,
        prefix: &TablePrefix,
        page: &PageRequest,
    ) -> Result<Vec<Row>, FeedError> {
        let sql = feed.select_sql(prefix);
        let rows = sqlx::query(&sql)
            .bind(page.days)
            .bind(page.limit)
            .bind(page.offset())
            .fetch_all(&mut self.conn)
            .await?;
        Ok(rows.iter().map(row_to_json).collect())
    }
}

fn connect_options(config: &ConnectionConfig) -> MySqlConnectOptions {
    let mut opts = MySqlConnectOptions::new()
        .username(&config.user)
        .database(&config.database)
        .charset("utf8mb4");
    if !config.password.is_empty() {
        opts = opts.password(&config.password);
    }
    match split_host(&config.host) {
        HostSpec::Tcp { host, port } => {
            opts = opts.host(host);
            if let Some(port) = port {
                opts = opts.port(port);
            }
        }
        HostSpec::Socket { path } => {
            opts = opts.socket(path);
        }
    }
    opts
}

#[derive(Debug, PartialEq, Eq)]
enum HostSpec<'a> {
    Tcp { host: &'a str, port: Option<u16> },
    Socket { path: &'a str },
}

/// WordPress-style `DB_HOST`: `host`, `host:port`, `[v6]:port`,
/// `host:/path/to/socket` or a bare socket path.
fn split_host(raw: &str) -> HostSpec<'_> {
    let raw = raw.trim();
    if raw.starts_with('/') {
        return HostSpec::Socket { path: raw };
    }
    if let Some(rest) = raw.strip_prefix('[')
        && let Some((addr, tail)) = rest.split_once(']')
    {
        let port = tail.strip_prefix(':').and_then(|p| p.parse().ok());
        return HostSpec::Tcp { host: addr, port };
    }
    match raw.split_once(':') {
        Some((_, tail)) if tail.starts_with('/') => HostSpec::Socket { path: tail },
        Some((host, tail)) => match tail.parse::<u16>() {
            Ok(port) => HostSpec::Tcp {
                host,
                port: Some(port),
            },
            Err(_) => HostSpec::Tcp {
                host: raw,
                port: None,
            },
        },
        None => HostSpec::Tcp {
            host: raw,
            port: None,
        },
    }
}

fn row_to_json(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .map(|col| {
            let value = column_value(row, col.ordinal(), col.name(), col.type_info().name());
            (col.name().to_string(), value)
        })
        .collect()
}

fn decode<'r, T>(row: &'r MySqlRow, index: usize) -> Option<Option<T>>
where
    T: Decode<'r, MySql> + Type<MySql>,
{
    row.try_get::<Option<T>, _>(index).ok()
}

/// MySQL's text form for zero dates, which chrono cannot represent.
fn zero_date_text(type_name: &str) -> Option<&'static str> {
    match type_name {
        "DATETIME" | "TIMESTAMP" => Some("0000-00-00 00:00:00"),
        "DATE" => Some("0000-00-00"),
        _ => None,
    }
}

/// Convert by declared column type; anything unrecognised is tried as text.
fn column_value(row: &MySqlRow, index: usize, column: &str, type_name: &str) -> Value {
    let typed = match type_name {
        name if name.ends_with("UNSIGNED") => {
            decode::<u64>(row, index).map(|v| v.map(Value::from))
        }
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            decode::<i64>(row, index).map(|v| v.map(Value::from))
        }
        "BOOLEAN" => decode::<bool>(row, index).map(|v| v.map(Value::from)),
        "FLOAT" => decode::<f32>(row, index).map(|v| v.map(|n| Value::from(f64::from(n)))),
        "DOUBLE" => decode::<f64>(row, index).map(|v| v.map(Value::from)),
        // Kept as a string so amounts survive without float rounding.
        "DECIMAL" => decode::<Decimal>(row, index).map(|v| v.map(|d| Value::String(d.to_string()))),
        "DATETIME" | "TIMESTAMP" => decode::<NaiveDateTime>(row, index)
            .map(|v| v.map(|dt| Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()))),
        "DATE" => decode::<NaiveDate>(row, index)
            .map(|v| v.map(|d| Value::String(d.format("%Y-%m-%d").to_string()))),
        _ => None,
    };

    // A non-null date that failed to decode is a zero date.
    if typed.is_none()
        && let Some(zero) = zero_date_text(type_name)
        && row.try_get_raw(index).is_ok_and(|raw| !raw.is_null())
    {
        warn!(column, type_name, "undecodable date value; returning zero date");
        return Value::String(zero.to_string());
    }

    typed
        .or_else(|| decode::<String>(row, index).map(|v| v.map(Value::String)))
        .or_else(|| {
            decode::<Vec<u8>>(row, index)
                .map(|v| v.map(|b| Value::String(String::from_utf8_lossy(&b).into_owned())))
        })
        .flatten()
        .unwrap_or(Value::Null)
}
