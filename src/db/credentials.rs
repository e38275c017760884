use std::fmt;

/// Where a set of connection parameters came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Env,
    WpConfig,
    Hardcoded,
    None,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::Env => "env",
            CredentialSource::WpConfig => "wp-config",
            CredentialSource::Hardcoded => "hardcoded",
            CredentialSource::None => "none",
        }
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database connection parameters for a single request.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub source: CredentialSource,
    /// Table prefix discovered alongside the credentials (`$table_prefix` in wp-config).
    pub table_prefix: Option<String>,
}

impl ConnectionConfig {
    pub fn new(
        source: CredentialSource,
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            database: database.into(),
            user: user.into(),
            password: password.into(),
            source,
            table_prefix: None,
        }
    }

    /// Placeholder used when no strategy produced anything.
    pub fn none() -> Self {
        Self::new(CredentialSource::None, "", "", "", "")
    }

    /// Host, database and user are all present. An empty password is allowed.
    pub fn is_complete(&self) -> bool {
        !self.host.trim().is_empty()
            && !self.database.trim().is_empty()
            && !self.user.trim().is_empty()
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("source", &self.source)
            .field("table_prefix", &self.table_prefix)
            .finish()
    }
}
