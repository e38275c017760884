use std::{
    collections::HashMap,
    fs,
    iter::Peekable,
    path::{Path, PathBuf},
    str::Chars,
    sync::LazyLock,
};

use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::config::Config;
use crate::db::credentials::{ConnectionConfig, CredentialSource};
use crate::db::feeds::TablePrefix;

pub const WP_CONFIG_FILE: &str = "wp-config.php";

// Quoted values allow backslash escapes: 'it\'s' or "say \"hi\"".
static DEFINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"define\s*\(\s*['"]([A-Za-z0-9_]+)['"]\s*,\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")\s*\)"#,
    )
    .expect("define pattern is valid")
});

static TABLE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\$table_prefix\s*=\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")\s*;"#)
        .expect("table prefix pattern is valid")
});

/// One source of database credentials in the fallback cascade.
pub trait CredentialStrategy: Send + Sync {
    fn source(&self) -> CredentialSource;

    /// `None` when the source has nothing to offer (e.g. the file is absent).
    /// Partial credentials are returned as-is; the resolver decides.
    fn load(&self) -> Option<ConnectionConfig>;
}

/// Ordered list of strategies; the first complete result wins.
pub struct CredentialResolver {
    strategies: Vec<Box<dyn CredentialStrategy>>,
}

impl CredentialResolver {
    pub fn new(strategies: Vec<Box<dyn CredentialStrategy>>) -> Self {
        Self { strategies }
    }

    /// env file, then wp-config search, then the configured fallback.
    pub fn from_config(cfg: &Config) -> Self {
        let db = &cfg.database;
        let fallback = ConnectionConfig::new(
            CredentialSource::Hardcoded,
            db.fallback.host.clone(),
            db.fallback.name.clone(),
            db.fallback.user.clone(),
            db.fallback.pass.clone(),
        );
        Self::new(vec![
            Box::new(EnvFileStrategy::new(db.env_file.clone())),
            Box::new(WpConfigStrategy::new(
                cfg.wp_config_root(),
                db.wp_config_max_depth,
            )),
            Box::new(HardcodedStrategy::new(fallback)),
        ])
    }

    /// Walk the cascade. If nothing is complete, the last partial attempt is
    /// returned so the caller can report which source it came from.
    pub fn resolve(&self) -> ConnectionConfig {
        let mut last = None;
        for strategy in &self.strategies {
            match strategy.load() {
                Some(cfg) if cfg.is_complete() => {
                    debug!(source = %cfg.source, host = %cfg.host, "database credentials resolved");
                    return cfg;
                }
                Some(cfg) => {
                    debug!(source = %cfg.source, "credentials incomplete; trying next source");
                    last = Some(cfg);
                }
                None => {
                    debug!(source = %strategy.source(), "no credentials from source");
                }
            }
        }
        last.unwrap_or_else(ConnectionConfig::none)
    }
}

/// Reads `DB_HOST` / `DB_NAME` / `DB_USER` / `DB_PASS` from a `KEY=VALUE` file.
pub struct EnvFileStrategy {
    path: PathBuf,
}

impl EnvFileStrategy {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStrategy for EnvFileStrategy {
    fn source(&self) -> CredentialSource {
        CredentialSource::Env
    }

    fn load(&self) -> Option<ConnectionConfig> {
        let iter = match dotenvy::from_path_iter(&self.path) {
            Ok(iter) => iter,
            Err(e) if e.not_found() => {
                debug!(path = %self.path.display(), "credential file not found");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read credential file");
                return None;
            }
        };
        let mut values = collect_pairs(iter);
        let mut take = |key: &str| values.remove(key).unwrap_or_default();
        Some(ConnectionConfig::new(
            CredentialSource::Env,
            take("DB_HOST"),
            take("DB_NAME"),
            take("DB_USER"),
            take("DB_PASS"),
        ))
    }
}

/// Searches upwards for `wp-config.php` and scrapes its `define(...)` constants.
/// The file is only read as text, never executed.
pub struct WpConfigStrategy {
    start: PathBuf,
    max_depth: usize,
}

impl WpConfigStrategy {
    pub fn new(start: impl Into<PathBuf>, max_depth: usize) -> Self {
        Self {
            start: start.into(),
            max_depth,
        }
    }
}

impl CredentialStrategy for WpConfigStrategy {
    fn source(&self) -> CredentialSource {
        CredentialSource::WpConfig
    }

    fn load(&self) -> Option<ConnectionConfig> {
        let start = self
            .start
            .canonicalize()
            .unwrap_or_else(|_| self.start.clone());
        let path = find_upwards(&start, WP_CONFIG_FILE, self.max_depth)?;
        let contents = read_if_present(&path)?;
        debug!(path = %path.display(), "reading database credentials from wp-config");

        let contents = strip_php_comments(&contents);
        let mut defines = parse_wp_defines(&contents);
        let mut take = |key: &str| defines.remove(key).unwrap_or_default();
        let mut cfg = ConnectionConfig::new(
            CredentialSource::WpConfig,
            take("DB_HOST"),
            take("DB_NAME"),
            take("DB_USER"),
            take("DB_PASSWORD"),
        );

        cfg.table_prefix = parse_wp_table_prefix(&contents).and_then(|prefix| {
            TablePrefix::parse(&prefix)
                .inspect_err(|e| {
                    warn!(path = %path.display(), error = %e, "ignoring wp-config table prefix")
                })
                .ok()
                .map(|_| prefix)
        });
        Some(cfg)
    }
}

/// Last resort; always yields its configured values and warns when used.
pub struct HardcodedStrategy {
    config: ConnectionConfig,
}

impl HardcodedStrategy {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config: ConnectionConfig {
                source: CredentialSource::Hardcoded,
                ..config
            },
        }
    }
}

impl CredentialStrategy for HardcodedStrategy {
    fn source(&self) -> CredentialSource {
        CredentialSource::Hardcoded
    }

    fn load(&self) -> Option<ConnectionConfig> {
        warn!(
            host = %self.config.host,
            "no env file or wp-config credentials found; using hardcoded fallback"
        );
        Some(self.config.clone())
    }
}

fn read_if_present(path: &Path) -> Option<String> {
    if !path.is_file() {
        debug!(path = %path.display(), "credential file not found");
        return None;
    }
    fs::read_to_string(path)
        .inspect_err(|e| warn!(path = %path.display(), error = %e, "failed to read credential file"))
        .ok()
}

/// Gather dotenvy's `KEY=VALUE` pairs without touching the process
/// environment. Unparseable lines are logged and skipped.
fn collect_pairs<I>(iter: I) -> HashMap<String, String>
where
    I: Iterator<Item = dotenvy::Result<(String, String)>>,
{
    iter.filter_map(|item| {
        item.inspect_err(|e| warn!(error = %e, "skipping unparseable credential line"))
            .ok()
    })
    .collect()
}

/// Remove `//`, `#` and `/* */` comments, leaving string literals intact.
pub fn strip_php_comments(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                out.push(c);
                while let Some(n) = chars.next() {
                    out.push(n);
                    if n == '\\' {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    } else if n == c {
                        break;
                    }
                }
            }
            '#' => skip_line(&mut chars, &mut out),
            '/' if chars.peek() == Some(&'/') => skip_line(&mut chars, &mut out),
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

fn skip_line(chars: &mut Peekable<Chars<'_>>, out: &mut String) {
    if chars.by_ref().any(|n| n == '\n') {
        out.push('\n');
    }
}

/// Undo PHP string escapes: `\\` and the enclosing quote, plus `\$` in
/// double quotes. Other backslashes stay literal.
fn unescape_php(raw: &str, quote: char) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(n) if n == quote || n == '\\' || (quote == '"' && n == '$') => out.push(n),
            Some(n) => {
                out.push('\\');
                out.push(n);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn quoted_value(caps: &Captures<'_>, single: usize, double: usize) -> Option<String> {
    caps.get(single)
        .map(|m| unescape_php(m.as_str(), '\''))
        .or_else(|| caps.get(double).map(|m| unescape_php(m.as_str(), '"')))
}

/// Extract `define('KEY', 'VALUE')` constants from comment-free source.
/// The first definition of a key wins.
pub fn parse_wp_defines(contents: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for caps in DEFINE_RE.captures_iter(contents) {
        let value = quoted_value(&caps, 2, 3).unwrap_or_default();
        out.entry(caps[1].to_string()).or_insert(value);
    }
    out
}

pub fn parse_wp_table_prefix(contents: &str) -> Option<String> {
    let caps = TABLE_PREFIX_RE.captures(contents)?;
    quoted_value(&caps, 1, 2)
}

/// Look for `file_name` in `start` and its ancestors, inspecting at most
/// `max_depth` directories.
pub fn find_upwards(start: &Path, file_name: &str, max_depth: usize) -> Option<PathBuf> {
    start
        .ancestors()
        .take(max_depth)
        .map(|dir| dir.join(file_name))
        .find(|candidate| candidate.is_file())
}
