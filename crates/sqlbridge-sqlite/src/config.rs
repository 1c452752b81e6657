//! Connection configuration.

use std::ffi::c_int;

use serde::Deserialize;
use sqlbridge_core::{ConfigError, Error, Result, TransactionMode};

use crate::ffi;

/// Configuration for opening SQLite connections.
///
/// Can be built in code or deserialized from JSON; every field is optional
/// in JSON and falls back to [`SqliteConfig::default`].
///
/// ```
/// use sqlbridge_sqlite::SqliteConfig;
///
/// let config = SqliteConfig::from_json(
///     r#"{"path": "app.db", "statement_limit": 200, "default_transaction_mode": "immediate"}"#,
/// )
/// .unwrap();
/// assert_eq!(config.statement_limit, 200);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Path to the database file, ":memory:", or a `file:` URI.
    pub path: String,
    /// Open flags (read-only, read-write, create, etc.)
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
    /// Maximum number of cached prepared statements.
    pub statement_limit: usize,
    /// Locking mode of the outermost `BEGIN`.
    pub default_transaction_mode: TransactionMode,
    /// Pragmas applied, in order, right after the connection opens.
    pub pragmas: Vec<Pragma>,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
    /// Open in multi-thread mode.
    pub no_mutex: bool,
    /// Open in serialized mode.
    pub full_mutex: bool,
    /// Enable shared cache mode.
    pub shared_cache: bool,
    /// Disable shared cache mode.
    pub private_cache: bool,
}

/// A `PRAGMA name = value` applied on open.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Pragma {
    pub name: String,
    pub value: String,
}

impl Pragma {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub(crate) fn to_sql(&self) -> String {
        format!("PRAGMA {} = {}", self.name, self.value)
    }

    /// Pragmas every new connection gets unless configured otherwise.
    pub fn defaults() -> Vec<Pragma> {
        vec![
            Pragma::new("foreign_keys", "ON"),
            Pragma::new("journal_mode", "WAL"),
            Pragma::new("synchronous", "NORMAL"),
            Pragma::new("mmap_size", "134217728"),
            Pragma::new("journal_size_limit", "67108864"),
            Pragma::new("cache_size", "2000"),
        ]
    }
}

impl OpenFlags {
    /// Create flags for read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access (database must exist).
    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access with creation if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    /// Enable shared-cache mode.
    pub fn shared_cache(mut self) -> Self {
        self.shared_cache = true;
        self.private_cache = false;
        self
    }

    /// Interpret the path as a `file:` URI.
    pub fn uri(mut self) -> Self {
        self.uri = true;
        self
    }

    pub(crate) fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;

        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        if self.no_mutex {
            flags |= ffi::SQLITE_OPEN_NOMUTEX;
        }
        if self.full_mutex {
            flags |= ffi::SQLITE_OPEN_FULLMUTEX;
        }
        if self.shared_cache {
            flags |= ffi::SQLITE_OPEN_SHAREDCACHE;
        }
        if self.private_cache {
            flags |= ffi::SQLITE_OPEN_PRIVATECACHE;
        }

        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }

        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
            statement_limit: 1000,
            default_transaction_mode: TransactionMode::Deferred,
            pragmas: Pragma::defaults(),
        }
    }
}

impl SqliteConfig {
    /// Create a new config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create a new config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Parse a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            Error::Config(ConfigError {
                message: format!("invalid SQLite configuration: {}", e),
                source: Some(Box::new(e)),
            })
        })
    }

    /// Set open flags.
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set busy timeout.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    /// Set the prepared statement cache size.
    pub fn statement_limit(mut self, limit: usize) -> Self {
        self.statement_limit = limit;
        self
    }

    /// Set the locking mode of outermost transactions.
    pub fn transaction_mode(mut self, mode: TransactionMode) -> Self {
        self.default_transaction_mode = mode;
        self
    }

    /// Add a pragma, replacing an earlier one with the same name.
    pub fn pragma(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let pragma = Pragma::new(name, value);
        match self
            .pragmas
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(&pragma.name))
        {
            Some(existing) => *existing = pragma,
            None => self.pragmas.push(pragma),
        }
        self
    }

    /// Drop every configured pragma, including the defaults.
    pub fn without_pragmas(mut self) -> Self {
        self.pragmas.clear();
        self
    }

    /// Whether the database lives only in memory.
    pub fn is_memory(&self) -> bool {
        self.path == ":memory:"
            || self.path.is_empty()
            || self.path.starts_with("file::memory:")
            || (self.path.starts_with("file:") && self.path.contains("mode=memory"))
    }

    /// Whether connections share a page cache within the process.
    pub fn is_shared_cache(&self) -> bool {
        self.flags.shared_cache || (self.path.starts_with("file:") && self.path.contains("cache=shared"))
    }

    // Journal mode is meaningless for in-memory databases and cannot be
    // switched on a read-only connection.
    pub(crate) fn pragmas_to_apply(&self) -> impl Iterator<Item = &Pragma> {
        let skip_journal = self.is_memory() || self.flags.read_only;
        self.pragmas
            .iter()
            .filter(move |p| !(skip_journal && p.name.eq_ignore_ascii_case("journal_mode")))
    }
}
