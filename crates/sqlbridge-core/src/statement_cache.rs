//! Bounded prepared-statement cache keyed by SQL text.
//!
//! Entries are evicted least-recently-used once the cache is full. The cache
//! remembers the process that created it: prepared handles are OS-level
//! resources that must never be shared with a forked child, so every access
//! from a different process discards the entries without closing them and
//! starts over.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Identity of the process that owns a set of handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessToken(u32);

impl ProcessToken {
    /// Token for the calling process.
    pub fn current() -> Self {
        Self(std::process::id())
    }
}

#[derive(Debug)]
struct CachedStatement<S> {
    statement: S,
    last_used: u64,
}

/// LRU cache of prepared statements.
///
/// `S` is the adapter's statement handle; dropping it must release the
/// underlying engine resource.
///
/// # Example
///
/// ```
/// use sqlbridge_core::StatementCache;
///
/// let mut cache: StatementCache<String> = StatementCache::new(2);
/// let stmt = cache
///     .fetch_or_prepare("SELECT 1", |sql| Ok::<_, sqlbridge_core::Error>(format!("compiled:{sql}")))
///     .unwrap();
/// assert_eq!(stmt, "compiled:SELECT 1");
/// assert_eq!(cache.len(), 1);
/// ```
#[derive(Debug)]
pub struct StatementCache<S> {
    entries: HashMap<String, CachedStatement<S>>,
    max_size: usize,
    owner: ProcessToken,
    tick: u64,
    hits: u64,
    misses: u64,
}

impl<S> StatementCache<S> {
    /// Create a cache holding at most `max_size` statements.
    ///
    /// A size of zero disables caching: `fetch_or_prepare` still prepares
    /// but keeps only the most recent statement.
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(max_size.min(256)),
            max_size,
            owner: ProcessToken::current(),
            tick: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Get the cached statement for `sql`, preparing it on a miss.
    pub fn fetch_or_prepare<E>(
        &mut self,
        sql: &str,
        prepare: impl FnOnce(&str) -> Result<S, E>,
    ) -> Result<&mut S, E> {
        self.check_owner();
        self.tick += 1;
        let tick = self.tick;

        // Room is made before preparing so the new entry is never the one
        // evicted.
        if !self.entries.contains_key(sql) {
            let limit = self.max_size.max(1);
            while self.entries.len() >= limit {
                self.evict_lru();
            }
        }

        let cached = match self.entries.entry(sql.to_string()) {
            Entry::Occupied(slot) => {
                self.hits += 1;
                tracing::trace!(sql = %sql, "statement cache hit");
                slot.into_mut()
            }
            Entry::Vacant(slot) => {
                self.misses += 1;
                slot.insert(CachedStatement {
                    statement: prepare(sql)?,
                    last_used: tick,
                })
            }
        };
        cached.last_used = tick;
        Ok(&mut cached.statement)
    }

    /// Remove one statement, returning it so the caller controls when it is
    /// released.
    pub fn evict(&mut self, sql: &str) -> Option<S> {
        self.check_owner();
        self.entries.remove(sql).map(|entry| entry.statement)
    }

    /// Check if a statement is cached.
    pub fn contains(&mut self, sql: &str) -> bool {
        self.check_owner();
        self.entries.contains_key(sql)
    }

    /// Number of live entries for the current process.
    pub fn len(&mut self) -> usize {
        self.check_owner();
        self.entries.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    /// Release every cached statement.
    pub fn clear(&mut self) {
        self.check_owner();
        self.entries.clear();
    }

    fn evict_lru(&mut self) {
        let lru = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(sql, _)| sql.clone());
        if let Some(sql) = lru {
            tracing::trace!(sql = %sql, "evicting least recently used statement");
            self.entries.remove(&sql);
        }
    }

    // Handles inherited across a fork belong to the parent; leak them
    // instead of finalizing them from the child.
    fn check_owner(&mut self) {
        let current = ProcessToken::current();
        if self.owner != current {
            tracing::warn!(
                entries = self.entries.len(),
                "process changed since statements were prepared; discarding cache"
            );
            for (_, entry) in self.entries.drain() {
                std::mem::forget(entry.statement);
            }
            self.owner = current;
        }
    }
}

impl<S> Default for StatementCache<S> {
    fn default() -> Self {
        Self::new(1000)
    }
}
