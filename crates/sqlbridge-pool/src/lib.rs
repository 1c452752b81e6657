//! Blocking connection pool for sqlbridge.
//!
//! A [`Pool`] hands out connections produced by a [`ConnectionFactory`].
//! Checkout blocks on a condition variable until a connection is idle or the
//! pool may open another one, and fails with
//! [`PoolErrorKind::Timeout`] once the acquire timeout passes.
//!
//! A checked-out connection is owned by the thread that checked it out: the
//! [`PooledConnection`] guard is `!Send`. Dropping the guard checks the
//! connection back in after [`Connection::reset`] has rolled back whatever
//! transaction it left open; a connection whose reset fails is closed instead
//! of being reused.
//!
//! ```
//! use sqlbridge_pool::{Pool, PoolConfig};
//! # use sqlbridge_core::{Connection, Result, RowSet, Value};
//! # struct Conn;
//! # impl Connection for Conn {
//! #     fn exec_query(&mut self, _: &str, _: &[Value]) -> Result<RowSet> { Ok(RowSet::empty()) }
//! #     fn exec_update(&mut self, _: &str, _: &[Value]) -> Result<u64> { Ok(0) }
//! #     fn ping(&mut self) -> Result<()> { Ok(()) }
//! #     fn transaction_open(&self) -> bool { false }
//! #     fn reset(&mut self) -> Result<()> { Ok(()) }
//! # }
//!
//! let pool = Pool::new(|| -> Result<Conn> { Ok(Conn) }, PoolConfig::new(4)).unwrap();
//! let rows = pool.with_connection(|conn| conn.exec_query("SELECT 1", &[])).unwrap();
//! assert!(rows.is_empty());
//! assert_eq!(pool.stats().idle, 1);
//! ```

use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Deserialize;
use sqlbridge_core::{Connection, Error, PoolError, PoolErrorKind, Result};

/// Connection pool configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Minimum number of connections to maintain
    pub min_connections: usize,
    /// Maximum number of connections allowed
    pub max_connections: usize,
    /// Connection idle timeout in milliseconds
    pub idle_timeout_ms: u64,
    /// Maximum time to wait for a connection in milliseconds
    pub acquire_timeout_ms: u64,
    /// Maximum lifetime of a connection in milliseconds
    pub max_lifetime_ms: u64,
    /// Test connections before giving them out
    pub test_on_checkout: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 0,
            max_connections: 5,
            idle_timeout_ms: 300_000,   // 5 minutes
            acquire_timeout_ms: 5_000,  // 5 seconds
            max_lifetime_ms: 1_800_000, // 30 minutes
            test_on_checkout: true,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with the given max connections.
    pub fn new(max_connections: usize) -> Self {
        Self {
            max_connections,
            ..Default::default()
        }
    }

    /// Set minimum connections.
    pub fn min_connections(mut self, n: usize) -> Self {
        self.min_connections = n;
        self
    }

    /// Set idle timeout.
    pub fn idle_timeout(mut self, ms: u64) -> Self {
        self.idle_timeout_ms = ms;
        self
    }

    /// Set acquire timeout.
    pub fn acquire_timeout(mut self, ms: u64) -> Self {
        self.acquire_timeout_ms = ms;
        self
    }

    /// Set max lifetime.
    pub fn max_lifetime(mut self, ms: u64) -> Self {
        self.max_lifetime_ms = ms;
        self
    }

    /// Enable/disable test on checkout.
    pub fn test_on_checkout(mut self, enabled: bool) -> Self {
        self.test_on_checkout = enabled;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(config_error("max_connections must be at least 1"));
        }
        if self.min_connections > self.max_connections {
            return Err(config_error(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        Ok(())
    }
}

/// Pool statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Open connections, idle or checked out
    pub total: usize,
    pub idle: usize,
    /// Checked-out connections
    pub active: usize,
    /// Threads blocked in checkout
    pub waiting: usize,
}

/// Opens new connections for a pool.
///
/// Implemented for any `Fn() -> Result<C>` closure.
pub trait ConnectionFactory: Send + Sync + 'static {
    type Connection: Connection;

    fn connect(&self) -> Result<Self::Connection>;
}

impl<F, C> ConnectionFactory for F
where
    F: Fn() -> Result<C> + Send + Sync + 'static,
    C: Connection,
{
    type Connection = C;

    fn connect(&self) -> Result<C> {
        self()
    }
}

struct Idle<C> {
    conn: C,
    created_at: Instant,
    idle_since: Instant,
}

struct PoolState<C> {
    idle: VecDeque<Idle<C>>,
    total: usize,
    waiting: usize,
    closed: bool,
    owners: HashMap<ThreadId, usize>,
}

struct Shared<F: ConnectionFactory> {
    factory: F,
    config: PoolConfig,
    state: Mutex<PoolState<F::Connection>>,
    available: Condvar,
}

/// A thread-safe pool of connections.
///
/// Cloning is cheap; clones share the same connections.
pub struct Pool<F: ConnectionFactory> {
    shared: Arc<Shared<F>>,
}

impl<F: ConnectionFactory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: ConnectionFactory> std::fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl<F: ConnectionFactory> Pool<F> {
    /// Create a pool and open `min_connections` connections up front.
    pub fn new(factory: F, config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let now = Instant::now();
        let mut idle = VecDeque::with_capacity(config.max_connections);
        for _ in 0..config.min_connections {
            idle.push_back(Idle {
                conn: factory.connect()?,
                created_at: now,
                idle_since: now,
            });
        }

        tracing::debug!(
            min = config.min_connections,
            max = config.max_connections,
            "connection pool created"
        );
        Ok(Self {
            shared: Arc::new(Shared {
                factory,
                state: Mutex::new(PoolState {
                    total: idle.len(),
                    idle,
                    waiting: 0,
                    closed: false,
                    owners: HashMap::new(),
                }),
                config,
                available: Condvar::new(),
            }),
        })
    }

    /// Get the pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Check out a connection, waiting up to the configured acquire timeout.
    pub fn checkout(&self) -> Result<PooledConnection<F>> {
        self.checkout_timeout(Duration::from_millis(self.shared.config.acquire_timeout_ms))
    }

    /// Check out a connection, waiting up to `timeout`.
    ///
    /// # Errors
    ///
    /// [`PoolErrorKind::Timeout`] when no connection became available in
    /// time, [`PoolErrorKind::Closed`] after [`Pool::close`], or the
    /// factory's error when a new connection could not be opened.
    pub fn checkout_timeout(&self, timeout: Duration) -> Result<PooledConnection<F>> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut state = self.shared.state.lock();

        loop {
            if state.closed {
                return Err(pool_error(PoolErrorKind::Closed, "connection pool is closed"));
            }

            if let Some(idle) = state.idle.pop_back() {
                *state.owners.entry(thread::current().id()).or_insert(0) += 1;
                drop(state);
                return self.hand_out(idle);
            }

            if state.total < self.shared.config.max_connections {
                state.total += 1;
                *state.owners.entry(thread::current().id()).or_insert(0) += 1;
                drop(state);
                return match self.shared.factory.connect() {
                    Ok(conn) => Ok(self.guard(conn, Instant::now())),
                    Err(e) => {
                        self.forget_checked_out();
                        Err(e)
                    }
                };
            }

            state.waiting += 1;
            let timed_out = self
                .shared
                .available
                .wait_until(&mut state, deadline)
                .timed_out();
            state.waiting -= 1;

            // A discarded connection may have freed capacity while we slept.
            if timed_out
                && state.idle.is_empty()
                && state.total >= self.shared.config.max_connections
                && !state.closed
            {
                let waited = started.elapsed().as_secs_f64();
                tracing::warn!(
                    waited_secs = waited,
                    max = self.shared.config.max_connections,
                    "timed out waiting for a pooled connection"
                );
                return Err(pool_error(
                    PoolErrorKind::Timeout,
                    format!(
                        "could not obtain a connection from the pool within {:.3} seconds (waited {:.3} seconds); all pooled connections were in use",
                        timeout.as_secs_f64(),
                        waited
                    ),
                ));
            }
        }
    }

    /// Run `f` with a checked-out connection, checking it back in afterwards.
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut F::Connection) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.checkout()?;
        f(&mut conn)
    }

    /// Get the current pool statistics.
    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        PoolStats {
            total: state.total,
            idle: state.idle.len(),
            active: state.total - state.idle.len(),
            waiting: state.waiting,
        }
    }

    /// Check if the pool is at capacity.
    pub fn at_capacity(&self) -> bool {
        self.shared.state.lock().total >= self.shared.config.max_connections
    }

    /// Number of connections the calling thread has checked out.
    pub fn checked_out_by_current_thread(&self) -> usize {
        self.shared
            .state
            .lock()
            .owners
            .get(&thread::current().id())
            .copied()
            .unwrap_or(0)
    }

    /// Close idle connections that exceeded the idle timeout or their
    /// maximum lifetime, keeping at least `min_connections` open. Returns
    /// how many were closed.
    pub fn reap_idle(&self) -> usize {
        let idle_timeout = Duration::from_millis(self.shared.config.idle_timeout_ms);
        let max_lifetime = Duration::from_millis(self.shared.config.max_lifetime_ms);
        let min = self.shared.config.min_connections;

        let reaped: Vec<F::Connection> = {
            let mut state = self.shared.state.lock();
            let mut reaped = Vec::new();
            let mut kept = VecDeque::with_capacity(state.idle.len());
            while let Some(idle) = state.idle.pop_front() {
                let expired = idle.idle_since.elapsed() >= idle_timeout
                    || idle.created_at.elapsed() >= max_lifetime;
                if expired && state.total > min {
                    state.total -= 1;
                    reaped.push(idle.conn);
                } else {
                    kept.push_back(idle);
                }
            }
            state.idle = kept;
            if !reaped.is_empty() {
                self.shared.available.notify_all();
            }
            reaped
        };

        if !reaped.is_empty() {
            tracing::debug!(count = reaped.len(), "reaped idle connections");
        }
        reaped.len()
    }

    /// Close every idle connection and refuse further checkouts. Connections
    /// still checked out are closed when they are returned.
    pub fn close(&self) {
        let idle: VecDeque<Idle<F::Connection>> = {
            let mut state = self.shared.state.lock();
            state.closed = true;
            state.total -= state.idle.len();
            self.shared.available.notify_all();
            std::mem::take(&mut state.idle)
        };
        tracing::debug!(closed = idle.len(), "connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    // Runs outside the lock; the caller has already recorded the checkout.
    fn hand_out(&self, idle: Idle<F::Connection>) -> Result<PooledConnection<F>> {
        let Idle {
            mut conn,
            created_at,
            ..
        } = idle;
        if !self.shared.config.test_on_checkout {
            return Ok(self.guard(conn, created_at));
        }
        match conn.ping() {
            Ok(()) => Ok(self.guard(conn, created_at)),
            Err(e) => {
                tracing::warn!(error = %e, "pooled connection failed its checkout test; replacing it");
                drop(conn);
                match self.shared.factory.connect() {
                    Ok(fresh) => Ok(self.guard(fresh, Instant::now())),
                    Err(e) => {
                        self.forget_checked_out();
                        Err(e)
                    }
                }
            }
        }
    }

    fn guard(&self, conn: F::Connection, created_at: Instant) -> PooledConnection<F> {
        PooledConnection {
            conn: Some(conn),
            shared: Arc::clone(&self.shared),
            owner: thread::current().id(),
            created_at,
            _not_send: PhantomData,
        }
    }

    // A checked-out slot whose connection never materialized.
    fn forget_checked_out(&self) {
        let mut state = self.shared.state.lock();
        state.total -= 1;
        release_owner(&mut state, thread::current().id());
        self.shared.available.notify_one();
    }
}

/// A connection checked out of a [`Pool`].
///
/// Dereferences to the connection. Bound to the thread that checked it out.
pub struct PooledConnection<F: ConnectionFactory> {
    conn: Option<F::Connection>,
    shared: Arc<Shared<F>>,
    owner: ThreadId,
    created_at: Instant,
    _not_send: PhantomData<*const ()>,
}

impl<F: ConnectionFactory> PooledConnection<F> {
    /// Thread that checked the connection out.
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Take the connection out of the pool for good. The pool may open a
    /// replacement.
    pub fn detach(mut self) -> Option<F::Connection> {
        let conn = self.conn.take();
        let mut state = self.shared.state.lock();
        state.total -= 1;
        release_owner(&mut state, self.owner);
        self.shared.available.notify_one();
        conn
    }
}

impl<F: ConnectionFactory> Deref for PooledConnection<F> {
    type Target = F::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn
            .as_ref()
            .expect("connection is present until the guard is dropped")
    }
}

impl<F: ConnectionFactory> DerefMut for PooledConnection<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
            .as_mut()
            .expect("connection is present until the guard is dropped")
    }
}

impl<F: ConnectionFactory> std::fmt::Debug for PooledConnection<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("owner", &self.owner)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl<F: ConnectionFactory> Drop for PooledConnection<F> {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };

        let reset = conn.reset();
        if let Err(e) = &reset {
            tracing::warn!(error = %e, "discarding connection that failed to reset on checkin");
        }
        let expired = self.created_at.elapsed()
            >= Duration::from_millis(self.shared.config.max_lifetime_ms);

        let mut state = self.shared.state.lock();
        release_owner(&mut state, self.owner);
        if reset.is_ok() && !expired && !state.closed {
            state.idle.push_back(Idle {
                conn,
                created_at: self.created_at,
                idle_since: Instant::now(),
            });
        } else {
            state.total -= 1;
        }
        drop(state);
        self.shared.available.notify_one();
    }
}

fn release_owner<C>(state: &mut PoolState<C>, owner: ThreadId) {
    if let Some(count) = state.owners.get_mut(&owner) {
        *count -= 1;
        if *count == 0 {
            state.owners.remove(&owner);
        }
    }
}

fn pool_error(kind: PoolErrorKind, message: impl Into<String>) -> Error {
    Error::Pool(PoolError {
        kind,
        message: message.into(),
        source: None,
    })
}

fn config_error(message: impl Into<String>) -> Error {
    pool_error(PoolErrorKind::Config, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlbridge_core::{ConnectionError, ConnectionErrorKind, RowSet, Value};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        opened: AtomicUsize,
        resets: AtomicUsize,
        dead: AtomicBool,
        fail_reset: AtomicBool,
    }

    struct FakeConn {
        id: usize,
        in_transaction: bool,
        counters: Arc<Counters>,
    }

    impl Connection for FakeConn {
        fn exec_query(&mut self, _sql: &str, _binds: &[Value]) -> Result<RowSet> {
            Ok(RowSet::empty())
        }

        fn exec_update(&mut self, _sql: &str, _binds: &[Value]) -> Result<u64> {
            self.in_transaction = true;
            Ok(1)
        }

        fn ping(&mut self) -> Result<()> {
            if self.counters.dead.load(Ordering::SeqCst) {
                return Err(Error::Connection(ConnectionError {
                    kind: ConnectionErrorKind::Closed,
                    message: "gone".into(),
                    source: None,
                }));
            }
            Ok(())
        }

        fn transaction_open(&self) -> bool {
            self.in_transaction
        }

        fn reset(&mut self) -> Result<()> {
            self.counters.resets.fetch_add(1, Ordering::SeqCst);
            if self.counters.fail_reset.load(Ordering::SeqCst) {
                return Err(Error::Custom("reset failed".into()));
            }
            self.in_transaction = false;
            Ok(())
        }
    }

    fn pool(
        config: PoolConfig,
    ) -> (Pool<impl ConnectionFactory<Connection = FakeConn>>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let shared = Arc::clone(&counters);
        let factory = move || -> Result<FakeConn> {
            let id = shared.opened.fetch_add(1, Ordering::SeqCst);
            Ok(FakeConn {
                id,
                in_transaction: false,
                counters: Arc::clone(&shared),
            })
        };
        (Pool::new(factory, config).unwrap(), counters)
    }

    #[test]
    fn connections_are_reused() {
        let (pool, counters) = pool(PoolConfig::new(2));
        let first = pool.checkout().unwrap().id;
        let second = pool.checkout().unwrap().id;
        assert_eq!(first, second);
        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
        assert_eq!(
            pool.stats(),
            PoolStats {
                total: 1,
                idle: 1,
                active: 0,
                waiting: 0
            }
        );
    }

    #[test]
    fn min_connections_open_up_front() {
        let (pool, counters) = pool(PoolConfig::new(4).min_connections(2));
        assert_eq!(counters.opened.load(Ordering::SeqCst), 2);
        assert_eq!(pool.stats().idle, 2);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let factory = || -> Result<FakeConn> { Err(Error::Custom("unused".into())) };
        match Pool::new(factory, PoolConfig::new(0)) {
            Err(Error::Pool(e)) => assert_eq!(e.kind, PoolErrorKind::Config),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn checkout_times_out_when_exhausted() {
        let (pool, _) = pool(PoolConfig::new(1));
        let _held = pool.checkout().unwrap();

        let started = Instant::now();
        let err = pool.checkout_timeout(Duration::from_millis(50)).unwrap_err();
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(err.is_retryable());
        match err {
            Error::Pool(e) => {
                assert_eq!(e.kind, PoolErrorKind::Timeout);
                assert!(e.message.contains("waited"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn capacity_freed_without_a_wakeup_is_used_at_the_deadline() {
        let (pool, counters) = pool(PoolConfig::new(1));
        let mut held = pool.checkout().unwrap();

        let waiter = {
            let pool = pool.clone();
            thread::spawn(move || pool.checkout_timeout(Duration::from_millis(100)).map(|_| ()))
        };
        while pool.stats().waiting == 0 {
            thread::sleep(Duration::from_millis(1));
        }

        // Give the slot up without signalling the waiter.
        let conn = held.conn.take();
        {
            let mut state = pool.shared.state.lock();
            state.total -= 1;
            release_owner(&mut state, held.owner);
        }
        drop(held);
        drop(conn);

        waiter.join().unwrap().unwrap();
        assert_eq!(counters.opened.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn waiter_wakes_when_a_connection_is_returned() {
        let (pool, _) = pool(PoolConfig::new(1));
        let held = pool.checkout().unwrap();

        let waiter = {
            let pool = pool.clone();
            thread::spawn(move || {
                pool.checkout_timeout(Duration::from_secs(5))
                    .map(|conn| conn.id)
            })
        };
        while pool.stats().waiting == 0 {
            thread::sleep(Duration::from_millis(5));
        }
        drop(held);

        assert_eq!(waiter.join().unwrap().unwrap(), 0);
    }

    #[test]
    fn checkin_resets_the_connection() {
        let (pool, counters) = pool(PoolConfig::new(1));
        {
            let mut conn = pool.checkout().unwrap();
            conn.exec_update("INSERT", &[]).unwrap();
            assert!(conn.transaction_open());
        }
        assert_eq!(counters.resets.load(Ordering::SeqCst), 1);
        assert!(!pool.checkout().unwrap().transaction_open());
    }

    #[test]
    fn failed_reset_discards_the_connection() {
        let (pool, counters) = pool(PoolConfig::new(1));
        counters.fail_reset.store(true, Ordering::SeqCst);
        drop(pool.checkout().unwrap());
        assert_eq!(pool.stats().total, 0);

        counters.fail_reset.store(false, Ordering::SeqCst);
        assert_eq!(pool.checkout().unwrap().id, 1);
    }

    #[test]
    fn dead_connections_are_replaced_on_checkout() {
        let (pool, counters) = pool(PoolConfig::new(1));
        drop(pool.checkout().unwrap());
        counters.dead.store(true, Ordering::SeqCst);

        let conn = pool.checkout().unwrap();
        assert_eq!(conn.id, 1);
        assert_eq!(pool.stats().total, 1);
    }

    #[test]
    fn ownership_is_per_thread() {
        let (pool, _) = pool(PoolConfig::new(2));
        let conn = pool.checkout().unwrap();
        assert_eq!(conn.owner(), thread::current().id());
        assert_eq!(pool.checked_out_by_current_thread(), 1);

        let other = pool.clone();
        let seen = thread::spawn(move || other.checked_out_by_current_thread())
            .join()
            .unwrap();
        assert_eq!(seen, 0);

        drop(conn);
        assert_eq!(pool.checked_out_by_current_thread(), 0);
    }

    #[test]
    fn reap_idle_respects_min_connections() {
        let (pool, _) = pool(PoolConfig::new(3).min_connections(1).idle_timeout(0));
        let a = pool.checkout().unwrap();
        let b = pool.checkout().unwrap();
        drop((a, b));
        assert_eq!(pool.stats().idle, 2);

        assert_eq!(pool.reap_idle(), 1);
        assert_eq!(pool.stats().total, 1);
    }

    #[test]
    fn closed_pool_refuses_checkout() {
        let (pool, _) = pool(PoolConfig::new(2));
        let held = pool.checkout().unwrap();
        pool.close();
        assert!(pool.is_closed());

        match pool.checkout().unwrap_err() {
            Error::Pool(e) => assert_eq!(e.kind, PoolErrorKind::Closed),
            other => panic!("unexpected {other:?}"),
        }
        drop(held);
        assert_eq!(pool.stats().total, 0);
    }

    #[test]
    fn with_connection_returns_the_connection() {
        let (pool, _) = pool(PoolConfig::new(1));
        let changed = pool.with_connection(|conn| conn.exec_update("UPDATE", &[])).unwrap();
        assert_eq!(changed, 1);
        assert_eq!(pool.stats().active, 0);
    }

    #[test]
    fn detached_connections_leave_the_pool() {
        let (pool, _) = pool(PoolConfig::new(1));
        let conn = pool.checkout().unwrap().detach().unwrap();
        assert_eq!(conn.id, 0);
        assert_eq!(pool.stats().total, 0);
        assert_eq!(pool.checkout().unwrap().id, 1);
    }

    #[test]
    fn config_from_json() {
        let config: PoolConfig =
            serde_json::from_str(r#"{"max_connections": 8, "test_on_checkout": false}"#).unwrap();
        assert_eq!(config.max_connections, 8);
        assert!(!config.test_on_checkout);
        assert_eq!(config.acquire_timeout_ms, 5_000);
    }
}
