use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use sqlbridge::prelude::*;
use sqlbridge::{OpenFlags, PoolErrorKind, TransactionMode};

fn shared_memory() -> SqliteConfig {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    SqliteConfig::file(format!(
        "file:sqlbridge_pool_{}?mode=memory&cache=shared",
        NEXT.fetch_add(1, Ordering::Relaxed)
    ))
    .flags(OpenFlags::create_read_write().uri().shared_cache())
}

fn count(conn: &mut SqliteConnection) -> i64 {
    conn.execute("SELECT COUNT(*) FROM jobs")
        .unwrap()
        .scalar()
        .and_then(Value::as_i64)
        .unwrap()
}

#[test]
fn checkin_rolls_back_abandoned_transactions() {
    let config = shared_memory();
    let pool = Pool::new(
        move || SqliteConnection::open(&config),
        PoolConfig::new(1).min_connections(1),
    )
    .unwrap();

    pool.with_connection(|conn| conn.execute_batch("CREATE TABLE jobs (name TEXT)"))
        .unwrap();

    {
        let mut conn = pool.checkout().unwrap();
        conn.begin_transaction(TransactionOptions::new()).unwrap();
        conn.exec_update("INSERT INTO jobs VALUES ('half done')", &[]).unwrap();
        assert_eq!(conn.open_transactions(), 1);
    }

    let mut conn = pool.checkout().unwrap();
    assert_eq!(conn.open_transactions(), 0);
    assert_eq!(count(&mut conn), 0);
}

#[test]
fn exhausted_pool_times_out_with_the_wait_in_the_message() {
    let pool = Pool::new(SqliteConnection::open_memory, PoolConfig::new(1)).unwrap();
    let _held = pool.checkout().unwrap();

    let err = pool.checkout_timeout(Duration::from_millis(100)).unwrap_err();
    match err {
        Error::Pool(e) => {
            assert_eq!(e.kind, PoolErrorKind::Timeout);
            assert!(e.message.contains("0.1"), "{}", e.message);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(pool.stats().active, 1);
}

#[test]
fn threads_share_a_bounded_set_of_connections() {
    let path =
        std::env::temp_dir().join(format!("sqlbridge_pool_{}.sqlite3", std::process::id()));
    let path = path.to_string_lossy().into_owned();
    let cleanup = |path: &str| {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{path}{suffix}"));
        }
    };
    cleanup(&path);

    let config = SqliteConfig::file(path.clone())
        .busy_timeout(10_000)
        .transaction_mode(TransactionMode::Immediate);
    let pool = Pool::new(
        move || SqliteConnection::open(&config),
        PoolConfig::new(3).acquire_timeout(10_000),
    )
    .unwrap();
    pool.with_connection(|conn| conn.execute_batch("CREATE TABLE jobs (name TEXT)"))
        .unwrap();

    let workers: Vec<_> = (0..6)
        .map(|worker| {
            let pool = pool.clone();
            thread::spawn(move || {
                for job in 0..10 {
                    pool.with_connection(|conn| {
                        conn.transaction(TransactionOptions::new(), |conn| {
                            conn.exec_update(
                                "INSERT INTO jobs (name) VALUES (?)",
                                &[Value::from(format!("{worker}-{job}"))],
                            )
                        })
                    })
                    .unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let stats = pool.stats();
    assert!(stats.total <= 3, "{stats:?}");
    assert_eq!(stats.active, 0);
    assert_eq!(pool.with_connection(|conn| Ok(count(conn))).unwrap(), 60);

    pool.close();
    cleanup(&path);
}

#[test]
fn closed_pool_rejects_checkout() {
    let pool = Pool::new(SqliteConnection::open_memory, PoolConfig::new(2)).unwrap();
    pool.close();
    match pool.checkout().unwrap_err() {
        Error::Pool(e) => assert_eq!(e.kind, PoolErrorKind::Closed),
        other => panic!("unexpected {other:?}"),
    }
}
