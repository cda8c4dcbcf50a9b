//! Long-lived pooled session over one keyspace.
//!
//! # Responsibility
//! - Open connections with the keyspace attached and connection pragmas set.
//! - Run schema bootstrap and statement preparation before handing out the
//!   session.
//! - Release every connection exactly once on `close`.
//!
//! # Invariants
//! - In-memory keyspaces use a single connection; separate in-memory
//!   connections would be separate databases.
//! - Every pooled connection has every statement template compiled.
//! - Each borrowed connection serves one statement round trip; the session
//!   never holds a connection across store calls.

use crate::config::SessionConfig;
use crate::db::schema::{ensure_schema, validate_keyspace};
use crate::db::statements::StatementCache;
use crate::db::{DbError, DbResult};
use crate::logging::init_logging;
use log::{error, info, warn};
use rusqlite::{Connection, DatabaseName};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

const MEMORY_TARGET: &str = ":memory:";

/// Shared storage handle: connection pool plus compiled statement templates.
///
/// `Session` is `Sync`; one instance is meant to be shared by every caller in
/// the process.
pub struct Session {
    statements: StatementCache,
    connections: Vec<Mutex<Connection>>,
    cursor: AtomicUsize,
    mode: &'static str,
}

impl Session {
    /// Opens the keyspace described by `config`, creating schema if absent.
    ///
    /// # Side effects
    /// - Starts process logging first when `config.logging` is set.
    /// - Creates `storage_dir` and `<keyspace>.db` when missing.
    /// - Emits `session_open` logging events with duration and status.
    ///
    /// # Errors
    /// - Any schema or statement preparation failure; the session is unusable
    ///   without both.
    pub fn open(config: &SessionConfig) -> DbResult<Self> {
        if let Some(logging) = &config.logging {
            init_logging(logging)?;
        }
        let started_at = Instant::now();
        let mode = if config.is_in_memory() { "memory" } else { "file" };
        info!(
            "event=session_open module=db status=start mode={} keyspace={}",
            mode, config.keyspace
        );

        match Self::bootstrap(config, mode) {
            Ok(session) => {
                info!(
                    "event=session_open module=db status=ok mode={} keyspace={} pool_size={} duration_ms={}",
                    mode,
                    config.keyspace,
                    session.pool_size(),
                    started_at.elapsed().as_millis()
                );
                Ok(session)
            }
            Err(err) => {
                error!(
                    "event=session_open module=db status=error mode={} keyspace={} duration_ms={} error={}",
                    mode,
                    config.keyspace,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Opens an in-memory keyspace with default pool settings.
    pub fn open_in_memory(keyspace: &str) -> DbResult<Self> {
        Self::open(&SessionConfig::in_memory(keyspace))
    }

    fn bootstrap(config: &SessionConfig, mode: &'static str) -> DbResult<Self> {
        validate_keyspace(&config.keyspace)?;
        let keyspace = config.keyspace.as_str();
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);

        let (target, pool_size) = match &config.storage_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let path = dir.join(format!("{keyspace}.db"));
                (path.to_string_lossy().into_owned(), config.pool_size.max(1))
            }
            None => (MEMORY_TARGET.to_string(), 1),
        };

        let mut first = open_connection(&target, keyspace, busy_timeout)?;
        ensure_schema(&mut first, keyspace)?;

        let statements = StatementCache::new(keyspace)?;
        statements.prepare_all(&first)?;

        let mut connections = Vec::with_capacity(pool_size);
        connections.push(Mutex::new(first));
        for _ in 1..pool_size {
            let conn = open_connection(&target, keyspace, busy_timeout)?;
            statements.prepare_all(&conn)?;
            connections.push(Mutex::new(conn));
        }
        info!(
            "event=statements_prepare module=db status=ok keyspace={} connections={}",
            keyspace,
            connections.len()
        );

        Ok(Self {
            statements,
            connections,
            cursor: AtomicUsize::new(0),
            mode,
        })
    }

    pub fn keyspace(&self) -> &str {
        self.statements.keyspace()
    }

    pub fn statements(&self) -> &StatementCache {
        &self.statements
    }

    pub fn pool_size(&self) -> usize {
        self.connections.len()
    }

    /// Runs `f` on one pooled connection.
    ///
    /// An idle connection is preferred; when all are busy the call waits on
    /// the next one in round-robin order.
    pub fn with_connection<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let conn = self.acquire()?;
        f(&conn)
    }

    fn acquire(&self) -> DbResult<MutexGuard<'_, Connection>> {
        let len = self.connections.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        for offset in 0..len {
            match self.connections[(start + offset) % len].try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::WouldBlock) => continue,
                Err(TryLockError::Poisoned(_)) => return Err(DbError::ConnectionPoisoned),
            }
        }
        self.connections[start % len]
            .lock()
            .map_err(|_| DbError::ConnectionPoisoned)
    }

    /// Closes every pooled connection.
    ///
    /// Consumes the session so release happens exactly once. All connections
    /// are closed even when one fails; the first failure is returned.
    pub fn close(self) -> DbResult<()> {
        let keyspace = self.statements.keyspace().to_string();
        let mut first_error: Option<rusqlite::Error> = None;

        for slot in self.connections {
            let conn = slot.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Err((_conn, err)) = conn.close() {
                warn!(
                    "event=session_close module=db status=degraded keyspace={} error={}",
                    keyspace, err
                );
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            None => {
                info!(
                    "event=session_close module=db status=ok mode={} keyspace={}",
                    self.mode, keyspace
                );
                Ok(())
            }
            Some(err) => Err(err.into()),
        }
    }
}

fn open_connection(target: &str, keyspace: &str, busy_timeout: Duration) -> DbResult<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.busy_timeout(busy_timeout)?;
    conn.execute(&format!("ATTACH DATABASE ?1 AS {keyspace};"), [target])?;
    if target != MEMORY_TARGET {
        conn.pragma_update_and_check(
            Some(DatabaseName::Attached(keyspace)),
            "journal_mode",
            "WAL",
            |row| row.get::<_, String>(0),
        )?;
    }
    Ok(conn)
}
