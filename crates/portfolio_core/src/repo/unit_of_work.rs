//! Transaction boundary shared by the stores of one connection.
//!
//! # Responsibility
//! - Run a unit of work so that every store call inside it commits or rolls
//!   back together.
//!
//! # Invariants
//! - Write scopes use `BEGIN IMMEDIATE`, taking the database write lock before
//!   the first read so validate-then-mutate sequences cannot interleave with
//!   other writers.
//! - A scope opened while a transaction is already active runs inside a
//!   savepoint of it, so a failed scope discards only its own writes.
//! - Any error returned by the work rolls the transaction (or savepoint) back.

use crate::repo::{RepoError, RepoResult};
use log::warn;
use rusqlite::{Connection, Transaction, TransactionBehavior};

const SAVEPOINT_NAME: &str = "portfolio_uow";

/// Isolation intent for one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    /// Consistent snapshot for multi-statement reads.
    Read,
    /// Exclusive writer for validate-then-mutate sequences.
    Write,
}

/// Transaction boundary abstraction used by services.
pub trait UnitOfWork {
    /// Runs `work` atomically.
    fn atomically<T, E, F>(&self, mode: TxMode, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepoError>;
}

/// SQLite transaction boundary over the connection shared by the stores.
pub struct SqliteUnitOfWork<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUnitOfWork<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn begin(&self, mode: TxMode) -> RepoResult<Transaction<'conn>> {
        let behavior = match mode {
            TxMode::Read => TransactionBehavior::Deferred,
            TxMode::Write => TransactionBehavior::Immediate,
        };
        Ok(Transaction::new_unchecked(self.conn, behavior)?)
    }

    fn within_savepoint<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepoError>,
    {
        let mut savepoint = SavepointGuard::open(self.conn)?;
        let value = work()?;
        savepoint.release()?;
        Ok(value)
    }
}

/// Named savepoint inside the caller's transaction; rolls back on drop.
struct SavepointGuard<'conn> {
    conn: &'conn Connection,
    released: bool,
}

impl<'conn> SavepointGuard<'conn> {
    fn open(conn: &'conn Connection) -> RepoResult<Self> {
        conn.execute_batch(&format!("SAVEPOINT {SAVEPOINT_NAME};"))?;
        Ok(Self {
            conn,
            released: false,
        })
    }

    fn release(&mut self) -> RepoResult<()> {
        self.conn
            .execute_batch(&format!("RELEASE {SAVEPOINT_NAME};"))?;
        self.released = true;
        Ok(())
    }
}

impl Drop for SavepointGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let sql = format!("ROLLBACK TO {SAVEPOINT_NAME}; RELEASE {SAVEPOINT_NAME};");
        if let Err(err) = self.conn.execute_batch(&sql) {
            warn!("event=uow_savepoint_rollback module=repo status=error error={err}");
        }
    }
}

impl UnitOfWork for SqliteUnitOfWork<'_> {
    fn atomically<T, E, F>(&self, mode: TxMode, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepoError>,
    {
        if !self.conn.is_autocommit() {
            return self.within_savepoint(work);
        }

        let tx = self.begin(mode)?;
        let value = work()?;
        tx.commit().map_err(RepoError::from)?;
        Ok(value)
    }
}
