use crate::error::PgResult;
use anyhow::Context;
use postgres::types::ToSql;
use postgres::{Client, NoTls, Row};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A single blocking database connection.  One statement is in flight at a
/// time and the connection is never shared across threads; the odb and refdb
/// of one repository hand around an `Rc` of this.
pub struct PgSession {
    client: RefCell<Client>,
    in_txn: Cell<bool>,
}

impl PgSession {
    pub fn connect(conninfo: &str) -> PgResult<Rc<Self>> {
        let client = Client::connect(conninfo, NoTls).context("database connection failed")?;
        Ok(Rc::new(Self { client: RefCell::new(client), in_txn: Cell::new(false) }))
    }

    pub fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgResult<u64> {
        trace!("execute: {}", sql);
        self.client
            .borrow_mut()
            .execute(sql, params)
            .with_context(|| format!("query failed: `{}`", sql))
    }

    pub fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgResult<Vec<Row>> {
        trace!("query: {}", sql);
        self.client
            .borrow_mut()
            .query(sql, params)
            .with_context(|| format!("query failed: `{}`", sql))
    }

    pub fn query_opt(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgResult<Option<Row>> {
        trace!("query_opt: {}", sql);
        self.client
            .borrow_mut()
            .query_opt(sql, params)
            .with_context(|| format!("query failed: `{}`", sql))
    }

    pub fn batch_execute(&self, sql: &str) -> PgResult<()> {
        trace!("batch_execute: {}", sql);
        self.client
            .borrow_mut()
            .batch_execute(sql)
            .with_context(|| format!("query failed: `{}`", sql))
    }

    /// Opens an explicit transaction that can outlive the current call site.
    /// The connection holds at most one; nesting is refused rather than
    /// silently flattened.
    pub fn begin(&self) -> PgResult<PgTransaction<'_>> {
        ensure!(!self.in_txn.get(), "transaction already in progress on this session");
        self.batch_execute("BEGIN")?;
        self.in_txn.set(true);
        Ok(PgTransaction { session: self, finished: false })
    }

    /// Takes a transaction-scoped advisory lock; released by the enclosing
    /// commit or rollback.
    pub fn advisory_xact_lock(&self, key: i64) -> PgResult<()> {
        self.query("SELECT pg_advisory_xact_lock($1)", &[&key])?;
        Ok(())
    }
}

/// An open transaction on the session.  Dropping it without `commit` rolls
/// back, so early returns and panics release row and advisory locks.
pub struct PgTransaction<'s> {
    session: &'s PgSession,
    finished: bool,
}

impl PgTransaction<'_> {
    pub fn commit(mut self) -> PgResult<()> {
        self.finished = true;
        self.session.in_txn.set(false);
        self.session.batch_execute("COMMIT")
    }

    pub fn rollback(mut self) -> PgResult<()> {
        self.finished = true;
        self.session.in_txn.set(false);
        self.session.batch_execute("ROLLBACK")
    }
}

impl Drop for PgTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.session.in_txn.set(false);
            if let Err(err) = self.session.batch_execute("ROLLBACK") {
                warn!("implicit rollback failed: {}", err);
            }
        }
    }
}
