use super::{is_valid_name, PgRef, RefTarget};
use crate::error::{PgError, PgResult};
use crate::hash::OID_SIZE;
use crate::obj::Oid;
use crate::session::{PgSession, PgTransaction};
use crate::signature::Signature;
use fallible_iterator::FallibleIterator;
use std::rc::Rc;

/// The reference-store capability set.
pub trait RefDbBackend {
    fn exists(&self, name: &str) -> PgResult<bool>;
    fn lookup(&self, name: &str) -> PgResult<PgRef>;
    /// Name-ascending snapshot iterator.  A glob filters by mapping `*` to
    /// the SQL `LIKE` wildcard; no other character is reinterpreted.
    fn iter(&self, glob: Option<&str>) -> PgResult<PgRefIterator>;
    /// Transactional upsert.  Without `force` the write is a compare-and-swap:
    /// an expected old value requires the ref to exist and match, no expected
    /// value requires it to be absent.  A signature appends a reflog entry in
    /// the same transaction.
    fn write(
        &self,
        ref_: &PgRef,
        force: bool,
        sig: Option<&Signature>,
        message: Option<&str>,
        expected_oid: Option<Oid>,
        expected_target: Option<&str>,
    ) -> PgResult<()>;
    /// Moves the ref row and its reflog rows in one transaction, returning
    /// the renamed record.
    fn rename(
        &self,
        old: &str,
        new: &str,
        force: bool,
        sig: Option<&Signature>,
        message: Option<&str>,
    ) -> PgResult<PgRef>;
    /// Deletes the ref row and its reflog rows.  Expected old values follow
    /// the same compare-and-swap discipline as `write`; with none supplied
    /// the delete is unconditional.
    fn delete(
        &self,
        name: &str,
        expected_oid: Option<Oid>,
        expected_target: Option<&str>,
    ) -> PgResult<()>;
}

pub struct PgRefdb {
    session: Rc<PgSession>,
    repo_id: i32,
}

/// Advisory lock key for a ref: FNV-1a folded to 64 bits, the repo id mixed
/// in as four big-endian bytes ahead of the name, so updates to distinct
/// refs do not serialise on one lock.
pub(crate) fn lock_key(repo_id: i32, name: &str) -> i64 {
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x100_0000_01b3;

    let mut hash = FNV_OFFSET_BASIS;
    for &byte in repo_id.to_be_bytes().iter().chain(name.as_bytes()) {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash as i64
}

/// Token for a held per-ref lock.  It owns the open transaction, so dropping
/// an abandoned token rolls back and releases the advisory lock.
pub struct RefLock<'s> {
    txn: PgTransaction<'s>,
    key: i64,
    name: String,
}

impl RefLock<'_> {
    pub fn key(&self) -> i64 {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// How to resolve a held [`RefLock`].
pub enum UnlockOp<'a> {
    /// roll back without touching the ref
    Discard,
    /// upsert the locked ref (no compare-and-swap) and commit
    Apply { target: &'a RefTarget, reflog: Option<(&'a Signature, Option<&'a str>)> },
    /// delete the locked ref and its reflog rows, then commit
    Delete,
}

impl PgRefdb {
    pub fn new(session: Rc<PgSession>, repo_id: i32) -> Self {
        Self { session, repo_id }
    }

    pub(crate) fn session(&self) -> &PgSession {
        &self.session
    }

    pub(crate) fn repo_id(&self) -> i32 {
        self.repo_id
    }

    /// Upserts the row for `name`, clearing whichever column the target does
    /// not use.  Runs inside the caller's transaction.
    fn upsert(&self, name: &str, target: &RefTarget) -> PgResult<()> {
        match target {
            RefTarget::Direct(oid) => {
                let bytes: &[u8] = oid.as_bytes();
                self.session.execute(
                    "INSERT INTO refs (repo_id, name, oid, symbolic) \
                     VALUES ($1, $2, $3, NULL) \
                     ON CONFLICT (repo_id, name) DO UPDATE \
                     SET oid = EXCLUDED.oid, symbolic = NULL",
                    &[&self.repo_id, &name, &bytes],
                )?;
            }
            RefTarget::Symbolic(target) => {
                self.session.execute(
                    "INSERT INTO refs (repo_id, name, oid, symbolic) \
                     VALUES ($1, $2, NULL, $3) \
                     ON CONFLICT (repo_id, name) DO UPDATE \
                     SET oid = NULL, symbolic = EXCLUDED.symbolic",
                    &[&self.repo_id, &name, target],
                )?;
            }
        }
        Ok(())
    }

    /// Row-locks the current value and enforces the compare-and-swap
    /// contract.  Must run inside a transaction.
    fn check_expected(
        &self,
        name: &str,
        expected_oid: Option<Oid>,
        expected_target: Option<&str>,
    ) -> PgResult<()> {
        let row = self.session.query_opt(
            "SELECT oid, symbolic FROM refs WHERE repo_id = $1 AND name = $2 FOR UPDATE",
            &[&self.repo_id, &name],
        )?;

        if expected_oid.is_none() && expected_target.is_none() {
            // a plain create: the ref must not exist yet
            if row.is_some() {
                bail!(PgError::RefAlreadyExists(name.to_owned()));
            }
            return Ok(());
        }

        let row = row.ok_or_else(|| anyhow!(PgError::RefNotFound(name.to_owned())))?;
        let current_oid: Option<Vec<u8>> = row.try_get(0)?;
        let current_target: Option<String> = row.try_get(1)?;

        if let Some(expected) = expected_oid {
            // a symbolic row here is a kind mismatch, reported as a conflict
            match current_oid {
                Some(bytes) if bytes == expected.as_bytes() => {}
                _ => bail!(PgError::RefValueChanged(name.to_owned())),
            }
        }

        if let Some(expected) = expected_target {
            match current_target {
                Some(target) if target == expected => {}
                _ => bail!(PgError::RefValueChanged(name.to_owned())),
            }
        }

        Ok(())
    }

    /// Takes the per-ref advisory lock, leaving the transaction open until
    /// the token is resolved through [`PgRefdb::unlock`].
    pub fn lock(&self, name: &str) -> PgResult<RefLock<'_>> {
        let key = lock_key(self.repo_id, name);
        trace!("PgRefdb::lock(name: {}, key: {})", name, key);
        let txn = self.session.begin()?;
        self.session.advisory_xact_lock(key)?;
        Ok(RefLock { txn, key, name: name.to_owned() })
    }

    pub fn unlock(&self, lock: RefLock<'_>, op: UnlockOp<'_>) -> PgResult<()> {
        let RefLock { txn, name, .. } = lock;
        match op {
            UnlockOp::Discard => txn.rollback(),
            UnlockOp::Apply { target, reflog } => {
                let res = self.upsert(&name, target).and_then(|()| {
                    if let Some((sig, message)) = reflog {
                        self.append_reflog(&name, None, target.oid(), sig, message)
                    } else {
                        Ok(())
                    }
                });
                match res {
                    Ok(()) => txn.commit(),
                    Err(err) => {
                        let _ = txn.rollback();
                        Err(err)
                    }
                }
            }
            UnlockOp::Delete => {
                let res = self.delete_rows(&name);
                match res {
                    Ok(()) => txn.commit(),
                    Err(err) => {
                        let _ = txn.rollback();
                        Err(err)
                    }
                }
            }
        }
    }

    fn delete_rows(&self, name: &str) -> PgResult<()> {
        self.session.execute(
            "DELETE FROM refs WHERE repo_id = $1 AND name = $2",
            &[&self.repo_id, &name],
        )?;
        self.session.execute(
            "DELETE FROM reflog WHERE repo_id = $1 AND ref_name = $2",
            &[&self.repo_id, &name],
        )?;
        Ok(())
    }
}

impl RefDbBackend for PgRefdb {
    fn exists(&self, name: &str) -> PgResult<bool> {
        let row = self.session.query_opt(
            "SELECT 1 FROM refs WHERE repo_id = $1 AND name = $2",
            &[&self.repo_id, &name],
        )?;
        Ok(row.is_some())
    }

    fn lookup(&self, name: &str) -> PgResult<PgRef> {
        trace!("PgRefdb::lookup(name: {})", name);
        let row = self
            .session
            .query_opt(
                "SELECT oid, symbolic FROM refs WHERE repo_id = $1 AND name = $2",
                &[&self.repo_id, &name],
            )?
            .ok_or_else(|| anyhow!(PgError::RefNotFound(name.to_owned())))?;
        ref_from_columns(name.to_owned(), row.try_get(0)?, row.try_get(1)?)
    }

    fn iter(&self, glob: Option<&str>) -> PgResult<PgRefIterator> {
        let rows = match glob.filter(|glob| !glob.is_empty()) {
            Some(glob) => {
                let like = glob_to_like(glob);
                self.session.query(
                    "SELECT name, oid, symbolic FROM refs \
                     WHERE repo_id = $1 AND name LIKE $2 ORDER BY name",
                    &[&self.repo_id, &like],
                )?
            }
            None => self.session.query(
                "SELECT name, oid, symbolic FROM refs WHERE repo_id = $1 ORDER BY name",
                &[&self.repo_id],
            )?,
        };

        let mut refs = Vec::with_capacity(rows.len());
        for row in rows {
            refs.push((row.try_get(0)?, row.try_get(1)?, row.try_get(2)?));
        }
        Ok(PgRefIterator { refs, next: 0 })
    }

    fn write(
        &self,
        ref_: &PgRef,
        force: bool,
        sig: Option<&Signature>,
        message: Option<&str>,
        expected_oid: Option<Oid>,
        expected_target: Option<&str>,
    ) -> PgResult<()> {
        trace!("PgRefdb::write(ref: {}, force: {})", ref_, force);
        ensure!(is_valid_name(&ref_.name), "invalid reference name `{}`", ref_.name);

        let txn = self.session.begin()?;
        if !force {
            self.check_expected(&ref_.name, expected_oid, expected_target)?;
        }
        self.upsert(&ref_.name, &ref_.target)?;
        if let Some(sig) = sig {
            self.append_reflog(&ref_.name, expected_oid, ref_.target.oid(), sig, message)?;
        }
        txn.commit()
    }

    fn rename(
        &self,
        old: &str,
        new: &str,
        force: bool,
        _sig: Option<&Signature>,
        _message: Option<&str>,
    ) -> PgResult<PgRef> {
        trace!("PgRefdb::rename(old: {}, new: {}, force: {})", old, new, force);
        ensure!(is_valid_name(new), "invalid reference name `{}`", new);

        let txn = self.session.begin()?;
        if !force {
            let row = self.session.query_opt(
                "SELECT 1 FROM refs WHERE repo_id = $1 AND name = $2",
                &[&self.repo_id, &new],
            )?;
            if row.is_some() {
                bail!(PgError::RefAlreadyExists(new.to_owned()));
            }
        } else {
            // the overwritten ref goes away together with its log
            self.delete_rows(new)?;
        }

        let renamed = self.session.execute(
            "UPDATE refs SET name = $1 WHERE repo_id = $2 AND name = $3",
            &[&new, &self.repo_id, &old],
        )?;
        if renamed == 0 {
            bail!(PgError::RefNotFound(old.to_owned()));
        }

        self.session.execute(
            "UPDATE reflog SET ref_name = $1 WHERE repo_id = $2 AND ref_name = $3",
            &[&new, &self.repo_id, &old],
        )?;

        // re-read inside the transaction so the caller sees the row as renamed
        let row = self
            .session
            .query_opt(
                "SELECT oid, symbolic FROM refs WHERE repo_id = $1 AND name = $2",
                &[&self.repo_id, &new],
            )?
            .ok_or_else(|| anyhow!(PgError::RefNotFound(new.to_owned())))?;
        let ref_ = ref_from_columns(new.to_owned(), row.try_get(0)?, row.try_get(1)?)?;

        txn.commit()?;
        Ok(ref_)
    }

    fn delete(
        &self,
        name: &str,
        expected_oid: Option<Oid>,
        expected_target: Option<&str>,
    ) -> PgResult<()> {
        trace!("PgRefdb::delete(name: {})", name);
        let txn = self.session.begin()?;
        if expected_oid.is_some() || expected_target.is_some() {
            self.check_expected(name, expected_oid, expected_target)?;
        }
        self.delete_rows(name)?;
        txn.commit()
    }
}

pub(crate) fn glob_to_like(glob: &str) -> String {
    glob.chars().map(|c| if c == '*' { '%' } else { c }).collect()
}

/// Builds a record out of raw row columns, enforcing that exactly one of the
/// value columns is set.
fn ref_from_columns(
    name: String,
    oid: Option<Vec<u8>>,
    symbolic: Option<String>,
) -> PgResult<PgRef> {
    match (oid, symbolic) {
        (Some(bytes), None) => {
            ensure!(bytes.len() == OID_SIZE, PgError::CorruptRef(name.clone()));
            Ok(PgRef { name, target: RefTarget::Direct(Oid::from_slice(&bytes)?) })
        }
        (None, Some(target)) => Ok(PgRef { name, target: RefTarget::Symbolic(target) }),
        _ => bail!(PgError::CorruptRef(name)),
    }
}

/// A snapshot of matching rows, held for the iterator's lifetime so the
/// sequence is unaffected by concurrent writers.
pub struct PgRefIterator {
    refs: Vec<(String, Option<Vec<u8>>, Option<String>)>,
    next: usize,
}

impl PgRefIterator {
    /// name-only variant of `next`; skips building the full record
    pub fn next_name(&mut self) -> Option<&str> {
        let (name, ..) = self.refs.get(self.next)?;
        self.next += 1;
        Some(name)
    }
}

impl FallibleIterator for PgRefIterator {
    type Error = crate::error::PgGenericError;
    type Item = PgRef;

    fn next(&mut self) -> PgResult<Option<PgRef>> {
        let Some((name, oid, symbolic)) = self.refs.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        ref_from_columns(name.clone(), oid.clone(), symbolic.clone()).map(Some)
    }
}
