use super::PgRefdb;
use crate::error::PgResult;
use crate::obj::Oid;
use crate::signature::Signature;

// Reflog entries are written as a side effect of ref updates, inside the
// same transaction; the store is reflog-always-on.  Read-back happens out of
// band, so the operations here are the bookkeeping ones.
impl PgRefdb {
    /// Appends one history row for `name`.  Zero oids are recorded as NULL.
    /// Runs inside the caller's transaction.
    pub(crate) fn append_reflog(
        &self,
        name: &str,
        old_oid: Option<Oid>,
        new_oid: Option<Oid>,
        sig: &Signature,
        message: Option<&str>,
    ) -> PgResult<()> {
        let old_oid = old_oid.filter(|oid| !oid.is_zero());
        let new_oid = new_oid.filter(|oid| !oid.is_zero());
        let old_bytes = old_oid.as_ref().map(|oid| &oid.as_bytes()[..]);
        let new_bytes = new_oid.as_ref().map(|oid| &oid.as_bytes()[..]);

        let committer = sig.committer();
        let timestamp_s = sig.time.time.seconds();
        let tz_offset = sig.time.offset.to_string();

        self.session().execute(
            "INSERT INTO reflog \
             (repo_id, ref_name, old_oid, new_oid, committer, timestamp_s, tz_offset, message) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            &[
                &self.repo_id(),
                &name,
                &old_bytes,
                &new_bytes,
                &committer,
                &timestamp_s,
                &tz_offset,
                &message,
            ],
        )?;
        Ok(())
    }

    pub fn has_log(&self, name: &str) -> PgResult<bool> {
        let row = self.session().query_opt(
            "SELECT 1 FROM reflog WHERE repo_id = $1 AND ref_name = $2 LIMIT 1",
            &[&self.repo_id(), &name],
        )?;
        Ok(row.is_some())
    }

    /// every ref is logged when its updates carry a signature, so there is
    /// nothing to pre-create
    pub fn ensure_log(&self, _name: &str) -> PgResult<()> {
        Ok(())
    }

    pub fn reflog_rename(&self, old: &str, new: &str) -> PgResult<()> {
        self.session().execute(
            "UPDATE reflog SET ref_name = $1 WHERE repo_id = $2 AND ref_name = $3",
            &[&new, &self.repo_id(), &old],
        )?;
        Ok(())
    }

    pub fn reflog_delete(&self, name: &str) -> PgResult<()> {
        self.session().execute(
            "DELETE FROM reflog WHERE repo_id = $1 AND ref_name = $2",
            &[&self.repo_id(), &name],
        )?;
        Ok(())
    }
}
