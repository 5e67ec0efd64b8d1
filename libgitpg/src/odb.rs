mod writepack;

pub use writepack::*;

use crate::error::{PgError, PgResult};
use crate::obj::{ObjType, Oid, PartialOid, RawObject};
use crate::session::PgSession;
use std::rc::Rc;

/// The object-store capability set.  `PgOdb` persists rows in the database;
/// `LocalOdb` adapts a `git2::Odb` so transfers between the two are a single
/// generic routine.
pub trait OdbBackend {
    fn read(&self, oid: Oid) -> PgResult<RawObject>;
    fn read_header(&self, oid: Oid) -> PgResult<(usize, ObjType)>;
    fn read_prefix(&self, prefix: PartialOid) -> PgResult<(Oid, RawObject)>;
    /// Idempotent: writing an oid that is already present succeeds without
    /// touching the stored row.  The oid is trusted, not recomputed.
    fn write(&self, oid: Oid, obj_type: ObjType, data: &[u8]) -> PgResult<()>;
    fn exists(&self, oid: Oid) -> PgResult<bool>;
    fn exists_prefix(&self, prefix: PartialOid) -> PgResult<Oid>;
    /// Yields every oid; the callback returns `false` to abort the
    /// enumeration and may fail, which aborts it with that error.
    fn foreach(&self, cb: &mut dyn FnMut(Oid) -> PgResult<bool>) -> PgResult<()>;
}

#[derive(Clone)]
pub struct PgOdb {
    session: Rc<PgSession>,
    repo_id: i32,
}

impl PgOdb {
    pub fn new(session: Rc<PgSession>, repo_id: i32) -> Self {
        Self { session, repo_id }
    }
}

impl OdbBackend for PgOdb {
    fn read(&self, oid: Oid) -> PgResult<RawObject> {
        trace!("PgOdb::read(oid: {})", oid);
        let bytes: &[u8] = oid.as_bytes();
        let row = self
            .session
            .query_opt(
                "SELECT type, size, content FROM objects WHERE repo_id = $1 AND oid = $2",
                &[&self.repo_id, &bytes],
            )?
            .ok_or_else(|| anyhow!(PgError::ObjectNotFound(oid.into())))?;

        let obj_type = ObjType::from_raw(row.try_get::<_, i16>(0)?)?;
        let size = row.try_get::<_, i32>(1)? as usize;
        let content: Vec<u8> = row.try_get(2)?;
        Ok(RawObject { obj_type, size, bytes: content })
    }

    fn read_header(&self, oid: Oid) -> PgResult<(usize, ObjType)> {
        let bytes: &[u8] = oid.as_bytes();
        let row = self
            .session
            .query_opt(
                "SELECT type, size FROM objects WHERE repo_id = $1 AND oid = $2",
                &[&self.repo_id, &bytes],
            )?
            .ok_or_else(|| anyhow!(PgError::ObjectNotFound(oid.into())))?;

        let obj_type = ObjType::from_raw(row.try_get::<_, i16>(0)?)?;
        let size = row.try_get::<_, i32>(1)? as usize;
        Ok((size, obj_type))
    }

    fn read_prefix(&self, prefix: PartialOid) -> PgResult<(Oid, RawObject)> {
        trace!("PgOdb::read_prefix(prefix: {})", prefix);
        if prefix.is_full() {
            let oid = prefix.into_oid()?;
            return Ok((oid, self.read(oid)?));
        }

        let prefix_bytes = prefix.prefix_bytes()?;
        let rows = self.session.query(
            "SELECT oid, type, size, content FROM objects \
             WHERE repo_id = $1 AND substring(oid from 1 for $2) = $3",
            &[&self.repo_id, &(prefix.byte_len() as i32), &prefix_bytes.as_slice()],
        )?;

        match rows.as_slice() {
            [] => bail!(PgError::ObjectNotFound(prefix.into())),
            [row] => {
                let oid = Oid::from_slice(&row.try_get::<_, Vec<u8>>(0)?)?;
                let obj_type = ObjType::from_raw(row.try_get::<_, i16>(1)?)?;
                let size = row.try_get::<_, i32>(2)? as usize;
                let content: Vec<u8> = row.try_get(3)?;
                Ok((oid, RawObject { obj_type, size, bytes: content }))
            }
            _ => bail!(PgError::AmbiguousPrefix(prefix)),
        }
    }

    fn write(&self, oid: Oid, obj_type: ObjType, data: &[u8]) -> PgResult<()> {
        trace!("PgOdb::write(oid: {}, type: {}, len: {})", oid, obj_type, data.len());
        let bytes: &[u8] = oid.as_bytes();
        self.session.execute(
            "INSERT INTO objects (repo_id, oid, type, size, content) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (repo_id, oid) DO NOTHING",
            &[&self.repo_id, &bytes, &obj_type.as_i16(), &(data.len() as i32), &data],
        )?;
        Ok(())
    }

    fn exists(&self, oid: Oid) -> PgResult<bool> {
        let bytes: &[u8] = oid.as_bytes();
        let row = self.session.query_opt(
            "SELECT 1 FROM objects WHERE repo_id = $1 AND oid = $2",
            &[&self.repo_id, &bytes],
        )?;
        Ok(row.is_some())
    }

    fn exists_prefix(&self, prefix: PartialOid) -> PgResult<Oid> {
        if prefix.is_full() {
            let oid = prefix.into_oid()?;
            if !self.exists(oid)? {
                bail!(PgError::ObjectNotFound(oid.into()));
            }
            return Ok(oid);
        }

        let prefix_bytes = prefix.prefix_bytes()?;
        let rows = self.session.query(
            "SELECT oid FROM objects WHERE repo_id = $1 AND substring(oid from 1 for $2) = $3",
            &[&self.repo_id, &(prefix.byte_len() as i32), &prefix_bytes.as_slice()],
        )?;

        match rows.as_slice() {
            [] => bail!(PgError::ObjectNotFound(prefix.into())),
            [row] => Oid::from_slice(&row.try_get::<_, Vec<u8>>(0)?),
            _ => bail!(PgError::AmbiguousPrefix(prefix)),
        }
    }

    fn foreach(&self, cb: &mut dyn FnMut(Oid) -> PgResult<bool>) -> PgResult<()> {
        // materialized up front so callbacks are free to issue their own queries
        let rows = self
            .session
            .query("SELECT oid FROM objects WHERE repo_id = $1", &[&self.repo_id])?;
        for row in rows {
            let oid = Oid::from_slice(&row.try_get::<_, Vec<u8>>(0)?)?;
            if !cb(oid)? {
                break;
            }
        }
        Ok(())
    }
}

/// A local `git2::Odb` behind the same capability set.
pub struct LocalOdb<'odb> {
    odb: &'odb git2::Odb<'odb>,
}

impl<'odb> LocalOdb<'odb> {
    pub fn new(odb: &'odb git2::Odb<'odb>) -> Self {
        Self { odb }
    }
}

fn map_git2_err(err: git2::Error, oid: Oid) -> crate::error::PgGenericError {
    match err.code() {
        git2::ErrorCode::NotFound => anyhow!(PgError::ObjectNotFound(oid.into())),
        _ => err.into(),
    }
}

impl OdbBackend for LocalOdb<'_> {
    fn read(&self, oid: Oid) -> PgResult<RawObject> {
        let obj = self.odb.read(oid.into()).map_err(|err| map_git2_err(err, oid))?;
        Ok(RawObject {
            obj_type: ObjType::from_git2(obj.kind())?,
            size: obj.len(),
            bytes: obj.data().to_vec(),
        })
    }

    fn read_header(&self, oid: Oid) -> PgResult<(usize, ObjType)> {
        let (size, kind) =
            self.odb.read_header(oid.into()).map_err(|err| map_git2_err(err, oid))?;
        Ok((size, ObjType::from_git2(kind)?))
    }

    fn read_prefix(&self, prefix: PartialOid) -> PgResult<(Oid, RawObject)> {
        let oid = self.exists_prefix(prefix)?;
        Ok((oid, self.read(oid)?))
    }

    fn write(&self, _oid: Oid, obj_type: ObjType, data: &[u8]) -> PgResult<()> {
        // loose storage recomputes the oid from the content; for well-formed
        // objects they coincide
        self.odb.write(obj_type.to_git2(), data)?;
        Ok(())
    }

    fn exists(&self, oid: Oid) -> PgResult<bool> {
        Ok(self.odb.exists(oid.into()))
    }

    fn exists_prefix(&self, prefix: PartialOid) -> PgResult<Oid> {
        let short = prefix.into_oid()?;
        match self.odb.exists_prefix(short.into(), prefix.len()) {
            Ok(oid) => Ok(oid.into()),
            Err(err) if err.code() == git2::ErrorCode::NotFound => {
                bail!(PgError::ObjectNotFound(prefix.into()))
            }
            Err(err) if err.code() == git2::ErrorCode::Ambiguous => {
                bail!(PgError::AmbiguousPrefix(prefix))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn foreach(&self, cb: &mut dyn FnMut(Oid) -> PgResult<bool>) -> PgResult<()> {
        let mut failure = None;
        let mut aborted = false;
        let res = self.odb.foreach(|oid| match cb(Oid::from(*oid)) {
            Ok(true) => true,
            Ok(false) => {
                aborted = true;
                false
            }
            Err(err) => {
                failure = Some(err);
                false
            }
        });
        if let Some(err) = failure {
            return Err(err);
        }
        // a stopped callback surfaces from libgit2 as a user error; the
        // enumeration still terminated the way the caller asked
        if aborted {
            return Ok(());
        }
        res?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
