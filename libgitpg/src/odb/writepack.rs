use super::{OdbBackend, PgOdb};
use crate::error::PgResult;
use crate::obj::{ObjType, Oid};
use git2::Indexer;
use std::io::Write;
use tempfile::TempDir;

/// Invoked at the indexer's cadence; returning `false` cancels the ingest.
pub type IndexerProgress<'a> = dyn FnMut(git2::Progress<'_>) -> bool + 'a;

/// A streaming pack sink.  `append` feeds packfile bytes and `commit`
/// transfers every indexed object into the backing store.
pub trait OdbWritepack {
    fn append(&mut self, data: &[u8]) -> PgResult<()>;
    fn commit(&mut self) -> PgResult<()>;
}

/// Stages the pack and its index in a private temporary directory which is
/// removed when the sink is dropped, whether or not `commit` ever ran.
pub struct PgWritepack<'odb> {
    backend: PgOdb,
    tmpdir: TempDir,
    indexer: Option<Indexer<'odb>>,
}

impl PgOdb {
    /// Opens a pack sink.  `local`, when given, resolves delta bases that a
    /// thin pack omits.
    pub fn writepack<'odb>(
        &self,
        local: Option<&'odb git2::Odb<'odb>>,
        progress: Option<Box<IndexerProgress<'odb>>>,
    ) -> PgResult<PgWritepack<'odb>> {
        let tmpdir = tempfile::Builder::new().prefix("gitpg-writepack").tempdir()?;
        // the indexer writes pack-<hash>.pack and pack-<hash>.idx into a
        // pack/ subdirectory, matching the on-disk odb layout
        let pack_dir = tmpdir.path().join("pack");
        std::fs::create_dir(&pack_dir)?;

        let mut indexer = Indexer::new(local, &pack_dir, 0o644, false)?;
        if let Some(cb) = progress {
            indexer.progress(cb);
        }

        Ok(PgWritepack { backend: self.clone(), tmpdir, indexer: Some(indexer) })
    }
}

impl OdbWritepack for PgWritepack<'_> {
    fn append(&mut self, data: &[u8]) -> PgResult<()> {
        let indexer =
            self.indexer.as_mut().ok_or_else(|| anyhow!("writepack already committed"))?;
        indexer.write_all(data)?;
        Ok(())
    }

    fn commit(&mut self) -> PgResult<()> {
        let indexer =
            self.indexer.take().ok_or_else(|| anyhow!("writepack already committed"))?;
        let name = indexer.commit()?;
        debug!("writepack indexed pack-{}", name);

        // open the staged pack as a read-only odb and replay every object
        // through the ordinary write path
        let pack_odb = git2::Odb::new()?;
        let alternate = self
            .tmpdir
            .path()
            .to_str()
            .ok_or_else(|| anyhow!("writepack temp directory path is not utf-8"))?;
        pack_odb.add_disk_alternate(alternate)?;

        let mut failure = None;
        let res = pack_odb.foreach(|oid| {
            let res = pack_odb
                .read(*oid)
                .map_err(Into::into)
                .and_then(|obj| -> PgResult<()> {
                    let obj_type = ObjType::from_git2(obj.kind())?;
                    self.backend.write(Oid::from(*oid), obj_type, obj.data())
                });
            match res {
                Ok(()) => true,
                Err(err) => {
                    failure = Some(err);
                    false
                }
            }
        });
        // a single failed write aborts the ingest; replaying the same pack
        // later is safe because object writes are idempotent
        if let Some(err) = failure {
            return Err(err);
        }
        res?;
        Ok(())
    }
}

impl PgWritepack<'_> {
    #[cfg(test)]
    pub(crate) fn staging_path(&self) -> &std::path::Path {
        self.tmpdir.path()
    }
}
