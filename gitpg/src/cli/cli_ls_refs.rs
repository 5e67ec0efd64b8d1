use super::Cmd;
use fallible_iterator::FallibleIterator;
use libgitpg::error::PgResult;
use libgitpg::refs::{RefDbBackend, RefTarget};
use libgitpg::repo::PgRepo;
use libgitpg::session::PgSession;

#[derive(clap::Args, Debug)]
pub struct GitPgLsRefsOpts {
    /// libpq-style connection string
    conninfo: String,
    reponame: String,
}

impl Cmd for GitPgLsRefsOpts {
    fn exec(self) -> PgResult<()> {
        let session = PgSession::connect(&self.conninfo)?;
        let repo = PgRepo::find(session, &self.reponame)?;
        let mut iter = repo.refdb().iter(None)?;
        while let Some(ref_) = iter.next()? {
            match &ref_.target {
                RefTarget::Symbolic(target) => println!("-> {:<40} {}", target, ref_.name),
                RefTarget::Direct(oid) => println!("{:<42} {}", oid, ref_.name),
            }
        }
        Ok(())
    }
}
