use super::Cmd;
use libgitpg::error::PgResult;
use libgitpg::repo::{ensure_schema, PgRepo};
use libgitpg::session::PgSession;

#[derive(clap::Args, Debug)]
pub struct GitPgInitOpts {
    /// libpq-style connection string
    conninfo: String,
    reponame: String,
}

impl Cmd for GitPgInitOpts {
    fn exec(self) -> PgResult<()> {
        let session = PgSession::connect(&self.conninfo)?;
        ensure_schema(&session)?;
        let repo = PgRepo::create(session, &self.reponame)?;
        println!("Repository '{}' ready (id={})", repo.name(), repo.repo_id());
        Ok(())
    }
}
