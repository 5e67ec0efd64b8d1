mod cli_clone;
mod cli_init;
mod cli_ls_refs;
mod cli_push;

use clap::Parser;
use cli_clone::GitPgCloneOpts;
use cli_init::GitPgInitOpts;
use cli_ls_refs::GitPgLsRefsOpts;
use cli_push::GitPgPushOpts;
use libgitpg::error::PgResult;
use std::ffi::OsString;

pub trait Cmd {
    fn exec(self) -> PgResult<()>;
}

pub fn run<T: Into<OsString> + Clone>(args: impl IntoIterator<Item = T>) -> PgResult<()> {
    let opts = GitPgCliOpts::parse_from(args);
    match opts.subcmd {
        GitPgSubCmd::Init(opts) => opts.exec(),
        GitPgSubCmd::Push(opts) => opts.exec(),
        GitPgSubCmd::Clone(opts) => opts.exec(),
        GitPgSubCmd::LsRefs(opts) => opts.exec(),
    }
}

#[derive(Parser, Debug)]
#[command(name = "gitpg", about = "move git repositories in and out of a postgres object store")]
pub struct GitPgCliOpts {
    #[command(subcommand)]
    pub subcmd: GitPgSubCmd,
}

#[derive(clap::Subcommand, Debug)]
pub enum GitPgSubCmd {
    /// create the repository record (and schema) in the database
    Init(GitPgInitOpts),
    /// copy objects and refs from a local repository into the database
    Push(GitPgPushOpts),
    /// copy objects and refs from the database into a new local repository
    Clone(GitPgCloneOpts),
    /// list the refs stored in the database for a repository
    LsRefs(GitPgLsRefsOpts),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_subcommands() {
        let opts = GitPgCliOpts::parse_from(["gitpg", "init", "dbname=db", "repo"]);
        assert!(matches!(opts.subcmd, GitPgSubCmd::Init(..)));
        let opts = GitPgCliOpts::parse_from(["gitpg", "push", "dbname=db", "repo", "."]);
        assert!(matches!(opts.subcmd, GitPgSubCmd::Push(..)));
        let opts = GitPgCliOpts::parse_from(["gitpg", "clone", "dbname=db", "repo", "dest"]);
        assert!(matches!(opts.subcmd, GitPgSubCmd::Clone(..)));
        let opts = GitPgCliOpts::parse_from(["gitpg", "ls-refs", "dbname=db", "repo"]);
        assert!(matches!(opts.subcmd, GitPgSubCmd::LsRefs(..)));
    }
}
