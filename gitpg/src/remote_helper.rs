//! git-remote-gitpg: a git remote helper that stores objects and refs in
//! PostgreSQL.
//!
//! git invokes this as `git-remote-gitpg <remote-name> <url>`, where `<url>`
//! is everything after `gitpg::` in the remote url, of the form
//! `<conninfo>/<reponame>`:
//!
//! ```text
//! git remote add pg gitpg::dbname=mydb/myrepo
//! git push pg main
//! git clone gitpg::dbname=mydb/myrepo
//! ```
//!
//! Protocol reference: gitremote-helpers(7).

use libgitpg::error::PgResult;
use libgitpg::helper::{parse_url, RemoteHelper};
use libgitpg::repo::PgRepo;
use log::debug;
use std::io;

/// `GITPG_TRACE` names a file that receives the protocol trace; without it
/// logging goes to stderr under `GITPG_LOG`.
fn init_logging() {
    if let Ok(path) = std::env::var("GITPG_TRACE") {
        if !path.is_empty() {
            match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => {
                    env_logger::Builder::new()
                        .filter_level(log::LevelFilter::Trace)
                        .target(env_logger::Target::Pipe(Box::new(file)))
                        .init();
                    return;
                }
                Err(err) => eprintln!("warning: could not open trace file `{}`: {}", path, err),
            }
        }
    }
    env_logger::builder().parse_env("GITPG_LOG").init();
}

fn usage() -> ! {
    eprintln!(
        "usage: git-remote-gitpg <remote-name> <url>\n\
         \n\
         This is a git remote helper. Use it via:\n\
         \x20 git remote add <name> gitpg::<conninfo>/<reponame>\n\
         \x20 git push <name> main\n\
         \x20 git clone gitpg::<conninfo>/<reponame>"
    );
    std::process::exit(1)
}

fn run() -> PgResult<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        usage();
    }

    let url = &args[2];
    let (conninfo, reponame) = parse_url(url)?;
    debug!("url=`{}` repo=`{}`", url, reponame);

    let repo = PgRepo::open(&conninfo, &reponame)?;
    let git_dir = std::env::var("GIT_DIR").unwrap_or_else(|_| ".git".to_owned());
    debug!("repo_id={} git_dir={}", repo.repo_id(), git_dir);

    let stdin = io::stdin();
    let stdout = io::stdout();
    RemoteHelper::new(repo, git_dir, stdin.lock(), stdout.lock()).run()
}

pub fn main() -> ! {
    init_logging();
    if let Err(err) = run() {
        eprintln!("fatal: git-remote-gitpg: {:#}", err);
        std::process::exit(1)
    } else {
        std::process::exit(0)
    }
}
