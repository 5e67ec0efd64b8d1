use crate::error::PgResult;
use crate::repo::{ensure_schema, PgRepo};
use crate::session::PgSession;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_REPO: AtomicUsize = AtomicUsize::new(0);

/// Database-backed tests opt in through `GITPG_TEST_DSN`; without it they
/// skip themselves so the suite passes on machines with no server.
pub fn test_dsn() -> Option<String> {
    match std::env::var("GITPG_TEST_DSN") {
        Ok(dsn) if !dsn.is_empty() => Some(dsn),
        _ => {
            eprintln!("skipping database test: GITPG_TEST_DSN is not set");
            None
        }
    }
}

/// a process-unique repository name so concurrent test runs don't collide
pub fn fresh_repo_name() -> String {
    format!("gitpg-test-{}-{}", std::process::id(), NEXT_REPO.fetch_add(1, Ordering::SeqCst))
}

pub fn with_test_repo(f: impl FnOnce(&PgRepo) -> PgResult<()>) -> PgResult<()> {
    let Some(dsn) = test_dsn() else { return Ok(()) };
    let session = PgSession::connect(&dsn)?;
    ensure_schema(&session)?;
    let repo = PgRepo::create(session, &fresh_repo_name())?;
    f(&repo)
}

/// an empty local repository in a fresh temp directory
pub fn empty_local_repo() -> PgResult<(tempfile::TempDir, git2::Repository)> {
    let dir = tempfile::tempdir()?;
    let repo = git2::Repository::init(dir.path())?;
    Ok((dir, repo))
}

/// Commits one `hello.txt` blob and returns the (commit, tree, blob) oids.
pub fn commit_sample(repo: &git2::Repository) -> PgResult<(git2::Oid, git2::Oid, git2::Oid)> {
    let blob = repo.blob(b"hello world\n")?;
    let mut builder = repo.treebuilder(None)?;
    builder.insert("hello.txt", blob, 0o100644)?;
    let tree_oid = builder.write()?;
    let tree = repo.find_tree(tree_oid)?;
    let sig = git2::Signature::new("tester", "tester@example.com", &git2::Time::new(0, 0))?;
    let commit = repo.commit(Some("HEAD"), &sig, &sig, "initial commit", &tree, &[])?;
    Ok((commit, tree_oid, blob))
}
