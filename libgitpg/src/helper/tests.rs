use super::*;
use crate::repo::ensure_schema;
use crate::session::PgSession;
use crate::test_utils::{commit_sample, empty_local_repo, fresh_repo_name, test_dsn};
use std::io::Cursor;

#[test]
fn parse_helper_url() -> PgResult<()> {
    let (conninfo, name) = parse_url("dbname=mydb host=localhost/myrepo")?;
    assert_eq!(conninfo, "dbname=mydb host=localhost");
    assert_eq!(name, "myrepo");
    Ok(())
}

#[test]
fn url_splits_on_last_slash() -> PgResult<()> {
    let (conninfo, name) = parse_url("postgresql://u@localhost/db/repo")?;
    assert_eq!(conninfo, "postgresql://u@localhost/db");
    assert_eq!(name, "repo");
    Ok(())
}

#[test]
fn reject_bad_urls() {
    assert!(parse_url("dbname=mydb").is_err());
    assert!(parse_url("dbname=mydb/").is_err());
    assert!(parse_url("/repo").is_err());
}

#[test]
fn capabilities_output() -> PgResult<()> {
    let mut out = vec![];
    write_capabilities(&mut out)?;
    assert_eq!(out, b"fetch\npush\n\n");
    Ok(())
}

fn oid(hex: &str) -> Oid {
    hex.parse().unwrap()
}

#[test]
fn listing_with_symbolic_head() -> PgResult<()> {
    let refs = vec![
        PgRef::symbolic("HEAD", "refs/heads/main"),
        PgRef::direct("refs/heads/dev", oid("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")),
        PgRef::direct("refs/heads/main", oid("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")),
    ];
    let mut out = vec![];
    write_ref_listing(&mut out, &refs)?;
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa refs/heads/dev\n\
         bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb refs/heads/main\n\
         @refs/heads/main HEAD\n\n"
    );
    Ok(())
}

#[test]
fn listing_omits_dangling_symbolic_head() -> PgResult<()> {
    let refs = vec![
        PgRef::symbolic("HEAD", "refs/heads/gone"),
        PgRef::direct("refs/heads/main", oid("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")),
    ];
    let mut out = vec![];
    write_ref_listing(&mut out, &refs)?;
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb refs/heads/main\n\n"
    );
    Ok(())
}

#[test]
fn listing_with_detached_head() -> PgResult<()> {
    let refs = vec![
        PgRef::direct("HEAD", oid("cccccccccccccccccccccccccccccccccccccccc")),
        PgRef::direct("refs/heads/main", oid("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")),
    ];
    let mut out = vec![];
    write_ref_listing(&mut out, &refs)?;
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb refs/heads/main\n\
         cccccccccccccccccccccccccccccccccccccccc HEAD\n\n"
    );
    Ok(())
}

#[test]
fn listing_skips_symbolic_refs() -> PgResult<()> {
    // symbolic refs other than HEAD never get a line of their own
    let refs = vec![PgRef::symbolic("refs/heads/alias", "refs/heads/main")];
    let mut out = vec![];
    write_ref_listing(&mut out, &refs)?;
    assert_eq!(String::from_utf8(out).unwrap(), "\n");
    Ok(())
}

#[test]
fn push_then_list_dialogue() -> PgResult<()> {
    let Some(dsn) = test_dsn() else { return Ok(()) };
    let session = PgSession::connect(&dsn)?;
    ensure_schema(&session)?;
    let repo_name = fresh_repo_name();
    let repo = PgRepo::create(session, &repo_name)?;

    let (_dir, local) = empty_local_repo()?;
    let (commit, tree, blob) = commit_sample(&local)?;

    // push by raw oid so the dialogue is independent of the local branch name
    let input = format!("capabilities\npush {}:refs/heads/main\n\nlist\n\n", commit);
    let mut out = vec![];
    RemoteHelper::new(repo, local.path(), Cursor::new(input.into_bytes()), &mut out).run()?;

    let expected = format!(
        "fetch\npush\n\nok refs/heads/main\n\n\
         {} refs/heads/main\n@refs/heads/main HEAD\n\n",
        commit
    );
    assert_eq!(String::from_utf8(out).unwrap(), expected);

    // every local object crossed over before the ref update
    let session = PgSession::connect(&dsn)?;
    let repo = PgRepo::find(session, &repo_name)?;
    let odb = repo.odb();
    for oid in [commit, tree, blob] {
        assert!(crate::odb::OdbBackend::exists(&odb, Oid::from(oid))?);
    }
    Ok(())
}

#[test]
fn fetch_and_delete_dialogue() -> PgResult<()> {
    let Some(dsn) = test_dsn() else { return Ok(()) };
    let session = PgSession::connect(&dsn)?;
    ensure_schema(&session)?;
    let repo_name = fresh_repo_name();
    let repo = PgRepo::create(session, &repo_name)?;

    let (_dir, source) = empty_local_repo()?;
    let (commit, ..) = commit_sample(&source)?;
    let input = format!("push {}:refs/heads/main\n\n", commit);
    let mut out = vec![];
    RemoteHelper::new(repo, source.path(), Cursor::new(input.into_bytes()), &mut out).run()?;

    // a fresh clone target learns the objects through the fetch dialogue
    let (_dir2, target) = empty_local_repo()?;
    let session = PgSession::connect(&dsn)?;
    let repo = PgRepo::find(session, &repo_name)?;
    let input = format!("fetch {} refs/heads/main\n\n", commit);
    let mut out = vec![];
    RemoteHelper::new(repo, target.path(), Cursor::new(input.into_bytes()), &mut out).run()?;
    assert_eq!(out, b"\n");
    assert!(target.odb()?.exists(commit));

    // a delete spec removes the ref and reports ok
    let session = PgSession::connect(&dsn)?;
    let repo = PgRepo::find(session, &repo_name)?;
    let input = "push :refs/heads/main\n\n".to_owned();
    let mut out = vec![];
    {
        let session = PgSession::connect(&dsn)?;
        let check = PgRepo::find(session, &repo_name)?;
        RemoteHelper::new(repo, target.path(), Cursor::new(input.into_bytes()), &mut out).run()?;
        assert_eq!(String::from_utf8(out).unwrap(), "ok refs/heads/main\n\n");
        assert!(!check.refdb().exists("refs/heads/main")?);
    }
    Ok(())
}
