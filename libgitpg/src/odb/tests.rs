use super::*;
use crate::error::{PgError, PgErrorExt, PgResultExt};
use crate::hash::hash_object;
use crate::repo::PgRepo;
use crate::test_utils::{commit_sample, empty_local_repo, with_test_repo};
use std::rc::Rc;

fn object_row_count(repo: &PgRepo, oid: Oid) -> PgResult<i64> {
    let bytes: &[u8] = oid.as_bytes();
    let row = repo
        .session()
        .query_opt(
            "SELECT count(*) FROM objects WHERE repo_id = $1 AND oid = $2",
            &[&repo.repo_id(), &bytes],
        )?
        .unwrap();
    Ok(row.try_get(0)?)
}

#[test]
fn write_then_read_roundtrip() -> PgResult<()> {
    with_test_repo(|repo| {
        let odb = repo.odb();
        let oid = hash_object(ObjType::Blob, b"hello");
        assert_eq!(oid.to_string(), "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0");

        odb.write(oid, ObjType::Blob, b"hello")?;
        let obj = odb.read(oid)?;
        assert_eq!(obj.obj_type, ObjType::Blob);
        assert_eq!(obj.size, 5);
        assert_eq!(obj.bytes, b"hello");

        assert!(odb.exists(oid)?);
        assert_eq!(odb.read_header(oid)?, (5, ObjType::Blob));

        let (full, obj) = odb.read_prefix("b6fc".into())?;
        assert_eq!(full, oid);
        assert_eq!(obj.bytes, b"hello");
        assert_eq!(odb.exists_prefix("b6fc".into())?, oid);
        Ok(())
    })
}

#[test]
fn write_is_idempotent() -> PgResult<()> {
    with_test_repo(|repo| {
        let odb = repo.odb();
        let oid = hash_object(ObjType::Blob, b"twice");
        odb.write(oid, ObjType::Blob, b"twice")?;
        odb.write(oid, ObjType::Blob, b"twice")?;
        assert_eq!(object_row_count(repo, oid)?, 1);
        Ok(())
    })
}

#[test]
fn read_missing_object() -> PgResult<()> {
    with_test_repo(|repo| {
        let odb = repo.odb();
        let oid = hash_object(ObjType::Blob, b"never written");
        let err = odb.read(oid).unwrap_err().try_into_pg_error()?;
        assert_eq!(err, PgError::ObjectNotFound(oid.into()));
        assert!(!odb.exists(oid)?);
        assert!(odb.read_header(oid).is_err());
        Ok(())
    })
}

#[test]
fn prefix_lookup_disambiguation() -> PgResult<()> {
    // these two blobs share their first two oid bytes (hex prefix 2413)
    with_test_repo(|repo| {
        let odb = repo.odb();
        let a = hash_object(ObjType::Blob, b"collide-355");
        let b = hash_object(ObjType::Blob, b"collide-420");
        assert_eq!(&a.to_string()[..4], "2413");
        assert_eq!(&b.to_string()[..4], "2413");
        odb.write(a, ObjType::Blob, b"collide-355")?;
        odb.write(b, ObjType::Blob, b"collide-420")?;

        let err = odb.exists_prefix("2413".into()).unwrap_err().try_into_pg_error()?;
        assert_eq!(err, PgError::AmbiguousPrefix("2413".into()));
        assert!(odb.read_prefix("2413".into()).is_err());

        // one more hex byte pins it down
        assert_eq!(odb.exists_prefix("24134e".into())?, a);
        let (full, obj) = odb.read_prefix("241303".into())?;
        assert_eq!(full, b);
        assert_eq!(obj.bytes, b"collide-420");

        let missing = odb.exists_prefix("ffff".into()).unwrap_err();
        assert!(missing.is_not_found_err());
        Ok(())
    })
}

#[test]
fn full_length_prefix_degrades_to_exact_lookup() -> PgResult<()> {
    with_test_repo(|repo| {
        let odb = repo.odb();
        let oid = hash_object(ObjType::Blob, b"full prefix");
        odb.write(oid, ObjType::Blob, b"full prefix")?;
        let prefix = PartialOid::from(oid.to_string().as_str());
        assert!(prefix.is_full());
        let (full, obj) = odb.read_prefix(prefix)?;
        assert_eq!(full, oid);
        assert_eq!(obj.bytes, b"full prefix");
        assert_eq!(odb.exists_prefix(prefix)?, oid);
        Ok(())
    })
}

#[test]
fn foreach_yields_all_and_honours_abort() -> PgResult<()> {
    with_test_repo(|repo| {
        let odb = repo.odb();
        let mut oids = vec![];
        for content in [&b"one"[..], &b"two"[..], &b"three"[..]] {
            let oid = hash_object(ObjType::Blob, content);
            odb.write(oid, ObjType::Blob, content)?;
            oids.push(oid);
        }

        let mut seen = vec![];
        odb.foreach(&mut |oid| {
            seen.push(oid);
            Ok(true)
        })?;
        seen.sort();
        oids.sort();
        assert_eq!(seen, oids);

        let mut count = 0;
        odb.foreach(&mut |_| {
            count += 1;
            Ok(false)
        })?;
        assert_eq!(count, 1);
        Ok(())
    })
}

#[test]
fn objects_are_scoped_per_repository() -> PgResult<()> {
    with_test_repo(|repo| {
        let other = PgRepo::create(
            Rc::clone(repo.session()),
            &crate::test_utils::fresh_repo_name(),
        )?;
        let oid = hash_object(ObjType::Blob, b"tenant");
        other.odb().write(oid, ObjType::Blob, b"tenant")?;

        assert!(other.odb().exists(oid)?);
        assert!(!repo.odb().exists(oid)?);
        let mut count = 0;
        repo.odb().foreach(&mut |_| {
            count += 1;
            Ok(true)
        })?;
        assert_eq!(count, 0);
        Ok(())
    })
}

#[test]
fn local_odb_adapts_git2() -> PgResult<()> {
    let (_dir, local) = empty_local_repo()?;
    let (commit, tree, blob) = commit_sample(&local)?;
    let git_odb = local.odb()?;
    let odb = LocalOdb::new(&git_odb);

    let obj = odb.read(Oid::from(blob))?;
    assert_eq!(obj.obj_type, ObjType::Blob);
    assert_eq!(obj.bytes, b"hello world\n");
    assert!(odb.exists(Oid::from(commit))?);
    let (size, obj_type) = odb.read_header(Oid::from(tree))?;
    assert_eq!(obj_type, ObjType::Tree);
    assert!(size > 0);

    let mut seen = 0;
    odb.foreach(&mut |_| {
        seen += 1;
        Ok(true)
    })?;
    assert_eq!(seen, 3);

    let missing = hash_object(ObjType::Blob, b"not in the local odb");
    assert!(odb.read(missing).unwrap_err().is_not_found_err());
    Ok(())
}

fn sample_pack(local: &git2::Repository, commit: git2::Oid) -> PgResult<Vec<u8>> {
    let mut builder = local.packbuilder()?;
    builder.insert_commit(commit)?;
    let mut buf = git2::Buf::new();
    builder.write_buf(&mut buf)?;
    Ok(buf.to_vec())
}

#[test]
fn writepack_ingests_a_pack() -> PgResult<()> {
    with_test_repo(|repo| {
        let (_dir, local) = empty_local_repo()?;
        let (commit, tree, blob) = commit_sample(&local)?;
        let pack = sample_pack(&local, commit)?;

        let odb = repo.odb();
        let git_odb = local.odb()?;
        let progressed = Rc::new(std::cell::Cell::new(false));
        let flag = Rc::clone(&progressed);
        let mut writepack = odb.writepack(
            Some(&git_odb),
            Some(Box::new(move |_progress: git2::Progress<'_>| {
                flag.set(true);
                true
            })),
        )?;

        // stream the pack in two arbitrary slices
        let (head, tail) = pack.split_at(pack.len() / 2);
        writepack.append(head)?;
        writepack.append(tail)?;
        writepack.commit()?;

        for oid in [commit, tree, blob] {
            assert!(odb.exists(Oid::from(oid))?, "pack object {} missing", oid);
        }
        let obj = odb.read(Oid::from(blob))?;
        assert_eq!(obj.obj_type, ObjType::Blob);
        assert_eq!(obj.bytes, b"hello world\n");
        assert!(progressed.get());
        Ok(())
    })
}

#[test]
fn writepack_cleans_up_its_staging_directory() -> PgResult<()> {
    with_test_repo(|repo| {
        let (_dir, local) = empty_local_repo()?;
        let (commit, ..) = commit_sample(&local)?;
        let pack = sample_pack(&local, commit)?;

        let odb = repo.odb();
        let mut writepack = odb.writepack(None, None)?;
        writepack.append(&pack)?;
        writepack.commit()?;
        let staging = writepack.staging_path().to_path_buf();
        assert!(staging.exists());
        drop(writepack);
        assert!(!staging.exists());
        Ok(())
    })
}

#[test]
fn writepack_cleans_up_without_commit() -> PgResult<()> {
    with_test_repo(|repo| {
        let odb = repo.odb();
        let writepack = odb.writepack(None, None)?;
        let staging = writepack.staging_path().to_path_buf();
        assert!(staging.exists());
        drop(writepack);
        assert!(!staging.exists());
        Ok(())
    })
}
