use super::*;
use crate::hash::SHA1Hash;
use crate::obj::PartialOid;

#[test]
fn classify_error_kinds() {
    let err = anyhow!(PgError::ObjectNotFound(SHA1Hash::EMPTY_BLOB.into()));
    assert!(err.is_not_found_err());
    assert!(!err.is_fatal());

    let err = anyhow!(PgError::AmbiguousPrefix(PartialOid::from("2413")));
    assert!(!err.is_not_found_err());
    assert!(!err.is_fatal());

    let err = anyhow!(PgError::RefValueChanged("refs/heads/main".to_owned()));
    assert!(err.is_fatal());

    let err = anyhow!("some backend failure");
    assert!(err.is_fatal());
    assert!(!err.is_not_found_err());
    assert!(err.try_into_pg_error().is_err());
}

#[test]
fn downcast_helpers() {
    let err = anyhow!(PgError::RefNotFound("HEAD".to_owned()));
    assert_eq!(err.try_into_ref_not_found().unwrap(), "HEAD");

    let err = anyhow!(PgError::RefAlreadyExists("refs/heads/main".to_owned()));
    assert_eq!(
        err.try_into_pg_error().unwrap(),
        PgError::RefAlreadyExists("refs/heads/main".to_owned())
    );
}
