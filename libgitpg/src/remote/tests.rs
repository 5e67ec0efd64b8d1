use super::*;

#[test]
fn parse_push_spec() -> PgResult<()> {
    let spec = "refs/heads/main:refs/heads/main".parse::<PushSpec>()?;
    assert_eq!(spec.src.as_deref(), Some("refs/heads/main"));
    assert_eq!(spec.dst, "refs/heads/main");
    assert!(!spec.force);
    Ok(())
}

#[test]
fn parse_forced_push_spec() -> PgResult<()> {
    let spec = "+refs/heads/dev:refs/heads/main".parse::<PushSpec>()?;
    assert_eq!(spec.src.as_deref(), Some("refs/heads/dev"));
    assert_eq!(spec.dst, "refs/heads/main");
    assert!(spec.force);
    Ok(())
}

#[test]
fn parse_delete_push_spec() -> PgResult<()> {
    let spec = ":refs/heads/gone".parse::<PushSpec>()?;
    assert_eq!(spec.src, None);
    assert_eq!(spec.dst, "refs/heads/gone");
    Ok(())
}

#[test]
fn spec_without_colon_is_a_destination() -> PgResult<()> {
    let spec = "refs/heads/main".parse::<PushSpec>()?;
    assert_eq!(spec.src, None);
    assert_eq!(spec.dst, "refs/heads/main");
    Ok(())
}

#[test]
fn reject_empty_destination() {
    assert!(":".parse::<PushSpec>().is_err());
    assert!("refs/heads/main:".parse::<PushSpec>().is_err());
}

#[test]
fn push_spec_display_roundtrip() -> PgResult<()> {
    for raw in ["+refs/heads/dev:refs/heads/main", ":refs/heads/gone"] {
        assert_eq!(raw.parse::<PushSpec>()?.to_string(), raw);
    }
    Ok(())
}
