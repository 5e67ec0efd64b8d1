use super::*;

#[test]
fn parse_timezone_offset() -> PgResult<()> {
    assert_eq!(TimeZoneOffset::from_str("+0200")?, TimeZoneOffset::new(120));
    assert_eq!(TimeZoneOffset::from_str("+1300")?, TimeZoneOffset::new(780));
    assert_eq!(TimeZoneOffset::from_str("-0830")?, TimeZoneOffset::new(-510));
    assert!(TimeZoneOffset::from_str("0200").is_err());
    assert!(TimeZoneOffset::from_str("+02").is_err());
    Ok(())
}

#[test]
fn format_timezone_offset() {
    assert_eq!(TimeZoneOffset::new(780).to_string(), "+1300");
    assert_eq!(TimeZoneOffset::new(-510).to_string(), "-0830");
    assert_eq!(TimeZoneOffset::new(0).to_string(), "+0000");
}

#[test]
fn parse_signature() -> PgResult<()> {
    let sig = "Andy Yu <andyyu2004@gmail.com> 1616061862 +1300".parse::<Signature>()?;
    assert_eq!(sig.name, "Andy Yu");
    assert_eq!(sig.email, "andyyu2004@gmail.com");
    assert_eq!(
        sig.time,
        Time { time: EpochTime::new(1616061862), offset: TimeZoneOffset::new(780) }
    );
    assert_eq!(sig.committer(), "Andy Yu <andyyu2004@gmail.com>");
    Ok(())
}

#[test]
fn signature_roundtrip() -> PgResult<()> {
    let sig = Signature {
        name: "A Committer".to_owned(),
        email: "committer@example.com".to_owned(),
        time: Time { time: EpochTime::new(12345678), offset: TimeZoneOffset::new(-200) },
    };
    assert_eq!(sig.to_string().parse::<Signature>()?, sig);
    Ok(())
}
