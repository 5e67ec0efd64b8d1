use crate::error::{PgGenericError, PgResult};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

#[derive(PartialEq, Clone, Debug, Hash, Ord, PartialOrd, Eq, Copy)]
pub struct EpochTime(i64);

impl EpochTime {
    pub fn new(seconds: i64) -> Self {
        Self(seconds)
    }

    pub fn seconds(self) -> i64 {
        self.0
    }
}

/// timezone offset in minutes
#[derive(PartialEq, Clone, Debug, Hash, Ord, PartialOrd, Eq, Copy)]
pub struct TimeZoneOffset(i32);

impl TimeZoneOffset {
    pub fn new(offset: i32) -> Self {
        Self(offset)
    }
}

#[derive(PartialEq, Clone, Debug, PartialOrd, Eq, Ord, Hash)]
pub struct Time {
    pub time: EpochTime,
    pub offset: TimeZoneOffset,
}

impl Time {
    pub fn now() -> Self {
        // fixed time under test so runs are deterministic
        if cfg!(test) {
            Self { time: EpochTime(0), offset: TimeZoneOffset(0) }
        } else {
            let now = chrono::offset::Local::now();
            let offset = TimeZoneOffset(now.offset().local_minus_utc() / 60);
            let time = EpochTime(now.timestamp());
            Self { time, offset }
        }
    }
}

#[derive(PartialEq, Clone, Debug)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub time: Time,
}

impl Signature {
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self { name: name.into(), email: email.into(), time: Time::now() }
    }

    /// the `Name <email>` form the reflog's committer column stores
    pub fn committer(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

impl TryFrom<&git2::Signature<'_>> for Signature {
    type Error = PgGenericError;

    fn try_from(sig: &git2::Signature<'_>) -> PgResult<Self> {
        let name = sig.name().ok_or_else(|| anyhow!("signature name is not utf-8"))?;
        let email = sig.email().ok_or_else(|| anyhow!("signature email is not utf-8"))?;
        let when = sig.when();
        Ok(Self {
            name: name.to_owned(),
            email: email.to_owned(),
            time: Time {
                time: EpochTime(when.seconds()),
                offset: TimeZoneOffset(when.offset_minutes()),
            },
        })
    }
}

impl FromStr for TimeZoneOffset {
    type Err = PgGenericError;

    // format: (+|-)0200
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ensure!(s.len() == 5 && s.is_ascii(), "invalid timezone offset `{}`", s);
        let sign = match &s[0..1] {
            "+" => 1,
            "-" => -1,
            _ => bail!("invalid timezone offset `{}`", s),
        };
        let hours: i32 = s[1..3].parse()?;
        let minutes: i32 = s[3..5].parse()?;
        Ok(Self(sign * (minutes + hours * 60)))
    }
}

impl FromStr for EpochTime {
    type Err = PgGenericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl FromStr for Time {
    type Err = PgGenericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (time, offset) =
            s.split_once(' ').ok_or_else(|| anyhow!("invalid timestamp `{}`", s))?;
        Ok(Self { time: time.parse()?, offset: offset.parse()? })
    }
}

impl FromStr for Signature {
    type Err = PgGenericError;

    // Andy Yu <andyyu2004@gmail.com> 1616061862 +1300
    fn from_str(s: &str) -> PgResult<Self> {
        let email_start = s.find('<').ok_or_else(|| anyhow!("invalid signature `{}`", s))?;
        let email_end = s.find('>').ok_or_else(|| anyhow!("invalid signature `{}`", s))?;
        ensure!(email_start > 0 && email_end > email_start, "invalid signature `{}`", s);

        let name = s[..email_start - 1].to_owned();
        let email = s[email_start + 1..email_end].to_owned();
        let time = s[email_end + 1..].trim_start().parse()?;
        Ok(Self { name, email, time })
    }
}

impl Display for EpochTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for TimeZoneOffset {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let sign = if self.0 >= 0 { '+' } else { '-' };
        let offset = self.0.abs();
        write!(f, "{}{:02}{:02}", sign, offset / 60, offset % 60)
    }
}

impl Display for Time {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.time, self.offset)
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}> {}", self.name, self.email, self.time)
    }
}

#[cfg(test)]
mod tests;
