use crate::error::{PgGenericError, PgResult};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// One `push` directive from the helper dialogue: `[+]<src>:<dst>`, where an
/// empty source requests deletion of the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSpec {
    pub src: Option<String>,
    pub dst: String,
    pub force: bool,
}

impl FromStr for PushSpec {
    type Err = PgGenericError;

    fn from_str(s: &str) -> PgResult<Self> {
        let (s, force) = match s.strip_prefix('+') {
            Some(stripped) => (stripped, true),
            None => (s, false),
        };
        let (src, dst) = match s.split_once(':') {
            Some((src, dst)) => (src, dst),
            // no colon: treat the whole spec as the destination
            None => ("", s),
        };
        ensure!(!dst.is_empty(), "push spec `{}` has an empty destination", s);
        let src = if src.is_empty() { None } else { Some(src.to_owned()) };
        Ok(Self { src, dst: dst.to_owned(), force })
    }
}

impl Display for PushSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.force {
            write!(f, "+")?;
        }
        write!(f, "{}:{}", self.src.as_deref().unwrap_or(""), self.dst)
    }
}

#[cfg(test)]
mod tests;
