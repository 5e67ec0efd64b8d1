mod refdb;
mod reflog;

pub use refdb::*;

use crate::obj::Oid;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt::{self, Display, Formatter};

lazy_static! {
    /// defines what is an invalid reference name (anything else is valid)
    // a reference name is invalid if any of the following conditions are true
    // - any path component begins with `.` (i.e. `^.`, or `/.`)
    // - contains `..`
    // - contains any of the following `*` `:` `?` `[` `\` `^` `~` <space> <tab>
    // - ends with `/` or `.lock`
    // - contains `@{`
    static ref INVALID_REF_REGEX: Regex = Regex::new(r#"^\.|/\.|\.\.|\*|:|\?|\[|\\|\^|~| |\t|/$|\.lock$|@\{"#).unwrap();
}

pub fn is_valid_name(s: &str) -> bool {
    !s.is_empty() && !INVALID_REF_REGEX.is_match(s)
}

/// what a reference points at
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum RefTarget {
    /// refers directly to an object
    Direct(Oid),
    /// contains the name of another reference
    Symbolic(String),
}

impl RefTarget {
    pub fn is_direct(&self) -> bool {
        matches!(self, Self::Direct(..))
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, Self::Symbolic(..))
    }

    pub fn oid(&self) -> Option<Oid> {
        match self {
            Self::Direct(oid) => Some(*oid),
            Self::Symbolic(..) => None,
        }
    }

    pub fn symbolic(&self) -> Option<&str> {
        match self {
            Self::Direct(..) => None,
            Self::Symbolic(target) => Some(target),
        }
    }
}

impl From<Oid> for RefTarget {
    fn from(oid: Oid) -> Self {
        Self::Direct(oid)
    }
}

impl Display for RefTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RefTarget::Direct(oid) => write!(f, "{}", oid),
            RefTarget::Symbolic(target) => write!(f, "{}", target),
        }
    }
}

/// a named reference row
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PgRef {
    pub name: String,
    pub target: RefTarget,
}

impl PgRef {
    pub fn direct(name: impl Into<String>, oid: Oid) -> Self {
        Self { name: name.into(), target: RefTarget::Direct(oid) }
    }

    pub fn symbolic(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self { name: name.into(), target: RefTarget::Symbolic(target.into()) }
    }
}

impl Display for PgRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.name, self.target)
    }
}
