use crate::obj::{PartialOid, PgId};
use std::fmt::{self, Display, Formatter};

pub type PgResult<T> = Result<T, PgGenericError>;
pub type PgGenericError = anyhow::Error;

// most failures just travel as anyhow errors with context; this enum carries
// the outcomes callers are expected to branch or retry on
#[derive(Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub enum PgError {
    ObjectNotFound(PgId),
    AmbiguousPrefix(PartialOid),
    RefNotFound(String),
    RefAlreadyExists(String),
    RefValueChanged(String),
    CorruptRef(String),
}

pub trait PgErrorExt {
    fn try_into_pg_error(self) -> PgResult<PgError>;
    fn try_into_ref_not_found(self) -> PgResult<String>;
}

impl PgErrorExt for PgGenericError {
    /// tries to downcast into the matchable error, handing the original back on failure
    fn try_into_pg_error(self) -> PgResult<PgError> {
        self.downcast::<PgError>()
    }

    fn try_into_ref_not_found(self) -> PgResult<String> {
        match self.try_into_pg_error()? {
            PgError::RefNotFound(name) => Ok(name),
            err => Err(anyhow!(err)),
        }
    }
}

pub trait PgResultExt {
    fn is_not_found_err(&self) -> bool;
    fn is_fatal(&self) -> bool;
}

macro_rules! error_ext_is_method {
    ($method:ident) => {
        fn $method(&self) -> bool {
            match self {
                Ok(..) => false,
                Err(err) => err.$method(),
            }
        }
    };
}

impl<T> PgResultExt for PgResult<T> {
    error_ext_is_method!(is_not_found_err);

    error_ext_is_method!(is_fatal);
}

impl PgResultExt for PgGenericError {
    fn is_not_found_err(&self) -> bool {
        match self.downcast_ref::<PgError>() {
            Some(err) => {
                matches!(err, PgError::ObjectNotFound(..) | PgError::RefNotFound(..))
            }
            None => false,
        }
    }

    fn is_fatal(&self) -> bool {
        match self.downcast_ref::<PgError>() {
            Some(err) => !matches!(
                err,
                PgError::ObjectNotFound(..)
                    | PgError::RefNotFound(..)
                    | PgError::AmbiguousPrefix(..)
            ),
            None => true,
        }
    }
}

impl Display for PgError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PgError::ObjectNotFound(id) => write!(f, "object `{}` not found", id),
            PgError::AmbiguousPrefix(prefix) => {
                write!(f, "prefix oid `{}` is ambiguous", prefix)
            }
            PgError::RefNotFound(name) => write!(f, "reference `{}` not found", name),
            PgError::RefAlreadyExists(name) => {
                write!(f, "reference `{}` already exists", name)
            }
            PgError::RefValueChanged(name) => {
                write!(f, "reference `{}` value has changed", name)
            }
            PgError::CorruptRef(name) => write!(
                f,
                "reference `{}` is corrupt: expected exactly one of oid and symbolic target",
                name
            ),
        }
    }
}

#[cfg(test)]
mod tests;
