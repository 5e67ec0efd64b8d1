use crate::error::{PgGenericError, PgResult};
use crate::hash::{OID_HEXSZ, OID_SIZE, SHA1Hash};
use num_enum::TryFromPrimitive;
use std::fmt::{self, Display, Formatter};
use std::io::Write;
use std::str::FromStr;

pub type Oid = SHA1Hash;

/// ways an object can be identified
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum PgId {
    Full(Oid),
    Partial(PartialOid),
}

impl From<Oid> for PgId {
    fn from(oid: Oid) -> Self {
        Self::Full(oid)
    }
}

impl From<PartialOid> for PgId {
    fn from(partial: PartialOid) -> Self {
        Self::Partial(partial)
    }
}

impl Display for PgId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PgId::Full(oid) => write!(f, "{}", oid),
            PgId::Partial(partial) => write!(f, "{}", partial),
        }
    }
}

impl FromStr for PgId {
    type Err = PgGenericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == OID_HEXSZ {
            Ok(Self::Full(Oid::from_str(s)?))
        } else {
            Ok(Self::Partial(PartialOid::from_str(s)?))
        }
    }
}

// same shape as `Oid` but with fewer invariants: stored as up to 40 hex
// characters so odd-length input doesn't force us to deal in half bytes
#[derive(PartialEq, Eq, Debug, Hash, Clone, Ord, PartialOrd, Copy)]
pub struct PartialOid {
    // guaranteed to be ascii hex, zero-extended past `len`
    bytes: [u8; OID_HEXSZ],
    len: usize,
}

impl PartialOid {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_full(&self) -> bool {
        self.len == OID_HEXSZ
    }

    /// converts into an `Oid` by extending the missing bits with zeroes
    pub fn into_oid(&self) -> PgResult<Oid> {
        // SAFETY the buffer is ascii hex by construction
        unsafe { std::str::from_utf8_unchecked(&self.bytes) }.parse()
    }

    /// number of whole bytes covered by this prefix; an odd hex length rounds
    /// up, so the last byte carries a surplus zero nibble
    pub fn byte_len(&self) -> usize {
        (self.len + 1) / 2
    }

    pub fn prefix_bytes(&self) -> PgResult<Vec<u8>> {
        Ok(self.into_oid()?.as_bytes()[..self.byte_len()].to_vec())
    }
}

impl Oid {
    pub fn has_prefix(&self, prefix: PartialOid) -> PgResult<bool> {
        let prefix_bytes = prefix.into_oid()?;
        Ok(prefix_bytes.as_bytes()[..prefix.byte_len()] == self.as_bytes()[..prefix.byte_len()])
    }
}

impl FromStr for PartialOid {
    type Err = PgGenericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ensure!(s.len() <= OID_HEXSZ, "oid prefix `{}` is too long", s);
        ensure!(s.len() >= 4, "oid prefix must be at least 4 hex characters");
        ensure!(
            s.chars().all(|c| c.is_ascii_hexdigit()),
            "oid prefix `{}` contains non-hex characters",
            s
        );
        let mut bytes = [b'0'; OID_HEXSZ];
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        Ok(Self { bytes, len: s.len() })
    }
}

impl Display for PartialOid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // SAFETY refer to the invariant on `bytes`
        write!(f, "{}", unsafe { std::str::from_utf8_unchecked(&self.bytes[..self.len]) })
    }
}

#[cfg(test)]
impl<'a> From<&'a str> for PartialOid {
    fn from(s: &'a str) -> Self {
        Self::from_str(s).unwrap()
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, TryFromPrimitive)]
#[repr(i16)]
pub enum ObjType {
    Commit = 1,
    Tree   = 2,
    Blob   = 3,
    Tag    = 4,
}

impl ObjType {
    pub fn as_i16(self) -> i16 {
        self as i16
    }

    pub fn from_raw(code: i16) -> PgResult<Self> {
        Self::try_from(code).map_err(|_| anyhow!("unknown object type code `{}`", code))
    }

    pub fn from_git2(kind: git2::ObjectType) -> PgResult<Self> {
        match kind {
            git2::ObjectType::Commit => Ok(Self::Commit),
            git2::ObjectType::Tree => Ok(Self::Tree),
            git2::ObjectType::Blob => Ok(Self::Blob),
            git2::ObjectType::Tag => Ok(Self::Tag),
            _ => bail!("unstorable object type `{}`", kind),
        }
    }

    pub fn to_git2(self) -> git2::ObjectType {
        match self {
            Self::Commit => git2::ObjectType::Commit,
            Self::Tree => git2::ObjectType::Tree,
            Self::Blob => git2::ObjectType::Blob,
            Self::Tag => git2::ObjectType::Tag,
        }
    }
}

impl Display for ObjType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjType::Commit => "commit",
            ObjType::Tree => "tree",
            ObjType::Blob => "blob",
            ObjType::Tag => "tag",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ObjType {
    type Err = PgGenericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commit" => Ok(ObjType::Commit),
            "tree" => Ok(ObjType::Tree),
            "blob" => Ok(ObjType::Blob),
            "tag" => Ok(ObjType::Tag),
            _ => bail!("unknown object type `{}`", s),
        }
    }
}

/// an object's stored representation: declared type and size plus the raw bytes
#[derive(PartialEq, Debug)]
pub struct RawObject {
    pub obj_type: ObjType,
    pub size: usize,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, TryFromPrimitive)]
#[repr(u32)]
pub enum FileMode {
    REG     = 0o100644,
    EXEC    = 0o100755,
    LINK    = 0o120000,
    TREE    = 0o40000,
    GITLINK = 0o160000,
}

impl FileMode {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn is_tree(self) -> bool {
        matches!(self, FileMode::TREE)
    }
}

impl Display for FileMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // trees are serialized without the leading zero
        write!(f, "{:o}", self.as_u32())
    }
}

impl FromStr for FileMode {
    type Err = PgGenericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = u32::from_str_radix(s, 8)
            .map_err(|_| anyhow!("malformed tree entry: non-octal mode `{}`", s))?;
        Self::try_from(mode).map_err(|_| anyhow!("unknown file mode `{:o}`", mode))
    }
}

#[derive(PartialEq, Debug, Clone, Eq)]
pub struct TreeEntry {
    pub mode: FileMode,
    pub name: String,
    pub oid: Oid,
}

impl TreeEntry {
    pub fn serialize(&self, writer: &mut dyn Write) -> PgResult<()> {
        write!(writer, "{} {}\0", self.mode, self.name)?;
        writer.write_all(self.oid.as_bytes())?;
        Ok(())
    }
}

/// Parses a tree object body: a run of `<octal-mode> <name>\0<20-byte-oid>`
/// entries with no count; parsing ends at the end of the buffer and a
/// truncated trailer is a corruption error.
pub fn parse_tree(bytes: &[u8]) -> PgResult<Vec<TreeEntry>> {
    let mut entries = vec![];
    let mut pos = 0;
    while pos < bytes.len() {
        let space = bytes[pos..]
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| anyhow!("malformed tree entry: no space after mode"))?;
        let mode = std::str::from_utf8(&bytes[pos..pos + space])
            .map_err(|_| anyhow!("malformed tree entry: non-ascii mode"))?
            .parse::<FileMode>()?;
        pos += space + 1;

        let nul = bytes[pos..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| anyhow!("malformed tree entry: no nul after name"))?;
        let name = std::str::from_utf8(&bytes[pos..pos + nul])
            .map_err(|err| anyhow!("malformed tree entry: invalid name: {}", err))?
            .to_owned();
        pos += nul + 1;

        ensure!(pos + OID_SIZE <= bytes.len(), "malformed tree entry: truncated oid");
        let oid = Oid::from_slice(&bytes[pos..pos + OID_SIZE])?;
        pos += OID_SIZE;

        entries.push(TreeEntry { mode, name, oid });
    }
    Ok(entries)
}
