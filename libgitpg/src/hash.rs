use crate::error::{PgGenericError, PgResult};
use crate::obj::ObjType;
use sha1::{Digest, Sha1};
use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

pub const OID_SIZE: usize = 20;
pub const OID_HEXSZ: usize = 2 * OID_SIZE;

#[derive(PartialEq, Eq, Hash, Clone, Ord, PartialOrd, Copy)]
#[repr(transparent)]
pub struct SHA1Hash([u8; OID_SIZE]);

impl SHA1Hash {
    /// hash of an empty blob
    // e69de29bb2d1d6434b8b29ae775ad8c2e48c5391
    pub const EMPTY_BLOB: Self = Self([
        0xe6, 0x9d, 0xe2, 0x9b, 0xb2, 0xd1, 0xd6, 0x43, 0x4b, 0x8b, 0x29, 0xae, 0x77, 0x5a, 0xd8,
        0xc2, 0xe4, 0x8c, 0x53, 0x91,
    ]);
    /// hash of an empty tree
    // 4b825dc642cb6eb9a060e54bf8d69288fbee4904
    pub const EMPTY_TREE: Self = Self([
        0x4b, 0x82, 0x5d, 0xc6, 0x42, 0xcb, 0x6e, 0xb9, 0xa0, 0x60, 0xe5, 0x4b, 0xf8, 0xd6, 0x92,
        0x88, 0xfb, 0xee, 0x49, 0x04,
    ]);
    /// the all-zero value git uses to mean "no object"
    pub const ZERO: Self = Self([0; OID_SIZE]);

    #[inline]
    pub fn new(bytes: [u8; OID_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> PgResult<Self> {
        ensure!(
            bytes.len() == OID_SIZE,
            "oid has wrong length {} (expected {})",
            bytes.len(),
            OID_SIZE
        );
        let mut buf = [0; OID_SIZE];
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; OID_SIZE] {
        &self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for SHA1Hash {
    type Err = PgGenericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ensure!(
            s.len() == OID_HEXSZ,
            "invalid oid `{}`: expected exactly {} hex characters",
            s,
            OID_HEXSZ
        );
        let mut buf = [0; OID_SIZE];
        hex::decode_to_slice(s, &mut buf)
            .map_err(|err| anyhow!("invalid oid `{}`: {}", s, err))?;
        Ok(Self(buf))
    }
}

impl AsRef<[u8]> for SHA1Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<git2::Oid> for SHA1Hash {
    fn from(oid: git2::Oid) -> Self {
        // libgit2 oids are always 20 bytes in sha1 mode
        Self::from_slice(oid.as_bytes()).unwrap()
    }
}

impl From<SHA1Hash> for git2::Oid {
    fn from(oid: SHA1Hash) -> Self {
        git2::Oid::from_bytes(oid.as_bytes()).unwrap()
    }
}

impl Debug for SHA1Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl Display for SHA1Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let hex = hex::encode(self.0);
        if f.alternate() { write!(f, "{}", &hex[..7]) } else { write!(f, "{}", hex) }
    }
}

/// Digest of `<type-name> <size>\0<content>`, the identity of every stored object.
pub fn hash_object(obj_type: ObjType, content: &[u8]) -> SHA1Hash {
    let mut hasher = Sha1::new();
    hasher.update(format!("{} {}\0", obj_type, content.len()).as_bytes());
    hasher.update(content);
    SHA1Hash::new(hasher.finalize().into())
}

#[cfg(test)]
impl<'a> From<&'a str> for SHA1Hash {
    fn from(s: &'a str) -> Self {
        Self::from_str(s).unwrap()
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for SHA1Hash {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        let mut bytes = [0; OID_SIZE];
        for byte in &mut bytes {
            *byte = quickcheck::Arbitrary::arbitrary(g);
        }
        Self(bytes)
    }
}
