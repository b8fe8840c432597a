//! Object identifier (SHA-1 digest)
//!
//! Object IDs are 20-byte SHA-1 digests, shown to users as 40 lowercase hex
//! characters. The all-zero value is reserved as a sentinel for "not computed
//! yet" (dirty trees) or "absent".
//!
//! ## Storage
//!
//! Objects are stored in `objects/<first-2-chars>/<remaining-38-chars>`

use crate::artifacts::objects::{OBJECT_ID_LENGTH, OBJECT_ID_SIZE};
use crate::errors::{Error, Result};
use sha1::{Digest, Sha1};
use std::io;
use std::path::PathBuf;

/// SHA-1 object identifier
///
/// Ordering and equality are byte-wise, which coincides with the ordering of
/// the hex representation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ObjectId([u8; OBJECT_ID_SIZE]);

impl ObjectId {
    /// The zero hash
    pub const ZERO: ObjectId = ObjectId([0; OBJECT_ID_SIZE]);

    pub fn from_bytes(bytes: [u8; OBJECT_ID_SIZE]) -> Self {
        ObjectId(bytes)
    }

    /// Digest arbitrary bytes
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(data);
        ObjectId(hasher.finalize().into())
    }

    /// Parse and validate an object ID from its 40-character hex form
    pub fn try_parse(id: impl AsRef<str>) -> Result<Self> {
        let id = id.as_ref();
        if id.len() != OBJECT_ID_LENGTH {
            return Err(Error::InvalidHashString(id.to_string()));
        }

        let mut bytes = [0u8; OBJECT_ID_SIZE];
        hex::decode_to_slice(id, &mut bytes)
            .map_err(|_| Error::InvalidHashString(id.to_string()))?;

        Ok(ObjectId(bytes))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; OBJECT_ID_SIZE]
    }

    pub fn as_bytes(&self) -> &[u8; OBJECT_ID_SIZE] {
        &self.0
    }

    /// Write the raw 20 bytes, as embedded in trees and index entries
    pub fn write_raw_to<W: io::Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.0)
    }

    /// Read the raw 20 bytes, as embedded in trees and index entries
    pub fn read_raw_from<R: io::Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let mut bytes = [0u8; OBJECT_ID_SIZE];
        reader.read_exact(&mut bytes)?;
        Ok(ObjectId(bytes))
    }

    /// Fan-out path below the objects directory
    ///
    /// For example, `abc123...` becomes `ab/c123...`
    pub fn to_path(&self) -> PathBuf {
        let hex = self.to_hex();
        let (dir, file) = hex.split_at(2);
        PathBuf::from(dir).join(file)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 7 characters of the hash
    pub fn to_short_oid(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(7);
        hex
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl std::str::FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::try_parse(s)
    }
}
