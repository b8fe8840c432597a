//! Canonical object form and the closed set of object kinds
//!
//! [`GitObject`] is the kind-agnostic payload: a kind tag plus content bytes.
//! Its hash and on-disk encoding are pure functions of those two fields.
//! [`ObjectBox`] is the decoded, kind-specific view of a `GitObject`.

use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use crate::errors::{Error, Result};
use bytes::Bytes;
use derive_new::new;
use sha1::{Digest, Sha1};
use std::io::{Read, Write};

/// Objects that can compose their canonical content bytes
pub trait Packable {
    fn serialize(&self) -> Bytes;
}

/// Objects that can be rebuilt from their canonical content bytes
pub trait Unpackable {
    fn deserialize(content: Bytes) -> Result<Self>
    where
        Self: Sized;
}

pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    fn to_git_object(&self) -> GitObject {
        GitObject::new(self.object_type(), self.serialize())
    }

    fn object_id(&self) -> ObjectId {
        self.to_git_object().hash()
    }
}

/// `SHA1("<kind> <len>\0" + content)`
pub fn hash_object(kind: ObjectType, content: &[u8]) -> ObjectId {
    let mut hasher = Sha1::new();
    hasher.update(format!("{} {}\0", kind.as_str(), content.len()).as_bytes());
    hasher.update(content);

    ObjectId::from_bytes(hasher.finalize().into())
}

/// Kind-tagged raw object
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct GitObject {
    kind: ObjectType,
    content: Bytes,
}

impl GitObject {
    pub fn kind(&self) -> ObjectType {
        self.kind
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn into_content(self) -> Bytes {
        self.content
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }

    pub fn hash(&self) -> ObjectId {
        hash_object(self.kind, &self.content)
    }

    /// Header followed by content, i.e. the bytes that get compressed
    pub fn to_raw(&self) -> Bytes {
        let header = format!("{} {}\0", self.kind.as_str(), self.content.len());

        let mut raw = Vec::with_capacity(header.len() + self.content.len());
        raw.extend_from_slice(header.as_bytes());
        raw.extend_from_slice(&self.content);

        Bytes::from(raw)
    }

    /// Compress the canonical form into `sink`
    pub fn serialize<W: Write>(&self, sink: W) -> Result<()> {
        let mut encoder = flate2::write::ZlibEncoder::new(sink, flate2::Compression::default());
        encoder.write_all(&self.to_raw())?;
        encoder.finish()?;

        Ok(())
    }

    /// Inflate and parse an object, verifying it against `expected` when given
    pub fn deserialize<R: Read>(source: R, expected: Option<&ObjectId>) -> Result<Self> {
        let raw = Self::inflate(source)?;
        let object = Self::parse_raw(raw)?;

        if let Some(expected) = expected {
            let actual = object.hash();
            if &actual != expected {
                return Err(Error::corrupted_object(format!(
                    "hash mismatch: expected {expected}, computed {actual}"
                )));
            }
        }

        Ok(object)
    }

    pub fn inflate<R: Read>(source: R) -> Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(source);
        let mut raw = Vec::new();
        decoder.read_to_end(&mut raw).map_err(|err| match err.kind() {
            std::io::ErrorKind::InvalidInput | std::io::ErrorKind::InvalidData => {
                Error::corrupted_object(format!("invalid zlib stream: {err}"))
            }
            _ => Error::Io(err),
        })?;

        Ok(Bytes::from(raw))
    }

    /// Parse `<kind> <len>\0<content>` from already inflated bytes
    pub fn parse_raw(raw: Bytes) -> Result<Self> {
        let space = raw
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| Error::corrupted_object("missing object kind"))?;
        let nul = raw[space..]
            .iter()
            .position(|&b| b == 0)
            .map(|offset| space + offset)
            .ok_or_else(|| Error::corrupted_object("unterminated object header"))?;

        let kind = std::str::from_utf8(&raw[..space])
            .map_err(|_| Error::corrupted_object("object kind is not valid UTF-8"))?;
        let kind = ObjectType::try_from(kind)?;

        let declared = std::str::from_utf8(&raw[space + 1..nul])
            .ok()
            .and_then(|len| len.parse::<usize>().ok())
            .ok_or_else(|| Error::corrupted_object("invalid object length"))?;

        let content = raw.slice(nul + 1..);
        if content.len() != declared {
            return Err(Error::corrupted_object(format!(
                "declared length {declared} but found {} bytes",
                content.len()
            )));
        }

        Ok(GitObject::new(kind, content))
    }
}

/// Decoded object, one variant per kind
#[derive(Debug, Clone)]
pub enum ObjectBox {
    Blob(Box<Blob>),
    Tree(Box<Tree>),
    Commit(Box<Commit>),
    /// Tags are not parsed further
    Tag(Box<GitObject>),
}

impl ObjectBox {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectBox::Blob(_) => ObjectType::Blob,
            ObjectBox::Tree(_) => ObjectType::Tree,
            ObjectBox::Commit(_) => ObjectType::Commit,
            ObjectBox::Tag(_) => ObjectType::Tag,
        }
    }

    pub fn to_git_object(&self) -> GitObject {
        match self {
            ObjectBox::Blob(blob) => blob.to_git_object(),
            ObjectBox::Tree(tree) => tree.to_git_object(),
            ObjectBox::Commit(commit) => commit.to_git_object(),
            ObjectBox::Tag(tag) => tag.as_ref().clone(),
        }
    }
}

impl TryFrom<GitObject> for ObjectBox {
    type Error = Error;

    fn try_from(object: GitObject) -> Result<Self> {
        let kind = object.kind();
        let content = object.into_content();

        Ok(match kind {
            ObjectType::Blob => ObjectBox::Blob(Box::new(Blob::deserialize(content)?)),
            ObjectType::Tree => ObjectBox::Tree(Box::new(Tree::deserialize(content)?)),
            ObjectType::Commit => ObjectBox::Commit(Box::new(Commit::deserialize(content)?)),
            ObjectType::Tag => ObjectBox::Tag(Box::new(GitObject::new(kind, content))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    fn compressed(object: &GitObject) -> Vec<u8> {
        let mut sink = Vec::new();
        object.serialize(&mut sink).unwrap();
        sink
    }

    #[test]
    fn well_known_blob_hash() {
        let oid = hash_object(ObjectType::Blob, b"test content\n");

        assert_eq!(oid.to_string(), "d670460b4b4aece5915caf5c68d12f560a9fe3e4");
    }

    #[test]
    fn empty_tree_hash() {
        let oid = hash_object(ObjectType::Tree, b"");

        assert_eq!(oid.to_string(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
    }

    #[rstest]
    #[case(b"blob 3\0abcd".as_slice())]
    #[case(b"blob 5\0abcd".as_slice())]
    #[case(b"blob x\0abcd".as_slice())]
    #[case(b"gadget 4\0abcd".as_slice())]
    #[case(b"blob 4abcd".as_slice())]
    fn malformed_raw_objects_are_rejected(#[case] raw: &[u8]) {
        let result = GitObject::parse_raw(Bytes::copy_from_slice(raw));

        assert!(matches!(result, Err(Error::CorruptedObject(_))));
    }

    #[test]
    fn hash_mismatch_is_reported() {
        let object = GitObject::new(ObjectType::Blob, Bytes::from_static(b"hello"));
        let other = hash_object(ObjectType::Blob, b"world");

        let result = GitObject::deserialize(compressed(&object).as_slice(), Some(&other));

        assert!(matches!(result, Err(Error::CorruptedObject(_))));
    }

    #[test]
    fn garbage_is_not_a_zlib_stream() {
        let result = GitObject::deserialize(&b"definitely not zlib"[..], None);

        assert!(matches!(result, Err(Error::CorruptedObject(_))));
    }

    proptest! {
        #[test]
        fn hashing_is_deterministic(content in proptest::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(
                hash_object(ObjectType::Blob, &content),
                hash_object(ObjectType::Blob, &content)
            );
        }

        #[test]
        fn serialized_objects_read_back(
            content in proptest::collection::vec(any::<u8>(), 0..512),
            kind in prop_oneof![
                Just(ObjectType::Blob),
                Just(ObjectType::Tree),
                Just(ObjectType::Commit),
                Just(ObjectType::Tag),
            ],
        ) {
            let object = GitObject::new(kind, Bytes::from(content));
            let expected = object.hash();

            let decoded = GitObject::deserialize(compressed(&object).as_slice(), Some(&expected)).unwrap();
            prop_assert_eq!(decoded, object);
        }
    }
}
