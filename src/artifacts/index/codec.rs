//! Whole-file encoding of the index
//!
//! [`decode`] verifies the trailing checksum before looking at anything else,
//! then reads the header, the entries and the extensions. [`encode`] writes
//! them back in the same order and appends a fresh checksum.

use crate::artifacts::index::cache_tree::{self, CacheTreeEntry};
use crate::artifacts::index::checksum::{self, Checksum};
use crate::artifacts::index::extension::Extension;
use crate::artifacts::index::index_entry::{ENTRY_FIXED_SIZE, IndexEntry};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::{CACHE_TREE_SIGNATURE, HEADER_SIZE};
use crate::errors::{Error, Result};
use bytes::Bytes;

/// Lower bound on an encoded entry: the fixed fields, the name terminator and
/// at least one more byte (name padding before v4, the prefix length in v4)
const MIN_ENTRY_SIZE: usize = ENTRY_FIXED_SIZE + 2;

/// Decoded content of an index file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexContent {
    pub version: u32,
    /// Entries in file order
    pub entries: Vec<IndexEntry>,
    /// Flattened `TREE` extension, when the file has one
    pub cache_tree: Option<Vec<CacheTreeEntry>>,
    /// Every other extension, in file order
    pub extensions: Vec<Extension>,
}

impl IndexContent {
    /// Version actually written: extended entry flags need at least v3
    pub fn effective_version(&self) -> u32 {
        if self.version < 3 && self.entries.iter().any(IndexEntry::is_extended) {
            3
        } else {
            self.version
        }
    }
}

pub fn decode(data: &[u8]) -> Result<IndexContent> {
    let body = checksum::verify(data)?;
    let header = IndexHeader::parse(body)?;

    let entries_count = header.entries_count as usize;
    let max_entries = body.len().saturating_sub(HEADER_SIZE) / MIN_ENTRY_SIZE;
    if entries_count > max_entries {
        return Err(Error::corrupted_index(format!(
            "header claims {entries_count} entries but the file has room for {max_entries}"
        )));
    }

    let mut offset = HEADER_SIZE;
    let mut entries: Vec<IndexEntry> = Vec::with_capacity(entries_count);
    for _ in 0..entries_count {
        let previous = entries.last();
        let (entry, used) = IndexEntry::parse(
            &body[offset..],
            header.version,
            previous.map_or("", |entry| entry.name.as_str()),
        )?;
        if let Some(previous) = previous
            && (previous.name.as_str(), previous.stage) >= (entry.name.as_str(), entry.stage)
        {
            return Err(Error::corrupted_index(format!(
                "entry '{}' (stage {}) is out of order",
                entry.name, entry.stage as u8
            )));
        }
        offset += used;
        entries.push(entry);
    }

    let mut cache_tree = None;
    let mut extensions = Vec::new();
    while offset < body.len() {
        let (extension, used) = Extension::parse(&body[offset..])?;
        offset += used;

        if &extension.signature == CACHE_TREE_SIGNATURE {
            cache_tree = Some(cache_tree::parse_entries(&extension.data)?);
        } else {
            extensions.push(extension);
        }
    }

    tracing::trace!(
        version = header.version,
        entries = entries.len(),
        extensions = extensions.len(),
        cache_tree = cache_tree.is_some(),
        "decoded index"
    );

    Ok(IndexContent {
        version: header.version,
        entries,
        cache_tree,
        extensions,
    })
}

pub fn encode(content: &IndexContent) -> Result<Bytes> {
    let version = content.effective_version();
    let mut writer = Checksum::new(Vec::new());

    IndexHeader::new(version, content.entries.len() as u32).write_to(&mut writer)?;

    let mut previous = "";
    for entry in &content.entries {
        if version >= 4 {
            entry.write_compressed(&mut writer, previous)?;
        } else {
            entry.write_padded(&mut writer)?;
        }
        previous = entry.name.as_str();
    }

    if let Some(records) = &content.cache_tree {
        let mut payload = Vec::new();
        cache_tree::write_entries(records, &mut payload)?;
        Extension::new(*CACHE_TREE_SIGNATURE, payload).write_to(&mut writer)?;
    }

    for extension in &content.extensions {
        extension.write_to(&mut writer)?;
    }

    Ok(Bytes::from(writer.finish()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::CHECKSUM_SIZE;
    use crate::artifacts::index::entry_mode::EntryMode;
    use crate::artifacts::index::index_entry::{EntryMetadata, ExtendedFlags, Stage};
    use crate::artifacts::objects::object_id::ObjectId;
    use crate::errors::Error;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::{fixture, rstest};

    fn entry(path: &str) -> IndexEntry {
        IndexEntry::new(
            path.to_string(),
            ObjectId::digest(path.as_bytes()),
            EntryMetadata {
                mtime: 1_700_000_000,
                ino: 42,
                size: path.len() as u32,
                ..EntryMetadata::with_mode(EntryMode::REGULAR)
            },
        )
    }

    #[fixture]
    fn content() -> IndexContent {
        IndexContent {
            version: 2,
            entries: vec![entry("a.txt"), entry("src/lib.rs"), entry("src/main.rs")],
            cache_tree: Some(vec![
                CacheTreeEntry {
                    name: String::new(),
                    entry_count: 3,
                    subtree_count: 1,
                    oid: Some(ObjectId::digest(b"root")),
                },
                CacheTreeEntry {
                    name: "src".to_string(),
                    entry_count: -1,
                    subtree_count: 0,
                    oid: None,
                },
            ]),
            extensions: vec![Extension::new(*b"ZZZZ", &b"opaque payload"[..])],
        }
    }

    #[test]
    fn empty_index_layout() {
        let bytes = encode(&IndexContent {
            version: 2,
            ..Default::default()
        })
        .unwrap();

        assert_eq!(bytes.len(), HEADER_SIZE + CHECKSUM_SIZE);
        assert_eq!(&bytes[..4], b"DIRC");
        assert_eq!(decode(&bytes).unwrap().entries.len(), 0);
    }

    #[rstest]
    fn index_is_read_back(content: IndexContent) {
        let bytes = encode(&content).unwrap();

        assert_eq!(decode(&bytes).unwrap(), content);
    }

    #[rstest]
    fn unknown_extension_bytes_survive(content: IndexContent) {
        let bytes = encode(&content).unwrap();
        let again = encode(&decode(&bytes).unwrap()).unwrap();

        assert_eq!(again, bytes);
    }

    #[rstest]
    fn version_four_round_trips(mut content: IndexContent) {
        content.version = 4;
        let bytes = encode(&content).unwrap();
        let v2 = encode(&IndexContent {
            version: 2,
            ..content.clone()
        })
        .unwrap();

        assert!(bytes.len() < v2.len());
        assert_eq!(decode(&bytes).unwrap(), content);
    }

    #[rstest]
    fn extended_flags_upgrade_to_version_three(mut content: IndexContent) {
        content.entries[1].extended_flags = ExtendedFlags::INTENT_TO_ADD;
        content.entries[2].stage = Stage::Base;

        let decoded = decode(&encode(&content).unwrap()).unwrap();

        assert_eq!(decoded.version, 3);
        assert_eq!(decoded.entries, content.entries);
    }

    #[rstest]
    fn missing_cache_tree_is_not_invented(mut content: IndexContent) {
        content.cache_tree = None;

        let decoded = decode(&encode(&content).unwrap()).unwrap();

        assert_eq!(decoded.cache_tree, None);
    }

    #[rstest]
    fn extensions_keep_their_order(mut content: IndexContent) {
        content.extensions = vec![
            Extension::new(*b"link", &b"x"[..]),
            Extension::new(*b"UNTR", &b""[..]),
        ];

        let decoded = decode(&encode(&content).unwrap()).unwrap();

        assert_eq!(decoded.extensions, content.extensions);
    }

    #[rstest]
    fn bad_version_is_reported_after_checksum(content: IndexContent) {
        let mut bytes = encode(&content).unwrap().to_vec();
        bytes[7] = 9;

        // the checksum no longer matches, which is detected first
        assert!(matches!(decode(&bytes), Err(Error::CorruptedIndex(_))));
    }

    #[test]
    fn entry_count_larger_than_the_file_is_rejected() {
        let mut writer = Checksum::new(Vec::new());
        IndexHeader::new(2, u32::MAX).write_to(&mut writer).unwrap();
        let bytes = writer.finish().unwrap();

        assert!(matches!(decode(&bytes), Err(Error::CorruptedIndex(_))));
    }

    #[rstest]
    #[case(vec!["a.txt", "a.txt"])]
    #[case(vec!["b.txt", "a.txt"])]
    fn entries_must_be_strictly_ordered(#[case] names: Vec<&str>, #[values(2, 4)] version: u32) {
        let bytes = encode(&IndexContent {
            version,
            entries: names.into_iter().map(entry).collect(),
            ..Default::default()
        })
        .unwrap();

        assert!(matches!(decode(&bytes), Err(Error::CorruptedIndex(_))));
    }

    #[test]
    fn stages_of_one_path_are_ordered_by_stage() {
        let mut ours = entry("a.txt");
        ours.stage = Stage::Ours;
        let mut base = entry("a.txt");
        base.stage = Stage::Base;

        let in_order = encode(&IndexContent {
            version: 2,
            entries: vec![base.clone(), ours.clone()],
            ..Default::default()
        })
        .unwrap();
        let reversed = encode(&IndexContent {
            version: 2,
            entries: vec![ours, base],
            ..Default::default()
        })
        .unwrap();

        assert_eq!(decode(&in_order).unwrap().entries.len(), 2);
        assert!(matches!(decode(&reversed), Err(Error::CorruptedIndex(_))));
    }

    proptest! {
        #[test]
        fn any_flipped_byte_is_detected(position in 0usize..200, bit in 0u8..8) {
            let bytes = encode(&content()).unwrap();
            let mut corrupted = bytes.to_vec();
            let position = position % (corrupted.len() - CHECKSUM_SIZE);
            corrupted[position] ^= 1 << bit;

            prop_assert!(matches!(decode(&corrupted), Err(Error::CorruptedIndex(_))));
        }

        #[test]
        fn generated_indexes_round_trip(
            names in proptest::collection::btree_set("[a-z]{1,6}(/[a-z]{1,6}){0,2}", 0..12),
            version in 2u32..=4,
        ) {
            let content = IndexContent {
                version,
                entries: names.iter().map(|name| entry(name)).collect(),
                cache_tree: None,
                extensions: Vec::new(),
            };

            prop_assert_eq!(decode(&encode(&content).unwrap()).unwrap(), content);
        }
    }
}
