//! Git tree object
//!
//! Trees represent directory snapshots in Git. They contain entries for files (blobs)
//! and subdirectories (other trees), along with their names and modes.
//!
//! ## Format
//!
//! On disk: `tree <size>\0<entries>`
//! Each entry: `<mode> <name>\0<20-byte-sha1>`
//!
//! Entries are emitted in git order: byte-wise by name, where a subdirectory
//! sorts as if its name ended in `/`.
//!
//! ## Hash caching
//!
//! A tree remembers the hash it was loaded with or last computed. Any
//! structural change through the methods below resets it to the zero hash,
//! so a zero hash always means "must be recomputed".

use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::object::{Object, Packable, Unpackable, hash_object};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{Error, Result};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// What a tree entry points at
///
/// Blob and gitlink entries are always `Unresolved`: their content is never
/// needed to compose the tree. Subdirectories become `Resolved` once loaded
/// or created in memory.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryPointer {
    Unresolved(ObjectId),
    Resolved(Box<Tree>),
}

impl EntryPointer {
    pub fn oid(&self) -> ObjectId {
        match self {
            EntryPointer::Unresolved(oid) => *oid,
            EntryPointer::Resolved(tree) => tree.oid(),
        }
    }

    /// Replace an unresolved pointer with a fresh, empty tree and return it
    fn tree_or_insert(&mut self) -> &mut Tree {
        if let EntryPointer::Unresolved(_) = self {
            *self = EntryPointer::Resolved(Box::default());
        }

        match self {
            EntryPointer::Resolved(tree) => tree,
            EntryPointer::Unresolved(_) => unreachable!("pointer was resolved above"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeEntry {
    pub mode: EntryMode,
    pub pointer: EntryPointer,
}

impl TreeEntry {
    pub fn leaf(mode: EntryMode, oid: ObjectId) -> Self {
        TreeEntry {
            mode,
            pointer: EntryPointer::Unresolved(oid),
        }
    }

    pub fn subtree(tree: Tree) -> Self {
        TreeEntry {
            mode: EntryMode::Directory,
            pointer: EntryPointer::Resolved(Box::new(tree)),
        }
    }

    pub fn oid(&self) -> ObjectId {
        self.pointer.oid()
    }

    pub fn is_tree(&self) -> bool {
        self.mode.is_tree()
    }

    pub fn as_tree(&self) -> Option<&Tree> {
        match &self.pointer {
            EntryPointer::Resolved(tree) => Some(tree),
            EntryPointer::Unresolved(_) => None,
        }
    }

    pub fn as_tree_mut(&mut self) -> Option<&mut Tree> {
        match &mut self.pointer {
            EntryPointer::Resolved(tree) => Some(tree),
            EntryPointer::Unresolved(_) => None,
        }
    }
}

/// Sort key for git's tree order
fn sort_key(name: &str, entry: &TreeEntry) -> Vec<u8> {
    let mut key = name.as_bytes().to_vec();
    if entry.is_tree() {
        key.push(b'/');
    }
    key
}

/// Git tree object representing a directory snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tree {
    /// Cached hash, zero while dirty
    oid: ObjectId,
    entries: BTreeMap<String, TreeEntry>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn oid(&self) -> ObjectId {
        self.oid
    }

    pub fn set_oid(&mut self, oid: ObjectId) {
        self.oid = oid;
    }

    pub fn invalidate(&mut self) {
        self.oid = ObjectId::ZERO;
    }

    pub fn is_dirty(&self) -> bool {
        self.oid.is_zero()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries keyed by name (byte order, not git order)
    pub fn entries(&self) -> impl Iterator<Item = (&String, &TreeEntry)> {
        self.entries.iter()
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = (&String, &mut TreeEntry)> {
        self.entries.iter_mut()
    }

    pub fn into_entries(self) -> impl Iterator<Item = (String, TreeEntry)> {
        self.entries.into_iter()
    }

    /// Entries in the order they are serialized
    pub fn sorted_entries(&self) -> Vec<(&String, &TreeEntry)> {
        let mut entries = self.entries.iter().collect::<Vec<_>>();
        entries.sort_by_cached_key(|(name, entry)| sort_key(name, entry));
        entries
    }

    pub fn entry(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.get(name)
    }

    pub fn child(&self, name: &str) -> Option<&Tree> {
        self.entries.get(name).and_then(TreeEntry::as_tree)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Tree> {
        self.entries.get_mut(name).and_then(TreeEntry::as_tree_mut)
    }

    /// Insert or replace an entry, returning the previous one
    pub fn upsert(&mut self, name: impl Into<String>, entry: TreeEntry) -> Option<TreeEntry> {
        self.invalidate();
        self.entries.insert(name.into(), entry)
    }

    pub fn remove(&mut self, name: &str) -> Option<TreeEntry> {
        let removed = self.entries.remove(name);
        if removed.is_some() {
            self.invalidate();
        }
        removed
    }

    /// Return the subtree `name`, replacing a blob or unexpanded entry with
    /// an empty tree when needed
    pub fn child_or_insert(&mut self, name: &str) -> &mut Tree {
        match self.entries.entry(name.to_owned()) {
            Entry::Vacant(vacant) => {
                self.oid = ObjectId::ZERO;
                vacant
                    .insert(TreeEntry::subtree(Tree::new()))
                    .pointer
                    .tree_or_insert()
            }
            Entry::Occupied(occupied) => {
                let entry = occupied.into_mut();
                if !entry.is_tree() || entry.as_tree().is_none() {
                    self.oid = ObjectId::ZERO;
                    *entry = TreeEntry::subtree(Tree::new());
                }
                entry.pointer.tree_or_insert()
            }
        }
    }

    /// Hash of the current entries, ignoring the cached value
    pub fn compute_oid(&self) -> ObjectId {
        hash_object(ObjectType::Tree, &self.serialize())
    }

    /// Recompute and cache the hash
    pub fn refresh_oid(&mut self) -> ObjectId {
        self.oid = self.compute_oid();
        self.oid
    }
}

impl Packable for Tree {
    fn serialize(&self) -> Bytes {
        let mut content = Vec::new();

        for (name, entry) in self.sorted_entries() {
            content.extend_from_slice(format!("{:o} {}", entry.mode.as_u32(), name).as_bytes());
            content.push(0);
            content.extend_from_slice(entry.oid().as_bytes());
        }

        Bytes::from(content)
    }
}

impl Unpackable for Tree {
    fn deserialize(content: Bytes) -> Result<Self> {
        let mut entries = BTreeMap::new();
        let mut rest = &content[..];

        while !rest.is_empty() {
            let space = rest
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| Error::corrupted_object("unexpected end of tree entry mode"))?;
            let mode = std::str::from_utf8(&rest[..space])
                .map_err(|_| Error::corrupted_object("tree entry mode is not valid UTF-8"))?;
            let mode = EntryMode::from_octal_str(mode)?;
            rest = &rest[space + 1..];

            let nul = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| Error::corrupted_object("unexpected end of tree entry name"))?;
            let name = std::str::from_utf8(&rest[..nul])
                .map_err(|_| Error::corrupted_object("tree entry name is not valid UTF-8"))?
                .to_owned();
            rest = &rest[nul + 1..];

            let oid = ObjectId::read_raw_from(&mut rest)
                .map_err(|_| Error::corrupted_object("unexpected end of tree entry id"))?;

            entries.insert(name, TreeEntry::leaf(mode, oid));
        }

        Ok(Tree {
            oid: hash_object(ObjectType::Tree, &content),
            entries,
        })
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }
}

impl std::fmt::Display for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (name, entry) in self.sorted_entries() {
            writeln!(
                f,
                "{} {} {}\t{}",
                entry.mode.as_str(),
                entry.mode.object_type_name(),
                entry.oid(),
                name
            )?;
        }

        Ok(())
    }
}
