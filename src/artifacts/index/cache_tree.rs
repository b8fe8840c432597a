//! Cache tree extension
//!
//! The cache tree remembers the hash of every directory whose index entries
//! have not changed since the last time a tree was written, so that writing
//! the next tree only rehashes the directories that did change.
//!
//! On disk it is a pre-order list of [`CacheTreeEntry`] records:
//!
//! ```text
//! <name>\0<entry count> <subtree count>\n[<20-byte oid> if entry count >= 0]
//! ```
//!
//! The root record has an empty name. An entry count of `-1` marks a
//! directory that has to be recomputed. In memory the records are rebuilt
//! into a [`TreeFs`] mirroring the stage 0 index entries, where a zero tree
//! hash plays the role of the `-1` count.

use crate::artifacts::index::index_entry::{IndexEntry, Stage};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::Tree;
use crate::artifacts::objects::tree_fs::{MergeOutcome, TreeFs, WalkOrder, join_path, split_parent};
use crate::errors::{Error, Result};
use std::convert::Infallible;
use std::io::Write;

/// One flattened cache tree record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTreeEntry {
    pub name: String,
    /// Files covered by this directory, or -1 when the hash is stale
    pub entry_count: i32,
    pub subtree_count: u32,
    /// Present exactly when `entry_count >= 0`
    pub oid: Option<ObjectId>,
}

impl CacheTreeEntry {
    pub fn is_valid(&self) -> bool {
        self.entry_count >= 0 && self.oid.is_some()
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(self.name.as_bytes())?;
        writeln!(writer, "\0{} {}", self.entry_count, self.subtree_count)?;
        if self.entry_count >= 0
            && let Some(oid) = &self.oid
        {
            oid.write_raw_to(writer)?;
        }

        Ok(())
    }

    /// Parse one record from the front of `data`, returning it with the
    /// number of bytes consumed
    pub fn parse(data: &[u8]) -> Result<(Self, usize)> {
        let malformed = |what: &str| Error::corrupted_index(format!("cache tree: {what}"));

        let name_end = data
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| malformed("unterminated name"))?;
        let name = std::str::from_utf8(&data[..name_end])
            .map_err(|_| malformed("name is not valid UTF-8"))?
            .to_string();

        let rest = &data[name_end + 1..];
        let line_end = rest
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| malformed("unterminated counts"))?;
        let counts = std::str::from_utf8(&rest[..line_end])
            .map_err(|_| malformed("counts are not ASCII"))?;
        let (entry_count, subtree_count) = counts
            .split_once(' ')
            .ok_or_else(|| malformed("missing subtree count"))?;
        let entry_count = entry_count
            .parse::<i32>()
            .map_err(|_| malformed("invalid entry count"))?;
        let subtree_count = subtree_count
            .parse::<u32>()
            .map_err(|_| malformed("invalid subtree count"))?;

        let mut used = name_end + 1 + line_end + 1;
        let oid = if entry_count >= 0 {
            let mut raw = data
                .get(used..used + 20)
                .ok_or_else(|| malformed("truncated object id"))?;
            used += 20;
            Some(ObjectId::read_raw_from(&mut raw)?)
        } else {
            None
        };

        Ok((
            CacheTreeEntry {
                name,
                entry_count,
                subtree_count,
                oid,
            },
            used,
        ))
    }
}

/// Parse a whole `TREE` extension payload
pub fn parse_entries(mut data: &[u8]) -> Result<Vec<CacheTreeEntry>> {
    let mut entries = Vec::new();
    while !data.is_empty() {
        let (entry, used) = CacheTreeEntry::parse(data)?;
        entries.push(entry);
        data = &data[used..];
    }
    Ok(entries)
}

pub fn write_entries<W: Write>(entries: &[CacheTreeEntry], writer: &mut W) -> Result<()> {
    for entry in entries {
        entry.write_to(writer)?;
    }
    Ok(())
}

/// Hierarchical cache tree kept in lock-step with the index entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheTree {
    fs: TreeFs,
}

impl CacheTree {
    /// Build a cache tree with every directory marked stale
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a IndexEntry>) -> Self {
        let mut cache = CacheTree::default();
        for entry in entries {
            cache.upsert(entry);
        }
        cache
    }

    /// Rebuild from the flattened records found in an index file
    ///
    /// A cached hash is only trusted when the directory still exists and
    /// still covers the number of files recorded for it. A directory with a
    /// stale child is stale itself.
    pub fn load<'a>(
        flat: &[CacheTreeEntry],
        entries: impl IntoIterator<Item = &'a IndexEntry>,
    ) -> Result<Self> {
        let mut cache = Self::from_entries(entries);
        if flat.is_empty() {
            return Ok(cache);
        }

        let nodes = collect_paths(flat)?;
        if nodes.len() != flat.len() {
            return Err(Error::corrupted_index(format!(
                "cache tree has {} trailing records",
                flat.len() - nodes.len()
            )));
        }

        for (path, record) in nodes {
            if !record.is_valid() {
                continue;
            }
            if let (Some(tree), Some(oid)) = (cache.fs.find_mut(&path), record.oid)
                && file_count(tree) == record.entry_count as usize
            {
                tree.set_oid(oid);
            }
        }

        let Ok(()) = cache
            .fs
            .try_walk_mut::<_, Infallible>(WalkOrder::PostOrder, &mut |_, tree| {
                let stale_child = tree
                    .entries()
                    .any(|(_, entry)| entry.as_tree().is_some_and(Tree::is_dirty));
                if stale_child {
                    tree.invalidate();
                }
                Ok(())
            });

        Ok(cache)
    }

    pub fn tree_fs(&self) -> &TreeFs {
        &self.fs
    }

    pub fn root_oid(&self) -> ObjectId {
        self.fs.root().oid()
    }

    pub fn is_valid(&self) -> bool {
        !self.fs.root().is_dirty()
    }

    /// Hash of the directory at `path` if it is still valid
    pub fn oid_at(&self, path: &str) -> Option<ObjectId> {
        self.fs
            .find(path)
            .filter(|tree| !tree.is_dirty())
            .map(Tree::oid)
    }

    /// Mark the ancestors of `path` stale, without changing any entry
    pub fn invalidate_path(&mut self, path: &str) {
        let (parent, _) = split_parent(path);
        self.fs.invalidate(parent);
    }

    /// Mark the ancestors of `prefix` and every directory below it stale
    pub fn invalidate_with_prefix(&mut self, prefix: &str) {
        self.fs.invalidate(prefix);
        if let Some(tree) = self.fs.find_mut(prefix) {
            invalidate_all(tree);
        }
    }

    /// Track an added or updated index entry
    pub fn upsert(&mut self, entry: &IndexEntry) {
        if entry.stage == Stage::Merged {
            self.fs.upsert_file(&entry.name, entry.oid, entry.mode());
        } else {
            self.invalidate_path(&entry.name);
        }
    }

    /// Track a removed index entry
    pub fn remove(&mut self, path: &str) {
        if self.fs.remove(path).is_none() {
            self.invalidate_path(path);
        }
    }

    /// Track the removal of every entry below `prefix`
    pub fn remove_with_prefix(&mut self, prefix: &str) {
        self.invalidate_with_prefix(prefix);
        self.fs.remove(prefix);
    }

    /// Merge a tree read from the object store into the cache
    pub fn merge(&mut self, other: TreeFs) -> MergeOutcome {
        self.fs.merge(other)
    }

    /// Hash every stale directory bottom-up
    ///
    /// `persist` receives each rehashed tree. Returns the root hash and the
    /// number of trees rehashed.
    pub fn update<F>(&mut self, persist: &mut F) -> Result<(ObjectId, usize)>
    where
        F: FnMut(&Tree) -> Result<()>,
    {
        let mut written = 0;
        let root = self.fs.finalize(&mut |_, tree| {
            written += 1;
            persist(tree)
        })?;

        Ok((root, written))
    }

    /// Flatten into pre-order records, children ordered the way git writes
    /// them (shorter names first, then bytewise)
    pub fn flatten(&self) -> Vec<CacheTreeEntry> {
        let mut records = Vec::new();
        flatten_tree(self.fs.root(), "", &mut records);
        records
    }
}

/// Pre-order reconstruction of the record hierarchy into `(path, record)`
/// pairs, reading records until the root's subtrees are complete
///
/// Open directories are kept on an explicit stack, which can never grow
/// past the number of records read.
fn collect_paths(flat: &[CacheTreeEntry]) -> Result<Vec<(String, &CacheTreeEntry)>> {
    let truncated = || Error::corrupted_index("cache tree ends before all subtrees were read");

    let mut records = flat.iter();
    let root = records.next().ok_or_else(truncated)?;
    let mut nodes = vec![(String::new(), root)];
    // (index into `nodes`, subtrees still to read)
    let mut open = vec![(0, root.subtree_count)];

    while let Some((parent, remaining)) = open.last_mut() {
        if *remaining == 0 {
            open.pop();
            continue;
        }
        *remaining -= 1;
        let parent = *parent;

        let record = records.next().ok_or_else(truncated)?;
        let path = join_path(&nodes[parent].0, &record.name);
        nodes.push((path, record));
        if record.subtree_count > 0 {
            open.push((nodes.len() - 1, record.subtree_count));
        }
    }

    Ok(nodes)
}

fn invalidate_all(tree: &mut Tree) {
    tree.invalidate();
    for (_, entry) in tree.entries_mut() {
        if let Some(child) = entry.as_tree_mut() {
            invalidate_all(child);
        }
    }
}

/// Number of leaf entries below `tree`
fn file_count(tree: &Tree) -> usize {
    tree.entries()
        .map(|(_, entry)| entry.as_tree().map_or(1, file_count))
        .sum()
}

/// Append the records for `tree` and its children; returns the entry count
/// written for `tree`
fn flatten_tree(tree: &Tree, name: &str, records: &mut Vec<CacheTreeEntry>) -> i32 {
    let position = records.len();
    records.push(CacheTreeEntry {
        name: name.to_string(),
        entry_count: -1,
        subtree_count: 0,
        oid: None,
    });

    let mut children = tree
        .entries()
        .filter_map(|(name, entry)| entry.as_tree().map(|child| (name, child)))
        .collect::<Vec<_>>();
    children.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

    let mut files = 0i32;
    let mut valid = !tree.is_dirty();
    for (child_name, child) in &children {
        let count = flatten_tree(child, child_name, records);
        if count < 0 {
            valid = false;
        }
        files = files.saturating_add(count);
    }
    files = files.saturating_add(
        tree.entries()
            .filter(|(_, entry)| !entry.is_tree())
            .count() as i32,
    );

    let record = &mut records[position];
    record.subtree_count = children.len() as u32;
    if valid {
        record.entry_count = files;
        record.oid = Some(tree.oid());
    }

    record.entry_count
}
