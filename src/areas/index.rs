//! Git index (staging area)
//!
//! The index is Git's staging area that tracks which files should be included in the next commit.
//! It maintains metadata about files including their mode, timestamps, and SHA-1 hashes.
//!
//! ## Data Structures
//!
//! - `entries`: index entries keyed by path and merge stage, in file order
//! - `cache_tree`: per-directory tree hashes, present when the file carried
//!   a `TREE` extension or a tree has been written since loading
//! - `extensions`: extensions this crate does not interpret, written back
//!   unchanged
//!
//! Every change to `entries` is mirrored into the cache tree so that a
//! directory hash is only trusted while none of the files below it changed.

use crate::artifacts::index::DEFAULT_VERSION;
use crate::artifacts::index::cache_tree::CacheTree;
use crate::artifacts::index::codec::{self, IndexContent};
use crate::artifacts::index::extension::Extension;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry, Stage};
use crate::artifacts::index::{MAX_VERSION, MIN_VERSION};
use crate::errors::{Error, Result};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::{Read, Write};
use std::ops::DerefMut;
use std::path::{Path, PathBuf};

type EntryKey = (String, Stage);

/// Git index (staging area)
#[derive(Debug, Clone)]
pub struct Index {
    /// Path to the index file (typically `.git/index`)
    path: Box<Path>,
    version: u32,
    entries: BTreeMap<EntryKey, IndexEntry>,
    pub(crate) cache_tree: Option<CacheTree>,
    extensions: Vec<Extension>,
    /// Flag indicating if the index has been modified since loading
    changed: bool,
}

impl Index {
    /// Create a new empty index backed by `path`
    pub fn new(path: Box<Path>) -> Self {
        Index {
            path,
            version: DEFAULT_VERSION,
            entries: BTreeMap::new(),
            cache_tree: None,
            extensions: Vec::new(),
            changed: false,
        }
    }

    /// Open the index at `path`; a missing file yields an empty index
    pub fn load(path: Box<Path>) -> Result<Self> {
        let mut index = Index::new(path);
        index.rehydrate()?;
        Ok(index)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn set_version(&mut self, version: u32) -> Result<()> {
        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(Error::UnsupportedIndexVersion(version));
        }
        if version != self.version {
            self.version = version;
            self.changed = true;
        }
        Ok(())
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub(crate) fn mark_changed(&mut self) {
        self.changed = true;
    }

    pub fn cache_tree(&self) -> Option<&CacheTree> {
        self.cache_tree.as_ref()
    }

    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    /// Forget every entry, the cache tree and the preserved extensions
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cache_tree = None;
        self.extensions.clear();
        self.changed = true;
    }

    /// Load the index from disk
    ///
    /// Reads the whole file under a shared lock and verifies its checksum
    /// before decoding anything. If the file doesn't exist the index is
    /// reset to an empty one at the default version.
    pub fn rehydrate(&mut self) -> Result<()> {
        self.entries.clear();
        self.cache_tree = None;
        self.extensions.clear();
        self.version = DEFAULT_VERSION;
        self.changed = false;

        let mut index_file = match std::fs::OpenOptions::new().read(true).open(self.path()) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        let mut data = Vec::new();
        {
            let mut lock = file_guard::lock(&mut index_file, file_guard::Lock::Shared, 0, 1)?;
            lock.deref_mut().read_to_end(&mut data)?;
        }

        let content = codec::decode(&data)?;
        self.version = content.version;
        for entry in content.entries {
            self.entries.insert((entry.name.clone(), entry.stage), entry);
        }
        self.cache_tree = content
            .cache_tree
            .map(|flat| CacheTree::load(&flat, self.entries.values()))
            .transpose()?;
        self.extensions = content.extensions;

        tracing::debug!(
            path = %self.path.display(),
            version = self.version,
            entries = self.entries.len(),
            cache_tree = self.cache_tree.is_some(),
            "loaded index"
        );

        Ok(())
    }

    /// Snapshot of everything that gets written to disk
    pub fn to_content(&self) -> IndexContent {
        IndexContent {
            version: self.version,
            entries: self.entries.values().cloned().collect(),
            cache_tree: self.cache_tree.as_ref().map(CacheTree::flatten),
            extensions: self.extensions.clone(),
        }
    }

    fn lock_path(&self) -> PathBuf {
        let mut lock_path = OsString::from(self.path.as_os_str());
        lock_path.push(".lock");
        PathBuf::from(lock_path)
    }

    /// Save the index if anything changed since it was loaded
    ///
    /// The new content goes to `<index>.lock` first and is renamed over the
    /// index, so readers see either the old or the new file.
    pub fn write_updates(&mut self) -> Result<()> {
        if !self.changed {
            return Ok(());
        }

        let content = self.to_content();
        let bytes = codec::encode(&content)?;
        let lock_path = self.lock_path();

        let mut lock_file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)?;
        let written = lock_file
            .write_all(&bytes)
            .and_then(|_| lock_file.sync_all())
            .and_then(|_| std::fs::rename(&lock_path, self.path()));
        if let Err(err) = written {
            let _ = std::fs::remove_file(&lock_path);
            return Err(err.into());
        }

        self.version = content.effective_version();
        self.changed = false;

        tracing::debug!(
            path = %self.path.display(),
            version = self.version,
            entries = self.entries.len(),
            "saved index"
        );

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in index order: by path, then by stage
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    pub fn into_entries(self) -> impl Iterator<Item = IndexEntry> {
        self.entries.into_values()
    }

    /// The merged (stage 0) entry stored under `path`
    pub fn entry_by_path(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.get(&(path.to_string(), Stage::Merged))
    }

    /// Every stage stored under `path`
    pub fn entries_at<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a IndexEntry> {
        self.entries
            .range((path.to_string(), Stage::Merged)..=(path.to_string(), Stage::Theirs))
            .map(|(_, entry)| entry)
    }

    /// Entries stored below the directory `prefix`
    pub fn entries_under<'a>(&'a self, prefix: &str) -> impl Iterator<Item = &'a IndexEntry> {
        let prefix = format!("{}/", prefix.trim_end_matches('/'));
        self.entries
            .range((prefix.clone(), Stage::Merged)..)
            .take_while(move |((name, _), _)| name.starts_with(&prefix))
            .map(|(_, entry)| entry)
    }

    pub fn is_tracked_file(&self, path: &str) -> bool {
        self.entries_at(path).next().is_some()
    }

    pub fn is_tracked_dir(&self, path: &str) -> bool {
        self.entries_under(path).next().is_some()
    }

    pub fn is_tracked(&self, path: &str) -> bool {
        self.is_tracked_file(path) || self.is_tracked_dir(path)
    }

    pub fn has_conflicts(&self) -> bool {
        self.entries.values().any(|entry| entry.stage != Stage::Merged)
    }

    /// Stage an entry
    ///
    /// A file replacing a directory drops every entry below it, and a
    /// directory replacing a file drops the file. Adding the merged stage
    /// of a path resolves any conflict recorded for it.
    pub fn add(&mut self, entry: IndexEntry) {
        self.discard_conflicts(&entry);
        if entry.stage == Stage::Merged {
            self.remove_stages(&entry.name);
        }

        if let Some(cache_tree) = self.cache_tree.as_mut() {
            cache_tree.upsert(&entry);
        }
        self.entries.insert((entry.name.clone(), entry.stage), entry);
        self.changed = true;
    }

    fn discard_conflicts(&mut self, entry: &IndexEntry) {
        for parent in entry.parent_dirs() {
            self.remove(parent);
        }
        self.remove_with_prefix(&entry.name);
    }

    fn remove_stages(&mut self, path: &str) -> bool {
        let stages = self
            .entries_at(path)
            .map(|entry| (entry.name.clone(), entry.stage))
            .collect::<Vec<_>>();

        for key in &stages {
            self.entries.remove(key);
        }
        !stages.is_empty()
    }

    /// Remove every stage of `path`; returns whether anything was removed
    pub fn remove(&mut self, path: &str) -> bool {
        if !self.remove_stages(path) {
            return false;
        }

        if let Some(cache_tree) = self.cache_tree.as_mut() {
            cache_tree.remove(path);
        }
        self.changed = true;
        true
    }

    /// Remove every entry below the directory `prefix`; returns how many
    /// entries were removed
    pub fn remove_with_prefix(&mut self, prefix: &str) -> usize {
        let keys = self
            .entries_under(prefix)
            .map(|entry| (entry.name.clone(), entry.stage))
            .collect::<Vec<_>>();
        if keys.is_empty() {
            return 0;
        }

        for key in &keys {
            self.entries.remove(key);
        }
        if let Some(cache_tree) = self.cache_tree.as_mut() {
            cache_tree.remove_with_prefix(prefix.trim_end_matches('/'));
        }
        self.changed = true;
        keys.len()
    }

    /// Refresh the stat data of a merged entry without touching its content
    pub fn update_entry_stat(&mut self, path: &str, stat: EntryMetadata) {
        if let Some(existing_entry) = self.entries.get_mut(&(path.to_string(), Stage::Merged))
            && existing_entry.metadata != stat
        {
            existing_entry.metadata = stat;
            self.changed = true;
        }
    }

    /// Insert entries without conflict handling; used when the caller
    /// already checked that none of the paths is staged
    pub(crate) fn insert_unchecked(&mut self, entry: IndexEntry) {
        self.entries.insert((entry.name.clone(), entry.stage), entry);
        self.changed = true;
    }

    /// Cache tree, built from the entries when the index has none yet
    pub(crate) fn cache_tree_or_build(&mut self) -> &mut CacheTree {
        let entries = &self.entries;
        self.cache_tree
            .get_or_insert_with(|| CacheTree::from_entries(entries.values()))
    }

    /// Print the entry table followed by the cache tree table
    pub fn dump<W: Write>(&self, sink: &mut W) -> Result<()> {
        writeln!(
            sink,
            "index version {}, {} entries",
            self.version,
            self.entries.len()
        )?;

        for entry in self.entries.values() {
            let metadata = &entry.metadata;
            writeln!(
                sink,
                "{} {} {}\t{}",
                entry.mode().as_str(),
                entry.oid,
                entry.stage as u8,
                entry.name
            )?;
            writeln!(sink, "  ctime: {}:{}", metadata.ctime, metadata.ctime_nsec)?;
            writeln!(sink, "  mtime: {}:{}", metadata.mtime, metadata.mtime_nsec)?;
            writeln!(sink, "  dev: {}\tino: {}", metadata.dev, metadata.ino)?;
            writeln!(sink, "  uid: {}\tgid: {}", metadata.uid, metadata.gid)?;
            writeln!(
                sink,
                "  size: {}\tflags: {:x}",
                metadata.size,
                entry.extended_flags.bits()
            )?;
        }

        if let Some(cache_tree) = &self.cache_tree {
            writeln!(sink, "cache tree")?;
            let mut paths = Vec::<String>::new();
            let mut remaining = Vec::<u32>::new();

            for record in cache_tree.flatten() {
                while remaining.last() == Some(&0) {
                    remaining.pop();
                    paths.pop();
                }
                if let Some(last) = remaining.last_mut() {
                    *last -= 1;
                }

                paths.push(record.name.clone());
                remaining.push(record.subtree_count);
                let path = paths
                    .iter()
                    .filter(|name| !name.is_empty())
                    .map(|name| format!("{name}/"))
                    .collect::<String>();

                let oid = match record.oid {
                    Some(oid) if record.entry_count >= 0 => oid.to_string(),
                    _ => "invalid".to_string(),
                };
                writeln!(
                    sink,
                    "{oid} ({} entries, {} subtrees)\t{path}",
                    record.entry_count, record.subtree_count
                )?;
            }
        }

        for extension in &self.extensions {
            writeln!(
                sink,
                "extension {} ({} bytes)",
                extension.signature_str(),
                extension.data.len()
            )?;
        }

        Ok(())
    }
}
