//! In-memory tree hierarchy
//!
//! A [`TreeFs`] owns a root [`Tree`] and, through resolved entry pointers,
//! every subtree loaded or created below it. Paths are `/`-separated and
//! relative to the root; the empty path names the root itself.
//!
//! Every method that changes the shape of a tree also zeroes the hash of
//! each tree on the way down to it, so a later post-order pass only has to
//! rehash trees with a zero hash.

use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{EntryPointer, Tree, TreeEntry};

/// Traversal order for [`TreeFs::walk`] and friends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOrder {
    /// Parents before children
    PreOrder,
    /// Children before parents
    PostOrder,
}

/// A leaf reached by flattening a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub oid: ObjectId,
    pub mode: EntryMode,
}

/// Both sides staged different content under the same path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConflict {
    pub path: String,
    pub ours: TreeEntrySummary,
    pub theirs: TreeEntrySummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeEntrySummary {
    pub oid: ObjectId,
    pub mode: EntryMode,
}

impl From<&TreeEntry> for TreeEntrySummary {
    fn from(entry: &TreeEntry) -> Self {
        TreeEntrySummary {
            oid: entry.oid(),
            mode: entry.mode,
        }
    }
}

/// Result of [`TreeFs::merge`]
///
/// On conflict the receiving side keeps its own entry; the conflicting
/// paths are listed here so the caller decides what to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub conflicts: Vec<MergeConflict>,
}

impl MergeOutcome {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

pub fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Split `a/b/c` into (`a/b`, `c`)
pub fn split_parent(path: &str) -> (&str, &str) {
    let path = path.trim_matches('/');
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", path),
    }
}

pub fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeFs {
    root: Tree,
}

impl TreeFs {
    pub fn new(root: Tree) -> Self {
        TreeFs { root }
    }

    pub fn root(&self) -> &Tree {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Tree {
        &mut self.root
    }

    pub fn into_root(self) -> Tree {
        self.root
    }

    /// Return the tree at `path`, creating empty trees for missing segments
    ///
    /// A blob found on the way is replaced by a directory.
    pub fn make_tree_all(&mut self, path: &str) -> &mut Tree {
        if self.find(path).is_none() {
            self.invalidate(path);
        }

        let mut tree = &mut self.root;
        for segment in split_path(path) {
            tree = tree.child_or_insert(segment);
        }
        tree
    }

    pub fn find(&self, path: &str) -> Option<&Tree> {
        split_path(path).try_fold(&self.root, |tree, segment| tree.child(segment))
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut Tree> {
        split_path(path).try_fold(&mut self.root, |tree, segment| tree.child_mut(segment))
    }

    /// Entry (blob or tree) stored at `path`
    pub fn entry(&self, path: &str) -> Option<&TreeEntry> {
        let (parent, name) = split_parent(path);
        self.find(parent)?.entry(name)
    }

    /// Stage a leaf at `path`, creating parent directories as needed
    pub fn upsert_file(&mut self, path: &str, oid: ObjectId, mode: EntryMode) {
        let (parent, name) = split_parent(path);

        self.invalidate(parent);
        self.make_tree_all(parent)
            .upsert(name, TreeEntry::leaf(mode, oid));
    }

    /// Place `tree` at `path`, replacing whatever was there
    ///
    /// Grafting at the root replaces the whole hierarchy.
    pub fn graft(&mut self, path: &str, tree: Tree) {
        let (parent, name) = split_parent(path);
        if name.is_empty() {
            self.root = tree;
            return;
        }

        self.invalidate(parent);
        self.make_tree_all(parent)
            .upsert(name, TreeEntry::subtree(tree));
    }

    /// Remove the entry at `path` and prune directories left empty
    pub fn remove(&mut self, path: &str) -> Option<TreeEntry> {
        let (parent, name) = split_parent(path);
        let removed = self.find_mut(parent)?.remove(name)?;

        self.invalidate(parent);
        self.prune_path(parent);

        Some(removed)
    }

    /// Zero the hash of every tree from the root down to `path`, stopping
    /// at the first missing segment
    pub fn invalidate(&mut self, path: &str) {
        self.walk_by_path_mut(path, WalkOrder::PreOrder, &mut |_, tree| tree.invalidate());
    }

    /// Visit every tree, passing its path
    pub fn walk<F>(&self, order: WalkOrder, visitor: &mut F)
    where
        F: FnMut(&str, &Tree),
    {
        Self::walk_tree(&self.root, "", order, visitor);
    }

    fn walk_tree<F>(tree: &Tree, path: &str, order: WalkOrder, visitor: &mut F)
    where
        F: FnMut(&str, &Tree),
    {
        if order == WalkOrder::PreOrder {
            visitor(path, tree);
        }

        for (name, entry) in tree.sorted_entries() {
            if let Some(child) = entry.as_tree() {
                Self::walk_tree(child, &join_path(path, name), order, visitor);
            }
        }

        if order == WalkOrder::PostOrder {
            visitor(path, tree);
        }
    }

    /// Visit every tree mutably, stopping at the first error
    pub fn try_walk_mut<F, E>(&mut self, order: WalkOrder, visitor: &mut F) -> Result<(), E>
    where
        F: FnMut(&str, &mut Tree) -> Result<(), E>,
    {
        Self::try_walk_tree_mut(&mut self.root, "", order, visitor)
    }

    fn try_walk_tree_mut<F, E>(
        tree: &mut Tree,
        path: &str,
        order: WalkOrder,
        visitor: &mut F,
    ) -> Result<(), E>
    where
        F: FnMut(&str, &mut Tree) -> Result<(), E>,
    {
        if order == WalkOrder::PreOrder {
            visitor(path, tree)?;
        }

        for (name, entry) in tree.entries_mut() {
            if let Some(child) = entry.as_tree_mut() {
                Self::try_walk_tree_mut(child, &join_path(path, name), order, visitor)?;
            }
        }

        if order == WalkOrder::PostOrder {
            visitor(path, tree)?;
        }

        Ok(())
    }

    /// Visit only the trees on the way from the root to `path`
    pub fn walk_by_path_mut<F>(&mut self, path: &str, order: WalkOrder, visitor: &mut F)
    where
        F: FnMut(&str, &mut Tree),
    {
        let segments = split_path(path).collect::<Vec<_>>();
        Self::walk_segments_mut(&mut self.root, "", &segments, order, visitor);
    }

    fn walk_segments_mut<F>(
        tree: &mut Tree,
        path: &str,
        segments: &[&str],
        order: WalkOrder,
        visitor: &mut F,
    ) where
        F: FnMut(&str, &mut Tree),
    {
        if order == WalkOrder::PreOrder {
            visitor(path, tree);
        }

        if let Some((head, rest)) = segments.split_first()
            && let Some(child) = tree.child_mut(head)
        {
            Self::walk_segments_mut(child, &join_path(path, head), rest, order, visitor);
        }

        if order == WalkOrder::PostOrder {
            visitor(path, tree);
        }
    }

    /// Union `other` into `self`
    ///
    /// Entries missing on this side are adopted, subtrees present on both
    /// sides are merged recursively, and leaves that differ are reported as
    /// conflicts while this side's entry is kept. Directories left empty are
    /// pruned afterwards.
    pub fn merge(&mut self, other: TreeFs) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        if self.root.is_empty() {
            self.root = other.root;
        } else {
            Self::merge_tree(&mut self.root, other.root, "", &mut outcome);
        }
        self.regularize();

        outcome
    }

    /// Returns true when `ours` changed
    fn merge_tree(ours: &mut Tree, theirs: Tree, path: &str, outcome: &mut MergeOutcome) -> bool {
        let mut changed = false;

        for (name, their_entry) in theirs.into_entries() {
            let entry_path = join_path(path, &name);

            let Some(our_entry) = ours.entry(&name) else {
                ours.upsert(name, their_entry);
                changed = true;
                continue;
            };

            match (our_entry.is_tree(), their_entry.is_tree()) {
                (true, true) => {
                    if our_entry.oid() == their_entry.oid() && !our_entry.oid().is_zero() {
                        continue;
                    }
                    let conflict = MergeConflict {
                        path: entry_path.clone(),
                        ours: our_entry.into(),
                        theirs: (&their_entry).into(),
                    };

                    // both sides must be expanded to be merged
                    match (ours.child_mut(&name), their_entry.pointer) {
                        (Some(our_tree), EntryPointer::Resolved(their_tree)) => {
                            if Self::merge_tree(our_tree, *their_tree, &entry_path, outcome) {
                                changed = true;
                            }
                        }
                        _ => outcome.conflicts.push(conflict),
                    }
                }
                (false, false) if our_entry == &their_entry => {}
                _ => outcome.conflicts.push(MergeConflict {
                    path: entry_path,
                    ours: our_entry.into(),
                    theirs: (&their_entry).into(),
                }),
            }
        }

        if changed {
            ours.invalidate();
        }
        changed
    }

    /// Drop subtrees that ended up without entries; the root is kept
    pub fn regularize(&mut self) {
        Self::prune_tree(&mut self.root);
    }

    /// Returns true when anything below `tree` was dropped, in which case
    /// `tree` is left stale
    fn prune_tree(tree: &mut Tree) -> bool {
        let mut changed = false;
        let mut empty = Vec::new();

        for (name, entry) in tree.entries_mut() {
            if let Some(child) = entry.as_tree_mut() {
                if Self::prune_tree(child) {
                    changed = true;
                }
                if child.is_empty() {
                    empty.push(name.clone());
                }
            }
        }

        for name in empty {
            tree.remove(&name);
            changed = true;
        }

        if changed {
            tree.invalidate();
        }
        changed
    }

    /// Prune empty directories along `path`, deepest first
    fn prune_path(&mut self, path: &str) {
        let mut path = path.trim_matches('/').to_string();

        while !path.is_empty() {
            if !self.find(&path).is_some_and(Tree::is_empty) {
                break;
            }

            let (parent, name) = split_parent(&path);
            let parent = parent.to_string();
            if let Some(parent_tree) = self.find_mut(&parent) {
                parent_tree.remove(name);
            }
            path = parent;
        }
    }

    /// Every leaf below the root as sorted `(path, oid, mode)` triples
    pub fn files(&self) -> Vec<FileEntry> {
        let mut files = Vec::new();

        self.walk(WalkOrder::PreOrder, &mut |path, tree| {
            for (name, entry) in tree.entries() {
                if entry.is_tree() {
                    continue;
                }
                files.push(FileEntry {
                    path: join_path(path, name),
                    oid: entry.oid(),
                    mode: entry.mode,
                });
            }
        });

        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    /// Hash every dirty tree bottom-up, handing each one to `persist`
    ///
    /// Trees with a cached hash are left alone together with their subtrees.
    /// Returns the root hash.
    pub fn finalize<F, E>(&mut self, persist: &mut F) -> Result<ObjectId, E>
    where
        F: FnMut(&str, &Tree) -> Result<(), E>,
    {
        Self::finalize_tree(&mut self.root, "", persist)?;
        Ok(self.root.oid())
    }

    fn finalize_tree<F, E>(tree: &mut Tree, path: &str, persist: &mut F) -> Result<(), E>
    where
        F: FnMut(&str, &Tree) -> Result<(), E>,
    {
        if !tree.is_dirty() {
            return Ok(());
        }

        for (name, entry) in tree.entries_mut() {
            if let Some(child) = entry.as_tree_mut() {
                Self::finalize_tree(child, &join_path(path, name), persist)?;
            }
        }

        tree.refresh_oid();
        persist(path, tree)
    }
}
