use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::tree_fs::FileEntry;
use bitflags::bitflags;
use std::cmp::Ordering;
use std::collections::BTreeMap;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct DiffFilter: u32 {
        const ADDED = 0b0001;
        const DELETED = 0b0010;
        const MODIFIED = 0b0100;
    }
}

impl DiffFilter {
    pub fn try_parse(s: &str) -> Option<Self> {
        let mut filter = Self::empty();

        for c in s.chars() {
            match c {
                'A' => filter |= Self::ADDED,
                'D' => filter |= Self::DELETED,
                'M' => filter |= Self::MODIFIED,
                _ => return None,
            }
        }

        Some(filter)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreeChangeType {
    Added(DatabaseEntry),
    Deleted(DatabaseEntry),
    Modified {
        old: DatabaseEntry,
        new: DatabaseEntry,
    },
}

impl TreeChangeType {
    pub fn from_entries(old: Option<DatabaseEntry>, new: Option<DatabaseEntry>) -> Option<Self> {
        match (old, new) {
            (None, Some(new)) => Some(TreeChangeType::Added(new)),
            (Some(old), None) => Some(TreeChangeType::Deleted(old)),
            (Some(old), Some(new)) if old != new => Some(TreeChangeType::Modified { old, new }),
            _ => None, // No change or both are None
        }
    }

    pub fn matches_filter(&self, filter: DiffFilter) -> bool {
        match self {
            TreeChangeType::Added(_) => filter.contains(DiffFilter::ADDED),
            TreeChangeType::Deleted(_) => filter.contains(DiffFilter::DELETED),
            TreeChangeType::Modified { .. } => filter.contains(DiffFilter::MODIFIED),
        }
    }

    pub fn old_entry(&self) -> Option<&DatabaseEntry> {
        match self {
            TreeChangeType::Deleted(entry) => Some(entry),
            TreeChangeType::Modified { old, .. } => Some(old),
            TreeChangeType::Added(_) => None,
        }
    }

    pub fn new_entry(&self) -> Option<&DatabaseEntry> {
        match self {
            TreeChangeType::Added(entry) => Some(entry),
            TreeChangeType::Modified { new, .. } => Some(new),
            TreeChangeType::Deleted(_) => None,
        }
    }

    pub fn status_char(&self) -> char {
        match self {
            TreeChangeType::Added(_) => 'A',
            TreeChangeType::Deleted(_) => 'D',
            TreeChangeType::Modified { .. } => 'M',
        }
    }
}

/// Per-path changes between two flattened trees, keyed by path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: BTreeMap<String, TreeChangeType>,
}

impl ChangeSet {
    /// Classify every path of two path-sorted file lists in one pass
    pub fn compare(old: &[FileEntry], new: &[FileEntry]) -> Self {
        let mut changes = BTreeMap::new();
        let mut old_files = old.iter().peekable();
        let mut new_files = new.iter().peekable();

        loop {
            let order = match (old_files.peek(), new_files.peek()) {
                (None, None) => break,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(old), Some(new)) => old.path.cmp(&new.path),
            };

            let (old_file, new_file) = match order {
                Ordering::Less => (old_files.next(), None),
                Ordering::Greater => (None, new_files.next()),
                Ordering::Equal => (old_files.next(), new_files.next()),
            };
            let Some(path) = old_file.or(new_file).map(|file| file.path.clone()) else {
                break;
            };

            if let Some(change) = TreeChangeType::from_entries(
                old_file.map(DatabaseEntry::from),
                new_file.map(DatabaseEntry::from),
            ) {
                changes.insert(path, change);
            }
        }

        ChangeSet { changes }
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&TreeChangeType> {
        self.changes.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TreeChangeType)> {
        self.changes.iter()
    }

    /// Changes whose kind is selected by `filter`
    pub fn filtered(&self, filter: DiffFilter) -> impl Iterator<Item = (&String, &TreeChangeType)> {
        self.iter().filter(move |(_, change)| change.matches_filter(filter))
    }

    pub fn created(&self) -> impl Iterator<Item = (&String, &DatabaseEntry)> {
        self.iter().filter_map(|(path, change)| match change {
            TreeChangeType::Added(entry) => Some((path, entry)),
            _ => None,
        })
    }

    pub fn removed(&self) -> impl Iterator<Item = (&String, &DatabaseEntry)> {
        self.iter().filter_map(|(path, change)| match change {
            TreeChangeType::Deleted(entry) => Some((path, entry)),
            _ => None,
        })
    }

    pub fn modified(&self) -> impl Iterator<Item = (&String, &DatabaseEntry, &DatabaseEntry)> {
        self.iter().filter_map(|(path, change)| match change {
            TreeChangeType::Modified { old, new } => Some((path, old, new)),
            _ => None,
        })
    }
}
