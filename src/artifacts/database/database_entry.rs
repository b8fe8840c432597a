use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree_fs::FileEntry;
use derive_new::new;

#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct DatabaseEntry {
    pub oid: ObjectId,
    pub mode: EntryMode,
}

impl From<&FileEntry> for DatabaseEntry {
    fn from(file: &FileEntry) -> Self {
        DatabaseEntry::new(file.oid, file.mode)
    }
}
