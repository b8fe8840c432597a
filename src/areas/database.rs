//! Object database
//!
//! Loose objects live under `objects/<first two hex digits>/<remaining 38>`,
//! zlib-compressed. Writes go through a temporary file that is renamed into
//! place, and an object that already exists is never rewritten.

use crate::artifacts::diff::tree_diff::ChangeSet;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::{GitObject, Object, ObjectBox};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::{EntryPointer, Tree};
use crate::artifacts::objects::tree_fs::{TreeFs, join_path};
use crate::errors::{Error, Result};
use fake::rand;
use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Bytes shown per hex dump line
const DUMP_WIDTH: usize = 16;

#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
}

impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database { path }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    fn object_path(&self, object_id: &ObjectId) -> PathBuf {
        self.path.join(object_id.to_path())
    }

    pub fn exists(&self, object_id: &ObjectId) -> bool {
        self.object_path(object_id).is_file()
    }

    /// Persist a typed object, returning its id
    pub fn store(&self, object: &impl Object) -> Result<ObjectId> {
        let object = object.to_git_object();
        self.put(&object)?;
        Ok(object.hash())
    }

    /// Persist a raw object
    ///
    /// Returns `false` without touching the disk when the object is already
    /// stored.
    pub fn put(&self, object: &GitObject) -> Result<bool> {
        let object_id = object.hash();
        let object_path = self.object_path(&object_id);

        if object_path.exists() {
            tracing::trace!(oid = %object_id, kind = %object.kind(), "object already stored");
            return Ok(false);
        }

        let object_dir = object_path
            .parent()
            .ok_or_else(|| Error::corrupted_object(format!("invalid object path for {object_id}")))?;
        std::fs::create_dir_all(object_dir)?;

        let mut content = Vec::new();
        object.serialize(&mut content)?;
        self.write_object(object_dir, &object_path, &content)?;

        tracing::debug!(oid = %object_id, kind = %object.kind(), size = object.size(), "stored object");
        Ok(true)
    }

    fn write_object(&self, object_dir: &Path, object_path: &Path, content: &[u8]) -> Result<()> {
        let temp_object_path = object_dir.join(Self::generate_temp_name());

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_object_path)?;
        file.write_all(content)?;
        drop(file);

        // rename the temp file to the object file to make it atomic
        std::fs::rename(&temp_object_path, object_path)?;

        Ok(())
    }

    fn generate_temp_name() -> String {
        format!("tmp-obj-{}", rand::random::<u32>())
    }

    /// Read and verify a raw object
    pub fn load(&self, object_id: &ObjectId) -> Result<GitObject> {
        let object_path = self.object_path(object_id);

        let compressed = match std::fs::read(&object_path) {
            Ok(compressed) => compressed,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ObjectNotFound(*object_id));
            }
            Err(err) => return Err(err.into()),
        };

        let object = GitObject::deserialize(compressed.as_slice(), Some(object_id))?;
        tracing::trace!(oid = %object_id, kind = %object.kind(), "loaded object");

        Ok(object)
    }

    pub fn parse_object(&self, object_id: &ObjectId) -> Result<ObjectBox> {
        ObjectBox::try_from(self.load(object_id)?)
    }

    pub fn object_type(&self, object_id: &ObjectId) -> Result<ObjectType> {
        Ok(self.load(object_id)?.kind())
    }

    pub fn load_tree(&self, object_id: &ObjectId) -> Result<Tree> {
        match self.parse_object(object_id)? {
            ObjectBox::Tree(tree) => Ok(*tree),
            other => Err(Self::unexpected_kind(object_id, ObjectType::Tree, other.object_type())),
        }
    }

    pub fn load_commit(&self, object_id: &ObjectId) -> Result<Commit> {
        match self.parse_object(object_id)? {
            ObjectBox::Commit(commit) => Ok(*commit),
            other => Err(Self::unexpected_kind(object_id, ObjectType::Commit, other.object_type())),
        }
    }

    fn unexpected_kind(object_id: &ObjectId, expected: ObjectType, found: ObjectType) -> Error {
        Error::corrupted_object(format!("{object_id} is a {found}, not a {expected}"))
    }

    /// Tree id of a tree or of the tree recorded in a commit
    pub fn peel_to_tree(&self, object_id: &ObjectId) -> Result<ObjectId> {
        match self.parse_object(object_id)? {
            ObjectBox::Tree(_) => Ok(*object_id),
            ObjectBox::Commit(commit) => Ok(*commit.tree_oid()),
            other => Err(Self::unexpected_kind(object_id, ObjectType::Tree, other.object_type())),
        }
    }

    /// Load a tree and every tree below it
    ///
    /// Subtrees are expanded level by level. Blob and gitlink entries stay
    /// unresolved.
    pub fn load_tree_fs(&self, object_id: &ObjectId) -> Result<TreeFs> {
        let root_oid = self.peel_to_tree(object_id)?;
        let mut tree_fs = TreeFs::new(self.load_tree(&root_oid)?);

        let mut pending = VecDeque::from([String::new()]);
        let mut loaded = 1;
        while let Some(path) = pending.pop_front() {
            let Some(tree) = tree_fs.find_mut(&path) else {
                continue;
            };

            for (name, entry) in tree.entries_mut() {
                if !entry.is_tree() {
                    continue;
                }
                if let EntryPointer::Unresolved(oid) = entry.pointer {
                    entry.pointer = EntryPointer::Resolved(Box::new(self.load_tree(&oid)?));
                    loaded += 1;
                }
                pending.push_back(join_path(&path, name));
            }
        }

        tracing::debug!(oid = %root_oid, trees = loaded, "expanded tree");
        Ok(tree_fs)
    }

    /// File-level changes between two trees (or commits); a missing side
    /// counts as the empty tree
    pub fn tree_diff(&self, old: Option<&ObjectId>, new: Option<&ObjectId>) -> Result<ChangeSet> {
        let flatten = |oid: Option<&ObjectId>| -> Result<Vec<_>> {
            match oid {
                Some(oid) => Ok(self.load_tree_fs(oid)?.files()),
                None => Ok(Vec::new()),
            }
        };

        Ok(ChangeSet::compare(&flatten(old)?, &flatten(new)?))
    }

    /// Write a hex dump of the inflated object (header included) to `sink`
    pub fn dump<W: Write>(&self, object_id: &ObjectId, sink: &mut W) -> Result<()> {
        let object = self.load(object_id)?;
        write_hex_dump(&object.to_raw(), sink)
    }

    /// Every stored object whose hex id starts with `prefix`
    pub fn find_objects_by_prefix(&self, prefix: &str) -> Result<Vec<ObjectId>> {
        let prefix = prefix.to_ascii_lowercase();
        let mut matches = Vec::new();
        if !prefix.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            return Ok(matches);
        }

        let dirs = if prefix.len() >= 2 {
            vec![prefix[..2].to_string()]
        } else {
            (0..=255u8).map(|i| format!("{i:02x}")).collect()
        };

        for dir_name in dirs {
            let dir_path = self.path.join(&dir_name);
            if !dir_path.is_dir() {
                continue;
            }

            for entry in std::fs::read_dir(&dir_path)? {
                let file_name = entry?.file_name();
                let full_oid = format!("{}{}", dir_name, file_name.to_string_lossy());

                if full_oid.starts_with(&prefix)
                    && let Ok(oid) = ObjectId::try_parse(&full_oid)
                {
                    matches.push(oid);
                }
            }
        }

        matches.sort();
        Ok(matches)
    }
}

/// `hexdump -C` style listing: offset, two groups of eight bytes, ASCII
pub fn write_hex_dump<W: Write>(data: &[u8], sink: &mut W) -> Result<()> {
    for (line, chunk) in data.chunks(DUMP_WIDTH).enumerate() {
        let mut hex = String::with_capacity(DUMP_WIDTH * 3 + 1);
        for index in 0..DUMP_WIDTH {
            if index == DUMP_WIDTH / 2 {
                hex.push(' ');
            }
            match chunk.get(index) {
                Some(byte) => hex.push_str(&format!("{byte:02x} ")),
                None => hex.push_str("   "),
            }
        }

        let ascii = chunk
            .iter()
            .map(|&byte| {
                if byte.is_ascii_graphic() || byte == b' ' {
                    byte as char
                } else {
                    '.'
                }
            })
            .collect::<String>();

        writeln!(sink, "{:08x}  {hex} |{ascii}|", line * DUMP_WIDTH)?;
    }
    writeln!(sink, "{:08x}", data.len())?;

    Ok(())
}
