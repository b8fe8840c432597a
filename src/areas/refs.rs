//! Git references
//!
//! References are human-readable names pointing to commits. A reference file
//! holds either a 40-character hash (direct reference) or `ref: <path>`
//! (symbolic reference, e.g. HEAD -> refs/heads/master).
//!
//! Only HEAD and the branch it points at are ever written here; branch
//! management itself is out of scope.

use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use file_guard::Lock;
use std::io::Write;
use std::ops::DerefMut;
use std::path::{Path, PathBuf};

/// Regex pattern for parsing symbolic references
const SYMREF_REGEX: &str = r"^ref: (.+)$";

/// Name of the HEAD reference
pub const HEAD_REF_NAME: &str = "HEAD";

/// Branch HEAD points at in a fresh repository
pub const DEFAULT_BRANCH: &str = "master";

const HEADS_PREFIX: &str = "refs/heads/";

#[derive(Debug, Clone, PartialEq, Eq)]
enum SymRefOrOid {
    /// Symbolic reference pointing to another ref, relative to the git dir
    SymRef(String),
    Oid(ObjectId),
}

impl SymRefOrOid {
    fn read(path: &Path) -> anyhow::Result<Option<SymRefOrOid>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read ref file at {:?}", path))?;
        let content = content.trim();

        if content.is_empty() {
            return Ok(None);
        }

        let symref_match = regex::Regex::new(SYMREF_REGEX)?.captures(content);
        if let Some(symref_match) = symref_match {
            Ok(Some(SymRefOrOid::SymRef(symref_match[1].to_string())))
        } else {
            let oid = ObjectId::try_parse(content)
                .with_context(|| format!("invalid reference at {:?}", path))?;
            Ok(Some(SymRefOrOid::Oid(oid)))
        }
    }
}

/// Reference store rooted at the git directory
#[derive(Debug)]
pub struct Refs {
    path: Box<Path>,
}

impl Refs {
    pub fn new(path: Box<Path>) -> Self {
        Refs { path }
    }

    pub fn head_path(&self) -> PathBuf {
        self.path.join(HEAD_REF_NAME)
    }

    pub fn heads_path(&self) -> PathBuf {
        self.path.join("refs").join("heads")
    }

    /// Point HEAD at `branch` without creating the branch itself
    pub fn set_head(&self, branch: &str) -> anyhow::Result<()> {
        self.write_ref_file(&self.head_path(), &format!("ref: {HEADS_PREFIX}{branch}\n"))
    }

    /// Commit HEAD resolves to; `None` before the first commit
    pub fn read_head(&self) -> anyhow::Result<Option<ObjectId>> {
        self.read_symref(&self.head_path())
    }

    /// Last reference in the HEAD chain, e.g. `refs/heads/master`, or `HEAD`
    /// itself when detached
    pub fn current_ref(&self) -> anyhow::Result<String> {
        let mut current = HEAD_REF_NAME.to_string();

        while let Some(SymRefOrOid::SymRef(target)) = SymRefOrOid::read(&self.path.join(&current))? {
            current = target;
        }

        Ok(current)
    }

    /// Branch HEAD points at, or `None` when detached
    pub fn current_branch(&self) -> anyhow::Result<Option<String>> {
        Ok(self
            .current_ref()?
            .strip_prefix(HEADS_PREFIX)
            .map(str::to_string))
    }

    /// Move whatever HEAD resolves to onto `oid`
    ///
    /// Follows symbolic references so that committing on a branch advances
    /// the branch, not HEAD.
    pub fn update_head(&self, oid: &ObjectId) -> anyhow::Result<()> {
        let target = self.path.join(self.current_ref()?);
        self.write_ref_file(&target, &format!("{oid}\n"))
    }

    /// Resolve a branch name (`master`, `refs/heads/master`) or `HEAD`
    pub fn read_ref(&self, name: &str) -> anyhow::Result<Option<ObjectId>> {
        let candidates = [
            self.path.join(name),
            self.path.join("refs").join(name),
            self.heads_path().join(name),
        ];

        match candidates.iter().find(|path| path.is_file()) {
            Some(path) => self.read_symref(path),
            None => Ok(None),
        }
    }

    fn read_symref(&self, path: &Path) -> anyhow::Result<Option<ObjectId>> {
        match SymRefOrOid::read(path)? {
            Some(SymRefOrOid::SymRef(target)) => self.read_symref(&self.path.join(target)),
            Some(SymRefOrOid::Oid(oid)) => Ok(Some(oid)),
            None => Ok(None),
        }
    }

    fn write_ref_file(&self, path: &Path, raw_ref: &str) -> anyhow::Result<()> {
        let parent = path
            .parent()
            .with_context(|| format!("ref file at {:?} has no parent directory", path))?;
        std::fs::create_dir_all(parent)?;

        let mut ref_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("failed to open ref file at {:?}", path))?;
        let mut lock = file_guard::lock(&mut ref_file, Lock::Exclusive, 0, 1)?;
        lock.deref_mut().write_all(raw_ref.as_bytes())?;

        tracing::debug!(path = ?path, "updated ref");
        Ok(())
    }
}
