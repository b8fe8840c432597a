use crate::artifacts::index::index_entry::EntryMetadata;
use crate::artifacts::objects::blob::Blob;
use anyhow::Context;
use bytes::Bytes;
use std::path::{Component, Path};
use walkdir::WalkDir;

const IGNORED_PATHS: [&str; 3] = [".git", ".", ".."];

/// Working tree scanner
///
/// Paths handed out and accepted here are relative to the work tree and use
/// `/` as separator, the way the index stores them.
#[derive(Debug)]
pub struct Workspace {
    path: Box<Path>,
}

impl Workspace {
    pub fn new(path: Box<Path>) -> Self {
        Workspace { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parse_blob(&self, file_path: &str) -> anyhow::Result<Blob> {
        Ok(Blob::new(self.read_file(file_path)?))
    }

    /// Every file below `root` (a file or directory, relative to the work
    /// tree), sorted by path
    pub fn list_files(&self, root: Option<&str>) -> anyhow::Result<Vec<String>> {
        let root_path = match root {
            Some(root) => self.path.join(root),
            None => self.path.to_path_buf(),
        };

        let metadata = std::fs::symlink_metadata(&root_path)
            .with_context(|| format!("pathspec '{}' did not match any files", root.unwrap_or(".")))?;

        if !metadata.is_dir() {
            return Ok(self.relative_path(&root_path).into_iter().collect());
        }

        let mut files = WalkDir::new(&root_path)
            .into_iter()
            .filter_entry(|entry| !Self::is_ignored(entry.path()))
            .filter_map(|entry| entry.ok())
            .filter(|entry| !entry.file_type().is_dir())
            .filter_map(|entry| self.relative_path(entry.path()))
            .collect::<Vec<_>>();
        files.sort();

        Ok(files)
    }

    fn is_ignored(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| IGNORED_PATHS.contains(&name))
    }

    fn relative_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.path).ok()?;
        let segments = relative
            .components()
            .map(|component| match component {
                Component::Normal(name) => name.to_str(),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;

        (!segments.is_empty()).then(|| segments.join("/"))
    }

    /// File content, or the link target for a symbolic link
    pub fn read_file(&self, file_path: &str) -> anyhow::Result<Bytes> {
        let full_path = self.path.join(file_path);
        let metadata = std::fs::symlink_metadata(&full_path)
            .with_context(|| format!("failed to stat '{file_path}'"))?;

        if metadata.file_type().is_symlink() {
            let target = std::fs::read_link(&full_path)?;
            return Ok(Bytes::from(target.to_string_lossy().into_owned()));
        }

        let content = std::fs::read(&full_path)
            .with_context(|| format!("failed to read '{file_path}'"))?;
        Ok(Bytes::from(content))
    }

    pub fn stat_file(&self, file_path: &str) -> anyhow::Result<EntryMetadata> {
        let full_path = self.path.join(file_path);
        let metadata = std::fs::symlink_metadata(&full_path)
            .with_context(|| format!("failed to stat '{file_path}'"))?;

        Ok((full_path.as_path(), metadata).try_into()?)
    }

    pub fn exists(&self, file_path: &str) -> bool {
        std::fs::symlink_metadata(self.path.join(file_path)).is_ok()
    }
}
