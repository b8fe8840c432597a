use crate::areas::repository::Repository;
use crate::commands::plumbing::update_index::normalize_path;
use anyhow::Context;
use std::io::Write;

impl Repository {
    /// Unstage paths, deleting them from the working tree unless `cached`
    pub fn rm(&mut self, paths: &[String], recursive: bool, cached: bool) -> anyhow::Result<()> {
        self.load_index()?;

        // validate every pathspec before removing anything
        let mut removals = Vec::new();
        for path in paths.iter().map(|path| normalize_path(path)) {
            if self.index().is_tracked_file(&path) {
                removals.push(vec![path]);
            } else if self.index().is_tracked_dir(&path) {
                if !recursive {
                    anyhow::bail!("not removing '{path}' recursively without -r");
                }
                let mut files = self
                    .index()
                    .entries_under(&path)
                    .map(|entry| entry.name.clone())
                    .collect::<Vec<_>>();
                files.dedup();
                removals.push(files);
            } else {
                anyhow::bail!("pathspec '{path}' did not match any files");
            }
        }

        for path in removals.into_iter().flatten() {
            self.index_mut().remove(&path);

            let full_path = self.path().join(&path);
            if !cached && std::fs::symlink_metadata(&full_path).is_ok() {
                std::fs::remove_file(&full_path)
                    .with_context(|| format!("failed to remove '{path}'"))?;
            }

            writeln!(self.writer(), "rm '{path}'")?;
        }

        self.index_mut().write_updates()?;

        Ok(())
    }
}
