use crate::areas::repository::Repository;
use crate::artifacts::diff::tree_diff::TreeChangeType;
use std::io::Write;

impl Repository {
    pub fn commit(&mut self, message: &str) -> anyhow::Result<()> {
        self.load_index()?;

        let tree_oid = self.write_index_tree(None)?;
        let parent = self.refs().read_head()?;

        let (commit_oid, commit) = self.write_commit(tree_oid, parent.into_iter().collect(), message)?;
        self.refs().update_head(&commit_oid)?;

        let branch = self
            .refs()
            .current_branch()?
            .unwrap_or_else(|| "detached HEAD".to_string());
        let is_root = if parent.is_none() { " (root-commit)" } else { "" };
        writeln!(
            self.writer(),
            "[{branch}{is_root} {}] {}",
            commit_oid.to_short_oid(),
            commit.short_message()
        )?;

        let parent_tree = parent
            .map(|parent| self.database().peel_to_tree(&parent))
            .transpose()?;
        let changes = self.database().tree_diff(parent_tree.as_ref(), Some(&tree_oid))?;
        for (path, change) in changes.iter() {
            match change {
                TreeChangeType::Added(entry) => {
                    writeln!(self.writer(), " create mode {} {path}", entry.mode.as_str())?
                }
                TreeChangeType::Deleted(entry) => {
                    writeln!(self.writer(), " delete mode {} {path}", entry.mode.as_str())?
                }
                TreeChangeType::Modified { .. } => {}
            }
        }

        Ok(())
    }
}
