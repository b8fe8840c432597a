use crate::areas::repository::Repository;
use std::io::Write;

impl Repository {
    pub fn commit_tree(&mut self, tree: &str, parents: &[String], message: &str) -> anyhow::Result<()> {
        self.ensure_initialized()?;

        let tree_oid = self.resolve_tree(tree)?;
        let parents = parents
            .iter()
            .map(|parent| self.resolve_revision(parent))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let (oid, _) = self.write_commit(tree_oid, parents, message)?;
        writeln!(self.writer(), "{oid}")?;

        Ok(())
    }
}
