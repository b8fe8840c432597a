use crate::areas::repository::Repository;

impl Repository {
    /// Replace the index with a tree, or add the tree below `prefix`
    pub fn read_tree(&mut self, revision: &str, prefix: Option<&str>) -> anyhow::Result<()> {
        self.load_index()?;
        let oid = self.resolve_tree(revision)?;

        let (index, database) = self.staging();
        let outcome = match prefix {
            Some(prefix) => index.read_tree(database, &oid, prefix, false)?,
            None => index.read_tree(database, &oid, "", true)?,
        };
        tracing::debug!(tree = %oid, trees_written = outcome.trees_written, "read tree");

        index.write_updates()?;

        Ok(())
    }
}
