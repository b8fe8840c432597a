use crate::areas::repository::Repository;
use crate::artifacts::index::index_entry::Stage;
use crate::artifacts::objects::object_id::ObjectId;
use std::io::Write;

impl Repository {
    pub fn write_tree(&mut self, prefix: Option<&str>) -> anyhow::Result<()> {
        self.load_index()?;
        let oid = self.write_index_tree(prefix)?;

        writeln!(self.writer(), "{oid}")?;

        Ok(())
    }

    /// Store the trees for the loaded index and save the refreshed cache
    pub(crate) fn write_index_tree(&mut self, prefix: Option<&str>) -> anyhow::Result<ObjectId> {
        if self.index().has_conflicts() {
            let unmerged = self
                .index()
                .entries()
                .find(|entry| entry.stage != Stage::Merged)
                .map(|entry| entry.name.clone())
                .unwrap_or_default();
            anyhow::bail!("{unmerged}: unmerged (conflicted) entries cannot be written to a tree");
        }

        let (index, database) = self.staging();
        let oid = match prefix.map(str::trim).filter(|prefix| !prefix.is_empty()) {
            Some(prefix) => index
                .write_tree_at(database, prefix)?
                .ok_or_else(|| anyhow::anyhow!("prefix {prefix} not found"))?,
            None => index.write_tree(database)?.oid,
        };

        // the cache tree now carries the hashes just computed
        index.write_updates()?;

        Ok(oid)
    }
}
