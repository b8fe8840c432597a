use crate::areas::repository::Repository;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::tree_diff::DiffFilter;
use crate::artifacts::objects::object_id::ObjectId;
use std::io::Write;

const NULL_MODE: &str = "000000";

impl Repository {
    /// Raw, recursive listing of the file changes between two trees
    ///
    /// Each line reads `:<old mode> <new mode> <old oid> <new oid> <status>\t<path>`
    /// with zeros standing in for the missing side.
    pub fn diff_tree(&mut self, old: &str, new: &str, filter: Option<&str>) -> anyhow::Result<()> {
        self.ensure_initialized()?;

        let filter = match filter {
            Some(filter) => DiffFilter::try_parse(filter)
                .ok_or_else(|| anyhow::anyhow!("invalid --diff-filter value '{filter}'"))?,
            None => DiffFilter::all(),
        };
        let old = self.resolve_tree(old)?;
        let new = self.resolve_tree(new)?;

        let changes = self.database().tree_diff(Some(&old), Some(&new))?;
        for (path, change) in changes.filtered(filter) {
            let (old_mode, old_oid) = Self::raw_side(change.old_entry());
            let (new_mode, new_oid) = Self::raw_side(change.new_entry());

            writeln!(
                self.writer(),
                ":{old_mode} {new_mode} {old_oid} {new_oid} {}\t{path}",
                change.status_char()
            )?;
        }

        Ok(())
    }

    fn raw_side(entry: Option<&DatabaseEntry>) -> (&'static str, ObjectId) {
        match entry {
            Some(entry) => (entry.mode.as_str(), entry.oid),
            None => (NULL_MODE, ObjectId::ZERO),
        }
    }
}
