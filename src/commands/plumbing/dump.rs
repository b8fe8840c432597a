use crate::areas::repository::Repository;

/// Argument naming the index instead of an object
pub const INDEX_TARGET: &str = "index";

impl Repository {
    /// Hex dump of an object, or the decoded tables of the index
    pub fn dump(&mut self, target: &str) -> anyhow::Result<()> {
        if target == INDEX_TARGET {
            self.load_index()?;
            let mut writer = self.writer();
            self.index().dump(&mut *writer)?;
            return Ok(());
        }

        self.ensure_initialized()?;
        let oid = self.resolve_revision(target)?;
        let mut writer = self.writer();
        self.database().dump(&oid, &mut *writer)?;

        Ok(())
    }
}
