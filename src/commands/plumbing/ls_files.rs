use crate::areas::repository::Repository;
use std::io::Write;

impl Repository {
    pub fn ls_files(&mut self, stage: bool, debug: bool) -> anyhow::Result<()> {
        self.load_index()?;

        if debug {
            let mut writer = self.writer();
            self.index().dump(&mut *writer)?;
            return Ok(());
        }

        let mut previous: Option<&str> = None;
        for entry in self.index().entries() {
            if stage {
                writeln!(
                    self.writer(),
                    "{} {} {}\t{}",
                    entry.mode().as_str(),
                    entry.oid,
                    entry.stage as u8,
                    entry.name
                )?;
            } else if previous != Some(entry.name.as_str()) {
                // unmerged paths are listed once
                writeln!(self.writer(), "{}", entry.name)?;
            }
            previous = Some(entry.name.as_str());
        }

        Ok(())
    }
}
