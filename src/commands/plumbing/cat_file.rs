use crate::areas::repository::Repository;
use crate::artifacts::objects::object::ObjectBox;
use std::io::Write;

/// What `cat-file` should print about an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatFileMode {
    /// `-t`
    Type,
    /// `-s`
    Size,
    /// `-p`
    Pretty,
}

impl Repository {
    pub fn cat_file(&mut self, revision: &str, mode: CatFileMode) -> anyhow::Result<()> {
        self.ensure_initialized()?;
        let oid = self.resolve_revision(revision)?;
        let object = self.database().load(&oid)?;

        match mode {
            CatFileMode::Type => writeln!(self.writer(), "{}", object.kind())?,
            CatFileMode::Size => writeln!(self.writer(), "{}", object.size())?,
            CatFileMode::Pretty => match ObjectBox::try_from(object.clone())? {
                ObjectBox::Tree(tree) => {
                    for (name, entry) in tree.sorted_entries() {
                        writeln!(
                            self.writer(),
                            "{} {} {}\t{}",
                            entry.mode.as_str(),
                            entry.mode.object_type_name(),
                            entry.oid(),
                            name
                        )?;
                    }
                }
                _ => self.writer().write_all(object.content())?,
            },
        }

        Ok(())
    }
}
