use crate::areas::repository::Repository;
use crate::artifacts::objects::tree::Tree;
use crate::artifacts::objects::tree_fs::join_path;
use std::io::Write;

impl Repository {
    pub fn ls_tree(&mut self, revision: &str, recursive: bool) -> anyhow::Result<()> {
        self.ensure_initialized()?;
        let oid = self.resolve_tree(revision)?;

        if recursive {
            let tree_fs = self.database().load_tree_fs(&oid)?;
            self.print_tree(tree_fs.root(), "", true)
        } else {
            let tree = self.database().load_tree(&oid)?;
            self.print_tree(&tree, "", false)
        }
    }

    fn print_tree(&self, tree: &Tree, prefix: &str, recursive: bool) -> anyhow::Result<()> {
        for (name, entry) in tree.sorted_entries() {
            let path = join_path(prefix, name);

            if recursive && let Some(subtree) = entry.as_tree() {
                self.print_tree(subtree, &path, true)?;
                continue;
            }

            writeln!(
                self.writer(),
                "{} {} {}\t{}",
                entry.mode.as_str(),
                entry.mode.object_type_name(),
                entry.oid(),
                path
            )?;
        }

        Ok(())
    }
}
