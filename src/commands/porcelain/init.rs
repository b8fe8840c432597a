use crate::areas::refs::DEFAULT_BRANCH;
use crate::areas::repository::Repository;
use anyhow::Context;
use std::fs;
use std::io::Write;

impl Repository {
    pub fn init(&mut self) -> anyhow::Result<()> {
        fs::create_dir_all(self.database().objects_path())
            .context("Failed to create .git/objects directory")?;

        fs::create_dir_all(self.refs().heads_path())
            .context("Failed to create .git/refs/heads directory")?;

        let reinitialized = self.refs().head_path().exists();
        if !reinitialized {
            self.refs()
                .set_head(DEFAULT_BRANCH)
                .context("Failed to create initial HEAD reference")?;
        }

        let git_dir = self.git_dir().canonicalize()?;
        writeln!(
            self.writer(),
            "{} Git repository in {}/",
            if reinitialized { "Reinitialized existing" } else { "Initialized empty" },
            git_dir.display()
        )?;

        Ok(())
    }
}
