use crate::areas::repository::Repository;
use crate::commands::plumbing::update_index::normalize_path;

impl Repository {
    pub fn add(&mut self, paths: &[String]) -> anyhow::Result<()> {
        self.load_index()?;

        // expand every pathspec before staging anything
        let files = paths
            .iter()
            .map(|path| {
                let path = normalize_path(path);
                let root = (!path.is_empty()).then_some(path.as_str());
                self.workspace().list_files(root)
            })
            .collect::<anyhow::Result<Vec<_>>>()?
            .into_iter()
            .flatten();

        for file in files {
            self.stage_file(&file)?;
        }

        self.index_mut().write_updates()?;

        Ok(())
    }
}
