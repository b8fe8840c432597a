use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::refs::Refs;
use crate::areas::workspace::Workspace;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::revision::Revision;
use crate::config::Config;
use crate::errors::Error;
use std::cell::{RefCell, RefMut};
use std::path::Path;

/// Everything a command needs, built once per invocation
pub struct Repository {
    config: Config,
    writer: RefCell<Box<dyn std::io::Write>>,
    index: Index,
    database: Database,
    workspace: Workspace,
    refs: Refs,
}

impl Repository {
    /// Assemble the areas described by `config`
    ///
    /// Nothing is read from disk yet; see [`Repository::load_index`].
    pub fn new(config: Config, writer: Box<dyn std::io::Write>) -> Self {
        let index = Index::new(config.index_file().into());
        let database = Database::new(config.objects_dir().into_boxed_path());
        let workspace = Workspace::new(config.work_tree().into());
        let refs = Refs::new(config.git_dir().into());

        Repository {
            config,
            writer: RefCell::new(writer),
            index,
            database,
            workspace,
            refs,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn path(&self) -> &Path {
        self.config.work_tree()
    }

    pub fn git_dir(&self) -> &Path {
        self.config.git_dir()
    }

    pub fn writer(&'_ self) -> RefMut<'_, Box<dyn std::io::Write>> {
        self.writer.borrow_mut()
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut Index {
        &mut self.index
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    /// The index together with the object store, for operations that move
    /// content between the two
    pub fn staging(&mut self) -> (&mut Index, &Database) {
        (&mut self.index, &self.database)
    }

    /// Fail unless the object directory exists
    pub fn ensure_initialized(&self) -> anyhow::Result<()> {
        if !self.database.objects_path().is_dir() {
            return Err(Error::RepositoryNotInitialized(self.git_dir().to_path_buf()).into());
        }
        Ok(())
    }

    /// Check the repository exists and read the index from disk
    pub fn load_index(&mut self) -> anyhow::Result<()> {
        self.ensure_initialized()?;
        self.index.rehydrate()?;
        Ok(())
    }

    /// Object named by a revision expression (`HEAD`, `master~2`, `d670460`)
    pub fn resolve_revision(&self, revision: &str) -> anyhow::Result<ObjectId> {
        Revision::try_parse(revision)?.resolve(&self.refs, &self.database)
    }

    /// Tree named by a revision expression, peeling commits
    pub fn resolve_tree(&self, revision: &str) -> anyhow::Result<ObjectId> {
        let oid = self.resolve_revision(revision)?;
        Ok(self.database.peel_to_tree(&oid)?)
    }
}
