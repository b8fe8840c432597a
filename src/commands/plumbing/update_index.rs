use crate::areas::repository::Repository;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;

/// `<mode>,<object>,<path>` as given to `--cacheinfo`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheInfo {
    pub mode: EntryMode,
    pub oid: ObjectId,
    pub path: String,
}

impl CacheInfo {
    pub fn try_parse(value: &str) -> anyhow::Result<Self> {
        let mut parts = value.splitn(3, ',');
        let (Some(mode), Some(oid), Some(path)) = (parts.next(), parts.next(), parts.next()) else {
            anyhow::bail!("expected <mode>,<object>,<path> but got '{value}'");
        };

        Ok(CacheInfo {
            mode: EntryMode::from_octal_str(mode)?,
            oid: ObjectId::try_parse(oid)?,
            path: normalize_path(path),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateIndexOptions {
    /// Allow paths that are not tracked yet
    pub add: bool,
    /// Drop tracked paths missing from the working tree
    pub remove: bool,
    /// Drop the given paths even if they still exist
    pub force_remove: bool,
    pub cacheinfo: Vec<CacheInfo>,
}

/// Strip `./` and trailing separators so paths match index names
pub(crate) fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

impl Repository {
    pub fn update_index(&mut self, paths: &[String], options: &UpdateIndexOptions) -> anyhow::Result<()> {
        self.load_index()?;

        for info in &options.cacheinfo {
            if !options.add && !self.index().is_tracked_file(&info.path) {
                anyhow::bail!("{}: cannot add to the index - missing --add option?", info.path);
            }
            if info.mode.is_tree() {
                anyhow::bail!("{}: invalid mode {} for an index entry", info.path, info.mode.as_str());
            }

            self.index_mut().add(IndexEntry::new(
                info.path.clone(),
                info.oid,
                EntryMetadata::with_mode(info.mode),
            ));
        }

        for path in paths.iter().map(|path| normalize_path(path)) {
            if options.force_remove {
                self.index_mut().remove(&path);
                continue;
            }

            if !self.workspace().exists(&path) {
                if !options.remove {
                    anyhow::bail!("{path}: does not exist and --remove not passed");
                }
                self.index_mut().remove(&path);
                continue;
            }

            if !options.add && !self.index().is_tracked_file(&path) {
                anyhow::bail!("{path}: cannot add to the index - missing --add option?");
            }
            self.stage_file(&path)?;
        }

        self.index_mut().write_updates()?;

        Ok(())
    }

    /// Store the working tree file at `path` and stage it
    pub(crate) fn stage_file(&mut self, path: &str) -> anyhow::Result<ObjectId> {
        let stat = self.workspace().stat_file(path)?;
        if stat.mode.is_tree() {
            anyhow::bail!("{path}: is a directory - add files inside instead");
        }

        let blob = self.workspace().parse_blob(path)?;
        let oid = self
            .database()
            .store(&blob)
            .with_context(|| format!("failed to store '{path}'"))?;

        self.index_mut()
            .add(IndexEntry::new(path.to_string(), oid, stat));

        Ok(oid)
    }
}
