//! Repository location and commit identity
//!
//! Locations are resolved from CLI flags first, then `GIT_DIR` /
//! `GIT_INDEX_FILE`, then the defaults below the work tree. Identity comes
//! from the usual `GIT_AUTHOR_*` / `GIT_COMMITTER_*` variables.

use crate::artifacts::objects::commit::Author;
use anyhow::Context;
use std::path::{Path, PathBuf};

pub const GIT_DIR_NAME: &str = ".git";
pub const INDEX_FILE_NAME: &str = "index";

/// Where the repository lives on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    work_tree: PathBuf,
    git_dir: PathBuf,
    index_file: PathBuf,
}

impl Config {
    /// Resolve locations against the process environment
    ///
    /// `work_tree` defaults to the current directory.
    pub fn resolve(work_tree: Option<&Path>, git_dir: Option<&Path>) -> anyhow::Result<Self> {
        let current_dir = std::env::current_dir().context("failed to read the current directory")?;
        let work_tree = match work_tree {
            Some(path) => current_dir.join(path),
            None => current_dir,
        };

        Ok(Self::resolve_with(work_tree, git_dir, |key| std::env::var_os(key).map(PathBuf::from)))
    }

    /// Resolve locations using `lookup` for environment variables
    pub fn resolve_with<F>(work_tree: PathBuf, git_dir: Option<&Path>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<PathBuf>,
    {
        let git_dir = git_dir
            .map(Path::to_path_buf)
            .or_else(|| lookup("GIT_DIR"))
            .map(|path| work_tree.join(path))
            .unwrap_or_else(|| work_tree.join(GIT_DIR_NAME));
        let index_file = lookup("GIT_INDEX_FILE")
            .map(|path| work_tree.join(path))
            .unwrap_or_else(|| git_dir.join(INDEX_FILE_NAME));

        Config {
            work_tree,
            git_dir,
            index_file,
        }
    }

    pub fn work_tree(&self) -> &Path {
        &self.work_tree
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn index_file(&self) -> &Path {
        &self.index_file
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.git_dir.join("objects")
    }
}

/// Author and committer of a new commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub author: Author,
    pub committer: Author,
}

impl Identity {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the identity variables through `lookup`
    ///
    /// The committer falls back to the author; both share the author date.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let name = lookup("GIT_AUTHOR_NAME").context("GIT_AUTHOR_NAME is not set")?;
        let email = lookup("GIT_AUTHOR_EMAIL").context("GIT_AUTHOR_EMAIL is not set")?;

        let author = match lookup("GIT_AUTHOR_DATE") {
            Some(date) => {
                let timestamp = Author::parse_date(&date)
                    .with_context(|| format!("invalid GIT_AUTHOR_DATE '{date}'"))?;
                Author::new_with_timestamp(name, email, timestamp)
            }
            None => Author::new(name, email),
        };

        let committer = Author::new_with_timestamp(
            lookup("GIT_COMMITTER_NAME").unwrap_or_else(|| author.name().to_string()),
            lookup("GIT_COMMITTER_EMAIL").unwrap_or_else(|| author.email().to_string()),
            author.timestamp(),
        );

        Ok(Identity { author, committer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_live_below_the_work_tree() {
        let config = Config::resolve_with(PathBuf::from("/repo"), None, |_| None);

        assert_eq!(config.git_dir(), Path::new("/repo/.git"));
        assert_eq!(config.index_file(), Path::new("/repo/.git/index"));
        assert_eq!(config.objects_dir(), PathBuf::from("/repo/.git/objects"));
    }

    #[rstest]
    #[case(Some("/flag"), Some("/env"), "/flag")]
    #[case(None, Some("/env"), "/env")]
    #[case(None, Some("meta"), "/repo/meta")]
    fn git_dir_precedence(
        #[case] flag: Option<&str>,
        #[case] env: Option<&str>,
        #[case] expected: &str,
    ) {
        let config = Config::resolve_with(PathBuf::from("/repo"), flag.map(Path::new), |key| {
            (key == "GIT_DIR").then(|| env.map(PathBuf::from)).flatten()
        });

        assert_eq!(config.git_dir(), Path::new(expected));
        assert_eq!(config.index_file(), Path::new(expected).join("index"));
    }

    #[test]
    fn index_file_override() {
        let config = Config::resolve_with(PathBuf::from("/repo"), None, |key| {
            (key == "GIT_INDEX_FILE").then(|| PathBuf::from("/tmp/alt-index"))
        });

        assert_eq!(config.index_file(), Path::new("/tmp/alt-index"));
    }

    #[test]
    fn identity_from_author_variables() {
        let identity = Identity::from_lookup(lookup(&[
            ("GIT_AUTHOR_NAME", "Ada"),
            ("GIT_AUTHOR_EMAIL", "ada@example.com"),
            ("GIT_AUTHOR_DATE", "2024-01-02 03:04:05 +0200"),
        ]))
        .unwrap();

        assert_eq!(identity.author.display(), "Ada <ada@example.com> 1704157445 +0200");
        assert_eq!(identity.committer, identity.author);
    }

    #[test]
    fn committer_overrides() {
        let identity = Identity::from_lookup(lookup(&[
            ("GIT_AUTHOR_NAME", "Ada"),
            ("GIT_AUTHOR_EMAIL", "ada@example.com"),
            ("GIT_AUTHOR_DATE", "Tue, 2 Jan 2024 03:04:05 +0200"),
            ("GIT_COMMITTER_NAME", "Bob"),
        ]))
        .unwrap();

        assert_eq!(identity.committer.display_name(), "Bob <ada@example.com>");
        assert_eq!(identity.committer.timestamp(), identity.author.timestamp());
    }

    #[rstest]
    #[case(&[("GIT_AUTHOR_EMAIL", "a@b")])]
    #[case(&[("GIT_AUTHOR_NAME", "A"), ("GIT_AUTHOR_EMAIL", "a@b"), ("GIT_AUTHOR_DATE", "yesterday")])]
    fn incomplete_identity_is_rejected(#[case] vars: &[(&str, &str)]) {
        assert!(Identity::from_lookup(lookup(vars)).is_err());
    }
}
