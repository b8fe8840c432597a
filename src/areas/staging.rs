//! Moving content between the index and stored trees
//!
//! `write_tree` turns the staged entries into tree objects, rehashing only
//! the directories the cache tree no longer vouches for. `read_tree` does the
//! reverse: it expands a stored tree into index entries and seeds the cache
//! tree with the hashes it already knows.

use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree_fs::{TreeFs, join_path, split_path};
use crate::errors::{Error, Result};

/// Result of writing the index out as trees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteTreeOutcome {
    pub oid: ObjectId,
    /// Trees that had to be rehashed and handed to the object store
    pub trees_written: usize,
}

impl Index {
    /// Store a tree for every directory of the merged entries and return the
    /// root tree
    ///
    /// Directories whose cached hash is still valid are neither rehashed
    /// nor stored again, so a second call without changes writes nothing.
    pub fn write_tree(&mut self, database: &Database) -> Result<WriteTreeOutcome> {
        let cache_tree = self.cache_tree_or_build();
        let (oid, trees_written) = cache_tree.update(&mut |tree| database.store(tree).map(|_| ()))?;

        tracing::debug!(oid = %oid, trees_written, "wrote index tree");
        if trees_written > 0 {
            self.mark_changed();
        }

        Ok(WriteTreeOutcome { oid, trees_written })
    }

    /// Like [`Index::write_tree`], returning the tree stored for the
    /// directory `prefix` instead of the root
    pub fn write_tree_at(&mut self, database: &Database, prefix: &str) -> Result<Option<ObjectId>> {
        self.write_tree(database)?;

        Ok(self
            .cache_tree()
            .and_then(|cache_tree| cache_tree.oid_at(prefix.trim_matches('/'))))
    }

    /// Stage every file of the tree (or commit) `oid` below `prefix`
    ///
    /// With `erase` the index is emptied first. Otherwise reading fails with
    /// [`Error::OverlappingEntry`] before anything changes when one of the
    /// new paths, or a directory on the way to it, is already staged.
    pub fn read_tree(
        &mut self,
        database: &Database,
        oid: &ObjectId,
        prefix: &str,
        erase: bool,
    ) -> Result<WriteTreeOutcome> {
        let prefix = split_path(prefix).collect::<Vec<_>>().join("/");
        let tree = database.load_tree_fs(oid)?.into_root();

        let mut grafted = TreeFs::default();
        grafted.graft(&prefix, tree);
        let files = grafted.files();

        if erase {
            self.clear();
        } else {
            self.check_overlaps(&prefix, files.iter().map(|file| file.path.as_str()))?;
        }

        // merge into a copy so a conflict leaves the index untouched; the
        // cache must be built before the new entries land, or every
        // directory would start out stale
        let mut cache_tree = self.cache_tree_or_build().clone();
        let outcome = cache_tree.merge(grafted);
        if let Some(conflict) = outcome.conflicts.first() {
            return Err(Error::OverlappingEntry(conflict.path.clone()));
        }

        for file in &files {
            self.insert_unchecked(IndexEntry::new(
                file.path.clone(),
                file.oid,
                EntryMetadata::with_mode(file.mode),
            ));
        }
        self.cache_tree = Some(cache_tree);

        tracing::debug!(tree = %oid, prefix = %prefix, files = files.len(), "read tree into index");
        self.write_tree(database)
    }

    fn check_overlaps<'a>(&self, prefix: &str, paths: impl Iterator<Item = &'a str>) -> Result<()> {
        if !prefix.is_empty() && self.is_tracked_dir(prefix) {
            return Err(Error::OverlappingEntry(prefix.to_string()));
        }

        for path in paths {
            if self.is_tracked(path) {
                return Err(Error::OverlappingEntry(path.to_string()));
            }

            let mut parent = String::new();
            for segment in split_path(path) {
                if !parent.is_empty() && self.is_tracked_file(&parent) {
                    return Err(Error::OverlappingEntry(parent));
                }
                parent = join_path(&parent, segment);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::cache_tree::CacheTree;
    use crate::artifacts::index::entry_mode::EntryMode;
    use crate::artifacts::index::index_entry::Stage;
    use crate::artifacts::objects::blob::Blob;
    use crate::artifacts::objects::object::Object;
    use crate::artifacts::objects::tree::Tree;
    use assert_fs::TempDir;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    struct Repo {
        _dir: TempDir,
        database: Database,
        index: Index,
    }

    #[fixture]
    fn repo() -> Repo {
        let dir = TempDir::new().unwrap();
        let database = Database::new(dir.path().join("objects").into_boxed_path());
        let index = Index::new(dir.path().join("index").into_boxed_path());
        Repo {
            _dir: dir,
            database,
            index,
        }
    }

    fn stage(repo: &mut Repo, path: &str, content: &str) -> ObjectId {
        let oid = repo
            .database
            .store(&Blob::new(Bytes::from(content.to_string())))
            .unwrap();
        repo.index.add(IndexEntry::new(
            path.to_string(),
            oid,
            EntryMetadata::with_mode(EntryMode::REGULAR),
        ));
        oid
    }

    #[rstest]
    fn single_file_tree_has_the_known_hash(mut repo: Repo) {
        let blob = stage(&mut repo, "hello.txt", "test content\n");

        let outcome = repo.index.write_tree(&repo.database).unwrap();

        assert_eq!(blob.to_string(), "d670460b4b4aece5915caf5c68d12f560a9fe3e4");
        assert_eq!(
            outcome.oid.to_string(),
            "e4cc8b3b601ce58ee02233915fee2a5bdbcbb44d"
        );
        assert!(repo.database.exists(&outcome.oid));
    }

    #[rstest]
    fn empty_index_writes_the_empty_tree(mut repo: Repo) {
        let outcome = repo.index.write_tree(&repo.database).unwrap();

        assert_eq!(outcome.oid, Tree::new().object_id());
        assert_eq!(outcome.trees_written, 1);
    }

    #[rstest]
    fn second_write_tree_writes_nothing(mut repo: Repo) {
        stage(&mut repo, "a.txt", "a");
        stage(&mut repo, "src/lib.rs", "lib");
        stage(&mut repo, "src/bin/main.rs", "main");

        let first = repo.index.write_tree(&repo.database).unwrap();
        let second = repo.index.write_tree(&repo.database).unwrap();

        assert_eq!(first.trees_written, 3);
        assert_eq!(second.oid, first.oid);
        assert_eq!(second.trees_written, 0);
    }

    #[rstest]
    fn cached_hashes_survive_a_reload(mut repo: Repo) {
        stage(&mut repo, "a.txt", "a");
        stage(&mut repo, "src/lib.rs", "lib");
        let first = repo.index.write_tree(&repo.database).unwrap();
        repo.index.write_updates().unwrap();

        let mut reloaded = Index::load(repo.index.path().into()).unwrap();
        let again = reloaded.write_tree(&repo.database).unwrap();

        assert_eq!(again, WriteTreeOutcome { oid: first.oid, trees_written: 0 });
    }

    #[rstest]
    fn change_rehashes_only_its_chain(mut repo: Repo) {
        stage(&mut repo, "docs/readme", "r");
        stage(&mut repo, "src/lib.rs", "lib");
        repo.index.write_tree(&repo.database).unwrap();
        let docs = repo.index.write_tree_at(&repo.database, "docs").unwrap();

        stage(&mut repo, "src/lib.rs", "changed");
        let outcome = repo.index.write_tree(&repo.database).unwrap();

        assert_eq!(outcome.trees_written, 2);
        assert_eq!(repo.index.write_tree_at(&repo.database, "docs").unwrap(), docs);
    }

    #[rstest]
    fn conflicted_entries_stay_out_of_trees(mut repo: Repo) {
        stage(&mut repo, "a.txt", "a");
        let clean = repo.index.write_tree(&repo.database).unwrap();
        let mut conflicted = IndexEntry::new(
            "b.txt".to_string(),
            ObjectId::digest(b"b"),
            EntryMetadata::with_mode(EntryMode::REGULAR),
        );
        conflicted.stage = Stage::Ours;
        repo.index.add(conflicted);

        let outcome = repo.index.write_tree(&repo.database).unwrap();

        assert_eq!(outcome.oid, clean.oid);
    }

    #[rstest]
    fn read_tree_restores_entries_and_cache(mut repo: Repo) {
        stage(&mut repo, "a.txt", "a");
        stage(&mut repo, "src/lib.rs", "lib");
        let tree = repo.index.write_tree(&repo.database).unwrap().oid;

        let mut other = Index::new(repo.index.path().with_extension("other").into_boxed_path());
        let outcome = other.read_tree(&repo.database, &tree, "", false).unwrap();

        assert_eq!(outcome.oid, tree);
        assert_eq!(outcome.trees_written, 0);
        let names = other.entries().map(|e| e.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["a.txt", "src/lib.rs"]);
    }

    #[rstest]
    fn read_tree_under_prefix_writes_only_new_parents(mut repo: Repo) {
        stage(&mut repo, "lib.rs", "lib");
        let tree = repo.index.write_tree(&repo.database).unwrap().oid;
        stage(&mut repo, "top.txt", "top");
        repo.index.write_tree(&repo.database).unwrap();

        let outcome = repo
            .index
            .read_tree(&repo.database, &tree, "vendor/crate", false)
            .unwrap();

        assert_eq!(outcome.trees_written, 2);
        assert!(repo.index.entry_by_path("vendor/crate/lib.rs").is_some());
        assert_eq!(
            repo.index.write_tree_at(&repo.database, "vendor/crate").unwrap(),
            Some(tree)
        );
    }

    #[rstest]
    #[case("")]
    #[case("lib.rs")]
    fn read_tree_refuses_overlaps(mut repo: Repo, #[case] prefix: &str) {
        stage(&mut repo, "lib.rs", "lib");
        let tree = repo.index.write_tree(&repo.database).unwrap().oid;
        let before = repo.index.entries().cloned().collect::<Vec<_>>();

        let result = repo.index.read_tree(&repo.database, &tree, prefix, false);

        assert!(matches!(result, Err(Error::OverlappingEntry(_))));
        assert_eq!(repo.index.entries().cloned().collect::<Vec<_>>(), before);
    }

    #[rstest]
    fn read_tree_with_erase_replaces_the_index(mut repo: Repo) {
        stage(&mut repo, "lib.rs", "lib");
        let tree = repo.index.write_tree(&repo.database).unwrap().oid;
        stage(&mut repo, "extra.txt", "extra");

        repo.index.read_tree(&repo.database, &tree, "", true).unwrap();

        let names = repo.index.entries().map(|e| e.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["lib.rs"]);
    }

    #[rstest]
    fn read_tree_drops_empty_directories_from_the_written_tree(mut repo: Repo) {
        let blob = repo.database.store(&Blob::new(Bytes::from("f"))).unwrap();
        let mut stored = TreeFs::default();
        stored.upsert_file("a/f", blob, EntryMode::REGULAR);
        stored.graft("a/b", Tree::new());
        let tree = stored
            .finalize(&mut |_, tree| repo.database.store(tree).map(|_| ()))
            .unwrap();

        let outcome = repo.index.read_tree(&repo.database, &tree, "", true).unwrap();

        let mut fresh = Index::new(repo.index.path().with_extension("fresh").into_boxed_path());
        fresh.add(IndexEntry::new(
            "a/f".to_string(),
            blob,
            EntryMetadata::with_mode(EntryMode::REGULAR),
        ));
        let expected = fresh.write_tree(&repo.database).unwrap();

        let names = repo.index.entries().map(|e| e.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["a/f"]);
        assert_ne!(outcome.oid, tree);
        assert_eq!(outcome.oid, expected.oid);
    }

    #[rstest]
    fn conflicting_read_tree_leaves_the_index_alone(mut repo: Repo) {
        let theirs = repo.database.store(&Blob::new(Bytes::from("theirs"))).unwrap();
        let mut stored = TreeFs::default();
        stored.upsert_file("x.rs", theirs, EntryMode::REGULAR);
        let tree = stored
            .finalize(&mut |_, tree| repo.database.store(tree).map(|_| ()))
            .unwrap();

        stage(&mut repo, "a.txt", "a");
        // a cached directory the entries no longer mention
        let ours = IndexEntry::new(
            "lib/x.rs".to_string(),
            ObjectId::digest(b"ours"),
            EntryMetadata::with_mode(EntryMode::REGULAR),
        );
        repo.index.cache_tree = Some(CacheTree::from_entries([&ours]));
        let entries_before = repo.index.entries().cloned().collect::<Vec<_>>();
        let cache_before = repo.index.cache_tree.clone();

        let result = repo.index.read_tree(&repo.database, &tree, "lib", false);

        assert!(matches!(result, Err(Error::OverlappingEntry(path)) if path == "lib/x.rs"));
        assert_eq!(repo.index.entries().cloned().collect::<Vec<_>>(), entries_before);
        assert_eq!(repo.index.cache_tree, cache_before);
    }
}
