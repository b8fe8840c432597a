use assert_fs::TempDir;
use dirc::areas::database::Database;
use dirc::areas::index::Index;
use dirc::artifacts::index::codec::{self, IndexContent};
use dirc::artifacts::index::entry_mode::EntryMode;
use dirc::artifacts::index::extension::Extension;
use dirc::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use dirc::artifacts::objects::blob::Blob;
use dirc::errors::Error;
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};

struct Workspace {
    _dir: TempDir,
    index_path: std::path::PathBuf,
    database: Database,
}

#[fixture]
fn workspace() -> Workspace {
    let dir = TempDir::new().unwrap();
    let index_path = dir.path().join("index");
    let database = Database::new(dir.path().join("objects").into_boxed_path());

    Workspace {
        _dir: dir,
        index_path,
        database,
    }
}

fn blob_entry(database: &Database, name: &str, content: &str) -> IndexEntry {
    let oid = database.store(&Blob::new(content.to_string().into())).unwrap();
    IndexEntry::new(name.to_string(), oid, EntryMetadata::with_mode(EntryMode::REGULAR))
}

#[rstest]
fn unknown_extensions_survive_a_rewrite(workspace: Workspace) {
    let content = IndexContent {
        version: 2,
        entries: vec![blob_entry(&workspace.database, "a.txt", "one\n")],
        cache_tree: None,
        extensions: vec![Extension::new(*b"UNTR", b"opaque payload".to_vec())],
    };
    std::fs::write(&workspace.index_path, codec::encode(&content).unwrap()).unwrap();

    let mut index = Index::load(workspace.index_path.clone().into_boxed_path()).unwrap();
    index.add(blob_entry(&workspace.database, "b.txt", "two\n"));
    index.write_updates().unwrap();

    let reread = codec::decode(&std::fs::read(&workspace.index_path).unwrap()).unwrap();
    assert_eq!(reread.extensions, content.extensions);
    assert_eq!(
        reread.entries.iter().map(|entry| entry.name.as_str()).collect::<Vec<_>>(),
        vec!["a.txt", "b.txt"]
    );
}

#[rstest]
fn version_four_index_is_read_back(workspace: Workspace) {
    let mut index = Index::new(workspace.index_path.clone().into_boxed_path());
    for name in ["src/lib.rs", "src/main.rs", "src/nested/mod.rs"] {
        index.add(blob_entry(&workspace.database, name, name));
    }
    index.set_version(4).unwrap();
    index.write_updates().unwrap();

    let reloaded = Index::load(workspace.index_path.clone().into_boxed_path()).unwrap();

    assert_eq!(reloaded.version(), 4);
    assert_eq!(
        reloaded.to_content().entries,
        index.to_content().entries
    );
}

#[rstest]
fn unsupported_versions_are_refused(workspace: Workspace) {
    let mut index = Index::new(workspace.index_path.into_boxed_path());

    assert!(matches!(
        index.set_version(5),
        Err(Error::UnsupportedIndexVersion(5))
    ));
}

#[rstest]
fn cache_tree_is_reused_after_reload(workspace: Workspace) {
    let mut index = Index::new(workspace.index_path.clone().into_boxed_path());
    index.add(blob_entry(&workspace.database, "a.txt", "one\n"));
    index.add(blob_entry(&workspace.database, "dir/b.txt", "two\n"));
    index.add(blob_entry(&workspace.database, "dir/c.txt", "three\n"));

    let first = index.write_tree(&workspace.database).unwrap();
    index.write_updates().unwrap();
    assert_eq!(first.oid.to_string(), "32d0339eb8c936a3fc53b8bff2c2efd23a1255a7");
    assert_eq!(first.trees_written, 2);

    let mut reloaded = Index::load(workspace.index_path.clone().into_boxed_path()).unwrap();
    let second = reloaded.write_tree(&workspace.database).unwrap();

    assert_eq!(second.oid, first.oid);
    assert_eq!(second.trees_written, 0);
}

#[rstest]
fn flipped_byte_fails_the_checksum(workspace: Workspace) {
    let mut index = Index::new(workspace.index_path.clone().into_boxed_path());
    index.add(blob_entry(&workspace.database, "a.txt", "one\n"));
    index.write_updates().unwrap();

    let mut data = std::fs::read(&workspace.index_path).unwrap();
    let last = data.len() - 1;
    data[last] ^= 0x01;
    std::fs::write(&workspace.index_path, data).unwrap();

    let error = Index::load(workspace.index_path.into_boxed_path()).unwrap_err();
    assert!(matches!(error, Error::CorruptedIndex(_)));
}
