//! Plumbing commands (low-level Git operations)
//!
//! Plumbing commands provide direct access to Git's internal data structures
//! and operations. They're primarily used for scripting and as building blocks
//! for porcelain commands.
//!
//! ## Commands
//!
//! - `hash-object`: Compute object ID and optionally store in database
//! - `cat-file`: Print the type, size or content of an object
//! - `ls-tree`: List contents of a tree object
//! - `ls-files`: List the index entries
//! - `update-index`: Stage or unstage individual paths
//! - `write-tree` / `read-tree`: Move content between the index and trees
//! - `commit-tree`: Create a commit object from a tree
//! - `diff-tree`: Compare the files of two trees
//! - `dump`: Hex dump an object or decode the index

pub mod cat_file;
pub mod commit_tree;
pub mod diff_tree;
pub mod dump;
pub mod hash_object;
pub mod ls_files;
pub mod ls_tree;
pub mod read_tree;
pub mod update_index;
mod write_commit;
pub mod write_tree;
