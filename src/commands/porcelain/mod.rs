//! Porcelain commands (user-facing Git operations)
//!
//! Porcelain commands compose the plumbing and the storage areas into the
//! everyday workflow of staging and committing.
//!
//! ## Commands
//!
//! - `init`: Initialize a new repository
//! - `add`: Stage files for commit
//! - `rm`: Unstage files and optionally delete them
//! - `commit`: Record the index as a new commit on the current branch

pub mod add;
pub mod commit;
pub mod init;
pub mod rm;
