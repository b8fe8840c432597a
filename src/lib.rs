//! A content-addressed object store and staging index compatible with
//! git's on-disk formats.
//!
//! - [`artifacts`]: object, tree, index and diff data structures
//! - [`areas`]: the on-disk stores and the [`areas::repository::Repository`]
//!   context tying them together
//! - [`commands`]: plumbing and porcelain commands on a repository

pub mod areas;
pub mod artifacts;
pub mod commands;
pub mod config;
pub mod errors;
pub mod logging;
