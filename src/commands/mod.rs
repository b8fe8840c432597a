//! Git command implementations
//!
//! This module contains all command implementations, organized into two categories
//! following Git's architecture:
//!
//! - `plumbing`: Low-level commands for direct object and index manipulation
//! - `porcelain`: User-facing commands for the staging workflow (init, add, rm, commit)
//!
//! Every command is an `impl Repository` block writing its output through
//! [`Repository::writer`](crate::areas::repository::Repository::writer).

pub mod plumbing;
pub mod porcelain;
