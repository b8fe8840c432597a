//! Core repository components
//!
//! This module contains the fundamental building blocks of a Git repository:
//!
//! - `database`: Object database for storing blobs, trees, and commits
//! - `index`: Staging area (index/cache) for tracking file changes
//! - `staging`: Writing the index out as trees and reading trees back in
//! - `refs`: HEAD and the branch it points at
//! - `repository`: Explicit context tying the areas together
//! - `workspace`: Working directory file system operations

pub mod database;
pub mod index;
pub mod refs;
pub mod repository;
pub mod staging;
pub mod workspace;
