//! Git data structures and algorithms
//!
//! This module contains the core Git types and algorithms:
//!
//! - `database`: Database entry types
//! - `diff`: Tree diffing
//! - `index`: Index file format and the cache tree
//! - `objects`: Git object types (blob, tree, commit) and the in-memory tree hierarchy
//! - `revision`: Revision expressions (`HEAD~2`, abbreviated ids)

pub mod database;
pub mod diff;
pub mod index;
pub mod objects;
pub mod revision;
