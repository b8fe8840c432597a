//! Tree-level diffing
//!
//! - `tree_diff`: classifies the files of two flattened trees as added,
//!   deleted or modified with a single merge-style scan

pub mod tree_diff;
