//! Git index file format
//!
//! The index (also called staging area or cache) stores information about the working tree.
//! It tracks which files should be included in the next commit.
//!
//! ## File Format
//!
//! ```text
//! Header (12 bytes):
//!   - Signature: "DIRC" (4 bytes)
//!   - Version: 2, 3 or 4 (4 bytes)
//!   - Entry count (4 bytes)
//!
//! Entries (variable length):
//!   - v2/v3: each entry padded with NULs to 8-byte alignment
//!   - v3: optional extended flags after the regular flags
//!   - v4: prefix-compressed paths, no padding
//!
//! Extensions (optional, repeated):
//!   - Signature (4 bytes), size (4 bytes), payload
//!
//! Checksum (20 bytes):
//!   - SHA-1 hash of all preceding bytes
//! ```

pub mod cache_tree;
pub mod checksum;
pub mod codec;
pub mod entry_mode;
pub mod extension;
pub mod index_entry;
pub mod index_header;

/// Size of SHA-1 checksum in bytes
pub const CHECKSUM_SIZE: usize = 20;

/// Size of index header in bytes
pub const HEADER_SIZE: usize = 12; // 4 bytes for marker, 4 for version, 4 for entries_count

/// Magic signature identifying index files
pub const SIGNATURE: &[u8; 4] = b"DIRC";

/// Version written for a fresh index
pub const DEFAULT_VERSION: u32 = 2;

pub const MIN_VERSION: u32 = 2;
pub const MAX_VERSION: u32 = 4;

/// Signature of the cache tree extension
pub const CACHE_TREE_SIGNATURE: &[u8; 4] = b"TREE";
