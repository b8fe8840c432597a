//! Index entry representation
//!
//! Each entry in the index represents a tracked file with:
//! - File path
//! - Content hash (object ID)
//! - File metadata (mode, size, timestamps)
//! - Merge stage and the assume-valid / skip-worktree / intent-to-add bits
//!
//! ## Entry Format
//!
//! ```text
//! 10 x u32   ctime s/ns, mtime s/ns, dev, ino, mode, uid, gid, size
//! 20 bytes   object id
//! u16        flags: assume-valid(1) extended(1) stage(2) name-length(12)
//! u16        extended flags, only when the extended bit is set (v3+)
//! path       NUL terminated, then NUL padding to a multiple of 8 (v2/v3)
//! ```
//!
//! Version 4 replaces the plain path with a varint telling how many bytes to
//! drop from the end of the previous path, followed by the NUL-terminated
//! suffix to append, and has no padding.

use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};
use bitflags::bitflags;
use byteorder::{ByteOrder, WriteBytesExt};
use derive_new::new;
use is_executable::IsExecutable;
use std::fs::Metadata;
use std::io::Write;
use std::os::unix::prelude::MetadataExt;
use std::path::Path;

/// Path lengths at or above this are stored as the 0xFFF sentinel
const MAX_PATH_SIZE: usize = 0xFFF;

/// Block size for entry alignment (8 bytes)
pub const ENTRY_BLOCK: usize = 8;

/// Size of the fixed part of an entry without extended flags
pub const ENTRY_FIXED_SIZE: usize = 62;

const ASSUME_VALID_FLAG: u16 = 0x8000;
const EXTENDED_FLAG: u16 = 0x4000;
const STAGE_MASK: u16 = 0x3000;
const STAGE_SHIFT: u16 = 12;
const NAME_MASK: u16 = 0x0FFF;

bitflags! {
    /// Second flags word, present from version 3 on
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ExtendedFlags: u16 {
        const SKIP_WORKTREE = 0x4000;
        const INTENT_TO_ADD = 0x2000;
    }
}

/// Merge stage of an entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    #[default]
    Merged = 0,
    Base = 1,
    Ours = 2,
    Theirs = 3,
}

impl Stage {
    fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0 => Stage::Merged,
            1 => Stage::Base,
            2 => Stage::Ours,
            _ => Stage::Theirs,
        }
    }

    pub fn as_u16(&self) -> u16 {
        *self as u16
    }
}

/// File metadata stored in index entries
///
/// All fields are the low 32 bits of the values reported by `stat`, exactly
/// as they are stored on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    pub ctime: u32,
    pub ctime_nsec: u32,
    pub mtime: u32,
    pub mtime_nsec: u32,
    pub dev: u32,
    pub ino: u32,
    pub mode: EntryMode,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
}

impl EntryMetadata {
    /// Metadata for an entry that has no file behind it (e.g. read from a tree)
    pub fn with_mode(mode: EntryMode) -> Self {
        EntryMetadata {
            mode,
            ..Default::default()
        }
    }
}

/// Index entry representing a staged file
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct IndexEntry {
    /// `/`-separated path relative to the repository root
    pub name: String,
    pub oid: ObjectId,
    pub metadata: EntryMetadata,
    #[new(default)]
    pub stage: Stage,
    #[new(default)]
    pub assume_valid: bool,
    #[new(default)]
    pub extended_flags: ExtendedFlags,
}

impl IndexEntry {
    pub fn mode(&self) -> EntryMode {
        self.metadata.mode
    }

    pub fn basename(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Every proper ancestor directory, outermost first
    ///
    /// `a/b/c` yields `["a", "a/b"]`.
    pub fn parent_dirs(&self) -> Vec<&str> {
        self.name
            .match_indices('/')
            .map(|(index, _)| &self.name[..index])
            .collect()
    }

    pub fn is_extended(&self) -> bool {
        !self.extended_flags.is_empty()
    }

    fn flags(&self) -> u16 {
        let mut flags = self.name.len().min(MAX_PATH_SIZE) as u16;
        flags |= self.stage.as_u16() << STAGE_SHIFT;
        if self.assume_valid {
            flags |= ASSUME_VALID_FLAG;
        }
        if self.is_extended() {
            flags |= EXTENDED_FLAG;
        }
        flags
    }

    /// Write the fixed part of the entry, up to and including the flags
    fn write_fixed<W: Write>(&self, writer: &mut W) -> Result<()> {
        let metadata = &self.metadata;

        for field in [
            metadata.ctime,
            metadata.ctime_nsec,
            metadata.mtime,
            metadata.mtime_nsec,
            metadata.dev,
            metadata.ino,
            metadata.mode.as_u32(),
            metadata.uid,
            metadata.gid,
            metadata.size,
        ] {
            writer.write_u32::<byteorder::NetworkEndian>(field)?;
        }
        self.oid.write_raw_to(writer)?;
        writer.write_u16::<byteorder::NetworkEndian>(self.flags())?;
        if self.is_extended() {
            writer.write_u16::<byteorder::NetworkEndian>(self.extended_flags.bits())?;
        }

        Ok(())
    }

    /// Encode for version 2 or 3: plain path plus NUL padding
    pub fn write_padded<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.write_fixed(writer)?;
        writer.write_all(self.name.as_bytes())?;

        let fixed = ENTRY_FIXED_SIZE + if self.is_extended() { 2 } else { 0 };
        let padded = (fixed + self.name.len() + ENTRY_BLOCK) & !(ENTRY_BLOCK - 1);
        let padding = padded - fixed - self.name.len();
        writer.write_all(&[0u8; ENTRY_BLOCK][..padding])?;

        Ok(())
    }

    /// Encode for version 4, compressing the path against `previous`
    pub fn write_compressed<W: Write>(&self, writer: &mut W, previous: &str) -> Result<()> {
        self.write_fixed(writer)?;

        let common = common_prefix_len(previous.as_bytes(), self.name.as_bytes());
        write_varint(writer, (previous.len() - common) as u64)?;
        writer.write_all(&self.name.as_bytes()[common..])?;
        writer.write_all(&[0])?;

        Ok(())
    }

    /// Decode one entry from `data`, returning it with the number of bytes used
    ///
    /// `previous` is the path of the preceding entry and is only consulted
    /// for version 4.
    pub fn parse(data: &[u8], version: u32, previous: &str) -> Result<(Self, usize)> {
        let truncated = || Error::corrupted_index("truncated index entry");

        if data.len() < ENTRY_FIXED_SIZE {
            return Err(truncated());
        }

        let field = |index: usize| byteorder::NetworkEndian::read_u32(&data[index * 4..]);
        let raw_mode = field(6);
        let mode = EntryMode::try_from(raw_mode)
            .map_err(|_| Error::corrupted_index(format!("invalid entry mode {raw_mode:o}")))?;
        let metadata = EntryMetadata {
            ctime: field(0),
            ctime_nsec: field(1),
            mtime: field(2),
            mtime_nsec: field(3),
            dev: field(4),
            ino: field(5),
            mode,
            uid: field(7),
            gid: field(8),
            size: field(9),
        };

        let mut oid_bytes = &data[40..60];
        let oid = ObjectId::read_raw_from(&mut oid_bytes).map_err(|_| truncated())?;
        let flags = byteorder::NetworkEndian::read_u16(&data[60..62]);

        let mut offset = ENTRY_FIXED_SIZE;
        let mut extended_flags = ExtendedFlags::empty();
        if flags & EXTENDED_FLAG != 0 {
            if version < 3 {
                return Err(Error::corrupted_index(
                    "extended entry flags in a version 2 index",
                ));
            }
            if data.len() < offset + 2 {
                return Err(truncated());
            }
            let raw = byteorder::NetworkEndian::read_u16(&data[offset..]);
            extended_flags = ExtendedFlags::from_bits(raw).ok_or_else(|| {
                Error::corrupted_index(format!("unknown extended entry flags {raw:#06x}"))
            })?;
            offset += 2;
        }

        let name = if version >= 4 {
            let (strip, used) = read_varint(&data[offset..])?;
            offset += used;
            let keep = previous
                .len()
                .checked_sub(strip as usize)
                .ok_or_else(|| Error::corrupted_index("invalid path prefix length"))?;

            let suffix_len = data[offset..].iter().position(|&b| b == 0).ok_or_else(truncated)?;
            let mut name = previous.as_bytes()[..keep].to_vec();
            name.extend_from_slice(&data[offset..offset + suffix_len]);
            offset += suffix_len + 1;
            name
        } else {
            let name_len = data[offset..].iter().position(|&b| b == 0).ok_or_else(truncated)?;
            let name = data[offset..offset + name_len].to_vec();

            let padded = (offset + name_len + ENTRY_BLOCK) & !(ENTRY_BLOCK - 1);
            if data.len() < padded {
                return Err(truncated());
            }
            offset = padded;
            name
        };

        let declared = (flags & NAME_MASK) as usize;
        if declared < MAX_PATH_SIZE && declared != name.len() {
            return Err(Error::corrupted_index(format!(
                "entry name length {} does not match flags {declared}",
                name.len()
            )));
        }

        let name = String::from_utf8(name)
            .map_err(|_| Error::corrupted_index("entry name is not valid UTF-8"))?;

        let entry = IndexEntry {
            name,
            oid,
            metadata,
            stage: Stage::from_bits((flags & STAGE_MASK) >> STAGE_SHIFT),
            assume_valid: flags & ASSUME_VALID_FLAG != 0,
            extended_flags,
        };

        Ok((entry, offset))
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Offset-style varint used by index v4 path compression
pub fn write_varint<W: Write>(writer: &mut W, mut value: u64) -> Result<()> {
    let mut buffer = [0u8; 16];
    let mut pos = buffer.len() - 1;
    buffer[pos] = (value & 0x7f) as u8;

    value >>= 7;
    while value != 0 {
        value -= 1;
        pos -= 1;
        buffer[pos] = 0x80 | (value & 0x7f) as u8;
        value >>= 7;
    }

    writer.write_all(&buffer[pos..])?;
    Ok(())
}

/// Inverse of [`write_varint`], returning the value and the bytes consumed
pub fn read_varint(data: &[u8]) -> Result<(u64, usize)> {
    let invalid = || Error::corrupted_index("invalid path prefix varint");

    let mut bytes = data.iter();
    let mut byte = *bytes.next().ok_or_else(invalid)?;
    let mut value = u64::from(byte & 0x7f);
    let mut used = 1;

    while byte & 0x80 != 0 {
        byte = *bytes.next().ok_or_else(invalid)?;
        value = value
            .checked_add(1)
            .and_then(|v| v.checked_mul(128))
            .ok_or_else(invalid)?
            | u64::from(byte & 0x7f);
        used += 1;
    }

    Ok((value, used))
}

impl TryFrom<(&Path, Metadata)> for EntryMetadata {
    type Error = Error;

    fn try_from((file_path, metadata): (&Path, Metadata)) -> Result<Self> {
        let mode = if metadata.file_type().is_symlink() {
            EntryMode::File(FileMode::Symlink)
        } else if metadata.is_dir() {
            EntryMode::Directory
        } else if file_path.is_executable() {
            EntryMode::File(FileMode::Executable)
        } else {
            EntryMode::File(FileMode::Regular)
        };

        Ok(Self {
            ctime: metadata.ctime() as u32,
            ctime_nsec: metadata.ctime_nsec() as u32,
            mtime: metadata.mtime() as u32,
            mtime_nsec: metadata.mtime_nsec() as u32,
            dev: metadata.dev() as u32,
            ino: metadata.ino() as u32,
            mode,
            uid: metadata.uid(),
            gid: metadata.gid(),
            size: metadata.size() as u32,
        })
    }
}
