use crate::artifacts::index::{HEADER_SIZE, MAX_VERSION, MIN_VERSION, SIGNATURE};
use crate::errors::{Error, Result};
use byteorder::{ByteOrder, WriteBytesExt};
use derive_new::new;
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct IndexHeader {
    pub version: u32,
    pub entries_count: u32,
}

impl IndexHeader {
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(SIGNATURE)?;
        writer.write_u32::<byteorder::NetworkEndian>(self.version)?;
        writer.write_u32::<byteorder::NetworkEndian>(self.entries_count)?;

        Ok(())
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::corrupted_index("index file is too short"));
        }

        if &bytes[0..4] != SIGNATURE {
            return Err(Error::corrupted_index("invalid index file signature"));
        }

        let version = byteorder::NetworkEndian::read_u32(&bytes[4..8]);
        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(Error::UnsupportedIndexVersion(version));
        }

        let entries_count = byteorder::NetworkEndian::read_u32(&bytes[8..12]);

        Ok(IndexHeader {
            version,
            entries_count,
        })
    }
}
