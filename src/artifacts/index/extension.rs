use crate::errors::{Error, Result};
use byteorder::{ByteOrder, WriteBytesExt};
use bytes::Bytes;
use std::io::Write;

/// Size of an extension header: 4-byte signature plus 4-byte payload size
pub const EXTENSION_HEADER_SIZE: usize = 8;

/// An index extension kept as opaque bytes
///
/// Extensions this crate does not interpret are written back exactly as
/// they were read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub signature: [u8; 4],
    pub data: Bytes,
}

impl Extension {
    pub fn new(signature: [u8; 4], data: impl Into<Bytes>) -> Self {
        Extension {
            signature,
            data: data.into(),
        }
    }

    pub fn signature_str(&self) -> String {
        String::from_utf8_lossy(&self.signature).into_owned()
    }

    /// Parse one extension from the front of `data`, returning it with the
    /// number of bytes consumed
    pub fn parse(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < EXTENSION_HEADER_SIZE {
            return Err(Error::corrupted_index("truncated extension header"));
        }

        let mut signature = [0u8; 4];
        signature.copy_from_slice(&data[0..4]);
        let size = byteorder::NetworkEndian::read_u32(&data[4..8]) as usize;

        let end = EXTENSION_HEADER_SIZE
            .checked_add(size)
            .filter(|end| *end <= data.len())
            .ok_or_else(|| {
                Error::corrupted_index(format!(
                    "extension '{}' claims {size} bytes past the end of the file",
                    String::from_utf8_lossy(&signature)
                ))
            })?;

        let extension = Extension::new(
            signature,
            Bytes::copy_from_slice(&data[EXTENSION_HEADER_SIZE..end]),
        );

        Ok((extension, end))
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.signature)?;
        writer.write_u32::<byteorder::NetworkEndian>(self.data.len() as u32)?;
        writer.write_all(&self.data)?;

        Ok(())
    }
}
