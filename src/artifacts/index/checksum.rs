use crate::artifacts::index::CHECKSUM_SIZE;
use crate::errors::{Error, Result};
use sha1::{Digest, Sha1};
use std::io::{self, Write};

/// Writer that hashes everything passing through it and appends the digest
/// on [`Checksum::finish`]
#[derive(Debug)]
pub struct Checksum<W: Write> {
    inner: W,
    digest: Sha1,
}

impl<W: Write> Checksum<W> {
    pub fn new(inner: W) -> Self {
        Checksum {
            inner,
            digest: Sha1::new(),
        }
    }

    /// Append the digest of everything written so far
    pub fn finish(mut self) -> io::Result<W> {
        let checksum = self.digest.finalize();
        self.inner.write_all(checksum.as_slice())?;
        self.inner.flush()?;

        Ok(self.inner)
    }
}

impl<W: Write> Write for Checksum<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.digest.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Check the trailing digest and return the bytes it covers
pub fn verify(data: &[u8]) -> Result<&[u8]> {
    if data.len() < CHECKSUM_SIZE {
        return Err(Error::corrupted_index("file too short for a checksum"));
    }

    let (body, expected) = data.split_at(data.len() - CHECKSUM_SIZE);
    let actual = Sha1::digest(body);

    if actual.as_slice() != expected {
        return Err(Error::corrupted_index(
            "checksum does not match value stored on disk",
        ));
    }

    Ok(body)
}
