//! Stream bridge between regions/serializers and `std::io`.
//!
//! - `RegionReader`: `Read + BufRead + Seek` over exactly one frozen region.
//!   The reader holds a clone of the region, so the backing storage lives at
//!   least as long as the stream.
//! - `SerializerStream`: `Write + Seek` buffer whose bytes are handed to the
//!   owning serializer when the stream is closed or dropped.

use std::io::{self, BufRead, Cursor, Read, Seek, SeekFrom, Write};
use std::mem;

use crate::error::Result;
use crate::region::FrozenMemoryRegion;
use crate::serializer::MappedSerializer;

// ── RegionReader ───────────────────────────────────────────────────

/// Seekable reader over a frozen region.
///
/// Seeking past the end is allowed; reads there return 0 bytes.
#[derive(Debug, Clone)]
pub struct RegionReader {
    region: FrozenMemoryRegion,
    pos: u64,
    name: String,
}

impl RegionReader {
    pub fn new(region: FrozenMemoryRegion) -> Self {
        Self::named(region, String::new())
    }

    /// Reader carrying a name for diagnostics (usually the entry name).
    pub fn named(region: FrozenMemoryRegion, name: impl Into<String>) -> Self {
        Self {
            region,
            pos: 0,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region(&self) -> &FrozenMemoryRegion {
        &self.region
    }

    pub fn into_region(self) -> FrozenMemoryRegion {
        self.region
    }

    /// Current offset from the start of the region.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Bytes left before the end of the region (0 when past the end).
    pub fn remaining(&self) -> usize {
        self.tail().len()
    }

    fn tail(&self) -> &[u8] {
        let data = self.region.data();
        let start = usize::try_from(self.pos).unwrap_or(usize::MAX).min(data.len());
        &data[start..]
    }
}

impl Read for RegionReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = {
            let tail = self.tail();
            let n = tail.len().min(buf.len());
            buf[..n].copy_from_slice(&tail[..n]);
            n
        };
        self.pos += n as u64;
        Ok(n)
    }
}

impl BufRead for RegionReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Ok(self.tail())
    }

    fn consume(&mut self, amt: usize) {
        let amt = amt.min(self.remaining());
        self.pos += amt as u64;
    }
}

impl Seek for RegionReader {
    fn seek(&mut self, style: SeekFrom) -> io::Result<u64> {
        let (base, offset) = match style {
            SeekFrom::Start(n) => {
                self.pos = n;
                return Ok(n);
            }
            SeekFrom::Current(d) => (self.pos, d),
            SeekFrom::End(d) => (self.region.len() as u64, d),
        };
        match base.checked_add_signed(offset) {
            Some(pos) => {
                self.pos = pos;
                Ok(pos)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "invalid seek to a negative or overflowing position in region '{}'",
                    self.name
                ),
            )),
        }
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }
}

// ── SerializerStream ───────────────────────────────────────────────

/// Buffered writer whose contents are committed to a serializer.
///
/// `close` hands the bytes to `MappedSerializer::commit_stream` and returns
/// the committed region. Dropping an unclosed stream performs the same
/// hand-off with a warning, and logs a failure since `Drop` cannot report it.
pub struct SerializerStream<'a, S: MappedSerializer + ?Sized> {
    owner: &'a S,
    buffer: Cursor<Vec<u8>>,
    committed: bool,
}

impl<'a, S: MappedSerializer + ?Sized> SerializerStream<'a, S> {
    pub fn new(owner: &'a S) -> Self {
        Self {
            owner,
            buffer: Cursor::new(Vec::new()),
            committed: false,
        }
    }

    /// Bytes buffered so far.
    pub fn len(&self) -> usize {
        self.buffer.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.get_ref().is_empty()
    }

    /// Commit the buffered bytes to the owner.
    pub fn close(mut self) -> Result<FrozenMemoryRegion> {
        self.committed = true;
        let bytes = mem::take(self.buffer.get_mut());
        self.owner.commit_stream(&bytes)
    }
}

impl<S: MappedSerializer + ?Sized> Write for SerializerStream<'_, S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: MappedSerializer + ?Sized> Seek for SerializerStream<'_, S> {
    fn seek(&mut self, style: SeekFrom) -> io::Result<u64> {
        self.buffer.seek(style)
    }
}

impl<S: MappedSerializer + ?Sized> Drop for SerializerStream<'_, S> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let bytes = mem::take(self.buffer.get_mut());
        tracing::warn!(bytes = bytes.len(), "stream dropped without close, committing");
        if let Err(e) = self.owner.commit_stream(&bytes) {
            tracing::warn!(bytes = bytes.len(), "stream commit on drop failed: {}", e);
        }
    }
}
