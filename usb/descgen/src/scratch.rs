use crate::error::{Error, Result};
use crate::usb::bytes_of;

/// Default capacity of a [DescriptorWriter].
pub const SCRATCH_CAPACITY: usize = 1024;

/// Bounds-checked buffer one descriptor is encoded into before it is appended to a stream.
///
/// The buffer is reused: [DescriptorWriter::clear] starts the next descriptor.
#[derive(Clone, Debug)]
pub struct DescriptorWriter {
    buf: Vec<u8>,
    capacity: usize,
}

impl Default for DescriptorWriter {
    fn default() -> Self {
        Self::with_capacity(SCRATCH_CAPACITY)
    }
}

impl DescriptorWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn push(&mut self, bytes: &[u8]) -> Result<()> {
        let len = self.buf.len() + bytes.len();
        if len > self.capacity {
            return Err(Error::ScratchOverflow {
                len,
                capacity: self.capacity,
            });
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    pub fn push_desc<T: plain::Plain>(&mut self, desc: &T) -> Result<()> {
        self.push(bytes_of(desc))
    }

    /// Overwrites already pushed bytes.
    pub fn patch(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let region = self.buf.len();
        let dst = offset
            .checked_add(bytes.len())
            .and_then(|end| self.buf.get_mut(offset..end))
            .ok_or(Error::PatchOutOfRegion {
                offset,
                len: bytes.len(),
                region,
            })?;
        dst.copy_from_slice(bytes);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}
