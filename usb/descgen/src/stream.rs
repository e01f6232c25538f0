//! Descriptor memory images.
//!
//! A [Stream] persists every unit it is given twice: once as raw bytes for the memory
//! initializer, once as a hex line for the simulator `$readmemh` file. The USB2 memory is one
//! byte wide and the USB3 memory one 32-bit word wide, see [Width].

use std::io::Write;

use crate::error::{Error, Result};

/// Addressing granularity of a descriptor memory.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Width {
    /// One byte per address (USB2).
    Byte,
    /// Four bytes per address (USB3).
    Word,
}

impl Width {
    /// Bytes per address.
    pub const fn unit(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Word => 4,
        }
    }

    /// Size in bytes of a memory with `bits` address lines.
    pub fn capacity(self, bits: u8) -> Option<usize> {
        1usize
            .checked_shl(u32::from(bits))
            .and_then(|words| words.checked_mul(self.unit()))
    }
}

/// One descriptor memory image and its two artifacts.
///
/// The write offset only grows. The single exception to append-only writing is the *held
/// region*: while a descriptor group is open its bytes are kept in memory, where [Stream::patch]
/// can still reach them, and only persisted by [Stream::release].
pub struct Stream<W: Write> {
    width: Width,
    bin: W,
    hex: W,
    persisted: usize,
    held: Option<Vec<u8>>,
}

impl<W: Write> Stream<W> {
    pub fn new(width: Width, bin: W, hex: W) -> Self {
        Self {
            width,
            bin,
            hex,
            persisted: 0,
            held: None,
        }
    }

    pub fn width(&self) -> Width {
        self.width
    }

    /// Current write offset, in addresses of this stream's width. Saturates at `u32::MAX`.
    pub fn offset(&self) -> u32 {
        let held = self.held.as_ref().map_or(0, Vec::len);
        let units = self.persisted.saturating_add(held).div_ceil(self.width.unit());
        u32::try_from(units).unwrap_or(u32::MAX)
    }

    /// Total bytes written to the binary artifact so far.
    pub fn bytes_persisted(&self) -> usize {
        self.persisted
    }

    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }

    /// Appends a descriptor.
    ///
    /// Outside a held region the bytes are zero-padded to whole units and persisted at once.
    /// Inside one they are buffered unpadded, so that the records of a group stay contiguous.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        match self.held {
            Some(ref mut region) => {
                region.extend_from_slice(bytes);
                Ok(())
            }
            None => self.persist(bytes),
        }
    }

    /// Starts buffering appends in memory. Returns the offset the region starts at.
    pub fn hold(&mut self) -> Result<u32> {
        if self.held.is_some() {
            return Err(Error::GroupAlreadyOpen);
        }
        let offset = self.offset();
        self.held = Some(Vec::new());
        Ok(offset)
    }

    /// Overwrites bytes of the held region; `offset` is relative to the region start.
    pub fn patch(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let region = self.held.as_mut().ok_or(Error::GroupNotOpen)?;
        let region_len = region.len();
        let dst = offset
            .checked_add(bytes.len())
            .and_then(|end| region.get_mut(offset..end))
            .ok_or(Error::PatchOutOfRegion {
                offset,
                len: bytes.len(),
                region: region_len,
            })?;
        dst.copy_from_slice(bytes);
        Ok(())
    }

    /// Persists the held region. Returns its length before padding.
    pub fn release(&mut self) -> Result<usize> {
        let region = self.held.take().ok_or(Error::GroupNotOpen)?;
        self.persist(&region)?;
        Ok(region.len())
    }

    /// Appends zero units until `total` bytes have been persisted. Never truncates.
    pub fn pad_to(&mut self, total: usize) -> Result<()> {
        if self.held.is_some() {
            return Err(Error::GroupNotClosed);
        }
        let zero = [0u8; 4];
        while self.persisted < total {
            self.write_unit(&zero[..self.width.unit()])?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.bin.flush()?;
        self.hex.flush()?;
        Ok(())
    }

    /// Returns the binary and hex sinks.
    pub fn into_inner(self) -> (W, W) {
        (self.bin, self.hex)
    }

    fn persist(&mut self, bytes: &[u8]) -> Result<()> {
        let unit = self.width.unit();
        for chunk in bytes.chunks(unit) {
            let mut buf = [0u8; 4];
            buf[..chunk.len()].copy_from_slice(chunk);
            self.write_unit(&buf[..unit])?;
        }
        Ok(())
    }

    fn write_unit(&mut self, unit: &[u8]) -> Result<()> {
        self.bin.write_all(unit)?;
        match *unit {
            [byte] => writeln!(self.hex, "{:02X}", byte)?,
            [b0, b1, b2, b3] => {
                // The hex file lists each word most-significant byte first.
                let word = u32::from_le_bytes([b0, b1, b2, b3]);
                writeln!(self.hex, "{:08X}", word.swap_bytes())?
            }
            _ => unreachable!("unit of {} bytes", unit.len()),
        }
        self.persisted += unit.len();
        Ok(())
    }
}
