//! The dual-stream descriptor compiler.
//!
//! [DescriptorCompiler] owns the USB2 and USB3 memory images and the constant table. Each
//! descriptor operation records the current offset of the streams it writes to, encodes the
//! descriptor into a scratch buffer, and appends the buffer to those streams. Descriptors that
//! differ between the two speeds are encoded twice, once per scratch buffer.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::offsets::{Bitwidths, OffsetTable, Target};
use crate::scratch::DescriptorWriter;
use crate::stream::{Stream, Width};
use crate::topology::DeviceConfig;
use crate::usb::*;

pub const USB2_BIN: &str = "usb2/usb2_descrip.bin";
pub const USB2_HEX: &str = "usb2/usb2_descrip_rom.init";
pub const USB3_BIN: &str = "usb3/usb3_descrip.bin";
pub const USB3_HEX: &str = "usb3/usb3_descrip_rom.init";
pub const HEADER: &str = "usb_descrip.vh";

/// `bMaxPacketSize0` of a SuperSpeed device: 2^9 = 512 bytes.
pub const USB3_EP0_PACKET_SIZE_EXP: u8 = 9;

/// Values of the two single-byte configuration markers.
pub const MARKER_UNSET: u8 = 0x00;
pub const MARKER_SET: u8 = 0x01;

/// The five output sinks of one run.
pub struct Artifacts<W> {
    pub usb2_bin: W,
    pub usb2_hex: W,
    pub usb3_bin: W,
    pub usb3_hex: W,
    pub header: W,
}

impl Artifacts<BufWriter<File>> {
    /// Creates every artifact under `out_dir`. Fails on the first file that cannot be created.
    pub fn create(out_dir: &Path) -> Result<Self> {
        for dir in ["usb2", "usb3"] {
            let path = out_dir.join(dir);
            fs::create_dir_all(&path).map_err(|source| Error::Create { path, source })?;
        }

        let open = |name: &str| -> Result<BufWriter<File>> {
            let path = out_dir.join(name);
            match File::create(&path) {
                Ok(file) => Ok(BufWriter::new(file)),
                Err(source) => Err(Error::Create { path, source }),
            }
        };

        Ok(Self {
            usb2_hex: open(USB2_HEX)?,
            usb3_hex: open(USB3_HEX)?,
            usb2_bin: open(USB2_BIN)?,
            usb3_bin: open(USB3_BIN)?,
            header: open(HEADER)?,
        })
    }
}

impl Artifacts<Vec<u8>> {
    pub fn in_memory() -> Self {
        Self {
            usb2_bin: Vec::new(),
            usb2_hex: Vec::new(),
            usb3_bin: Vec::new(),
            usb3_hex: Vec::new(),
            header: Vec::new(),
        }
    }
}

/// Memory usage of a finished run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Summary {
    pub bitwidths: Bitwidths,
    /// Bytes of descriptors, before padding.
    pub usb2_used: usize,
    pub usb2_capacity: usize,
    pub usb3_used: usize,
    pub usb3_capacity: usize,
    pub constants: usize,
}

/// Everything a run produced.
pub struct Finished<W> {
    pub summary: Summary,
    pub table: OffsetTable,
    pub artifacts: Artifacts<W>,
}

pub struct DescriptorCompiler<W: Write> {
    pub(crate) usb2: Stream<W>,
    pub(crate) usb3: Stream<W>,
    header: W,
    table: OffsetTable,
    bitwidths: Bitwidths,
    pub(crate) scratch2: DescriptorWriter,
    pub(crate) scratch3: DescriptorWriter,
}

impl<W: Write> DescriptorCompiler<W> {
    pub fn new(artifacts: Artifacts<W>, bitwidths: Bitwidths) -> Result<Self> {
        for target in Target::ALL {
            let bits = bitwidths.bits(target);
            if bits == 0 || Self::width(target).capacity(bits).is_none() {
                return Err(Error::InvalidBitwidth { target, bits });
            }
        }

        Ok(Self {
            usb2: Stream::new(Width::Byte, artifacts.usb2_bin, artifacts.usb2_hex),
            usb3: Stream::new(Width::Word, artifacts.usb3_bin, artifacts.usb3_hex),
            header: artifacts.header,
            table: OffsetTable::new(),
            bitwidths,
            scratch2: DescriptorWriter::new(),
            scratch3: DescriptorWriter::new(),
        })
    }

    fn width(target: Target) -> Width {
        match target {
            Target::Usb2 => Width::Byte,
            Target::Usb3 => Width::Word,
        }
    }

    pub fn stream(&self, target: Target) -> &Stream<W> {
        match target {
            Target::Usb2 => &self.usb2,
            Target::Usb3 => &self.usb3,
        }
    }

    pub fn table(&self) -> &OffsetTable {
        &self.table
    }

    /// Fails while a configuration group holds the streams. Top-level descriptors cannot be
    /// interleaved with a group's records.
    fn ensure_no_group(&self) -> Result<()> {
        if self.usb2.is_held() || self.usb3.is_held() {
            return Err(Error::GroupNotClosed);
        }
        Ok(())
    }

    /// Records the current offset of each target's stream under `name`.
    pub(crate) fn record_offsets(&mut self, name: &str, targets: &[Target]) -> Result<()> {
        self.ensure_no_group()?;
        for &target in targets {
            let offset = self.stream(target).offset();
            self.table.record(name, target, offset)?;
        }
        log::debug!(
            "{}: usb2 @ {}, usb3 @ {}",
            name,
            self.usb2.offset(),
            self.usb3.offset()
        );
        Ok(())
    }

    /// Records a constant that is not an address, such as a descriptor length.
    pub fn record_constant(&mut self, name: &str, usb2: Option<u32>, usb3: Option<u32>) -> Result<()> {
        self.ensure_no_group()?;
        if let Some(value) = usb2 {
            self.table.record(name, Target::Usb2, value)?;
        }
        if let Some(value) = usb3 {
            self.table.record(name, Target::Usb3, value)?;
        }
        Ok(())
    }

    /// Records the current offsets without emitting anything.
    pub fn mark(&mut self, name: &str) -> Result<()> {
        self.record_offsets(name, &Target::ALL)
    }

    /// Emits the device descriptor to both memories.
    ///
    /// The USB2 copy always advertises USB 2.1, so that a USB3 device enumerating at high speed
    /// presents a valid 2.x descriptor. The USB3 copy advertises 3.0 with the fixed 512-byte
    /// endpoint 0.
    pub fn device(&mut self, name: &str, device: &DeviceConfig) -> Result<()> {
        self.record_offsets(name, &Target::ALL)?;

        let usb2 = DeviceDescriptor {
            length: DeviceDescriptor::LEN,
            kind: DescriptorKind::Device as u8,
            usb: BCD_USB_2_1.to_le(),
            class: device.class,
            sub_class: device.sub_class,
            protocol: device.protocol,
            packet_size: device.max_packet_size0,
            vendor: device.vendor.to_le(),
            product: device.product.to_le(),
            release: device.release.to_le(),
            manufacturer_str: device.manufacturer_str,
            product_str: device.product_str,
            serial_str: device.serial_str,
            configurations: device.configurations,
        };
        let usb3 = DeviceDescriptor {
            usb: BCD_USB_3_0.to_le(),
            packet_size: USB3_EP0_PACKET_SIZE_EXP,
            ..usb2
        };

        self.scratch2.clear();
        self.scratch2.push_desc(&usb2)?;
        self.scratch3.clear();
        self.scratch3.push_desc(&usb3)?;

        self.usb2.append(self.scratch2.as_bytes())?;
        self.usb3.append(self.scratch3.as_bytes())?;
        Ok(())
    }

    /// Emits the device qualifier. It only exists at USB2 speeds, so the USB3 memory and
    /// constants never see it.
    pub fn device_qualifier(&mut self, name: &str, device: &DeviceConfig) -> Result<()> {
        self.record_offsets(name, &[Target::Usb2])?;

        let qualifier = DeviceQualifier {
            length: DeviceQualifier::LEN,
            kind: DescriptorKind::DeviceQualifier as u8,
            usb: BCD_USB_2_1.to_le(),
            class: device.class,
            sub_class: device.sub_class,
            protocol: device.protocol,
            pkgsz_other_speed: device.max_packet_size0,
            num_other_speed_cfgs: device.configurations,
            _rsvd: 0,
        };

        self.scratch2.clear();
        self.scratch2.push_desc(&qualifier)?;
        self.usb2.append(self.scratch2.as_bytes())?;
        Ok(())
    }

    /// Emits the Binary Object Store to the USB3 memory, with a USB 2.0 Extension and a
    /// SuperSpeed capability. Returns its total length in bytes.
    pub fn bos(&mut self, name: &str) -> Result<u16> {
        self.record_offsets(name, &[Target::Usb3])?;

        let header = BosDescriptor {
            len: BosDescriptor::LEN,
            kind: DescriptorKind::BinaryObjectStorage as u8,
            total_len: 0,
            cap_count: 2,
        };
        let usb2_ext = BosUsb2ExtDesc {
            len: BosUsb2ExtDesc::LEN,
            kind: DescriptorKind::DeviceCapability as u8,
            cap_ty: DeviceCapability::Usb2Ext as u8,
            attrs: BosUsb2ExtDesc::ATTR_LPM.to_le(),
        };
        let superspeed = BosSuperSpeedDesc {
            len: BosSuperSpeedDesc::LEN,
            kind: DescriptorKind::DeviceCapability as u8,
            cap_ty: DeviceCapability::SuperSpeed as u8,
            attrs: 0,
            speed_supp: BosSuperSpeedDesc::SPEEDS_FS_HS_SS.to_le(),
            func_supp: BosSuperSpeedDesc::FUNCTIONALITY_FROM_HS,
            u1_dev_exit_lat: BosSuperSpeedDesc::U1_EXIT_LATENCY_US,
            u2_dev_exit_lat: BosSuperSpeedDesc::U2_EXIT_LATENCY_US.to_le(),
        };

        self.scratch3.clear();
        self.scratch3.push_desc(&header)?;
        self.scratch3.push_desc(&usb2_ext)?;
        self.scratch3.push_desc(&superspeed)?;

        // Bounded by the scratch capacity.
        let total_len = self.scratch3.len() as u16;
        self.scratch3
            .patch(BosDescriptor::TOTAL_LEN_OFFSET, &total_len.to_le_bytes())?;

        self.usb3.append(self.scratch3.as_bytes())?;
        Ok(total_len)
    }

    /// Emits string descriptor 0, listing a single supported language.
    pub fn languages(&mut self, language: u16) -> Result<u8> {
        self.emit_string(0, &language.to_le_bytes())
    }

    /// Emits string descriptor `index` to both memories. Returns its length.
    ///
    /// Index 0 is the language list: the first two bytes of `text` are copied verbatim. Every
    /// other index holds ASCII text widened to 16-bit code units.
    pub fn string(&mut self, index: u8, text: &str) -> Result<u8> {
        if index == 0 {
            let mut code = [0u8; 2];
            let raw = text.as_bytes();
            let n = raw.len().min(code.len());
            code[..n].copy_from_slice(&raw[..n]);
            return self.emit_string(0, &code);
        }

        if !text.is_ascii() {
            return Err(Error::NonAsciiString { index });
        }
        let body: Vec<u8> = text.bytes().flat_map(|c| [c, 0]).collect();
        self.emit_string(index, &body)
    }

    fn emit_string(&mut self, index: u8, body: &[u8]) -> Result<u8> {
        let len = 2 + body.len();
        let length = u8::try_from(len).map_err(|_| Error::StringTooLong { index, len })?;

        self.scratch2.clear();
        self.scratch2.push(&[length, DescriptorKind::String as u8])?;
        self.scratch2.push(body)?;

        self.record_offsets(&format!("STRING{}", index), &Target::ALL)?;
        self.usb2.append(self.scratch2.as_bytes())?;
        self.usb3.append(self.scratch2.as_bytes())?;
        Ok(length)
    }

    /// Emits the two single-byte configuration markers, unset first.
    pub fn set_markers(&mut self, unset_name: &str, set_name: &str) -> Result<()> {
        for (name, value) in [(unset_name, MARKER_UNSET), (set_name, MARKER_SET)] {
            self.record_offsets(name, &Target::ALL)?;
            self.usb2.append(&[value])?;
            self.usb3.append(&[value])?;
        }
        Ok(())
    }

    /// Pads both images to the size of their memories and writes the constant header.
    pub fn finish(mut self) -> Result<Finished<W>> {
        self.ensure_no_group()?;

        let usb2_used = self.usb2.bytes_persisted();
        let usb3_used = self.usb3.bytes_persisted();
        let mut capacities = [0; 2];
        for (target, capacity) in Target::ALL.into_iter().zip(&mut capacities) {
            let stream = self.stream(target);
            // Checked in new().
            *capacity = stream
                .width()
                .capacity(self.bitwidths.bits(target))
                .unwrap_or(usize::MAX);
            if stream.bytes_persisted() > *capacity {
                return Err(Error::RomOverflow {
                    target,
                    len: stream.bytes_persisted(),
                    capacity: *capacity,
                });
            }
        }
        let [usb2_capacity, usb3_capacity] = capacities;

        self.usb2.pad_to(usb2_capacity)?;
        self.usb3.pad_to(usb3_capacity)?;
        self.usb2.flush()?;
        self.usb3.flush()?;

        self.table.export(&mut self.header, self.bitwidths)?;
        self.header.flush()?;

        let summary = Summary {
            bitwidths: self.bitwidths,
            usb2_used,
            usb2_capacity,
            usb3_used,
            usb3_capacity,
            constants: self.table.len(),
        };
        log::info!(
            "usb2: {}/{} bytes, usb3: {}/{} bytes, {} constants",
            usb2_used,
            usb2_capacity,
            usb3_used,
            usb3_capacity,
            summary.constants
        );

        let (usb2_bin, usb2_hex) = self.usb2.into_inner();
        let (usb3_bin, usb3_hex) = self.usb3.into_inner();
        Ok(Finished {
            summary,
            table: self.table,
            artifacts: Artifacts {
                usb2_bin,
                usb2_hex,
                usb3_bin,
                usb3_hex,
                header: self.header,
            },
        })
    }
}

#[cfg(test)]
mod test {
    use super::{Artifacts, DescriptorCompiler};
    use crate::error::Error;
    use crate::offsets::{Bitwidths, Target};
    use crate::topology::DeviceConfig;
    use crate::usb::{DeviceDescriptor, BCD_USB_2_1, BCD_USB_3_0};

    fn compiler() -> DescriptorCompiler<Vec<u8>> {
        DescriptorCompiler::new(Artifacts::in_memory(), Bitwidths::default()).unwrap()
    }

    #[test]
    fn device_copies_differ_only_in_version_and_ep0() {
        let mut c = compiler();
        c.device("DEVICE", &DeviceConfig::default()).unwrap();
        let finished = c.finish().unwrap();

        let usb2_bin = &finished.artifacts.usb2_bin;
        let usb3_bin = &finished.artifacts.usb3_bin;
        let usb2: DeviceDescriptor = *plain::from_bytes(&usb2_bin[..18]).unwrap();
        let usb3: DeviceDescriptor = *plain::from_bytes(&usb3_bin[..18]).unwrap();

        assert_eq!(u16::from_le(usb2.usb), BCD_USB_2_1);
        assert_eq!(u16::from_le(usb3.usb), BCD_USB_3_0);
        assert_eq!((usb2.major_usb_vers(), usb2.minor_usb_vers()), (0x02, 0x10));
        assert_eq!(usb2.packet_size, 64);
        assert_eq!(usb3.packet_size, 9);

        // Everything but bcdUSB (2..4) and bMaxPacketSize0 (7) is shared.
        for i in (0..18).filter(|i| !matches!(i, 2 | 3 | 7)) {
            assert_eq!(usb2_bin[i], usb3_bin[i], "byte {}", i);
        }
        assert_eq!(&usb2_bin[8..12], &[0x50, 0x1D, 0x5A, 0x60]);
        // Padded to a whole word.
        assert_eq!(&usb3_bin[18..20], &[0, 0]);
    }

    #[test]
    fn qualifier_only_reaches_usb2() {
        let mut c = compiler();
        c.device_qualifier("DEVICE_QUAL", &DeviceConfig::default())
            .unwrap();
        assert_eq!(c.table().get("DEVICE_QUAL", Target::Usb2), Some(0));
        assert_eq!(c.table().get("DEVICE_QUAL", Target::Usb3), None);
        assert_eq!(c.stream(Target::Usb2).bytes_persisted(), 10);
        assert_eq!(c.stream(Target::Usb3).bytes_persisted(), 0);
    }

    #[test]
    fn string_lengths() {
        let mut c = compiler();
        assert_eq!(c.languages(0x0409).unwrap(), 4);
        assert_eq!(c.string(1, "").unwrap(), 2);
        assert_eq!(c.string(2, "Daisho USB test").unwrap(), 2 + 2 * 15);
        assert_eq!(c.table().get("STRING2", Target::Usb2), Some(6));
        assert_eq!(c.table().get("STRING2", Target::Usb3), Some(2));

        let finished = c.finish().unwrap();
        let usb2 = &finished.artifacts.usb2_bin;
        assert_eq!(&usb2[..4], &[4, 3, 0x09, 0x04]);
        assert_eq!(&usb2[6..12], &[32, 3, b'D', 0, b'a', 0]);
    }

    #[test]
    fn string_zero_copies_raw_bytes() {
        let mut c = compiler();
        assert_eq!(c.string(0, "\x09\x04").unwrap(), 4);
        let finished = c.finish().unwrap();
        assert_eq!(&finished.artifacts.usb3_bin[..4], &[4, 3, 0x09, 0x04]);
    }

    #[test]
    fn bad_strings_are_rejected() {
        let mut c = compiler();
        assert!(matches!(
            c.string(1, "Grüße"),
            Err(Error::NonAsciiString { index: 1 })
        ));
        assert!(matches!(
            c.string(2, &"x".repeat(127)),
            Err(Error::StringTooLong { index: 2, len: 256 })
        ));
        assert_eq!(c.string(3, &"x".repeat(126)).unwrap(), 254);
        // Nothing was recorded for the rejected strings.
        assert_eq!(c.table().len(), 2);
    }

    #[test]
    fn bos_length_is_computed() {
        let mut c = compiler();
        assert_eq!(c.bos("BOS").unwrap(), 22);
        assert_eq!(c.table().get("BOS", Target::Usb2), None);

        let finished = c.finish().unwrap();
        assert_eq!(
            &finished.artifacts.usb3_bin[..12],
            &[0x05, 0x0F, 22, 0, 2, 0x07, 0x10, 0x02, 0x02, 0, 0, 0]
        );
        assert_eq!(
            &finished.artifacts.usb3_bin[12..24],
            &[0x0A, 0x10, 0x03, 0x00, 0x0E, 0x00, 0x02, 0x08, 0x64, 0x00, 0, 0]
        );
        assert!(finished.artifacts.usb2_bin.iter().all(|&b| b == 0));
    }

    #[test]
    fn markers_and_eof() {
        let mut c = compiler();
        c.set_markers("CONFUNSET", "CONFSET").unwrap();
        c.mark("EOF").unwrap();
        assert!(matches!(
            c.mark("EOF"),
            Err(Error::DuplicateConstant { .. })
        ));

        let table = c.table();
        assert_eq!(table.get("CONFSET", Target::Usb2), Some(1));
        assert_eq!(table.get("CONFSET", Target::Usb3), Some(1));
        assert_eq!(table.get("EOF", Target::Usb2), Some(2));
        assert_eq!(table.get("EOF", Target::Usb3), Some(2));

        let finished = c.finish().unwrap();
        assert_eq!(&finished.artifacts.usb2_bin[..2], &[0, 1]);
        assert_eq!(&finished.artifacts.usb3_bin[..8], &[0, 0, 0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn overflowing_a_memory_is_an_error() {
        let bitwidths = Bitwidths { usb2: 4, usb3: 7 };
        let mut c = DescriptorCompiler::new(Artifacts::in_memory(), bitwidths).unwrap();
        c.device("DEVICE", &DeviceConfig::default()).unwrap();
        assert!(matches!(
            c.finish(),
            Err(Error::RomOverflow { target: Target::Usb2, len: 18, capacity: 16 })
        ));
    }

    #[test]
    fn zero_bitwidth_is_rejected() {
        let bitwidths = Bitwidths { usb2: 8, usb3: 0 };
        assert!(matches!(
            DescriptorCompiler::new(Artifacts::in_memory(), bitwidths),
            Err(Error::InvalidBitwidth { target: Target::Usb3, bits: 0 })
        ));
    }
}
