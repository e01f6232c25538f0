//! The configuration descriptor group.
//!
//! A configuration is sent as one block: the configuration descriptor followed by every
//! interface, endpoint and companion descriptor, with the length of the whole block in the
//! leading `wTotalLength`. That length is only known once the last record is written, and it
//! differs between the memories because only USB3 carries companion descriptors. Both streams
//! therefore hold the group in memory until [ConfigGroup::close] patches the lengths in.

use std::io::Write;

use crate::compiler::DescriptorCompiler;
use crate::error::{Error, Result};
use crate::offsets::Target;
use crate::topology::{ConfigConfig, Direction, EndpointConfig};
use crate::usb::*;

/// `wTotalLength` of a closed group, per memory.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GroupLengths {
    pub usb2: u16,
    pub usb3: u16,
}

/// An open configuration. Borrows the compiler, so nothing else can be emitted until the group
/// is closed.
pub struct ConfigGroup<'a, W: Write> {
    compiler: &'a mut DescriptorCompiler<W>,
    interface: InterfaceDescriptor,
    start_usb2: u32,
    start_usb3: u32,
    pending_usb2: usize,
    pending_usb3: usize,
    endpoints: u8,
    closed: bool,
}

impl<W: Write> DescriptorCompiler<W> {
    /// Opens the configuration group and writes its configuration and primary interface
    /// descriptors.
    ///
    /// `usb_spec` selects the unit of `bMaxPower`; both memories get the same value.
    pub fn open_config(
        &mut self,
        name: &str,
        usb_spec: u16,
        config: &ConfigConfig,
    ) -> Result<ConfigGroup<'_, W>> {
        if self.usb2.is_held() || self.usb3.is_held() {
            return Err(Error::GroupAlreadyOpen);
        }
        self.record_offsets(name, &Target::ALL)?;

        let header = ConfigDescriptor {
            length: ConfigDescriptor::LEN,
            kind: DescriptorKind::Configuration as u8,
            total_length: ConfigDescriptor::TOTAL_LENGTH_PLACEHOLDER.to_le(),
            interfaces: 1,
            configuration_value: 1,
            configuration_str: 0,
            attributes: config.attributes,
            max_power: ConfigDescriptor::max_power_units(usb_spec, config.power_ma),
        };
        let interface = InterfaceDescriptor {
            length: InterfaceDescriptor::LEN,
            kind: DescriptorKind::Interface as u8,
            number: 0,
            alternate_setting: 0,
            // Filled in on close.
            endpoints: 0,
            class: config.interface.class,
            sub_class: config.interface.sub_class,
            protocol: config.interface.protocol,
            interface_str: config.interface.interface_str,
        };

        self.scratch2.clear();
        self.scratch2.push_desc(&header)?;
        self.scratch2.push_desc(&interface)?;
        // USB3 is a superset: it starts from the USB2 bytes.
        self.scratch3.clear();
        self.scratch3.push(self.scratch2.as_bytes())?;

        let start_usb2 = self.usb2.hold()?;
        let start_usb3 = self.usb3.hold()?;
        self.usb2.append(self.scratch2.as_bytes())?;
        self.usb3.append(self.scratch3.as_bytes())?;

        Ok(ConfigGroup {
            pending_usb2: self.scratch2.len(),
            pending_usb3: self.scratch3.len(),
            compiler: self,
            interface,
            start_usb2,
            start_usb3,
            endpoints: 0,
            closed: false,
        })
    }
}

impl<'a, W: Write> ConfigGroup<'a, W> {
    /// Start offset of the group in the given memory.
    pub fn start(&self, target: Target) -> u32 {
        match target {
            Target::Usb2 => self.start_usb2,
            Target::Usb3 => self.start_usb3,
        }
    }

    /// Bytes written to the given memory since the group was opened.
    pub fn pending(&self, target: Target) -> usize {
        match target {
            Target::Usb2 => self.pending_usb2,
            Target::Usb3 => self.pending_usb3,
        }
    }

    /// Appends an endpoint of the primary interface.
    ///
    /// The USB3 copy has its packet size raised to 1024 and is followed by a SuperSpeed
    /// companion descriptor.
    pub fn add_endpoint(&mut self, endpoint: &EndpointConfig) -> Result<&mut Self> {
        let c = &mut *self.compiler;

        let address = match endpoint.direction {
            Direction::In => endpoint.number | ENDP_ADDR_DIR_IN,
            Direction::Out => endpoint.number & !ENDP_ADDR_DIR_IN,
        };
        let usb2 = EndpointDescriptor {
            length: EndpointDescriptor::LEN,
            kind: DescriptorKind::Endpoint as u8,
            address,
            attributes: endpoint.attributes,
            max_packet_size: endpoint.max_packet_size.to_le(),
            interval: endpoint.interval,
        };
        let usb3 = EndpointDescriptor {
            max_packet_size: EndpointDescriptor::SUPERSPEED_MAX_PACKET_SIZE.to_le(),
            ..usb2
        };
        let companion = SuperSpeedCompanionDescriptor {
            length: SuperSpeedCompanionDescriptor::LEN,
            kind: DescriptorKind::SuperSpeedCompanion as u8,
            max_burst: endpoint.max_burst.saturating_sub(1),
            attributes: endpoint.ss_attributes,
            bytes_per_interval: endpoint.bytes_per_interval.to_le(),
        };

        c.scratch2.clear();
        c.scratch2.push_desc(&usb2)?;
        c.scratch3.clear();
        c.scratch3.push_desc(&usb3)?;
        c.scratch3.push_desc(&companion)?;

        c.usb2.append(c.scratch2.as_bytes())?;
        c.usb3.append(c.scratch3.as_bytes())?;
        self.pending_usb2 += c.scratch2.len();
        self.pending_usb3 += c.scratch3.len();
        self.endpoints = self.endpoints.saturating_add(1);

        log::debug!(
            "endpoint {:#04x} attributes {:#04x} {}",
            address,
            endpoint.attributes,
            if usb2.is_in() { "in" } else { "out" }
        );
        Ok(self)
    }

    /// Appends the zero-endpoint alternate setting, which lets a host fall back when it cannot
    /// reserve bandwidth for the primary one, then patches `wTotalLength` and the primary
    /// interface's `bNumEndpoints` in both memories and persists the group.
    pub fn close(mut self) -> Result<GroupLengths> {
        let c = &mut *self.compiler;

        let alternate = InterfaceDescriptor {
            alternate_setting: 1,
            endpoints: 0,
            ..self.interface
        };
        c.scratch2.clear();
        c.scratch2.push_desc(&alternate)?;
        c.usb2.append(c.scratch2.as_bytes())?;
        c.usb3.append(c.scratch2.as_bytes())?;
        self.pending_usb2 += c.scratch2.len();
        self.pending_usb3 += c.scratch2.len();

        let usb2 = u16::try_from(self.pending_usb2)
            .map_err(|_| Error::GroupTooLong(self.pending_usb2))?;
        let usb3 = u16::try_from(self.pending_usb3)
            .map_err(|_| Error::GroupTooLong(self.pending_usb3))?;

        let endpoints_offset = usize::from(ConfigDescriptor::LEN) + InterfaceDescriptor::ENDPOINTS_OFFSET;
        for (stream, total) in [(&mut c.usb2, usb2), (&mut c.usb3, usb3)] {
            stream.patch(ConfigDescriptor::TOTAL_LENGTH_OFFSET, &total.to_le_bytes())?;
            stream.patch(endpoints_offset, &[self.endpoints])?;
        }

        c.usb2.release()?;
        c.usb3.release()?;
        self.closed = true;

        log::debug!(
            "configuration closed: {} endpoints, usb2 {} bytes, usb3 {} bytes",
            self.endpoints,
            usb2,
            usb3
        );
        Ok(GroupLengths { usb2, usb3 })
    }
}

impl<'a, W: Write> Drop for ConfigGroup<'a, W> {
    fn drop(&mut self) {
        if !self.closed {
            log::warn!("configuration group dropped without being closed");
        }
    }
}

#[cfg(test)]
mod test {
    use crate::compiler::{Artifacts, DescriptorCompiler};
    use crate::error::Error;
    use crate::offsets::{Bitwidths, Target};
    use crate::topology::{ConfigConfig, DeviceConfig, EndpointConfig};
    use crate::usb::{BCD_USB_2_0, BCD_USB_3_0};

    fn compiler() -> DescriptorCompiler<Vec<u8>> {
        DescriptorCompiler::new(Artifacts::in_memory(), Bitwidths::default()).unwrap()
    }

    #[test]
    fn lengths_match_bytes_appended() {
        let config = ConfigConfig::default();
        for count in 0..4u8 {
            let mut c = compiler();
            c.mark("BEFORE").unwrap();
            c.string(1, "padding").unwrap();

            let mut group = c.open_config("CONFIG", BCD_USB_3_0, &config).unwrap();
            for number in 1..=count {
                group
                    .add_endpoint(&EndpointConfig {
                        number,
                        ..EndpointConfig::default()
                    })
                    .unwrap();
            }
            let before = (group.pending(Target::Usb2), group.pending(Target::Usb3));
            let usb2_start = group.start(Target::Usb2) as usize;
            let usb3_start = group.start(Target::Usb3) as usize * 4;
            let lengths = group.close().unwrap();

            let n = usize::from(count);
            assert_eq!(before, (18 + 7 * n, 18 + 13 * n));
            assert_eq!(usize::from(lengths.usb2), 27 + 7 * n);
            assert_eq!(usize::from(lengths.usb3), 27 + 13 * n);

            assert_eq!(c.table().get("CONFIG", Target::Usb2), Some(usb2_start as u32));
            assert_eq!(c.table().get("CONFIG", Target::Usb3), Some(usb3_start as u32 / 4));
            let usb2_end = c.stream(Target::Usb2).bytes_persisted();
            let usb3_end = c.stream(Target::Usb3).bytes_persisted();
            assert_eq!(usb2_end - usb2_start, usize::from(lengths.usb2));
            assert_eq!(usb3_end - usb3_start, usize::from(lengths.usb3).div_ceil(4) * 4);

            let finished = c.finish().unwrap();
            let usb2 = &finished.artifacts.usb2_bin[usb2_start..];
            let usb3 = &finished.artifacts.usb3_bin[usb3_start..];
            assert_eq!(u16::from_le_bytes([usb2[2], usb2[3]]), lengths.usb2);
            assert_eq!(u16::from_le_bytes([usb3[2], usb3[3]]), lengths.usb3);
            assert_eq!(usb2[9 + 4], count);
            assert_eq!(usb3[9 + 4], count);
        }
    }

    #[test]
    fn usb3_endpoints_carry_companions() {
        let mut c = compiler();
        let mut group = c
            .open_config("CONFIG", BCD_USB_3_0, &ConfigConfig::default())
            .unwrap();
        for endpoint in &ConfigConfig::default().endpoints {
            group.add_endpoint(endpoint).unwrap();
        }
        group.close().unwrap();

        let finished = c.finish().unwrap();
        let usb2 = &finished.artifacts.usb2_bin;
        let usb3 = &finished.artifacts.usb3_bin;

        assert_eq!(&usb2[..9], &[0x09, 0x02, 41, 0, 1, 1, 0, 0x80, 62]);
        assert_eq!(&usb2[18..32], &[
            0x07, 0x05, 0x81, 0x02, 0x00, 0x02, 0x01,
            0x07, 0x05, 0x02, 0x02, 0x00, 0x02, 0x01,
        ]);
        assert_eq!(&usb2[32..41], &[0x09, 0x04, 0, 1, 0, 0xFF, 0xFF, 0xFF, 0x02]);

        assert_eq!(&usb3[..4], &[0x09, 0x02, 53, 0]);
        assert_eq!(&usb3[18..44], &[
            0x07, 0x05, 0x81, 0x02, 0x00, 0x04, 0x01,
            0x06, 0x30, 0x0F, 0x00, 0x00, 0x00,
            0x07, 0x05, 0x02, 0x02, 0x00, 0x04, 0x01,
            0x06, 0x30, 0x0F, 0x00, 0x00, 0x00,
        ]);
        assert_eq!(&usb3[44..53], &usb2[32..41]);
        assert_eq!(&usb3[53..56], &[0, 0, 0]);
    }

    #[test]
    fn usb2_power_units() {
        let mut c = compiler();
        let group = c.open_config("CONFIG", BCD_USB_2_0, &ConfigConfig::default()).unwrap();
        group.close().unwrap();
        let finished = c.finish().unwrap();
        assert_eq!(finished.artifacts.usb2_bin[8], 250);
    }

    #[test]
    fn unclosed_group_poisons_the_run() {
        let mut c = compiler();
        let group = c
            .open_config("CONFIG", BCD_USB_3_0, &ConfigConfig::default())
            .unwrap();
        drop(group);

        assert!(matches!(
            c.open_config("CONFIG2", BCD_USB_3_0, &ConfigConfig::default()),
            Err(Error::GroupAlreadyOpen)
        ));
        assert!(matches!(
            c.device("DEVICE", &DeviceConfig::default()),
            Err(Error::GroupNotClosed)
        ));
        assert!(matches!(c.string(1, "abc"), Err(Error::GroupNotClosed)));
        assert!(matches!(c.bos("BOS"), Err(Error::GroupNotClosed)));
        assert!(matches!(c.mark("EOF"), Err(Error::GroupNotClosed)));
        assert!(matches!(
            c.record_constant("CONFIG_LEN", Some(41), None),
            Err(Error::GroupNotClosed)
        ));

        // Nothing was recorded or written past the configuration header.
        assert_eq!(c.table().len(), 2);
        assert_eq!(c.stream(Target::Usb2).bytes_persisted(), 0);
        assert_eq!(c.stream(Target::Usb3).bytes_persisted(), 0);
        assert!(matches!(c.finish(), Err(Error::GroupNotClosed)));
    }
}
