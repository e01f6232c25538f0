//! The descriptor set to compile, and the fixed order it is compiled in.
//!
//! A topology is normally read from TOML; every key is optional and falls back to the values of
//! the Daisho USB 3.0 test device:
//!
//! ```toml
//! bitwidth_usb2 = 8
//! bitwidth_usb3 = 7
//!
//! [device]
//! vendor = 0x1D50
//! product = 0x605A
//!
//! [[config.endpoints]]
//! number = 1
//! direction = "in"
//! ```

use std::io::Write;

use serde::Deserialize;

use crate::compiler::{Artifacts, DescriptorCompiler, Finished};
use crate::error::Result;
use crate::offsets::Bitwidths;
use crate::usb::BCD_USB_3_0;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Topology {
    pub bitwidth_usb2: u8,
    pub bitwidth_usb3: u8,
    /// The USB version the core implements, in binary-coded decimal.
    pub usb_spec: u16,
    /// Language ID listed by string descriptor 0.
    pub language: u16,
    pub device: DeviceConfig,
    pub config: ConfigConfig,
    /// Strings 1, 2, 3...
    pub strings: Vec<String>,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            bitwidth_usb2: 8,
            bitwidth_usb3: 7,
            usb_spec: BCD_USB_3_0,
            language: 0x0409,
            device: DeviceConfig::default(),
            config: ConfigConfig::default(),
            strings: vec![
                "Great Scott Gadgets".to_owned(),
                "Daisho USB test".to_owned(),
                "DAISHOUSB000".to_owned(),
            ],
        }
    }
}

impl Topology {
    pub fn from_toml(data: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(data)
    }

    pub fn bitwidths(&self) -> Bitwidths {
        Bitwidths {
            usb2: self.bitwidth_usb2,
            usb3: self.bitwidth_usb3,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    pub class: u8,
    pub sub_class: u8,
    pub protocol: u8,
    /// Endpoint 0 packet size on USB2. USB3 always uses 512.
    pub max_packet_size0: u8,
    pub vendor: u16,
    pub product: u16,
    pub release: u16,
    pub manufacturer_str: u8,
    pub product_str: u8,
    pub serial_str: u8,
    pub configurations: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            class: 0xFF,
            sub_class: 0xFF,
            protocol: 0xFF,
            max_packet_size0: 64,
            vendor: 0x1D50,
            product: 0x605A,
            release: 0x0001,
            manufacturer_str: 1,
            product_str: 2,
            serial_str: 3,
            configurations: 1,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigConfig {
    /// bmAttributes; 0x80 is bus powered, 0xC0 self powered.
    pub attributes: u8,
    pub power_ma: u32,
    pub interface: InterfaceConfig,
    pub endpoints: Vec<EndpointConfig>,
}

impl Default for ConfigConfig {
    fn default() -> Self {
        Self {
            attributes: 0x80,
            power_ma: 500,
            interface: InterfaceConfig::default(),
            endpoints: vec![
                EndpointConfig {
                    number: 1,
                    direction: Direction::In,
                    ..EndpointConfig::default()
                },
                EndpointConfig {
                    number: 2,
                    direction: Direction::Out,
                    ..EndpointConfig::default()
                },
            ],
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct InterfaceConfig {
    pub class: u8,
    pub sub_class: u8,
    pub protocol: u8,
    pub interface_str: u8,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            class: 0xFF,
            sub_class: 0xFF,
            protocol: 0xFF,
            interface_str: 2,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointConfig {
    pub number: u8,
    pub direction: Direction,
    /// bmAttributes; 2 is bulk.
    pub attributes: u8,
    /// USB2 packet size. USB3 bulk and interrupt endpoints always use 1024.
    pub max_packet_size: u16,
    pub interval: u8,
    /// Packets per SuperSpeed burst, 1 to 16.
    pub max_burst: u8,
    /// bmAttributes of the SuperSpeed companion (stream support).
    pub ss_attributes: u8,
    pub bytes_per_interval: u16,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            number: 1,
            direction: Direction::In,
            attributes: 0x02,
            max_packet_size: 512,
            interval: 1,
            max_burst: 16,
            ss_attributes: 0,
            bytes_per_interval: 0,
        }
    }
}

/// Compiles `topology` into `artifacts`: the device, its qualifier, the configuration, the
/// BOS, the strings and the set markers, in that order.
pub fn compile<W: Write>(topology: &Topology, artifacts: Artifacts<W>) -> Result<Finished<W>> {
    let mut compiler = DescriptorCompiler::new(artifacts, topology.bitwidths())?;

    compiler.device("DEVICE", &topology.device)?;
    compiler.device_qualifier("DEVICE_QUAL", &topology.device)?;

    let mut group = compiler.open_config("CONFIG", topology.usb_spec, &topology.config)?;
    for endpoint in &topology.config.endpoints {
        group.add_endpoint(endpoint)?;
    }
    let lengths = group.close()?;
    compiler.record_constant(
        "CONFIG_LEN",
        Some(u32::from(lengths.usb2)),
        Some(u32::from(lengths.usb3)),
    )?;

    let bos_len = compiler.bos("BOS")?;
    compiler.record_constant("BOS_LEN", None, Some(u32::from(bos_len)))?;

    compiler.languages(topology.language)?;
    if topology.strings.len() > usize::from(u8::MAX) {
        log::warn!(
            "only the first {} of {} strings can be indexed",
            u8::MAX,
            topology.strings.len()
        );
    }
    for (index, text) in (1..=u8::MAX).zip(&topology.strings) {
        compiler.string(index, text)?;
    }

    compiler.set_markers("CONFUNSET", "CONFSET")?;
    compiler.mark("EOF")?;

    compiler.finish()
}

#[cfg(test)]
mod test {
    use super::{Direction, Topology};

    #[test]
    fn partial_toml_keeps_defaults() {
        let topology = Topology::from_toml(
            r#"
            bitwidth_usb2 = 9
            strings = ["Acme", "Widget"]

            [device]
            vendor = 0x1209
            product = 0x0001

            [[config.endpoints]]
            number = 3
            direction = "out"
            max_burst = 4
            "#,
        )
        .unwrap();

        assert_eq!(topology.bitwidth_usb2, 9);
        assert_eq!(topology.bitwidth_usb3, 7);
        assert_eq!(topology.device.vendor, 0x1209);
        assert_eq!(topology.device.class, 0xFF);
        assert_eq!(topology.config.power_ma, 500);
        assert_eq!(topology.config.endpoints.len(), 1);

        let endpoint = &topology.config.endpoints[0];
        assert_eq!(endpoint.number, 3);
        assert_eq!(endpoint.direction, Direction::Out);
        assert_eq!(endpoint.max_burst, 4);
        assert_eq!(endpoint.max_packet_size, 512);
        assert_eq!(topology.strings, ["Acme", "Widget"]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Topology::from_toml("bitwidth = 8").is_err());
    }

    #[test]
    fn empty_toml_is_the_default_topology() {
        assert_eq!(Topology::from_toml("").unwrap(), Topology::default());
    }
}
