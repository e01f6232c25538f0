//! The Universal Serial Bus (USB) descriptor layouts
//!
//! Every structure in this module is `#[repr(C, packed)]` and mirrors the wire layout of the
//! descriptor it names, so that [bytes_of] yields exactly the bytes a device returns for
//! `GET_DESCRIPTOR`. Multi-byte fields are stored little-endian; construct them with
//! `u16::to_le` / `u32::to_le`.
//!
//! The [Universal Serial Bus Specification](https://www.usb.org/document-library/usb-20-specification) and the [Universal Serial Bus 3.2 Specification](https://usb.org/document-library/usb-32-revision-11-june-2022) are
//! the documents that inform this implementation.
//!
//! See the crate-level documentation for the acronyms used to refer to specific documents.
pub use self::bos::{BosDescriptor, BosSuperSpeedDesc, BosUsb2ExtDesc, DeviceCapability};
pub use self::config::ConfigDescriptor;
pub use self::device::{DeviceDescriptor, DeviceQualifier};
pub use self::endpoint::{EndpointDescriptor, SuperSpeedCompanionDescriptor, ENDP_ADDR_DIR_IN};
pub use self::interface::InterfaceDescriptor;

/// USB 2.0 in binary-coded decimal.
pub const BCD_USB_2_0: u16 = 0x0200;
/// USB 2.1, advertised by USB3 devices on their high-speed fallback descriptors.
pub const BCD_USB_2_1: u16 = 0x0210;
/// USB 3.0 in binary-coded decimal.
pub const BCD_USB_3_0: u16 = 0x0300;

/// Enumerates the descriptor kinds written into the descriptor memories. (See USB32 Sections
/// 9.5 and 9.6)
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum DescriptorKind {
    /// A Device Descriptor. See [DeviceDescriptor]
    Device = 1,
    /// A Configuration Descriptor. See [ConfigDescriptor]
    Configuration = 2,
    /// A String Descriptor. See (USB32 Section 9.6.9).
    String = 3,
    /// An Interface Descriptor. See [InterfaceDescriptor]
    Interface = 4,
    /// An Endpoint Descriptor. See [EndpointDescriptor]
    Endpoint = 5,
    /// A Device Qualifier. USB2-specific. See [DeviceQualifier]
    DeviceQualifier = 6,
    /// A Binary Device Object Store Descriptor. See [BosDescriptor]
    BinaryObjectStorage = 15,
    /// A Device Capability inside a BOS. See [DeviceCapability]
    DeviceCapability = 16,
    /// A Super Speed Endpoint Companion Descriptor. See [SuperSpeedCompanionDescriptor]
    SuperSpeedCompanion = 48,
}

/// Returns the wire bytes of a packed descriptor.
pub fn bytes_of<T: plain::Plain>(desc: &T) -> &[u8] {
    unsafe { plain::as_bytes(desc) }
}

pub(crate) mod bos;
pub(crate) mod config;
pub(crate) mod device;
pub(crate) mod endpoint;
pub(crate) mod interface;
