//! Implements the "Device" and "Device Qualifier" USB Descriptors.
//!
//! These descriptors are described in USB32 section 9.6.1 and USB2 section 9.6.2

/// A USB Device Descriptor.
///
/// This is common to all USB standards, and "provides information that applies globally to the
/// device and all the device's configurations" (USB32 9.6.1)
///
/// USB32 Table 9-11 describes the USB packet offsets of the fields described by this structure.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct DeviceDescriptor {
    /// The bLength field in USB32 Table 9-11
    pub length: u8,
    /// The bDescriptorType field in USB32 Table 9-11.
    pub kind: u8,
    /// The USB standard version in binary-coded decimal.
    ///
    /// USB 2.1 would be encoded as 210H, 3.2 would be 320H.
    pub usb: u16,
    /// bDeviceClass in USB32 Table 9-11. FF is vendor-specific.
    pub class: u8,
    /// bDeviceSubClass in USB32 Table 9-11
    pub sub_class: u8,
    /// bDeviceProtocol in USB32 Table 9-11
    pub protocol: u8,
    /// The maximum packet size for endpoint 0.
    ///
    /// A byte count for USB2. For USB3 this is an exponent, and must be 9 (512 bytes).
    pub packet_size: u8,
    /// idVendor in USB32 Table 9-11
    pub vendor: u16,
    /// idProduct in USB32 Table 9-11
    pub product: u16,
    /// bcdDevice in USB32 Table 9-11
    pub release: u16,
    /// iManufacturer in USB32 Table 9-11
    pub manufacturer_str: u8,
    /// iProduct in Table 9-11
    pub product_str: u8,
    /// iSerialNumber in USB32 Table 9-11
    pub serial_str: u8,
    /// bNumConfigurations in USB32 Table 9-11
    pub configurations: u8,
}

unsafe impl plain::Plain for DeviceDescriptor {}

impl DeviceDescriptor {
    pub const LEN: u8 = 18;

    /// Gets the USB Minor Version
    pub fn minor_usb_vers(&self) -> u8 {
        (u16::from_le(self.usb) & 0xFF) as u8
    }
    /// Gets the USB Major Version
    pub fn major_usb_vers(&self) -> u8 {
        ((u16::from_le(self.usb) >> 8) & 0xFF) as u8
    }
}

/// A Device Qualifier Descriptor
///
/// This is a descriptor specific to the USB2 standard. A high-speed capable device uses it to
/// describe how it would look at the other speed, so it only ever goes into the USB2 memory.
///
/// The packet offsets are described in USB2 Table 9-9
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct DeviceQualifier {
    /// bLength in USB2 Table 9-9
    pub length: u8,
    /// bDescriptorType in USB2 Table 9-9
    pub kind: u8,
    /// bcdUSB in USB2 Table 9-9
    pub usb: u16,
    /// bDeviceClass in USB2 Table 9-9
    pub class: u8,
    /// bDeviceSubClass in USB2 Table 9-9
    pub sub_class: u8,
    /// bDeviceProtocol in USB2 Table 9-9
    pub protocol: u8,
    /// bMaxPacketSize0 in USB2 Table9-9
    pub pkgsz_other_speed: u8,
    /// bNumConfigurations in USB2 Table 9-9
    pub num_other_speed_cfgs: u8,
    /// bReserved in USB2 Table 9-9
    pub _rsvd: u8,
}

unsafe impl plain::Plain for DeviceQualifier {}

impl DeviceQualifier {
    pub const LEN: u8 = 10;
}
