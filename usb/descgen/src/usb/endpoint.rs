use plain::Plain;

/// The descriptor for a USB Endpoint.
///
/// Each endpoint for a particular interface has its own descriptor. The information in this
/// structure is used by the host to determine the bandwidth requirements of the endpoint.
///
/// This is returned automatically when you send a request for a ConfigurationDescriptor,
/// and cannot be requested individually.
///
/// See USB32 9.6.6
///
/// The offsets for the fields in the packet are described in USB32 Table 9-26
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct EndpointDescriptor {
    pub length: u8,
    pub kind: u8,
    pub address: u8,
    pub attributes: u8,
    pub max_packet_size: u16,
    pub interval: u8,
}

/// Set in [EndpointDescriptor].address for device-to-host endpoints.
pub const ENDP_ADDR_DIR_IN: u8 = 0x80;

impl EndpointDescriptor {
    pub const LEN: u8 = 7;

    /// Fixed `wMaxPacketSize` of SuperSpeed bulk and interrupt endpoints.
    pub const SUPERSPEED_MAX_PACKET_SIZE: u16 = 1024;

    pub fn is_in(self) -> bool {
        self.address & ENDP_ADDR_DIR_IN != 0
    }
}

unsafe impl Plain for EndpointDescriptor {}

/// Follows every endpoint descriptor of a SuperSpeed configuration. USB2 hosts never see it.
///
/// See USB32 9.6.7 and Table 9-27
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct SuperSpeedCompanionDescriptor {
    pub length: u8,
    pub kind: u8,
    /// Number of packets in a burst, minus one.
    pub max_burst: u8,
    pub attributes: u8,
    pub bytes_per_interval: u16,
}
unsafe impl Plain for SuperSpeedCompanionDescriptor {}

impl SuperSpeedCompanionDescriptor {
    pub const LEN: u8 = 6;
}
