#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct ConfigDescriptor {
    pub length: u8,
    pub kind: u8,
    pub total_length: u16,
    pub interfaces: u8,
    pub configuration_value: u8,
    pub configuration_str: u8,
    pub attributes: u8,
    pub max_power: u8,
}

unsafe impl plain::Plain for ConfigDescriptor {}

impl ConfigDescriptor {
    pub const LEN: u8 = 9;

    /// Byte offset of `wTotalLength`, which can only be filled in once every interface,
    /// endpoint and companion descriptor of the configuration has been written.
    pub const TOTAL_LENGTH_OFFSET: usize = 2;

    /// Written in place of `wTotalLength` until the configuration is closed.
    pub const TOTAL_LENGTH_PLACEHOLDER: u16 = 0xFFFF;

    /// Encodes `bMaxPower`, which counts 2 mA units on USB2 and 8 mA units on USB3.
    pub fn max_power_units(usb_spec: u16, power_ma: u32) -> u8 {
        let units = if usb_spec >= super::BCD_USB_3_0 {
            power_ma / 8
        } else {
            power_ma / 2
        };
        u8::try_from(units).unwrap_or(u8::MAX)
    }
}
