#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct BosDescriptor {
    pub len: u8,
    pub kind: u8,
    pub total_len: u16,
    pub cap_count: u8,
}

unsafe impl plain::Plain for BosDescriptor {}

impl BosDescriptor {
    pub const LEN: u8 = 5;
    pub const TOTAL_LEN_OFFSET: usize = 2;
}

#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct BosSuperSpeedDesc {
    pub len: u8,
    pub kind: u8,
    pub cap_ty: u8,

    pub attrs: u8,
    pub speed_supp: u16,
    pub func_supp: u8,
    pub u1_dev_exit_lat: u8,
    pub u2_dev_exit_lat: u16,
}

unsafe impl plain::Plain for BosSuperSpeedDesc {}

impl BosSuperSpeedDesc {
    pub const LEN: u8 = 10;

    /// wSpeedsSupported: full, high and SuperSpeed operation.
    pub const SPEEDS_FS_HS_SS: u16 = 0x000E;
    /// bFunctionalitySupport: full functionality is available from high speed upwards.
    pub const FUNCTIONALITY_FROM_HS: u8 = 0x02;
    /// bU1DevExitLat in microseconds.
    pub const U1_EXIT_LATENCY_US: u8 = 8;
    /// wU2DevExitLat in microseconds.
    pub const U2_EXIT_LATENCY_US: u16 = 100;
}

#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct BosUsb2ExtDesc {
    pub len: u8,
    pub kind: u8,
    pub cap_ty: u8,

    pub attrs: u32,
}

unsafe impl plain::Plain for BosUsb2ExtDesc {}

impl BosUsb2ExtDesc {
    pub const LEN: u8 = 7;

    /// Link Power Management supported (required for SuperSpeed devices).
    pub const ATTR_LPM: u32 = 1 << 1;
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeviceCapability {
    Usb2Ext = 0x02,
    SuperSpeed,
}
