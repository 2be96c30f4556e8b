//! # IO96B CSR block
//!
//! Each IO96B instance contains an I/O subsystem manager (IOSSM) which calibrates the attached
//! memory interfaces. The IOSSM is controlled through a mailbox which is part of this register
//! block.
use arbitrary_int::{u3, u4, u5};

pub const IO96B_0_CSR_BASE_ADDR: usize = 0x1840_0000;
pub const IO96B_1_CSR_BASE_ADDR: usize = 0x1880_0000;

/// Maximum number of IO96B instances available on the device.
pub const MAX_IO96B_INSTANCES: usize = 2;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Io96bInstance {
    Io96b0 = 0,
    Io96b1 = 1,
}

impl Io96bInstance {
    pub const ALL: [Self; MAX_IO96B_INSTANCES] = [Self::Io96b0, Self::Io96b1];

    #[inline]
    pub const fn base_addr(&self) -> usize {
        match self {
            Io96bInstance::Io96b0 => IO96B_0_CSR_BASE_ADDR,
            Io96bInstance::Io96b1 => IO96B_1_CSR_BASE_ADDR,
        }
    }
}

#[bitbybit::bitfield(u32)]
#[derive(Debug, PartialEq, Eq)]
pub struct IossmStatus {
    #[bit(2, r)]
    cal_busy: bool,
    #[bit(1, r)]
    cal_fail: bool,
    #[bit(0, r)]
    cal_success: bool,
}

/// Mailbox command request word. Writing it starts the command.
#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct CommandRequest {
    #[bits(29..=31, rw)]
    ip_type: u3,
    #[bits(24..=28, rw)]
    ip_instance_id: u5,
    #[bits(16..=23, rw)]
    cmd_type: u8,
    #[bits(0..=15, rw)]
    cmd_opcode: u16,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct CommandResponseStatus {
    /// Short response data, the meaning depends on the command.
    #[bits(16..=31, rw)]
    data_short: u16,
    #[bits(1..=4, rw)]
    error_code: u4,
    #[bit(0, rw)]
    ready: bool,
}

/// Memory interface descriptor as returned by the memory interface info command.
#[bitbybit::bitfield(u32)]
#[derive(Debug, PartialEq, Eq)]
pub struct MemInterfaceInfo {
    #[bits(29..=31, r)]
    ip_type: u3,
    #[bits(24..=28, r)]
    ip_instance_id: u5,
}

#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct Io96bCsr {
    _gap0: [u32; 0x100],

    #[mmio(PureRead)]
    iossm_status: IossmStatus,

    _gap1: [u32; 0x07],

    cmd_param_6: u32,
    cmd_param_5: u32,
    cmd_param_4: u32,
    cmd_param_3: u32,
    cmd_param_2: u32,
    cmd_param_1: u32,
    cmd_param_0: u32,
    cmd_req: CommandRequest,

    _gap2: [u32; 0x04],

    cmd_response_data_2: u32,
    cmd_response_data_1: u32,
    cmd_response_data_0: u32,
    cmd_response_status: CommandResponseStatus,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Io96bCsr>(), 0x460);

impl Io96bCsr {
    /// Create a new handle to the CSR block of the given IO96B instance.
    ///
    /// # Safety
    ///
    /// If you create multiple instances of this handle at the same time, you are responsible for
    /// ensuring that there are no read-modify-write races on any of the registers.
    #[inline]
    pub const unsafe fn new_mmio_fixed(instance: Io96bInstance) -> MmioIo96bCsr<'static> {
        unsafe { Self::new_mmio_at(instance.base_addr()) }
    }
}
