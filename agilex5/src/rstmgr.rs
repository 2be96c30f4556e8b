//! # Reset manager
pub const RSTMGR_BASE_ADDR: usize = 0x10D1_1000;

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct BridgeReset {
    #[bit(6, rw)]
    ddr_scheduler: bool,
    #[bit(5, rw)]
    f2sdram2: bool,
    #[bit(4, rw)]
    f2sdram1: bool,
    #[bit(3, rw)]
    f2sdram0: bool,
    #[bit(2, rw)]
    fpga2soc: bool,
    #[bit(1, rw)]
    lwsoc2fpga: bool,
    #[bit(0, rw)]
    soc2fpga: bool,
}

impl BridgeReset {
    /// Bridges which are never put into reset when the bridges are disabled.
    pub const KEEP_ACTIVE_MASK: u32 = (1 << 6) | (1 << 2);
}

#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct ResetManager {
    _gap0: [u32; 0x0B],
    /// Bridge module reset register.
    brgmodrst: BridgeReset,
}

static_assertions::const_assert_eq!(core::mem::size_of::<ResetManager>(), 0x30);

impl ResetManager {
    /// Create a new handle to this peripheral.
    ///
    /// # Safety
    ///
    /// If you create multiple instances of this handle at the same time, you are responsible for
    /// ensuring that there are no read-modify-write races on any of the registers.
    #[inline]
    pub const unsafe fn new_mmio_fixed() -> MmioResetManager<'static> {
        unsafe { Self::new_mmio_at(RSTMGR_BASE_ADDR) }
    }
}
