//! # MPFE NoC sideband manager
pub const F2SDRAM_MGR_BASE_ADDR: usize = 0x1800_1000;

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct SidebandFlags {
    #[bit(5, rw)]
    dual_emif: bool,
    #[bit(4, rw)]
    dual_port: bool,
}

/// Sideband manager register block. Writing a one to a flag inside the set or clear register
/// sets or clears the corresponding status flag.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct SidebandManager {
    _gap0: [u32; 0x14],
    flagoutset0: SidebandFlags,
    flagoutclr0: SidebandFlags,
    flagoutstatus0: SidebandFlags,
}

static_assertions::const_assert_eq!(core::mem::size_of::<SidebandManager>(), 0x5C);

impl SidebandManager {
    /// Create a new handle to this peripheral.
    ///
    /// # Safety
    ///
    /// If you create multiple instances of this handle at the same time, you are responsible for
    /// ensuring that there are no read-modify-write races on any of the registers.
    #[inline]
    pub const unsafe fn new_mmio_fixed() -> MmioSidebandManager<'static> {
        unsafe { Self::new_mmio_at(F2SDRAM_MGR_BASE_ADDR) }
    }
}
