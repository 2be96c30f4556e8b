//! # DDR and MPFE firewalls
use arbitrary_int::u4;

pub const DDR_FW_DMI0_BASE_ADDR: usize = 0x1800_0800;
pub const DDR_FW_DMI1_BASE_ADDR: usize = 0x1800_0A00;
pub const MPFE_FW_BASE_ADDR: usize = 0x1800_0D00;

/// Number of MPU and non-MPU regions per DDR firewall.
pub const NUM_FIREWALL_REGIONS: usize = 4;

/// DDR memory interface of the CCU. Each DMI has its own firewall.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Dmi {
    Dmi0 = 0,
    Dmi1 = 1,
}

impl Dmi {
    #[inline]
    pub const fn base_addr(&self) -> usize {
        match self {
            Dmi::Dmi0 => DDR_FW_DMI0_BASE_ADDR,
            Dmi::Dmi1 => DDR_FW_DMI1_BASE_ADDR,
        }
    }
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct RegionEnable {
    /// One bit per non-MPU region.
    #[bits(8..=11, rw)]
    non_mpu: u4,
    /// One bit per MPU region.
    #[bits(0..=3, rw)]
    mpu: u4,
}

/// Address window of a firewall region. The extension registers hold address bits 32 to 39.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct FirewallRegion {
    base: u32,
    base_ext: u32,
    limit: u32,
    limit_ext: u32,
}

#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct DdrFirewall {
    enable: RegionEnable,
    enable_set: RegionEnable,
    enable_clear: RegionEnable,
    _gap0: u32,
    #[mmio(Inner)]
    mpu_region_0: FirewallRegion,
    #[mmio(Inner)]
    mpu_region_1: FirewallRegion,
    #[mmio(Inner)]
    mpu_region_2: FirewallRegion,
    #[mmio(Inner)]
    mpu_region_3: FirewallRegion,
    _gap1: [u32; 0x10],
    #[mmio(Inner)]
    non_mpu_region_0: FirewallRegion,
    #[mmio(Inner)]
    non_mpu_region_1: FirewallRegion,
    #[mmio(Inner)]
    non_mpu_region_2: FirewallRegion,
    #[mmio(Inner)]
    non_mpu_region_3: FirewallRegion,
}

static_assertions::const_assert_eq!(core::mem::size_of::<DdrFirewall>(), 0xD0);

impl DdrFirewall {
    /// Create a new handle to the firewall of the given DMI.
    ///
    /// # Safety
    ///
    /// If you create multiple instances of this handle at the same time, you are responsible for
    /// ensuring that there are no read-modify-write races on any of the registers.
    #[inline]
    pub const unsafe fn new_mmio_fixed(dmi: Dmi) -> MmioDdrFirewall<'static> {
        unsafe { Self::new_mmio_at(dmi.base_addr()) }
    }
}

/// Firewall for the CSR blocks behind the MPFE. Writing one to a register opens the CSR block
/// for non-secure accesses.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct MpfeFirewall {
    io96b0_reg: u32,
    io96b1_reg: u32,
    noc_csr: u32,
}

static_assertions::const_assert_eq!(core::mem::size_of::<MpfeFirewall>(), 0x0C);

impl MpfeFirewall {
    /// Create a new handle to this peripheral.
    ///
    /// # Safety
    ///
    /// If you create multiple instances of this handle at the same time, you are responsible for
    /// ensuring that there are no read-modify-write races on any of the registers.
    #[inline]
    pub const unsafe fn new_mmio_fixed() -> MmioMpfeFirewall<'static> {
        unsafe { Self::new_mmio_at(MPFE_FW_BASE_ADDR) }
    }
}
