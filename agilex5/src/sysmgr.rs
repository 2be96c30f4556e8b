//! # System manager
//!
//! Only the registers used during SPL bring-up are described here. The boot scratch registers
//! are used as a communication channel between the secure device manager (SDM), the boot loader
//! stages and the reset handling.
use arbitrary_int::{u2, u3};

pub const SYSMGR_BASE_ADDR: usize = 0x10D1_2000;

/// Reset type which is stored inside the cold boot scratch register 3.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DdrResetType {
    PowerOn = 0,
    Warm = 1,
    Cold = 2,
    NConfig = 3,
    JtagConfig = 4,
    RsuReconfig = 5,
}

impl DdrResetType {
    /// Decode the raw reset type field. Values 6 and 7 are reserved.
    pub const fn from_raw(raw: u3) -> Option<Self> {
        match raw.value() {
            0 => Some(Self::PowerOn),
            1 => Some(Self::Warm),
            2 => Some(Self::Cold),
            3 => Some(Self::NConfig),
            4 => Some(Self::JtagConfig),
            5 => Some(Self::RsuReconfig),
            _ => None,
        }
    }
}

#[bitbybit::bitfield(u32)]
#[derive(Debug)]
pub struct EccIntStatusSerr {
    /// Clock generator lock status of the two IO96B instances. Bit 0 is IO96B0.
    #[bits(16..=17, r)]
    ckgen_locked: u2,
}

#[bitbybit::bitfield(u32)]
#[derive(Debug)]
pub struct FpgaConfig {
    #[bit(1, r)]
    early_user_mode: bool,
    #[bit(0, r)]
    config_complete: bool,
}

impl FpgaConfig {
    /// The FPGA is considered ready once configuration completed and early user mode was
    /// entered.
    #[inline]
    pub const fn ready(&self) -> bool {
        self.config_complete() && self.early_user_mode()
    }
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct BootScratchCold3 {
    #[bit(31, rw)]
    ocram_dbe: bool,
    #[bit(30, rw)]
    ddr_dbe: bool,
    #[bits(27..=29, rw)]
    ddr_reset_type: u3,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct MpfeConfig {
    #[bit(8, rw)]
    mpfe_lite_active: bool,
    #[bit(2, rw)]
    mpfe_lite_intfcsel: bool,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct BootScratchPor0 {
    /// Set while the DDR driver runs. Still being set after a reset means that the previous
    /// DDR initialization hung.
    #[bit(0, rw)]
    ddr_progress: bool,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct BootScratchPor1 {
    #[bit(29, rw)]
    reva_workaround: bool,
    #[bit(28, rw)]
    reva_workaround_user_mode: bool,
}

/// System manager register block.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct SystemManager {
    _gap0: [u32; 0x27],

    ecc_intstatus_serr: EccIntStatusSerr,

    _gap1: [u32; 0x08],

    /// NoC timeout enable.
    noc_timeout: u32,
    noc_idlereq_set: u32,
    noc_idlereq_clr: u32,
    noc_idlereq_value: u32,
    noc_idleack: u32,
    noc_idlestatus: u32,
    fpga_config: FpgaConfig,

    _gap2: [u32; 0x49],

    boot_scratch_cold0: u32,
    boot_scratch_cold1: u32,
    boot_scratch_cold2: u32,
    boot_scratch_cold3: BootScratchCold3,
    boot_scratch_cold4: u32,
    boot_scratch_cold5: u32,
    boot_scratch_cold6: u32,
    boot_scratch_cold7: u32,
    boot_scratch_cold8: u32,
    boot_scratch_cold9: u32,
    mpfe_config: MpfeConfig,

    _gap3: [u32; 0x0B],

    boot_scratch_por0: BootScratchPor0,
    boot_scratch_por1: BootScratchPor1,
}

static_assertions::const_assert_eq!(core::mem::size_of::<SystemManager>(), 0x260);

impl SystemManager {
    /// Create a new handle to this peripheral.
    ///
    /// # Safety
    ///
    /// If you create multiple instances of this handle at the same time, you are responsible for
    /// ensuring that there are no read-modify-write races on any of the registers.
    #[inline]
    pub const unsafe fn new_mmio_fixed() -> MmioSystemManager<'static> {
        unsafe { Self::new_mmio_at(SYSMGR_BASE_ADDR) }
    }
}
