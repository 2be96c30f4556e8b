//! # Peripheral access crate for the Agilex 5 hard processor system
//!
//! This crate only covers the register blocks which are required to bring up the HPS during the
//! secondary program loader stage: the system manager boot scratch registers, the reset manager
//! bridge control, the MPFE sideband manager, the IO96B CSR blocks with their IOSSM mailbox and
//! the DDR and MPFE firewalls.
//!
//! The register blocks are described with [derive_mmio] and the bitfields with [bitbybit].
#![no_std]

use core::sync::atomic::{AtomicBool, Ordering};

pub mod f2sdram;
pub mod firewall;
pub mod io96b;
pub mod rstmgr;
pub mod sysmgr;

static PERIPHERALS_TAKEN: AtomicBool = AtomicBool::new(false);

/// This is a collection of all register blocks used during HPS bring-up.
///
/// It can only be retrieved once with [Peripherals::take].
pub struct Peripherals {
    pub sysmgr: sysmgr::MmioSystemManager<'static>,
    pub rstmgr: rstmgr::MmioResetManager<'static>,
    pub sideband_mgr: f2sdram::MmioSidebandManager<'static>,
    pub io96b_0: io96b::MmioIo96bCsr<'static>,
    pub io96b_1: io96b::MmioIo96bCsr<'static>,
    pub ddr_fw_dmi0: firewall::MmioDdrFirewall<'static>,
    pub ddr_fw_dmi1: firewall::MmioDdrFirewall<'static>,
    pub mpfe_fw: firewall::MmioMpfeFirewall<'static>,
}

impl Peripherals {
    /// Returns all peripherals exactly once.
    pub fn take() -> Option<Self> {
        if PERIPHERALS_TAKEN.swap(true, Ordering::AcqRel) {
            return None;
        }
        // Safety: Guarded by the atomic flag above.
        Some(unsafe { Self::steal() })
    }

    /// Create all peripheral handles unconditionally.
    ///
    /// # Safety
    ///
    /// Circumvents the ownership tracking of [Peripherals::take]. The caller must ensure that
    /// no read-modify-write races occur on the register blocks.
    pub unsafe fn steal() -> Self {
        unsafe {
            Self {
                sysmgr: sysmgr::SystemManager::new_mmio_fixed(),
                rstmgr: rstmgr::ResetManager::new_mmio_fixed(),
                sideband_mgr: f2sdram::SidebandManager::new_mmio_fixed(),
                io96b_0: io96b::Io96bCsr::new_mmio_fixed(io96b::Io96bInstance::Io96b0),
                io96b_1: io96b::Io96bCsr::new_mmio_fixed(io96b::Io96bInstance::Io96b1),
                ddr_fw_dmi0: firewall::DdrFirewall::new_mmio_fixed(firewall::Dmi::Dmi0),
                ddr_fw_dmi1: firewall::DdrFirewall::new_mmio_fixed(firewall::Dmi::Dmi1),
                mpfe_fw: firewall::MpfeFirewall::new_mmio_fixed(),
            }
        }
    }
}
