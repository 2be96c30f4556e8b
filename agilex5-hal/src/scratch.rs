//! Boot scratch register handling.
//!
//! The secure device manager and previous boot stages leave information about the last reset and
//! detected memory errors inside the system manager boot scratch registers. The DDR driver also
//! uses them to track whether a previous initialization hung.
use agilex5::sysmgr::{BootScratchCold3, MmioSystemManager};

pub use agilex5::sysmgr::DdrResetType;

/// Decode the reset type stored inside the cold boot scratch register 3.
///
/// Returns [None] for reserved values.
#[inline]
pub fn get_reset_type(cold3: BootScratchCold3) -> Option<DdrResetType> {
    DdrResetType::from_raw(cold3.ddr_reset_type())
}

/// Returns true if the DDR initialization progress flag is still set, which means that the
/// last DDR initialization did not complete before the reset.
pub fn is_ddr_init_hang(sysmgr: &mut MmioSystemManager<'_>) -> bool {
    sysmgr.read_boot_scratch_por0().ddr_progress()
}

/// Set or clear the DDR initialization progress flag.
pub fn ddr_init_inprogress(sysmgr: &mut MmioSystemManager<'_>, start: bool) {
    sysmgr.modify_boot_scratch_por0(|mut val| {
        val.set_ddr_progress(start);
        val
    });
}

/// Double bit error detected inside the on-chip RAM.
pub fn hps_ocram_dbe_status(sysmgr: &mut MmioSystemManager<'_>) -> bool {
    sysmgr.read_boot_scratch_cold3().ocram_dbe()
}

/// Double bit error detected inside the DDR memory.
pub fn ddr_ecc_dbe_status(sysmgr: &mut MmioSystemManager<'_>) -> bool {
    sysmgr.read_boot_scratch_cold3().ddr_dbe()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeRegs;
    use agilex5::sysmgr::SystemManager;
    use arbitrary_int::u3;

    const COLD3: usize = 0x20C;
    const POR0: usize = 0x258;

    #[test]
    fn reset_type_decoding() {
        let cold3 = BootScratchCold3::new_with_raw_value(1 << 27);
        assert_eq!(get_reset_type(cold3), Some(DdrResetType::Warm));
        let cold3 = BootScratchCold3::new_with_raw_value(2 << 27 | 1 << 31);
        assert_eq!(get_reset_type(cold3), Some(DdrResetType::Cold));
        assert_eq!(
            DdrResetType::from_raw(u3::new(5)),
            Some(DdrResetType::RsuReconfig)
        );
        assert_eq!(DdrResetType::from_raw(u3::new(6)), None);
    }

    #[test]
    fn progress_flag() {
        let regs = FakeRegs::<0x98>::new();
        regs.write(POR0, 0x8000_0000);
        let mut sysmgr = unsafe { SystemManager::new_mmio_at(regs.addr()) };
        assert!(!is_ddr_init_hang(&mut sysmgr));
        ddr_init_inprogress(&mut sysmgr, true);
        assert_eq!(regs.read(POR0), 0x8000_0001);
        assert!(is_ddr_init_hang(&mut sysmgr));
        ddr_init_inprogress(&mut sysmgr, false);
        assert_eq!(regs.read(POR0), 0x8000_0000);
    }

    #[test]
    fn double_bit_error_flags() {
        let regs = FakeRegs::<0x98>::new();
        let mut sysmgr = unsafe { SystemManager::new_mmio_at(regs.addr()) };
        assert!(!hps_ocram_dbe_status(&mut sysmgr));
        assert!(!ddr_ecc_dbe_status(&mut sysmgr));
        regs.write(COLD3, 1 << 30);
        assert!(!hps_ocram_dbe_status(&mut sysmgr));
        assert!(ddr_ecc_dbe_status(&mut sysmgr));
        regs.write(COLD3, 1 << 31);
        assert!(hps_ocram_dbe_status(&mut sysmgr));
        assert!(!ddr_ecc_dbe_status(&mut sysmgr));
    }
}
