//! # DDR module
//!
//! Full SDRAM bring-up for the IO96B based memory subsystem. The memory calibration itself is
//! performed by the IOSSM of every IO96B instance, this module only supervises it and configures
//! the surrounding fabric:
//!
//!  1. Tracks the initialization progress inside the boot scratch registers so a hang can be
//!     detected after the next reset.
//!  2. Reads the SDRAM handoff data and configures the MPFE sideband manager and the CCU
//!     interleaving.
//!  3. Checks the calibration status and re-calibrates failed interfaces.
//!  4. Reconciles the memory size reported by the hardware with the device tree.
//!  5. Initializes ECC memory if required, verifies the memory size and opens the DDR
//!     firewalls.
use embedded_hal::delay::DelayNs;

use agilex5::f2sdram::MmioSidebandManager;
use agilex5::firewall::{MmioDdrFirewall, MmioMpfeFirewall};
use agilex5::io96b::Io96bInstance;
use agilex5::sysmgr::MmioSystemManager;

use crate::SZ_1G;
use crate::fdt::FdtError;
use crate::handoff::{DdrHandoff, HandoffError};
use crate::iossm::{self, DdrType, Io96bInfo, Iossm, IossmError, Timeouts};
use crate::scratch::{self, DdrResetType};
use crate::secreg;

pub mod banks;
pub mod firewall;
pub mod size_check;

pub use banks::{DramBank, DramBanks, MAX_DRAM_BANKS};
pub use size_check::{RamProbe, SizeCheckError, VolatileRamProbe};

#[derive(Debug, Clone, Copy)]
pub struct DdrConfig {
    /// Number of DRAM banks the rest of the boot flow can handle.
    pub nr_dram_banks: usize,
    /// ARM trusted firmware boot flow. The first 1 MiB of memory stays secure.
    pub spl_atf: bool,
    pub timeouts: Timeouts,
}

impl DdrConfig {
    pub const DEFAULT: Self = Self {
        nr_dram_banks: banks::DRAM_BANK_INFO.len(),
        spl_atf: true,
        timeouts: Timeouts::DEFAULT,
    };
}

impl Default for DdrConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Register blocks used by the DDR initialization.
pub struct SdramRegs {
    pub sysmgr: MmioSystemManager<'static>,
    pub sideband_mgr: MmioSidebandManager<'static>,
    pub ddr_fw: [MmioDdrFirewall<'static>; 2],
    pub mpfe_fw: MmioMpfeFirewall<'static>,
}

impl SdramRegs {
    /// Usually built from the handles of [agilex5::Peripherals]. The IO96B blocks go to the
    /// [Io96bMailbox](crate::iossm::ll::Io96bMailbox) instances instead.
    pub fn new(
        sysmgr: MmioSystemManager<'static>,
        sideband_mgr: MmioSidebandManager<'static>,
        ddr_fw: [MmioDdrFirewall<'static>; 2],
        mpfe_fw: MmioMpfeFirewall<'static>,
    ) -> Self {
        Self {
            sysmgr,
            sideband_mgr,
            ddr_fw,
            mpfe_fw,
        }
    }
}

/// Result of a successful DDR initialization.
#[derive(Debug, Clone)]
pub struct RamInfo {
    pub base: u64,
    pub size: u64,
    pub banks: DramBanks,
    pub ddr_type: DdrType,
    pub ecc_enabled: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DdrError {
    #[error("failed to read DDR handoff: {0}")]
    Handoff(#[from] HandoffError),
    #[error("interleaving on/off CCU settings init failed: {0}")]
    CcuSettings(#[source] FdtError),
    #[error("IOSSM error: {0}")]
    Iossm(#[from] IossmError),
    #[error("failed to decode memory node: {0}")]
    DeviceTree(#[source] FdtError),
    #[error("DRAM size from device tree ({dt_size:#x}) is greater than hardware size ({hw_size:#x})")]
    DtSizeExceedsHardware { dt_size: u64, hw_size: u64 },
    #[error("memory size check failed: {0}")]
    SizeCheck(#[from] SizeCheckError),
}

/// Select the MPFE lite interface, required for the dual EMIF mode.
pub fn set_mpfe_config(sysmgr: &mut MmioSystemManager<'_>) {
    sysmgr.modify_mpfe_config(|mut val| {
        val.set_mpfe_lite_intfcsel(true);
        val
    });
    sysmgr.modify_mpfe_config(|mut val| {
        val.set_mpfe_lite_active(true);
        val
    });
    log::debug!(
        "DDR: mpfe_config: {:#x}",
        sysmgr.read_mpfe_config().raw_value()
    );
}

/// Announce the dual port and dual EMIF modes to the NoC.
pub fn config_mpfe_sideband_mgr(regs: &mut SdramRegs, handoff: &DdrHandoff) {
    if handoff.dual_port {
        regs.sideband_mgr.modify_flagoutset0(|mut val| {
            val.set_dual_port(true);
            val
        });
    }
    if handoff.dual_emif {
        set_mpfe_config(&mut regs.sysmgr);
        regs.sideband_mgr.modify_flagoutset0(|mut val| {
            val.set_dual_emif(true);
            val
        });
    }
    log::debug!(
        "DDR: sideband flagoutstatus0: {:#x}",
        regs.sideband_mgr.read_flagoutstatus0().raw_value()
    );
}

/// Apply the CCU interleaving settings matching the memory configuration.
///
/// # Safety
///
/// The register blocks described by the device tree settings nodes must be valid.
pub unsafe fn config_ccu_mgr(fdt_blob: &[u8], handoff: &DdrHandoff) -> Result<(), DdrError> {
    let node = if handoff.interleaving() {
        log::debug!("DDR: config interleaving on CCU registers");
        secreg::CCU_INTERLEAVING_ON
    } else {
        log::debug!("DDR: config interleaving off CCU registers");
        secreg::CCU_INTERLEAVING_OFF
    };
    unsafe { secreg::apply_settings(fdt_blob, node) }.map_err(|e| {
        log::error!("DDR: interleaving on/off CCU settings init failed: {}", e);
        DdrError::CcuSettings(e)
    })?;
    Ok(())
}

/// Decode the SDRAM handoff table into the handoff configuration and the IO96B bookkeeping.
pub fn populate_ddr_handoff(handoff_table: &[u32]) -> Result<(DdrHandoff, Io96bInfo), DdrError> {
    let handoff = DdrHandoff::from_table(handoff_table)?;
    let info = Io96bInfo::new(
        handoff.num_instance(),
        handoff.num_port(),
        handoff.io96b_pll,
    );
    for (i, instance) in Io96bInstance::ALL
        .iter()
        .take(info.num_instance())
        .enumerate()
    {
        log::debug!(
            "DDR: IO96B_{} CSR enabled at {:#x}",
            i,
            instance.base_addr()
        );
    }
    Ok((handoff, info))
}

/// Memory size reported by the hardware in bytes.
#[inline]
pub const fn hw_size_bytes(overall_size_gbit: u16) -> u64 {
    overall_size_gbit as u64 * SZ_1G / 8
}

/// Reconcile the device tree memory description with the hardware memory size.
///
/// Returns the RAM size and the DRAM banks in use.
pub fn resolve_memory_layout(
    fdt_blob: &[u8],
    hw_size: u64,
    nr_dram_banks: usize,
) -> Result<(u64, DramBanks), DdrError> {
    let dt_mem = crate::fdt::decode_ram_size(fdt_blob, nr_dram_banks).map_err(|e| {
        log::error!("DDR: failed to decode memory node: {}", e);
        DdrError::DeviceTree(e)
    })?;
    let mut ram_size = dt_mem.ram_size;
    let mut dram_banks = dt_mem.banks;

    if ram_size > 0 && ram_size != hw_size {
        log::warn!(
            "DDR: DRAM size from device tree ({} MiB) mismatch with hardware ({} MiB)",
            ram_size >> 20,
            hw_size >> 20
        );
    }
    if ram_size > hw_size {
        log::error!("DDR: DRAM size from device tree is greater than hardware size");
        return Err(DdrError::DtSizeExceedsHardware {
            dt_size: ram_size,
            hw_size,
        });
    }
    if ram_size == 0 && hw_size > 0 {
        dram_banks = banks::banks_from_hw_size(hw_size, nr_dram_banks);
        for (i, bank) in dram_banks.iter().enumerate() {
            log::debug!(
                "DDR: memory bank {} start {:#x} size {:#x}",
                i,
                bank.start,
                bank.size
            );
        }
        ram_size = hw_size;
    }
    Ok((ram_size, dram_banks))
}

/// Full memory initialization is required for ECC memory unless the memory content of a clean
/// warm or cold reset can be preserved.
pub fn full_mem_init_required(
    reset_type: Option<DdrResetType>,
    ocram_dbe: bool,
    ddr_dbe: bool,
    hang_before_reset: bool,
) -> bool {
    if ocram_dbe || ddr_dbe || hang_before_reset {
        return true;
    }
    !matches!(
        reset_type,
        Some(DdrResetType::Warm) | Some(DdrResetType::Cold)
    )
}

/// This completely initializes the SDRAM.
///
/// The IOSSM mailboxes must be passed in instance order. The DDR initialization progress flag
/// stays set if an error occurs, which is detected as a hang after the next reset.
///
/// # Safety
///
/// This must only be called once during boot. The secure register blocks referenced by the
/// device tree must be valid and the probe must be allowed to access all DRAM banks.
pub unsafe fn sdram_mmr_init_full<M: Iossm, D: DelayNs, P: RamProbe>(
    regs: &mut SdramRegs,
    mailboxes: &mut [M],
    handoff_table: &[u32],
    fdt_blob: &[u8],
    config: &DdrConfig,
    delay: &mut D,
    probe: &mut P,
) -> Result<RamInfo, DdrError> {
    let cold3 = regs.sysmgr.read_boot_scratch_cold3();
    let reset_type = scratch::get_reset_type(cold3);
    let hang_before_reset = scratch::is_ddr_init_hang(&mut regs.sysmgr);

    log::debug!("DDR: SDRAM init in progress, reset type {:?}", reset_type);
    scratch::ddr_init_inprogress(&mut regs.sysmgr, true);

    let (handoff, mut info) = populate_ddr_handoff(handoff_table)?;
    config_mpfe_sideband_mgr(regs, &handoff);
    unsafe { config_ccu_mgr(fdt_blob, &handoff)? };

    info.ckgen_lock = true;
    iossm::init_mem_cal(
        &mut info,
        mailboxes,
        &mut regs.sysmgr,
        delay,
        &config.timeouts,
    )?;
    iossm::io96b_mb_init(&mut info, mailboxes)?;

    if scratch::ddr_ecc_dbe_status(&mut regs.sysmgr) {
        info.invalidate_calibration();
    }
    if !info.overall_cal_status {
        log::info!("DDR: re-calibration in progress");
        iossm::trig_mem_cal(&mut info, mailboxes, delay, &config.timeouts)?;
    }
    log::info!("DDR: calibration success");

    iossm::get_mem_technology(&mut info, mailboxes)?;
    iossm::get_mem_width_info(&mut info, mailboxes)?;
    let hw_size = hw_size_bytes(info.overall_size_gbit);

    let (ram_size, dram_banks) = resolve_memory_layout(fdt_blob, hw_size, config.nr_dram_banks)?;
    log::info!("{}: {} MiB", info.ddr_type, ram_size >> 20);

    iossm::ecc_enable_status(&mut info, mailboxes)?;
    if info.ecc_enabled {
        let full_mem_init = full_mem_init_required(
            reset_type,
            scratch::hps_ocram_dbe_status(&mut regs.sysmgr),
            scratch::ddr_ecc_dbe_status(&mut regs.sysmgr),
            hang_before_reset,
        );
        if full_mem_init {
            iossm::bist_mem_init_start(&info, mailboxes, delay, &config.timeouts)?;
        }
        log::info!("SDRAM-ECC: initialized success");
    }

    size_check::sdram_size_check(probe, &dram_banks, ram_size)?;

    firewall::sdram_set_firewall(&mut regs.ddr_fw, &dram_banks, config.spl_atf);
    firewall::mpfe_csr_firewall(&mut regs.mpfe_fw);
    log::info!("DDR: firewall init success");

    let base = dram_banks.first().map(|bank| bank.start).unwrap_or(0);
    scratch::ddr_init_inprogress(&mut regs.sysmgr, false);
    log::info!("DDR: init success");

    Ok(RamInfo {
        base,
        size: ram_size,
        banks: dram_banks,
        ddr_type: info.ddr_type,
        ecc_enabled: info.ecc_enabled,
    })
}
