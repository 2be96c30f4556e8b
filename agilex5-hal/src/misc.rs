//! SoC64 boot hooks.
//!
//! FPGA bridge reset handling, environment exports and the hooks which run right before the
//! operating system is started. The secure device manager (SDM) and the boot environment are
//! reached through the [SecureDeviceManager] and [Environment] traits.
use core::fmt::Write;

use embedded_hal::delay::DelayNs;

use agilex5::rstmgr::{BridgeReset, MmioResetManager};
use agilex5::sysmgr::MmioSystemManager;

use crate::time::{Hertz, MillisDuration, poll_until};

/// Default RSU log level exported when none is set.
pub const RSU_DEFAULT_LOG_LEVEL: u32 = 7;
/// Timeout for the NoC idle handshake of the bridges.
pub const NOC_IDLE_TIMEOUT: MillisDuration = MillisDuration::millis(1_000);

pub const ENV_QSPI_CLOCK: &str = "qspi_clock";
pub const ENV_RSU_LOG_LEVEL: &str = "rsu_log_level";
pub const ENV_BOARD_ID: &str = "board_id";
pub const ENV_RETURN_QSPI: &str = "returnQSPI";

/// Build time platform selection.
#[derive(Debug, Copy, Clone)]
pub struct MiscConfig {
    /// Agilex 5 device. Otherwise a generic SoC64 device is assumed.
    pub agilex5: bool,
    /// Emulation platform without real peripherals.
    pub emulator: bool,
    /// Cadence QSPI controller used together with the ATF boot flow.
    pub qspi_atf: bool,
}

impl MiscConfig {
    pub const AGILEX5: Self = Self {
        agilex5: true,
        emulator: false,
        qspi_atf: true,
    };
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvError {
    #[error("environment is full")]
    Full,
    #[error("environment value too long")]
    ValueTooLong,
}

/// Boot environment variables.
pub trait Environment {
    fn get(&self, name: &str) -> Option<&str>;
    fn set(&mut self, name: &str, value: &str) -> Result<(), EnvError>;

    /// Interpret a variable as a yes or no answer. Returns [None] if the variable is not set or
    /// can not be interpreted.
    fn get_yesno(&self, name: &str) -> Option<bool> {
        match self.get(name)?.chars().next()? {
            'y' | 'Y' | 't' | 'T' | '1' => Some(true),
            'n' | 'N' | 'f' | 'F' | '0' => Some(false),
            _ => None,
        }
    }
}

/// Execution state announced to the SDM.
#[derive(Debug, Copy, Clone, PartialEq, Eq, num_enum::IntoPrimitive)]
#[repr(u32)]
pub enum HpsExecutionState {
    Fsbl = 0,
    Ssbl = 1,
    Os = 2,
}

/// Services of the secure device manager used by the boot hooks.
pub trait SecureDeviceManager {
    type Error: core::fmt::Debug;

    /// Return the QSPI ownership to the SDM.
    fn close_qspi(&mut self) -> Result<(), Self::Error>;

    fn notify_hps_stage(&mut self, state: HpsExecutionState) -> Result<(), Self::Error>;

    /// SMMU setup for SDM accesses required on revision A silicon.
    fn smmu_init(&mut self) -> Result<(), Self::Error>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeResetError {
    #[error("FPGA not ready, bridge reset aborted")]
    FpgaNotReady,
    #[error("timeout waiting for the NoC idle acknowledge")]
    IdleAckTimeout,
    #[error("timeout waiting for the NoC idle status")]
    IdleStatusTimeout,
}

/// Agilex 5 revision A silicon requires some workarounds, which is flagged by the SDM.
pub fn is_agilex5_reva_workaround_required(sysmgr: &mut MmioSystemManager<'_>) -> bool {
    let por1 = sysmgr.read_boot_scratch_por1();
    log::debug!("SYSMGR boot scratch POR1: {:#x}", por1.raw_value());
    por1.reva_workaround()
}

pub fn is_fpga_config_ready(sysmgr: &mut MmioSystemManager<'_>, config: &MiscConfig) -> bool {
    if config.agilex5 && is_agilex5_reva_workaround_required(sysmgr) {
        return sysmgr.read_boot_scratch_por1().reva_workaround_user_mode();
    }
    sysmgr.read_fpga_config().ready()
}

/// Put the FPGA bridges selected by `mask` into or out of reset.
///
/// Bridges are only touched if the FPGA is configured. Bridges are quiesced through the NoC
/// idle handshake before they are put into reset. The DDR scheduler and the FPGA to SoC bridge
/// are never put into reset.
pub fn do_bridge_reset<D: DelayNs>(
    sysmgr: &mut MmioSystemManager<'_>,
    rstmgr: &mut MmioResetManager<'_>,
    config: &MiscConfig,
    delay: &mut D,
    enable: bool,
    mask: u32,
) -> Result<(), BridgeResetError> {
    if !is_fpga_config_ready(sysmgr, config) {
        log::warn!("FPGA not ready. Bridge reset aborted!");
        return Err(BridgeResetError::FpgaNotReady);
    }

    if enable {
        sysmgr.write_noc_idlereq_clr(mask);
        rstmgr.modify_brgmodrst(|val| BridgeReset::new_with_raw_value(val.raw_value() & !mask));
        if !poll_until(delay, NOC_IDLE_TIMEOUT, || {
            sysmgr.read_noc_idleack() & mask == 0
        }) {
            log::error!("bridges: timeout waiting for idle acknowledge to clear");
            return Err(BridgeResetError::IdleAckTimeout);
        }
        return Ok(());
    }

    sysmgr.write_noc_idlereq_set(mask);
    sysmgr.write_noc_timeout(1);
    let result = if !poll_until(delay, NOC_IDLE_TIMEOUT, || {
        sysmgr.read_noc_idleack() & mask == mask
    }) {
        Err(BridgeResetError::IdleAckTimeout)
    } else if !poll_until(delay, NOC_IDLE_TIMEOUT, || {
        sysmgr.read_noc_idlestatus() & mask == mask
    }) {
        Err(BridgeResetError::IdleStatusTimeout)
    } else {
        let reset_mask = mask & !BridgeReset::KEEP_ACTIVE_MASK;
        rstmgr.modify_brgmodrst(|val| BridgeReset::new_with_raw_value(val.raw_value() | reset_mask));
        Ok(())
    };
    sysmgr.write_noc_timeout(0);
    if let Err(e) = result {
        log::error!("bridges: {}", e);
    }
    result
}

/// Export the platform environment variables.
pub fn arch_misc_init<E: Environment>(
    env: &mut E,
    config: &MiscConfig,
    qspi_clk: Hertz,
    board_id: u8,
) -> Result<(), EnvError> {
    if config.emulator {
        return Ok(());
    }
    let mut value: heapless::String<16> = heapless::String::new();
    write!(value, "<0x{:08x}>", qspi_clk.raw()).map_err(|_| EnvError::ValueTooLong)?;
    env.set(ENV_QSPI_CLOCK, &value)?;

    if env.get(ENV_RSU_LOG_LEVEL).is_none() {
        value.clear();
        write!(value, "{}", RSU_DEFAULT_LOG_LEVEL).map_err(|_| EnvError::ValueTooLong)?;
        env.set(ENV_RSU_LOG_LEVEL, &value)?;
    }

    value.clear();
    write!(value, "{}", board_id).map_err(|_| EnvError::ValueTooLong)?;
    env.set(ENV_BOARD_ID, &value)
}

/// Return the QSPI to the SDM if requested through the environment. Required for the FCS
/// attestation which accesses the flash from the SDM.
pub fn do_qspi_ownership_quirk<E: Environment, S: SecureDeviceManager>(
    env: &E,
    sdm: &mut S,
    config: &MiscConfig,
) {
    if !config.qspi_atf {
        return;
    }
    if env.get_yesno(ENV_RETURN_QSPI) == Some(true) {
        if let Err(e) = sdm.close_qspi() {
            log::error!("close QSPI failed, (err={:?})", e);
        }
    }
}

/// Last hook before the operating system is started.
pub fn arch_preboot_os<E: Environment, S: SecureDeviceManager>(
    env: &E,
    sdm: &mut S,
    config: &MiscConfig,
) {
    do_qspi_ownership_quirk(env, sdm, config);
    if let Err(e) = sdm.notify_hps_stage(HpsExecutionState::Os) {
        log::warn!("HPS stage notification failed: {:?}", e);
    }
}

pub fn misc_init_r<S: SecureDeviceManager>(
    sysmgr: &mut MmioSystemManager<'_>,
    sdm: &mut S,
    config: &MiscConfig,
) -> Result<(), S::Error> {
    if config.agilex5 && is_agilex5_reva_workaround_required(sysmgr) {
        return sdm.smmu_init();
    }
    Ok(())
}
