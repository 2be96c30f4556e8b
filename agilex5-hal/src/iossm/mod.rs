//! # IOSSM mailbox module
//!
//! Every IO96B instance contains an I/O subsystem manager (IOSSM) which calibrates the attached
//! memory interfaces and offers memory controller services like ECC status queries and the
//! built-in self test (BIST) memory initialization. It is controlled through a mailbox inside
//! the IO96B CSR block.
//!
//! The low-level mailbox access is abstracted by the [Iossm] trait, which is implemented by
//! [ll::Io96bMailbox] for the real hardware. The calibration and memory information sequences
//! of this module work on any [Iossm] implementation.
use arbitrary_int::{u3, u4, u5};
use embedded_hal::delay::DelayNs;

use agilex5::io96b::{CommandRequest, CommandResponseStatus, MemInterfaceInfo};
use agilex5::sysmgr::MmioSystemManager;

use crate::time::{MillisDuration, poll_until, try_poll_until};

pub mod ll;

pub use agilex5::io96b::{IossmStatus, MAX_IO96B_INSTANCES};
pub use ll::Io96bMailbox;

/// Maximum number of memory interfaces behind one IO96B instance.
pub const MAX_MEM_INTERFACES: usize = 2;
/// Number of command parameter registers.
pub const NUM_CMD_PARAMS: usize = 7;
/// Number of re-calibration attempts per memory interface before giving up.
pub const MAX_CAL_RETRIES: u32 = 3;

/// Parameter of the BIST memory initialization command which selects the full memory range.
const BIST_MEM_INIT_FULL_RANGE: u32 = 0x40;
const MEM_CAL_STATUS_MASK: u32 = 0b111;
const MEM_CAL_STATUS_SUCCESS: u32 = 0b001;

#[derive(Debug, Copy, Clone, PartialEq, Eq, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum CmdType {
    Nop = 0,
    GetSysInfo = 1,
    GetMemInfo = 2,
    GetMemCalInfo = 3,
    TrigControllerOp = 4,
    TrigMemCalOp = 5,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, num_enum::IntoPrimitive)]
#[repr(u16)]
pub enum Opcode {
    GetMemIntfInfo = 0x0001,
    GetMemTechnology = 0x0002,
    GetMemclkFreqKhz = 0x0003,
    GetMemWidthInfo = 0x0004,
    EccEnableSet = 0x0101,
    EccEnableStatus = 0x0102,
    EccInterruptStatus = 0x0103,
    EccInterruptAck = 0x0104,
    EccInterruptMask = 0x0105,
    EccWritebackEnable = 0x0106,
    EccScrubInProgressStatus = 0x0201,
    EccScrubMode0Start = 0x0202,
    EccScrubMode1Start = 0x0203,
    BistStandardModeStart = 0x0301,
    BistResultsStatus = 0x0302,
    BistMemInitStart = 0x0303,
    BistMemInitStatus = 0x0304,
    BistSetDataPatternUpper = 0x0305,
    BistSetDataPatternLower = 0x0306,
    TrigMemCal = 0x000A,
    GetMemCalStatus = 0x000B,
}

/// Target of a mailbox command.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemInterface {
    pub ip_type: u3,
    pub instance_id: u5,
}

impl MemInterface {
    /// The IOSSM itself.
    pub const IOSSM: Self = Self {
        ip_type: u3::new(0),
        instance_id: u5::new(0),
    };

    /// Decode a memory interface descriptor. Returns [None] for unused descriptor slots.
    pub fn from_info(info: MemInterfaceInfo) -> Option<Self> {
        if info.ip_type().value() == 0 {
            return None;
        }
        Some(Self {
            ip_type: info.ip_type(),
            instance_id: info.ip_instance_id(),
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Request {
    pub target: MemInterface,
    pub cmd_type: CmdType,
    pub opcode: Opcode,
    /// Command parameters. Only non-zero parameters are written to the hardware.
    pub params: [u32; NUM_CMD_PARAMS],
}

impl Request {
    pub const fn new(target: MemInterface, cmd_type: CmdType, opcode: Opcode) -> Self {
        Self {
            target,
            cmd_type,
            opcode,
            params: [0; NUM_CMD_PARAMS],
        }
    }

    pub const fn with_param(mut self, idx: usize, value: u32) -> Self {
        self.params[idx] = value;
        self
    }

    /// Command request word which starts the command when written.
    pub fn command_word(&self) -> CommandRequest {
        CommandRequest::builder()
            .with_ip_type(self.target.ip_type)
            .with_ip_instance_id(self.target.instance_id)
            .with_cmd_type(self.cmd_type.into())
            .with_cmd_opcode(self.opcode.into())
            .build()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: CommandResponseStatus,
    /// Response data registers 0 to 2.
    pub data: [u32; 3],
}

impl Response {
    #[inline]
    pub fn data_short(&self) -> u16 {
        self.status.data_short()
    }

    #[inline]
    pub fn error_code(&self) -> u4 {
        self.status.error_code()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailboxError {
    #[error("command request register not ready")]
    CmdReqNotReady,
    #[error("command response timeout, response status {0:#010x}")]
    ResponseTimeout(u32),
}

/// Access to the IOSSM of one IO96B instance.
pub trait Iossm {
    /// Read the IOSSM status register.
    fn status(&mut self) -> IossmStatus;

    /// Send a mailbox command and wait for its response.
    fn request(&mut self, req: &Request) -> Result<Response, MailboxError>;
}

impl<T: Iossm + ?Sized> Iossm for &mut T {
    fn status(&mut self) -> IossmStatus {
        T::status(self)
    }

    fn request(&mut self, req: &Request) -> Result<Response, MailboxError> {
        T::request(self, req)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IossmError {
    #[error("mailbox error on IO96B_{instance}: {source}")]
    Mailbox {
        instance: usize,
        #[source]
        source: MailboxError,
    },
    #[error("no mailbox available for IO96B_{0}")]
    MissingMailbox(usize),
    #[error("clock generator of IO96B_{0} is not locked")]
    CkgenNotLocked(usize),
    #[error("calibration of IO96B_{instance} interface {interface} failed after {retries} retries")]
    CalibrationFailed {
        instance: usize,
        interface: usize,
        retries: u32,
    },
    #[error("mismatch DDR type on IO96B_{0}")]
    DdrTypeMismatch(usize),
    #[error("failed to get memory size of IO96B_{0}")]
    NoMemorySize(usize),
    #[error("total memory size is zero")]
    NoTotalMemorySize,
    #[error("mismatch DDR ECC status on IO96B_{0}")]
    EccStatusMismatch(usize),
    #[error("failed to start BIST memory initialization on IO96B_{instance}, error code {code:#x}")]
    BistStartFailed { instance: usize, code: u8 },
    #[error("BIST memory initialization timeout on IO96B_{instance}, error code {code:#x}")]
    BistTimeout { instance: usize, code: u8 },
}

/// DDR memory technology as reported by the IOSSM.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DdrType {
    Ddr4,
    Ddr5,
    Ddr5Rdimm,
    Lpddr4,
    Lpddr5,
    Qdriv,
    Unknown,
}

impl DdrType {
    pub const fn from_raw(raw: u16) -> Self {
        match raw {
            0 => Self::Ddr4,
            1 => Self::Ddr5,
            2 => Self::Ddr5Rdimm,
            3 => Self::Lpddr4,
            4 => Self::Lpddr5,
            5 => Self::Qdriv,
            _ => Self::Unknown,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ddr4 => "DDR4",
            Self::Ddr5 => "DDR5",
            Self::Ddr5Rdimm => "DDR5_RDIMM",
            Self::Lpddr4 => "LPDDR4",
            Self::Lpddr5 => "LPDDR5",
            Self::Qdriv => "QDRIV",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl core::fmt::Display for DdrType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timeouts used by the calibration and memory initialization sequences.
#[derive(Debug, Copy, Clone)]
pub struct Timeouts {
    pub ckgen_lock: MillisDuration,
    pub cal_busy: MillisDuration,
    pub bist_mem_init: MillisDuration,
}

impl Timeouts {
    pub const DEFAULT: Self = Self {
        ckgen_lock: MillisDuration::millis(1_000),
        cal_busy: MillisDuration::millis(15_000),
        bist_mem_init: MillisDuration::millis(120_000),
    };
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Bookkeeping for a single IO96B instance.
#[derive(Debug, Default, Clone)]
pub struct Io96bInstanceInfo {
    pub cal_status: bool,
    /// Memory size in Gbit.
    pub size_gbit: u16,
    pub interfaces: heapless::Vec<MemInterface, MAX_MEM_INTERFACES>,
}

/// Bookkeeping for all IO96B instances in use.
#[derive(Debug, Clone)]
pub struct Io96bInfo {
    pub num_port: u8,
    /// Mask of the enabled IO96B PLLs.
    pub io96b_pll: u4,
    /// Poll for the clock generator lock before checking the calibration status.
    pub ckgen_lock: bool,
    pub overall_cal_status: bool,
    pub ddr_type: DdrType,
    pub ecc_enabled: bool,
    /// Overall memory size in Gbit.
    pub overall_size_gbit: u16,
    pub instances: heapless::Vec<Io96bInstanceInfo, MAX_IO96B_INSTANCES>,
}

impl Io96bInfo {
    pub fn new(num_instance: usize, num_port: u8, io96b_pll: u4) -> Self {
        let mut instances = heapless::Vec::new();
        for _ in 0..num_instance.min(MAX_IO96B_INSTANCES) {
            // Can not fail, the instance count was clamped to the capacity.
            let _ = instances.push(Io96bInstanceInfo::default());
        }
        Self {
            num_port,
            io96b_pll,
            ckgen_lock: false,
            overall_cal_status: false,
            ddr_type: DdrType::Unknown,
            ecc_enabled: false,
            overall_size_gbit: 0,
            instances,
        }
    }

    #[inline]
    pub fn num_instance(&self) -> usize {
        self.instances.len()
    }

    /// Mark all instances as not calibrated, which forces a re-calibration.
    pub fn invalidate_calibration(&mut self) {
        for instance in self.instances.iter_mut() {
            instance.cal_status = false;
        }
        self.overall_cal_status = false;
    }
}

fn mailbox<M: Iossm>(mailboxes: &mut [M], instance: usize) -> Result<&mut M, IossmError> {
    mailboxes
        .get_mut(instance)
        .ok_or(IossmError::MissingMailbox(instance))
}

fn send<M: Iossm>(mb: &mut M, instance: usize, req: &Request) -> Result<Response, IossmError> {
    mb.request(req)
        .map_err(|source| IossmError::Mailbox { instance, source })
}

/// Check the initial calibration status of all IO96B instances.
///
/// The overall calibration status is only set if all instances report a successful calibration.
/// A failed calibration is not an error, it is recovered with [trig_mem_cal].
pub fn init_mem_cal<M: Iossm, D: DelayNs>(
    info: &mut Io96bInfo,
    mailboxes: &mut [M],
    sysmgr: &mut MmioSystemManager<'_>,
    delay: &mut D,
    timeouts: &Timeouts,
) -> Result<(), IossmError> {
    info.overall_cal_status = false;
    let ckgen_lock = info.ckgen_lock;
    let mut count = 0;
    for (i, instance) in info.instances.iter_mut().enumerate() {
        let mb = mailbox(mailboxes, i)?;
        if ckgen_lock {
            let locked = poll_until(delay, timeouts.ckgen_lock, || {
                (sysmgr.read_ecc_intstatus_serr().ckgen_locked().value() >> i) & 0b1 == 1
            });
            if !locked {
                log::error!("IOSSM: clock generator of IO96B_{} is not locked", i);
                return Err(IossmError::CkgenNotLocked(i));
            }
        }
        let idle = poll_until(delay, timeouts.cal_busy, || !mb.status().cal_busy());
        let status = mb.status();
        if idle && status.cal_success() && !status.cal_fail() {
            instance.cal_status = true;
            count += 1;
        } else {
            log::debug!(
                "IOSSM: initial DDR calibration IO96B_{} failed, status {:#x}",
                i,
                status.raw_value()
            );
        }
    }
    if count == info.instances.len() {
        info.overall_cal_status = true;
    }
    Ok(())
}

/// Retrieve the memory interfaces behind each IO96B instance.
pub fn io96b_mb_init<M: Iossm>(
    info: &mut Io96bInfo,
    mailboxes: &mut [M],
) -> Result<(), IossmError> {
    for (i, instance) in info.instances.iter_mut().enumerate() {
        let mb = mailbox(mailboxes, i)?;
        let resp = send(
            mb,
            i,
            &Request::new(MemInterface::IOSSM, CmdType::GetSysInfo, Opcode::GetMemIntfInfo),
        )?;
        instance.interfaces.clear();
        for raw in resp.data.iter().take(MAX_MEM_INTERFACES) {
            if let Some(interface) = MemInterface::from_info(MemInterfaceInfo::new_with_raw_value(*raw)) {
                // Can not fail, at most MAX_MEM_INTERFACES descriptors are checked.
                let _ = instance.interfaces.push(interface);
            }
        }
        log::debug!(
            "IOSSM: IO96B_{} has {} memory interface(s)",
            i,
            instance.interfaces.len()
        );
    }
    Ok(())
}

fn mem_cal_status<M: Iossm>(
    mb: &mut M,
    instance: usize,
    interface: usize,
) -> Result<u32, IossmError> {
    let resp = send(
        mb,
        instance,
        &Request::new(MemInterface::IOSSM, CmdType::TrigMemCalOp, Opcode::GetMemCalStatus),
    )?;
    Ok(resp.data[interface] & MEM_CAL_STATUS_MASK)
}

/// Re-calibrate all memory interfaces of the IO96B instances which failed calibration.
///
/// Each interface is re-calibrated up to [MAX_CAL_RETRIES] times. Running out of retries is
/// fatal.
pub fn trig_mem_cal<M: Iossm, D: DelayNs>(
    info: &mut Io96bInfo,
    mailboxes: &mut [M],
    delay: &mut D,
    timeouts: &Timeouts,
) -> Result<(), IossmError> {
    for (i, instance) in info.instances.iter_mut().enumerate() {
        if instance.cal_status {
            continue;
        }
        let mb = mailbox(mailboxes, i)?;
        for (j, interface) in instance.interfaces.iter().enumerate() {
            let mut cal_status = mem_cal_status(mb, i, j)?;
            let mut retries = 0;
            while cal_status != MEM_CAL_STATUS_SUCCESS {
                if retries >= MAX_CAL_RETRIES {
                    log::error!(
                        "IOSSM: calibration of IO96B_{} interface {} failed after {} retries",
                        i,
                        j,
                        retries
                    );
                    return Err(IossmError::CalibrationFailed {
                        instance: i,
                        interface: j,
                        retries,
                    });
                }
                retries += 1;
                log::debug!(
                    "IOSSM: re-calibrating IO96B_{} interface {}, attempt {}",
                    i,
                    j,
                    retries
                );
                send(
                    mb,
                    i,
                    &Request::new(*interface, CmdType::TrigMemCalOp, Opcode::TrigMemCal),
                )?;
                if !poll_until(delay, timeouts.cal_busy, || !mb.status().cal_busy()) {
                    log::warn!("IOSSM: IO96B_{} still busy after re-calibration", i);
                }
                cal_status = mem_cal_status(mb, i, j)?;
            }
        }
        instance.cal_status = true;
    }
    info.overall_cal_status = true;
    Ok(())
}

/// Retrieve the DDR technology. All memory interfaces must use the same technology.
pub fn get_mem_technology<M: Iossm>(
    info: &mut Io96bInfo,
    mailboxes: &mut [M],
) -> Result<(), IossmError> {
    info.ddr_type = DdrType::Unknown;
    for (i, instance) in info.instances.iter().enumerate() {
        let mb = mailbox(mailboxes, i)?;
        for interface in instance.interfaces.iter() {
            let resp = send(
                mb,
                i,
                &Request::new(*interface, CmdType::GetMemInfo, Opcode::GetMemTechnology),
            )?;
            let ddr_type = DdrType::from_raw(resp.data_short() & 0b111);
            if info.ddr_type == DdrType::Unknown {
                info.ddr_type = ddr_type;
            } else if info.ddr_type != ddr_type {
                log::error!("IOSSM: mismatch DDR type on IO96B_{}", i);
                return Err(IossmError::DdrTypeMismatch(i));
            }
        }
    }
    Ok(())
}

/// Retrieve the memory size in Gbit of every instance and the overall memory size.
pub fn get_mem_width_info<M: Iossm>(
    info: &mut Io96bInfo,
    mailboxes: &mut [M],
) -> Result<(), IossmError> {
    let mut total_size: u16 = 0;
    for (i, instance) in info.instances.iter_mut().enumerate() {
        let mb = mailbox(mailboxes, i)?;
        let mut size: u16 = 0;
        for interface in instance.interfaces.iter() {
            let resp = send(
                mb,
                i,
                &Request::new(*interface, CmdType::GetMemInfo, Opcode::GetMemWidthInfo),
            )?;
            size = size.saturating_add((resp.data[1] & 0xFF) as u16);
        }
        if size == 0 {
            log::error!("IOSSM: failed to get memory size of IO96B_{}", i);
            return Err(IossmError::NoMemorySize(i));
        }
        instance.size_gbit = size;
        total_size = total_size.saturating_add(size);
    }
    if total_size == 0 {
        return Err(IossmError::NoTotalMemorySize);
    }
    info.overall_size_gbit = total_size;
    Ok(())
}

/// Retrieve the ECC enable status. All memory interfaces must agree.
pub fn ecc_enable_status<M: Iossm>(
    info: &mut Io96bInfo,
    mailboxes: &mut [M],
) -> Result<(), IossmError> {
    let mut ecc_status: Option<bool> = None;
    for (i, instance) in info.instances.iter().enumerate() {
        let mb = mailbox(mailboxes, i)?;
        for interface in instance.interfaces.iter() {
            let resp = send(
                mb,
                i,
                &Request::new(*interface, CmdType::TrigControllerOp, Opcode::EccEnableStatus),
            )?;
            let enabled = resp.data_short() & 0b11 != 0;
            match ecc_status {
                None => ecc_status = Some(enabled),
                Some(status) if status != enabled => {
                    log::error!("IOSSM: mismatch DDR ECC status on IO96B_{}", i);
                    return Err(IossmError::EccStatusMismatch(i));
                }
                Some(_) => (),
            }
        }
    }
    info.ecc_enabled = ecc_status.unwrap_or(false);
    log::debug!("IOSSM: ECC enable status: {}", info.ecc_enabled);
    Ok(())
}

/// Initialize the full memory of all interfaces with the memory initialization BIST.
///
/// This is required for ECC memory, where reading uninitialized memory triggers ECC errors.
pub fn bist_mem_init_start<M: Iossm, D: DelayNs>(
    info: &Io96bInfo,
    mailboxes: &mut [M],
    delay: &mut D,
    timeouts: &Timeouts,
) -> Result<(), IossmError> {
    for (i, instance) in info.instances.iter().enumerate() {
        let mb = mailbox(mailboxes, i)?;
        for interface in instance.interfaces.iter() {
            let resp = send(
                mb,
                i,
                &Request::new(*interface, CmdType::TrigControllerOp, Opcode::BistMemInitStart)
                    .with_param(0, BIST_MEM_INIT_FULL_RANGE),
            )?;
            if resp.data_short() & 0b1 == 0 {
                let code = resp.error_code().value();
                log::error!(
                    "IOSSM: failed to initialize memory on IO96B_{}, error code {:#x}",
                    i,
                    code
                );
                return Err(IossmError::BistStartFailed { instance: i, code });
            }

            let mut last_code = 0;
            let done = try_poll_until(delay, timeouts.bist_mem_init, || {
                let resp = send(
                    &mut *mb,
                    i,
                    &Request::new(
                        *interface,
                        CmdType::TrigControllerOp,
                        Opcode::BistMemInitStatus,
                    ),
                )?;
                last_code = resp.error_code().value();
                Ok::<_, IossmError>(resp.data_short() & 0b1 == 1)
            })?;
            if !done {
                log::error!(
                    "IOSSM: timeout initializing memory on IO96B_{}, error code {:#x}",
                    i,
                    last_code
                );
                return Err(IossmError::BistTimeout {
                    instance: i,
                    code: last_code,
                });
            }
            log::debug!("IOSSM: memory initialized successfully on IO96B_{}", i);
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;

    /// Scripted IOSSM which answers the commands used by the DDR initialization.
    pub struct FakeIossm {
        pub status: u32,
        pub interfaces: [u32; MAX_MEM_INTERFACES],
        /// Number of re-calibrations required until the calibration status reports success.
        pub cal_triggers_needed: u32,
        pub cal_triggers: u32,
        pub ddr_type: u16,
        pub width_gbit: u32,
        pub ecc: u16,
        pub bist_start_ok: bool,
        pub bist_polls_needed: u32,
        pub bist_polls: u32,
        pub fail_with: Option<MailboxError>,
        pub opcodes: heapless::Vec<(Opcode, MemInterface), 64>,
    }

    /// Interface descriptor with ip type 1 and the given instance id.
    pub const fn intf(instance_id: u32) -> u32 {
        (1 << 29) | (instance_id << 24)
    }

    impl FakeIossm {
        /// Calibrated IOSSM with a single 16 Gbit DDR4 interface without ECC.
        pub fn new() -> Self {
            Self {
                status: 0b001,
                interfaces: [intf(0), 0],
                cal_triggers_needed: 0,
                cal_triggers: 0,
                ddr_type: 0,
                width_gbit: 16,
                ecc: 0,
                bist_start_ok: true,
                bist_polls_needed: 0,
                bist_polls: 0,
                fail_with: None,
                opcodes: heapless::Vec::new(),
            }
        }

        pub fn count(&self, opcode: Opcode) -> usize {
            self.opcodes.iter().filter(|(op, _)| *op == opcode).count()
        }

        fn response(data_short: u16, data: [u32; 3]) -> Response {
            Response {
                status: CommandResponseStatus::new_with_raw_value(((data_short as u32) << 16) | 1),
                data,
            }
        }
    }

    impl Iossm for FakeIossm {
        fn status(&mut self) -> IossmStatus {
            IossmStatus::new_with_raw_value(self.status)
        }

        fn request(&mut self, req: &Request) -> Result<Response, MailboxError> {
            if let Some(err) = self.fail_with {
                return Err(err);
            }
            self.opcodes.push((req.opcode, req.target)).unwrap();
            Ok(match req.opcode {
                Opcode::GetMemIntfInfo => {
                    Self::response(0, [self.interfaces[0], self.interfaces[1], 0])
                }
                Opcode::GetMemCalStatus => {
                    let status = if self.cal_triggers >= self.cal_triggers_needed {
                        MEM_CAL_STATUS_SUCCESS
                    } else {
                        0b010
                    };
                    Self::response(0, [status, status, 0])
                }
                Opcode::TrigMemCal => {
                    self.cal_triggers += 1;
                    Self::response(0, [0; 3])
                }
                Opcode::GetMemTechnology => Self::response(self.ddr_type, [0; 3]),
                Opcode::GetMemWidthInfo => Self::response(0, [0, self.width_gbit, 0]),
                Opcode::EccEnableStatus => Self::response(self.ecc, [0; 3]),
                Opcode::BistMemInitStart => {
                    assert_eq!(req.params[0], BIST_MEM_INIT_FULL_RANGE);
                    Self::response(self.bist_start_ok as u16, [0; 3])
                }
                Opcode::BistMemInitStatus => {
                    self.bist_polls += 1;
                    Self::response((self.bist_polls > self.bist_polls_needed) as u16, [0; 3])
                }
                _ => Self::response(0, [0; 3]),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{FakeIossm, intf};
    use super::*;
    use crate::testutil::{FakeRegs, NoDelay};
    use agilex5::sysmgr::SystemManager;

    const ECC_INTSTATUS_SERR: usize = 0x9C;

    const SHORT_TIMEOUTS: Timeouts = Timeouts {
        ckgen_lock: MillisDuration::millis(1),
        cal_busy: MillisDuration::millis(1),
        bist_mem_init: MillisDuration::millis(1),
    };

    fn info(num_instance: usize) -> Io96bInfo {
        Io96bInfo::new(num_instance, 1, u4::new(0))
    }

    #[test]
    fn command_word_layout() {
        let req = Request::new(
            MemInterface {
                ip_type: u3::new(1),
                instance_id: u5::new(2),
            },
            CmdType::TrigControllerOp,
            Opcode::BistMemInitStart,
        );
        assert_eq!(req.command_word().raw_value(), 0x2204_0303);
    }

    #[test]
    fn initial_calibration_passes() {
        let regs = FakeRegs::<0x98>::new();
        regs.write(ECC_INTSTATUS_SERR, 0b11 << 16);
        let mut sysmgr = unsafe { SystemManager::new_mmio_at(regs.addr()) };
        let mut mbs = [FakeIossm::new(), FakeIossm::new()];
        let mut info = info(2);
        info.ckgen_lock = true;
        init_mem_cal(&mut info, &mut mbs, &mut sysmgr, &mut NoDelay, &SHORT_TIMEOUTS).unwrap();
        assert!(info.overall_cal_status);
        assert!(info.instances.iter().all(|inst| inst.cal_status));
    }

    #[test]
    fn initial_calibration_partial_failure() {
        let regs = FakeRegs::<0x98>::new();
        let mut sysmgr = unsafe { SystemManager::new_mmio_at(regs.addr()) };
        let mut mbs = [FakeIossm::new(), FakeIossm::new()];
        // Success and fail are both set.
        mbs[1].status = 0b011;
        let mut info = info(2);
        init_mem_cal(&mut info, &mut mbs, &mut sysmgr, &mut NoDelay, &SHORT_TIMEOUTS).unwrap();
        assert!(!info.overall_cal_status);
        assert!(info.instances[0].cal_status);
        assert!(!info.instances[1].cal_status);

        // Still busy.
        mbs[1].status = 0b101;
        init_mem_cal(&mut info, &mut mbs, &mut sysmgr, &mut NoDelay, &SHORT_TIMEOUTS).unwrap();
        assert!(!info.overall_cal_status);
    }

    #[test]
    fn ckgen_not_locked() {
        let regs = FakeRegs::<0x98>::new();
        // Only IO96B0 locked.
        regs.write(ECC_INTSTATUS_SERR, 0b01 << 16);
        let mut sysmgr = unsafe { SystemManager::new_mmio_at(regs.addr()) };
        let mut mbs = [FakeIossm::new(), FakeIossm::new()];
        let mut info = info(2);
        info.ckgen_lock = true;
        assert_eq!(
            init_mem_cal(&mut info, &mut mbs, &mut sysmgr, &mut NoDelay, &SHORT_TIMEOUTS),
            Err(IossmError::CkgenNotLocked(1))
        );
    }

    #[test]
    fn mailbox_init_collects_interfaces() {
        let mut mbs = [FakeIossm::new(), FakeIossm::new()];
        mbs[0].interfaces = [intf(0), intf(1)];
        mbs[1].interfaces = [0, intf(3)];
        let mut info = info(2);
        io96b_mb_init(&mut info, &mut mbs).unwrap();
        assert_eq!(info.instances[0].interfaces.len(), 2);
        assert_eq!(info.instances[1].interfaces.len(), 1);
        assert_eq!(info.instances[1].interfaces[0].instance_id.value(), 3);
        assert_eq!(info.instances[1].interfaces[0].ip_type.value(), 1);
    }

    #[test]
    fn missing_mailbox() {
        let mut mbs = [FakeIossm::new()];
        let mut info = info(2);
        assert_eq!(
            io96b_mb_init(&mut info, &mut mbs),
            Err(IossmError::MissingMailbox(1))
        );
    }

    #[test]
    fn recalibration_succeeds_within_retries() {
        let mut mbs = [FakeIossm::new()];
        mbs[0].cal_triggers_needed = 2;
        let mut info = info(1);
        io96b_mb_init(&mut info, &mut mbs).unwrap();
        trig_mem_cal(&mut info, &mut mbs, &mut NoDelay, &SHORT_TIMEOUTS).unwrap();
        assert!(info.overall_cal_status);
        assert!(info.instances[0].cal_status);
        assert_eq!(mbs[0].count(Opcode::TrigMemCal), 2);
        assert_eq!(mbs[0].count(Opcode::GetMemCalStatus), 3);
    }

    #[test]
    fn recalibration_skips_calibrated_instances() {
        let mut mbs = [FakeIossm::new(), FakeIossm::new()];
        mbs[1].cal_triggers_needed = 1;
        let mut info = info(2);
        io96b_mb_init(&mut info, &mut mbs).unwrap();
        info.instances[0].cal_status = true;
        trig_mem_cal(&mut info, &mut mbs, &mut NoDelay, &SHORT_TIMEOUTS).unwrap();
        assert_eq!(mbs[0].count(Opcode::GetMemCalStatus), 0);
        assert_eq!(mbs[1].count(Opcode::TrigMemCal), 1);
    }

    #[test]
    fn recalibration_gives_up() {
        let mut mbs = [FakeIossm::new()];
        mbs[0].cal_triggers_needed = MAX_CAL_RETRIES + 1;
        let mut info = info(1);
        io96b_mb_init(&mut info, &mut mbs).unwrap();
        assert_eq!(
            trig_mem_cal(&mut info, &mut mbs, &mut NoDelay, &SHORT_TIMEOUTS),
            Err(IossmError::CalibrationFailed {
                instance: 0,
                interface: 0,
                retries: MAX_CAL_RETRIES
            })
        );
        assert!(!info.overall_cal_status);
    }

    #[test]
    fn memory_technology() {
        let mut mbs = [FakeIossm::new(), FakeIossm::new()];
        mbs[0].ddr_type = 4;
        mbs[1].ddr_type = 4;
        let mut info = info(2);
        io96b_mb_init(&mut info, &mut mbs).unwrap();
        get_mem_technology(&mut info, &mut mbs).unwrap();
        assert_eq!(info.ddr_type, DdrType::Lpddr5);
        assert_eq!(info.ddr_type.as_str(), "LPDDR5");

        mbs[1].ddr_type = 1;
        assert_eq!(
            get_mem_technology(&mut info, &mut mbs),
            Err(IossmError::DdrTypeMismatch(1))
        );
    }

    #[test]
    fn memory_width() {
        let mut mbs = [FakeIossm::new(), FakeIossm::new()];
        mbs[0].interfaces = [intf(0), intf(1)];
        mbs[0].width_gbit = 0x1_08;
        mbs[1].width_gbit = 16;
        let mut info = info(2);
        io96b_mb_init(&mut info, &mut mbs).unwrap();
        get_mem_width_info(&mut info, &mut mbs).unwrap();
        // Only the lower eight bits hold the size.
        assert_eq!(info.instances[0].size_gbit, 16);
        assert_eq!(info.instances[1].size_gbit, 16);
        assert_eq!(info.overall_size_gbit, 32);

        mbs[1].width_gbit = 0;
        assert_eq!(
            get_mem_width_info(&mut info, &mut mbs),
            Err(IossmError::NoMemorySize(1))
        );
    }

    #[test]
    fn ecc_status() {
        let mut mbs = [FakeIossm::new(), FakeIossm::new()];
        mbs[0].ecc = 0b10;
        mbs[1].ecc = 0b01;
        let mut info = info(2);
        io96b_mb_init(&mut info, &mut mbs).unwrap();
        ecc_enable_status(&mut info, &mut mbs).unwrap();
        assert!(info.ecc_enabled);

        mbs[1].ecc = 0;
        assert_eq!(
            ecc_enable_status(&mut info, &mut mbs),
            Err(IossmError::EccStatusMismatch(1))
        );
    }

    #[test]
    fn bist_memory_init() {
        let mut mbs = [FakeIossm::new()];
        mbs[0].bist_polls_needed = 3;
        let mut info = info(1);
        io96b_mb_init(&mut info, &mut mbs).unwrap();
        bist_mem_init_start(&info, &mut mbs, &mut NoDelay, &SHORT_TIMEOUTS).unwrap();
        assert_eq!(mbs[0].count(Opcode::BistMemInitStart), 1);
        assert_eq!(mbs[0].bist_polls, 4);
    }

    #[test]
    fn bist_memory_init_failures() {
        let mut mbs = [FakeIossm::new()];
        mbs[0].bist_start_ok = false;
        let mut info = info(1);
        io96b_mb_init(&mut info, &mut mbs).unwrap();
        assert_eq!(
            bist_mem_init_start(&info, &mut mbs, &mut NoDelay, &SHORT_TIMEOUTS),
            Err(IossmError::BistStartFailed {
                instance: 0,
                code: 0
            })
        );

        mbs[0].bist_start_ok = true;
        mbs[0].bist_polls_needed = u32::MAX;
        assert_eq!(
            bist_mem_init_start(&info, &mut mbs, &mut NoDelay, &SHORT_TIMEOUTS),
            Err(IossmError::BistTimeout {
                instance: 0,
                code: 0
            })
        );
    }

    #[test]
    fn mailbox_errors_carry_instance() {
        let mut mbs = [FakeIossm::new(), FakeIossm::new()];
        mbs[1].fail_with = Some(MailboxError::CmdReqNotReady);
        let mut info = info(2);
        assert_eq!(
            io96b_mb_init(&mut info, &mut mbs),
            Err(IossmError::Mailbox {
                instance: 1,
                source: MailboxError::CmdReqNotReady
            })
        );
    }
}
