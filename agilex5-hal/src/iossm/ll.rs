//! Low-level IOSSM mailbox access.
use embedded_hal::delay::DelayNs;

use agilex5::io96b::{CommandResponseStatus, Io96bCsr, Io96bInstance, MmioIo96bCsr};

use crate::time::{MillisDuration, poll_until};

use super::{Iossm, IossmStatus, MailboxError, Request, Response};

/// Default timeout for the command request register to become free and for a command response.
pub const DEFAULT_MAILBOX_TIMEOUT: MillisDuration = MillisDuration::millis(1_000);

/// Mailbox of a single IO96B instance.
pub struct Io96bMailbox<D> {
    regs: MmioIo96bCsr<'static>,
    delay: D,
    timeout: MillisDuration,
}

impl<D: DelayNs> Io96bMailbox<D> {
    /// Create a mailbox driver for the given IO96B instance.
    ///
    /// # Safety
    ///
    /// Only one mailbox driver per instance must exist at the same time.
    pub unsafe fn new_fixed(instance: Io96bInstance, delay: D) -> Self {
        Self::new(unsafe { Io96bCsr::new_mmio_fixed(instance) }, delay)
    }

    pub fn new(regs: MmioIo96bCsr<'static>, delay: D) -> Self {
        Self {
            regs,
            delay,
            timeout: DEFAULT_MAILBOX_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: MillisDuration) -> Self {
        self.timeout = timeout;
        self
    }

    #[inline]
    pub fn regs(&mut self) -> &mut MmioIo96bCsr<'static> {
        &mut self.regs
    }

    fn write_params(&mut self, params: &[u32; super::NUM_CMD_PARAMS]) {
        for (idx, param) in params.iter().enumerate() {
            // Unused parameters are not written.
            if *param == 0 {
                continue;
            }
            match idx {
                0 => self.regs.write_cmd_param_0(*param),
                1 => self.regs.write_cmd_param_1(*param),
                2 => self.regs.write_cmd_param_2(*param),
                3 => self.regs.write_cmd_param_3(*param),
                4 => self.regs.write_cmd_param_4(*param),
                5 => self.regs.write_cmd_param_5(*param),
                _ => self.regs.write_cmd_param_6(*param),
            }
        }
    }
}

impl<D: DelayNs> Iossm for Io96bMailbox<D> {
    #[inline]
    fn status(&mut self) -> IossmStatus {
        self.regs.read_iossm_status()
    }

    fn request(&mut self, req: &Request) -> Result<Response, MailboxError> {
        let regs = &mut self.regs;
        if !poll_until(&mut self.delay, self.timeout, || {
            regs.read_cmd_req().raw_value() == 0
        }) {
            log::error!("IOSSM: command request register not ready");
            return Err(MailboxError::CmdReqNotReady);
        }

        self.write_params(&req.params);
        self.regs.write_cmd_req(req.command_word());

        let regs = &mut self.regs;
        if !poll_until(&mut self.delay, self.timeout, || {
            regs.read_cmd_response_status().ready()
        }) {
            let status = self.regs.read_cmd_response_status().raw_value();
            log::error!(
                "IOSSM: response timeout for opcode {:#x}, status {:#010x}",
                u16::from(req.opcode),
                status
            );
            return Err(MailboxError::ResponseTimeout(status));
        }

        let status = self.regs.read_cmd_response_status();
        let data = [
            self.regs.read_cmd_response_data_0(),
            self.regs.read_cmd_response_data_1(),
            self.regs.read_cmd_response_data_2(),
        ];
        // Acknowledge the response.
        self.regs
            .write_cmd_response_status(CommandResponseStatus::new_with_raw_value(
                status.raw_value() & !0b1,
            ));
        Ok(Response { status, data })
    }
}
