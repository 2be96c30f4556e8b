//! # Boot-time HAL for the Agilex 5 SoC FPGA family
//!
//! This crate contains the hard processor system (HPS) bring-up logic which runs once inside the
//! secondary program loader, before any operating system is started. It builds on top of the
//! [peripheral access crate](agilex5) and covers:
//!
//! - CPU identification, see [cpu].
//! - Boot scratch register handling and reset type decoding, see [scratch].
//! - FPGA bridge reset and other SoC64 boot hooks, see [misc].
//! - The IOSSM mailbox of the IO96B memory subsystems, see [iossm].
//! - The full DRAM initialization sequence including calibration, memory size reconciliation
//!   and firewall programming, see [ddr].
//!
//! All of this code is single-threaded and non-reentrant. Fatal conditions are reported as errors
//! and it is up to the caller to halt the boot.
#![no_std]

#[cfg(test)]
extern crate std;

pub mod cpu;
pub mod ddr;
pub mod fdt;
pub mod handoff;
pub mod iossm;
pub mod misc;
pub mod scratch;
pub mod secreg;
pub mod time;

pub use agilex5 as pac;

pub const SZ_1M: u64 = 1024 * 1024;
pub const SZ_1G: u64 = 1024 * SZ_1M;
