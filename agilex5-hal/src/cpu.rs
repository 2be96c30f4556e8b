//! CPU identification.
use arbitrary_int::{u4, u12};

pub const IMPLEMENTER_ARM: u8 = 0x41;

#[bitbybit::bitfield(u32)]
#[derive(Debug)]
pub struct MainId {
    #[bits(24..=31, r)]
    implementer: u8,
    #[bits(20..=23, r)]
    variant: u4,
    #[bits(16..=19, r)]
    architecture: u4,
    #[bits(4..=15, r)]
    part_num: u12,
    #[bits(0..=3, r)]
    revision: u4,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Core {
    CortexA53,
    CortexA55,
    CortexA76,
    Unknown,
}

impl Core {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Core::CortexA53 => "Cortex-A53",
            Core::CortexA55 => "Cortex-A55",
            Core::CortexA76 => "Cortex-A76",
            Core::Unknown => "unknown",
        }
    }
}

impl MainId {
    pub fn core(&self) -> Core {
        if self.implementer() != IMPLEMENTER_ARM {
            return Core::Unknown;
        }
        match self.part_num().value() {
            0xD03 => Core::CortexA53,
            0xD05 => Core::CortexA55,
            0xD0B => Core::CortexA76,
            _ => Core::Unknown,
        }
    }
}

/// Read the main ID register of the executing core.
#[cfg(target_arch = "aarch64")]
#[inline]
pub fn read_main_id() -> MainId {
    let midr: u64;
    // Safety: Reading MIDR_EL1 has no side effects.
    unsafe {
        core::arch::asm!("mrs {}, midr_el1", out(reg) midr, options(nomem, nostack));
    }
    MainId::new_with_raw_value(midr as u32)
}

/// Platform banner. Agilex 5 combines Cortex-A55 and Cortex-A76 cores, the other SoC64 devices
/// only have Cortex-A53 cores.
pub const fn platform_banner(agilex5: bool) -> &'static str {
    if agilex5 {
        "Intel FPGA SoCFPGA Platform (ARMv8 64bit Cortex-A55/A76)"
    } else {
        "Intel FPGA SoCFPGA Platform (ARMv8 64bit Cortex-A53)"
    }
}

/// Log the platform banner and, where available, the executing core.
pub fn print_cpuinfo(agilex5: bool) {
    log::info!("CPU:   {}", platform_banner(agilex5));
    #[cfg(target_arch = "aarch64")]
    {
        let midr = read_main_id();
        log::debug!(
            "CPU:   {} r{}p{}",
            midr.core().as_str(),
            midr.variant().value(),
            midr.revision().value()
        );
    }
}
