//! Handoff data parsing.
//!
//! The secure device manager places configuration tables generated by the FPGA tooling at the
//! end of the on-chip RAM. Each table starts with a header containing a magic value and the
//! length of the table in bytes, followed by the data words.
use arbitrary_int::u4;

pub const HANDOFF_BASE_ADDR: usize = 0x0007_F000;
pub const HANDOFF_SDRAM_ADDR: usize = HANDOFF_BASE_ADDR + 0x634;
/// Number of data words inside the SDRAM handoff table.
pub const HANDOFF_SDRAM_LEN: usize = 5;
pub const HANDOFF_MAGIC_SDRAM: u32 = 0x4452_4D53;

const HANDOFF_OFFSET_LENGTH: usize = 0x4;
const HANDOFF_OFFSET_DATA: usize = 0x10;

/// Word index of the port and EMIF configuration inside the SDRAM handoff table.
pub const PORT_EMIF_CONFIG_OFFSET: usize = 4;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandoffError {
    #[error("invalid handoff magic {0:#010x}")]
    InvalidMagic(u32),
    #[error("invalid handoff length {0}")]
    InvalidLength(u32),
    #[error("handoff table too short, expected at least {expected} words, got {found}")]
    TableTooShort { expected: usize, found: usize },
}

/// Read a handoff table into the provided buffer.
///
/// At most `table.len()` words are copied. Returns the number of copied words.
///
/// # Safety
///
/// `base_addr` must point to a readable handoff table.
pub unsafe fn socfpga_handoff_read(
    base_addr: usize,
    expected_magic: u32,
    table: &mut [u32],
) -> Result<usize, HandoffError> {
    let read_word = |offset: usize| unsafe {
        core::ptr::read_volatile((base_addr + offset) as *const u32)
    };
    let magic = read_word(0);
    if magic != expected_magic {
        return Err(HandoffError::InvalidMagic(magic));
    }
    let length = read_word(HANDOFF_OFFSET_LENGTH);
    if (length as usize) < HANDOFF_OFFSET_DATA || length % 4 != 0 {
        return Err(HandoffError::InvalidLength(length));
    }
    let words = ((length as usize - HANDOFF_OFFSET_DATA) / 4).min(table.len());
    for (idx, entry) in table.iter_mut().take(words).enumerate() {
        *entry = read_word(HANDOFF_OFFSET_DATA + idx * 4);
    }
    Ok(words)
}

/// Read the SDRAM handoff table from the fixed on-chip RAM location.
///
/// # Safety
///
/// Must only be called on hardware where the secure device manager provided the handoff data.
pub unsafe fn read_sdram_handoff() -> Result<[u32; HANDOFF_SDRAM_LEN], HandoffError> {
    let mut table = [0; HANDOFF_SDRAM_LEN];
    unsafe { socfpga_handoff_read(HANDOFF_SDRAM_ADDR, HANDOFF_MAGIC_SDRAM, &mut table)? };
    Ok(table)
}

#[bitbybit::bitfield(u32)]
#[derive(Debug)]
pub struct PortEmifConfig {
    /// Mask of the enabled IO96B PLLs.
    #[bits(16..=19, r)]
    io96b_pll: u4,
    #[bit(1, r)]
    dual_emif: bool,
    #[bit(0, r)]
    dual_port: bool,
}

/// DDR configuration extracted from the SDRAM handoff table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DdrHandoff {
    pub dual_port: bool,
    pub dual_emif: bool,
    pub io96b_pll: u4,
}

impl DdrHandoff {
    pub fn from_table(table: &[u32]) -> Result<Self, HandoffError> {
        let raw = *table
            .get(PORT_EMIF_CONFIG_OFFSET)
            .ok_or(HandoffError::TableTooShort {
                expected: PORT_EMIF_CONFIG_OFFSET + 1,
                found: table.len(),
            })?;
        let config = PortEmifConfig::new_with_raw_value(raw);
        log::debug!("DDR: dualport from handoff: {}", config.dual_port());
        log::debug!("DDR: dualemif from handoff: {}", config.dual_emif());
        log::debug!(
            "DDR: io96b enabled pll from handoff: {:#x}",
            config.io96b_pll().value()
        );
        Ok(Self {
            dual_port: config.dual_port(),
            dual_emif: config.dual_emif(),
            io96b_pll: config.io96b_pll(),
        })
    }

    #[inline]
    pub const fn num_port(&self) -> u8 {
        if self.dual_port { 2 } else { 1 }
    }

    /// Number of IO96B instances in use.
    #[inline]
    pub const fn num_instance(&self) -> usize {
        if self.dual_emif { 2 } else { 1 }
    }

    /// Any of the two multi-port modes requires CCU interleaving.
    #[inline]
    pub const fn interleaving(&self) -> bool {
        self.dual_port || self.dual_emif
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeRegs;

    #[test]
    fn parse_port_emif_config() {
        let handoff = DdrHandoff::from_table(&[0, 0, 0, 0, 0x000A_0003]).unwrap();
        assert!(handoff.dual_port);
        assert!(handoff.dual_emif);
        assert_eq!(handoff.io96b_pll.value(), 0xA);
        assert_eq!(handoff.num_port(), 2);
        assert_eq!(handoff.num_instance(), 2);
        assert!(handoff.interleaving());

        let handoff = DdrHandoff::from_table(&[0, 0, 0, 0, 0x0001_0000]).unwrap();
        assert!(!handoff.dual_port);
        assert!(!handoff.dual_emif);
        assert_eq!(handoff.num_port(), 1);
        assert_eq!(handoff.num_instance(), 1);
        assert!(!handoff.interleaving());
    }

    #[test]
    fn short_table() {
        assert_eq!(
            DdrHandoff::from_table(&[0, 0]),
            Err(HandoffError::TableTooShort {
                expected: 5,
                found: 2
            })
        );
    }

    #[test]
    fn read_table_from_memory() {
        let mem = FakeRegs::<16>::new();
        mem.write(0x0, HANDOFF_MAGIC_SDRAM);
        mem.write(0x4, 0x10 + 4 * 5);
        for idx in 0..5 {
            mem.write(0x10 + idx * 4, 0x100 + idx as u32);
        }
        let mut table = [0; 8];
        let words =
            unsafe { socfpga_handoff_read(mem.addr(), HANDOFF_MAGIC_SDRAM, &mut table) }.unwrap();
        assert_eq!(words, 5);
        assert_eq!(&table[..6], &[0x100, 0x101, 0x102, 0x103, 0x104, 0]);

        // Truncated to the table length.
        let mut small = [0; 2];
        let words =
            unsafe { socfpga_handoff_read(mem.addr(), HANDOFF_MAGIC_SDRAM, &mut small) }.unwrap();
        assert_eq!(words, 2);
        assert_eq!(small, [0x100, 0x101]);
    }

    #[test]
    fn invalid_header() {
        let mem = FakeRegs::<8>::new();
        mem.write(0x0, 0xDEAD_BEEF);
        let mut table = [0; 5];
        assert_eq!(
            unsafe { socfpga_handoff_read(mem.addr(), HANDOFF_MAGIC_SDRAM, &mut table) },
            Err(HandoffError::InvalidMagic(0xDEAD_BEEF))
        );
        mem.write(0x0, HANDOFF_MAGIC_SDRAM);
        mem.write(0x4, 0x3);
        assert_eq!(
            unsafe { socfpga_handoff_read(mem.addr(), HANDOFF_MAGIC_SDRAM, &mut table) },
            Err(HandoffError::InvalidLength(3))
        );
    }
}
