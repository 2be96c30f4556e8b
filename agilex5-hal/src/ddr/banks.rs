//! DRAM bank layout.
use crate::SZ_1G;

/// Maximum number of DRAM banks which can be tracked.
pub const MAX_DRAM_BANKS: usize = 4;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct DramBank {
    pub start: u64,
    pub size: u64,
}

impl DramBank {
    pub const fn new(start: u64, size: u64) -> Self {
        Self { start, size }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Last address inside the bank. Must not be called for empty banks.
    #[inline]
    pub const fn last_addr(&self) -> u64 {
        self.start + self.size - 1
    }
}

pub type DramBanks = heapless::Vec<DramBank, MAX_DRAM_BANKS>;

/// Fixed physical DRAM windows of the HPS address map.
pub const DRAM_BANK_INFO: [DramBank; 3] = [
    DramBank::new(0x8000_0000, 2 * SZ_1G),
    DramBank::new(0x8_8000_0000, 30 * SZ_1G),
    DramBank::new(0x88_0000_0000, 480 * SZ_1G),
];

/// Distribute the memory size reported by the hardware over the fixed DRAM windows.
///
/// At most `nr_banks` banks are filled. Memory which does not fit into the used windows is
/// not mapped.
pub fn banks_from_hw_size(hw_size: u64, nr_banks: usize) -> DramBanks {
    if nr_banks > DRAM_BANK_INFO.len() {
        log::warn!(
            "DDR: configured {} DRAM banks, only {} are available",
            nr_banks,
            DRAM_BANK_INFO.len()
        );
    }
    let mut banks = DramBanks::new();
    let mut remaining = hw_size;
    for info in DRAM_BANK_INFO.iter().take(nr_banks.min(MAX_DRAM_BANKS)) {
        if remaining == 0 {
            break;
        }
        let size = remaining.min(info.size);
        // Can not fail, at most three banks are pushed.
        let _ = banks.push(DramBank::new(info.start, size));
        remaining -= size;
    }
    if remaining != 0 {
        log::warn!("DDR: {:#x} bytes of memory are not mapped", remaining);
    }
    banks
}

/// Sum of all bank sizes.
pub fn total_size(banks: &[DramBank]) -> u64 {
    banks.iter().map(|bank| bank.size).sum()
}
