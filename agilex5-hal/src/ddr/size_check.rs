//! Memory size probing.
//!
//! The size of each DRAM bank is verified by writing patterns at power-of-two offsets and
//! checking for address aliasing.
use core::mem::size_of;

use crate::SZ_1G;

use super::banks::DramBank;

/// Probes the accessible memory size starting at a given address.
pub trait RamProbe {
    /// Returns the number of accessible bytes at `base`, up to `max_size`.
    fn ram_size(&mut self, base: u64, max_size: u64) -> u64;
}

/// Probes real memory with volatile accesses.
pub struct VolatileRamProbe(());

impl VolatileRamProbe {
    /// # Safety
    ///
    /// All probed memory ranges must be mapped. Their content is restored after probing, but
    /// nothing else must access them at the same time.
    pub const unsafe fn new() -> Self {
        Self(())
    }
}

impl RamProbe for VolatileRamProbe {
    fn ram_size(&mut self, base: u64, max_size: u64) -> u64 {
        // Safety: Guaranteed by the constructor contract.
        unsafe { get_ram_size(base as usize as *mut usize, max_size) }
    }
}

/// Word granular memory access used by the size check.
trait WordMemory {
    fn read(&mut self, word: u64) -> usize;
    fn write(&mut self, word: u64, val: usize);
}

struct VolatileMemory(*mut usize);

impl WordMemory for VolatileMemory {
    #[inline]
    fn read(&mut self, word: u64) -> usize {
        // Safety: Guaranteed by the contract of [get_ram_size].
        unsafe { core::ptr::read_volatile(self.0.wrapping_add(word as usize)) }
    }

    #[inline]
    fn write(&mut self, word: u64, val: usize) {
        // Safety: Guaranteed by the contract of [get_ram_size].
        unsafe { core::ptr::write_volatile(self.0.wrapping_add(word as usize), val) }
    }
}

/// Check memory size by looking for aliasing at power-of-two offsets.
///
/// Returns the detected size, which is at most `max_size`. The memory content is restored.
///
/// # Safety
///
/// `base` up to `base + max_size` must be valid for volatile reads and writes.
pub unsafe fn get_ram_size(base: *mut usize, max_size: u64) -> u64 {
    detect_size(&mut VolatileMemory(base), max_size)
}

/// Write back saved words from offset `cnt` upwards, most recently saved first.
///
/// Aliases of the same physical word are unwound in reverse, so it ends up with the content it
/// had before probing.
fn unwind<M: WordMemory>(mem: &mut M, save: &[usize], mut cnt: u64, max_words: u64) {
    let mut idx = save.len();
    while cnt < max_words && idx > 0 {
        idx -= 1;
        mem.write(cnt, save[idx]);
        cnt <<= 1;
    }
}

fn detect_size<M: WordMemory>(mem: &mut M, max_size: u64) -> u64 {
    const MAX_PROBES: usize = 64;
    let word = size_of::<usize>() as u64;
    let max_words = max_size / word;
    let mut save = [0usize; MAX_PROBES];
    let mut idx = 0;

    // Write the inverted offset at each power-of-two location, starting with the largest.
    let mut cnt = max_words >> 1;
    while cnt > 0 && idx < MAX_PROBES {
        save[idx] = mem.read(cnt);
        mem.write(cnt, !(cnt as usize));
        idx += 1;
        cnt >>= 1;
    }

    let base_save = mem.read(0);
    mem.write(0, 0);
    // Base address must read back.
    if mem.read(0) != 0 {
        mem.write(0, base_save);
        unwind(mem, &save[..idx], 1, max_words);
        return 0;
    }

    let mut cnt: u64 = 1;
    while cnt < max_words && idx > 0 {
        let val = mem.read(cnt);
        idx -= 1;
        mem.write(cnt, save[idx]);
        if val != !(cnt as usize) {
            // Aliasing or missing memory. The base shares physical memory with this offset and
            // was restored through the alias, its saved value is a test pattern.
            unwind(mem, &save[..idx], cnt << 1, max_words);
            return cnt * word;
        }
        cnt <<= 1;
    }
    mem.write(0, base_save);
    max_size
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SizeCheckError {
    #[error("probe chunk size {0:#x} is not a power of two")]
    SizeNotPowerOfTwo(u64),
    #[error("memory size check failed, expected {expected:#x}, found {found:#x}")]
    SizeMismatch { expected: u64, found: u64 },
}

/// Verify that all banks are accessible and add up to `ram_size`.
///
/// Each bank is probed in chunks of at most 1 GiB.
pub fn sdram_size_check<P: RamProbe>(
    probe: &mut P,
    banks: &[DramBank],
    ram_size: u64,
) -> Result<u64, SizeCheckError> {
    let mut total: u64 = 0;
    for bank in banks.iter().filter(|bank| !bank.is_empty()) {
        let mut start = bank.start;
        let mut remaining = bank.size;
        log::debug!(
            "DDR: checking bank at {:#x} with size {:#x}",
            bank.start,
            bank.size
        );
        while remaining > 0 {
            let chunk = remaining.min(SZ_1G);
            if !chunk.is_power_of_two() {
                log::error!("DDR: probe size {:#x} is not a power of two", chunk);
                return Err(SizeCheckError::SizeNotPowerOfTwo(chunk));
            }
            let detected = probe.ram_size(start, chunk);
            if detected == 0 {
                break;
            }
            total += detected;
            start += detected;
            remaining -= detected.min(remaining);
            if detected < chunk {
                break;
            }
        }
    }
    if total != ram_size {
        log::error!(
            "DDR: size check failed, expected {:#x}, found {:#x}",
            ram_size,
            total
        );
        return Err(SizeCheckError::SizeMismatch {
            expected: ram_size,
            found: total,
        });
    }
    log::info!("DDR: size check successful");
    Ok(total)
}
