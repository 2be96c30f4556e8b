//! Device tree helpers.
//!
//! The boot loader device tree describes the memory banks and the secure register settings
//! which are applied during the DDR initialization. The blob is parsed zero-copy with the
//! [fdt] crate.
use crate::ddr::banks::{DramBank, DramBanks};

#[derive(Debug, Clone, Copy, thiserror::Error)]
pub enum FdtError {
    #[error("invalid device tree blob: {0:?}")]
    Parse(fdt::FdtError),
    #[error("no memory node found")]
    NoMemoryNode,
    #[error("device tree node {0} not found")]
    NodeNotFound(&'static str),
    #[error("invalid secure register settings in node {0}")]
    InvalidSecRegSettings(&'static str),
}

impl From<fdt::FdtError> for FdtError {
    fn from(value: fdt::FdtError) -> Self {
        FdtError::Parse(value)
    }
}

/// Memory layout decoded from the device tree.
#[derive(Debug, Default, Clone)]
pub struct DtMemory {
    /// Sum of all bank sizes. Zero if the memory nodes do not specify a size.
    pub ram_size: u64,
    pub banks: DramBanks,
}

/// Strip the unit address from a node name.
#[inline]
pub(crate) fn base_name(name: &str) -> &str {
    name.split('@').next().unwrap_or(name)
}

fn is_memory_node(node: &fdt::node::FdtNode<'_, '_>) -> bool {
    if let Some(device_type) = node.property("device_type").and_then(|p| p.as_str()) {
        return device_type == "memory";
    }
    base_name(node.name) == "memory"
}

/// Decode the RAM size and the DRAM banks from all memory nodes.
///
/// At most `max_banks` banks are recorded, additional memory regions are ignored.
pub fn decode_ram_size(blob: &[u8], max_banks: usize) -> Result<DtMemory, FdtError> {
    let fdt = fdt::Fdt::new(blob)?;
    let mut mem = DtMemory::default();
    let mut found = false;
    for node in fdt.all_nodes().filter(is_memory_node) {
        found = true;
        let Some(regions) = node.reg() else {
            continue;
        };
        for region in regions {
            let bank = DramBank {
                start: region.starting_address as usize as u64,
                size: region.size.unwrap_or(0) as u64,
            };
            if mem.banks.len() >= max_banks || mem.banks.push(bank).is_err() {
                log::warn!(
                    "DT: ignoring memory region at {:#x}, only {} banks supported",
                    bank.start,
                    mem.banks.len()
                );
                continue;
            }
            mem.ram_size += bank.size;
        }
    }
    if !found {
        return Err(FdtError::NoMemoryNode);
    }
    log::debug!(
        "DT: RAM size {:#x} in {} bank(s)",
        mem.ram_size,
        mem.banks.len()
    );
    Ok(mem)
}
