//! Secure register settings.
//!
//! Some secure registers, for example the cache coherency unit (CCU) interleaving settings, are
//! programmed from device tree nodes. Every child node of a settings node describes one register
//! block with its `reg` property and a list of `<offset value mask>` triples inside the
//! `intel,offset-settings` property.
use crate::fdt::{FdtError, base_name};

pub const OFFSET_SETTINGS_PROP: &str = "intel,offset-settings";
pub const CCU_INTERLEAVING_ON: &str = "socfpga-secreg-ccu-interleaving-on";
pub const CCU_INTERLEAVING_OFF: &str = "socfpga-secreg-ccu-interleaving-off";

/// Single masked register write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SecRegSetting {
    pub base: usize,
    pub offset: u32,
    pub value: u32,
    pub mask: u32,
}

impl SecRegSetting {
    #[inline]
    pub const fn addr(&self) -> usize {
        self.base + self.offset as usize
    }

    /// New register value for the given current value. Only the bits inside the mask are
    /// changed.
    #[inline]
    pub const fn apply_to(&self, current: u32) -> u32 {
        (current & !self.mask) | (self.value & self.mask)
    }

    /// Perform the masked read-modify-write.
    ///
    /// # Safety
    ///
    /// The address of the setting must be a valid register address.
    pub unsafe fn apply(&self) {
        let ptr = self.addr() as *mut u32;
        let current = unsafe { core::ptr::read_volatile(ptr) };
        unsafe { core::ptr::write_volatile(ptr, self.apply_to(current)) };
        log::debug!(
            "secreg: {:#x} = {:#010x} (mask {:#010x})",
            self.addr(),
            self.value,
            self.mask
        );
    }
}

/// Visit every setting of the named settings node.
///
/// The settings are validated before the first one is passed to the visitor: every child needs
/// a base address and complete triples with offsets inside the register block.
pub fn for_each_setting(
    blob: &[u8],
    node_name: &'static str,
    mut visit: impl FnMut(SecRegSetting),
) -> Result<usize, FdtError> {
    let fdt = fdt::Fdt::new(blob)?;
    let node = fdt
        .all_nodes()
        .find(|node| base_name(node.name) == node_name)
        .ok_or(FdtError::NodeNotFound(node_name))?;

    let blocks = || {
        node.children().filter_map(|child| {
            let settings = child.property(OFFSET_SETTINGS_PROP)?;
            Some((child, settings.value))
        })
    };
    for (child, settings) in blocks() {
        let region = child
            .reg()
            .and_then(|mut regions| regions.next())
            .ok_or(FdtError::InvalidSecRegSettings(node_name))?;
        if settings.len() % 12 != 0 {
            return Err(FdtError::InvalidSecRegSettings(node_name));
        }
        let block_size = region.size.unwrap_or(0);
        for triple in settings.chunks_exact(12) {
            let offset = be32(&triple[0..4]) as usize;
            if offset >= block_size {
                log::error!(
                    "secreg: offset {:#x} outside of block {}",
                    offset,
                    child.name
                );
                return Err(FdtError::InvalidSecRegSettings(node_name));
            }
        }
    }

    let mut count = 0;
    for (child, settings) in blocks() {
        let Some(region) = child.reg().and_then(|mut regions| regions.next()) else {
            continue;
        };
        for triple in settings.chunks_exact(12) {
            visit(SecRegSetting {
                base: region.starting_address as usize,
                offset: be32(&triple[0..4]),
                value: be32(&triple[4..8]),
                mask: be32(&triple[8..12]),
            });
            count += 1;
        }
    }
    Ok(count)
}

/// Apply all settings of the named settings node. Returns the number of applied settings.
///
/// # Safety
///
/// The register blocks described by the node must be valid for volatile access.
pub unsafe fn apply_settings(blob: &[u8], node_name: &'static str) -> Result<usize, FdtError> {
    for_each_setting(blob, node_name, |setting| unsafe { setting.apply() })
}

#[inline]
fn be32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use std::vec::Vec;

    use super::*;
    use crate::fdt::dtb::{DtbBuilder, cells64, root};
    use crate::testutil::FakeRegs;

    fn settings_node(builder: &mut DtbBuilder, name: &str, base: u64, triples: &[u32]) {
        builder
            .begin_node(name)
            .prop_u32s("#address-cells", &[2])
            .prop_u32s("#size-cells", &[2])
            .begin_node("ccu@1c000000")
            .prop_u32s("reg", &cells64(&[base, 0x100]))
            .prop_u32s(OFFSET_SETTINGS_PROP, triples)
            .end_node()
            .end_node();
    }

    #[test]
    fn masked_write() {
        let setting = SecRegSetting {
            base: 0,
            offset: 0,
            value: 0xFFFF_00A5,
            mask: 0x0000_00FF,
        };
        assert_eq!(setting.apply_to(0x1234_5678), 0x1234_56A5);
    }

    #[test]
    fn collect_settings() {
        let mut builder = root();
        settings_node(
            &mut builder,
            CCU_INTERLEAVING_ON,
            0x1C00_0000,
            &[0x10, 0x1, 0x1, 0x24, 0xA0, 0xF0],
        );
        settings_node(&mut builder, CCU_INTERLEAVING_OFF, 0x1C00_0000, &[0x10, 0x0, 0x1]);
        let blob = builder.end_node().finish();

        let mut settings = Vec::new();
        let count = for_each_setting(&blob, CCU_INTERLEAVING_ON, |s| settings.push(s)).unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            settings[1],
            SecRegSetting {
                base: 0x1C00_0000,
                offset: 0x24,
                value: 0xA0,
                mask: 0xF0
            }
        );
        assert_eq!(settings[1].addr(), 0x1C00_0024);
    }

    #[test]
    fn missing_node() {
        let blob = root().end_node().finish();
        assert!(matches!(
            for_each_setting(&blob, CCU_INTERLEAVING_OFF, |_| ()),
            Err(FdtError::NodeNotFound(CCU_INTERLEAVING_OFF))
        ));
    }

    #[test]
    fn invalid_settings_are_rejected_up_front() {
        let mut builder = root();
        // Second offset outside of the register block.
        settings_node(
            &mut builder,
            CCU_INTERLEAVING_ON,
            0x1C00_0000,
            &[0x10, 0x1, 0x1, 0x100, 0x1, 0x1],
        );
        let blob = builder.end_node().finish();
        let mut visited = 0;
        assert!(matches!(
            for_each_setting(&blob, CCU_INTERLEAVING_ON, |_| visited += 1),
            Err(FdtError::InvalidSecRegSettings(_))
        ));
        assert_eq!(visited, 0);

        let mut builder = root();
        settings_node(&mut builder, CCU_INTERLEAVING_ON, 0x1C00_0000, &[0x10, 0x1]);
        let blob = builder.end_node().finish();
        assert!(matches!(
            for_each_setting(&blob, CCU_INTERLEAVING_ON, |_| ()),
            Err(FdtError::InvalidSecRegSettings(_))
        ));
    }

    #[test]
    fn apply_to_memory() {
        let regs = FakeRegs::<0x40>::new();
        regs.write(0x24, 0x0000_000F);
        let mut builder = root();
        settings_node(
            &mut builder,
            CCU_INTERLEAVING_ON,
            regs.addr() as u64,
            &[0x24, 0xA0, 0xF0],
        );
        let blob = builder.end_node().finish();
        assert_eq!(unsafe { apply_settings(&blob, CCU_INTERLEAVING_ON) }.unwrap(), 1);
        assert_eq!(regs.read(0x24), 0x0000_00AF);
    }
}
