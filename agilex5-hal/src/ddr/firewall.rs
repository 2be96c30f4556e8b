//! DDR firewall configuration.
//!
//! After reset, the DDR firewalls only allow secure accesses. Every populated DRAM bank is opened
//! for non-secure MPU and non-MPU masters through one firewall region per bank.
use agilex5::firewall::{
    MmioDdrFirewall, MmioFirewallRegion, MmioMpfeFirewall, NUM_FIREWALL_REGIONS, RegionEnable,
};
use arbitrary_int::u4;

use crate::SZ_1M;

use super::banks::DramBank;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum RegionKind {
    Mpu,
    NonMpu,
}

fn region<'fw>(
    fw: &'fw mut MmioDdrFirewall<'_>,
    kind: RegionKind,
    idx: usize,
) -> MmioFirewallRegion<'fw> {
    match (kind, idx) {
        (RegionKind::Mpu, 0) => fw.mpu_region_0(),
        (RegionKind::Mpu, 1) => fw.mpu_region_1(),
        (RegionKind::Mpu, 2) => fw.mpu_region_2(),
        (RegionKind::Mpu, _) => fw.mpu_region_3(),
        (RegionKind::NonMpu, 0) => fw.non_mpu_region_0(),
        (RegionKind::NonMpu, 1) => fw.non_mpu_region_1(),
        (RegionKind::NonMpu, 2) => fw.non_mpu_region_2(),
        (RegionKind::NonMpu, _) => fw.non_mpu_region_3(),
    }
}

#[inline]
const fn lower_32_bits(val: u64) -> u32 {
    val as u32
}

/// Only address bits 32 to 39 are implemented inside the extension registers.
#[inline]
const fn upper_ext_bits(val: u64) -> u32 {
    ((val >> 32) & 0xFF) as u32
}

fn program_region(fw: &mut MmioDdrFirewall<'_>, kind: RegionKind, idx: usize, base: u64, limit: u64) {
    let mut region = region(fw, kind, idx);
    region.write_base(lower_32_bits(base));
    region.write_base_ext(upper_ext_bits(base));
    region.write_limit(lower_32_bits(limit));
    region.write_limit_ext(upper_ext_bits(limit));
}

/// Open all populated DRAM banks for non-secure accesses on all given DDR firewalls.
///
/// With the ATF boot flow, the first 1 MiB of the first bank stays secure because the secure
/// monitor lives there.
pub fn sdram_set_firewall(fws: &mut [MmioDdrFirewall<'_>], banks: &[DramBank], spl_atf: bool) {
    if banks.len() > NUM_FIREWALL_REGIONS {
        log::warn!(
            "DDR: only {} of {} banks can be opened in the firewall",
            NUM_FIREWALL_REGIONS,
            banks.len()
        );
    }
    for (i, bank) in banks.iter().enumerate().take(NUM_FIREWALL_REGIONS) {
        if bank.is_empty() {
            continue;
        }
        let mut base = bank.start;
        if spl_atf && i == 0 {
            base += SZ_1M;
        }
        let limit = bank.last_addr();
        let enable = RegionEnable::builder()
            .with_non_mpu(u4::new(1 << i))
            .with_mpu(u4::new(1 << i))
            .build();
        for fw in fws.iter_mut() {
            program_region(fw, RegionKind::Mpu, i, base, limit);
            program_region(fw, RegionKind::NonMpu, i, base, limit);
            fw.write_enable_set(enable);
        }
        log::debug!(
            "DDR: firewall region {} opened from {:#x} to {:#x}",
            i,
            base,
            limit
        );
    }
}

/// Open the CSR blocks of both IO96B instances and the NoC CSR for non-secure accesses.
pub fn mpfe_csr_firewall(fw: &mut MmioMpfeFirewall<'_>) {
    fw.write_io96b0_reg(0x1);
    fw.write_io96b1_reg(0x1);
    fw.write_noc_csr(0x1);
}
