// Copyright 2025 The Axvisor Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Guest CPU profiles.
//!
//! A [`GuestCpuProfile`] is what one VM sees: a feature record plus the CPUID
//! leaves, MSR ranges and ID registers it was derived from, sanitized for the
//! guest. Profiles are owned by their VM and never shared.

use alloc::vec::Vec;

use bit_field::BitField;
use raw_cpuid::CpuIdResult;

use crate::cpudb::CpuDbEntry;
use crate::error::{CpuDbError, ExplodeError, Result};
use crate::explode::{
    SVM_FEATURE_LEAF, X86MsrProbe, clear_feature_bits, explode_arm_v8, explode_x86_with_msrs,
    hide_arm_feature, pa_range_bits,
};
use crate::features::{
    ArmFeature, FeatureRecord, FeatureRecordArmV8, FeatureRecordDiff, FeatureRecordX86, X86Feature,
};
use crate::idregs::{IdRegStore, IdRegValue, IdRegister, id_field};
use crate::leaves::{
    CpuidLeaf, CpuidLeafCollection, CpuidLeafFlags, CpuidLeafStore, EXTENDED_LEAF_BASE,
    HYPERVISOR_LEAF_FIRST, HYPERVISOR_LEAF_LAST,
};
use crate::msr::{COMMON_MSR_RANGES, MsrRangeTable};
use crate::snapshot::CapabilitySnapshot;
use crate::unknown_leaf::{UnknownLeafResolver, zero_result};
use crate::xstate::{XSTATE_LEAF, XStateInfo, apply_to_leaves};

const LEAF1_ECX_VMX: usize = 5;
const LEAF1_ECX_XSAVE: usize = 26;
const LEAF1_ECX_OSXSAVE: usize = 27;
const LEAF1_ECX_HYPERVISOR: usize = 31;
const LEAF1_EDX_APIC: usize = 9;
const EXT1_ECX_SVM: usize = 2;
const ADDR_SIZE_LEAF: u32 = 0x8000_0008;
const EXTENDED_LEAF_LAST: u32 = 0x8fff_ffff;

const XCR0_YMM: u64 = 1 << 2;
/// Opmask, ZMM_Hi256 and Hi16_ZMM.
const XCR0_AVX512: u64 = 0b111 << 5;
/// XTILECFG and XTILEDATA.
const XCR0_AMX: u64 = 0b11 << 17;

/// XCR0 components `feature` needs enabled to be usable. 0 for none.
fn required_xcr0(feature: X86Feature) -> u64 {
    let name = feature.name();
    if name.starts_with("avx512") {
        XCR0_YMM | XCR0_AVX512
    } else if name.starts_with("avx") {
        XCR0_YMM
    } else if name.starts_with("amx") {
        XCR0_AMX
    } else {
        match feature {
            X86Feature::Fma | X86Feature::F16c | X86Feature::Vaes | X86Feature::Vpclmulqdq => {
                XCR0_YMM
            }
            _ => 0,
        }
    }
}

/// Adjustments applied on top of a catalog entry or the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuestCpuConfig {
    /// Highest standard CPUID leaf. Never below 1.
    pub max_std_leaf: Option<u32>,
    pub max_ext_leaf: Option<u32>,
    pub max_phys_addr_width: Option<u8>,
    /// Expose VMX/SVM (x86) or EL2 (ARM) to the guest.
    pub nested_hw_virt: bool,
    pub hidden_x86_features: Vec<X86Feature>,
    pub hidden_arm_features: Vec<ArmFeature>,
    /// Components the guest may enable in XCR0.
    pub xcr0_mask: Option<u64>,
    /// Core variant of a heterogeneous ARM entry.
    pub arm_core_variant: usize,
}

impl GuestCpuConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_std_leaf(mut self, leaf: u32) -> Self {
        self.max_std_leaf = Some(leaf);
        self
    }

    pub fn with_max_ext_leaf(mut self, leaf: u32) -> Self {
        self.max_ext_leaf = Some(leaf);
        self
    }

    pub fn with_max_phys_addr_width(mut self, width: u8) -> Self {
        self.max_phys_addr_width = Some(width);
        self
    }

    pub fn with_nested_hw_virt(mut self, nested: bool) -> Self {
        self.nested_hw_virt = nested;
        self
    }

    pub fn hide_x86(mut self, feature: X86Feature) -> Self {
        self.hidden_x86_features.push(feature);
        self
    }

    pub fn hide_arm(mut self, feature: ArmFeature) -> Self {
        self.hidden_arm_features.push(feature);
        self
    }

    pub fn with_xcr0_mask(mut self, mask: u64) -> Self {
        self.xcr0_mask = Some(mask);
        self
    }

    pub fn with_arm_core_variant(mut self, variant: usize) -> Self {
        self.arm_core_variant = variant;
        self
    }
}

/// Per-vCPU values patched into CPUID results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VcpuCpuidState {
    pub cpu: u32,
    pub apic_id: u32,
    /// CR4.OSXSAVE of the vCPU.
    pub osxsave: bool,
    /// IA32_APIC_BASE.EN of the vCPU.
    pub apic_enabled: bool,
}

impl VcpuCpuidState {
    pub const fn new(cpu: u32, apic_id: u32) -> Self {
        Self {
            cpu,
            apic_id,
            osxsave: false,
            apic_enabled: true,
        }
    }
}

#[derive(Debug, Clone)]
enum ProfileSource {
    Database(&'static CpuDbEntry),
    Host(CapabilitySnapshot),
}

/// The CPU a VM sees.
#[derive(Debug, Clone)]
pub struct GuestCpuProfile {
    source: ProfileSource,
    record: FeatureRecord,
    leaves: CpuidLeafCollection,
    unknown: UnknownLeafResolver,
    msrs: MsrRangeTable,
    xstate: Option<XStateInfo>,
    id_regs: IdRegStore,
}

impl GuestCpuProfile {
    /// Builds a profile from a catalog entry.
    pub fn from_db_entry(entry: &'static CpuDbEntry, config: &GuestCpuConfig) -> Result<Self> {
        Self::build(ProfileSource::Database(entry), config)
    }

    /// Builds a profile that mirrors the host described by `snapshot`.
    pub fn from_host(snapshot: &CapabilitySnapshot, config: &GuestCpuConfig) -> Result<Self> {
        Self::build(ProfileSource::Host(snapshot.clone()), config)
    }

    fn build(source: ProfileSource, config: &GuestCpuConfig) -> Result<Self> {
        let mut profile = Self {
            source: source.clone(),
            record: FeatureRecord::X86(FeatureRecordX86::default()),
            leaves: CpuidLeafCollection::default(),
            unknown: UnknownLeafResolver::default(),
            msrs: MsrRangeTable::empty(),
            xstate: None,
            id_regs: IdRegStore::default(),
        };
        match source {
            ProfileSource::Database(CpuDbEntry::X86(entry)) => {
                if !entry.unknown_policy.is_guest_safe() {
                    return Err(CpuDbError::PassThroughInGuestEntry {
                        entry: entry.common.short_name,
                    }
                    .into());
                }
                profile.unknown = entry.unknown_resolver();
                profile.msrs = entry.msr_table();
                profile.build_x86(entry.leaf_store()?, None, None, config)?;
            }
            ProfileSource::Database(CpuDbEntry::Arm(entry)) => {
                let variant = if config.arm_core_variant < entry.variants.len() {
                    config.arm_core_variant
                } else {
                    warn!(
                        "{}: no core variant {}, using variant 0",
                        entry.common.short_name, config.arm_core_variant
                    );
                    0
                };
                profile.build_arm(entry.id_regs_for(variant)?, config)?;
            }
            ProfileSource::Host(snapshot) => {
                if let Some(leaves) = snapshot.cpuid_leaves() {
                    let host = snapshot.as_feature_record().as_x86();
                    profile.msrs = MsrRangeTable::new(COMMON_MSR_RANGES, u32::MAX);
                    profile.build_x86(leaves.clone(), snapshot.msr_probe(), host, config)?;
                } else if let Some(regs) = snapshot.id_regs() {
                    profile.build_arm(regs.clone(), config)?;
                } else {
                    return Err(ExplodeError::UnsupportedArchitectureVariant(
                        "snapshot holds no probe data",
                    )
                    .into());
                }
            }
        }
        debug!(
            "guest CPU {:?} {:?}: {} flags, {}-bit physical",
            profile.record.vendor(),
            profile.record.microarch(),
            profile.record.flag_count(),
            profile.record.header().max_phys_addr_width
        );
        Ok(profile)
    }

    fn build_x86(
        &mut self,
        mut leaves: CpuidLeafStore,
        msrs: Option<&X86MsrProbe>,
        host: Option<&FeatureRecordX86>,
        config: &GuestCpuConfig,
    ) -> Result<()> {
        self.xstate = sanitize_leaves(&mut leaves, config);
        let mut rec = explode_x86_with_msrs(leaves.as_slice(), msrs)?;
        if let (true, Some(host)) = (config.nested_hw_virt, host) {
            let vmx = rec.has(X86Feature::Vmx);
            let svm = rec.has(X86Feature::Svm);
            for &feature in X86Feature::ALL.iter().filter(|f| f.is_virt()) {
                let exposed = if feature.name().starts_with("svm") { svm } else { vmx };
                rec.set(feature, exposed && host.has(feature));
            }
            if svm {
                rec.max_asid = host.max_asid;
            }
            if vmx {
                rec.vmx_max_phys_addr_width = host.vmx_max_phys_addr_width;
            }
        }
        for &feature in &config.hidden_x86_features {
            rec.set(feature, false);
        }
        if let Some(width) = config.max_phys_addr_width {
            rec.header.max_phys_addr_width = rec.header.max_phys_addr_width.min(width);
        }
        // VMX structures can not address more than the guest physical space.
        rec.vmx_max_phys_addr_width = rec
            .vmx_max_phys_addr_width
            .min(u32::from(rec.header.max_phys_addr_width));
        self.record = rec.into();
        self.leaves = CpuidLeafCollection::new(leaves);
        Ok(())
    }

    fn build_arm(&mut self, mut regs: IdRegStore, config: &GuestCpuConfig) -> Result<()> {
        if !config.nested_hw_virt {
            hide_arm_feature(&mut regs, ArmFeature::El2);
        }
        for &feature in &config.hidden_arm_features {
            if !hide_arm_feature(&mut regs, feature) {
                debug!("{} has no ID register field, hiding it in the record only", feature.name());
            }
        }
        if let Some(width) = config.max_phys_addr_width {
            clamp_pa_range(&mut regs, width);
        }
        let mut rec: FeatureRecordArmV8 = explode_arm_v8(regs.as_slice())?;
        for &feature in &config.hidden_arm_features {
            rec.set(feature, false);
        }
        if let Some(width) = config.max_phys_addr_width {
            rec.header.max_phys_addr_width = rec.header.max_phys_addr_width.min(width);
        }
        self.record = rec.into();
        self.id_regs = regs;
        Ok(())
    }

    /// Rebuilds the profile from its source with a new configuration.
    /// Per-CPU overrides are dropped.
    pub fn reset(&mut self, config: &GuestCpuConfig) -> Result<()> {
        *self = Self::build(self.source.clone(), config)?;
        Ok(())
    }

    pub fn record(&self) -> &FeatureRecord {
        &self.record
    }

    /// The catalog entry the profile was built from, if any.
    pub fn db_entry(&self) -> Option<&'static CpuDbEntry> {
        match self.source {
            ProfileSource::Database(entry) => Some(entry),
            ProfileSource::Host(_) => None,
        }
    }

    pub fn leaves(&self) -> &CpuidLeafCollection {
        &self.leaves
    }

    /// Replaces one leaf for a single vCPU.
    pub fn set_cpu_override(&mut self, cpu: u32, entry: CpuidLeaf) {
        self.leaves.set_override(cpu, entry);
    }

    pub fn unknown_resolver(&self) -> &UnknownLeafResolver {
        &self.unknown
    }

    pub fn msr_table(&self) -> &MsrRangeTable {
        &self.msrs
    }

    pub fn xstate(&self) -> Option<&XStateInfo> {
        self.xstate.as_ref()
    }

    pub fn id_regs(&self) -> &IdRegStore {
        &self.id_regs
    }

    /// Value of an ID register as the guest reads it. Unknown registers are RAZ.
    pub fn read_id_reg(&self, reg: IdRegister) -> u64 {
        self.id_regs.get(reg).unwrap_or(0)
    }

    /// Changes from `other` to this profile's record.
    pub fn diff_against(&self, other: &FeatureRecord) -> FeatureRecordDiff {
        FeatureRecordDiff::new(*other, self.record)
    }

    /// Answers a guest `cpuid` executed on `vcpu`.
    pub fn query(&self, vcpu: &VcpuCpuidState, leaf: u32, sub_leaf: u32) -> CpuIdResult {
        if let Some(entry) = self.leaves.lookup_for_cpu(vcpu.cpu, leaf, sub_leaf) {
            return patch_per_vcpu(entry, vcpu);
        }
        if (HYPERVISOR_LEAF_FIRST..=HYPERVISOR_LEAF_LAST).contains(&leaf) {
            return zero_result();
        }
        let master = self.leaves.master();
        if let Some(first) = master.sub_leaves(leaf).first() {
            // Known leaf, sub-leaf past the table.
            let mut res = zero_result();
            if first.flags.contains(CpuidLeafFlags::INTEL_TOPOLOGY_SUBLEAVES) {
                res.ecx = sub_leaf & 0xff;
                res.edx = vcpu.apic_id;
            }
            return res;
        }
        self.unknown.resolve(leaf, sub_leaf, master.last_standard_leaf(), None)
    }
}

fn patch_per_vcpu(entry: &CpuidLeaf, vcpu: &VcpuCpuidState) -> CpuIdResult {
    let mut res = entry.result();
    if entry.flags.contains(CpuidLeafFlags::CONTAINS_APIC_ID) {
        match entry.leaf {
            1 => {
                res.ebx.set_bits(24..32, vcpu.apic_id & 0xff);
            }
            0xb | 0x1f => res.edx = vcpu.apic_id,
            0x8000_001e => res.eax = vcpu.apic_id,
            _ => {}
        }
    }
    if entry.flags.contains(CpuidLeafFlags::CONTAINS_OSXSAVE) {
        let xsave = res.ecx.get_bit(LEAF1_ECX_XSAVE);
        res.ecx.set_bit(LEAF1_ECX_OSXSAVE, xsave && vcpu.osxsave);
    }
    if entry.flags.contains(CpuidLeafFlags::CONTAINS_APIC) {
        res.edx.set_bit(LEAF1_EDX_APIC, vcpu.apic_enabled);
    }
    res
}

fn zero_leaf(leaf: &mut CpuidLeaf) {
    leaf.eax = 0;
    leaf.ebx = 0;
    leaf.ecx = 0;
    leaf.edx = 0;
}

/// Applies `config` to an x86 leaf table. Returns the resulting XSAVE layout.
fn sanitize_leaves(leaves: &mut CpuidLeafStore, config: &GuestCpuConfig) -> Option<XStateInfo> {
    if let Some(max) = config.max_std_leaf.map(|m| m.max(1)) {
        if leaves.max_standard_leaf().is_some_and(|cur| max < cur) {
            leaves.remove_range(max + 1, HYPERVISOR_LEAF_FIRST - 1);
            leaves.modify_leaf(0, |l| l.eax = max);
        }
    }
    if let Some(max) = config.max_ext_leaf.map(|m| m.max(EXTENDED_LEAF_BASE)) {
        if leaves.max_extended_leaf().is_some_and(|cur| max < cur) {
            leaves.remove_range(max + 1, EXTENDED_LEAF_LAST);
            leaves.modify_leaf(EXTENDED_LEAF_BASE, |l| l.eax = max);
        }
    }

    if !config.nested_hw_virt {
        leaves.modify_leaf(1, |l| {
            l.ecx.set_bit(LEAF1_ECX_VMX, false);
        });
        leaves.modify_leaf(0x8000_0001, |l| {
            l.ecx.set_bit(EXT1_ECX_SVM, false);
        });
        leaves.modify_leaf(SVM_FEATURE_LEAF, zero_leaf);
    }
    leaves.modify_leaf(1, |l| {
        l.ecx.set_bit(LEAF1_ECX_HYPERVISOR, true);
    });

    for &feature in &config.hidden_x86_features {
        if !clear_feature_bits(leaves, feature) {
            debug!("{} has no CPUID bit, hiding it in the record only", feature.name());
        }
    }

    // Features whose enumeration leaf was capped away.
    let xsave = enumerated(leaves, XSTATE_LEAF)
        && leaves.get_exact(1, 0).is_some_and(|l| l.ecx.get_bit(LEAF1_ECX_XSAVE));
    if !xsave {
        clear_feature_bits(leaves, X86Feature::Xsave);
        clear_feature_bits(leaves, X86Feature::Osxsave);
        for &feature in X86Feature::ALL.iter().filter(|&&f| required_xcr0(f) != 0) {
            clear_feature_bits(leaves, feature);
        }
    }
    if !enumerated(leaves, SVM_FEATURE_LEAF) {
        leaves.modify_leaf(0x8000_0001, |l| {
            l.ecx.set_bit(EXT1_ECX_SVM, false);
        });
    }

    let mut xstate = if xsave { XStateInfo::from_leaves(leaves) } else { None };
    if let (Some(mask), Some(info)) = (config.xcr0_mask, xstate.as_mut()) {
        *info = info.restrict(mask);
        apply_to_leaves(info, leaves);
        let enabled = info.xcr0_mask;
        for &feature in X86Feature::ALL.iter().filter(|&&f| required_xcr0(f) & !enabled != 0) {
            clear_feature_bits(leaves, feature);
        }
    }

    if let Some(width) = config.max_phys_addr_width {
        leaves.modify_leaf(ADDR_SIZE_LEAF, |l| {
            if l.eax.get_bits(0..8) > u32::from(width) {
                l.eax.set_bits(0..8, u32::from(width));
            }
        });
    }
    xstate
}

/// Whether `leaf` is within the range leaf 0 or 0x8000_0000 reports and present.
fn enumerated(leaves: &CpuidLeafStore, leaf: u32) -> bool {
    let max = if leaf >= EXTENDED_LEAF_BASE {
        leaves.max_extended_leaf()
    } else {
        leaves.max_standard_leaf()
    };
    max.is_some_and(|max| leaf <= max) && leaves.get_exact(leaf, 0).is_some()
}

/// Lowers ID_AA64MMFR0_EL1.PARange to the largest encoding within `width`.
fn clamp_pa_range(regs: &mut IdRegStore, width: u8) {
    let Some(mut mmfr0) = regs.get(IdRegister::ID_AA64MMFR0_EL1) else {
        return;
    };
    let current = id_field(mmfr0, 0);
    let fit = (0..=current)
        .rev()
        .find(|&e| pa_range_bits(e).is_some_and(|bits| bits <= width))
        .unwrap_or(0);
    mmfr0.set_bits(0..4, u64::from(fit));
    regs.insert(IdRegValue::new(IdRegister::ID_AA64MMFR0_EL1, mmfr0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpudb::{CpuDatabase, CpuDbEntryType};
    use crate::error::CpumError;
    use crate::explode::VmxMsrs;
    use crate::msr::MsrWriteDisposition;
    use crate::snapshot::{CapabilitySnapshotBuilder, RawProbeData};
    use crate::vendor::VendorId;

    fn entry(name: &str, entry_type: CpuDbEntryType) -> &'static CpuDbEntry {
        CpuDatabase.lookup_by_exact_name(name, entry_type).unwrap()
    }

    fn i7_6700k(config: &GuestCpuConfig) -> GuestCpuProfile {
        let i7 = entry("Intel_Core_i7_6700K", CpuDbEntryType::X86);
        GuestCpuProfile::from_db_entry(i7, config).unwrap()
    }

    fn regs(r: CpuIdResult) -> [u32; 4] {
        [r.eax, r.ebx, r.ecx, r.edx]
    }

    #[test]
    fn test_db_profile_sanitized() {
        let profile = i7_6700k(&GuestCpuConfig::new());
        let rec = profile.record().as_x86().unwrap();
        assert!(!rec.has(X86Feature::Vmx));
        assert!(rec.has(X86Feature::Hypervisor));
        assert!(rec.has(X86Feature::Avx2));
        let leaf1 = profile.leaves().master().get_exact(1, 0).unwrap();
        assert!(!leaf1.ecx.get_bit(LEAF1_ECX_VMX));
        assert!(leaf1.ecx.get_bit(LEAF1_ECX_HYPERVISOR));
        assert_eq!(
            profile.db_entry().map(CpuDbEntry::short_name),
            Some("Intel_Core_i7_6700K")
        );
    }

    #[test]
    fn test_leaf1_per_vcpu() {
        let profile = i7_6700k(&GuestCpuConfig::new());
        let mut vcpu = VcpuCpuidState::new(2, 3);
        let r = profile.query(&vcpu, 1, 0);
        assert_eq!(r.ebx >> 24, 3);
        assert!(!r.ecx.get_bit(LEAF1_ECX_OSXSAVE));
        assert!(r.edx.get_bit(LEAF1_EDX_APIC));

        vcpu.osxsave = true;
        vcpu.apic_enabled = false;
        let r = profile.query(&vcpu, 1, 0);
        assert!(r.ecx.get_bit(LEAF1_ECX_OSXSAVE));
        assert!(!r.edx.get_bit(LEAF1_EDX_APIC));
    }

    #[test]
    fn test_query_misses() {
        let profile = i7_6700k(&GuestCpuConfig::new());
        let vcpu = VcpuCpuidState::new(0, 5);
        // Past the highest standard leaf: echo leaf 0x16 with the sub-leaf in ECX.
        assert_eq!(regs(profile.query(&vcpu, 0x20, 7)), [0xfa0, 0x1068, 7, 0]);
        assert_eq!(regs(profile.query(&vcpu, HYPERVISOR_LEAF_FIRST, 0)), [0; 4]);
        // Topology sub-leaf past the table.
        assert_eq!(regs(profile.query(&vcpu, 0xb, 5)), [0, 0, 5, 5]);
        assert_eq!(regs(profile.query(&vcpu, 4, 9)), [0; 4]);
        assert_eq!(profile.query(&vcpu, 0xb, 0).edx, 5);
    }

    #[test]
    fn test_cpu_override() {
        let mut profile = i7_6700k(&GuestCpuConfig::new());
        profile.set_cpu_override(1, CpuidLeaf::simple(6, 1, 2, 3, 4));
        assert_eq!(regs(profile.query(&VcpuCpuidState::new(1, 1), 6, 0)), [1, 2, 3, 4]);
        assert_eq!(profile.query(&VcpuCpuidState::new(0, 0), 6, 0).eax, 0x27f7);

        profile.reset(&GuestCpuConfig::new()).unwrap();
        assert_eq!(profile.query(&VcpuCpuidState::new(1, 1), 6, 0).eax, 0x27f7);
    }

    #[test]
    fn test_leaf_caps() {
        let config = GuestCpuConfig::new()
            .with_max_std_leaf(0xd)
            .with_max_ext_leaf(0x8000_0004);
        let profile = i7_6700k(&config);
        let master = profile.leaves().master();
        assert_eq!(master.max_standard_leaf(), Some(0xd));
        assert!(master.get_exact(0x16, 0).is_none());
        assert_eq!(master.max_extended_leaf(), Some(0x8000_0004));
        assert!(master.get_exact(0x8000_0008, 0).is_none());
        assert!(profile.record().as_x86().unwrap().has(X86Feature::Xsave));

        let profile = i7_6700k(&GuestCpuConfig::new().with_max_std_leaf(0));
        assert_eq!(profile.leaves().master().max_standard_leaf(), Some(1));
    }

    #[test]
    fn test_std_cap_below_xstate_leaf() {
        for max in [0, 1, 4, 7, 0xb, 0xc] {
            let profile = i7_6700k(&GuestCpuConfig::new().with_max_std_leaf(max));
            let rec = profile.record().as_x86().unwrap();
            for feature in [
                X86Feature::Xsave,
                X86Feature::Osxsave,
                X86Feature::Avx,
                X86Feature::Fma,
                X86Feature::F16c,
                X86Feature::Avx2,
            ] {
                assert!(!rec.has(feature), "max leaf {max:#x}: {}", feature.name());
            }
            assert!(rec.has(X86Feature::Sse3));
            assert_eq!(rec.max_ext_state_size, 0);
            assert!(profile.xstate().is_none());

            let leaf1 = profile.leaves().master().get_exact(1, 0).unwrap();
            assert!(!leaf1.ecx.get_bit(LEAF1_ECX_XSAVE));
            let mut vcpu = VcpuCpuidState::new(0, 0);
            vcpu.osxsave = true;
            assert!(!profile.query(&vcpu, 1, 0).ecx.get_bit(LEAF1_ECX_OSXSAVE));
        }
    }

    #[test]
    fn test_ext_cap_below_svm_leaf() {
        let ryzen = entry("AMD_Ryzen_7_1800X", CpuDbEntryType::X86);
        for max in [EXTENDED_LEAF_BASE, 0x8000_0001, 0x8000_0008, 0x8000_0009] {
            let config = GuestCpuConfig::new()
                .with_nested_hw_virt(true)
                .with_max_ext_leaf(max);
            let profile = GuestCpuProfile::from_db_entry(ryzen, &config).unwrap();
            let rec = profile.record().as_x86().unwrap();
            assert!(!rec.has(X86Feature::Svm), "max leaf {max:#x}");
            assert!(!rec.has(X86Feature::SvmNestedPaging));
            assert_eq!(rec.max_asid, 0);
            let ext1 = profile.leaves().master().get_exact(0x8000_0001, 0);
            assert!(ext1.is_none_or(|l| !l.ecx.get_bit(EXT1_ECX_SVM)));
        }

        let config = GuestCpuConfig::new()
            .with_nested_hw_virt(true)
            .with_max_ext_leaf(SVM_FEATURE_LEAF);
        let profile = GuestCpuProfile::from_db_entry(ryzen, &config).unwrap();
        assert!(profile.record().as_x86().unwrap().has(X86Feature::Svm));
    }

    #[test]
    fn test_nested_virt() {
        let ryzen = entry("AMD_Ryzen_7_1800X", CpuDbEntryType::X86);
        let plain = GuestCpuProfile::from_db_entry(ryzen, &GuestCpuConfig::new()).unwrap();
        assert!(!plain.record().as_x86().unwrap().has(X86Feature::Svm));
        let svm = plain.leaves().master().get_exact(SVM_FEATURE_LEAF, 0).unwrap();
        assert_eq!(svm.result(), zero_result());

        let config = GuestCpuConfig::new().with_nested_hw_virt(true);
        let nested = GuestCpuProfile::from_db_entry(ryzen, &config).unwrap();
        let rec = nested.record().as_x86().unwrap();
        assert!(rec.has(X86Feature::Svm));
        assert_eq!(rec.max_asid, 0x8000);
    }

    #[test]
    fn test_hidden_x86_feature() {
        let profile = i7_6700k(&GuestCpuConfig::new().hide_x86(X86Feature::Avx2));
        assert!(!profile.record().as_x86().unwrap().has(X86Feature::Avx2));
        let leaf7 = profile.leaves().master().get_exact(7, 0).unwrap();
        assert!(!leaf7.ebx.get_bit(5));

        let base = i7_6700k(&GuestCpuConfig::new());
        let diff = profile.diff_against(base.record());
        assert!(diff.changed_flags().any(|c| c == ('-', "avx2")));
        assert!(base.diff_against(base.record()).is_same());
    }

    #[test]
    fn test_xcr0_restriction() {
        let xeon = entry("Intel_Xeon_Gold_6252", CpuDbEntryType::X86);
        let config = GuestCpuConfig::new().with_xcr0_mask(0x7);
        let profile = GuestCpuProfile::from_db_entry(xeon, &config).unwrap();
        assert_eq!(profile.xstate().unwrap().xcr0_mask, 0x7);
        assert_eq!(profile.leaves().master().get_exact(0xd, 0).unwrap().eax, 0x7);
        let rec = profile.record().as_x86().unwrap();
        assert!(!rec.has(X86Feature::Avx512f));
        assert!(rec.has(X86Feature::Avx2));

        let config = GuestCpuConfig::new().with_xcr0_mask(0x3);
        let profile = GuestCpuProfile::from_db_entry(xeon, &config).unwrap();
        let rec = profile.record().as_x86().unwrap();
        for feature in [
            X86Feature::Avx,
            X86Feature::Avx2,
            X86Feature::Fma,
            X86Feature::Avx512f,
            X86Feature::Avx512bw,
            X86Feature::Avx512vl,
        ] {
            assert!(!rec.has(feature), "{}", feature.name());
        }
        assert!(rec.has(X86Feature::Xsave));
        assert!(rec.has(X86Feature::Sse3));
        let leaf7 = profile.leaves().master().get_exact(7, 0).unwrap();
        assert_eq!(leaf7.ebx & (1 << 5 | 1 << 16 | 1 << 30 | 1 << 31), 0);
    }

    #[test]
    fn test_required_xcr0() {
        assert_eq!(required_xcr0(X86Feature::Avx2), XCR0_YMM);
        assert_eq!(required_xcr0(X86Feature::AvxVnni), XCR0_YMM);
        assert_eq!(required_xcr0(X86Feature::Avx512vnni), XCR0_YMM | XCR0_AVX512);
        assert_eq!(required_xcr0(X86Feature::AmxTile), XCR0_AMX);
        assert_eq!(required_xcr0(X86Feature::Aes), 0);
    }

    #[test]
    fn test_phys_width_clamp() {
        let xeon = entry("Intel_Xeon_Gold_6252", CpuDbEntryType::X86);
        let config = GuestCpuConfig::new().with_max_phys_addr_width(36);
        let profile = GuestCpuProfile::from_db_entry(xeon, &config).unwrap();
        assert_eq!(profile.record().header().max_phys_addr_width, 36);
        let leaf = profile.leaves().master().get_exact(ADDR_SIZE_LEAF, 0).unwrap();
        assert_eq!(leaf.eax & 0xff, 36);

        assert_eq!(profile.record().as_x86().unwrap().vmx_max_phys_addr_width, 36);

        let config = GuestCpuConfig::new().with_max_phys_addr_width(52);
        let wide = GuestCpuProfile::from_db_entry(xeon, &config).unwrap();
        assert_eq!(wide.record().header().max_phys_addr_width, 46);
    }

    #[test]
    fn test_nested_vmx_width_clamp() {
        let i7 = entry("Intel_Core_i7_6700K", CpuDbEntryType::X86).as_x86().unwrap();
        let probe = RawProbeData::X86 {
            leaves: i7.leaves.to_vec(),
            msrs: Some(X86MsrProbe {
                vmx: Some(VmxMsrs::default()),
                arch_capabilities: None,
            }),
        };
        let snapshot = CapabilitySnapshotBuilder::from_probe(&probe).unwrap().freeze();
        let host = *snapshot.as_feature_record().as_x86().unwrap();
        assert_eq!(host.vmx_max_phys_addr_width, 39);

        let config = GuestCpuConfig::new()
            .with_nested_hw_virt(true)
            .with_max_phys_addr_width(36);
        let profile = GuestCpuProfile::from_host(&snapshot, &config).unwrap();
        let rec = profile.record().as_x86().unwrap();
        assert!(rec.has(X86Feature::Vmx));
        assert_eq!(rec.header.max_phys_addr_width, 36);
        assert_eq!(rec.vmx_max_phys_addr_width, 36);
    }

    #[test]
    fn test_pass_through_rejected() {
        static LEAVES: &[CpuidLeaf] = &[
            CpuidLeaf::simple(0, 1, 0x756e_6547, 0x6c65_746e, 0x4965_6e69),
            CpuidLeaf::simple(1, 0x506e3, 0, 0, 0),
        ];
        static HOST_ONLY: CpuDbEntry = CpuDbEntry::X86(crate::cpudb::CpuDbEntryX86 {
            common: crate::cpudb::CpuDbEntryCommon {
                short_name: "Host_Only",
                full_name: "Host Only",
                vendor: VendorId::Intel,
                microarch: crate::microarch::Microarch::Intel_Core7_Skylake,
                flags: crate::cpudb::CpuDbFlags::SYNTHETIC,
                entry_type: CpuDbEntryType::X86,
            },
            family: 6,
            model: 0x5e,
            stepping: 3,
            bus_freq_hz: 0,
            max_phys_addr_width: 36,
            mxcsr_mask: 0xffff,
            leaves: LEAVES,
            unknown_policy: crate::unknown_leaf::UnknownCpuidPolicy::PassThrough,
            unknown_defaults: zero_result(),
            msr_mask: u32::MAX,
            msr_ranges: &[],
        });
        let err = GuestCpuProfile::from_db_entry(&HOST_ONLY, &GuestCpuConfig::new()).unwrap_err();
        assert_eq!(
            err,
            CpumError::CpuDb(CpuDbError::PassThroughInGuestEntry { entry: "Host_Only" })
        );
    }

    #[test]
    fn test_arm_profile() {
        let m1 = entry("Apple_M1", CpuDbEntryType::Arm);
        let config = GuestCpuConfig::new().with_arm_core_variant(1).hide_arm(ArmFeature::Aes);
        let profile = GuestCpuProfile::from_db_entry(m1, &config).unwrap();
        let rec = profile.record().as_arm().unwrap();
        assert_eq!(rec.part_num, 0x023);
        assert!(!rec.has(ArmFeature::Aes));
        assert!(!rec.has(ArmFeature::El2));
        assert_eq!(id_field(profile.read_id_reg(IdRegister::ID_AA64ISAR0_EL1), 4), 0);
        assert_eq!(id_field(profile.read_id_reg(IdRegister::ID_AA64PFR0_EL1), 8), 0);
        assert_eq!(profile.read_id_reg(IdRegister::new(3, 0, 0, 7, 7)), 0);
        assert!(profile.msr_table().ranges().is_empty());

        // Out-of-range variants fall back to the first one.
        let config = GuestCpuConfig::new().with_arm_core_variant(5);
        let profile = GuestCpuProfile::from_db_entry(m1, &config).unwrap();
        assert_eq!(profile.record().as_arm().unwrap().part_num, 0x022);
    }

    #[test]
    fn test_arm_pa_range_clamp() {
        let m1 = entry("Apple_M1", CpuDbEntryType::Arm);
        let config = GuestCpuConfig::new().with_max_phys_addr_width(40);
        let profile = GuestCpuProfile::from_db_entry(m1, &config).unwrap();
        assert_eq!(profile.record().header().max_phys_addr_width, 40);
        let pa_range = id_field(profile.read_id_reg(IdRegister::ID_AA64MMFR0_EL1), 0);
        assert_eq!(pa_range_bits(pa_range), Some(40));
    }

    #[test]
    fn test_host_profile() {
        let i7 = entry("Intel_Core_i7_6700K", CpuDbEntryType::X86).as_x86().unwrap();
        let probe = RawProbeData::X86 {
            leaves: i7.leaves.to_vec(),
            msrs: None,
        };
        let snapshot = CapabilitySnapshotBuilder::from_probe(&probe).unwrap().freeze();
        let profile = GuestCpuProfile::from_host(&snapshot, &GuestCpuConfig::new()).unwrap();
        assert!(profile.db_entry().is_none());
        assert_eq!(profile.record().vendor(), VendorId::Intel);
        assert!(!profile.record().as_x86().unwrap().has(X86Feature::Vmx));
        assert!(snapshot.as_feature_record().as_x86().unwrap().has(X86Feature::Vmx));
        assert_eq!(
            profile.msr_table().check_write(0x3a, 0),
            MsrWriteDisposition::Fault
        );
    }
}
