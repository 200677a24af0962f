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

//! The compiled-in catalog of reference CPUs.
//!
//! Entries are `static` data and never change at runtime, so lookups hand out
//! `&'static` references and need no locking.

mod arm_entries;
mod matching;
mod x86_entries;

use bitflags::bitflags;
use numeric_enum_macro::numeric_enum;
use raw_cpuid::CpuIdResult;

use crate::error::{CpuDbError, ExplodeError};
use crate::explode::{explode_arm_v8, explode_x86};
use crate::features::{FeatureRecordArmV8, FeatureRecordX86};
use crate::idregs::{IdRegStore, IdRegValue, IdRegister, Midr};
use crate::leaves::{CpuidLeaf, CpuidLeafStore};
use crate::microarch::Microarch;
use crate::msr::{MsrRange, MsrRangeTable, check_msr_ranges};
use crate::unknown_leaf::{UnknownCpuidPolicy, UnknownLeafResolver};
use crate::vendor::VendorId;

pub use matching::{MIDR_EXACT_SCORE, MatchHint, MidrMatch};

/// Most core variants an ARM entry may declare.
pub const MAX_CORE_VARIANTS: usize = 2;

numeric_enum! {
    #[repr(u8)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum CpuDbEntryType {
        X86 = 1,
        Arm = 2,
    }
}

numeric_enum! {
    #[repr(u8)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum ArmCoreType {
        Unknown = 0,
        /// Big core of a heterogeneous design.
        Performance = 1,
        /// Little core of a heterogeneous design.
        Efficiency = 2,
        /// All cores are the same.
        Uniform = 3,
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CpuDbFlags: u32 {
        /// The data was not taken from a real part.
        const SYNTHETIC = 1 << 0;
        /// Server part.
        const SERVER = 1 << 1;
        /// The entry models a heterogeneous (big.LITTLE) design.
        const MULTI_CORE_VARIANTS = 1 << 2;
    }
}

/// Fields shared by every catalog entry.
#[derive(Debug)]
pub struct CpuDbEntryCommon {
    /// Stable lookup key. Never renamed once published.
    pub short_name: &'static str,
    pub full_name: &'static str,
    pub vendor: VendorId,
    pub microarch: Microarch,
    pub flags: CpuDbFlags,
    pub entry_type: CpuDbEntryType,
}

/// An x86 reference CPU.
#[derive(Debug)]
pub struct CpuDbEntryX86 {
    pub common: CpuDbEntryCommon,
    pub family: u8,
    pub model: u8,
    pub stepping: u8,
    /// Scalable bus frequency, 0 if unknown.
    pub bus_freq_hz: u64,
    pub max_phys_addr_width: u8,
    pub mxcsr_mask: u32,
    /// Sorted by (leaf, sub-leaf).
    pub leaves: &'static [CpuidLeaf],
    pub unknown_policy: UnknownCpuidPolicy,
    pub unknown_defaults: CpuIdResult,
    /// Applied to indices in the AMD 0xC001_xxxx window.
    pub msr_mask: u32,
    /// Sorted by first index, non-overlapping.
    pub msr_ranges: &'static [MsrRange],
}

impl CpuDbEntryX86 {
    pub fn leaf_store(&self) -> Result<CpuidLeafStore, ExplodeError> {
        CpuidLeafStore::from_sorted(self.leaves)
    }

    pub fn msr_table(&self) -> MsrRangeTable {
        MsrRangeTable::new(self.msr_ranges, self.msr_mask)
    }

    pub fn unknown_resolver(&self) -> UnknownLeafResolver {
        UnknownLeafResolver::new(self.unknown_policy, self.unknown_defaults)
    }

    pub fn explode(&self) -> Result<FeatureRecordX86, ExplodeError> {
        explode_x86(self.leaves)
    }
}

/// One core design of an ARM entry.
#[derive(Debug)]
pub struct ArmCoreVariant {
    pub name: &'static str,
    pub midr: Midr,
    pub core_type: ArmCoreType,
    /// Registers that differ from the entry's common values. Sorted.
    pub overrides: &'static [IdRegValue],
}

/// An ARMv8 reference CPU.
#[derive(Debug)]
pub struct CpuDbEntryArm {
    pub common: CpuDbEntryCommon,
    /// Values shared by all variants, without MIDR_EL1. Sorted.
    pub id_regs: &'static [IdRegValue],
    pub variants: &'static [ArmCoreVariant],
}

impl CpuDbEntryArm {
    /// The full register set of core variant `variant`, MIDR_EL1 included.
    pub fn id_regs_for(&self, variant: usize) -> Result<IdRegStore, ExplodeError> {
        let base = IdRegStore::from_sorted(self.id_regs)?;
        let Some(v) = self.variants.get(variant) else {
            return Ok(base);
        };
        let mut regs = base.with_overrides(v.overrides);
        regs.insert(IdRegValue::new(IdRegister::MIDR_EL1, v.midr.raw()));
        Ok(regs)
    }

    pub fn explode(&self, variant: usize) -> Result<FeatureRecordArmV8, ExplodeError> {
        explode_arm_v8(self.id_regs_for(variant)?.as_slice())
    }
}

/// A catalog entry.
#[derive(Debug)]
pub enum CpuDbEntry {
    X86(CpuDbEntryX86),
    Arm(CpuDbEntryArm),
}

impl CpuDbEntry {
    pub const fn common(&self) -> &CpuDbEntryCommon {
        match self {
            Self::X86(e) => &e.common,
            Self::Arm(e) => &e.common,
        }
    }

    pub const fn short_name(&self) -> &'static str {
        self.common().short_name
    }

    pub const fn full_name(&self) -> &'static str {
        self.common().full_name
    }

    pub const fn entry_type(&self) -> CpuDbEntryType {
        match self {
            Self::X86(_) => CpuDbEntryType::X86,
            Self::Arm(_) => CpuDbEntryType::Arm,
        }
    }

    pub const fn as_x86(&self) -> Option<&CpuDbEntryX86> {
        match self {
            Self::X86(e) => Some(e),
            Self::Arm(_) => None,
        }
    }

    pub const fn as_arm(&self) -> Option<&CpuDbEntryArm> {
        match self {
            Self::Arm(e) => Some(e),
            Self::X86(_) => None,
        }
    }
}

static CATALOG: &[&CpuDbEntry] = &[
    &x86_entries::INTEL_CORE_I7_6700K,
    &x86_entries::INTEL_CORE_I7_3960X,
    &x86_entries::INTEL_XEON_GOLD_6252,
    &x86_entries::AMD_RYZEN_7_1800X,
    &x86_entries::AMD_RYZEN_5_3600X,
    &arm_entries::APPLE_M1,
    &arm_entries::APPLE_M2,
    &arm_entries::APPLE_M3,
    &arm_entries::QUALCOMM_SNAPDRAGON_X,
    &arm_entries::RASPBERRY_PI_4,
    &arm_entries::AMPERE_ONE,
];

/// Handle to the compiled-in catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuDatabase;

impl CpuDatabase {
    pub fn entries(&self) -> &'static [&'static CpuDbEntry] {
        CATALOG
    }

    pub fn entry_count(&self) -> usize {
        CATALOG.len()
    }

    pub fn entry_by_index(&self, index: usize) -> Option<&'static CpuDbEntry> {
        CATALOG.get(index).copied()
    }

    fn of_type(&self, entry_type: CpuDbEntryType) -> impl Iterator<Item = &'static CpuDbEntry> {
        CATALOG
            .iter()
            .copied()
            .filter(move |e| e.entry_type() == entry_type)
    }

    /// Case-sensitive match on the short or the full name.
    pub fn lookup_by_exact_name(
        &self,
        name: &str,
        entry_type: CpuDbEntryType,
    ) -> Option<&'static CpuDbEntry> {
        self.of_type(entry_type)
            .find(|e| e.short_name() == name || e.full_name() == name)
    }

    /// Best fuzzy match for `name` and its score. Numbers in `name` stand in
    /// for the family/model or part-number proximity.
    pub fn lookup_best_by_name(
        &self,
        name: &str,
        entry_type: CpuDbEntryType,
    ) -> Option<(&'static CpuDbEntry, u32)> {
        self.lookup_best_by_name_with_hint(name, entry_type, None)
    }

    /// Like [`Self::lookup_best_by_name`], scoring proximity against `hint`.
    /// Ties go to the entry declared first.
    pub fn lookup_best_by_name_with_hint(
        &self,
        name: &str,
        entry_type: CpuDbEntryType,
        hint: Option<MatchHint>,
    ) -> Option<(&'static CpuDbEntry, u32)> {
        let mut best: Option<(&'static CpuDbEntry, u32)> = None;
        for entry in self.of_type(entry_type) {
            let score = matching::name_score(name, entry, hint);
            if score > 0 && best.is_none_or(|(_, s)| score > s) {
                best = Some((entry, score));
            }
        }
        match best {
            Some((entry, score)) => {
                debug!("{:?} best matches {} ({})", name, entry.short_name(), score)
            }
            None => warn!("no CPU database entry resembles {:?}", name),
        }
        best
    }

    /// Closest ARM core variant to `midr`. Entries of other implementers never match.
    pub fn lookup_best_by_arm_main_id(&self, midr: Midr) -> Option<MidrMatch> {
        let mut best: Option<MidrMatch> = None;
        for entry in self.of_type(CpuDbEntryType::Arm) {
            let Some(arm) = entry.as_arm() else { continue };
            for (core_variant, variant) in arm.variants.iter().enumerate() {
                let Some(score) = matching::midr_score(midr, variant.midr) else {
                    continue;
                };
                if best.as_ref().is_none_or(|b| score > b.score) {
                    best = Some(MidrMatch {
                        entry,
                        arm,
                        core_variant,
                        score,
                    });
                }
            }
        }
        if best.is_none() {
            warn!("no CPU database entry for MIDR {:#x}", midr.raw());
        }
        best
    }

    /// Checks the whole catalog. Inconsistent compiled-in data is a build defect.
    pub fn validate(&self) -> Result<(), CpuDbError> {
        for (i, entry) in CATALOG.iter().enumerate() {
            let name = entry.short_name();
            if CATALOG[..i].iter().any(|e| e.short_name() == name) {
                return Err(CpuDbError::DuplicateShortName(name));
            }
            match entry {
                CpuDbEntry::X86(x86) => validate_x86(name, x86)?,
                CpuDbEntry::Arm(arm) => validate_arm(name, arm)?,
            }
        }
        Ok(())
    }
}

fn validate_x86(name: &'static str, entry: &CpuDbEntryX86) -> Result<(), CpuDbError> {
    let explode_err = |error| CpuDbError::Explode { entry: name, error };
    if !entry.unknown_policy.is_guest_safe() {
        return Err(CpuDbError::PassThroughInGuestEntry { entry: name });
    }
    check_msr_ranges(name, entry.msr_ranges)?;
    let rec = entry.explode().map_err(explode_err)?;
    if (rec.family, rec.model, rec.stepping) != (entry.family, entry.model, entry.stepping)
        || rec.header.vendor != entry.common.vendor
    {
        return Err(explode_err(ExplodeError::UnsupportedArchitectureVariant(
            "leaf 0/1 disagree with the entry header",
        )));
    }
    Ok(())
}

fn validate_arm(name: &'static str, entry: &CpuDbEntryArm) -> Result<(), CpuDbError> {
    let explode_err = |error| CpuDbError::Explode { entry: name, error };
    if entry.variants.len() > MAX_CORE_VARIANTS {
        return Err(CpuDbError::TooManyCoreVariants { entry: name });
    }
    if entry.variants.is_empty() {
        return Err(explode_err(ExplodeError::MissingBaselineRegister {
            reg: IdRegister::MIDR_EL1,
        }));
    }
    IdRegStore::from_sorted(entry.id_regs).map_err(explode_err)?;
    for (i, variant) in entry.variants.iter().enumerate() {
        if variant.midr.architecture() != 0xf {
            return Err(CpuDbError::MalformedMidr(variant.midr.raw()));
        }
        IdRegStore::from_sorted(variant.overrides).map_err(explode_err)?;
        let rec = entry.explode(i).map_err(explode_err)?;
        if rec.header.vendor != entry.common.vendor {
            return Err(explode_err(ExplodeError::UnsupportedArchitectureVariant(
                "MIDR implementer disagrees with the entry vendor",
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DB: CpuDatabase = CpuDatabase;

    #[test]
    fn test_catalog_is_consistent() {
        assert_eq!(DB.validate(), Ok(()));
    }

    #[test]
    fn test_enumeration() {
        assert_eq!(DB.entry_count(), 11);
        for i in 0..DB.entry_count() {
            assert!(DB.entry_by_index(i).is_some());
        }
        assert!(DB.entry_by_index(DB.entry_count()).is_none());
    }

    #[test]
    fn test_exact_name() {
        let e = DB
            .lookup_by_exact_name("Intel_Core_i7_6700K", CpuDbEntryType::X86)
            .unwrap();
        assert_eq!(e.common().microarch, Microarch::Intel_Core7_Skylake);
        assert!(DB.lookup_by_exact_name("intel_core_i7_6700k", CpuDbEntryType::X86).is_none());
        assert!(DB.lookup_by_exact_name("Intel_Core_i7_6700K", CpuDbEntryType::Arm).is_none());
        let e = DB
            .lookup_by_exact_name("AMD Ryzen 5 3600X 6-Core Processor", CpuDbEntryType::X86)
            .unwrap();
        assert_eq!(e.short_name(), "AMD_Ryzen_5_3600X");
    }

    #[test]
    fn test_best_by_name_monotonic() {
        let (entry, good) = DB
            .lookup_best_by_name("i7-6700K", CpuDbEntryType::X86)
            .unwrap();
        assert_eq!(entry.short_name(), "Intel_Core_i7_6700K");
        let bad = DB
            .lookup_best_by_name("totally-unrelated-string", CpuDbEntryType::X86)
            .map_or(0, |(_, s)| s);
        assert!(good > bad);
    }

    #[test]
    fn test_best_by_name_near_miss() {
        // No 6600K in the catalog; the numerically closest i7 wins.
        let (entry, _) = DB
            .lookup_best_by_name("Core i7-6600K", CpuDbEntryType::X86)
            .unwrap();
        assert_eq!(entry.short_name(), "Intel_Core_i7_6700K");
        let (entry, _) = DB.lookup_best_by_name("Ryzen 3700X", CpuDbEntryType::X86).unwrap();
        assert_eq!(entry.short_name(), "AMD_Ryzen_5_3600X");
    }

    #[test]
    fn test_best_by_name_with_hint() {
        let hint = MatchHint::X86 {
            family: 0x17,
            model: 0x71,
        };
        let (entry, _) = DB
            .lookup_best_by_name_with_hint("AMD Ryzen", CpuDbEntryType::X86, Some(hint))
            .unwrap();
        assert_eq!(entry.short_name(), "AMD_Ryzen_5_3600X");
        let (entry, _) = DB
            .lookup_best_by_name_with_hint(
                "Apple",
                CpuDbEntryType::Arm,
                Some(MatchHint::Arm { part_num: 0x049 }),
            )
            .unwrap();
        assert_eq!(entry.short_name(), "Apple_M3");
    }

    #[test]
    fn test_arm_main_id() {
        let firestorm = Midr::new(0x611f_0231).unwrap();
        let m = DB.lookup_best_by_arm_main_id(firestorm).unwrap();
        assert_eq!(m.entry.short_name(), "Apple_M1");
        assert_eq!(m.score, MIDR_EXACT_SCORE);
        assert_eq!(m.arm.variants[m.core_variant].core_type, ArmCoreType::Performance);

        // A72 r0p2 still lands on the r0p3 entry.
        let a72 = Midr::from_parts(0x41, 0, 0xd08, 2);
        let m = DB.lookup_best_by_arm_main_id(a72).unwrap();
        assert_eq!(m.entry.short_name(), "RaspberryPi_4");
        assert!(m.score < MIDR_EXACT_SCORE);

        // Unknown implementer.
        assert!(DB.lookup_best_by_arm_main_id(Midr::from_parts(0x4e, 0, 0x004, 0)).is_none());
    }

    #[test]
    fn test_arm_variants() {
        let m1 = DB.lookup_by_exact_name("Apple_M1", CpuDbEntryType::Arm).unwrap();
        let arm = m1.as_arm().unwrap();
        assert_eq!(arm.variants.len(), 2);
        assert!(m1.common().flags.contains(CpuDbFlags::MULTI_CORE_VARIANTS));
        let ice = arm.explode(0).unwrap();
        let fire = arm.explode(1).unwrap();
        assert_eq!(ice.part_num, 0x022);
        assert_eq!(fire.part_num, 0x023);
        assert_eq!(fire.header.microarch, Microarch::Apple_M1);
    }
}
