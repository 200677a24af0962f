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

//! x86 CPUID explosion.

use bit_field::BitField;

use super::svm::{SVM_FEATURE_LEAF, explode_svm};
use super::vmx::{VmxMsrs, explode_vmx};
use crate::error::ExplodeError;
use crate::features::{FeatureHeader, FeatureRecordX86, X86Feature};
use crate::leaves::{CpuidLeaf, CpuidLeafStore, EXTENDED_LEAF_BASE, check_leaf_order, lookup_leaf};
use crate::microarch::{determine_x86_microarch, x86_family_model_stepping};
use crate::vendor::detect_x86_vendor;

/// Physical address width assumed when leaf 0x8000_0008 is absent.
pub const DEFAULT_PHYS_ADDR_WIDTH: u8 = 36;
/// Linear address width assumed when leaf 0x8000_0008 is absent.
pub const DEFAULT_LINEAR_ADDR_WIDTH: u8 = 48;

/// IA32_ARCH_CAPABILITIES
pub const IA32_ARCH_CAPABILITIES: u32 = 0x10a;

/// MSR values consumed in addition to the CPUID leaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct X86MsrProbe {
    pub vmx: Option<VmxMsrs>,
    pub arch_capabilities: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
enum Reg {
    Eax,
    Ebx,
    Ecx,
    Edx,
}

impl Reg {
    fn of(self, leaf: &CpuidLeaf) -> u32 {
        match self {
            Reg::Eax => leaf.eax,
            Reg::Ebx => leaf.ebx,
            Reg::Ecx => leaf.ecx,
            Reg::Edx => leaf.edx,
        }
    }

    fn of_mut(self, leaf: &mut CpuidLeaf) -> &mut u32 {
        match self {
            Reg::Eax => &mut leaf.eax,
            Reg::Ebx => &mut leaf.ebx,
            Reg::Ecx => &mut leaf.ecx,
            Reg::Edx => &mut leaf.edx,
        }
    }
}

/// One flag sourced from one CPUID bit.
struct LeafBit {
    leaf: u32,
    sub_leaf: u32,
    reg: Reg,
    bit: usize,
    feature: X86Feature,
}

macro_rules! leaf_bits {
    ($(($leaf:expr, $sub:expr, $reg:ident, $bit:expr) => $feat:ident,)*) => {
        &[$(LeafBit {
            leaf: $leaf,
            sub_leaf: $sub,
            reg: Reg::$reg,
            bit: $bit,
            feature: X86Feature::$feat,
        },)*]
    };
}

static LEAF_BITS: &[LeafBit] = leaf_bits! {
    (1, 0, Edx, 0) => Fpu,
    (1, 0, Edx, 1) => Vme,
    (1, 0, Edx, 2) => De,
    (1, 0, Edx, 3) => Pse,
    (1, 0, Edx, 4) => Tsc,
    (1, 0, Edx, 5) => Msr,
    (1, 0, Edx, 6) => Pae,
    (1, 0, Edx, 7) => Mce,
    (1, 0, Edx, 8) => Cx8,
    (1, 0, Edx, 9) => Apic,
    (1, 0, Edx, 11) => Sep,
    (1, 0, Edx, 12) => Mtrr,
    (1, 0, Edx, 13) => Pge,
    (1, 0, Edx, 14) => Mca,
    (1, 0, Edx, 15) => Cmov,
    (1, 0, Edx, 16) => Pat,
    (1, 0, Edx, 17) => Pse36,
    (1, 0, Edx, 19) => Clflush,
    (1, 0, Edx, 21) => Ds,
    (1, 0, Edx, 22) => Acpi,
    (1, 0, Edx, 23) => Mmx,
    (1, 0, Edx, 24) => Fxsr,
    (1, 0, Edx, 25) => Sse,
    (1, 0, Edx, 26) => Sse2,
    (1, 0, Edx, 27) => Ss,
    (1, 0, Edx, 28) => Htt,
    (1, 0, Edx, 29) => Tm,
    (1, 0, Edx, 31) => Pbe,
    (1, 0, Ecx, 0) => Sse3,
    (1, 0, Ecx, 1) => Pclmul,
    (1, 0, Ecx, 3) => Monitor,
    (1, 0, Ecx, 5) => Vmx,
    (1, 0, Ecx, 6) => Smx,
    (1, 0, Ecx, 7) => Est,
    (1, 0, Ecx, 9) => Ssse3,
    (1, 0, Ecx, 12) => Fma,
    (1, 0, Ecx, 13) => Cx16,
    (1, 0, Ecx, 15) => Pdcm,
    (1, 0, Ecx, 17) => Pcid,
    (1, 0, Ecx, 18) => Dca,
    (1, 0, Ecx, 19) => Sse41,
    (1, 0, Ecx, 20) => Sse42,
    (1, 0, Ecx, 21) => X2apic,
    (1, 0, Ecx, 22) => Movbe,
    (1, 0, Ecx, 23) => Popcnt,
    (1, 0, Ecx, 24) => TscDeadline,
    (1, 0, Ecx, 25) => Aes,
    (1, 0, Ecx, 26) => Xsave,
    (1, 0, Ecx, 27) => Osxsave,
    (1, 0, Ecx, 28) => Avx,
    (1, 0, Ecx, 29) => F16c,
    (1, 0, Ecx, 30) => Rdrand,
    (1, 0, Ecx, 31) => Hypervisor,

    (7, 0, Ebx, 0) => Fsgsbase,
    (7, 0, Ebx, 1) => TscAdjust,
    (7, 0, Ebx, 2) => Sgx,
    (7, 0, Ebx, 3) => Bmi1,
    (7, 0, Ebx, 4) => Hle,
    (7, 0, Ebx, 5) => Avx2,
    (7, 0, Ebx, 7) => Smep,
    (7, 0, Ebx, 8) => Bmi2,
    (7, 0, Ebx, 9) => Erms,
    (7, 0, Ebx, 10) => Invpcid,
    (7, 0, Ebx, 11) => Rtm,
    (7, 0, Ebx, 14) => Mpx,
    (7, 0, Ebx, 16) => Avx512f,
    (7, 0, Ebx, 17) => Avx512dq,
    (7, 0, Ebx, 18) => Rdseed,
    (7, 0, Ebx, 19) => Adx,
    (7, 0, Ebx, 20) => Smap,
    (7, 0, Ebx, 21) => Avx512ifma,
    (7, 0, Ebx, 23) => Clflushopt,
    (7, 0, Ebx, 24) => Clwb,
    (7, 0, Ebx, 25) => IntelPt,
    (7, 0, Ebx, 28) => Avx512cd,
    (7, 0, Ebx, 29) => Sha,
    (7, 0, Ebx, 30) => Avx512bw,
    (7, 0, Ebx, 31) => Avx512vl,
    (7, 0, Ecx, 1) => Avx512vbmi,
    (7, 0, Ecx, 2) => Umip,
    (7, 0, Ecx, 3) => Pku,
    (7, 0, Ecx, 4) => Ospke,
    (7, 0, Ecx, 5) => Waitpkg,
    (7, 0, Ecx, 6) => Avx512vbmi2,
    (7, 0, Ecx, 7) => CetSs,
    (7, 0, Ecx, 8) => Gfni,
    (7, 0, Ecx, 9) => Vaes,
    (7, 0, Ecx, 10) => Vpclmulqdq,
    (7, 0, Ecx, 11) => Avx512vnni,
    (7, 0, Ecx, 12) => Avx512bitalg,
    (7, 0, Ecx, 14) => Avx512vpopcntdq,
    (7, 0, Ecx, 16) => La57,
    (7, 0, Ecx, 22) => Rdpid,
    (7, 0, Ecx, 23) => KeyLocker,
    (7, 0, Ecx, 24) => BusLockDetect,
    (7, 0, Ecx, 25) => Cldemote,
    (7, 0, Ecx, 27) => Movdiri,
    (7, 0, Ecx, 28) => Movdir64b,
    (7, 0, Ecx, 29) => Enqcmd,
    (7, 0, Ecx, 30) => SgxLc,
    (7, 0, Ecx, 31) => Pks,
    (7, 0, Edx, 2) => Avx5124vnniw,
    (7, 0, Edx, 3) => Avx5124fmaps,
    (7, 0, Edx, 4) => Fsrm,
    (7, 0, Edx, 8) => Avx512Vp2intersect,
    (7, 0, Edx, 9) => SrbdsCtrl,
    (7, 0, Edx, 10) => MdClear,
    (7, 0, Edx, 11) => RtmAlwaysAbort,
    (7, 0, Edx, 14) => Serialize,
    (7, 0, Edx, 15) => Hybrid,
    (7, 0, Edx, 19) => ArchLbr,
    (7, 0, Edx, 20) => CetIbt,
    (7, 0, Edx, 22) => AmxBf16,
    (7, 0, Edx, 23) => Avx512Fp16,
    (7, 0, Edx, 24) => AmxTile,
    (7, 0, Edx, 25) => AmxInt8,
    (7, 0, Edx, 26) => Ibrs,
    (7, 0, Edx, 26) => Ibpb,
    (7, 0, Edx, 27) => Stibp,
    (7, 0, Edx, 28) => FlushCmd,
    (7, 0, Edx, 29) => ArchCap,
    (7, 0, Edx, 30) => CoreCap,
    (7, 0, Edx, 31) => Ssbd,
    (7, 1, Eax, 4) => AvxVnni,
    (7, 1, Eax, 5) => Avx512Bf16,
    (7, 1, Eax, 11) => Fsrs,
    (7, 1, Eax, 12) => Fsrcs,
    (7, 1, Eax, 22) => Hreset,
    (7, 1, Eax, 26) => Lam,
    (7, 1, Edx, 4) => AvxVnniInt8,
    (7, 1, Edx, 5) => AvxNeConvert,
    (7, 1, Edx, 14) => Prefetchi,
    (7, 2, Edx, 0) => Psfd,
    (7, 2, Edx, 1) => IpredCtrl,
    (7, 2, Edx, 2) => RrsbaCtrl,
    (7, 2, Edx, 4) => BhiCtrl,
    (7, 2, Edx, 5) => McdtNo,

    (0xd, 1, Eax, 0) => Xsaveopt,
    (0xd, 1, Eax, 1) => Xsavec,
    (0xd, 1, Eax, 2) => XgetbvEcx1,
    (0xd, 1, Eax, 3) => Xsaves,

    (0x8000_0001, 0, Edx, 11) => Syscall,
    (0x8000_0001, 0, Edx, 20) => Nx,
    (0x8000_0001, 0, Edx, 22) => Mmxext,
    (0x8000_0001, 0, Edx, 25) => Ffxsr,
    (0x8000_0001, 0, Edx, 26) => Page1gb,
    (0x8000_0001, 0, Edx, 27) => Rdtscp,
    (0x8000_0001, 0, Edx, 29) => LongMode,
    (0x8000_0001, 0, Edx, 30) => Amd3dnowext,
    (0x8000_0001, 0, Edx, 31) => Amd3dnow,
    (0x8000_0001, 0, Ecx, 0) => LahfSahf,
    (0x8000_0001, 0, Ecx, 2) => Svm,
    (0x8000_0001, 0, Ecx, 4) => Cr8l,
    (0x8000_0001, 0, Ecx, 5) => Abm,
    (0x8000_0001, 0, Ecx, 6) => Sse4a,
    (0x8000_0001, 0, Ecx, 7) => MisalignedSse,
    (0x8000_0001, 0, Ecx, 8) => Prefetchw,
    (0x8000_0001, 0, Ecx, 11) => Xop,
    (0x8000_0001, 0, Ecx, 16) => Fma4,
    (0x8000_0001, 0, Ecx, 22) => Topoext,
    (0x8000_0001, 0, Ecx, 29) => Mwaitx,
    (0x8000_0007, 0, Edx, 8) => InvariantTsc,
    (0x8000_0008, 0, Ebx, 0) => Clzero,
    (0x8000_0008, 0, Ebx, 1) => Irperf,
    (0x8000_0008, 0, Ebx, 9) => Wbnoinvd,
    (0x8000_0008, 0, Ebx, 12) => Ibpb,
    (0x8000_0008, 0, Ebx, 14) => Ibrs,
    (0x8000_0008, 0, Ebx, 15) => Stibp,
    (0x8000_0008, 0, Ebx, 24) => Ssbd,
    (0x8000_0008, 0, Ebx, 25) => VirtSsbd,
    (0x8000_0008, 0, Ebx, 26) => SsbNo,
    (0x8000_0021, 0, Eax, 0) => NoNestedDataBp,
    (0x8000_0021, 0, Eax, 2) => LfenceAlwaysSerializing,
    (0x8000_0021, 0, Eax, 6) => NullSelClrBase,
    (0x8000_0021, 0, Eax, 8) => AutoIbrs,
};

/// IA32_ARCH_CAPABILITIES bits.
const ARCH_CAP_BITS: &[(usize, X86Feature)] = &[
    (0, X86Feature::RdclNo),
    (1, X86Feature::IbrsAll),
    (2, X86Feature::Rsba),
    (3, X86Feature::SkipL1dflVmentry),
    (4, X86Feature::SsbNo),
    (5, X86Feature::MdsNo),
    (6, X86Feature::IfPschangeMscNo),
    (7, X86Feature::TsxCtrl),
    (8, X86Feature::TaaNo),
    (17, X86Feature::FbClear),
    (26, X86Feature::GdsNo),
    (27, X86Feature::RfdsNo),
];

/// Explodes sorted CPUID leaves into an x86 feature record.
pub fn explode_x86(leaves: &[CpuidLeaf]) -> Result<FeatureRecordX86, ExplodeError> {
    explode_x86_with_msrs(leaves, None)
}

/// Like [`explode_x86`], additionally consuming VMX capability and
/// architectural-capability MSR values.
pub fn explode_x86_with_msrs(
    leaves: &[CpuidLeaf],
    msrs: Option<&X86MsrProbe>,
) -> Result<FeatureRecordX86, ExplodeError> {
    check_leaf_order(leaves)?;

    let leaf0 = lookup_leaf(leaves, 0, 0).ok_or(ExplodeError::MissingBaselineLeaf { leaf: 0 })?;
    let leaf1 = lookup_leaf(leaves, 1, 0).ok_or(ExplodeError::MissingBaselineLeaf { leaf: 1 })?;

    let vendor = detect_x86_vendor(leaf0.eax, leaf0.ebx, leaf0.ecx, leaf0.edx);
    let max_std = leaf0.eax;
    let max_ext = lookup_leaf(leaves, EXTENDED_LEAF_BASE, 0)
        .map(|l| l.eax)
        .filter(|&eax| eax >= EXTENDED_LEAF_BASE)
        .unwrap_or(0);
    // Highest sub-leaf of leaf 7.
    let max_leaf7_sub = match lookup_leaf(leaves, 7, 0) {
        Some(l) if max_std >= 7 => l.eax,
        _ => 0,
    };

    let present = |leaf: u32, sub_leaf: u32| {
        let in_range = if leaf >= EXTENDED_LEAF_BASE {
            leaf <= max_ext
        } else {
            leaf <= max_std
        };
        if !in_range || (leaf == 7 && sub_leaf > max_leaf7_sub) {
            return None;
        }
        lookup_leaf(leaves, leaf, sub_leaf)
    };

    let (family, model, stepping) = x86_family_model_stepping(vendor, leaf1.eax);
    let mut rec = FeatureRecordX86 {
        header: FeatureHeader {
            microarch: determine_x86_microarch(vendor, family, model, stepping),
            vendor,
            max_phys_addr_width: DEFAULT_PHYS_ADDR_WIDTH,
            max_linear_addr_width: DEFAULT_LINEAR_ADDR_WIDTH,
        },
        family: family.min(u8::MAX as u32) as u8,
        model: model as u8,
        stepping: stepping as u8,
        ..Default::default()
    };

    for lb in LEAF_BITS {
        if let Some(leaf) = present(lb.leaf, lb.sub_leaf) {
            if lb.reg.of(leaf).get_bit(lb.bit) {
                trace!(
                    "leaf {:#x}.{} {:?}[{}] -> {}",
                    lb.leaf,
                    lb.sub_leaf,
                    lb.reg,
                    lb.bit,
                    lb.feature.name()
                );
                rec.set(lb.feature, true);
            }
        }
    }

    // AMD mirrors some leaf 1 EDX bits in the extended leaf.
    if vendor.is_amd_like() {
        if let Some(ext1) = present(0x8000_0001, 0) {
            if ext1.edx.get_bit(23) {
                rec.set(X86Feature::Mmx, true);
            }
            if ext1.edx.get_bit(24) {
                rec.set(X86Feature::Fxsr, true);
            }
        }
    }

    if let Some(widths) = present(0x8000_0008, 0) {
        let phys = widths.eax.get_bits(0..8) as u8;
        let linear = widths.eax.get_bits(8..16) as u8;
        if phys != 0 {
            rec.header.max_phys_addr_width = phys;
        }
        if linear != 0 {
            rec.header.max_linear_addr_width = linear;
        }
    }

    if rec.has(X86Feature::Xsave) {
        let xstate = present(0xd, 0).ok_or(ExplodeError::UnsupportedArchitectureVariant(
            "XSAVE advertised without leaf 0xD",
        ))?;
        rec.max_ext_state_size = xstate.ecx;
    }

    if rec.has(X86Feature::Svm) {
        if max_ext < SVM_FEATURE_LEAF {
            return Err(ExplodeError::UnsupportedArchitectureVariant(
                "SVM advertised beyond the extended leaf range",
            ));
        }
        let svm = present(SVM_FEATURE_LEAF, 0).ok_or(ExplodeError::UnsupportedArchitectureVariant(
            "SVM advertised without leaf 0x8000000A",
        ))?;
        explode_svm(&mut rec, svm);
    }

    if let Some(probe) = msrs {
        if rec.has(X86Feature::Vmx) {
            let vmx = probe.vmx.as_ref().ok_or(ExplodeError::UnsupportedArchitectureVariant(
                "VMX advertised without VMX capability MSRs",
            ))?;
            explode_vmx(&mut rec, vmx);
        }
        if rec.has(X86Feature::ArchCap) {
            if let Some(arch_cap) = probe.arch_capabilities {
                for &(bit, feature) in ARCH_CAP_BITS {
                    if arch_cap.get_bit(bit) {
                        rec.set(feature, true);
                    }
                }
            }
        }
    }
    if rec.vmx_max_phys_addr_width == 0 {
        rec.vmx_max_phys_addr_width = rec.header.max_phys_addr_width.into();
    }

    derive_summary_flags(&mut rec);

    debug!(
        "exploded x86 features: {:?} {:?} family {:#x} model {:#x} stepping {} phys {} linear {}",
        rec.header.vendor,
        rec.header.microarch,
        rec.family,
        rec.model,
        rec.stepping,
        rec.header.max_phys_addr_width,
        rec.header.max_linear_addr_width
    );
    Ok(rec)
}

/// Clears every CPUID bit that advertises `feature`, AMD mirrors included.
///
/// Returns `false` when no CPUID bit maps to `feature` (MSR-sourced and
/// derived flags).
pub(crate) fn clear_feature_bits(leaves: &mut CpuidLeafStore, feature: X86Feature) -> bool {
    let mut found = false;
    for lb in LEAF_BITS.iter().filter(|lb| lb.feature == feature) {
        found = true;
        if let Some(leaf) = leaves.get_exact_mut(lb.leaf, lb.sub_leaf) {
            lb.reg.of_mut(leaf).set_bit(lb.bit, false);
        }
    }
    let mirror = match feature {
        X86Feature::Mmx => Some(23),
        X86Feature::Fxsr => Some(24),
        _ => None,
    };
    if let (Some(bit), Some(ext1)) = (mirror, leaves.get_exact_mut(0x8000_0001, 0)) {
        ext1.edx.set_bit(bit, false);
    }
    found
}

/// Flags computed from other flags. Runs after every probed bit is in place.
fn derive_summary_flags(rec: &mut FeatureRecordX86) {
    let speculation_control = [
        X86Feature::Ibrs,
        X86Feature::Ibpb,
        X86Feature::Stibp,
        X86Feature::Ssbd,
        X86Feature::FlushCmd,
        X86Feature::ArchCap,
    ]
    .iter()
    .any(|&f| rec.has(f));
    rec.set(X86Feature::SpeculationControl, speculation_control);
    rec.set(
        X86Feature::MdsMitigationNeeded,
        rec.has(X86Feature::MdClear) && !rec.has(X86Feature::MdsNo),
    );
    rec.set(
        X86Feature::L1tfFlushNeeded,
        rec.has(X86Feature::FlushCmd) && !rec.has(X86Feature::RdclNo),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaves::CpuidLeafFlags;
    use crate::microarch::Microarch;
    use crate::vendor::VendorId;

    const INTEL: (u32, u32, u32) = (0x756e_6547, 0x6c65_746e, 0x4965_6e69);
    const AMD: (u32, u32, u32) = (0x6874_7541, 0x444d_4163, 0x6974_6e65);

    fn leaf0(max: u32, vendor: (u32, u32, u32)) -> CpuidLeaf {
        CpuidLeaf::simple(0, max, vendor.0, vendor.1, vendor.2)
    }

    #[test]
    fn test_clear_feature_bits() {
        let mut store = CpuidLeafStore::from_sorted(&[
            leaf0(1, AMD),
            CpuidLeaf::simple(1, 0x800f11, 0, 0, 1 << 23 | 1 << 25),
            CpuidLeaf::simple(0x8000_0000, 0x8000_0001, 0, 0, 0),
            CpuidLeaf::simple(0x8000_0001, 0, 0, 0, 1 << 23),
        ])
        .unwrap();
        assert!(clear_feature_bits(&mut store, X86Feature::Mmx));
        let rec = explode_x86(store.as_slice()).unwrap();
        assert!(!rec.has(X86Feature::Mmx));
        assert!(rec.has(X86Feature::Sse));
        assert!(!clear_feature_bits(&mut store, X86Feature::SpeculationControl));
    }

    #[test]
    fn test_baseline_bits() {
        let leaves = [
            leaf0(1, INTEL),
            CpuidLeaf::simple(1, 0x906e9, 0, 1 << 28 | 1 << 0, 1 << 0 | 1 << 6),
        ];
        let rec = explode_x86(&leaves).unwrap();
        assert!(rec.has(X86Feature::Fpu));
        assert!(rec.has(X86Feature::Pae));
        assert!(rec.has(X86Feature::Avx));
        assert!(rec.has(X86Feature::Sse3));
        assert!(!rec.has(X86Feature::Sse2));
        assert_eq!(rec.header.max_phys_addr_width, DEFAULT_PHYS_ADDR_WIDTH);
        assert_eq!(rec.header.max_linear_addr_width, DEFAULT_LINEAR_ADDR_WIDTH);
        assert_eq!(rec.vmx_max_phys_addr_width, DEFAULT_PHYS_ADDR_WIDTH as u32);
    }

    #[test]
    fn test_leaf_beyond_max_standard_is_ignored() {
        let leaves = [
            leaf0(1, INTEL),
            CpuidLeaf::simple(1, 0x906e9, 0, 0, 0),
            CpuidLeaf::new(7, 0, 0xffff_ffff, 0, 1 << 5, 0, 0, CpuidLeafFlags::empty()),
        ];
        let rec = explode_x86(&leaves).unwrap();
        assert!(!rec.has(X86Feature::Avx2));
    }

    #[test]
    fn test_leaf7_sub_leaf_gating() {
        let leaves = [
            leaf0(7, INTEL),
            CpuidLeaf::simple(1, 0x906e9, 0, 0, 0),
            CpuidLeaf::new(7, 0, 0xffff_ffff, 0, 1 << 5, 0, 0, CpuidLeafFlags::empty()),
            CpuidLeaf::new(7, 1, 0xffff_ffff, 1 << 4, 0, 0, 0, CpuidLeafFlags::empty()),
        ];
        let rec = explode_x86(&leaves).unwrap();
        assert!(rec.has(X86Feature::Avx2));
        // Leaf 7.0 EAX = 0: sub-leaf 1 is not enumerated.
        assert!(!rec.has(X86Feature::AvxVnni));
    }

    #[test]
    fn test_amd_mirror_and_speculation_bits() {
        let leaves = [
            leaf0(1, AMD),
            CpuidLeaf::simple(1, 0x0087_0f10, 0, 0, 0),
            CpuidLeaf::simple(0x8000_0000, 0x8000_0008, 0, 0, 0),
            CpuidLeaf::simple(0x8000_0001, 0, 0, 0, 1 << 23 | 1 << 29),
            CpuidLeaf::simple(0x8000_0008, 0x3030, 1 << 12 | 1 << 24, 0, 0),
        ];
        let rec = explode_x86(&leaves).unwrap();
        assert_eq!(rec.header.vendor, VendorId::Amd);
        assert_eq!(rec.header.microarch, Microarch::AMD_Zen2);
        assert!(rec.has(X86Feature::Mmx));
        assert!(rec.has(X86Feature::LongMode));
        assert!(rec.has(X86Feature::Ibpb));
        assert!(rec.has(X86Feature::Ssbd));
        assert!(rec.has(X86Feature::SpeculationControl));
        assert_eq!(rec.header.max_phys_addr_width, 0x30);
        assert_eq!(rec.header.max_linear_addr_width, 0x30);
    }

    #[test]
    fn test_xsave_requires_leaf_d() {
        let leaves = [leaf0(0xd, INTEL), CpuidLeaf::simple(1, 0x906e9, 0, 1 << 26, 0)];
        assert!(matches!(
            explode_x86(&leaves),
            Err(ExplodeError::UnsupportedArchitectureVariant(_))
        ));
    }

    #[test]
    fn test_svm_requires_extended_range() {
        let leaves = [
            leaf0(1, AMD),
            CpuidLeaf::simple(1, 0x0087_0f10, 0, 0, 0),
            CpuidLeaf::simple(0x8000_0000, 0x8000_0001, 0, 0, 0),
            CpuidLeaf::simple(0x8000_0001, 0, 0, 1 << 2, 0),
        ];
        assert!(matches!(
            explode_x86(&leaves),
            Err(ExplodeError::UnsupportedArchitectureVariant(_))
        ));
    }

    #[test]
    fn test_svm_requires_feature_leaf() {
        let leaves = [
            leaf0(1, AMD),
            CpuidLeaf::simple(1, 0x0087_0f10, 0, 0, 0),
            CpuidLeaf::simple(0x8000_0000, SVM_FEATURE_LEAF, 0, 0, 0),
            CpuidLeaf::simple(0x8000_0001, 0, 0, 1 << 2, 0),
            CpuidLeaf::simple(SVM_FEATURE_LEAF, 1, 0x8000, 0, 1 << 0),
        ];
        assert!(matches!(
            explode_x86(&leaves[..4]),
            Err(ExplodeError::UnsupportedArchitectureVariant(_))
        ));

        let rec = explode_x86(&leaves).unwrap();
        assert!(rec.has(X86Feature::Svm));
        assert!(rec.has(X86Feature::SvmNestedPaging));
        assert_eq!(rec.max_asid, 0x8000);
    }

    #[test]
    fn test_vmx_needs_msrs_when_probe_given() {
        let leaves = [leaf0(1, INTEL), CpuidLeaf::simple(1, 0x906e9, 0, 1 << 5, 0)];
        assert!(explode_x86(&leaves).is_ok());
        let probe = X86MsrProbe::default();
        assert!(matches!(
            explode_x86_with_msrs(&leaves, Some(&probe)),
            Err(ExplodeError::UnsupportedArchitectureVariant(_))
        ));
    }

    #[test]
    fn test_arch_capabilities_gated_on_cpuid() {
        let probe = X86MsrProbe {
            vmx: None,
            arch_capabilities: Some(1 << 0 | 1 << 5),
        };
        let mut leaves = [
            leaf0(7, INTEL),
            CpuidLeaf::simple(1, 0x906e9, 0, 0, 0),
            CpuidLeaf::new(7, 0, 0xffff_ffff, 0, 0, 0, 1 << 10 | 1 << 28, CpuidLeafFlags::empty()),
        ];
        let rec = explode_x86_with_msrs(&leaves, Some(&probe)).unwrap();
        assert!(!rec.has(X86Feature::MdsNo));
        assert!(rec.has(X86Feature::MdsMitigationNeeded));
        assert!(rec.has(X86Feature::L1tfFlushNeeded));

        leaves[2].edx |= 1 << 29;
        let rec = explode_x86_with_msrs(&leaves, Some(&probe)).unwrap();
        assert!(rec.has(X86Feature::RdclNo));
        assert!(rec.has(X86Feature::MdsNo));
        assert!(!rec.has(X86Feature::MdsMitigationNeeded));
        assert!(!rec.has(X86Feature::L1tfFlushNeeded));
    }
}
