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

//! SVM feature leaf (CPUID 0x8000_000A).

use bit_field::BitField;

use crate::features::{FeatureRecordX86, X86Feature};
use crate::leaves::CpuidLeaf;

/// CPUID leaf enumerating SVM revision, ASIDs and optional features.
pub const SVM_FEATURE_LEAF: u32 = 0x8000_000a;

const SVM_EDX: &[(usize, X86Feature)] = &[
    (0, X86Feature::SvmNestedPaging),
    (1, X86Feature::SvmLbrVirt),
    (2, X86Feature::SvmSvmLock),
    (3, X86Feature::SvmNripSave),
    (4, X86Feature::SvmTscRateMsr),
    (5, X86Feature::SvmVmcbClean),
    (6, X86Feature::SvmFlushByAsid),
    (7, X86Feature::SvmDecodeAssists),
    (10, X86Feature::SvmPauseFilter),
    (12, X86Feature::SvmPauseFilterThreshold),
    (13, X86Feature::SvmAvic),
    (15, X86Feature::SvmVirtVmsaveVmload),
    (16, X86Feature::SvmVgif),
    (17, X86Feature::SvmGmet),
    (18, X86Feature::SvmX2avic),
    (19, X86Feature::SvmSssCheck),
    (20, X86Feature::SvmSpecCtrl),
    (23, X86Feature::SvmHostMceOverride),
    (24, X86Feature::SvmTlbiCtl),
];

/// Sets the SVM flags and the ASID count from leaf 0x8000_000A.
pub fn explode_svm(rec: &mut FeatureRecordX86, leaf: &CpuidLeaf) {
    for &(bit, feature) in SVM_EDX {
        rec.set(feature, leaf.edx.get_bit(bit));
    }
    rec.max_asid = leaf.ebx;
    trace!(
        "SVM rev {} asids {} features {:#x}",
        leaf.eax.get_bits(0..8),
        leaf.ebx,
        leaf.edx
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zen2_svm_leaf() {
        // Ryzen 5 3600X.
        let leaf = CpuidLeaf::simple(SVM_FEATURE_LEAF, 0x1, 0x8000, 0, 0x0013_bcff);
        let mut rec = FeatureRecordX86::default();
        explode_svm(&mut rec, &leaf);
        assert_eq!(rec.max_asid, 0x8000);
        assert!(rec.has(X86Feature::SvmNestedPaging));
        assert!(rec.has(X86Feature::SvmDecodeAssists));
        assert!(rec.has(X86Feature::SvmAvic));
        assert!(rec.has(X86Feature::SvmVgif));
        assert!(!rec.has(X86Feature::SvmX2avic));
    }
}
