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

//! Extended processor state (XSAVE) accounting from CPUID leaf 0xD.

use bit_field::BitField;
use x86::controlregs::Xcr0;

use crate::leaves::CpuidLeafStore;

/// CPUID leaf enumerating the XSAVE state components.
pub const XSTATE_LEAF: u32 = 0xd;
/// Legacy region (512 bytes) plus the XSAVE header (64 bytes).
pub const XSAVE_MIN_AREA_SIZE: u32 = 576;
/// Highest state component index described by leaf 0xD.
pub const XSTATE_MAX_COMPONENT: usize = 18;

/// x87 and SSE state can not be disabled in XCR0.
const XCR0_ALWAYS: u64 = 0x3;

/// Size and location of one state component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XStateComponent {
    pub size: u32,
    /// Offset in the standard format. Zero for supervisor components.
    pub offset: u32,
    pub supervisor: bool,
    /// Aligned to 64 bytes in the compacted format.
    pub align64: bool,
}

/// Extended state layout of a CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XStateInfo {
    /// Components that may be enabled in XCR0.
    pub xcr0_mask: u64,
    /// Components that may be enabled in IA32_XSS.
    pub xss_mask: u64,
    /// Standard-format size with every XCR0 component enabled.
    pub max_size: u32,
    components: [XStateComponent; XSTATE_MAX_COMPONENT + 1],
}

impl XStateInfo {
    /// Reads leaf 0xD and its sub-leaves. `None` when leaf 0xD is absent.
    pub fn from_leaves(leaves: &CpuidLeafStore) -> Option<Self> {
        let main = leaves.get_exact(XSTATE_LEAF, 0)?;
        let xcr0_mask = (main.edx as u64) << 32 | main.eax as u64;
        let xss_mask = leaves
            .get_exact(XSTATE_LEAF, 1)
            .map(|l| (l.edx as u64) << 32 | l.ecx as u64)
            .unwrap_or(0);

        let mut components = [XStateComponent::default(); XSTATE_MAX_COMPONENT + 1];
        for (index, component) in components.iter_mut().enumerate().skip(2) {
            if !(xcr0_mask | xss_mask).get_bit(index) {
                continue;
            }
            if let Some(sub) = leaves.get_exact(XSTATE_LEAF, index as u32) {
                *component = XStateComponent {
                    size: sub.eax,
                    offset: sub.ebx,
                    supervisor: sub.ecx.get_bit(0),
                    align64: sub.ecx.get_bit(1),
                };
            }
        }

        let info = Self {
            xcr0_mask,
            xss_mask,
            max_size: main.ecx.max(XSAVE_MIN_AREA_SIZE),
            components,
        };
        debug!(
            "xstate: xcr0 {:#x} xss {:#x} max size {:#x}",
            info.xcr0_mask, info.xss_mask, info.max_size
        );
        Some(info)
    }

    pub fn component(&self, index: usize) -> Option<&XStateComponent> {
        self.components.get(index).filter(|c| c.size != 0)
    }

    /// Size of the standard-format save area for the XCR0 value `xcr0`.
    pub fn size_for_mask(&self, xcr0: u64) -> u32 {
        let xcr0 = xcr0 & self.xcr0_mask;
        self.components
            .iter()
            .enumerate()
            .skip(2)
            .filter(|&(index, c)| xcr0.get_bit(index) && !c.supervisor && c.size != 0)
            .map(|(_, c)| c.offset + c.size)
            .fold(XSAVE_MIN_AREA_SIZE, u32::max)
    }

    /// Returns the layout with XCR0 limited to `mask`. x87 and SSE stay enabled.
    pub fn restrict(&self, mask: u64) -> Self {
        let mut info = *self;
        info.xcr0_mask &= mask | XCR0_ALWAYS;
        info.max_size = info.size_for_mask(info.xcr0_mask);
        info
    }

    /// The XCR0 components as the `x86` crate names them.
    pub fn xcr0(&self) -> Xcr0 {
        Xcr0::from_bits_truncate(self.xcr0_mask)
    }
}

/// Writes `info` back into sub-leaves 0 and 1 of leaf 0xD.
pub fn apply_to_leaves(info: &XStateInfo, leaves: &mut CpuidLeafStore) {
    if let Some(main) = leaves.get_exact_mut(XSTATE_LEAF, 0) {
        main.eax = info.xcr0_mask as u32;
        main.edx = (info.xcr0_mask >> 32) as u32;
        main.ebx = info.max_size;
        main.ecx = info.max_size;
    }
    if let Some(sub1) = leaves.get_exact_mut(XSTATE_LEAF, 1) {
        sub1.ecx = info.xss_mask as u32;
        sub1.edx = (info.xss_mask >> 32) as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaves::{CpuidLeaf, CpuidLeafFlags};

    fn xeon_gold_6252() -> CpuidLeafStore {
        let sub = |n, eax, ebx, ecx, edx| {
            CpuidLeaf::new(0xd, n, u32::MAX, eax, ebx, ecx, edx, CpuidLeafFlags::empty())
        };
        CpuidLeafStore::from_sorted(&[
            sub(0, 0x2ff, 0xa88, 0xa88, 0),
            sub(1, 0xf, 0xa08, 0x100, 0),
            sub(2, 0x100, 0x240, 0, 0),
            sub(3, 0x40, 0x3c0, 0, 0),
            sub(4, 0x40, 0x400, 0, 0),
            sub(5, 0x40, 0x440, 0, 0),
            sub(6, 0x200, 0x480, 0, 0),
            sub(7, 0x400, 0x680, 0, 0),
            sub(8, 0x80, 0, 1, 0),
            sub(9, 0x8, 0xa80, 0, 0),
        ])
        .unwrap()
    }

    #[test]
    fn test_layout() {
        let info = XStateInfo::from_leaves(&xeon_gold_6252()).unwrap();
        assert_eq!(info.xcr0_mask, 0x2ff);
        assert_eq!(info.xss_mask, 0x100);
        assert_eq!(info.max_size, 0xa88);
        assert!(info.xcr0().contains(Xcr0::XCR0_AVX_STATE));
        let pt = info.component(8).unwrap();
        assert!(pt.supervisor);
        assert_eq!(info.component(2).unwrap().offset, 0x240);
        assert!(info.component(10).is_none());
    }

    #[test]
    fn test_size_for_mask() {
        let info = XStateInfo::from_leaves(&xeon_gold_6252()).unwrap();
        assert_eq!(info.size_for_mask(0x3), XSAVE_MIN_AREA_SIZE);
        assert_eq!(info.size_for_mask(0x7), 0x340);
        assert_eq!(info.size_for_mask(0x2ff), 0xa88);
        assert_eq!(info.size_for_mask(0xe7), 0xa80);
    }

    #[test]
    fn test_restrict() {
        let info = XStateInfo::from_leaves(&xeon_gold_6252()).unwrap();
        let avx_only = info.restrict(0x4);
        assert_eq!(avx_only.xcr0_mask, 0x7);
        assert_eq!(avx_only.max_size, 0x340);

        let mut leaves = xeon_gold_6252();
        apply_to_leaves(&avx_only, &mut leaves);
        let main = leaves.get_exact(XSTATE_LEAF, 0).unwrap();
        assert_eq!((main.eax, main.ebx, main.ecx, main.edx), (0x7, 0x340, 0x340, 0));
    }

    #[test]
    fn test_missing_leaf() {
        assert!(XStateInfo::from_leaves(&CpuidLeafStore::new()).is_none());
    }
}
