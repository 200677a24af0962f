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

//! x86 reference CPUs.

use raw_cpuid::CpuIdResult;

use super::{CpuDbEntry, CpuDbEntryCommon, CpuDbEntryType, CpuDbEntryX86, CpuDbFlags};
use crate::leaves::{CpuidLeaf, CpuidLeafFlags};
use crate::microarch::Microarch;
use crate::msr::*;
use crate::unknown_leaf::{UnknownCpuidPolicy, zero_result};
use crate::vendor::VendorId;

const LEAF1: CpuidLeafFlags = CpuidLeafFlags::CONTAINS_APIC_ID
    .union(CpuidLeafFlags::CONTAINS_OSXSAVE)
    .union(CpuidLeafFlags::CONTAINS_APIC);
const TOPOLOGY: CpuidLeafFlags =
    CpuidLeafFlags::INTEL_TOPOLOGY_SUBLEAVES.union(CpuidLeafFlags::CONTAINS_APIC_ID);
const APIC_ID: CpuidLeafFlags = CpuidLeafFlags::CONTAINS_APIC_ID;

const fn leaf(leaf: u32, eax: u32, ebx: u32, ecx: u32, edx: u32) -> CpuidLeaf {
    CpuidLeaf::simple(leaf, eax, ebx, ecx, edx)
}

const fn sub(leaf: u32, sub_leaf: u32, eax: u32, ebx: u32, ecx: u32, edx: u32) -> CpuidLeaf {
    CpuidLeaf::new(leaf, sub_leaf, u32::MAX, eax, ebx, ecx, edx, CpuidLeafFlags::empty())
}

#[allow(clippy::too_many_arguments)]
const fn quirk(
    leaf: u32,
    sub_leaf: u32,
    sub_leaf_mask: u32,
    eax: u32,
    ebx: u32,
    ecx: u32,
    edx: u32,
    flags: CpuidLeafFlags,
) -> CpuidLeaf {
    CpuidLeaf::new(leaf, sub_leaf, sub_leaf_mask, eax, ebx, ecx, edx, flags)
}

const MTRR_DEF_TYPE_VALID: u64 = 0xcff;

static INTEL_MSR_RANGES: &[MsrRange] = {
    use MsrRead::{FixedValue, Zero};
    use MsrWrite::{Ignore, IgnoreMasked};
    const READ_PT: MsrRead = MsrRead::Passthrough;
    const WRITE_PT: MsrWrite = MsrWrite::Passthrough;
    const READ_GP: MsrRead = MsrRead::Fault;
    const WRITE_GP: MsrWrite = MsrWrite::Fault;
    &[
        MsrRange::single(0x10, READ_PT, WRITE_PT, "IA32_TIME_STAMP_COUNTER"),
        MsrRange::single(0x17, FixedValue(0), WRITE_GP, "IA32_PLATFORM_ID"),
        MsrRange::single(0x1b, READ_PT, WRITE_PT, "IA32_APIC_BASE"),
        MsrRange::single(
            0x3a,
            FixedValue(FeatureControlFlags::LOCKED.bits()),
            WRITE_GP,
            "IA32_FEATURE_CONTROL",
        ),
        MsrRange::single(IA32_SPEC_CTRL, READ_PT, WRITE_PT, "IA32_SPEC_CTRL"),
        MsrRange::single(IA32_PRED_CMD, READ_GP, WRITE_PT, "IA32_PRED_CMD"),
        MsrRange::single(0x8b, Zero, Ignore, "IA32_BIOS_SIGN_ID"),
        MsrRange::single(0xfe, FixedValue(0x508), WRITE_GP, "IA32_MTRRCAP"),
        MsrRange::single(0x10a, Zero, WRITE_GP, "IA32_ARCH_CAPABILITIES"),
        MsrRange::single(IA32_FLUSH_CMD, READ_GP, WRITE_PT, "IA32_FLUSH_CMD"),
        MsrRange::new(0x174, 0x176, READ_PT, WRITE_PT, "IA32_SYSENTER_*"),
        MsrRange::single(0x179, Zero, WRITE_GP, "IA32_MCG_CAP"),
        MsrRange::single(
            0x1a0,
            FixedValue(0x0085_0089),
            IgnoreMasked { gp_mask: 0xffff_ffff_0000_0000 },
            "IA32_MISC_ENABLE",
        ),
        MsrRange::new(0x200, 0x20f, Zero, Ignore, "IA32_MTRR_PHYSBASE/MASK"),
        MsrRange::single(0x277, READ_PT, WRITE_PT, "IA32_PAT"),
        MsrRange::single(
            0x2ff,
            Zero,
            IgnoreMasked { gp_mask: !MTRR_DEF_TYPE_VALID },
            "IA32_MTRR_DEF_TYPE",
        ),
        MsrRange::new(0x480, 0x491, READ_GP, WRITE_GP, "IA32_VMX_*"),
        MsrRange::single(0xc000_0080, READ_PT, WRITE_PT, "IA32_EFER"),
        MsrRange::new(0xc000_0081, 0xc000_0084, READ_PT, WRITE_PT, "IA32_STAR..IA32_FMASK"),
        MsrRange::new(0xc000_0100, 0xc000_0102, READ_PT, WRITE_PT, "IA32_*_BASE"),
        MsrRange::single(0xc000_0103, READ_PT, WRITE_PT, "IA32_TSC_AUX"),
    ]
};

static AMD_MSR_RANGES: &[MsrRange] = {
    use MsrRead::{FixedValue, Zero};
    use MsrWrite::{Ignore, IgnoreMasked};
    const READ_PT: MsrRead = MsrRead::Passthrough;
    const WRITE_PT: MsrWrite = MsrWrite::Passthrough;
    const READ_GP: MsrRead = MsrRead::Fault;
    const WRITE_GP: MsrWrite = MsrWrite::Fault;
    &[
        MsrRange::single(0x10, READ_PT, WRITE_PT, "IA32_TIME_STAMP_COUNTER"),
        MsrRange::single(0x1b, READ_PT, WRITE_PT, "IA32_APIC_BASE"),
        MsrRange::single(IA32_SPEC_CTRL, READ_PT, WRITE_PT, "IA32_SPEC_CTRL"),
        MsrRange::single(IA32_PRED_CMD, READ_GP, WRITE_PT, "IA32_PRED_CMD"),
        MsrRange::single(0x8b, Zero, Ignore, "IA32_BIOS_SIGN_ID"),
        MsrRange::single(0xfe, FixedValue(0x508), WRITE_GP, "IA32_MTRRCAP"),
        MsrRange::new(0x174, 0x176, READ_PT, WRITE_PT, "IA32_SYSENTER_*"),
        MsrRange::single(0x179, Zero, WRITE_GP, "IA32_MCG_CAP"),
        MsrRange::new(0x200, 0x20f, Zero, Ignore, "IA32_MTRR_PHYSBASE/MASK"),
        MsrRange::single(0x277, READ_PT, WRITE_PT, "IA32_PAT"),
        MsrRange::single(
            0x2ff,
            Zero,
            IgnoreMasked { gp_mask: !MTRR_DEF_TYPE_VALID },
            "IA32_MTRR_DEF_TYPE",
        ),
        MsrRange::single(0xc000_0080, READ_PT, WRITE_PT, "AMD64_EFER"),
        MsrRange::new(
            0xc000_0081,
            0xc000_0084,
            READ_PT,
            WRITE_PT,
            "AMD64_STAR..AMD64_SYSCALL_FLAG_MASK",
        ),
        MsrRange::new(0xc000_0100, 0xc000_0102, READ_PT, WRITE_PT, "AMD64_*_BASE"),
        MsrRange::single(0xc000_0103, READ_PT, WRITE_PT, "AMD64_TSC_AUX"),
        MsrRange::new(0xc001_0000, 0xc001_0007, Zero, Ignore, "AMD_K8_PERF_CTL/CTR"),
        MsrRange::single(MSR_K8_SYSCFG, Zero, Ignore, "AMD_K8_SYSCFG"),
        MsrRange::single(
            MSR_K7_HWCR,
            FixedValue(0x0100_0010),
            IgnoreMasked { gp_mask: 0xffff_ffff_0000_0000 },
            "AMD_K8_HWCR",
        ),
        MsrRange::single(MSR_K8_VM_CR, FixedValue(0x10), Ignore, "AMD_K8_VM_CR"),
        MsrRange::single(MSR_K8_VM_HSAVE_PA, Zero, Ignore, "AMD_K8_VM_HSAVE_PA"),
    ]
};

/// Aliases the AMD model-specific window onto its first 16 KiB.
const AMD_MSR_MASK: u32 = 0xc001_3fff;

static I7_6700K_LEAVES: &[CpuidLeaf] = &[
    leaf(0x00000000, 0x00000016, 0x756e6547, 0x6c65746e, 0x49656e69),
    quirk(0x00000001, 0, 0, 0x000506e3, 0x00100800, 0x7ffafbbf, 0xbfebfbff, LEAF1),
    leaf(0x00000002, 0x76036301, 0x00f0b5ff, 0x00000000, 0x00c30000),
    sub(0x00000004, 0, 0x1c004121, 0x01c0003f, 0x0000003f, 0x00000000),
    sub(0x00000004, 1, 0x1c004122, 0x01c0003f, 0x0000003f, 0x00000000),
    sub(0x00000004, 2, 0x1c004143, 0x00c0003f, 0x000003ff, 0x00000000),
    sub(0x00000004, 3, 0x1c03c163, 0x03c0003f, 0x00001fff, 0x00000006),
    leaf(0x00000005, 0x00000040, 0x00000040, 0x00000003, 0x00142120),
    leaf(0x00000006, 0x000027f7, 0x00000002, 0x00000009, 0x00000000),
    sub(0x00000007, 0, 0x00000000, 0x029c6fbf, 0x00000000, 0x9c002400),
    leaf(0x0000000a, 0x07300404, 0x00000000, 0x00000000, 0x00000603),
    quirk(0x0000000b, 0, u32::MAX, 0x00000001, 0x00000002, 0x00000100, 0x00000000, TOPOLOGY),
    quirk(0x0000000b, 1, u32::MAX, 0x00000004, 0x00000008, 0x00000201, 0x00000000, TOPOLOGY),
    sub(0x0000000d, 0, 0x0000001f, 0x00000440, 0x00000440, 0x00000000),
    sub(0x0000000d, 1, 0x0000000f, 0x000003c0, 0x00000100, 0x00000000),
    sub(0x0000000d, 2, 0x00000100, 0x00000240, 0x00000000, 0x00000000),
    sub(0x0000000d, 3, 0x00000040, 0x000003c0, 0x00000000, 0x00000000),
    sub(0x0000000d, 4, 0x00000040, 0x00000400, 0x00000000, 0x00000000),
    sub(0x0000000d, 8, 0x00000080, 0x00000000, 0x00000001, 0x00000000),
    leaf(0x00000015, 0x00000002, 0x0000013e, 0x00000000, 0x00000000),
    leaf(0x00000016, 0x00000fa0, 0x00001068, 0x00000064, 0x00000000),
    leaf(0x80000000, 0x80000008, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x80000001, 0x00000000, 0x00000000, 0x00000121, 0x2c100800),
    leaf(0x80000002, 0x65746e49, 0x2952286c, 0x726f4320, 0x4d542865),
    leaf(0x80000003, 0x37692029, 0x3037362d, 0x43204b30, 0x40205550),
    leaf(0x80000004, 0x302e3420, 0x7a484730, 0x00000000, 0x00000000),
    leaf(0x80000005, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x80000006, 0x00000000, 0x00000000, 0x01006040, 0x00000000),
    leaf(0x80000007, 0x00000000, 0x00000000, 0x00000000, 0x00000100),
    leaf(0x80000008, 0x00003027, 0x00000000, 0x00000000, 0x00000000),
];

pub(super) static INTEL_CORE_I7_6700K: CpuDbEntry = CpuDbEntry::X86(CpuDbEntryX86 {
    common: CpuDbEntryCommon {
        short_name: "Intel_Core_i7_6700K",
        full_name: "Intel(R) Core(TM) i7-6700K CPU @ 4.00GHz",
        vendor: VendorId::Intel,
        microarch: Microarch::Intel_Core7_Skylake,
        flags: CpuDbFlags::empty(),
        entry_type: CpuDbEntryType::X86,
    },
    family: 6,
    model: 0x5e,
    stepping: 3,
    bus_freq_hz: 100_000_000,
    max_phys_addr_width: 39,
    mxcsr_mask: 0xffff,
    leaves: I7_6700K_LEAVES,
    unknown_policy: UnknownCpuidPolicy::LastStandardLeafWithEcx,
    unknown_defaults: zero_result(),
    msr_mask: u32::MAX,
    msr_ranges: INTEL_MSR_RANGES,
});

static I7_3960X_LEAVES: &[CpuidLeaf] = &[
    leaf(0x00000000, 0x0000000d, 0x756e6547, 0x6c65746e, 0x49656e69),
    quirk(0x00000001, 0, 0, 0x000206d7, 0x0b200800, 0x1fbee3ff, 0xbfebfbff, LEAF1),
    leaf(0x00000002, 0x76035a01, 0x00f0b2ff, 0x00000000, 0x00ca0000),
    sub(0x00000004, 0, 0x3c004121, 0x01c0003f, 0x0000003f, 0x00000000),
    sub(0x00000004, 1, 0x3c004122, 0x01c0003f, 0x0000003f, 0x00000000),
    sub(0x00000004, 2, 0x3c004143, 0x01c0003f, 0x000001ff, 0x00000000),
    sub(0x00000004, 3, 0x3c07c163, 0x04c0003f, 0x00002fff, 0x00000006),
    leaf(0x00000005, 0x00000040, 0x00000040, 0x00000003, 0x00021120),
    leaf(0x00000006, 0x00000077, 0x00000002, 0x00000009, 0x00000000),
    sub(0x00000007, 0, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x0000000a, 0x07300403, 0x00000000, 0x00000000, 0x00000603),
    quirk(0x0000000b, 0, u32::MAX, 0x00000001, 0x00000002, 0x00000100, 0x00000000, TOPOLOGY),
    quirk(0x0000000b, 1, u32::MAX, 0x00000005, 0x0000000c, 0x00000201, 0x00000000, TOPOLOGY),
    sub(0x0000000d, 0, 0x00000007, 0x00000340, 0x00000340, 0x00000000),
    sub(0x0000000d, 1, 0x00000001, 0x00000000, 0x00000000, 0x00000000),
    sub(0x0000000d, 2, 0x00000100, 0x00000240, 0x00000000, 0x00000000),
    leaf(0x80000000, 0x80000008, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x80000001, 0x00000000, 0x00000000, 0x00000001, 0x2c100800),
    leaf(0x80000002, 0x65746e49, 0x2952286c, 0x726f4320, 0x4d542865),
    leaf(0x80000003, 0x37692029, 0x3639332d, 0x43205830, 0x40205550),
    leaf(0x80000004, 0x332e3320, 0x7a484730, 0x00000000, 0x00000000),
    leaf(0x80000006, 0x00000000, 0x00000000, 0x01006040, 0x00000000),
    leaf(0x80000007, 0x00000000, 0x00000000, 0x00000000, 0x00000100),
    leaf(0x80000008, 0x0000302e, 0x00000000, 0x00000000, 0x00000000),
];

pub(super) static INTEL_CORE_I7_3960X: CpuDbEntry = CpuDbEntry::X86(CpuDbEntryX86 {
    common: CpuDbEntryCommon {
        short_name: "Intel_Core_i7_3960X",
        full_name: "Intel(R) Core(TM) i7-3960X CPU @ 3.30GHz",
        vendor: VendorId::Intel,
        microarch: Microarch::Intel_Core7_SandyBridge,
        flags: CpuDbFlags::empty(),
        entry_type: CpuDbEntryType::X86,
    },
    family: 6,
    model: 0x2d,
    stepping: 7,
    bus_freq_hz: 100_000_000,
    max_phys_addr_width: 46,
    mxcsr_mask: 0xffff,
    leaves: I7_3960X_LEAVES,
    unknown_policy: UnknownCpuidPolicy::LastStandardLeaf,
    unknown_defaults: zero_result(),
    msr_mask: u32::MAX,
    msr_ranges: INTEL_MSR_RANGES,
});

static XEON_GOLD_6252_LEAVES: &[CpuidLeaf] = &[
    leaf(0x00000000, 0x00000016, 0x756e6547, 0x6c65746e, 0x49656e69),
    quirk(0x00000001, 0, 0, 0x00050657, 0xc7400800, 0x7ffefbff, 0xbfebfbff, LEAF1),
    leaf(0x00000002, 0x76036301, 0x00f0b5ff, 0x00000000, 0x00c30000),
    leaf(0x00000003, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    sub(0x00000004, 0, 0x7c004121, 0x01c0003f, 0x0000003f, 0x00000000),
    sub(0x00000004, 1, 0x7c004122, 0x01c0003f, 0x0000003f, 0x00000000),
    sub(0x00000004, 2, 0x7c004143, 0x03c0003f, 0x000003ff, 0x00000000),
    sub(0x00000004, 3, 0x7c0fc163, 0x0280003f, 0x0000cfff, 0x00000005),
    leaf(0x00000005, 0x00000040, 0x00000040, 0x00000003, 0x00002020),
    leaf(0x00000006, 0x00000077, 0x00000002, 0x00000009, 0x00000000),
    sub(0x00000007, 0, 0x00000000, 0xd39ff7eb, 0x00000818, 0xbc000400),
    leaf(0x00000008, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x00000009, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x0000000a, 0x07300404, 0x00000000, 0x00000000, 0x00000603),
    quirk(0x0000000b, 0, u32::MAX, 0x00000001, 0x00000002, 0x00000100, 0x000000c7, TOPOLOGY),
    quirk(0x0000000b, 1, u32::MAX, 0x00000006, 0x00000030, 0x00000201, 0x000000c7, TOPOLOGY),
    leaf(0x0000000c, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    sub(0x0000000d, 0, 0x000002ff, 0x00000a88, 0x00000a88, 0x00000000),
    sub(0x0000000d, 1, 0x0000000f, 0x00000a08, 0x00000100, 0x00000000),
    sub(0x0000000d, 2, 0x00000100, 0x00000240, 0x00000000, 0x00000000),
    sub(0x0000000d, 3, 0x00000040, 0x000003c0, 0x00000000, 0x00000000),
    sub(0x0000000d, 4, 0x00000040, 0x00000400, 0x00000000, 0x00000000),
    sub(0x0000000d, 5, 0x00000040, 0x00000440, 0x00000000, 0x00000000),
    sub(0x0000000d, 6, 0x00000200, 0x00000480, 0x00000000, 0x00000000),
    sub(0x0000000d, 7, 0x00000400, 0x00000680, 0x00000000, 0x00000000),
    sub(0x0000000d, 8, 0x00000080, 0x00000000, 0x00000001, 0x00000000),
    sub(0x0000000d, 9, 0x00000008, 0x00000a80, 0x00000000, 0x00000000),
    leaf(0x0000000e, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    sub(0x0000000f, 0, 0x00000000, 0x000000cf, 0x00000000, 0x00000002),
    sub(0x0000000f, 1, 0x00000000, 0x0001a000, 0x000000cf, 0x00000007),
    sub(0x00000010, 0, 0x00000000, 0x0000000a, 0x00000000, 0x00000000),
    sub(0x00000010, 1, 0x0000000a, 0x00000600, 0x00000004, 0x0000000f),
    sub(0x00000010, 3, 0x00000059, 0x00000000, 0x00000004, 0x00000007),
    leaf(0x00000011, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x00000012, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x00000013, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    sub(0x00000014, 0, 0x00000001, 0x0000000f, 0x00000007, 0x00000000),
    sub(0x00000014, 1, 0x02490002, 0x003f3fff, 0x00000000, 0x00000000),
    leaf(0x00000015, 0x00000002, 0x000000a8, 0x00000000, 0x00000000),
    leaf(0x00000016, 0x00000834, 0x00000e74, 0x00000064, 0x00000000),
    leaf(0x80000000, 0x80000008, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x80000001, 0x00000000, 0x00000000, 0x00000121, 0x2c100800),
    leaf(0x80000002, 0x65746e49, 0x2952286c, 0x6f655820, 0x2952286e),
    leaf(0x80000003, 0x6c6f4720, 0x32362064, 0x43203235, 0x40205550),
    leaf(0x80000004, 0x312e3220, 0x7a484730, 0x00000000, 0x00000000),
    leaf(0x80000005, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x80000006, 0x00000000, 0x00000000, 0x01006040, 0x00000000),
    leaf(0x80000007, 0x00000000, 0x00000000, 0x00000000, 0x00000100),
    leaf(0x80000008, 0x0000302e, 0x00000000, 0x00000000, 0x00000000),
];

pub(super) static INTEL_XEON_GOLD_6252: CpuDbEntry = CpuDbEntry::X86(CpuDbEntryX86 {
    common: CpuDbEntryCommon {
        short_name: "Intel_Xeon_Gold_6252",
        full_name: "Intel(R) Xeon(R) Gold 6252 CPU @ 2.10GHz",
        vendor: VendorId::Intel,
        microarch: Microarch::Intel_Core7_CascadeLake,
        flags: CpuDbFlags::SERVER,
        entry_type: CpuDbEntryType::X86,
    },
    family: 6,
    model: 0x55,
    stepping: 7,
    bus_freq_hz: 100_000_000,
    max_phys_addr_width: 46,
    mxcsr_mask: 0xffff,
    leaves: XEON_GOLD_6252_LEAVES,
    unknown_policy: UnknownCpuidPolicy::LastStandardLeafWithEcx,
    unknown_defaults: zero_result(),
    msr_mask: u32::MAX,
    msr_ranges: INTEL_MSR_RANGES,
});

static R7_1800X_LEAVES: &[CpuidLeaf] = &[
    leaf(0x00000000, 0x0000000d, 0x68747541, 0x444d4163, 0x69746e65),
    quirk(0x00000001, 0, 0, 0x00800f11, 0x00100800, 0x7ed8320b, 0x178bfbff, LEAF1),
    leaf(0x00000005, 0x00000040, 0x00000040, 0x00000003, 0x00000011),
    leaf(0x00000006, 0x00000004, 0x00000000, 0x00000001, 0x00000000),
    sub(0x00000007, 0, 0x00000000, 0x209c01a9, 0x00000000, 0x00000000),
    sub(0x0000000d, 0, 0x00000007, 0x00000340, 0x00000380, 0x00000000),
    sub(0x0000000d, 1, 0x0000000f, 0x00000340, 0x00000000, 0x00000000),
    sub(0x0000000d, 2, 0x00000100, 0x00000240, 0x00000000, 0x00000000),
    leaf(0x80000000, 0x8000001f, 0x68747541, 0x444d4163, 0x69746e65),
    leaf(0x80000001, 0x00800f11, 0x20000000, 0x35c233ff, 0x2fd3fbff),
    leaf(0x80000002, 0x20444d41, 0x657a7952, 0x2037206e, 0x30303831),
    leaf(0x80000003, 0x69452058, 0x2d746867, 0x65726f43, 0x6f725020),
    leaf(0x80000004, 0x73736563, 0x0000726f, 0x00000000, 0x00000000),
    leaf(0x80000005, 0xff40ff40, 0xff40ff40, 0x20080140, 0x40040140),
    leaf(0x80000006, 0x26006400, 0x66006400, 0x02006140, 0x00808140),
    leaf(0x80000007, 0x00000000, 0x0000001b, 0x00000000, 0x00006799),
    leaf(0x80000008, 0x00003030, 0x00000007, 0x0000400f, 0x00000000),
    leaf(0x8000000a, 0x00000001, 0x00008000, 0x00000000, 0x0001bcff),
    leaf(0x80000019, 0xf040f040, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x8000001a, 0x00000003, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x8000001b, 0x000003ff, 0x00000000, 0x00000000, 0x00000000),
    sub(0x8000001d, 0, 0x00004121, 0x01c0003f, 0x0000003f, 0x00000000),
    sub(0x8000001d, 1, 0x00004122, 0x00c0003f, 0x000000ff, 0x00000000),
    sub(0x8000001d, 2, 0x00004143, 0x01c0003f, 0x000003ff, 0x00000002),
    sub(0x8000001d, 3, 0x0001c163, 0x03c0003f, 0x00001fff, 0x00000001),
    quirk(0x8000001e, 0, 0, 0x00000000, 0x00000100, 0x00000000, 0x00000000, APIC_ID),
    leaf(0x8000001f, 0x00000007, 0x0000016f, 0x0000000f, 0x00000000),
];

pub(super) static AMD_RYZEN_7_1800X: CpuDbEntry = CpuDbEntry::X86(CpuDbEntryX86 {
    common: CpuDbEntryCommon {
        short_name: "AMD_Ryzen_7_1800X",
        full_name: "AMD Ryzen 7 1800X Eight-Core Processor",
        vendor: VendorId::Amd,
        microarch: Microarch::AMD_Zen,
        flags: CpuDbFlags::empty(),
        entry_type: CpuDbEntryType::X86,
    },
    family: 0x17,
    model: 0x1,
    stepping: 1,
    bus_freq_hz: 0,
    max_phys_addr_width: 48,
    mxcsr_mask: 0x2_ffff,
    leaves: R7_1800X_LEAVES,
    unknown_policy: UnknownCpuidPolicy::Defaults,
    unknown_defaults: zero_result(),
    msr_mask: AMD_MSR_MASK,
    msr_ranges: AMD_MSR_RANGES,
});

static R5_3600X_LEAVES: &[CpuidLeaf] = &[
    leaf(0x00000000, 0x00000010, 0x68747541, 0x444d4163, 0x69746e65),
    quirk(0x00000001, 0, 0, 0x00870f10, 0x000c0800, 0x7ed8320b, 0x178bfbff, LEAF1),
    leaf(0x00000002, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x00000003, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x00000005, 0x00000040, 0x00000040, 0x00000003, 0x00000011),
    leaf(0x00000006, 0x00000004, 0x00000000, 0x00000001, 0x00000000),
    sub(0x00000007, 0, 0x00000000, 0x219c91a9, 0x00400004, 0x00000000),
    leaf(0x00000008, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x00000009, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x0000000a, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    quirk(0x0000000b, 0, u32::MAX, 0x00000001, 0x00000002, 0x00000100, 0x00000000, APIC_ID),
    quirk(0x0000000b, 1, u32::MAX, 0x00000007, 0x0000000c, 0x00000201, 0x00000000, APIC_ID),
    leaf(0x0000000c, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    sub(0x0000000d, 0, 0x00000207, 0x00000340, 0x00000380, 0x00000000),
    sub(0x0000000d, 1, 0x0000000f, 0x00000340, 0x00000000, 0x00000000),
    sub(0x0000000d, 2, 0x00000100, 0x00000240, 0x00000000, 0x00000000),
    sub(0x0000000d, 9, 0x00000040, 0x00000340, 0x00000000, 0x00000000),
    leaf(0x0000000e, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    sub(0x0000000f, 0, 0x00000000, 0x000000ff, 0x00000000, 0x00000002),
    sub(0x0000000f, 1, 0x00000000, 0x00000040, 0x000000ff, 0x00000007),
    sub(0x00000010, 0, 0x00000000, 0x00000002, 0x00000000, 0x00000000),
    sub(0x00000010, 1, 0x0000000f, 0x00000000, 0x00000004, 0x0000000f),
    leaf(0x80000000, 0x80000020, 0x68747541, 0x444d4163, 0x69746e65),
    leaf(0x80000001, 0x00870f10, 0x20000000, 0x75c237ff, 0x2fd3fbff),
    leaf(0x80000002, 0x20444d41, 0x657a7952, 0x2035206e, 0x30303633),
    leaf(0x80000003, 0x2d362058, 0x65726f43, 0x6f725020, 0x73736563),
    leaf(0x80000004, 0x0000726f, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x80000005, 0xff40ff40, 0xff40ff40, 0x20080140, 0x20080140),
    leaf(0x80000006, 0x48006400, 0x68006400, 0x02006140, 0x01009140),
    leaf(0x80000007, 0x00000000, 0x0000001b, 0x00000000, 0x00006799),
    leaf(0x80000008, 0x00003030, 0x010eb757, 0x0000700b, 0x00010000),
    leaf(0x80000009, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x8000000a, 0x00000001, 0x00008000, 0x00000000, 0x0013bcff),
    leaf(0x8000000b, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x8000000c, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x8000000d, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x8000000e, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x8000000f, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x80000010, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x80000011, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x80000012, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x80000013, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x80000014, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x80000015, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x80000016, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x80000017, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x80000018, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x80000019, 0xf040f040, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x8000001a, 0x00000006, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x8000001b, 0x000003ff, 0x00000000, 0x00000000, 0x00000000),
    leaf(0x8000001c, 0x00000000, 0x00000000, 0x00000000, 0x00000000),
    sub(0x8000001d, 0, 0x00004121, 0x01c0003f, 0x0000003f, 0x00000000),
    sub(0x8000001d, 1, 0x00004122, 0x01c0003f, 0x0000003f, 0x00000000),
    sub(0x8000001d, 2, 0x00004143, 0x01c0003f, 0x000003ff, 0x00000002),
    sub(0x8000001d, 3, 0x00014163, 0x03c0003f, 0x00003fff, 0x00000001),
    quirk(0x8000001e, 0, 0, 0x00000000, 0x00000100, 0x00000000, 0x00000000, APIC_ID),
    leaf(0x8000001f, 0x0001000f, 0x0000016f, 0x000001fd, 0x00000001),
    sub(0x80000020, 0, 0x00000000, 0x00000002, 0x00000000, 0x00000000),
    sub(0x80000020, 1, 0x0000000b, 0x00000000, 0x00000000, 0x0000000f),
];

pub(super) static AMD_RYZEN_5_3600X: CpuDbEntry = CpuDbEntry::X86(CpuDbEntryX86 {
    common: CpuDbEntryCommon {
        short_name: "AMD_Ryzen_5_3600X",
        full_name: "AMD Ryzen 5 3600X 6-Core Processor",
        vendor: VendorId::Amd,
        microarch: Microarch::AMD_Zen2,
        flags: CpuDbFlags::empty(),
        entry_type: CpuDbEntryType::X86,
    },
    family: 0x17,
    model: 0x71,
    stepping: 0,
    bus_freq_hz: 0,
    max_phys_addr_width: 48,
    mxcsr_mask: 0x2_ffff,
    leaves: R5_3600X_LEAVES,
    unknown_policy: UnknownCpuidPolicy::Defaults,
    unknown_defaults: CpuIdResult {
        eax: 0,
        ebx: 0,
        ecx: 0,
        edx: 0,
    },
    msr_mask: AMD_MSR_MASK,
    msr_ranges: AMD_MSR_RANGES,
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explode::explode_x86;
    use crate::features::X86Feature;
    use crate::msr::{MsrRangeTable, MsrWriteDisposition};

    #[test]
    fn test_brand_strings() {
        for (entry, leaves) in [
            (&INTEL_CORE_I7_6700K, I7_6700K_LEAVES),
            (&AMD_RYZEN_5_3600X, R5_3600X_LEAVES),
        ] {
            let words: alloc::vec::Vec<u8> = leaves
                .iter()
                .filter(|l| (0x8000_0002..=0x8000_0004).contains(&l.leaf))
                .flat_map(|l| [l.eax, l.ebx, l.ecx, l.edx])
                .flat_map(u32::to_le_bytes)
                .collect();
            let brand = core::str::from_utf8(&words).unwrap().trim_end_matches('\0');
            assert_eq!(brand, entry.full_name());
        }
    }

    #[test]
    fn test_xeon_features() {
        let rec = explode_x86(XEON_GOLD_6252_LEAVES).unwrap();
        assert!(rec.has(X86Feature::Avx512f));
        assert!(rec.has(X86Feature::Vmx));
        assert!(!rec.has(X86Feature::Svm));
        assert_eq!(rec.header.max_phys_addr_width, 46);
    }

    #[test]
    fn test_zen2_features() {
        let rec = explode_x86(R5_3600X_LEAVES).unwrap();
        assert!(rec.has(X86Feature::Svm));
        assert!(rec.has(X86Feature::Avx2));
        assert!(!rec.has(X86Feature::Vmx));
        assert_eq!(rec.header.microarch, Microarch::AMD_Zen2);
    }

    #[test]
    fn test_intel_msr_policies() {
        let table = MsrRangeTable::new(INTEL_MSR_RANGES, u32::MAX);
        let tsc = table.lookup(0x10).unwrap();
        assert_eq!((tsc.read, tsc.write), (MsrRead::Passthrough, MsrWrite::Passthrough));
        let pred_cmd = table.lookup(IA32_PRED_CMD).unwrap();
        assert_eq!((pred_cmd.read, pred_cmd.write), (MsrRead::Fault, MsrWrite::Passthrough));
        assert_eq!(table.check_write(IA32_FLUSH_CMD, 1), MsrWriteDisposition::Passthrough);
        assert_eq!(table.check_write(0x3a, 0), MsrWriteDisposition::Fault);
        assert_eq!(table.check_write(0x485, 0), MsrWriteDisposition::Fault);
        assert_eq!(table.synthesize_read(0x485), None);
        assert_eq!(table.synthesize_read(0x3a), Some(FeatureControlFlags::LOCKED.bits()));
        assert_eq!(table.synthesize_read(0x2ff), Some(0));
        assert_eq!(table.check_write(0x2ff, 1 << 12), MsrWriteDisposition::Fault);
        assert_eq!(table.check_write(0x2ff, 0xc06), MsrWriteDisposition::Ignore);
    }

    #[test]
    fn test_amd_msr_aliasing() {
        let table = MsrRangeTable::new(AMD_MSR_RANGES, AMD_MSR_MASK);
        // 0xc001_4010 folds onto SYSCFG.
        assert_eq!(table.lookup(0xc001_4010).map(|r| r.name), Some("AMD_K8_SYSCFG"));
        assert_eq!(table.check_write(MSR_K7_HWCR, 1 << 40), MsrWriteDisposition::Fault);
        assert_eq!(table.synthesize_read(0x3a), None);
    }
}
