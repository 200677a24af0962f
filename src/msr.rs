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

//! MSR range tables of the x86 CPU database entries.

use bitflags::bitflags;

use crate::error::CpuDbError;

/// IA32_SPEC_CTRL
pub const IA32_SPEC_CTRL: u32 = 0x48;
/// IA32_PRED_CMD
pub const IA32_PRED_CMD: u32 = 0x49;
/// IA32_FLUSH_CMD
pub const IA32_FLUSH_CMD: u32 = 0x10b;
/// AMD SYSCFG
pub const MSR_K8_SYSCFG: u32 = 0xc001_0010;
/// AMD HWCR
pub const MSR_K7_HWCR: u32 = 0xc001_0015;
/// AMD VM_CR
pub const MSR_K8_VM_CR: u32 = 0xc001_0114;
/// AMD VM_HSAVE_PA
pub const MSR_K8_VM_HSAVE_PA: u32 = 0xc001_0117;

/// First MSR of the AMD window whose indices are aliased through the MSR mask.
pub const AMD_MASKED_WINDOW_FIRST: u32 = 0xc001_0000;
/// Last MSR of the AMD masked window.
pub const AMD_MASKED_WINDOW_LAST: u32 = 0xc001_ffff;

bitflags! {
    /// IA32_FEATURE_CONTROL bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FeatureControlFlags: u64 {
        /// Lock bit. Further writes fault.
        const LOCKED = 1 << 0;
        const VMXON_ENABLED_INSIDE_SMX = 1 << 1;
        const VMXON_ENABLED_OUTSIDE_SMX = 1 << 2;
    }
}

/// How a read of an MSR in a range is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsrRead {
    FixedValue(u64),
    Zero,
    /// Read the host MSR.
    Passthrough,
    /// Deliver #GP.
    Fault,
}

/// How a write to an MSR in a range is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsrWrite {
    Ignore,
    /// Ignore the write unless it sets a bit of `gp_mask`, which faults.
    IgnoreMasked { gp_mask: u64 },
    Passthrough,
    Fault,
}

/// Outcome of a guest MSR write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsrWriteDisposition {
    Ignore,
    Passthrough,
    Fault,
}

/// An inclusive range of MSR indices sharing one access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsrRange {
    pub first: u32,
    pub last: u32,
    pub read: MsrRead,
    pub write: MsrWrite,
    pub name: &'static str,
}

impl MsrRange {
    pub const fn new(
        first: u32,
        last: u32,
        read: MsrRead,
        write: MsrWrite,
        name: &'static str,
    ) -> Self {
        Self {
            first,
            last,
            read,
            write,
            name,
        }
    }

    /// A range covering a single MSR.
    pub const fn single(msr: u32, read: MsrRead, write: MsrWrite, name: &'static str) -> Self {
        Self::new(msr, msr, read, write, name)
    }

    pub const fn contains(&self, msr: u32) -> bool {
        self.first <= msr && msr <= self.last
    }
}

/// Verifies that `ranges` are well formed, sorted and non-overlapping.
pub fn check_msr_ranges(entry: &'static str, ranges: &[MsrRange]) -> Result<(), CpuDbError> {
    for (index, range) in ranges.iter().enumerate() {
        if range.last < range.first {
            return Err(CpuDbError::OverlappingMsrRanges { entry, index });
        }
        if index == 0 {
            continue;
        }
        let prev = &ranges[index - 1];
        if range.first < prev.first {
            return Err(CpuDbError::UnsortedMsrRanges { entry, index });
        }
        if range.first <= prev.last {
            return Err(CpuDbError::OverlappingMsrRanges { entry, index });
        }
    }
    Ok(())
}

/// A sorted MSR range table and the index mask applied in the AMD window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsrRangeTable {
    ranges: &'static [MsrRange],
    mask: u32,
}

impl MsrRangeTable {
    pub const fn new(ranges: &'static [MsrRange], mask: u32) -> Self {
        Self { ranges, mask }
    }

    pub const fn empty() -> Self {
        Self::new(&[], u32::MAX)
    }

    pub fn ranges(&self) -> &'static [MsrRange] {
        self.ranges
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// The index actually looked up for `msr`.
    pub fn effective_index(&self, msr: u32) -> u32 {
        if (AMD_MASKED_WINDOW_FIRST..=AMD_MASKED_WINDOW_LAST).contains(&msr) {
            msr & self.mask
        } else {
            msr
        }
    }

    pub fn lookup(&self, msr: u32) -> Option<&'static MsrRange> {
        let msr = self.effective_index(msr);
        let ranges = self.ranges;
        let i = ranges.partition_point(|r| r.last < msr);
        ranges.get(i).filter(|r| r.contains(msr))
    }

    /// The value a guest read returns, if this table can answer it without the host.
    ///
    /// `None` means #GP, or a host read for [`MsrRead::Passthrough`] ranges.
    pub fn synthesize_read(&self, msr: u32) -> Option<u64> {
        let range = self.lookup(msr)?;
        let value = match range.read {
            MsrRead::FixedValue(value) => Some(value),
            MsrRead::Zero => Some(0),
            MsrRead::Passthrough | MsrRead::Fault => None,
        };
        trace!("rdmsr {:#x} ({}) -> {:x?}", msr, range.name, value);
        value
    }

    pub fn check_write(&self, msr: u32, value: u64) -> MsrWriteDisposition {
        let Some(range) = self.lookup(msr) else {
            trace!("wrmsr {:#x} to an unknown MSR", msr);
            return MsrWriteDisposition::Fault;
        };
        match range.write {
            MsrWrite::Ignore => MsrWriteDisposition::Ignore,
            MsrWrite::IgnoreMasked { gp_mask } if value & gp_mask != 0 => {
                trace!(
                    "wrmsr {:#x} ({}) value {:#x} hits reserved bits {:#x}",
                    msr, range.name, value, gp_mask
                );
                MsrWriteDisposition::Fault
            }
            MsrWrite::IgnoreMasked { .. } => MsrWriteDisposition::Ignore,
            MsrWrite::Passthrough => MsrWriteDisposition::Passthrough,
            MsrWrite::Fault => MsrWriteDisposition::Fault,
        }
    }
}

impl Default for MsrRangeTable {
    fn default() -> Self {
        Self::empty()
    }
}

/// Architectural MSRs every guest may touch. Used for host-passthrough profiles.
pub static COMMON_MSR_RANGES: &[MsrRange] = {
    use x86::msr::*;
    const READ_PT: MsrRead = MsrRead::Passthrough;
    const WRITE_PT: MsrWrite = MsrWrite::Passthrough;
    &[
        MsrRange::single(IA32_TIME_STAMP_COUNTER, READ_PT, WRITE_PT, "IA32_TIME_STAMP_COUNTER"),
        MsrRange::single(IA32_APIC_BASE, READ_PT, WRITE_PT, "IA32_APIC_BASE"),
        MsrRange::single(
            IA32_FEATURE_CONTROL,
            MsrRead::FixedValue(FeatureControlFlags::LOCKED.bits()),
            MsrWrite::Fault,
            "IA32_FEATURE_CONTROL",
        ),
        MsrRange::single(IA32_SPEC_CTRL, READ_PT, WRITE_PT, "IA32_SPEC_CTRL"),
        MsrRange::single(IA32_PRED_CMD, MsrRead::Fault, WRITE_PT, "IA32_PRED_CMD"),
        MsrRange::single(IA32_BIOS_SIGN_ID, MsrRead::Zero, MsrWrite::Ignore, "IA32_BIOS_SIGN_ID"),
        MsrRange::single(IA32_FLUSH_CMD, MsrRead::Fault, WRITE_PT, "IA32_FLUSH_CMD"),
        MsrRange::new(IA32_SYSENTER_CS, IA32_SYSENTER_EIP, READ_PT, WRITE_PT, "IA32_SYSENTER_*"),
        MsrRange::single(IA32_PAT, READ_PT, WRITE_PT, "IA32_PAT"),
        MsrRange::single(IA32_EFER, READ_PT, WRITE_PT, "IA32_EFER"),
        MsrRange::new(IA32_STAR, IA32_FMASK, READ_PT, WRITE_PT, "IA32_STAR..IA32_FMASK"),
        MsrRange::new(IA32_FS_BASE, IA32_KERNEL_GSBASE, READ_PT, WRITE_PT, "IA32_*_BASE"),
        MsrRange::single(IA32_TSC_AUX, READ_PT, WRITE_PT, "IA32_TSC_AUX"),
    ]
};
