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

//! The feature record: exploded CPU capabilities.
//!
//! Both architecture extensions are 64-byte `#[repr(C)]` structs that start
//! with the same [`FeatureHeader`], so vendor and microarchitecture can be read
//! from a [`RawFeatureRecord`] without knowing which one it holds.

mod arm;
mod bits;
mod diff;
mod x86;

use core::mem::{offset_of, size_of};

use static_assertions::{assert_eq_size, const_assert_eq};

use crate::microarch::Microarch;
use crate::vendor::{Architecture, VendorId};

pub use arm::{ARM_FEATURE_WORDS, ARM_V9_FIRST_BIT, ArmFeature, FeatureRecordArmV8};
pub use bits::FeatureBits;
pub use diff::FeatureRecordDiff;
pub use x86::{FeatureRecordX86, X86_FEATURE_WORDS, X86_VIRT_FIRST_BIT, X86Feature};

/// Size in bytes of either architecture extension.
pub const FEATURE_RECORD_SIZE: usize = 64;

/// Fields shared by every architecture extension, at identical offsets.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FeatureHeader {
    pub microarch: Microarch,
    pub vendor: VendorId,
    pub max_phys_addr_width: u8,
    pub max_linear_addr_width: u8,
}

assert_eq_size!(FeatureRecordX86, FeatureRecordArmV8);
const_assert_eq!(size_of::<FeatureRecordX86>(), FEATURE_RECORD_SIZE);
const_assert_eq!(size_of::<FeatureRecordArmV8>(), FEATURE_RECORD_SIZE);
const_assert_eq!(offset_of!(FeatureRecordX86, header), 0);
const_assert_eq!(offset_of!(FeatureRecordArmV8, header), 0);
const_assert_eq!(offset_of!(FeatureHeader, microarch), 0);
const_assert_eq!(offset_of!(FeatureHeader, vendor), 2);
const_assert_eq!(offset_of!(FeatureHeader, max_phys_addr_width), 3);
const_assert_eq!(offset_of!(FeatureHeader, max_linear_addr_width), 4);

/// Architecture-generic feature record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureRecord {
    X86(FeatureRecordX86),
    ArmV8(FeatureRecordArmV8),
}

impl FeatureRecord {
    pub const fn header(&self) -> &FeatureHeader {
        match self {
            Self::X86(rec) => &rec.header,
            Self::ArmV8(rec) => &rec.header,
        }
    }

    pub const fn architecture(&self) -> Architecture {
        match self {
            Self::X86(_) => Architecture::X86,
            Self::ArmV8(_) => Architecture::Arm,
        }
    }

    pub const fn vendor(&self) -> VendorId {
        self.header().vendor
    }

    pub const fn microarch(&self) -> Microarch {
        self.header().microarch
    }

    pub const fn as_x86(&self) -> Option<&FeatureRecordX86> {
        match self {
            Self::X86(rec) => Some(rec),
            Self::ArmV8(_) => None,
        }
    }

    pub const fn as_arm(&self) -> Option<&FeatureRecordArmV8> {
        match self {
            Self::ArmV8(rec) => Some(rec),
            Self::X86(_) => None,
        }
    }

    /// Number of flags set.
    pub fn flag_count(&self) -> usize {
        match self {
            Self::X86(rec) => rec.flags.count(),
            Self::ArmV8(rec) => rec.flags.count(),
        }
    }

    pub fn to_raw(&self) -> RawFeatureRecord {
        RawFeatureRecord::encode(self)
    }
}

impl From<FeatureRecordX86> for FeatureRecord {
    fn from(rec: FeatureRecordX86) -> Self {
        Self::X86(rec)
    }
}

impl From<FeatureRecordArmV8> for FeatureRecord {
    fn from(rec: FeatureRecordArmV8) -> Self {
        Self::ArmV8(rec)
    }
}

/// The 64-byte binary form of either extension, little-endian.
///
/// Mirrors the in-memory `#[repr(C)]` layout field by field, padding bytes
/// written as zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawFeatureRecord(pub [u8; FEATURE_RECORD_SIZE]);

impl RawFeatureRecord {
    const X86_WORDS_OFFSET: usize = offset_of!(FeatureRecordX86, flags);
    const ARM_WORDS_OFFSET: usize = offset_of!(FeatureRecordArmV8, flags);

    pub fn encode(record: &FeatureRecord) -> Self {
        let mut b = [0u8; FEATURE_RECORD_SIZE];
        let hdr = record.header();
        b[0..2].copy_from_slice(&u16::from(hdr.microarch).to_le_bytes());
        b[2] = u8::from(hdr.vendor);
        b[3] = hdr.max_phys_addr_width;
        b[4] = hdr.max_linear_addr_width;
        match record {
            FeatureRecord::X86(rec) => {
                b[6] = rec.family;
                b[7] = rec.model;
                b[8] = rec.stepping;
                b[12..16].copy_from_slice(&rec.max_ext_state_size.to_le_bytes());
                b[16..20].copy_from_slice(&rec.max_asid.to_le_bytes());
                b[20..24].copy_from_slice(&rec.vmx_max_phys_addr_width.to_le_bytes());
                put_words(&mut b[Self::X86_WORDS_OFFSET..], rec.flags.words());
            }
            FeatureRecord::ArmV8(rec) => {
                b[6] = rec.implementer;
                b[7] = rec.variant;
                b[8..10].copy_from_slice(&rec.part_num.to_le_bytes());
                b[10] = rec.revision;
                b[11] = rec.breakpoints;
                b[12] = rec.watchpoints;
                b[13] = rec.ctx_cmps;
                put_words(&mut b[Self::ARM_WORDS_OFFSET..], rec.flags.words());
            }
        }
        Self(b)
    }

    /// Decodes the common header without knowing the architecture.
    pub fn header(&self) -> FeatureHeader {
        let b = &self.0;
        FeatureHeader {
            microarch: Microarch::from_raw(u16::from_le_bytes([b[0], b[1]])),
            vendor: VendorId::from_raw(b[2]),
            max_phys_addr_width: b[3],
            max_linear_addr_width: b[4],
        }
    }

    pub fn decode_x86(&self) -> FeatureRecordX86 {
        let b = &self.0;
        let mut rec = FeatureRecordX86 {
            header: self.header(),
            family: b[6],
            model: b[7],
            stepping: b[8],
            max_ext_state_size: read_u32(b, 12),
            max_asid: read_u32(b, 16),
            vmx_max_phys_addr_width: read_u32(b, 20),
            ..Default::default()
        };
        rec.flags = FeatureBits::from_words(get_words(&b[Self::X86_WORDS_OFFSET..]));
        rec
    }

    pub fn decode_arm(&self) -> FeatureRecordArmV8 {
        let b = &self.0;
        let mut rec = FeatureRecordArmV8 {
            header: self.header(),
            implementer: b[6],
            variant: b[7],
            part_num: u16::from_le_bytes([b[8], b[9]]),
            revision: b[10],
            breakpoints: b[11],
            watchpoints: b[12],
            ctx_cmps: b[13],
            ..Default::default()
        };
        rec.flags = FeatureBits::from_words(get_words(&b[Self::ARM_WORDS_OFFSET..]));
        rec
    }

    /// Decodes as the given architecture.
    pub fn decode(&self, arch: Architecture) -> Option<FeatureRecord> {
        match arch {
            Architecture::X86 => Some(FeatureRecord::X86(self.decode_x86())),
            Architecture::Arm => Some(FeatureRecord::ArmV8(self.decode_arm())),
            Architecture::Invalid | Architecture::Unknown => None,
        }
    }
}

impl core::fmt::Debug for RawFeatureRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("RawFeatureRecord").field(&self.header()).finish()
    }
}

fn read_u32(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn put_words(dst: &mut [u8], words: &[u64]) {
    for (chunk, word) in dst.chunks_exact_mut(8).zip(words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
}

fn get_words<const W: usize>(src: &[u8]) -> [u64; W] {
    let mut words = [0u64; W];
    for (word, chunk) in words.iter_mut().zip(src.chunks_exact(8)) {
        let mut le = [0u8; 8];
        le.copy_from_slice(chunk);
        *word = u64::from_le_bytes(le);
    }
    words
}
