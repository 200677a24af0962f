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

//! Versioned saved-state form of feature records.
//!
//! Each architecture has its own version line. A loader accepts every version
//! up to its own and resets the fields an older layout did not carry to safe
//! minimums.

use crate::error::SavedStateError;
use crate::features::{
    ARM_V9_FIRST_BIT, FEATURE_RECORD_SIZE, FeatureRecord, RawFeatureRecord, X86_VIRT_FIRST_BIT,
    X86Feature,
};
use crate::vendor::Architecture;
use crate::xstate::XSAVE_MIN_AREA_SIZE;

/// Baseline flags (words 0..=2) only.
pub const CPUM_SAVED_STATE_VERSION_X86_V1: u32 = 1;
/// Adds the VMX/SVM groups (words 3..=4) and the ASID count.
pub const CPUM_SAVED_STATE_VERSION_X86_V2: u32 = 2;
/// Adds the VMX physical width and the extended state size.
pub const CPUM_SAVED_STATE_VERSION_X86_V3: u32 = 3;
pub const CPUM_SAVED_STATE_VERSION_X86: u32 = CPUM_SAVED_STATE_VERSION_X86_V3;

/// Baseline and Armv8.x flags (words 0..=2).
pub const CPUM_SAVED_STATE_VERSION_ARMV8_V1: u32 = 1;
/// Adds the Armv9 flags (words 3..=5) and the context-compare count.
pub const CPUM_SAVED_STATE_VERSION_ARMV8_V2: u32 = 2;
pub const CPUM_SAVED_STATE_VERSION_ARMV8: u32 = CPUM_SAVED_STATE_VERSION_ARMV8_V2;

/// Narrowest physical address width VMX structures may be limited to.
const VMX_MIN_PHYS_ADDR_WIDTH: u32 = 32;

/// A feature record as written into a saved state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedFeatureRecord {
    pub arch: Architecture,
    pub version: u32,
    pub bytes: [u8; FEATURE_RECORD_SIZE],
}

/// Current saved-state version of `arch`, 0 when it has none.
pub const fn current_version(arch: Architecture) -> u32 {
    match arch {
        Architecture::X86 => CPUM_SAVED_STATE_VERSION_X86,
        Architecture::Arm => CPUM_SAVED_STATE_VERSION_ARMV8,
        Architecture::Invalid | Architecture::Unknown => 0,
    }
}

/// Encodes `record` with the current layout of its architecture.
pub fn save(record: &FeatureRecord) -> SavedFeatureRecord {
    let arch = record.architecture();
    SavedFeatureRecord {
        arch,
        version: current_version(arch),
        bytes: record.to_raw().0,
    }
}

/// Decodes a saved record. Versions run from 1 up to the current one.
pub fn load(saved: &SavedFeatureRecord) -> Result<FeatureRecord, SavedStateError> {
    let current = current_version(saved.arch);
    if current == 0 {
        return Err(SavedStateError::ArchitectureMismatch);
    }
    if saved.version == 0 || saved.version > current {
        return Err(SavedStateError::UnsupportedVersion {
            version: saved.version,
            current,
        });
    }

    let raw = RawFeatureRecord(saved.bytes);
    let vendor = raw.header().vendor;
    let consistent = match saved.arch {
        Architecture::X86 => !vendor.is_arm(),
        _ => !vendor.is_x86(),
    };
    if !consistent {
        return Err(SavedStateError::ArchitectureMismatch);
    }

    let mut record = raw
        .decode(saved.arch)
        .ok_or(SavedStateError::ArchitectureMismatch)?;
    if saved.version < current {
        warn!(
            "loading {:?} feature record version {} (current {})",
            saved.arch, saved.version, current
        );
        upgrade(&mut record, saved.version);
    }
    Ok(record)
}

/// Like [`load`], rejecting records of any architecture but `arch`.
pub fn load_for(
    saved: &SavedFeatureRecord,
    arch: Architecture,
) -> Result<FeatureRecord, SavedStateError> {
    if saved.arch != arch {
        return Err(SavedStateError::ArchitectureMismatch);
    }
    load(saved)
}

fn upgrade(record: &mut FeatureRecord, version: u32) {
    match record {
        FeatureRecord::X86(rec) => {
            if version < CPUM_SAVED_STATE_VERSION_X86_V2 {
                rec.flags.truncate_words(X86_VIRT_FIRST_BIT / 64);
                rec.max_asid = 0;
            }
            if version < CPUM_SAVED_STATE_VERSION_X86_V3 {
                rec.vmx_max_phys_addr_width = if rec.has(X86Feature::Vmx) {
                    VMX_MIN_PHYS_ADDR_WIDTH
                } else {
                    0
                };
                rec.max_ext_state_size = if rec.has(X86Feature::Xsave) {
                    XSAVE_MIN_AREA_SIZE
                } else {
                    0
                };
            }
        }
        FeatureRecord::ArmV8(rec) => {
            if version < CPUM_SAVED_STATE_VERSION_ARMV8_V2 {
                rec.flags.truncate_words(ARM_V9_FIRST_BIT / 64);
                rec.ctx_cmps = 0;
            }
        }
    }
}
