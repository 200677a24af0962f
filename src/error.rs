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

//! Error types.

use core::fmt;

use crate::idregs::IdRegister;

/// Errors raised while turning raw probe data into a feature record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplodeError {
    /// A mandatory CPUID leaf (0 or 1) is absent.
    MissingBaselineLeaf { leaf: u32 },
    /// A mandatory ARMv8 ID register is absent.
    MissingBaselineRegister { reg: IdRegister },
    /// The input is not sorted by (leaf, sub-leaf) / register id, or contains duplicates.
    /// `index` is the position of the first offending entry.
    InconsistentLeafOrder { index: usize },
    /// The probe data contradicts itself for this architecture.
    UnsupportedArchitectureVariant(&'static str),
}

impl fmt::Display for ExplodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingBaselineLeaf { leaf } => {
                write!(f, "mandatory CPUID leaf {leaf:#x} is missing")
            }
            Self::MissingBaselineRegister { reg } => {
                write!(f, "mandatory ID register {reg:?} is missing")
            }
            Self::InconsistentLeafOrder { index } => {
                write!(f, "probe entries are unsorted or duplicated at index {index}")
            }
            Self::UnsupportedArchitectureVariant(why) => {
                write!(f, "unsupported architecture variant: {why}")
            }
        }
    }
}

impl core::error::Error for ExplodeError {}

/// Errors concerning the CPU database and MIDR values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuDbError {
    /// RES0 bits of a MIDR_EL1 value are set.
    MalformedMidr(u64),
    /// The MSR ranges of an entry are not sorted by their first index.
    UnsortedMsrRanges { entry: &'static str, index: usize },
    /// Two MSR ranges of an entry overlap, or a range ends before it starts.
    OverlappingMsrRanges { entry: &'static str, index: usize },
    /// An ARM entry declares more than two core variants.
    TooManyCoreVariants { entry: &'static str },
    /// A guest-facing entry uses the host-only `PassThrough` unknown-leaf policy.
    PassThroughInGuestEntry { entry: &'static str },
    /// Two catalog entries share a short name.
    DuplicateShortName(&'static str),
    /// The probe data of an entry does not explode.
    Explode {
        entry: &'static str,
        error: ExplodeError,
    },
}

impl fmt::Display for CpuDbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedMidr(midr) => write!(f, "malformed MIDR_EL1 value {midr:#x}"),
            Self::UnsortedMsrRanges { entry, index } => {
                write!(f, "{entry}: MSR range #{index} is out of order")
            }
            Self::OverlappingMsrRanges { entry, index } => {
                write!(f, "{entry}: MSR range #{index} overlaps its predecessor")
            }
            Self::TooManyCoreVariants { entry } => {
                write!(f, "{entry}: more than two core variants")
            }
            Self::PassThroughInGuestEntry { entry } => {
                write!(f, "{entry}: PassThrough unknown-leaf policy is host-only")
            }
            Self::DuplicateShortName(name) => write!(f, "duplicate short name {name}"),
            Self::Explode { entry, error } => write!(f, "{entry}: {error}"),
        }
    }
}

impl core::error::Error for CpuDbError {}

/// Errors raised when restoring a saved feature record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavedStateError {
    /// The record was written by a newer layout than this build understands,
    /// or carries the invalid version 0.
    UnsupportedVersion { version: u32, current: u32 },
    /// The record belongs to the other architecture.
    ArchitectureMismatch,
}

impl fmt::Display for SavedStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion { version, current } => write!(
                f,
                "saved-state version {version} is not in the supported range 1..={current}"
            ),
            Self::ArchitectureMismatch => write!(f, "saved state is for another architecture"),
        }
    }
}

impl core::error::Error for SavedStateError {}

/// The crate-level error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpumError {
    Explode(ExplodeError),
    CpuDb(CpuDbError),
    SavedState(SavedStateError),
}

impl fmt::Display for CpumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explode(err) => write!(f, "feature explosion failed: {err}"),
            Self::CpuDb(err) => write!(f, "CPU database: {err}"),
            Self::SavedState(err) => write!(f, "saved state: {err}"),
        }
    }
}

impl core::error::Error for CpumError {}

impl From<ExplodeError> for CpumError {
    fn from(err: ExplodeError) -> Self {
        Self::Explode(err)
    }
}

impl From<CpuDbError> for CpumError {
    fn from(err: CpuDbError) -> Self {
        Self::CpuDb(err)
    }
}

impl From<SavedStateError> for CpumError {
    fn from(err: SavedStateError) -> Self {
        Self::SavedState(err)
    }
}

/// Result alias used across the crate.
pub type Result<T> = core::result::Result<T, CpumError>;
