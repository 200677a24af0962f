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

//! Capability snapshots.
//!
//! A snapshot is built through [`CapabilitySnapshotBuilder`] and becomes
//! immutable when frozen. The host snapshot is frozen once per process and
//! published to every reader:
//!
//! ```compile_fail
//! use cpum::{HostInitToken, RawProbeData, host_capability_init};
//!
//! let token = HostInitToken::acquire().unwrap();
//! let probe = RawProbeData::ArmV8 { id_regs: Vec::new() };
//! let _ = host_capability_init(token, &probe);
//! // The token was consumed by the first call.
//! let _ = host_capability_init(token, &probe);
//! ```

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Once;

use crate::cpudb::CpuDbEntry;
use crate::error::{ExplodeError, Result};
use crate::explode::{X86MsrProbe, explode_arm_v8, explode_x86_with_msrs};
use crate::features::FeatureRecord;
use crate::guest::{GuestCpuConfig, GuestCpuProfile};
use crate::idregs::{IdRegStore, IdRegValue};
use crate::leaves::{CpuidLeaf, CpuidLeafStore};
use crate::vendor::Architecture;

/// Raw values gathered by the boot-time probe of the running CPU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawProbeData {
    X86 {
        /// Sorted by (leaf, sub-leaf).
        leaves: Vec<CpuidLeaf>,
        msrs: Option<X86MsrProbe>,
    },
    ArmV8 {
        /// Sorted by register id.
        id_regs: Vec<IdRegValue>,
    },
}

impl RawProbeData {
    pub const fn architecture(&self) -> Architecture {
        match self {
            Self::X86 { .. } => Architecture::X86,
            Self::ArmV8 { .. } => Architecture::Arm,
        }
    }
}

#[derive(Debug)]
enum RawStore {
    X86 {
        leaves: CpuidLeafStore,
        msrs: Option<X86MsrProbe>,
    },
    ArmV8(IdRegStore),
}

#[derive(Debug)]
struct SnapshotData {
    record: FeatureRecord,
    raw: RawStore,
}

/// The mutable phase of a [`CapabilitySnapshot`].
#[derive(Debug)]
pub struct CapabilitySnapshotBuilder {
    data: SnapshotData,
}

impl CapabilitySnapshotBuilder {
    /// Explodes `probe` into a feature record.
    pub fn from_probe(probe: &RawProbeData) -> core::result::Result<Self, ExplodeError> {
        let data = match probe {
            RawProbeData::X86 { leaves, msrs } => {
                let leaves = CpuidLeafStore::from_sorted(leaves)?;
                let record = explode_x86_with_msrs(leaves.as_slice(), msrs.as_ref())?;
                SnapshotData {
                    record: record.into(),
                    raw: RawStore::X86 {
                        leaves,
                        msrs: *msrs,
                    },
                }
            }
            RawProbeData::ArmV8 { id_regs } => {
                let regs = IdRegStore::from_sorted(id_regs)?;
                let record = explode_arm_v8(regs.as_slice())?;
                SnapshotData {
                    record: record.into(),
                    raw: RawStore::ArmV8(regs),
                }
            }
        };
        Ok(Self { data })
    }

    pub fn record(&self) -> &FeatureRecord {
        &self.data.record
    }

    /// Adjusts the record before it is frozen.
    pub fn record_mut(&mut self) -> &mut FeatureRecord {
        &mut self.data.record
    }

    pub fn freeze(self) -> CapabilitySnapshot {
        let rec = &self.data.record;
        debug!(
            "capability snapshot frozen: {:?} {:?}, {} flags",
            rec.vendor(),
            rec.microarch(),
            rec.flag_count()
        );
        CapabilitySnapshot {
            inner: Arc::new(self.data),
        }
    }
}

/// An immutable feature record together with the probe data it came from.
///
/// Clones share the same data.
#[derive(Debug, Clone)]
pub struct CapabilitySnapshot {
    inner: Arc<SnapshotData>,
}

impl CapabilitySnapshot {
    pub fn as_feature_record(&self) -> &FeatureRecord {
        &self.inner.record
    }

    pub fn architecture(&self) -> Architecture {
        self.inner.record.architecture()
    }

    /// The probed CPUID leaves (x86 only).
    pub fn cpuid_leaves(&self) -> Option<&CpuidLeafStore> {
        match &self.inner.raw {
            RawStore::X86 { leaves, .. } => Some(leaves),
            RawStore::ArmV8(_) => None,
        }
    }

    /// The probed MSR values (x86 only).
    pub fn msr_probe(&self) -> Option<&X86MsrProbe> {
        match &self.inner.raw {
            RawStore::X86 { msrs, .. } => msrs.as_ref(),
            RawStore::ArmV8(_) => None,
        }
    }

    /// The probed ID registers (ARMv8 only).
    pub fn id_regs(&self) -> Option<&IdRegStore> {
        match &self.inner.raw {
            RawStore::ArmV8(regs) => Some(regs),
            RawStore::X86 { .. } => None,
        }
    }
}

static HOST_INIT_TAKEN: AtomicBool = AtomicBool::new(false);
static HOST_CAPABILITY: Once<CapabilitySnapshot> = Once::new();

/// The right to initialize the host snapshot.
///
/// At most one token exists per process and [`host_capability_init`] consumes
/// it, so the host snapshot can not be initialized twice.
#[derive(Debug)]
pub struct HostInitToken {
    _private: (),
}

impl HostInitToken {
    /// Returns the token on the first call, `None` afterwards.
    pub fn acquire() -> Option<Self> {
        HOST_INIT_TAKEN
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { _private: () })
    }
}

/// Explodes the host probe data and publishes the result as the process-wide
/// host snapshot.
///
/// On error the token is spent and the host snapshot stays unset.
pub fn host_capability_init(
    token: HostInitToken,
    probe: &RawProbeData,
) -> core::result::Result<&'static CapabilitySnapshot, ExplodeError> {
    let HostInitToken { .. } = token;
    let snapshot = CapabilitySnapshotBuilder::from_probe(probe)?.freeze();
    let snapshot = HOST_CAPABILITY.call_once(|| snapshot);
    let rec = snapshot.as_feature_record();
    info!(
        "host CPU: {:?} {:?}, {}-bit physical, {}-bit linear",
        rec.vendor(),
        rec.microarch(),
        rec.header().max_phys_addr_width,
        rec.header().max_linear_addr_width
    );
    Ok(snapshot)
}

/// The host snapshot, once [`host_capability_init`] has succeeded.
pub fn host_capability() -> Option<&'static CapabilitySnapshot> {
    HOST_CAPABILITY.get()
}

/// Builds a VM-owned guest feature record from a catalog entry.
pub fn guest_capability_from_db_entry(
    entry: &'static CpuDbEntry,
    overrides: &GuestCpuConfig,
) -> Result<FeatureRecord> {
    GuestCpuProfile::from_db_entry(entry, overrides).map(|profile| *profile.record())
}
