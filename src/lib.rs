#![cfg_attr(not(test), no_std)]
#![doc = include_str!("../README.md")]

#[macro_use]
extern crate log;

extern crate alloc;

mod error;
mod guest;
mod idregs;
mod leaves;
mod snapshot;
mod unknown_leaf;
mod vendor;
mod xstate;

pub mod cpudb;
pub mod explode;
pub mod features;
pub mod microarch;
pub mod msr;
pub mod saved_state;

#[cfg(test)]
mod tests;

pub use cpudb::{CpuDatabase, CpuDbEntry, CpuDbEntryType, MatchHint};
pub use error::{CpuDbError, CpumError, ExplodeError, Result, SavedStateError};
pub use explode::{X86MsrProbe, explode_arm_v8, explode_x86, explode_x86_with_msrs};
pub use features::{
    ArmFeature, FeatureHeader, FeatureRecord, FeatureRecordArmV8, FeatureRecordDiff,
    FeatureRecordX86, RawFeatureRecord, X86Feature,
};
pub use guest::{GuestCpuConfig, GuestCpuProfile, VcpuCpuidState};
pub use idregs::{
    IdRegStore, IdRegValue, IdRegister, Midr, check_reg_order, id_field, id_field_signed,
    lookup_reg,
};
pub use leaves::{
    CpuidLeaf, CpuidLeafCollection, CpuidLeafFlags, CpuidLeafStore, EXTENDED_LEAF_BASE,
    HYPERVISOR_LEAF_FIRST, HYPERVISOR_LEAF_LAST, LeafStoreReader, check_leaf_order, lookup_leaf,
};
pub use microarch::Microarch;
pub use snapshot::{
    CapabilitySnapshot, CapabilitySnapshotBuilder, HostInitToken, RawProbeData,
    guest_capability_from_db_entry, host_capability, host_capability_init,
};
pub use unknown_leaf::{UnknownCpuidPolicy, UnknownLeafResolver, resolve_unknown_leaf};
pub use vendor::{
    Architecture, VendorId, classify_arm_implementer, detect_x86_vendor, x86_vendor_string,
};
pub use xstate::{
    XSAVE_MIN_AREA_SIZE, XSTATE_LEAF, XSTATE_MAX_COMPONENT, XStateComponent, XStateInfo,
    apply_to_leaves,
};
