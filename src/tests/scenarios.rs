//! Probe data to feature record to guest view.

use bit_field::BitField;
use raw_cpuid::CpuIdResult;

use crate::cpudb::{
    CpuDatabase, CpuDbEntry, CpuDbEntryCommon, CpuDbEntryType, CpuDbEntryX86, CpuDbFlags,
    MIDR_EXACT_SCORE,
};
use crate::{
    CpuidLeaf, CpuidLeafStore, ExplodeError, GuestCpuConfig, GuestCpuProfile, Microarch, Midr,
    UnknownCpuidPolicy, UnknownLeafResolver, VcpuCpuidState, VendorId, X86Feature,
    classify_arm_implementer, explode_x86, guest_capability_from_db_entry,
};

const GENUINE_INTEL: [u32; 3] = [0x756e_6547, 0x6c65_746e, 0x4965_6e69];

fn leaf0(max: u32) -> CpuidLeaf {
    CpuidLeaf::simple(0, max, GENUINE_INTEL[0], GENUINE_INTEL[1], GENUINE_INTEL[2])
}

fn kaby_lake(long_mode: bool) -> [CpuidLeaf; 4] {
    let mut ext1_edx = 0u32;
    ext1_edx.set_bit(29, long_mode);
    [
        leaf0(0xd),
        CpuidLeaf::simple(1, 0x0009_06e9, 0x0010_0800, 0, 0),
        CpuidLeaf::simple(0x8000_0000, 0x8000_0001, 0, 0, 0),
        CpuidLeaf::simple(0x8000_0001, 0, 0, 0, ext1_edx),
    ]
}

#[test]
fn test_kaby_lake_explosion() {
    let rec = explode_x86(&kaby_lake(true)).unwrap();
    assert_eq!(rec.header.vendor, VendorId::Intel);
    assert_eq!((rec.family, rec.model, rec.stepping), (6, 0x9e, 9));
    assert_eq!(rec.header.microarch, Microarch::Intel_Core7_KabyLake);
    assert!(rec.has(X86Feature::LongMode));

    let rec = explode_x86(&kaby_lake(false)).unwrap();
    assert!(!rec.has(X86Feature::LongMode));
}

#[test]
fn test_explosion_is_idempotent() {
    let leaves = kaby_lake(true);
    let first = explode_x86(&leaves).unwrap();
    let second = explode_x86(&leaves).unwrap();
    assert_eq!(
        crate::FeatureRecord::X86(first).to_raw(),
        crate::FeatureRecord::X86(second).to_raw()
    );
}

#[test]
fn test_apple_m1_main_id() {
    let firestorm = Midr::from_parts(0x61, 1, 0x023, 1);
    assert_eq!(classify_arm_implementer(firestorm.implementer()), VendorId::Apple);
    let m = CpuDatabase.lookup_best_by_arm_main_id(firestorm).unwrap();
    assert_eq!(m.entry.short_name(), "Apple_M1");
    assert_eq!(m.score, MIDR_EXACT_SCORE);

    let rec = m.arm.explode(m.core_variant).unwrap();
    assert_eq!(rec.header.vendor, VendorId::Apple);
    assert_eq!(rec.header.microarch, Microarch::Apple_M1);
}

#[test]
fn test_missing_leaf1() {
    let leaves = [leaf0(0xd), CpuidLeaf::simple(0x8000_0000, 0x8000_0001, 0, 0, 0)];
    assert_eq!(
        explode_x86(&leaves),
        Err(ExplodeError::MissingBaselineLeaf { leaf: 1 })
    );
}

const NO_DEFAULTS: CpuIdResult = CpuIdResult {
    eax: 0,
    ebx: 0,
    ecx: 0,
    edx: 0,
};

static ECHO_LEAVES: &[CpuidLeaf] = &[
    CpuidLeaf::simple(0, 0x16, 0x756e_6547, 0x6c65_746e, 0x4965_6e69),
    CpuidLeaf::simple(1, 0x0009_06e9, 0x0010_0800, 0, 0),
    CpuidLeaf::simple(0x16, 1, 2, 0x55, 3),
];

static ECHO_ENTRY: CpuDbEntry = CpuDbEntry::X86(CpuDbEntryX86 {
    common: CpuDbEntryCommon {
        short_name: "Echo_Test",
        full_name: "Echo test CPU",
        vendor: VendorId::Intel,
        microarch: Microarch::Intel_Core7_KabyLake,
        flags: CpuDbFlags::SYNTHETIC,
        entry_type: CpuDbEntryType::X86,
    },
    family: 6,
    model: 0x9e,
    stepping: 9,
    bus_freq_hz: 0,
    max_phys_addr_width: 36,
    mxcsr_mask: 0xffff,
    leaves: ECHO_LEAVES,
    unknown_policy: UnknownCpuidPolicy::LastStandardLeafWithEcx,
    unknown_defaults: NO_DEFAULTS,
    msr_mask: u32::MAX,
    msr_ranges: &[],
});

#[test]
fn test_unknown_leaf_echo() {
    let store = CpuidLeafStore::from_sorted(ECHO_LEAVES).unwrap();
    let resolver =
        UnknownLeafResolver::new(UnknownCpuidPolicy::LastStandardLeafWithEcx, NO_DEFAULTS);
    let r = resolver.resolve(0x20, 7, store.last_standard_leaf(), None);
    assert_eq!([r.eax, r.ebx, r.ecx, r.edx], [1, 2, 7, 3]);

    let profile = GuestCpuProfile::from_db_entry(&ECHO_ENTRY, &GuestCpuConfig::new()).unwrap();
    let r = profile.query(&VcpuCpuidState::new(0, 0), 0x20, 7);
    assert_eq!([r.eax, r.ebx, r.ecx, r.edx], [1, 2, 7, 3]);
}

#[test]
fn test_guest_records_are_independent() {
    let entry = CpuDatabase
        .lookup_by_exact_name("AMD_Ryzen_5_3600X", CpuDbEntryType::X86)
        .unwrap();
    let a = guest_capability_from_db_entry(entry, &GuestCpuConfig::new()).unwrap();
    let b = guest_capability_from_db_entry(entry, &GuestCpuConfig::new().hide_x86(X86Feature::Avx2))
        .unwrap();
    assert!(a.as_x86().unwrap().has(X86Feature::Avx2));
    assert!(!b.as_x86().unwrap().has(X86Feature::Avx2));
    assert_eq!(a.microarch(), Microarch::AMD_Zen2);
}
