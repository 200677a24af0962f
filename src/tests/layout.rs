//! Binary layout of the feature records.

use core::mem::size_of;

use crate::features::FEATURE_RECORD_SIZE;
use crate::{
    CpuidLeaf, FeatureRecordArmV8, FeatureRecordX86, VendorId, detect_x86_vendor,
    x86_vendor_string,
};

#[test]
fn test_record_size() {
    assert_eq!(size_of::<FeatureRecordX86>(), FEATURE_RECORD_SIZE);
    assert_eq!(size_of::<FeatureRecordArmV8>(), FEATURE_RECORD_SIZE);
    assert_eq!(size_of::<CpuidLeaf>(), 32);
}

#[test]
fn test_record_offsets() {
    use memoffset::offset_of;

    assert_eq!(offset_of!(FeatureRecordX86, header), 0);
    assert_eq!(offset_of!(FeatureRecordArmV8, header), 0);

    macro_rules! assert_x86_offset {
        ($field:ident, $offset:expr) => {
            assert_eq!(offset_of!(FeatureRecordX86, $field), $offset);
        };
    }

    macro_rules! assert_arm_offset {
        ($field:ident, $offset:expr) => {
            assert_eq!(offset_of!(FeatureRecordArmV8, $field), $offset);
        };
    }

    assert_x86_offset!(family, 0x06);
    assert_x86_offset!(model, 0x07);
    assert_x86_offset!(stepping, 0x08);
    assert_x86_offset!(max_ext_state_size, 0x0C);
    assert_x86_offset!(max_asid, 0x10);
    assert_x86_offset!(vmx_max_phys_addr_width, 0x14);
    assert_x86_offset!(flags, 0x18);

    assert_arm_offset!(implementer, 0x06);
    assert_arm_offset!(variant, 0x07);
    assert_arm_offset!(part_num, 0x08);
    assert_arm_offset!(revision, 0x0A);
    assert_arm_offset!(breakpoints, 0x0B);
    assert_arm_offset!(watchpoints, 0x0C);
    assert_arm_offset!(ctx_cmps, 0x0D);
    assert_arm_offset!(flags, 0x10);
}

#[test]
fn test_vendor_string_round_trip() {
    for (name, vendor) in [
        (b"GenuineIntel", VendorId::Intel),
        (b"AuthenticAMD", VendorId::Amd),
        (b"HygonGenuine", VendorId::Hygon),
        (b"CentaurHauls", VendorId::Via),
    ] {
        let word = |i: usize| u32::from_le_bytes([name[i], name[i + 1], name[i + 2], name[i + 3]]);
        let (ebx, edx, ecx) = (word(0), word(4), word(8));
        assert_eq!(detect_x86_vendor(0, ebx, ecx, edx), vendor);
        assert_eq!(&x86_vendor_string(ebx, ecx, edx), name);
    }
    let word = |s: &[u8; 4]| u32::from_le_bytes(*s);
    assert_eq!(
        detect_x86_vendor(0, word(b"Notv"), word(b"dor!"), word(b"Aven")),
        VendorId::Unknown
    );
}
