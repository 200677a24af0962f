//! The process-wide host snapshot.
//!
//! This is the only test that acquires the host init token.

use std::thread;

use crate::{
    ArmFeature, Architecture, GuestCpuConfig, GuestCpuProfile, HostInitToken, IdRegValue,
    IdRegister, RawProbeData, VendorId, host_capability, host_capability_init,
};

fn cortex_a72_probe() -> RawProbeData {
    RawProbeData::ArmV8 {
        id_regs: vec![
            IdRegValue::new(IdRegister::MIDR_EL1, 0x410f_d083),
            IdRegValue::new(IdRegister::ID_AA64PFR0_EL1, 0x1122),
            IdRegValue::new(IdRegister::ID_AA64ISAR0_EL1, 0x0001_1120),
            IdRegValue::new(IdRegister::ID_AA64MMFR0_EL1, 0x1124),
        ],
    }
}

#[test]
fn test_host_init_once() {
    assert!(host_capability().is_none());
    let token = HostInitToken::acquire().unwrap();
    assert!(HostInitToken::acquire().is_none());

    let host = host_capability_init(token, &cortex_a72_probe()).unwrap();
    assert_eq!(host.architecture(), Architecture::Arm);
    assert_eq!(host.as_feature_record().vendor(), VendorId::Arm);

    let readers: Vec<_> = (0..4)
        .map(|_| {
            thread::spawn(|| {
                let snapshot = host_capability().unwrap();
                *snapshot.as_feature_record()
            })
        })
        .collect();
    for reader in readers {
        assert_eq!(reader.join().unwrap(), *host.as_feature_record());
    }

    let rec = host.as_feature_record().as_arm().unwrap();
    assert!(rec.has(ArmFeature::El2));
    assert!(rec.has(ArmFeature::Aes));
    assert_eq!(rec.header.max_phys_addr_width, 44);

    let guest = GuestCpuProfile::from_host(host, &GuestCpuConfig::new()).unwrap();
    let grec = guest.record().as_arm().unwrap();
    assert!(!grec.has(ArmFeature::El2));
    assert!(grec.has(ArmFeature::Aes));
    // The host snapshot is untouched.
    assert!(host_capability().unwrap().as_feature_record().as_arm().unwrap().has(ArmFeature::El2));
}
