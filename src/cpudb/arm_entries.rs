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

//! ARMv8 reference CPUs.
//!
//! Register values without MIDR_EL1; each core variant supplies its own.

use super::{
    ArmCoreType, ArmCoreVariant, CpuDbEntry, CpuDbEntryArm, CpuDbEntryCommon, CpuDbEntryType,
    CpuDbFlags,
};
use crate::idregs::{IdRegValue, IdRegister, Midr};
use crate::microarch::Microarch;
use crate::vendor::VendorId;

const fn reg(reg: IdRegister, value: u64) -> IdRegValue {
    IdRegValue::new(reg, value)
}

const fn uniform(name: &'static str, midr: Midr) -> [ArmCoreVariant; 1] {
    [ArmCoreVariant {
        name,
        midr,
        core_type: ArmCoreType::Uniform,
        overrides: &[],
    }]
}

static APPLE_M1_REGS: &[IdRegValue] = {
    use IdRegister as R;
    &[
        reg(R::ID_AA64PFR0_EL1, 0x1101_0000_0011_0111),
        reg(R::ID_AA64PFR1_EL1, 0x0000_0000_0000_0020),
        reg(R::ID_AA64DFR0_EL1, 0x0000_0000_1030_5006),
        reg(R::ID_AA64ISAR0_EL1, 0x0021_1001_1021_2120),
        reg(R::ID_AA64ISAR1_EL1, 0x0000_0111_1021_1101),
        reg(R::ID_AA64MMFR0_EL1, 0x1000_0000_ff10_0023),
        reg(R::ID_AA64MMFR1_EL1, 0x0000_0000_1021_1120),
        reg(R::ID_AA64MMFR2_EL1, 0x1000_0101_0000_0011),
        reg(R::CTR_EL0, 0x0000_0000_8444_c004),
        reg(R::DCZID_EL0, 0x0000_0000_0000_0004),
    ]
};

pub(super) static APPLE_M1: CpuDbEntry = CpuDbEntry::Arm(CpuDbEntryArm {
    common: CpuDbEntryCommon {
        short_name: "Apple_M1",
        full_name: "Apple M1",
        vendor: VendorId::Apple,
        microarch: Microarch::Apple_M1,
        flags: CpuDbFlags::MULTI_CORE_VARIANTS,
        entry_type: CpuDbEntryType::Arm,
    },
    id_regs: APPLE_M1_REGS,
    variants: &[
        ArmCoreVariant {
            name: "Icestorm",
            midr: Midr::from_parts(0x61, 1, 0x022, 1),
            core_type: ArmCoreType::Efficiency,
            overrides: &[],
        },
        ArmCoreVariant {
            name: "Firestorm",
            midr: Midr::from_parts(0x61, 1, 0x023, 1),
            core_type: ArmCoreType::Performance,
            overrides: &[],
        },
    ],
});

static APPLE_M2_REGS: &[IdRegValue] = {
    use IdRegister as R;
    &[
        reg(R::ID_AA64PFR0_EL1, 0x1101_0000_0011_0111),
        reg(R::ID_AA64PFR1_EL1, 0x0000_0000_0000_0021),
        reg(R::ID_AA64DFR0_EL1, 0x0000_0000_1030_5006),
        reg(R::ID_AA64ISAR0_EL1, 0x0221_1001_1021_2120),
        reg(R::ID_AA64ISAR1_EL1, 0x0010_1111_1021_1101),
        reg(R::ID_AA64MMFR0_EL1, 0x1000_0000_ff10_0023),
        reg(R::ID_AA64MMFR1_EL1, 0x0000_0000_1021_1120),
        reg(R::ID_AA64MMFR2_EL1, 0x1000_0101_0000_0011),
        reg(R::CTR_EL0, 0x0000_0000_8444_c004),
        reg(R::DCZID_EL0, 0x0000_0000_0000_0004),
    ]
};

pub(super) static APPLE_M2: CpuDbEntry = CpuDbEntry::Arm(CpuDbEntryArm {
    common: CpuDbEntryCommon {
        short_name: "Apple_M2",
        full_name: "Apple M2",
        vendor: VendorId::Apple,
        microarch: Microarch::Apple_M2,
        flags: CpuDbFlags::MULTI_CORE_VARIANTS,
        entry_type: CpuDbEntryType::Arm,
    },
    id_regs: APPLE_M2_REGS,
    variants: &[
        ArmCoreVariant {
            name: "Blizzard",
            midr: Midr::from_parts(0x61, 1, 0x032, 1),
            core_type: ArmCoreType::Efficiency,
            overrides: &[],
        },
        ArmCoreVariant {
            name: "Avalanche",
            midr: Midr::from_parts(0x61, 1, 0x033, 1),
            core_type: ArmCoreType::Performance,
            overrides: &[],
        },
    ],
});

static APPLE_M3_REGS: &[IdRegValue] = {
    use IdRegister as R;
    &[
        reg(R::ID_AA64PFR0_EL1, 0x1101_0000_0011_0111),
        reg(R::ID_AA64PFR1_EL1, 0x0000_0000_0000_0021),
        reg(R::ID_AA64DFR0_EL1, 0x0000_0000_1030_5006),
        reg(R::ID_AA64ISAR0_EL1, 0x0221_1001_1021_2120),
        reg(R::ID_AA64ISAR1_EL1, 0x0010_1111_1021_1101),
        reg(R::ID_AA64ISAR2_EL1, 0x0000_0000_0000_0002),
        reg(R::ID_AA64MMFR0_EL1, 0x1000_0000_ff10_0023),
        reg(R::ID_AA64MMFR1_EL1, 0x0000_0000_1021_1120),
        reg(R::ID_AA64MMFR2_EL1, 0x1000_0101_0000_0011),
        reg(R::CTR_EL0, 0x0000_0000_8444_c004),
        reg(R::DCZID_EL0, 0x0000_0000_0000_0004),
    ]
};

pub(super) static APPLE_M3: CpuDbEntry = CpuDbEntry::Arm(CpuDbEntryArm {
    common: CpuDbEntryCommon {
        short_name: "Apple_M3",
        full_name: "Apple M3",
        vendor: VendorId::Apple,
        microarch: Microarch::Apple_M3,
        flags: CpuDbFlags::MULTI_CORE_VARIANTS,
        entry_type: CpuDbEntryType::Arm,
    },
    id_regs: APPLE_M3_REGS,
    variants: &[
        ArmCoreVariant {
            name: "Sawtooth",
            midr: Midr::from_parts(0x61, 0, 0x048, 0),
            core_type: ArmCoreType::Efficiency,
            overrides: &[],
        },
        ArmCoreVariant {
            name: "Everest",
            midr: Midr::from_parts(0x61, 0, 0x049, 0),
            core_type: ArmCoreType::Performance,
            overrides: &[],
        },
    ],
});

static SNAPDRAGON_X_REGS: &[IdRegValue] = {
    use IdRegister as R;
    &[
        reg(R::ID_AA64PFR0_EL1, 0x1101_0000_1111_1112),
        reg(R::ID_AA64PFR1_EL1, 0x0000_0000_0000_0021),
        reg(R::ID_AA64DFR0_EL1, 0x0000_0000_1030_5708),
        reg(R::ID_AA64ISAR0_EL1, 0x0221_1001_1021_2120),
        reg(R::ID_AA64ISAR1_EL1, 0x0011_1111_1021_1001),
        reg(R::ID_AA64ISAR2_EL1, 0x0000_0000_0000_4100),
        reg(R::ID_AA64MMFR0_EL1, 0x1000_0000_0010_1125),
        reg(R::ID_AA64MMFR1_EL1, 0x0000_0000_1021_2122),
        reg(R::ID_AA64MMFR2_EL1, 0x1011_0101_0000_1011),
        reg(R::CTR_EL0, 0x0000_0000_9444_c004),
        reg(R::DCZID_EL0, 0x0000_0000_0000_0004),
    ]
};

pub(super) static QUALCOMM_SNAPDRAGON_X: CpuDbEntry = CpuDbEntry::Arm(CpuDbEntryArm {
    common: CpuDbEntryCommon {
        short_name: "Qualcomm_Snapdragon_X",
        full_name: "Snapdragon(R) X Elite - X1E80100 - Qualcomm(R) Oryon(TM) CPU",
        vendor: VendorId::Qualcomm,
        microarch: Microarch::Qualcomm_Oryon,
        flags: CpuDbFlags::empty(),
        entry_type: CpuDbEntryType::Arm,
    },
    id_regs: SNAPDRAGON_X_REGS,
    variants: &uniform("Oryon", Midr::from_parts(0x51, 0, 0x001, 1)),
});

static RASPBERRY_PI_4_REGS: &[IdRegValue] = {
    use IdRegister as R;
    &[
        reg(R::ID_AA64PFR0_EL1, 0x0000_0000_0000_2222),
        reg(R::ID_AA64DFR0_EL1, 0x0000_0000_1030_5106),
        reg(R::ID_AA64ISAR0_EL1, 0x0000_0000_0001_1120),
        reg(R::ID_AA64MMFR0_EL1, 0x0000_0000_0000_1124),
        reg(R::CTR_EL0, 0x0000_0000_8444_c004),
        reg(R::DCZID_EL0, 0x0000_0000_0000_0004),
    ]
};

pub(super) static RASPBERRY_PI_4: CpuDbEntry = CpuDbEntry::Arm(CpuDbEntryArm {
    common: CpuDbEntryCommon {
        short_name: "RaspberryPi_4",
        full_name: "Broadcom BCM2711 (Cortex-A72)",
        vendor: VendorId::Arm,
        microarch: Microarch::Arm_Cortex_A72,
        flags: CpuDbFlags::empty(),
        entry_type: CpuDbEntryType::Arm,
    },
    id_regs: RASPBERRY_PI_4_REGS,
    variants: &uniform("Cortex-A72", Midr::from_parts(0x41, 0, 0xd08, 3)),
});

static AMPERE_ONE_REGS: &[IdRegValue] = {
    use IdRegister as R;
    &[
        reg(R::ID_AA64PFR0_EL1, 0x1101_0010_1111_1111),
        reg(R::ID_AA64PFR1_EL1, 0x0000_0000_0000_0021),
        reg(R::ID_AA64DFR0_EL1, 0x0000_0000_1030_5408),
        reg(R::ID_AA64ISAR0_EL1, 0x0221_1001_1021_2120),
        reg(R::ID_AA64ISAR1_EL1, 0x0011_1111_1021_1011),
        reg(R::ID_AA64MMFR0_EL1, 0x0000_0000_0010_1125),
        reg(R::ID_AA64MMFR1_EL1, 0x0000_0000_1021_2122),
        reg(R::ID_AA64MMFR2_EL1, 0x1011_0101_0000_1011),
        reg(R::CTR_EL0, 0x0000_0000_9444_c004),
        reg(R::DCZID_EL0, 0x0000_0000_0000_0004),
    ]
};

pub(super) static AMPERE_ONE: CpuDbEntry = CpuDbEntry::Arm(CpuDbEntryArm {
    common: CpuDbEntryCommon {
        short_name: "AmpereOne",
        full_name: "Ampere(R) AmpereOne(R) A192-32X",
        vendor: VendorId::Ampere,
        microarch: Microarch::Ampere_AmpereOne,
        flags: CpuDbFlags::SERVER,
        entry_type: CpuDbEntryType::Arm,
    },
    id_regs: AMPERE_ONE_REGS,
    variants: &uniform("AmpereOne", Midr::from_parts(0xc0, 0, 0xac3, 0)),
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ArmFeature;

    fn arm(entry: &'static CpuDbEntry) -> &'static CpuDbEntryArm {
        entry.as_arm().unwrap()
    }

    #[test]
    fn test_apple_generations() {
        let m1 = arm(&APPLE_M1).explode(1).unwrap();
        let m2 = arm(&APPLE_M2).explode(1).unwrap();
        let m3 = arm(&APPLE_M3).explode(1).unwrap();
        assert!(!m1.has(ArmFeature::Bf16) && m2.has(ArmFeature::Bf16));
        assert!(!m1.has(ArmFeature::Bti) && m2.has(ArmFeature::Bti));
        assert!(m2.has(ArmFeature::I8mm));
        assert!(!m2.has(ArmFeature::Wfxt) && m3.has(ArmFeature::Wfxt));
        assert_eq!(m1.header.max_phys_addr_width, 42);
        assert!(!m3.has(ArmFeature::Sve));
    }

    #[test]
    fn test_variant_midr() {
        let regs = arm(&APPLE_M2).id_regs_for(0).unwrap();
        assert_eq!(regs.get(IdRegister::MIDR_EL1), Some(0x611f_0321));
        assert!(arm(&APPLE_M2).id_regs.iter().all(|r| r.reg != IdRegister::MIDR_EL1));
    }

    #[test]
    fn test_cortex_a72() {
        let rec = arm(&RASPBERRY_PI_4).explode(0).unwrap();
        assert_eq!(rec.header.microarch, Microarch::Arm_Cortex_A72);
        assert_eq!(rec.header.max_phys_addr_width, 44);
        assert_eq!((rec.breakpoints, rec.watchpoints, rec.ctx_cmps), (6, 4, 2));
        assert!(rec.has(ArmFeature::Aes));
        assert!(!rec.has(ArmFeature::Pauth));
    }
}
