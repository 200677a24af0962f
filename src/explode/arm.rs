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

//! ARMv8 ID register explosion.

use bit_field::BitField;

use crate::error::ExplodeError;
use crate::features::{ArmFeature, FeatureHeader, FeatureRecordArmV8};
use crate::idregs::{
    IdRegStore, IdRegValue, IdRegister, Midr, check_reg_order, id_field, lookup_reg,
};
use crate::microarch::determine_arm_microarch;
use crate::vendor::classify_arm_implementer;

/// Physical address width assumed when ID_AA64MMFR0_EL1 is absent.
pub const DEFAULT_PHYS_ADDR_WIDTH: u8 = 32;
/// Linear address width assumed when ID_AA64MMFR2_EL1 is absent.
pub const DEFAULT_LINEAR_ADDR_WIDTH: u8 = 48;

const PFR0: IdRegister = IdRegister::ID_AA64PFR0_EL1;
const PFR1: IdRegister = IdRegister::ID_AA64PFR1_EL1;
const PFR2: IdRegister = IdRegister::ID_AA64PFR2_EL1;
const ZFR0: IdRegister = IdRegister::ID_AA64ZFR0_EL1;
const SMFR0: IdRegister = IdRegister::ID_AA64SMFR0_EL1;
const DFR0: IdRegister = IdRegister::ID_AA64DFR0_EL1;
const DFR1: IdRegister = IdRegister::ID_AA64DFR1_EL1;
const ISAR0: IdRegister = IdRegister::ID_AA64ISAR0_EL1;
const ISAR1: IdRegister = IdRegister::ID_AA64ISAR1_EL1;
const ISAR2: IdRegister = IdRegister::ID_AA64ISAR2_EL1;
const MMFR0: IdRegister = IdRegister::ID_AA64MMFR0_EL1;
const MMFR1: IdRegister = IdRegister::ID_AA64MMFR1_EL1;
const MMFR2: IdRegister = IdRegister::ID_AA64MMFR2_EL1;
const MMFR3: IdRegister = IdRegister::ID_AA64MMFR3_EL1;

/// A flag implied by an ID register field reaching `min`.
struct FieldRule {
    reg: IdRegister,
    shift: u8,
    width: u8,
    /// Signed fields use 0xf for "not implemented".
    signed: bool,
    min: i8,
    feature: ArmFeature,
}

impl FieldRule {
    fn holds(&self, value: u64) -> bool {
        let shift = self.shift as usize;
        let raw = value.get_bits(shift..shift + self.width as usize) as u8;
        let field = if self.signed {
            ((raw << 4) as i8) >> 4
        } else {
            raw as i8
        };
        field >= self.min
    }

    /// `value` with the field set just below `min`.
    fn lower(&self, mut value: u64) -> u64 {
        let shift = self.shift as usize;
        let below = (self.min - 1) as u8 as u64 & ((1 << self.width) - 1);
        value.set_bits(shift..shift + self.width as usize, below);
        value
    }
}

const fn u(reg: IdRegister, shift: u8, min: i8, feature: ArmFeature) -> FieldRule {
    FieldRule {
        reg,
        shift,
        width: 4,
        signed: false,
        min,
        feature,
    }
}

const fn s(reg: IdRegister, shift: u8, min: i8, feature: ArmFeature) -> FieldRule {
    FieldRule {
        reg,
        shift,
        width: 4,
        signed: true,
        min,
        feature,
    }
}

const fn b(reg: IdRegister, bit: u8, feature: ArmFeature) -> FieldRule {
    FieldRule {
        reg,
        shift: bit,
        width: 1,
        signed: false,
        min: 1,
        feature,
    }
}

static FIELD_RULES: &[FieldRule] = {
    use ArmFeature::*;
    &[
        u(PFR0, 0, 2, El0Aarch32),
        u(PFR0, 4, 2, El1Aarch32),
        u(PFR0, 8, 1, El2),
        u(PFR0, 12, 1, El3),
        s(PFR0, 16, 0, Fp),
        s(PFR0, 16, 1, Fp16),
        s(PFR0, 20, 0, AdvSimd),
        s(PFR0, 20, 1, Fp16),
        u(PFR0, 24, 1, Gicv3),
        u(PFR0, 24, 3, Gicv4p1),
        u(PFR0, 28, 1, Ras),
        u(PFR0, 28, 2, Rasv1p1),
        u(PFR0, 32, 1, Sve),
        u(PFR0, 36, 1, Sel2),
        u(PFR0, 40, 1, Mpam),
        u(PFR0, 44, 1, Amuv1),
        u(PFR0, 44, 2, Amuv1p1),
        u(PFR0, 48, 1, Dit),
        u(PFR0, 52, 1, Rme),
        u(PFR0, 56, 1, Csv2),
        u(PFR0, 56, 2, Csv22),
        u(PFR0, 56, 3, Csv23),
        u(PFR0, 60, 1, Csv3),
        u(PFR1, 0, 1, Bti),
        u(PFR1, 4, 1, Ssbs),
        u(PFR1, 4, 2, Ssbs2),
        u(PFR1, 8, 1, Mte),
        u(PFR1, 8, 2, Mte2),
        u(PFR1, 8, 3, Mte3),
        u(PFR1, 24, 1, Sme),
        u(PFR1, 24, 2, Sme2),
        u(PFR1, 28, 1, RngTrap),
        u(PFR1, 36, 1, Nmi),
        u(PFR1, 44, 1, Gcs),
        u(PFR1, 48, 1, The),
        u(PFR1, 56, 1, Df2),
        u(PFR1, 60, 1, Pfar),
        u(PFR2, 0, 1, MtePerm),
        u(PFR2, 4, 1, MteStoreOnly),
        u(PFR2, 8, 1, Mtefar),
        u(PFR2, 32, 1, Fpmr),
        u(ISAR0, 4, 1, Aes),
        u(ISAR0, 4, 2, Pmull),
        u(ISAR0, 8, 1, Sha1),
        u(ISAR0, 12, 1, Sha256),
        u(ISAR0, 12, 2, Sha512),
        u(ISAR0, 16, 1, Crc32),
        u(ISAR0, 20, 2, Lse),
        u(ISAR0, 20, 3, Lse128),
        u(ISAR0, 24, 1, Tme),
        u(ISAR0, 28, 1, Rdm),
        u(ISAR0, 32, 1, Sha3),
        u(ISAR0, 36, 1, Sm3),
        u(ISAR0, 40, 1, Sm4),
        u(ISAR0, 44, 1, Dotprod),
        u(ISAR0, 48, 1, Fhm),
        u(ISAR0, 52, 1, Flagm),
        u(ISAR0, 52, 2, Flagm2),
        u(ISAR0, 56, 1, Tlbios),
        u(ISAR0, 56, 2, Tlbirange),
        u(ISAR0, 60, 1, Rng),
        u(ISAR1, 0, 1, Dpb),
        u(ISAR1, 0, 2, Dpb2),
        u(ISAR1, 4, 1, Pacqarma5),
        u(ISAR1, 8, 1, Pacimp),
        u(ISAR1, 12, 1, Jscvt),
        u(ISAR1, 16, 1, Fcma),
        u(ISAR1, 20, 1, Lrcpc),
        u(ISAR1, 20, 2, Lrcpc2),
        u(ISAR1, 20, 3, Lrcpc3),
        u(ISAR1, 32, 1, Frintts),
        u(ISAR1, 36, 1, Sb),
        u(ISAR1, 40, 1, Specres),
        u(ISAR1, 40, 2, Specres2),
        u(ISAR1, 44, 1, Bf16),
        u(ISAR1, 44, 2, Ebf16),
        u(ISAR1, 48, 1, Dgh),
        u(ISAR1, 52, 1, I8mm),
        u(ISAR1, 56, 1, Xs),
        u(ISAR1, 60, 1, Ls64),
        u(ISAR1, 60, 2, Ls64V),
        u(ISAR1, 60, 3, Ls64Accdata),
        u(ISAR2, 0, 2, Wfxt),
        u(ISAR2, 4, 1, Rpres),
        u(ISAR2, 12, 1, Pacqarma3),
        u(ISAR2, 16, 1, Mops),
        u(ISAR2, 20, 1, Hbc),
        u(ISAR2, 24, 1, ConstPacField),
        u(ISAR2, 28, 1, Clrbhb),
        u(ISAR2, 32, 1, Sysreg128),
        u(ISAR2, 36, 1, Sysinstr128),
        u(ISAR2, 40, 1, Prfmslc),
        u(ISAR2, 48, 1, Rprfm),
        u(ISAR2, 52, 1, Cssc),
        u(ISAR2, 56, 1, Lut),
        u(ISAR2, 60, 1, Ats1a),
        u(MMFR0, 0, 6, Lpa),
        u(MMFR0, 4, 2, Asid16),
        u(MMFR0, 8, 1, MixedEndian),
        u(MMFR0, 16, 1, MixedEndianEl0),
        u(MMFR0, 20, 1, Tgran16),
        u(MMFR0, 20, 2, Lpa2),
        s(MMFR0, 24, 0, Tgran64),
        s(MMFR0, 28, 0, Tgran4),
        s(MMFR0, 28, 1, Lpa2),
        u(MMFR0, 44, 1, Exs),
        u(MMFR0, 56, 1, Fgt),
        u(MMFR0, 56, 2, Fgt2),
        u(MMFR0, 60, 1, Ecv),
        u(MMFR0, 60, 2, Ecv2),
        u(MMFR1, 0, 1, Haf),
        u(MMFR1, 0, 2, Hafdbs),
        u(MMFR1, 0, 3, Haft),
        u(MMFR1, 4, 2, Vmid16),
        u(MMFR1, 8, 1, Vhe),
        u(MMFR1, 12, 1, Hpds),
        u(MMFR1, 12, 2, Hpds2),
        u(MMFR1, 16, 1, Lor),
        u(MMFR1, 20, 1, Pan),
        u(MMFR1, 20, 2, Pan2),
        u(MMFR1, 20, 3, Pan3),
        u(MMFR1, 28, 1, Xnx),
        u(MMFR1, 32, 1, Twed),
        u(MMFR1, 36, 2, Ets2),
        u(MMFR1, 40, 1, Hcx),
        u(MMFR1, 44, 1, Afp),
        u(MMFR1, 48, 1, Ntlbpa),
        u(MMFR1, 52, 1, Tidcp1),
        u(MMFR1, 56, 1, Cmow),
        u(MMFR1, 60, 1, Ecbhb),
        u(MMFR2, 0, 1, Ttcnp),
        u(MMFR2, 4, 1, Uao),
        u(MMFR2, 8, 1, Lsmaoc),
        u(MMFR2, 12, 1, Iesb),
        u(MMFR2, 16, 1, Lva),
        u(MMFR2, 16, 2, Lva3),
        u(MMFR2, 20, 1, Ccidx),
        u(MMFR2, 24, 1, Nv),
        u(MMFR2, 24, 2, Nv2),
        u(MMFR2, 28, 1, Ttst),
        u(MMFR2, 32, 1, Lse2),
        u(MMFR2, 36, 1, Ids),
        u(MMFR2, 40, 1, S2fwb),
        u(MMFR2, 48, 1, Ttl),
        u(MMFR2, 52, 1, Bbm),
        u(MMFR2, 56, 1, Evt),
        u(MMFR2, 60, 1, E0pd),
        u(MMFR3, 0, 1, Tcr2),
        u(MMFR3, 4, 1, Sctlr2),
        u(MMFR3, 8, 1, S1pie),
        u(MMFR3, 12, 1, S2pie),
        u(MMFR3, 16, 1, S1poe),
        u(MMFR3, 20, 1, S2poe),
        u(MMFR3, 24, 1, Aie),
        u(MMFR3, 28, 1, Mec),
        u(MMFR3, 32, 1, D128),
        u(MMFR3, 44, 1, Anerr),
        u(MMFR3, 48, 1, Snerr),
        u(MMFR3, 52, 1, Sderr),
        u(MMFR3, 56, 1, Aderr),
        u(MMFR3, 60, 1, SpecFpacc),
        u(DFR0, 0, 8, Debugv8p2),
        u(DFR0, 0, 9, Debugv8p4),
        u(DFR0, 0, 10, Debugv8p8),
        u(DFR0, 0, 11, Debugv8p9),
        u(DFR0, 4, 1, Ete),
        u(DFR0, 16, 1, Pmuv3Ss),
        u(DFR0, 24, 1, Sebep),
        u(DFR0, 32, 1, Spe),
        u(DFR0, 32, 2, Spev1p1),
        u(DFR0, 32, 3, Spev1p2),
        s(DFR0, 36, 0, DoubleLock),
        u(DFR0, 40, 1, Trf),
        u(DFR0, 44, 1, Trbe),
        u(DFR0, 44, 2, TrbeExt),
        s(DFR0, 48, 1, Mtpmu),
        u(DFR0, 52, 1, Brbe),
        u(DFR0, 52, 2, Brbev1p1),
        u(DFR0, 60, 1, Hpmn0),
        u(DFR1, 32, 1, Spmu),
        u(DFR1, 36, 1, Pmuv3Icntr),
        u(DFR1, 44, 1, Ite),
        u(DFR1, 48, 1, Ebep),
        u(ZFR0, 0, 1, Sve2),
        u(ZFR0, 0, 2, Sve2p1),
        u(ZFR0, 4, 1, SveAes),
        u(ZFR0, 4, 2, SvePmull128),
        u(ZFR0, 16, 1, SveBitperm),
        u(ZFR0, 20, 1, SveBf16),
        u(ZFR0, 20, 2, SveEbf16),
        u(ZFR0, 24, 1, SveB16b16),
        u(ZFR0, 32, 1, SveSha3),
        u(ZFR0, 40, 1, SveSm4),
        u(ZFR0, 44, 1, SveI8mm),
        u(ZFR0, 52, 1, F32mm),
        u(ZFR0, 56, 1, F64mm),
        b(SMFR0, 40, SmeF8f32),
        b(SMFR0, 41, SmeF8f16),
        b(SMFR0, 42, SmeF16f16),
        b(SMFR0, 43, SmeB16b16),
        u(SMFR0, 44, 5, SmeI16i32),
        b(SMFR0, 48, SmeF64f64),
        u(SMFR0, 52, 0xf, SmeI16i64),
        u(SMFR0, 56, 1, Sme2),
        u(SMFR0, 56, 2, Sme2p1),
        b(SMFR0, 63, SmeFa64),
    ]
};

/// Fields behind the pointer-authentication flags, which the explosion derives
/// from the highest of the three.
static PAUTH_RULES: &[FieldRule] = {
    use ArmFeature::*;
    &[
        u(ISAR1, 4, 1, Pauth),
        u(ISAR1, 8, 1, Pauth),
        u(ISAR2, 12, 1, Pauth),
        u(ISAR1, 4, 2, Epac),
        u(ISAR1, 8, 2, Epac),
        u(ISAR2, 12, 2, Epac),
        u(ISAR1, 4, 3, Pauth2),
        u(ISAR1, 8, 3, Pauth2),
        u(ISAR2, 12, 3, Pauth2),
        u(ISAR1, 4, 4, Fpac),
        u(ISAR1, 8, 4, Fpac),
        u(ISAR2, 12, 4, Fpac),
        u(ISAR1, 4, 5, FpacCombine),
        u(ISAR1, 8, 5, FpacCombine),
        u(ISAR2, 12, 5, FpacCombine),
    ]
};

/// PMUv3 levels by ID_AA64DFR0_EL1.PMUVer; 0xf is an IMPLEMENTATION DEFINED PMU.
const PMU_LEVELS: &[(u8, ArmFeature)] = &[
    (1, ArmFeature::Pmuv3),
    (4, ArmFeature::Pmuv3p1),
    (5, ArmFeature::Pmuv3p4),
    (6, ArmFeature::Pmuv3p5),
    (7, ArmFeature::Pmuv3p7),
    (8, ArmFeature::Pmuv3p8),
    (9, ArmFeature::Pmuv3p9),
];

/// Decodes ID_AA64MMFR0_EL1.PARange into an address width.
pub fn pa_range_bits(pa_range: u8) -> Option<u8> {
    Some(match pa_range {
        0 => 32,
        1 => 36,
        2 => 40,
        3 => 42,
        4 => 44,
        5 => 48,
        6 => 52,
        7 => 56,
        _ => return None,
    })
}

/// Decodes ID_AA64MMFR2_EL1.VARange into an address width.
pub fn va_range_bits(va_range: u8) -> Option<u8> {
    Some(match va_range {
        0 => 48,
        1 => 52,
        2 => 56,
        _ => return None,
    })
}

/// Explodes sorted ID register values into an ARMv8 feature record.
pub fn explode_arm_v8(regs: &[IdRegValue]) -> Result<FeatureRecordArmV8, ExplodeError> {
    check_reg_order(regs)?;

    let midr = lookup_reg(regs, IdRegister::MIDR_EL1).ok_or(
        ExplodeError::MissingBaselineRegister {
            reg: IdRegister::MIDR_EL1,
        },
    )?;
    let midr = Midr::new(midr).map_err(|_| {
        ExplodeError::UnsupportedArchitectureVariant("MIDR_EL1 has RES0 bits set")
    })?;
    let pfr0 = lookup_reg(regs, PFR0).ok_or(ExplodeError::MissingBaselineRegister { reg: PFR0 })?;

    let read = |reg: IdRegister| lookup_reg(regs, reg).unwrap_or(0);

    let vendor = classify_arm_implementer(midr.implementer());
    let mut rec = FeatureRecordArmV8 {
        header: FeatureHeader {
            microarch: determine_arm_microarch(vendor, midr.part_num()),
            vendor,
            max_phys_addr_width: DEFAULT_PHYS_ADDR_WIDTH,
            max_linear_addr_width: DEFAULT_LINEAR_ADDR_WIDTH,
        },
        implementer: midr.implementer(),
        variant: midr.variant(),
        part_num: midr.part_num(),
        revision: midr.revision(),
        ..Default::default()
    };

    if id_field(pfr0, 32) != 0 && lookup_reg(regs, ZFR0).is_none() {
        return Err(ExplodeError::UnsupportedArchitectureVariant(
            "SVE advertised without ID_AA64ZFR0_EL1",
        ));
    }
    if id_field(read(PFR1), 24) != 0 && lookup_reg(regs, SMFR0).is_none() {
        return Err(ExplodeError::UnsupportedArchitectureVariant(
            "SME advertised without ID_AA64SMFR0_EL1",
        ));
    }

    for rule in FIELD_RULES {
        if let Some(value) = lookup_reg(regs, rule.reg) {
            if rule.holds(value) {
                trace!(
                    "{:?}[{}] -> {}",
                    rule.reg,
                    rule.shift,
                    rule.feature.label()
                );
                rec.set(rule.feature, true);
            }
        }
    }

    let pmu_ver = id_field(read(DFR0), 8);
    if pmu_ver != 0xf {
        for &(min, feature) in PMU_LEVELS {
            if pmu_ver >= min {
                rec.set(feature, true);
            }
        }
    }

    if let Some(mmfr0) = lookup_reg(regs, MMFR0) {
        if let Some(bits) = pa_range_bits(id_field(mmfr0, 0)) {
            rec.header.max_phys_addr_width = bits;
        }
    }
    if let Some(mmfr2) = lookup_reg(regs, MMFR2) {
        if let Some(bits) = va_range_bits(id_field(mmfr2, 16)) {
            rec.header.max_linear_addr_width = bits;
        }
    }
    if let Some(dfr0) = lookup_reg(regs, DFR0) {
        rec.breakpoints = id_field(dfr0, 12) + 1;
        rec.watchpoints = id_field(dfr0, 20) + 1;
        rec.ctx_cmps = id_field(dfr0, 28) + 1;
    }

    derive_summary_flags(&mut rec, read(ISAR1), read(ISAR2));

    debug!(
        "exploded ARMv8 features: {:?} {:?} part {:#x} r{}p{} phys {} linear {}",
        rec.header.vendor,
        rec.header.microarch,
        rec.part_num,
        rec.variant,
        rec.revision,
        rec.header.max_phys_addr_width,
        rec.header.max_linear_addr_width
    );
    Ok(rec)
}

/// Lowers the ID register fields behind `feature` until it reads as absent.
///
/// Returns `false` when no field implies `feature`.
pub(crate) fn hide_arm_feature(regs: &mut IdRegStore, feature: ArmFeature) -> bool {
    let mut found = false;
    for rule in FIELD_RULES
        .iter()
        .chain(PAUTH_RULES)
        .filter(|r| r.feature == feature)
    {
        found = true;
        if let Some(value) = regs.get(rule.reg) {
            if rule.holds(value) {
                regs.insert(IdRegValue::new(rule.reg, rule.lower(value)));
            }
        }
    }
    if let Some(&(min, _)) = PMU_LEVELS.iter().find(|&&(_, f)| f == feature) {
        found = true;
        if let Some(dfr0) = regs.get(DFR0) {
            let pmu_ver = id_field(dfr0, 8);
            if pmu_ver != 0xf && pmu_ver >= min {
                let mut dfr0 = dfr0;
                dfr0.set_bits(8..12, u64::from(min - 1));
                regs.insert(IdRegValue::new(DFR0, dfr0));
            }
        }
    }
    found
}

/// Pointer authentication level: the highest of APA, API and APA3.
fn pauth_level(isar1: u64, isar2: u64) -> u8 {
    id_field(isar1, 4)
        .max(id_field(isar1, 8))
        .max(id_field(isar2, 12))
}

/// Flags computed from other fields. Runs after every probed field is in place.
fn derive_summary_flags(rec: &mut FeatureRecordArmV8, isar1: u64, isar2: u64) {
    let level = pauth_level(isar1, isar2);
    rec.set(ArmFeature::Pauth, level >= 1);
    rec.set(ArmFeature::Epac, level == 2);
    rec.set(ArmFeature::Pauth2, level >= 3);
    rec.set(ArmFeature::Fpac, level >= 4);
    rec.set(ArmFeature::FpacCombine, level >= 5);
}
