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

use core::fmt::{Debug, Formatter, Result};

use super::FeatureHeader;
use super::bits::{FeatureBits, define_features};

/// Number of flag words in [`FeatureRecordArmV8`].
pub const ARM_FEATURE_WORDS: usize = 6;

/// First bit of the Armv9 flag words. Bits below hold Armv8.0 through Armv8.9.
pub const ARM_V9_FIRST_BIT: usize = 192;

define_features! {
    /// ARMv8 `FEAT_*` capability flags, ordered by architecture revision.
    pub enum ArmFeature: 6 words, label "FEAT_" {
        // ID_AA64PFR0_EL1
        fp,
        adv_simd,
        fp16,
        el0_aarch32,
        el1_aarch32,
        el2,
        el3,
        gicv3,
        gicv4p1,
        ras,
        rasv1p1,
        sve,
        sel2,
        mpam,
        amuv1,
        amuv1p1,
        dit,
        csv2,
        csv2_2,
        csv2_3,
        csv3,
        // ID_AA64PFR1_EL1
        bti,
        ssbs,
        ssbs2,
        mte,
        mte2,
        mte3,
        rng_trap,
        nmi,
        gcs,
        the,
        df2,
        pfar,
        // ID_AA64ISAR0_EL1
        aes,
        pmull,
        sha1,
        sha256,
        sha512,
        crc32,
        lse,
        lse128,
        rdm,
        sha3,
        sm3,
        sm4,
        dotprod,
        fhm,
        flagm,
        flagm2,
        tlbios,
        tlbirange,
        rng,
        // ID_AA64ISAR1_EL1
        dpb,
        dpb2,
        pacqarma5,
        pacimp,
        jscvt,
        fcma,
        lrcpc,
        lrcpc2,
        lrcpc3,
        frintts,
        sb,
        specres,
        specres2,
        bf16,
        ebf16,
        dgh,
        i8mm,
        xs,
        ls64,
        ls64_v,
        ls64_accdata,
        // ID_AA64ISAR2_EL1
        wfxt,
        rpres,
        pacqarma3,
        mops,
        hbc,
        const_pac_field,
        clrbhb,
        sysreg128,
        sysinstr128,
        prfmslc,
        rprfm,
        cssc,
        ats1a,
        // ID_AA64MMFR0_EL1
        lpa,
        asid16,
        mixed_endian,
        mixed_endian_el0,
        tgran4,
        tgran16,
        tgran64,
        lpa2,
        exs,
        fgt,
        fgt2,
        ecv,
        ecv2,
        // ID_AA64MMFR1_EL1
        haf,
        hafdbs,
        haft,
        vmid16,
        vhe,
        hpds,
        hpds2,
        lor,
        pan,
        pan2,
        pan3,
        xnx,
        twed,
        ets2,
        hcx,
        afp,
        ntlbpa,
        tidcp1,
        cmow,
        ecbhb,
        // ID_AA64MMFR2_EL1
        ttcnp,
        uao,
        lsmaoc,
        iesb,
        lva,
        lva3,
        ccidx,
        nv,
        nv2,
        ttst,
        lse2,
        ids,
        s2fwb,
        ttl,
        bbm,
        evt,
        e0pd,
        // ID_AA64MMFR3_EL1
        tcr2,
        sctlr2,
        s1pie,
        s2pie,
        s1poe,
        s2poe,
        aie,
        d128,
        anerr,
        snerr,
        aderr,
        sderr,
        spec_fpacc,
        // ID_AA64DFR0_EL1
        debugv8p2,
        debugv8p4,
        debugv8p8,
        debugv8p9,
        pmuv3,
        pmuv3p1,
        pmuv3p4,
        pmuv3p5,
        pmuv3p7,
        pmuv3p8,
        pmuv3p9,
        pmuv3_ss,
        sebep,
        spe,
        spev1p1,
        spev1p2,
        double_lock,
        trf,
        mtpmu,
        hpmn0,
        // ID_AA64DFR1_EL1
        spmu,
        pmuv3_icntr,
        ite,
        ebep,
        // Derived from the flags above.
        /// Any pointer authentication algorithm.
        pauth,
        /// Enhanced PAC.
        epac,
        pauth2,
        fpac,
        fpac_combine,

        // Armv9 and later.
        // ID_AA64ZFR0_EL1
        sve2 = 192,
        sve2p1,
        sve_aes,
        sve_pmull128,
        sve_bitperm,
        sve_bf16,
        sve_ebf16,
        sve_b16b16,
        sve_sha3,
        sve_sm4,
        sve_i8mm,
        f32mm,
        f64mm,
        // ID_AA64PFR1_EL1 / ID_AA64SMFR0_EL1
        sme,
        sme2,
        sme2p1,
        sme_fa64,
        sme_f64f64,
        sme_i16i64,
        sme_f16f16,
        sme_b16b16,
        sme_f8f16,
        sme_f8f32,
        sme_i16i32,
        // ID_AA64PFR0_EL1
        rme,
        // ID_AA64PFR2_EL1
        mte_perm,
        mte_store_only,
        mtefar,
        fpmr,
        // ID_AA64MMFR3_EL1
        mec,
        // ID_AA64ISAR0_EL1 / ID_AA64ISAR2_EL1
        tme,
        lut,
        // ID_AA64DFR0_EL1
        brbe,
        brbev1p1,
        trbe,
        trbe_ext,
        ete,
    }
}

impl ArmFeature {
    /// Returns `true` for flags introduced with Armv9.
    pub const fn is_v9(self) -> bool {
        self.bit() >= ARM_V9_FIRST_BIT
    }
}

/// The ARMv8 extension of the feature record. Exactly 64 bytes.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FeatureRecordArmV8 {
    pub header: FeatureHeader,
    /// MIDR_EL1.Implementer
    pub implementer: u8,
    /// MIDR_EL1.Variant
    pub variant: u8,
    /// MIDR_EL1.PartNum
    pub part_num: u16,
    /// MIDR_EL1.Revision
    pub revision: u8,
    pub breakpoints: u8,
    pub watchpoints: u8,
    /// Context-aware breakpoints.
    pub ctx_cmps: u8,
    pub(crate) reserved: [u8; 2],
    pub flags: FeatureBits<ARM_FEATURE_WORDS>,
}

impl FeatureRecordArmV8 {
    pub fn has(&self, feature: ArmFeature) -> bool {
        self.flags.get(feature.bit())
    }

    pub fn set(&mut self, feature: ArmFeature, value: bool) {
        self.flags.set(feature.bit(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = ArmFeature> + '_ {
        ArmFeature::ALL.iter().copied().filter(|f| self.has(*f))
    }
}

impl Debug for FeatureRecordArmV8 {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_struct("FeatureRecordArmV8")
            .field("header", &self.header)
            .field("implementer", &format_args!("{:#x}", self.implementer))
            .field("variant", &self.variant)
            .field("part_num", &format_args!("{:#x}", self.part_num))
            .field("revision", &self.revision)
            .field("breakpoints", &self.breakpoints)
            .field("watchpoints", &self.watchpoints)
            .field("ctx_cmps", &self.ctx_cmps)
            .field("flags", &FlagLabels(self))
            .finish()
    }
}

struct FlagLabels<'a>(&'a FeatureRecordArmV8);

impl Debug for FlagLabels<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_list()
            .entries(self.0.iter().map(|feat| feat.label()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_split() {
        assert!(!ArmFeature::FpacCombine.is_v9());
        assert!(ArmFeature::Sve2.is_v9());
        assert_eq!(ArmFeature::Sve2.bit(), ARM_V9_FIRST_BIT);
        assert!(ArmFeature::Ete.bit() < ARM_FEATURE_WORDS * 64);
    }

    #[test]
    fn test_labels() {
        assert_eq!(ArmFeature::Aes.label(), "FEAT_AES");
        assert_eq!(ArmFeature::Lse2.label(), "FEAT_LSE2");
        assert_eq!(ArmFeature::from_name("sve2"), Some(ArmFeature::Sve2));
    }

    #[test]
    fn test_debug_lists_labels() {
        let mut rec = FeatureRecordArmV8::default();
        rec.set(ArmFeature::Aes, true);
        rec.set(ArmFeature::Sme, true);
        let text = format!("{:?}", rec);
        assert!(text.contains("FEAT_AES"));
        assert!(text.contains("FEAT_SME"));
        assert!(!text.contains("FEAT_SVE"));
    }
}
