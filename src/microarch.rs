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

//! Microarchitecture identification.
//!
//! Every family of microarchitectures lives in its own block of the `u16`
//! value space. A block starts at a `first` sentinel and is closed by an `end`
//! sentinel; neither sentinel is a real [`Microarch`] value, so a family
//! predicate is a pair of comparisons.

use numeric_enum_macro::numeric_enum;

use crate::vendor::VendorId;

numeric_enum! {
    #[repr(u16)]
    #[allow(non_camel_case_types)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub enum Microarch {
        #[default]
        Invalid = 0x0000,

        Intel_8086 = 0x0021,
        Intel_80186 = 0x0022,
        Intel_80286 = 0x0023,
        Intel_80386 = 0x0024,
        Intel_80486 = 0x0025,
        Intel_P5 = 0x0026,

        Intel_P6 = 0x0041,
        Intel_P6_II = 0x0042,
        Intel_P6_III = 0x0043,
        Intel_P6_M_Banias = 0x0044,
        Intel_P6_M_Dothan = 0x0045,
        Intel_Core_Yonah = 0x0046,
        Intel_Core2_Merom = 0x0047,
        Intel_Core2_Penryn = 0x0048,

        Intel_Core7_Nehalem = 0x0061,
        Intel_Core7_Westmere = 0x0062,
        Intel_Core7_SandyBridge = 0x0063,
        Intel_Core7_IvyBridge = 0x0064,
        Intel_Core7_Haswell = 0x0065,
        Intel_Core7_Broadwell = 0x0066,
        Intel_Core7_Skylake = 0x0067,
        Intel_Core7_KabyLake = 0x0068,
        Intel_Core7_CoffeeLake = 0x0069,
        Intel_Core7_WhiskeyLake = 0x006a,
        Intel_Core7_CascadeLake = 0x006b,
        Intel_Core7_CannonLake = 0x006c,
        Intel_Core7_CometLake = 0x006d,
        Intel_Core7_IceLake = 0x006e,
        Intel_Core7_RocketLake = 0x006f,
        Intel_Core7_TigerLake = 0x0070,
        Intel_Core7_AlderLake = 0x0071,
        Intel_Core7_RaptorLake = 0x0072,
        Intel_Core7_SapphireRapids = 0x0073,
        Intel_Core7_EmeraldRapids = 0x0074,
        Intel_Core7_MeteorLake = 0x0075,
        Intel_Core7_ArrowLake = 0x0076,
        Intel_Core7_LunarLake = 0x0077,
        Intel_Core7_GraniteRapids = 0x0078,

        Intel_Atom_Bonnell = 0x00a1,
        Intel_Atom_Lincroft = 0x00a2,
        Intel_Atom_Saltwell = 0x00a3,
        Intel_Atom_Silvermont = 0x00a4,
        Intel_Atom_Airmount = 0x00a5,
        Intel_Atom_Goldmont = 0x00a6,
        Intel_Atom_GoldmontPlus = 0x00a7,
        Intel_Atom_Tremont = 0x00a8,
        Intel_Atom_Crestmont = 0x00a9,

        Intel_Phi_KnightsFerry = 0x00c1,
        Intel_Phi_KnightsCorner = 0x00c2,
        Intel_Phi_KnightsLanding = 0x00c3,
        Intel_Phi_KnightsHill = 0x00c4,
        Intel_Phi_KnightsMill = 0x00c5,

        Intel_NB_Willamette = 0x00e1,
        Intel_NB_Northwood = 0x00e2,
        Intel_NB_Prescott = 0x00e3,
        Intel_NB_CedarMill = 0x00e4,

        Intel_Unknown = 0x00ff,

        AMD_Am286 = 0x0101,
        AMD_Am386 = 0x0102,
        AMD_Am486 = 0x0103,
        AMD_Am486Enh = 0x0104,
        AMD_K5 = 0x0105,
        AMD_K6 = 0x0106,

        AMD_K7_Palomino = 0x0121,
        AMD_K7_Spitfire = 0x0122,
        AMD_K7_Thunderbird = 0x0123,
        AMD_K7_Morgan = 0x0124,
        AMD_K7_Thoroughbred = 0x0125,
        AMD_K7_Barton = 0x0126,
        AMD_K7_Unknown = 0x0127,

        AMD_K8_130nm = 0x0141,
        AMD_K8_90nm = 0x0142,
        AMD_K8_90nm_DualCore = 0x0143,
        AMD_K8_90nm_AMDV = 0x0144,
        AMD_K8_65nm = 0x0145,

        AMD_K10 = 0x0161,
        AMD_K10_Lion = 0x0162,
        AMD_K10_Llano = 0x0163,

        AMD_Bobcat = 0x0181,
        AMD_Jaguar = 0x0182,

        AMD_15h_Bulldozer = 0x01a1,
        AMD_15h_Piledriver = 0x01a2,
        AMD_15h_Steamroller = 0x01a3,
        AMD_15h_Excavator = 0x01a4,
        AMD_15h_Unknown = 0x01a5,

        AMD_Zen = 0x01c1,
        AMD_ZenPlus = 0x01c2,
        AMD_Zen2 = 0x01c3,
        AMD_Zen3 = 0x01c4,
        AMD_Zen4 = 0x01c5,
        AMD_Zen5 = 0x01c6,

        AMD_Unknown = 0x01ff,

        Centaur_C6 = 0x0201,
        Centaur_C2 = 0x0202,
        Centaur_C3 = 0x0203,
        VIA_C3_Samuel = 0x0204,
        VIA_C3_Nehemiah = 0x0205,
        VIA_C7_Esther = 0x0206,
        VIA_Isaiah = 0x0207,
        VIA_Unknown = 0x0208,

        Shanghai_Wudaokou = 0x0221,
        Shanghai_Lujiazui = 0x0222,
        Shanghai_Unknown = 0x0223,

        Cyrix_5x86 = 0x0241,
        Cyrix_M1 = 0x0242,
        Cyrix_MediaGX = 0x0243,
        Cyrix_MediaGXm = 0x0244,
        Cyrix_M2 = 0x0245,
        Cyrix_Unknown = 0x0246,

        Hygon_Dhyana = 0x0281,
        Hygon_Unknown = 0x0282,

        Arm_Cortex_A53 = 0x0301,
        Arm_Cortex_A57 = 0x0302,
        Arm_Cortex_A72 = 0x0303,
        Arm_Cortex_A73 = 0x0304,
        Arm_Cortex_A75 = 0x0305,
        Arm_Cortex_A76 = 0x0306,
        Arm_Cortex_A77 = 0x0307,
        Arm_Cortex_A78 = 0x0308,
        Arm_Cortex_X1 = 0x0309,
        Arm_Neoverse_N1 = 0x030a,
        Arm_Neoverse_V1 = 0x030b,
        Arm_Neoverse_N2 = 0x030c,
        Arm_Neoverse_V2 = 0x030d,
        Arm_Unknown = 0x030e,

        Apple_M1 = 0x0321,
        Apple_M2 = 0x0322,
        Apple_M3 = 0x0323,
        Apple_M4 = 0x0324,
        Apple_Unknown = 0x0325,

        Qualcomm_Kyro = 0x0341,
        Qualcomm_Oryon = 0x0342,
        Qualcomm_Unknown = 0x0343,

        Broadcom_Vulcan = 0x0361,
        Broadcom_Unknown = 0x0362,

        Ampere_AmpereOne = 0x0381,
        Ampere_Unknown = 0x0382,

        Unknown = 0xfffe,
    }
}

impl Microarch {
    /// Decodes a raw value, mapping unassigned values to [`Microarch::Unknown`].
    pub fn from_raw(raw: u16) -> Self {
        Self::try_from(raw).unwrap_or(Self::Unknown)
    }

    pub fn raw(self) -> u16 {
        u16::from(self)
    }

    /// The family this microarchitecture belongs to, if any.
    pub fn family(self) -> Option<&'static MicroarchFamily> {
        MicroarchFamily::ALL.iter().find(|f| f.contains(self))
    }
}

/// A contiguous block of microarchitectures delimited by two sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MicroarchFamily {
    pub name: &'static str,
    /// Sentinel below the first member.
    pub first: u16,
    /// Sentinel above the last member.
    pub end: u16,
}

impl MicroarchFamily {
    pub const INTEL_80X86: Self = Self::new("Intel 80x86", 0x0020, 0x0027);
    pub const INTEL_P6_CORE: Self = Self::new("Intel P6/Core", 0x0040, 0x0049);
    pub const INTEL_CORE7: Self = Self::new("Intel Core7", 0x0060, 0x0079);
    pub const INTEL_ATOM: Self = Self::new("Intel Atom", 0x00a0, 0x00aa);
    pub const INTEL_PHI: Self = Self::new("Intel Phi", 0x00c0, 0x00c6);
    pub const INTEL_NETBURST: Self = Self::new("Intel NetBurst", 0x00e0, 0x00e5);
    pub const AMD_LEGACY: Self = Self::new("AMD Am286..K6", 0x0100, 0x0107);
    pub const AMD_K7: Self = Self::new("AMD K7", 0x0120, 0x0128);
    pub const AMD_K8: Self = Self::new("AMD K8", 0x0140, 0x0146);
    pub const AMD_K10: Self = Self::new("AMD K10", 0x0160, 0x0164);
    pub const AMD_CAT: Self = Self::new("AMD Bobcat/Jaguar", 0x0180, 0x0183);
    pub const AMD_15H: Self = Self::new("AMD 15h", 0x01a0, 0x01a6);
    pub const AMD_ZEN: Self = Self::new("AMD Zen", 0x01c0, 0x01c7);
    pub const VIA: Self = Self::new("Centaur/VIA", 0x0200, 0x0209);
    pub const SHANGHAI: Self = Self::new("Shanghai", 0x0220, 0x0224);
    pub const CYRIX: Self = Self::new("Cyrix", 0x0240, 0x0247);
    pub const HYGON: Self = Self::new("Hygon", 0x0280, 0x0283);
    pub const ARM: Self = Self::new("Arm Cortex/Neoverse", 0x0300, 0x030f);
    pub const APPLE: Self = Self::new("Apple", 0x0320, 0x0326);
    pub const QUALCOMM: Self = Self::new("Qualcomm", 0x0340, 0x0344);
    pub const BROADCOM: Self = Self::new("Broadcom", 0x0360, 0x0363);
    pub const AMPERE: Self = Self::new("Ampere", 0x0380, 0x0383);

    /// Every declared family, in value order.
    pub const ALL: &'static [Self] = &[
        Self::INTEL_80X86,
        Self::INTEL_P6_CORE,
        Self::INTEL_CORE7,
        Self::INTEL_ATOM,
        Self::INTEL_PHI,
        Self::INTEL_NETBURST,
        Self::AMD_LEGACY,
        Self::AMD_K7,
        Self::AMD_K8,
        Self::AMD_K10,
        Self::AMD_CAT,
        Self::AMD_15H,
        Self::AMD_ZEN,
        Self::VIA,
        Self::SHANGHAI,
        Self::CYRIX,
        Self::HYGON,
        Self::ARM,
        Self::APPLE,
        Self::QUALCOMM,
        Self::BROADCOM,
        Self::AMPERE,
    ];

    const fn new(name: &'static str, first: u16, end: u16) -> Self {
        Self { name, first, end }
    }

    pub const fn contains(&self, m: Microarch) -> bool {
        in_range(m, self.first, self.end)
    }
}

/// `first <= m <= end`.
pub const fn in_range(m: Microarch, first: u16, end: u16) -> bool {
    let v = m as u16;
    first <= v && v <= end
}

pub const fn is_intel_80x86(m: Microarch) -> bool {
    MicroarchFamily::INTEL_80X86.contains(m)
}

pub const fn is_intel_p6_core(m: Microarch) -> bool {
    MicroarchFamily::INTEL_P6_CORE.contains(m)
}

pub const fn is_intel_core7(m: Microarch) -> bool {
    MicroarchFamily::INTEL_CORE7.contains(m)
}

pub const fn is_intel_atom(m: Microarch) -> bool {
    MicroarchFamily::INTEL_ATOM.contains(m)
}

pub const fn is_intel_phi(m: Microarch) -> bool {
    MicroarchFamily::INTEL_PHI.contains(m)
}

pub const fn is_intel_netburst(m: Microarch) -> bool {
    MicroarchFamily::INTEL_NETBURST.contains(m)
}

pub const fn is_amd_k7(m: Microarch) -> bool {
    MicroarchFamily::AMD_K7.contains(m)
}

pub const fn is_amd_k8(m: Microarch) -> bool {
    MicroarchFamily::AMD_K8.contains(m)
}

pub const fn is_amd_k10(m: Microarch) -> bool {
    MicroarchFamily::AMD_K10.contains(m)
}

pub const fn is_amd_15h(m: Microarch) -> bool {
    MicroarchFamily::AMD_15H.contains(m)
}

pub const fn is_amd_zen(m: Microarch) -> bool {
    MicroarchFamily::AMD_ZEN.contains(m)
}

pub const fn is_apple(m: Microarch) -> bool {
    MicroarchFamily::APPLE.contains(m)
}

pub const fn is_qualcomm(m: Microarch) -> bool {
    MicroarchFamily::QUALCOMM.contains(m)
}

/// Splits leaf 1 EAX into (family, model, stepping) applying the extended
/// family/model rules of the given vendor.
pub fn x86_family_model_stepping(vendor: VendorId, eax: u32) -> (u32, u32, u32) {
    use bit_field::BitField;

    let base_family = eax.get_bits(8..12);
    let base_model = eax.get_bits(4..8);
    let stepping = eax.get_bits(0..4);
    let ext_family = eax.get_bits(20..28);
    let ext_model = eax.get_bits(16..20);

    let family = if base_family == 0xf {
        base_family + ext_family
    } else {
        base_family
    };
    let use_ext_model = match vendor {
        VendorId::Amd | VendorId::Hygon => base_family == 0xf,
        _ => base_family == 0x6 || base_family == 0xf,
    };
    let model = if use_ext_model {
        (ext_model << 4) | base_model
    } else {
        base_model
    };
    (family, model, stepping)
}

/// Figures out the microarchitecture of an x86 CPU.
pub fn determine_x86_microarch(
    vendor: VendorId,
    family: u32,
    model: u32,
    stepping: u32,
) -> Microarch {
    use Microarch::*;

    let m = match vendor {
        VendorId::Intel => match family {
            3 => Intel_80386,
            4 => Intel_80486,
            5 => Intel_P5,
            6 => match model {
                0x01 => Intel_P6,
                0x03 | 0x05 | 0x06 => Intel_P6_II,
                0x07 | 0x08 | 0x0a | 0x0b => Intel_P6_III,
                0x09 => Intel_P6_M_Banias,
                0x0d => Intel_P6_M_Dothan,
                0x0e => Intel_Core_Yonah,
                0x0f | 0x16 => Intel_Core2_Merom,
                0x17 | 0x1d => Intel_Core2_Penryn,
                0x1a | 0x1e | 0x1f | 0x2e => Intel_Core7_Nehalem,
                0x25 | 0x2c | 0x2f => Intel_Core7_Westmere,
                0x2a | 0x2d => Intel_Core7_SandyBridge,
                0x3a | 0x3e => Intel_Core7_IvyBridge,
                0x3c | 0x3f | 0x45 | 0x46 => Intel_Core7_Haswell,
                0x3d | 0x47 | 0x4f | 0x56 => Intel_Core7_Broadwell,
                0x4e | 0x5e => Intel_Core7_Skylake,
                0x55 if stepping >= 5 => Intel_Core7_CascadeLake,
                0x55 => Intel_Core7_Skylake,
                0x8e if stepping >= 0xb => Intel_Core7_WhiskeyLake,
                0x8e => Intel_Core7_KabyLake,
                0x9e if stepping >= 0xa => Intel_Core7_CoffeeLake,
                0x9e => Intel_Core7_KabyLake,
                0x66 => Intel_Core7_CannonLake,
                0xa5 | 0xa6 => Intel_Core7_CometLake,
                0x6a | 0x6c | 0x7d | 0x7e => Intel_Core7_IceLake,
                0xa7 => Intel_Core7_RocketLake,
                0x8c | 0x8d => Intel_Core7_TigerLake,
                0x97 | 0x9a => Intel_Core7_AlderLake,
                0xb7 | 0xba | 0xbf => Intel_Core7_RaptorLake,
                0x8f => Intel_Core7_SapphireRapids,
                0xcf => Intel_Core7_EmeraldRapids,
                0xaa | 0xac => Intel_Core7_MeteorLake,
                0xc5 | 0xc6 => Intel_Core7_ArrowLake,
                0xbd => Intel_Core7_LunarLake,
                0xad | 0xae => Intel_Core7_GraniteRapids,
                0x1c | 0x26 => Intel_Atom_Bonnell,
                0x27 => Intel_Atom_Lincroft,
                0x35 | 0x36 => Intel_Atom_Saltwell,
                0x37 | 0x4a | 0x4d | 0x5a | 0x5d => Intel_Atom_Silvermont,
                0x4c => Intel_Atom_Airmount,
                0x5c | 0x5f => Intel_Atom_Goldmont,
                0x7a => Intel_Atom_GoldmontPlus,
                0x86 | 0x96 | 0x9c => Intel_Atom_Tremont,
                0xaf | 0xb6 => Intel_Atom_Crestmont,
                0x57 => Intel_Phi_KnightsLanding,
                0x85 => Intel_Phi_KnightsMill,
                _ => Intel_Unknown,
            },
            0xb => match model {
                0 => Intel_Phi_KnightsFerry,
                _ => Intel_Phi_KnightsCorner,
            },
            0xf => match model {
                0 | 1 => Intel_NB_Willamette,
                2 => Intel_NB_Northwood,
                3 | 4 => Intel_NB_Prescott,
                6 => Intel_NB_CedarMill,
                _ => Intel_Unknown,
            },
            _ => Intel_Unknown,
        },
        VendorId::Amd => match family {
            3 => AMD_Am386,
            4 if model >= 0xe => AMD_K5,
            4 if model >= 7 => AMD_Am486Enh,
            4 => AMD_Am486,
            5 if model < 6 => AMD_K5,
            5 => AMD_K6,
            6 => match model {
                1 | 2 => AMD_K7_Palomino,
                3 => AMD_K7_Spitfire,
                4 => AMD_K7_Thunderbird,
                6 => AMD_K7_Palomino,
                7 => AMD_K7_Morgan,
                8 => AMD_K7_Thoroughbred,
                0xa => AMD_K7_Barton,
                _ => AMD_K7_Unknown,
            },
            0xf => match model {
                0x00..=0x0f => AMD_K8_130nm,
                0x10..=0x1f => AMD_K8_90nm,
                0x20..=0x3f => AMD_K8_90nm_DualCore,
                0x40..=0x5f => AMD_K8_90nm_AMDV,
                _ => AMD_K8_65nm,
            },
            0x10 => AMD_K10,
            0x11 => AMD_K10_Lion,
            0x12 => AMD_K10_Llano,
            0x14 => AMD_Bobcat,
            0x15 => match model {
                0x00 | 0x01 => AMD_15h_Bulldozer,
                0x02 | 0x10..=0x1f => AMD_15h_Piledriver,
                0x30..=0x3f => AMD_15h_Steamroller,
                0x60..=0x7f => AMD_15h_Excavator,
                _ => AMD_15h_Unknown,
            },
            0x16 => AMD_Jaguar,
            0x17 => match model {
                0x08 | 0x18 => AMD_ZenPlus,
                0x30.. => AMD_Zen2,
                _ => AMD_Zen,
            },
            0x19 => match model {
                0x10..=0x1f | 0x60..=0x7f | 0xa0.. => AMD_Zen4,
                _ => AMD_Zen3,
            },
            0x1a => AMD_Zen5,
            _ => AMD_Unknown,
        },
        VendorId::Hygon => match family {
            0x18 => Hygon_Dhyana,
            _ => Hygon_Unknown,
        },
        VendorId::Via => match family {
            5 => match model {
                4 => Centaur_C6,
                8 => Centaur_C2,
                9 => Centaur_C3,
                _ => VIA_Unknown,
            },
            6 => match model {
                6..=8 => VIA_C3_Samuel,
                9 => VIA_C3_Nehemiah,
                0xa | 0xd => VIA_C7_Esther,
                0xf => VIA_Isaiah,
                _ => VIA_Unknown,
            },
            7 => match model {
                0x1b => Shanghai_Wudaokou,
                0x3b => Shanghai_Lujiazui,
                _ => Shanghai_Unknown,
            },
            _ => VIA_Unknown,
        },
        VendorId::Shanghai => match (family, model) {
            (7, 0x1b) | (6, 0x0f) | (6, 0x19) => Shanghai_Wudaokou,
            (7, 0x3b) => Shanghai_Lujiazui,
            _ => Shanghai_Unknown,
        },
        VendorId::Cyrix => match family {
            4 if model == 4 => Cyrix_MediaGX,
            4 => Cyrix_5x86,
            5 if model == 4 => Cyrix_MediaGXm,
            5 => Cyrix_M1,
            6 => Cyrix_M2,
            _ => Cyrix_Unknown,
        },
        _ => Unknown,
    };

    if matches!(
        m,
        Intel_Unknown
            | AMD_Unknown
            | VIA_Unknown
            | Shanghai_Unknown
            | Cyrix_Unknown
            | Hygon_Unknown
            | Unknown
    ) {
        warn!(
            "microarch not cataloged: {:?} family {:#x} model {:#x} stepping {}",
            vendor, family, model, stepping
        );
    }
    m
}

/// Figures out the microarchitecture of an ARMv8 core from its MIDR vendor and part number.
pub fn determine_arm_microarch(vendor: VendorId, part_num: u16) -> Microarch {
    use Microarch::*;

    let m = match vendor {
        VendorId::Arm => match part_num {
            0xd03 => Arm_Cortex_A53,
            0xd07 => Arm_Cortex_A57,
            0xd08 => Arm_Cortex_A72,
            0xd09 => Arm_Cortex_A73,
            0xd0a => Arm_Cortex_A75,
            0xd0b => Arm_Cortex_A76,
            0xd0d => Arm_Cortex_A77,
            0xd41 => Arm_Cortex_A78,
            0xd44 => Arm_Cortex_X1,
            0xd0c => Arm_Neoverse_N1,
            0xd40 => Arm_Neoverse_V1,
            0xd49 => Arm_Neoverse_N2,
            0xd4f => Arm_Neoverse_V2,
            _ => Arm_Unknown,
        },
        VendorId::Apple => match part_num {
            0x022..=0x029 => Apple_M1,
            0x032..=0x039 => Apple_M2,
            0x048..=0x04b => Apple_M3,
            0x052..=0x055 => Apple_M4,
            _ => Apple_Unknown,
        },
        VendorId::Qualcomm => match part_num {
            0x800..=0x805 => Qualcomm_Kyro,
            0x001 => Qualcomm_Oryon,
            _ => Qualcomm_Unknown,
        },
        VendorId::Broadcom => match part_num {
            0x516 => Broadcom_Vulcan,
            _ => Broadcom_Unknown,
        },
        VendorId::Ampere => match part_num {
            0xac3 | 0xac4 => Ampere_AmpereOne,
            _ => Ampere_Unknown,
        },
        _ => Unknown,
    };
    if m == Unknown {
        warn!("ARM implementer {:?} part {:#x} not cataloged", vendor, part_num);
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every assigned value, scanned over the whole `u16` space.
    fn all_microarchs() -> impl Iterator<Item = Microarch> {
        (0..=u16::MAX).filter_map(|v| Microarch::try_from(v).ok())
    }

    #[test]
    fn test_family_ranges_do_not_overlap() {
        let families = MicroarchFamily::ALL;
        for (i, a) in families.iter().enumerate() {
            assert!(a.first < a.end, "{} is empty", a.name);
            for b in &families[i + 1..] {
                assert!(
                    a.end < b.first || b.end < a.first,
                    "{} overlaps {}",
                    a.name,
                    b.name
                );
            }
        }
    }

    #[test]
    fn test_sentinels_are_not_real_values() {
        for family in MicroarchFamily::ALL {
            assert!(Microarch::try_from(family.first).is_err(), "{}", family.name);
            assert!(Microarch::try_from(family.end).is_err(), "{}", family.name);
        }
    }

    #[test]
    fn test_range_predicates_match_comparison() {
        let core7 = MicroarchFamily::INTEL_CORE7;
        for m in all_microarchs() {
            let v = m.raw();
            assert_eq!(is_intel_core7(m), core7.first <= v && v <= core7.end);
            assert_eq!(
                is_amd_zen(m),
                MicroarchFamily::AMD_ZEN.first <= v && v <= MicroarchFamily::AMD_ZEN.end
            );
        }
    }

    #[test]
    fn test_each_microarch_in_at_most_one_family() {
        for m in all_microarchs() {
            let n = MicroarchFamily::ALL.iter().filter(|f| f.contains(m)).count();
            assert!(n <= 1, "{:?} in {} families", m, n);
        }
    }

    #[test]
    fn test_family_model_stepping_kaby_lake() {
        // i7-7700K: family 6, model 0x9e, stepping 9.
        let (family, model, stepping) = x86_family_model_stepping(VendorId::Intel, 0x0009_06e9);
        assert_eq!((family, model, stepping), (6, 0x9e, 9));
        assert_eq!(
            determine_x86_microarch(VendorId::Intel, family, model, stepping),
            Microarch::Intel_Core7_KabyLake
        );
    }

    #[test]
    fn test_family_model_stepping_zen2() {
        // Ryzen 5 3600X.
        let (family, model, stepping) = x86_family_model_stepping(VendorId::Amd, 0x0087_0f10);
        assert_eq!((family, model, stepping), (0x17, 0x71, 0));
        assert_eq!(
            determine_x86_microarch(VendorId::Amd, family, model, stepping),
            Microarch::AMD_Zen2
        );
    }

    #[test]
    fn test_amd_ignores_extended_model_below_family_f() {
        let (family, model, _) = x86_family_model_stepping(VendorId::Amd, 0x0001_0663);
        assert_eq!((family, model), (6, 6));
    }

    #[test]
    fn test_cascade_lake_vs_skylake_server() {
        assert_eq!(
            determine_x86_microarch(VendorId::Intel, 6, 0x55, 7),
            Microarch::Intel_Core7_CascadeLake
        );
        assert_eq!(
            determine_x86_microarch(VendorId::Intel, 6, 0x55, 4),
            Microarch::Intel_Core7_Skylake
        );
    }

    #[test]
    fn test_unknown_model_is_conservative() {
        assert_eq!(
            determine_x86_microarch(VendorId::Intel, 6, 0xfe, 0),
            Microarch::Intel_Unknown
        );
        assert_eq!(
            determine_x86_microarch(VendorId::Unknown, 6, 0x9e, 9),
            Microarch::Unknown
        );
    }

    #[test]
    fn test_arm_microarchs() {
        assert_eq!(determine_arm_microarch(VendorId::Apple, 0x022), Microarch::Apple_M1);
        assert_eq!(determine_arm_microarch(VendorId::Apple, 0x023), Microarch::Apple_M1);
        assert_eq!(determine_arm_microarch(VendorId::Arm, 0xd08), Microarch::Arm_Cortex_A72);
        assert_eq!(determine_arm_microarch(VendorId::Qualcomm, 0x001), Microarch::Qualcomm_Oryon);
        assert!(is_apple(Microarch::Apple_M3));
    }
}
