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

//! CPU vendor and architecture classification.

use numeric_enum_macro::numeric_enum;

numeric_enum! {
    #[repr(u8)]
    /// CPU vendor. Stored as a raw byte inside feature records.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub enum VendorId {
        #[default]
        Invalid = 0,
        Intel = 1,
        Amd = 2,
        Via = 3,
        Cyrix = 4,
        Shanghai = 5,
        Hygon = 6,
        Arm = 7,
        Broadcom = 8,
        Qualcomm = 9,
        Apple = 10,
        Ampere = 11,
        Unknown = 12,
    }
}

impl VendorId {
    /// Decodes a raw vendor byte, mapping unassigned values to [`VendorId::Unknown`].
    pub fn from_raw(raw: u8) -> Self {
        Self::try_from(raw).unwrap_or(Self::Unknown)
    }

    /// Returns `true` for vendors that ship x86 processors.
    pub const fn is_x86(self) -> bool {
        matches!(
            self,
            Self::Intel | Self::Amd | Self::Via | Self::Cyrix | Self::Shanghai | Self::Hygon
        )
    }

    /// Returns `true` for vendors that ship ARMv8 processors.
    pub const fn is_arm(self) -> bool {
        matches!(
            self,
            Self::Arm | Self::Broadcom | Self::Qualcomm | Self::Apple | Self::Ampere
        )
    }

    /// AMD and Hygon share the AMD extended leaf layout and SVM.
    pub const fn is_amd_like(self) -> bool {
        matches!(self, Self::Amd | Self::Hygon)
    }

    /// Intel, VIA and Shanghai (Zhaoxin) share the Intel leaf layout and VMX.
    pub const fn is_intel_like(self) -> bool {
        matches!(self, Self::Intel | Self::Via | Self::Shanghai)
    }
}

/// Selects which extension block of a feature record is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    Invalid,
    X86,
    Arm,
    Unknown,
}

cfg_if::cfg_if! {
    if #[cfg(any(target_arch = "x86_64", target_arch = "x86"))] {
        const NATIVE_ARCH: Architecture = Architecture::X86;
    } else if #[cfg(target_arch = "aarch64")] {
        const NATIVE_ARCH: Architecture = Architecture::Arm;
    } else {
        const NATIVE_ARCH: Architecture = Architecture::Unknown;
    }
}

impl Architecture {
    /// The architecture this crate was compiled for.
    pub const fn native() -> Self {
        NATIVE_ARCH
    }
}

/// Vendor strings as returned in EBX:EDX:ECX of CPUID leaf 0.
const X86_VENDOR_STRINGS: &[(&[u8; 12], VendorId)] = &[
    (b"GenuineIntel", VendorId::Intel),
    (b"AuthenticAMD", VendorId::Amd),
    (b"CentaurHauls", VendorId::Via),
    (b"VIA VIA VIA ", VendorId::Via),
    (b"CyrixInstead", VendorId::Cyrix),
    (b"  Shanghai  ", VendorId::Shanghai),
    (b"HygonGenuine", VendorId::Hygon),
];

/// MIDR_EL1 implementer codes.
const ARM_IMPLEMENTERS: &[(u8, VendorId)] = &[
    (0x41, VendorId::Arm),
    (0x42, VendorId::Broadcom),
    (0x51, VendorId::Qualcomm),
    (0x61, VendorId::Apple),
    (0xc0, VendorId::Ampere),
];

/// Reassembles the 12-byte vendor string from the leaf 0 registers, in EBX, EDX, ECX order.
pub fn x86_vendor_string(ebx: u32, ecx: u32, edx: u32) -> [u8; 12] {
    let mut s = [0u8; 12];
    s[0..4].copy_from_slice(&ebx.to_le_bytes());
    s[4..8].copy_from_slice(&edx.to_le_bytes());
    s[8..12].copy_from_slice(&ecx.to_le_bytes());
    s
}

/// Maps the leaf 0 vendor string to a [`VendorId`].
///
/// `eax` (the highest standard leaf) does not take part in the match. Returns
/// [`VendorId::Unknown`] for strings not in the table.
pub fn detect_x86_vendor(_eax: u32, ebx: u32, ecx: u32, edx: u32) -> VendorId {
    let s = x86_vendor_string(ebx, ecx, edx);
    match X86_VENDOR_STRINGS.iter().find(|(name, _)| **name == s) {
        Some(&(_, vendor)) => vendor,
        None => {
            warn!(
                "unrecognized x86 vendor string {:?}",
                core::str::from_utf8(&s).unwrap_or("<non-ascii>")
            );
            VendorId::Unknown
        }
    }
}

/// Maps a MIDR_EL1 implementer byte to a [`VendorId`].
pub fn classify_arm_implementer(implementer: u8) -> VendorId {
    ARM_IMPLEMENTERS
        .iter()
        .find(|(code, _)| *code == implementer)
        .map(|&(_, vendor)| vendor)
        .unwrap_or(VendorId::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(name: &[u8; 12]) -> (u32, u32, u32) {
        let ebx = u32::from_le_bytes([name[0], name[1], name[2], name[3]]);
        let edx = u32::from_le_bytes([name[4], name[5], name[6], name[7]]);
        let ecx = u32::from_le_bytes([name[8], name[9], name[10], name[11]]);
        (ebx, ecx, edx)
    }

    #[test]
    fn test_detect_every_known_vendor_string() {
        for (name, vendor) in X86_VENDOR_STRINGS {
            let (ebx, ecx, edx) = pack(name);
            assert_eq!(detect_x86_vendor(0x16, ebx, ecx, edx), *vendor);
        }
    }

    #[test]
    fn test_detect_intel_from_real_registers() {
        // Leaf 0 of a Xeon Gold 6252.
        assert_eq!(
            detect_x86_vendor(0x16, 0x756e_6547, 0x6c65_746e, 0x4965_6e69),
            VendorId::Intel
        );
    }

    #[test]
    fn test_detect_unknown_vendor() {
        let (ebx, ecx, edx) = pack(b"NotARealCPU!");
        assert_eq!(detect_x86_vendor(1, ebx, ecx, edx), VendorId::Unknown);
    }

    #[test]
    fn test_register_order_matters() {
        // Swapping EDX and ECX must not still match.
        let (ebx, ecx, edx) = pack(b"GenuineIntel");
        assert_eq!(detect_x86_vendor(1, ebx, edx, ecx), VendorId::Unknown);
    }

    #[test]
    fn test_arm_implementers() {
        assert_eq!(classify_arm_implementer(0x61), VendorId::Apple);
        assert_eq!(classify_arm_implementer(0x41), VendorId::Arm);
        assert_eq!(classify_arm_implementer(0x51), VendorId::Qualcomm);
        assert_eq!(classify_arm_implementer(0xc0), VendorId::Ampere);
        assert_eq!(classify_arm_implementer(0x00), VendorId::Unknown);
    }

    #[test]
    fn test_vendor_raw_round_trip() {
        assert_eq!(VendorId::from_raw(u8::from(VendorId::Hygon)), VendorId::Hygon);
        assert_eq!(VendorId::from_raw(0xee), VendorId::Unknown);
    }
}
