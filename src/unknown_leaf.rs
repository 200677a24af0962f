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

//! Answers for CPUID leaves that are not in a leaf store.

use numeric_enum_macro::numeric_enum;
use raw_cpuid::CpuIdResult;

use crate::leaves::CpuidLeaf;

numeric_enum! {
    #[repr(u8)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum UnknownCpuidPolicy {
        /// Return the configured default quadruple.
        Defaults = 0,
        /// Echo EAX/EBX/EDX of the last standard leaf, ECX = 0.
        LastStandardLeaf = 1,
        /// As [`Self::LastStandardLeaf`], echoing the requested sub-leaf in ECX.
        LastStandardLeafWithEcx = 2,
        /// Return the live host values. Only valid when probing the host.
        PassThrough = 3,
    }
}

impl Default for UnknownCpuidPolicy {
    fn default() -> Self {
        Self::Defaults
    }
}

impl UnknownCpuidPolicy {
    /// Whether a guest-facing leaf table may use this policy.
    pub const fn is_guest_safe(self) -> bool {
        !matches!(self, Self::PassThrough)
    }
}

/// Computes the registers returned for an unknown `leaf`.
///
/// `last_std` is the highest standard leaf of the table; when it is absent the
/// echoing policies fall back to `defaults`. `host` is only consulted by
/// [`UnknownCpuidPolicy::PassThrough`].
pub fn resolve_unknown_leaf(
    policy: UnknownCpuidPolicy,
    leaf: u32,
    sub_leaf: u32,
    defaults: CpuIdResult,
    last_std: Option<&CpuidLeaf>,
    host: Option<CpuIdResult>,
) -> CpuIdResult {
    let res = match (policy, last_std) {
        (UnknownCpuidPolicy::Defaults, _) => defaults,
        (UnknownCpuidPolicy::LastStandardLeaf, Some(last)) => CpuIdResult {
            eax: last.eax,
            ebx: last.ebx,
            ecx: 0,
            edx: last.edx,
        },
        (UnknownCpuidPolicy::LastStandardLeafWithEcx, Some(last)) => CpuIdResult {
            eax: last.eax,
            ebx: last.ebx,
            ecx: sub_leaf & 0xff,
            edx: last.edx,
        },
        (
            UnknownCpuidPolicy::LastStandardLeaf | UnknownCpuidPolicy::LastStandardLeafWithEcx,
            None,
        ) => defaults,
        (UnknownCpuidPolicy::PassThrough, _) => match host {
            Some(host) => host,
            None => {
                warn!("PassThrough for leaf {leaf:#x} without host values, using defaults");
                defaults
            }
        },
    };
    trace!(
        "unknown leaf {:#x}.{:#x} ({:?}) -> {:#x} {:#x} {:#x} {:#x}",
        leaf, sub_leaf, policy, res.eax, res.ebx, res.ecx, res.edx
    );
    res
}

/// An unknown-leaf policy bound to its default registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownLeafResolver {
    pub policy: UnknownCpuidPolicy,
    pub defaults: CpuIdResult,
}

impl UnknownLeafResolver {
    pub const fn new(policy: UnknownCpuidPolicy, defaults: CpuIdResult) -> Self {
        Self { policy, defaults }
    }

    pub fn resolve(
        &self,
        leaf: u32,
        sub_leaf: u32,
        last_std: Option<&CpuidLeaf>,
        host: Option<CpuIdResult>,
    ) -> CpuIdResult {
        resolve_unknown_leaf(self.policy, leaf, sub_leaf, self.defaults, last_std, host)
    }
}

impl Default for UnknownLeafResolver {
    fn default() -> Self {
        Self::new(UnknownCpuidPolicy::Defaults, zero_result())
    }
}

pub(crate) const fn zero_result() -> CpuIdResult {
    CpuIdResult {
        eax: 0,
        ebx: 0,
        ecx: 0,
        edx: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULTS: CpuIdResult = CpuIdResult {
        eax: 0xa,
        ebx: 0xb,
        ecx: 0xc,
        edx: 0xd,
    };
    const LAST: CpuidLeaf = CpuidLeaf::simple(0x16, 1, 2, 0x55, 3);

    fn regs(r: CpuIdResult) -> [u32; 4] {
        [r.eax, r.ebx, r.ecx, r.edx]
    }

    #[test]
    fn test_defaults() {
        let r = resolve_unknown_leaf(
            UnknownCpuidPolicy::Defaults,
            0x20,
            0,
            DEFAULTS,
            Some(&LAST),
            None,
        );
        assert_eq!(regs(r), [0xa, 0xb, 0xc, 0xd]);
    }

    #[test]
    fn test_last_standard_leaf() {
        let r = resolve_unknown_leaf(
            UnknownCpuidPolicy::LastStandardLeaf,
            0x20,
            7,
            DEFAULTS,
            Some(&LAST),
            None,
        );
        assert_eq!(regs(r), [1, 2, 0, 3]);
    }

    #[test]
    fn test_last_standard_leaf_with_ecx() {
        let r = resolve_unknown_leaf(
            UnknownCpuidPolicy::LastStandardLeafWithEcx,
            0x20,
            7,
            DEFAULTS,
            Some(&LAST),
            None,
        );
        assert_eq!(regs(r), [1, 2, 7, 3]);
        let r = resolve_unknown_leaf(
            UnknownCpuidPolicy::LastStandardLeafWithEcx,
            0x20,
            0x1234,
            DEFAULTS,
            Some(&LAST),
            None,
        );
        assert_eq!(r.ecx, 0x34);
    }

    #[test]
    fn test_echo_without_last_leaf() {
        let r = resolve_unknown_leaf(
            UnknownCpuidPolicy::LastStandardLeaf,
            0x20,
            0,
            DEFAULTS,
            None,
            None,
        );
        assert_eq!(regs(r), regs(DEFAULTS));
    }

    #[test]
    fn test_pass_through() {
        let host = CpuIdResult {
            eax: 9,
            ebx: 8,
            ecx: 7,
            edx: 6,
        };
        let r = resolve_unknown_leaf(
            UnknownCpuidPolicy::PassThrough,
            0x20,
            0,
            DEFAULTS,
            Some(&LAST),
            Some(host),
        );
        assert_eq!(regs(r), [9, 8, 7, 6]);
        let r = resolve_unknown_leaf(
            UnknownCpuidPolicy::PassThrough,
            0x20,
            0,
            DEFAULTS,
            Some(&LAST),
            None,
        );
        assert_eq!(regs(r), regs(DEFAULTS));
        assert!(!UnknownCpuidPolicy::PassThrough.is_guest_safe());
    }

    #[test]
    fn test_deterministic() {
        let resolver =
            UnknownLeafResolver::new(UnknownCpuidPolicy::LastStandardLeafWithEcx, DEFAULTS);
        let first = resolver.resolve(0x30, 3, Some(&LAST), None);
        for _ in 0..8 {
            assert_eq!(resolver.resolve(0x30, 3, Some(&LAST), None), first);
        }
    }

    #[test]
    fn test_policy_raw_values() {
        assert_eq!(u8::from(UnknownCpuidPolicy::LastStandardLeafWithEcx), 2);
        assert_eq!(UnknownCpuidPolicy::try_from(3u8), Ok(UnknownCpuidPolicy::PassThrough));
        assert!(UnknownCpuidPolicy::try_from(4u8).is_err());
    }
}
