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

use alloc::format;
use core::fmt::Debug;

use super::{ArmFeature, FeatureRecord, X86Feature};

/// The comparison result of two feature records.
pub struct FeatureRecordDiff {
    old: FeatureRecord,
    new: FeatureRecord,
}

impl FeatureRecordDiff {
    /// Creates a new `FeatureRecordDiff` by comparing two records.
    pub fn new(old: FeatureRecord, new: FeatureRecord) -> Self {
        FeatureRecordDiff { old, new }
    }

    /// Returns `true` if both records are identical.
    pub fn is_same(&self) -> bool {
        self.old == self.new
    }

    /// Names of the flags whose value differs, with `+` for flags only `new`
    /// has and `-` for flags only `old` has.
    pub fn changed_flags(&self) -> impl Iterator<Item = (char, &'static str)> + '_ {
        let x86 = match (&self.old, &self.new) {
            (FeatureRecord::X86(old), FeatureRecord::X86(new)) => Some((old, new)),
            _ => None,
        };
        let arm = match (&self.old, &self.new) {
            (FeatureRecord::ArmV8(old), FeatureRecord::ArmV8(new)) => Some((old, new)),
            _ => None,
        };

        let x86_changes = X86Feature::ALL.iter().filter_map(move |&feat| {
            let (old, new) = x86?;
            match (old.has(feat), new.has(feat)) {
                (false, true) => Some(('+', feat.name())),
                (true, false) => Some(('-', feat.name())),
                _ => None,
            }
        });
        let arm_changes = ArmFeature::ALL.iter().filter_map(move |&feat| {
            let (old, new) = arm?;
            match (old.has(feat), new.has(feat)) {
                (false, true) => Some(('+', feat.label())),
                (true, false) => Some(('-', feat.label())),
                _ => None,
            }
        });
        x86_changes.chain(arm_changes)
    }
}

impl Debug for FeatureRecordDiff {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let mut debug = f.debug_struct("FeatureRecordDiff");

        if self.old.architecture() != self.new.architecture() {
            debug.field(
                "architecture",
                &format!(
                    "{:?} -> {:?}",
                    self.old.architecture(),
                    self.new.architecture()
                ),
            );
            return debug.finish();
        }

        let (old, new) = (self.old.header(), self.new.header());
        if old.vendor != new.vendor {
            debug.field("vendor", &format!("{:?} -> {:?}", old.vendor, new.vendor));
        }
        if old.microarch != new.microarch {
            debug.field(
                "microarch",
                &format!("{:?} -> {:?}", old.microarch, new.microarch),
            );
        }
        if old.max_phys_addr_width != new.max_phys_addr_width {
            debug.field(
                "max_phys_addr_width",
                &format!("{} -> {}", old.max_phys_addr_width, new.max_phys_addr_width),
            );
        }
        if old.max_linear_addr_width != new.max_linear_addr_width {
            debug.field(
                "max_linear_addr_width",
                &format!(
                    "{} -> {}",
                    old.max_linear_addr_width, new.max_linear_addr_width
                ),
            );
        }

        for (sign, name) in self.changed_flags() {
            debug.field(name, &sign);
        }

        debug.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureRecordArmV8, FeatureRecordX86};

    #[test]
    fn test_diff_lists_changed_flags() {
        let mut old = FeatureRecordX86::default();
        old.set(X86Feature::Avx, true);
        old.set(X86Feature::Sse2, true);
        let mut new = old;
        new.set(X86Feature::Avx, false);
        new.set(X86Feature::Avx2, true);
        new.header.max_phys_addr_width = 40;

        let diff = FeatureRecordDiff::new(old.into(), new.into());
        assert!(!diff.is_same());
        let changes: Vec<_> = diff.changed_flags().collect();
        assert_eq!(changes, [('-', "avx"), ('+', "avx2")]);

        let text = format!("{:?}", diff);
        assert!(text.contains("max_phys_addr_width"));
        assert!(!text.contains("sse2"));
    }

    #[test]
    fn test_diff_across_architectures() {
        let diff = FeatureRecordDiff::new(
            FeatureRecordX86::default().into(),
            FeatureRecordArmV8::default().into(),
        );
        assert_eq!(diff.changed_flags().count(), 0);
        assert!(format!("{:?}", diff).contains("X86 -> Arm"));
    }

    #[test]
    fn test_diff_same() {
        let rec: FeatureRecord = FeatureRecordArmV8::default().into();
        assert!(FeatureRecordDiff::new(rec, rec).is_same());
    }
}
