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

//! Scoring used by the best-effort catalog lookups.

use alloc::vec::Vec;

use super::{CpuDbEntry, CpuDbEntryArm};
use crate::idregs::Midr;

/// Score of a MIDR that matches a core variant exactly.
pub const MIDR_EXACT_SCORE: u32 = 0x1_0000;

const MIDR_PART_WEIGHT: u32 = 0x1000;
const MIDR_VARIANT_WEIGHT: u32 = 0x10;

const RUN_WEIGHT: u32 = 100;
const SHARED_WEIGHT: u32 = 10;
const HINT_EXACT: u32 = 20;
const PROXIMITY_MAX: u32 = 9;

/// Marketing noise that carries no identity.
const NOISE: &[&str] = &["tm", "cpu", "processor", "with", "core"];

/// Hardware identity used as proximity signal by the name lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchHint {
    X86 { family: u8, model: u8 },
    Arm { part_num: u16 },
}

/// Result of a MIDR lookup.
#[derive(Debug, Clone, Copy)]
pub struct MidrMatch {
    pub entry: &'static CpuDbEntry,
    pub arm: &'static CpuDbEntryArm,
    /// Index into [`CpuDbEntryArm::variants`].
    pub core_variant: usize,
    pub score: u32,
}

fn tokens(s: &str) -> Vec<&str> {
    s.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| t.len() >= 2 && !NOISE.iter().any(|n| t.eq_ignore_ascii_case(n)))
        .collect()
}

/// Leading digits of `token`, if there are at least three of them.
fn model_number(token: &str) -> Option<u32> {
    let digits = token.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end < 3 {
        return None;
    }
    digits[..end].parse().ok()
}

fn same(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Longest run of consecutive tokens shared by `q` and `c`.
fn longest_run(q: &[&str], c: &[&str]) -> u32 {
    let mut best = 0;
    for i in 0..q.len() {
        for j in 0..c.len() {
            let run = q[i..]
                .iter()
                .zip(&c[j..])
                .take_while(|(a, b)| same(a, b))
                .count();
            best = best.max(run);
        }
    }
    best as u32
}

fn token_score(q: &[&str], c: &[&str]) -> u32 {
    let shared = q.iter().filter(|t| c.iter().any(|u| same(t, u))).count() as u32;
    longest_run(q, c) * RUN_WEIGHT + shared * SHARED_WEIGHT
}

/// Closeness of two numbers, `PROXIMITY_MAX` when equal, 0 when `scale * 9` apart.
fn proximity(a: u32, b: u32, scale: u32) -> u32 {
    PROXIMITY_MAX.saturating_sub(a.abs_diff(b) / scale)
}

fn numeric_score(q: &[&str], c: &[&str]) -> u32 {
    q.iter()
        .filter_map(|t| model_number(t))
        .flat_map(|a| c.iter().filter_map(|t| model_number(t)).map(move |b| proximity(a, b, 100)))
        .max()
        .unwrap_or(0)
}

fn hint_score(entry: &CpuDbEntry, hint: MatchHint) -> u32 {
    match (entry, hint) {
        (CpuDbEntry::X86(e), MatchHint::X86 { family, model }) => {
            if e.family != family {
                return 0;
            }
            HINT_EXACT
                + if e.model == model {
                    HINT_EXACT
                } else {
                    proximity(e.model.into(), model.into(), 1)
                }
        }
        (CpuDbEntry::Arm(e), MatchHint::Arm { part_num }) => e
            .variants
            .iter()
            .map(|v| {
                let part = v.midr.part_num();
                if part == part_num {
                    2 * HINT_EXACT
                } else {
                    proximity(part.into(), part_num.into(), 1)
                }
            })
            .max()
            .unwrap_or(0),
        _ => 0,
    }
}

/// Score of `entry` for the user supplied `name`; 0 means no resemblance.
pub(super) fn name_score(name: &str, entry: &CpuDbEntry, hint: Option<MatchHint>) -> u32 {
    let q = tokens(name);
    let short = tokens(entry.short_name());
    let full = tokens(entry.full_name());
    let text = token_score(&q, &short).max(token_score(&q, &full));
    let extra = match hint {
        Some(hint) => hint_score(entry, hint),
        None => numeric_score(&q, &short).max(numeric_score(&q, &full)),
    };
    let score = text + extra;
    trace!("{:?} vs {}: {}", name, entry.short_name(), score);
    score
}

/// Distance-based score of `midr` against a variant pattern. `None` when the
/// implementers differ.
pub(super) fn midr_score(midr: Midr, pattern: Midr) -> Option<u32> {
    if midr.implementer() != pattern.implementer() {
        return None;
    }
    let mut distance = 0;
    if midr.part_num() != pattern.part_num() {
        distance += MIDR_PART_WEIGHT + u32::from(midr.part_num().abs_diff(pattern.part_num()));
    }
    distance += MIDR_VARIANT_WEIGHT * u32::from(midr.variant().abs_diff(pattern.variant()));
    distance += u32::from(midr.revision().abs_diff(pattern.revision()));
    Some(MIDR_EXACT_SCORE - distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens() {
        assert_eq!(
            tokens("Intel(R) Core(TM) i7-6700K CPU @ 4.00GHz"),
            ["Intel", "i7", "6700K", "00GHz"]
        );
        assert_eq!(tokens("Intel_Core_i7_6700K"), ["Intel", "i7", "6700K"]);
    }

    #[test]
    fn test_model_number() {
        assert_eq!(model_number("6700K"), Some(6700));
        assert_eq!(model_number("i7"), None);
        assert_eq!(model_number("E5"), None);
        assert_eq!(model_number("W3520"), Some(3520));
    }

    #[test]
    fn test_run_beats_scattered_tokens() {
        let q = tokens("core i7 6700k");
        let run = token_score(&q, &tokens("intel i7 6700K"));
        let scattered = token_score(&q, &tokens("6700K intel i7x i7"));
        assert!(run > scattered);
    }

    #[test]
    fn test_midr_distance() {
        let pattern = Midr::from_parts(0x61, 1, 0x023, 1);
        assert_eq!(midr_score(pattern, pattern), Some(MIDR_EXACT_SCORE));
        let rev = midr_score(Midr::from_parts(0x61, 1, 0x023, 0), pattern).unwrap();
        let var = midr_score(Midr::from_parts(0x61, 0, 0x023, 1), pattern).unwrap();
        let part = midr_score(Midr::from_parts(0x61, 1, 0x022, 1), pattern).unwrap();
        assert!(rev > var && var > part);
        assert_eq!(midr_score(Midr::from_parts(0x41, 1, 0x023, 1), pattern), None);
    }
}
