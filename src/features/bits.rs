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

/// A fixed-size set of single-bit capability flags stored as `W` little-endian
/// `u64` words. Bit `n` lives in word `n / 64` at position `n % 64`.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureBits<const W: usize>([u64; W]);

impl<const W: usize> Default for FeatureBits<W> {
    fn default() -> Self {
        Self([0; W])
    }
}

impl<const W: usize> FeatureBits<W> {
    pub const BITS: usize = W * 64;

    pub const fn empty() -> Self {
        Self([0; W])
    }

    pub const fn from_words(words: [u64; W]) -> Self {
        Self(words)
    }

    pub const fn words(&self) -> &[u64; W] {
        &self.0
    }

    pub const fn get(&self, bit: usize) -> bool {
        self.0[bit / 64] & (1 << (bit % 64)) != 0
    }

    pub fn set(&mut self, bit: usize, value: bool) {
        let mask = 1u64 << (bit % 64);
        if value {
            self.0[bit / 64] |= mask;
        } else {
            self.0[bit / 64] &= !mask;
        }
    }

    /// Clears every word whose index is not below `keep_words`.
    pub fn truncate_words(&mut self, keep_words: usize) {
        for word in self.0.iter_mut().skip(keep_words) {
            *word = 0;
        }
    }

    pub fn count(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&w| w == 0)
    }

    /// Bits set in `self` but not in `other`.
    pub fn difference(&self, other: &Self) -> Self {
        let mut out = *self;
        for (w, o) in out.0.iter_mut().zip(other.0.iter()) {
            *w &= !o;
        }
        out
    }

    /// Iterates over the indices of all set bits, lowest first.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().enumerate().flat_map(|(i, &word)| {
            (0..64).filter(move |b| word & (1 << b) != 0).map(move |b| i * 64 + b)
        })
    }
}

impl<const W: usize> Debug for FeatureBits<W> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Declares a `#[repr(u16)]` enum of feature flags whose discriminants are bit
/// positions inside a [`FeatureBits`] of `$words` words.
///
/// Flags are written in `snake_case`; the enum variant is the `CamelCase` form,
/// `name()` returns the `snake_case` form and `label` the upper-case form with
/// the given prefix. A flag may pin its bit position with `= N`; the flags after
/// it continue from there. Positions past the container are rejected at compile
/// time, as are duplicates.
macro_rules! define_features {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident: $words:literal words, label $prefix:literal {
            $(
                $(#[$fmeta:meta])*
                $feat:ident $(= $bit:literal)?,
            )*
        }
    ) => {
        paste::paste! {
            $(#[$meta])*
            #[repr(u16)]
            #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
            $vis enum $name {
                $(
                    $(#[$fmeta])*
                    [<$feat:camel>] $(= $bit)?,
                )*
            }

            impl $name {
                /// Every flag in declaration order.
                pub const ALL: &'static [Self] = &[$(Self::[<$feat:camel>],)*];
                pub const COUNT: usize = Self::ALL.len();
                pub const WORDS: usize = $words;

                /// Bit position inside the record's flag words.
                pub const fn bit(self) -> usize {
                    self as usize
                }

                pub const fn name(self) -> &'static str {
                    match self {
                        $(Self::[<$feat:camel>] => stringify!($feat),)*
                    }
                }

                pub const fn label(self) -> &'static str {
                    match self {
                        $(Self::[<$feat:camel>] => concat!($prefix, stringify!([<$feat:upper>])),)*
                    }
                }

                pub fn from_name(name: &str) -> Option<Self> {
                    match name {
                        $(stringify!($feat) => Some(Self::[<$feat:camel>]),)*
                        _ => None,
                    }
                }

                /// Looks a flag up by bit position.
                pub fn from_bit(bit: usize) -> Option<Self> {
                    Self::ALL.iter().copied().find(|f| f.bit() == bit)
                }
            }

            const _: () = {
                let mut i = 0;
                while i < $name::ALL.len() {
                    assert!(($name::ALL[i] as usize) < $words * 64);
                    i += 1;
                }
            };
        }
    };
}

pub(crate) use define_features;

#[cfg(test)]
mod tests {
    use super::*;

    define_features! {
        enum Sample: 2 words, label "S_" {
            alpha,
            beta_gamma,
            pinned = 64,
            after_pinned,
        }
    }

    #[test]
    fn test_bits_set_get_clear() {
        let mut bits = FeatureBits::<2>::default();
        assert!(bits.is_empty());
        bits.set(0, true);
        bits.set(70, true);
        assert!(bits.get(0));
        assert!(bits.get(70));
        assert!(!bits.get(69));
        assert_eq!(bits.words(), &[1, 1 << 6]);
        bits.set(0, false);
        assert_eq!(bits.iter().collect::<Vec<_>>(), [70]);
        assert_eq!(bits.count(), 1);
    }

    #[test]
    fn test_truncate_and_difference() {
        let mut bits = FeatureBits::from_words([0b11, 0b1]);
        let other = FeatureBits::from_words([0b01, 0]);
        assert_eq!(bits.difference(&other).words(), &[0b10, 0b1]);
        bits.truncate_words(1);
        assert_eq!(bits.words(), &[0b11, 0]);
    }

    #[test]
    fn test_generated_enum() {
        assert_eq!(Sample::COUNT, 4);
        assert_eq!(Sample::BetaGamma.bit(), 1);
        assert_eq!(Sample::Pinned.bit(), 64);
        assert_eq!(Sample::AfterPinned.bit(), 65);
        assert_eq!(Sample::BetaGamma.name(), "beta_gamma");
        assert_eq!(Sample::BetaGamma.label(), "S_BETA_GAMMA");
        assert_eq!(Sample::from_name("alpha"), Some(Sample::Alpha));
        assert_eq!(Sample::from_name("Alpha"), None);
        assert_eq!(Sample::from_bit(65), Some(Sample::AfterPinned));
        assert_eq!(Sample::from_bit(2), None);
    }
}
