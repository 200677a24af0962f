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

//! Raw x86 CPUID leaf store.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use bitflags::bitflags;
use raw_cpuid::{CpuIdReader, CpuIdResult};
use static_assertions::const_assert_eq;

use crate::error::ExplodeError;

/// First extended leaf.
pub const EXTENDED_LEAF_BASE: u32 = 0x8000_0000;
/// Hypervisor leaf range.
pub const HYPERVISOR_LEAF_FIRST: u32 = 0x4000_0000;
pub const HYPERVISOR_LEAF_LAST: u32 = 0x4000_00ff;

bitflags! {
    /// Per-leaf quirks. Wire bits 4..=31 are reserved and must be zero.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CpuidLeafFlags: u32 {
        /// Intel topology leaf: ECX[7:0] of every sub-leaf echoes the sub-leaf.
        const INTEL_TOPOLOGY_SUBLEAVES = 1 << 0;
        /// The leaf reports the initial APIC ID of the querying vCPU.
        const CONTAINS_APIC_ID = 1 << 1;
        /// The leaf reports CR4.OSXSAVE of the querying vCPU.
        const CONTAINS_OSXSAVE = 1 << 2;
        /// The leaf reports the APIC enable bit of IA32_APIC_BASE.
        const CONTAINS_APIC = 1 << 3;
    }
}

/// One CPUID leaf / sub-leaf with its four output registers.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CpuidLeaf {
    pub leaf: u32,
    pub sub_leaf: u32,
    /// Applied to the requested sub-leaf before matching; 0 if the leaf has
    /// no sub-leaves.
    pub sub_leaf_mask: u32,
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub flags: CpuidLeafFlags,
}

const_assert_eq!(core::mem::size_of::<CpuidLeaf>(), 32);

impl CpuidLeaf {
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        leaf: u32,
        sub_leaf: u32,
        sub_leaf_mask: u32,
        eax: u32,
        ebx: u32,
        ecx: u32,
        edx: u32,
        flags: CpuidLeafFlags,
    ) -> Self {
        Self {
            leaf,
            sub_leaf,
            sub_leaf_mask,
            eax,
            ebx,
            ecx,
            edx,
            flags,
        }
    }

    /// A leaf without sub-leaves or quirks.
    pub const fn simple(leaf: u32, eax: u32, ebx: u32, ecx: u32, edx: u32) -> Self {
        Self::new(leaf, 0, 0, eax, ebx, ecx, edx, CpuidLeafFlags::empty())
    }

    pub const fn key(&self) -> (u32, u32) {
        (self.leaf, self.sub_leaf)
    }

    pub const fn result(&self) -> CpuIdResult {
        CpuIdResult {
            eax: self.eax,
            ebx: self.ebx,
            ecx: self.ecx,
            edx: self.edx,
        }
    }

    /// Does this entry answer a query for `sub_leaf`?
    pub const fn matches_sub_leaf(&self, sub_leaf: u32) -> bool {
        self.sub_leaf_mask == 0 || sub_leaf & self.sub_leaf_mask == self.sub_leaf
    }

    pub const fn to_wire(&self) -> [u32; 8] {
        [
            self.leaf,
            self.sub_leaf,
            self.sub_leaf_mask,
            self.eax,
            self.ebx,
            self.ecx,
            self.edx,
            self.flags.bits(),
        ]
    }

    /// Decodes the 8-word wire form; `None` if reserved flag bits are set.
    pub fn from_wire(w: [u32; 8]) -> Option<Self> {
        let flags = CpuidLeafFlags::from_bits(w[7])?;
        Some(Self::new(w[0], w[1], w[2], w[3], w[4], w[5], w[6], flags))
    }
}

/// Verifies that `leaves` is sorted by (leaf, sub-leaf) without duplicates.
pub fn check_leaf_order(leaves: &[CpuidLeaf]) -> Result<(), ExplodeError> {
    match leaves.windows(2).position(|w| w[0].key() >= w[1].key()) {
        Some(i) => Err(ExplodeError::InconsistentLeafOrder { index: i + 1 }),
        None => Ok(()),
    }
}

/// Binary-searchable lookup over a sorted leaf slice, following the hardware
/// rule that the sub-leaf is ignored for leaves without a mask.
pub fn lookup_leaf(leaves: &[CpuidLeaf], leaf: u32, sub_leaf: u32) -> Option<&CpuidLeaf> {
    let start = leaves.partition_point(|l| l.leaf < leaf);
    leaves[start..]
        .iter()
        .take_while(|l| l.leaf == leaf)
        .find(|l| l.matches_sub_leaf(sub_leaf))
}

/// A sorted, duplicate-free collection of CPUID leaves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuidLeafStore {
    leaves: Vec<CpuidLeaf>,
}

impl CpuidLeafStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from already sorted leaves.
    pub fn from_sorted(leaves: &[CpuidLeaf]) -> Result<Self, ExplodeError> {
        check_leaf_order(leaves)?;
        Ok(Self {
            leaves: leaves.to_vec(),
        })
    }

    pub fn as_slice(&self) -> &[CpuidLeaf] {
        &self.leaves
    }

    pub fn iter(&self) -> impl Iterator<Item = &CpuidLeaf> {
        self.leaves.iter()
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn lookup(&self, leaf: u32, sub_leaf: u32) -> Option<&CpuidLeaf> {
        lookup_leaf(&self.leaves, leaf, sub_leaf)
    }

    /// Every entry of `leaf`, lowest sub-leaf first.
    pub fn sub_leaves(&self, leaf: u32) -> &[CpuidLeaf] {
        let start = self.leaves.partition_point(|l| l.leaf < leaf);
        let end = self.leaves.partition_point(|l| l.leaf <= leaf);
        &self.leaves[start..end]
    }

    pub fn get_exact(&self, leaf: u32, sub_leaf: u32) -> Option<&CpuidLeaf> {
        self.leaves
            .binary_search_by_key(&(leaf, sub_leaf), CpuidLeaf::key)
            .ok()
            .map(|i| &self.leaves[i])
    }

    pub fn get_exact_mut(&mut self, leaf: u32, sub_leaf: u32) -> Option<&mut CpuidLeaf> {
        self.leaves
            .binary_search_by_key(&(leaf, sub_leaf), CpuidLeaf::key)
            .ok()
            .map(|i| &mut self.leaves[i])
    }

    /// Inserts `entry`, replacing any entry with the same (leaf, sub-leaf).
    pub fn insert(&mut self, entry: CpuidLeaf) {
        match self.leaves.binary_search_by_key(&entry.key(), CpuidLeaf::key) {
            Ok(i) => self.leaves[i] = entry,
            Err(i) => self.leaves.insert(i, entry),
        }
    }

    /// Removes every sub-leaf of every leaf in `first..=last`.
    pub fn remove_range(&mut self, first: u32, last: u32) {
        self.leaves.retain(|l| l.leaf < first || l.leaf > last);
    }

    /// Applies `f` to every entry of `leaf`.
    pub fn modify_leaf(&mut self, leaf: u32, mut f: impl FnMut(&mut CpuidLeaf)) {
        self.leaves.iter_mut().filter(|l| l.leaf == leaf).for_each(|l| f(l));
    }

    /// EAX of leaf 0.
    pub fn max_standard_leaf(&self) -> Option<u32> {
        self.get_exact(0, 0).map(|l| l.eax)
    }

    /// EAX of leaf 0x8000_0000, if it reports a valid extended range.
    pub fn max_extended_leaf(&self) -> Option<u32> {
        self.get_exact(EXTENDED_LEAF_BASE, 0)
            .map(|l| l.eax)
            .filter(|&eax| eax >= EXTENDED_LEAF_BASE)
    }

    /// Sub-leaf 0 (or the first sub-leaf) of the highest standard leaf present.
    pub fn last_standard_leaf(&self) -> Option<&CpuidLeaf> {
        let end = self.leaves.partition_point(|l| l.leaf < HYPERVISOR_LEAF_FIRST);
        let last = self.leaves[..end].last()?;
        let start = self.leaves[..end].partition_point(|l| l.leaf < last.leaf);
        Some(&self.leaves[start])
    }

    /// A reader usable with [`raw_cpuid::CpuId::with_cpuid_reader`].
    pub fn reader(&self) -> LeafStoreReader<'_> {
        LeafStoreReader(self)
    }
}

impl TryFrom<Vec<CpuidLeaf>> for CpuidLeafStore {
    type Error = ExplodeError;

    fn try_from(leaves: Vec<CpuidLeaf>) -> Result<Self, ExplodeError> {
        check_leaf_order(&leaves)?;
        Ok(Self { leaves })
    }
}

/// Answers `cpuid` from a [`CpuidLeafStore`]; misses read as zero.
#[derive(Debug, Clone, Copy)]
pub struct LeafStoreReader<'a>(&'a CpuidLeafStore);

impl CpuIdReader for LeafStoreReader<'_> {
    fn cpuid2(&self, eax: u32, ecx: u32) -> CpuIdResult {
        self.0.lookup(eax, ecx).map(CpuidLeaf::result).unwrap_or(CpuIdResult {
            eax: 0,
            ebx: 0,
            ecx: 0,
            edx: 0,
        })
    }
}

/// A master leaf store plus per-CPU override stores.
#[derive(Debug, Clone, Default)]
pub struct CpuidLeafCollection {
    master: CpuidLeafStore,
    per_cpu: BTreeMap<u32, CpuidLeafStore>,
}

impl CpuidLeafCollection {
    pub fn new(master: CpuidLeafStore) -> Self {
        Self {
            master,
            per_cpu: BTreeMap::new(),
        }
    }

    pub fn master(&self) -> &CpuidLeafStore {
        &self.master
    }

    pub fn master_mut(&mut self) -> &mut CpuidLeafStore {
        &mut self.master
    }

    /// Sets an override leaf for one CPU.
    pub fn set_override(&mut self, cpu: u32, entry: CpuidLeaf) {
        self.per_cpu.entry(cpu).or_default().insert(entry);
    }

    pub fn overrides(&self, cpu: u32) -> Option<&CpuidLeafStore> {
        self.per_cpu.get(&cpu)
    }

    pub fn clear_overrides(&mut self) {
        self.per_cpu.clear();
    }

    /// Looks a leaf up for `cpu`, preferring its override store.
    pub fn lookup_for_cpu(&self, cpu: u32, leaf: u32, sub_leaf: u32) -> Option<&CpuidLeaf> {
        self.per_cpu
            .get(&cpu)
            .and_then(|store| store.lookup(leaf, sub_leaf))
            .or_else(|| self.master.lookup(leaf, sub_leaf))
    }
}
