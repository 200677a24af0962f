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

//! ARMv8 ID system registers.

use alloc::vec::Vec;
use core::fmt;

use bit_field::BitField;

use crate::error::{CpuDbError, ExplodeError};

/// A system register identifier, packed as
/// `op0 << 14 | op1 << 11 | CRn << 7 | CRm << 3 | op2`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdRegister(u32);

macro_rules! id_registers {
    ($($name:ident = ($op0:expr, $op1:expr, $crn:expr, $crm:expr, $op2:expr);)*) => {
        impl IdRegister {
            $(pub const $name: Self = Self::new($op0, $op1, $crn, $crm, $op2);)*

            /// Architectural name, if this is one of the named registers.
            pub fn name(self) -> Option<&'static str> {
                match self {
                    $(Self::$name => Some(stringify!($name)),)*
                    _ => None,
                }
            }
        }
    };
}

id_registers! {
    MIDR_EL1 = (3, 0, 0, 0, 0);
    MPIDR_EL1 = (3, 0, 0, 0, 5);
    REVIDR_EL1 = (3, 0, 0, 0, 6);
    ID_AA64PFR0_EL1 = (3, 0, 0, 4, 0);
    ID_AA64PFR1_EL1 = (3, 0, 0, 4, 1);
    ID_AA64PFR2_EL1 = (3, 0, 0, 4, 2);
    ID_AA64ZFR0_EL1 = (3, 0, 0, 4, 4);
    ID_AA64SMFR0_EL1 = (3, 0, 0, 4, 5);
    ID_AA64DFR0_EL1 = (3, 0, 0, 5, 0);
    ID_AA64DFR1_EL1 = (3, 0, 0, 5, 1);
    ID_AA64ISAR0_EL1 = (3, 0, 0, 6, 0);
    ID_AA64ISAR1_EL1 = (3, 0, 0, 6, 1);
    ID_AA64ISAR2_EL1 = (3, 0, 0, 6, 2);
    ID_AA64MMFR0_EL1 = (3, 0, 0, 7, 0);
    ID_AA64MMFR1_EL1 = (3, 0, 0, 7, 1);
    ID_AA64MMFR2_EL1 = (3, 0, 0, 7, 2);
    ID_AA64MMFR3_EL1 = (3, 0, 0, 7, 3);
    ID_AA64MMFR4_EL1 = (3, 0, 0, 7, 4);
    CTR_EL0 = (3, 3, 0, 0, 1);
    DCZID_EL0 = (3, 3, 0, 0, 7);
}

impl IdRegister {
    pub const fn new(op0: u32, op1: u32, crn: u32, crm: u32, op2: u32) -> Self {
        Self(
            (op0 & 0x3) << 14
                | (op1 & 0x7) << 11
                | (crn & 0xf) << 7
                | (crm & 0xf) << 3
                | (op2 & 0x7),
        )
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw & 0xffff)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub fn op0(self) -> u32 {
        self.0.get_bits(14..16)
    }

    pub fn op1(self) -> u32 {
        self.0.get_bits(11..14)
    }

    pub fn crn(self) -> u32 {
        self.0.get_bits(7..11)
    }

    pub fn crm(self) -> u32 {
        self.0.get_bits(3..7)
    }

    pub fn op2(self) -> u32 {
        self.0.get_bits(0..3)
    }
}

impl fmt::Debug for IdRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(
                f,
                "S{}_{}_C{}_C{}_{}",
                self.op0(),
                self.op1(),
                self.crn(),
                self.crm(),
                self.op2()
            ),
        }
    }
}

/// A validated `MIDR_EL1` value. Bits 63:32 are RES0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Midr(u32);

impl Midr {
    pub fn new(raw: u64) -> Result<Self, CpuDbError> {
        u32::try_from(raw)
            .map(Self)
            .map_err(|_| CpuDbError::MalformedMidr(raw))
    }

    /// Assembles a MIDR from its fields; architecture is 0xf (ID registers).
    pub const fn from_parts(implementer: u8, variant: u8, part_num: u16, revision: u8) -> Self {
        Self(
            (implementer as u32) << 24
                | ((variant as u32) & 0xf) << 20
                | 0xf << 16
                | ((part_num as u32) & 0xfff) << 4
                | ((revision as u32) & 0xf),
        )
    }

    pub const fn raw(self) -> u64 {
        self.0 as u64
    }

    pub fn implementer(self) -> u8 {
        self.0.get_bits(24..32) as u8
    }

    pub fn variant(self) -> u8 {
        self.0.get_bits(20..24) as u8
    }

    pub fn architecture(self) -> u8 {
        self.0.get_bits(16..20) as u8
    }

    pub fn part_num(self) -> u16 {
        self.0.get_bits(4..16) as u16
    }

    pub fn revision(self) -> u8 {
        self.0.get_bits(0..4) as u8
    }
}

/// One ID register and its 64-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdRegValue {
    pub reg: IdRegister,
    pub value: u64,
}

impl IdRegValue {
    pub const fn new(reg: IdRegister, value: u64) -> Self {
        Self { reg, value }
    }
}

/// Reads the unsigned 4-bit ID field at `shift`.
pub fn id_field(value: u64, shift: usize) -> u8 {
    value.get_bits(shift..shift + 4) as u8
}

/// Reads the signed 4-bit ID field at `shift` (0xf reads as -1).
pub fn id_field_signed(value: u64, shift: usize) -> i8 {
    ((id_field(value, shift) << 4) as i8) >> 4
}

/// Verifies that `regs` is sorted by register id without duplicates.
pub fn check_reg_order(regs: &[IdRegValue]) -> Result<(), ExplodeError> {
    match regs.windows(2).position(|w| w[0].reg >= w[1].reg) {
        Some(i) => Err(ExplodeError::InconsistentLeafOrder { index: i + 1 }),
        None => Ok(()),
    }
}

/// A sorted, duplicate-free set of ID register values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdRegStore {
    regs: Vec<IdRegValue>,
}

impl IdRegStore {
    pub fn from_sorted(regs: &[IdRegValue]) -> Result<Self, ExplodeError> {
        check_reg_order(regs)?;
        Ok(Self {
            regs: regs.to_vec(),
        })
    }

    pub fn as_slice(&self) -> &[IdRegValue] {
        &self.regs
    }

    pub fn len(&self) -> usize {
        self.regs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    pub fn get(&self, reg: IdRegister) -> Option<u64> {
        lookup_reg(&self.regs, reg)
    }

    pub fn insert(&mut self, value: IdRegValue) {
        match self.regs.binary_search_by_key(&value.reg, |r| r.reg) {
            Ok(i) => self.regs[i] = value,
            Err(i) => self.regs.insert(i, value),
        }
    }

    /// Returns a copy with `overrides` applied on top.
    pub fn with_overrides(&self, overrides: &[IdRegValue]) -> Self {
        let mut merged = self.clone();
        for &value in overrides {
            merged.insert(value);
        }
        merged
    }
}

/// Binary search over a sorted register slice.
pub fn lookup_reg(regs: &[IdRegValue], reg: IdRegister) -> Option<u64> {
    regs.binary_search_by_key(&reg, |r| r.reg)
        .ok()
        .map(|i| regs[i].value)
}
