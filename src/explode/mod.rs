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

//! Turns raw probe data into feature records.
//!
//! Both engines are pure: the same input always yields the same record.
//! Summary flags are computed after every probed bit is in place.

mod arm;
mod svm;
mod vmx;
mod x86;

pub use arm::{explode_arm_v8, pa_range_bits, va_range_bits};
pub use svm::SVM_FEATURE_LEAF;
pub use vmx::{IA32_VMX_PROCBASED_CTLS3, VmxMsrs};
pub use x86::{IA32_ARCH_CAPABILITIES, X86MsrProbe, explode_x86, explode_x86_with_msrs};

pub(crate) use arm::hide_arm_feature;
pub(crate) use x86::clear_feature_bits;

/// Safe-minimum address widths used when probe data does not report them.
pub mod defaults {
    pub use super::arm::{
        DEFAULT_LINEAR_ADDR_WIDTH as ARM_LINEAR_ADDR_WIDTH,
        DEFAULT_PHYS_ADDR_WIDTH as ARM_PHYS_ADDR_WIDTH,
    };
    pub use super::x86::{
        DEFAULT_LINEAR_ADDR_WIDTH as X86_LINEAR_ADDR_WIDTH,
        DEFAULT_PHYS_ADDR_WIDTH as X86_PHYS_ADDR_WIDTH,
    };
}
