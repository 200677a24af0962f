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

//! VMX capability MSRs and their mapping onto VMX feature flags.

use bit_field::BitField;
use x86::msr;

use crate::features::{FeatureRecordX86, X86Feature};

/// IA32_VMX_PROCBASED_CTLS3
pub const IA32_VMX_PROCBASED_CTLS3: u32 = 0x492;

/// Raw values of the VMX capability MSRs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VmxMsrs {
    pub basic: u64,
    pub pinbased_ctls: u64,
    pub procbased_ctls: u64,
    pub procbased_ctls2: u64,
    /// All 64 bits are allowed-1 settings.
    pub procbased_ctls3: u64,
    pub exit_ctls: u64,
    pub entry_ctls: u64,
    pub true_pinbased_ctls: u64,
    pub true_procbased_ctls: u64,
    pub true_exit_ctls: u64,
    pub true_entry_ctls: u64,
    pub misc: u64,
    pub ept_vpid_cap: u64,
    pub vmfunc: u64,
}

impl VmxMsrs {
    /// Collects the capability MSRs through `read`, which gets an MSR index.
    pub fn read_with(mut read: impl FnMut(u32) -> u64) -> Self {
        Self {
            basic: read(msr::IA32_VMX_BASIC),
            pinbased_ctls: read(msr::IA32_VMX_PINBASED_CTLS),
            procbased_ctls: read(msr::IA32_VMX_PROCBASED_CTLS),
            procbased_ctls2: read(msr::IA32_VMX_PROCBASED_CTLS2),
            procbased_ctls3: read(IA32_VMX_PROCBASED_CTLS3),
            exit_ctls: read(msr::IA32_VMX_EXIT_CTLS),
            entry_ctls: read(msr::IA32_VMX_ENTRY_CTLS),
            true_pinbased_ctls: read(msr::IA32_VMX_TRUE_PINBASED_CTLS),
            true_procbased_ctls: read(msr::IA32_VMX_TRUE_PROCBASED_CTLS),
            true_exit_ctls: read(msr::IA32_VMX_TRUE_EXIT_CTLS),
            true_entry_ctls: read(msr::IA32_VMX_TRUE_ENTRY_CTLS),
            misc: read(msr::IA32_VMX_MISC),
            ept_vpid_cap: read(msr::IA32_VMX_EPT_VPID_CAP),
            vmfunc: read(msr::IA32_VMX_VMFUNC),
        }
    }

    /// IA32_VMX_BASIC bit 55: the TRUE_* control MSRs are implemented.
    pub fn has_true_ctls(&self) -> bool {
        self.basic.get_bit(55)
    }

    /// IA32_VMX_BASIC bit 48: VMX structures are limited to 32-bit physical addresses.
    pub fn phys_addr_32bit(&self) -> bool {
        self.basic.get_bit(48)
    }

    fn allowed1(ctls: u64) -> u32 {
        (ctls >> 32) as u32
    }

    pub fn pin_allowed1(&self) -> u32 {
        Self::allowed1(if self.has_true_ctls() {
            self.true_pinbased_ctls
        } else {
            self.pinbased_ctls
        })
    }

    pub fn proc_allowed1(&self) -> u32 {
        Self::allowed1(if self.has_true_ctls() {
            self.true_procbased_ctls
        } else {
            self.procbased_ctls
        })
    }

    pub fn exit_allowed1(&self) -> u32 {
        Self::allowed1(if self.has_true_ctls() {
            self.true_exit_ctls
        } else {
            self.exit_ctls
        })
    }

    pub fn entry_allowed1(&self) -> u32 {
        Self::allowed1(if self.has_true_ctls() {
            self.true_entry_ctls
        } else {
            self.entry_ctls
        })
    }
}

type BitMap = &'static [(usize, X86Feature)];

const PIN_BASED: BitMap = &[
    (0, X86Feature::VmxExtIntExit),
    (3, X86Feature::VmxNmiExit),
    (5, X86Feature::VmxVirtNmi),
    (6, X86Feature::VmxPreemptTimer),
    (7, X86Feature::VmxPostedInt),
];

const PROC_BASED: BitMap = &[
    (2, X86Feature::VmxIntWindowExit),
    (3, X86Feature::VmxTscOffsetting),
    (7, X86Feature::VmxHltExit),
    (9, X86Feature::VmxInvlpgExit),
    (10, X86Feature::VmxMwaitExit),
    (11, X86Feature::VmxRdpmcExit),
    (12, X86Feature::VmxRdtscExit),
    (15, X86Feature::VmxCr3LoadExit),
    (16, X86Feature::VmxCr3StoreExit),
    (17, X86Feature::VmxTertiaryExecCtls),
    (19, X86Feature::VmxCr8LoadExit),
    (20, X86Feature::VmxCr8StoreExit),
    (21, X86Feature::VmxUseTprShadow),
    (22, X86Feature::VmxNmiWindowExit),
    (23, X86Feature::VmxMovDrExit),
    (24, X86Feature::VmxUncondIoExit),
    (25, X86Feature::VmxUseIoBitmaps),
    (27, X86Feature::VmxMonitorTrapFlag),
    (28, X86Feature::VmxUseMsrBitmaps),
    (29, X86Feature::VmxMonitorExit),
    (30, X86Feature::VmxPauseExit),
    (31, X86Feature::VmxSecondaryExecCtls),
];

const PROC_BASED2: BitMap = &[
    (0, X86Feature::VmxVirtApicAccess),
    (1, X86Feature::VmxEpt),
    (2, X86Feature::VmxDescTableExit),
    (3, X86Feature::VmxRdtscp),
    (4, X86Feature::VmxVirtX2apicMode),
    (5, X86Feature::VmxVpid),
    (6, X86Feature::VmxWbinvdExit),
    (7, X86Feature::VmxUnrestrictedGuest),
    (8, X86Feature::VmxApicRegVirt),
    (9, X86Feature::VmxVirtIntDelivery),
    (10, X86Feature::VmxPauseLoopExit),
    (11, X86Feature::VmxRdrandExit),
    (12, X86Feature::VmxInvpcid),
    (13, X86Feature::VmxVmfunc),
    (14, X86Feature::VmxVmcsShadowing),
    (15, X86Feature::VmxEnclsExit),
    (16, X86Feature::VmxRdseedExit),
    (17, X86Feature::VmxPml),
    (18, X86Feature::VmxEptXcptVe),
    (19, X86Feature::VmxConcealVmxFromPt),
    (20, X86Feature::VmxXsavesXrstors),
    (22, X86Feature::VmxModeBasedEptPerm),
    (23, X86Feature::VmxSppEpt),
    (24, X86Feature::VmxPtEpt),
    (25, X86Feature::VmxUseTscScaling),
    (26, X86Feature::VmxUserWaitPause),
    (28, X86Feature::VmxEnclvExit),
];

const PROC_BASED3: BitMap = &[
    (0, X86Feature::VmxLoadIwkeyExit),
    (1, X86Feature::VmxHlat),
    (2, X86Feature::VmxEptPagingWrite),
    (3, X86Feature::VmxGpaw),
];

const EXIT: BitMap = &[
    (2, X86Feature::VmxExitSaveDebugCtls),
    (9, X86Feature::VmxHostAddrSpaceSize),
    (12, X86Feature::VmxExitLoadPerfGlobalCtrl),
    (15, X86Feature::VmxExitAckExtInt),
    (18, X86Feature::VmxExitSavePat),
    (19, X86Feature::VmxExitLoadPat),
    (20, X86Feature::VmxExitSaveEfer),
    (21, X86Feature::VmxExitLoadEfer),
    (22, X86Feature::VmxExitSavePreemptTimer),
    (23, X86Feature::VmxExitClearBndcfgs),
    (24, X86Feature::VmxExitConcealVmxFromPt),
];

const ENTRY: BitMap = &[
    (2, X86Feature::VmxEntryLoadDebugCtls),
    (9, X86Feature::VmxIa32eModeGuest),
    (13, X86Feature::VmxEntryLoadPerfGlobalCtrl),
    (14, X86Feature::VmxEntryLoadPat),
    (15, X86Feature::VmxEntryLoadEfer),
    (16, X86Feature::VmxEntryLoadBndcfgs),
    (17, X86Feature::VmxEntryConcealVmxFromPt),
];

const MISC: BitMap = &[
    (5, X86Feature::VmxExitSaveEferLma),
    (14, X86Feature::VmxIntelPt),
    (29, X86Feature::VmxVmwriteAll),
    (30, X86Feature::VmxEntryInjectSoftInt),
];

const EPT_CAP: BitMap = &[
    (0, X86Feature::VmxEptExecOnly),
    (6, X86Feature::VmxEptPageWalk4),
    (7, X86Feature::VmxEptPageWalk5),
    (14, X86Feature::VmxEptWb),
    (16, X86Feature::VmxEpt2m),
    (17, X86Feature::VmxEpt1g),
    (20, X86Feature::VmxInvept),
    (21, X86Feature::VmxEptAd),
];

fn apply(rec: &mut FeatureRecordX86, value: u64, map: BitMap) {
    for &(bit, feature) in map {
        if value.get_bit(bit) {
            rec.set(feature, true);
        }
    }
}

/// Sets the VMX control-group flags from the allowed-1 settings in `msrs`.
///
/// Secondary and tertiary controls are only considered when the primary
/// processor-based controls allow activating them.
pub fn explode_vmx(rec: &mut FeatureRecordX86, msrs: &VmxMsrs) {
    rec.set(X86Feature::VmxInsOutsInfo, msrs.basic.get_bit(54));
    rec.set(X86Feature::VmxTrueCtls, msrs.has_true_ctls());

    apply(rec, msrs.pin_allowed1().into(), PIN_BASED);
    apply(rec, msrs.proc_allowed1().into(), PROC_BASED);
    if rec.has(X86Feature::VmxSecondaryExecCtls) {
        apply(rec, (msrs.procbased_ctls2 >> 32) & 0xffff_ffff, PROC_BASED2);
    }
    if rec.has(X86Feature::VmxTertiaryExecCtls) {
        apply(rec, msrs.procbased_ctls3, PROC_BASED3);
    }
    apply(rec, msrs.exit_allowed1().into(), EXIT);
    apply(rec, msrs.entry_allowed1().into(), ENTRY);
    apply(rec, msrs.misc, MISC);

    if rec.has(X86Feature::VmxEpt) {
        apply(rec, msrs.ept_vpid_cap, EPT_CAP);
    }
    if rec.has(X86Feature::VmxVpid) {
        rec.set(X86Feature::VmxInvvpid, msrs.ept_vpid_cap.get_bit(32));
    }
    if rec.has(X86Feature::VmxVmfunc) {
        rec.set(X86Feature::VmxVmfuncEptpSwitching, msrs.vmfunc.get_bit(0));
    }

    rec.vmx_max_phys_addr_width = if msrs.phys_addr_32bit() {
        32
    } else {
        rec.header.max_phys_addr_width.into()
    };
    trace!(
        "VMX controls: pin {:#x} proc {:#x} true_ctls {}",
        msrs.pin_allowed1(),
        msrs.proc_allowed1(),
        msrs.has_true_ctls()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Allowed-1 in the upper dword.
    fn ctls(allowed1: u32) -> u64 {
        (allowed1 as u64) << 32
    }

    #[test]
    fn test_true_ctls_are_preferred() {
        let msrs = VmxMsrs {
            basic: 1 << 55,
            pinbased_ctls: ctls(0),
            true_pinbased_ctls: ctls(1 << 3),
            ..Default::default()
        };
        let mut rec = FeatureRecordX86::default();
        explode_vmx(&mut rec, &msrs);
        assert!(rec.has(X86Feature::VmxTrueCtls));
        assert!(rec.has(X86Feature::VmxNmiExit));
    }

    #[test]
    fn test_secondary_gated_on_primary() {
        let mut msrs = VmxMsrs {
            procbased_ctls: ctls(1 << 7),
            procbased_ctls2: ctls(0b11),
            ..Default::default()
        };
        let mut rec = FeatureRecordX86::default();
        explode_vmx(&mut rec, &msrs);
        assert!(rec.has(X86Feature::VmxHltExit));
        assert!(!rec.has(X86Feature::VmxEpt));

        msrs.procbased_ctls = ctls(1 << 7 | 1 << 31);
        msrs.ept_vpid_cap = 1 << 6 | 1 << 21 | 1 << 32;
        let mut rec = FeatureRecordX86::default();
        explode_vmx(&mut rec, &msrs);
        assert!(rec.has(X86Feature::VmxEpt));
        assert!(rec.has(X86Feature::VmxEptPageWalk4));
        assert!(rec.has(X86Feature::VmxEptAd));
        // VPID not allowed, so INVVPID is not reported.
        assert!(!rec.has(X86Feature::VmxInvvpid));
    }

    #[test]
    fn test_phys_width_limit() {
        let mut rec = FeatureRecordX86::default();
        rec.header.max_phys_addr_width = 46;
        explode_vmx(&mut rec, &VmxMsrs::default());
        assert_eq!(rec.vmx_max_phys_addr_width, 46);
        explode_vmx(
            &mut rec,
            &VmxMsrs {
                basic: 1 << 48,
                ..Default::default()
            },
        );
        assert_eq!(rec.vmx_max_phys_addr_width, 32);
    }

    #[test]
    fn test_read_with_indices() {
        let msrs = VmxMsrs::read_with(|index| index as u64);
        assert_eq!(msrs.basic, 0x480);
        assert_eq!(msrs.procbased_ctls3, 0x492);
        assert_eq!(msrs.true_entry_ctls, 0x490);
    }
}
