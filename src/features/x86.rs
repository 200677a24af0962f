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

use super::FeatureHeader;
use super::bits::{FeatureBits, define_features};

/// Number of flag words in [`FeatureRecordX86`].
pub const X86_FEATURE_WORDS: usize = 5;

/// First bit of the hardware-virtualization flag groups (VMX and SVM).
/// Bits below belong to the baseline words.
pub const X86_VIRT_FIRST_BIT: usize = 192;

define_features! {
    /// x86 capability flags.
    ///
    /// Words 0..=2 carry the instruction-set, paging and speculation flags;
    /// words 3..=4 carry the VMX and SVM control groups.
    pub enum X86Feature: 5 words, label "" {
        // CPUID.01H:EDX
        fpu,
        vme,
        de,
        pse,
        tsc,
        msr,
        pae,
        mce,
        cx8,
        apic,
        sep,
        mtrr,
        pge,
        mca,
        cmov,
        pat,
        pse36,
        clflush,
        ds,
        acpi,
        mmx,
        fxsr,
        sse,
        sse2,
        ss,
        htt,
        tm,
        pbe,
        // CPUID.01H:ECX
        sse3,
        pclmul,
        monitor,
        vmx,
        smx,
        est,
        ssse3,
        fma,
        cx16,
        pdcm,
        pcid,
        dca,
        sse4_1,
        sse4_2,
        x2apic,
        movbe,
        popcnt,
        tsc_deadline,
        aes,
        xsave,
        osxsave,
        avx,
        f16c,
        rdrand,
        /// Set when running under a hypervisor.
        hypervisor,
        // CPUID.(EAX=07H,ECX=0):EBX
        fsgsbase,
        tsc_adjust,
        sgx,
        bmi1,
        hle,
        avx2,
        smep,
        bmi2,
        erms,
        invpcid,
        rtm,
        mpx,
        avx512f,
        avx512dq,
        rdseed,
        adx,
        smap,
        avx512ifma,
        clflushopt,
        clwb,
        intel_pt,
        avx512cd,
        sha,
        avx512bw,
        avx512vl,
        // CPUID.(EAX=07H,ECX=0):ECX
        avx512vbmi,
        umip,
        pku,
        ospke,
        waitpkg,
        avx512vbmi2,
        cet_ss,
        gfni,
        vaes,
        vpclmulqdq,
        avx512vnni,
        avx512bitalg,
        avx512vpopcntdq,
        la57,
        rdpid,
        key_locker,
        bus_lock_detect,
        cldemote,
        movdiri,
        movdir64b,
        enqcmd,
        sgx_lc,
        pks,
        // CPUID.(EAX=07H,ECX=0):EDX
        avx512_4vnniw,
        avx512_4fmaps,
        fsrm,
        avx512_vp2intersect,
        srbds_ctrl,
        md_clear,
        rtm_always_abort,
        serialize,
        hybrid,
        arch_lbr,
        cet_ibt,
        amx_bf16,
        avx512_fp16,
        amx_tile,
        amx_int8,
        ibrs,
        ibpb,
        stibp,
        flush_cmd,
        arch_cap,
        core_cap,
        ssbd,
        // CPUID.(EAX=07H,ECX=1)
        avx_vnni,
        avx512_bf16,
        fsrs,
        fsrcs,
        hreset,
        lam,
        avx_vnni_int8,
        avx_ne_convert,
        prefetchi,
        // CPUID.(EAX=07H,ECX=2):EDX
        psfd,
        ipred_ctrl,
        rrsba_ctrl,
        bhi_ctrl,
        mcdt_no,
        // CPUID.(EAX=0DH,ECX=1):EAX
        xsaveopt,
        xsavec,
        xgetbv_ecx1,
        xsaves,
        // CPUID.80000001H:EDX
        syscall,
        nx,
        mmxext,
        ffxsr,
        page1gb,
        rdtscp,
        long_mode,
        amd_3dnowext,
        amd_3dnow,
        // CPUID.80000001H:ECX
        lahf_sahf,
        svm,
        cr8l,
        abm,
        sse4a,
        misaligned_sse,
        prefetchw,
        xop,
        fma4,
        topoext,
        mwaitx,
        // CPUID.80000007H:EDX
        invariant_tsc,
        // CPUID.80000008H:EBX
        clzero,
        irperf,
        wbnoinvd,
        virt_ssbd,
        // CPUID.80000021H:EAX
        no_nested_data_bp,
        lfence_always_serializing,
        null_sel_clr_base,
        auto_ibrs,
        // IA32_ARCH_CAPABILITIES
        rdcl_no,
        ibrs_all,
        rsba,
        skip_l1dfl_vmentry,
        ssb_no,
        mds_no,
        if_pschange_msc_no,
        tsx_ctrl,
        taa_no,
        fb_clear,
        gds_no,
        rfds_no,
        // Derived from the flags above.
        /// Any speculation-control interface is available.
        speculation_control,
        /// MD_CLEAR is advertised and the part is not MDS_NO.
        mds_mitigation_needed,
        /// L1D flush is available and the part is not RDCL_NO.
        l1tf_flush_needed,

        // IA32_VMX_BASIC
        vmx_ins_outs_info = 192,
        vmx_true_ctls,
        // Pin-based controls
        vmx_ext_int_exit,
        vmx_nmi_exit,
        vmx_virt_nmi,
        vmx_preempt_timer,
        vmx_posted_int,
        // Primary processor-based controls
        vmx_int_window_exit,
        vmx_tsc_offsetting,
        vmx_hlt_exit,
        vmx_invlpg_exit,
        vmx_mwait_exit,
        vmx_rdpmc_exit,
        vmx_rdtsc_exit,
        vmx_cr3_load_exit,
        vmx_cr3_store_exit,
        vmx_tertiary_exec_ctls,
        vmx_cr8_load_exit,
        vmx_cr8_store_exit,
        vmx_use_tpr_shadow,
        vmx_nmi_window_exit,
        vmx_mov_dr_exit,
        vmx_uncond_io_exit,
        vmx_use_io_bitmaps,
        vmx_monitor_trap_flag,
        vmx_use_msr_bitmaps,
        vmx_monitor_exit,
        vmx_pause_exit,
        vmx_secondary_exec_ctls,
        // Secondary processor-based controls
        vmx_virt_apic_access,
        vmx_ept,
        vmx_desc_table_exit,
        vmx_rdtscp,
        vmx_virt_x2apic_mode,
        vmx_vpid,
        vmx_wbinvd_exit,
        vmx_unrestricted_guest,
        vmx_apic_reg_virt,
        vmx_virt_int_delivery,
        vmx_pause_loop_exit,
        vmx_rdrand_exit,
        vmx_invpcid,
        vmx_vmfunc,
        vmx_vmcs_shadowing,
        vmx_encls_exit,
        vmx_rdseed_exit,
        vmx_pml,
        vmx_ept_xcpt_ve,
        vmx_conceal_vmx_from_pt,
        vmx_xsaves_xrstors,
        vmx_mode_based_ept_perm,
        vmx_spp_ept,
        vmx_pt_ept,
        vmx_use_tsc_scaling,
        vmx_user_wait_pause,
        vmx_enclv_exit,
        // Tertiary processor-based controls
        vmx_load_iwkey_exit,
        vmx_hlat,
        vmx_ept_paging_write,
        vmx_gpaw,
        // VM-exit controls
        vmx_exit_save_debug_ctls,
        vmx_host_addr_space_size,
        vmx_exit_load_perf_global_ctrl,
        vmx_exit_ack_ext_int,
        vmx_exit_save_pat,
        vmx_exit_load_pat,
        vmx_exit_save_efer,
        vmx_exit_load_efer,
        vmx_exit_save_preempt_timer,
        vmx_exit_clear_bndcfgs,
        vmx_exit_conceal_vmx_from_pt,
        // VM-entry controls
        vmx_entry_load_debug_ctls,
        vmx_ia32e_mode_guest,
        vmx_entry_load_perf_global_ctrl,
        vmx_entry_load_pat,
        vmx_entry_load_efer,
        vmx_entry_load_bndcfgs,
        vmx_entry_conceal_vmx_from_pt,
        // IA32_VMX_MISC
        vmx_exit_save_efer_lma,
        vmx_intel_pt,
        vmx_vmwrite_all,
        vmx_entry_inject_soft_int,
        // IA32_VMX_EPT_VPID_CAP
        vmx_ept_exec_only,
        vmx_ept_page_walk_4,
        vmx_ept_page_walk_5,
        vmx_ept_wb,
        vmx_ept_2m,
        vmx_ept_1g,
        vmx_invept,
        vmx_ept_ad,
        vmx_invvpid,
        // IA32_VMX_VMFUNC
        vmx_vmfunc_eptp_switching,

        // CPUID.8000000AH:EDX
        svm_nested_paging,
        svm_lbr_virt,
        svm_svm_lock,
        svm_nrip_save,
        svm_tsc_rate_msr,
        svm_vmcb_clean,
        svm_flush_by_asid,
        svm_decode_assists,
        svm_pause_filter,
        svm_pause_filter_threshold,
        svm_avic,
        svm_virt_vmsave_vmload,
        svm_vgif,
        svm_gmet,
        svm_x2avic,
        svm_sss_check,
        svm_spec_ctrl,
        svm_host_mce_override,
        svm_tlbi_ctl,
    }
}

impl X86Feature {
    /// Returns `true` for the VMX and SVM control-group flags.
    pub const fn is_virt(self) -> bool {
        self.bit() >= X86_VIRT_FIRST_BIT
    }
}

/// The x86 extension of the feature record. Exactly 64 bytes.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FeatureRecordX86 {
    pub header: FeatureHeader,
    pub family: u8,
    pub model: u8,
    pub stepping: u8,
    pub(crate) reserved: [u8; 3],
    /// Maximum XSAVE area size for all supported components.
    pub max_ext_state_size: u32,
    /// Number of SVM ASIDs (0 without SVM).
    pub max_asid: u32,
    /// Physical address width usable in VMX structures.
    pub vmx_max_phys_addr_width: u32,
    pub flags: FeatureBits<X86_FEATURE_WORDS>,
}

impl FeatureRecordX86 {
    pub fn has(&self, feature: X86Feature) -> bool {
        self.flags.get(feature.bit())
    }

    pub fn set(&mut self, feature: X86Feature, value: bool) {
        self.flags.set(feature.bit(), value);
    }

    /// Iterates over the flags that are set.
    pub fn iter(&self) -> impl Iterator<Item = X86Feature> + '_ {
        X86Feature::ALL.iter().copied().filter(|f| self.has(*f))
    }
}

impl Debug for FeatureRecordX86 {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_struct("FeatureRecordX86")
            .field("header", &self.header)
            .field("family", &format_args!("{:#x}", self.family))
            .field("model", &format_args!("{:#x}", self.model))
            .field("stepping", &self.stepping)
            .field("max_ext_state_size", &self.max_ext_state_size)
            .field("max_asid", &self.max_asid)
            .field("vmx_max_phys_addr_width", &self.vmx_max_phys_addr_width)
            .field("flags", &FlagNames(self))
            .finish()
    }
}

struct FlagNames<'a>(&'a FeatureRecordX86);

impl Debug for FlagNames<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_list()
            .entries(self.0.iter().map(|feat| feat.name()))
            .finish()
    }
}
