#![allow(non_upper_case_globals)]

use crate::chip::GfxIpLevel;

// Dword register offsets.
// CONFIG space: 0x2000..0x2C00 (SI), UCONFIG space: 0xC000..0x10000 (CI and later).

pub const CONFIG_SPACE_START: u32 = 0x2000;
pub const CONFIG_SPACE_END: u32 = 0x2C00;
pub const UCONFIG_SPACE_START: u32 = 0xC000;
pub const UCONFIG_SPACE_END: u32 = 0x10000;

pub const mmGRBM_GFX_INDEX__SI: u32 = 0x200B;
pub const mmGRBM_GFX_INDEX__CI__VI: u32 = 0xC200;

pub const mmCP_PERFMON_CNTL__SI: u32 = 0x21FF;
pub const mmCP_PERFMON_CNTL__CI__VI: u32 = 0xD808;

pub const mmRLC_SPM_PERFMON_CNTL__CI__VI: u32 = 0xDC80;
pub const mmRLC_SPM_PERFMON_RING_BASE_LO__CI__VI: u32 = 0xDC81;
pub const mmRLC_SPM_PERFMON_RING_BASE_HI__CI__VI: u32 = 0xDC82;
pub const mmRLC_SPM_PERFMON_RING_SIZE__CI__VI: u32 = 0xDC83;
pub const mmRLC_SPM_PERFMON_SEGMENT_SIZE__CI__VI: u32 = 0xDC84;
pub const mmRLC_SPM_SE_MUXSEL_ADDR__CI__VI: u32 = 0xDC85;
pub const mmRLC_SPM_SE_MUXSEL_DATA__CI__VI: u32 = 0xDC86;
pub const mmRLC_SPM_GLOBAL_MUXSEL_ADDR__CI__VI: u32 = 0xDC9B;
pub const mmRLC_SPM_GLOBAL_MUXSEL_DATA__CI__VI: u32 = 0xDC9C;
pub const mmRLC_SPM_RING_RDPTR__CI__VI: u32 = 0xDC9D;

pub const mmSQ_THREAD_TRACE_BASE__SI: u32 = 0x2380;
pub const mmSQ_THREAD_TRACE_SIZE__SI: u32 = 0x2381;
pub const mmSQ_THREAD_TRACE_MASK__SI: u32 = 0x2382;
pub const mmSQ_THREAD_TRACE_TOKEN_MASK__SI: u32 = 0x2383;
pub const mmSQ_THREAD_TRACE_PERF_MASK__SI: u32 = 0x2384;
pub const mmSQ_THREAD_TRACE_CTRL__SI: u32 = 0x2385;
pub const mmSQ_THREAD_TRACE_MODE__SI: u32 = 0x2386;
pub const mmSQ_THREAD_TRACE_WPTR__SI: u32 = 0x2387;
pub const mmSQ_THREAD_TRACE_STATUS__SI: u32 = 0x2388;
pub const mmSQ_THREAD_TRACE_USERDATA_0__SI: u32 = 0x2390;

pub const mmSQ_THREAD_TRACE_BASE__CI__VI: u32 = 0xC330;
pub const mmSQ_THREAD_TRACE_SIZE__CI__VI: u32 = 0xC331;
pub const mmSQ_THREAD_TRACE_MASK__CI__VI: u32 = 0xC332;
pub const mmSQ_THREAD_TRACE_TOKEN_MASK__CI__VI: u32 = 0xC333;
pub const mmSQ_THREAD_TRACE_PERF_MASK__CI__VI: u32 = 0xC334;
pub const mmSQ_THREAD_TRACE_CTRL__CI__VI: u32 = 0xC335;
pub const mmSQ_THREAD_TRACE_MODE__CI__VI: u32 = 0xC336;
pub const mmSQ_THREAD_TRACE_WPTR__CI__VI: u32 = 0xC338;
pub const mmSQ_THREAD_TRACE_STATUS__CI__VI: u32 = 0xC339;
pub const mmSQ_THREAD_TRACE_USERDATA_0__CI__VI: u32 = 0xC340;

/// Same offset on every GFX6-8 part.
pub const mmSQ_THREAD_TRACE_CNTR: u32 = 0x2398;

/// Register offsets which moved between SI (CONFIG space) and CI/VI (UCONFIG space).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegInfo {
    pub mm_grbm_gfx_index: u32,
    pub mm_cp_perfmon_cntl: u32,
    pub mm_sq_thread_trace_base: u32,
    pub mm_sq_thread_trace_size: u32,
    pub mm_sq_thread_trace_mask: u32,
    pub mm_sq_thread_trace_token_mask: u32,
    pub mm_sq_thread_trace_perf_mask: u32,
    pub mm_sq_thread_trace_ctrl: u32,
    pub mm_sq_thread_trace_mode: u32,
    pub mm_sq_thread_trace_wptr: u32,
    pub mm_sq_thread_trace_status: u32,
    /// USERDATA_0..3
    pub mm_sq_thread_trace_userdata: [u32; 4],
}

impl RegInfo {
    pub const fn for_gfx_level(gfx_level: GfxIpLevel) -> Self {
        match gfx_level {
            GfxIpLevel::GfxIp6 => Self::SI,
            GfxIpLevel::GfxIp7 | GfxIpLevel::GfxIp8 => Self::CI_VI,
        }
    }

    const SI: Self = Self {
        mm_grbm_gfx_index: mmGRBM_GFX_INDEX__SI,
        mm_cp_perfmon_cntl: mmCP_PERFMON_CNTL__SI,
        mm_sq_thread_trace_base: mmSQ_THREAD_TRACE_BASE__SI,
        mm_sq_thread_trace_size: mmSQ_THREAD_TRACE_SIZE__SI,
        mm_sq_thread_trace_mask: mmSQ_THREAD_TRACE_MASK__SI,
        mm_sq_thread_trace_token_mask: mmSQ_THREAD_TRACE_TOKEN_MASK__SI,
        mm_sq_thread_trace_perf_mask: mmSQ_THREAD_TRACE_PERF_MASK__SI,
        mm_sq_thread_trace_ctrl: mmSQ_THREAD_TRACE_CTRL__SI,
        mm_sq_thread_trace_mode: mmSQ_THREAD_TRACE_MODE__SI,
        mm_sq_thread_trace_wptr: mmSQ_THREAD_TRACE_WPTR__SI,
        mm_sq_thread_trace_status: mmSQ_THREAD_TRACE_STATUS__SI,
        mm_sq_thread_trace_userdata: [
            mmSQ_THREAD_TRACE_USERDATA_0__SI,
            mmSQ_THREAD_TRACE_USERDATA_0__SI + 1,
            mmSQ_THREAD_TRACE_USERDATA_0__SI + 2,
            mmSQ_THREAD_TRACE_USERDATA_0__SI + 3,
        ],
    };

    const CI_VI: Self = Self {
        mm_grbm_gfx_index: mmGRBM_GFX_INDEX__CI__VI,
        mm_cp_perfmon_cntl: mmCP_PERFMON_CNTL__CI__VI,
        mm_sq_thread_trace_base: mmSQ_THREAD_TRACE_BASE__CI__VI,
        mm_sq_thread_trace_size: mmSQ_THREAD_TRACE_SIZE__CI__VI,
        mm_sq_thread_trace_mask: mmSQ_THREAD_TRACE_MASK__CI__VI,
        mm_sq_thread_trace_token_mask: mmSQ_THREAD_TRACE_TOKEN_MASK__CI__VI,
        mm_sq_thread_trace_perf_mask: mmSQ_THREAD_TRACE_PERF_MASK__CI__VI,
        mm_sq_thread_trace_ctrl: mmSQ_THREAD_TRACE_CTRL__CI__VI,
        mm_sq_thread_trace_mode: mmSQ_THREAD_TRACE_MODE__CI__VI,
        mm_sq_thread_trace_wptr: mmSQ_THREAD_TRACE_WPTR__CI__VI,
        mm_sq_thread_trace_status: mmSQ_THREAD_TRACE_STATUS__CI__VI,
        mm_sq_thread_trace_userdata: [
            mmSQ_THREAD_TRACE_USERDATA_0__CI__VI,
            mmSQ_THREAD_TRACE_USERDATA_0__CI__VI + 1,
            mmSQ_THREAD_TRACE_USERDATA_0__CI__VI + 2,
            mmSQ_THREAD_TRACE_USERDATA_0__CI__VI + 3,
        ],
    };

    /// Name of a register this crate programs, for command dumps.
    pub fn reg_name(&self, reg: u32) -> Option<&'static str> {
        let name = match reg {
            r if r == self.mm_grbm_gfx_index => "GRBM_GFX_INDEX",
            r if r == self.mm_cp_perfmon_cntl => "CP_PERFMON_CNTL",
            r if r == self.mm_sq_thread_trace_base => "SQ_THREAD_TRACE_BASE",
            r if r == self.mm_sq_thread_trace_size => "SQ_THREAD_TRACE_SIZE",
            r if r == self.mm_sq_thread_trace_mask => "SQ_THREAD_TRACE_MASK",
            r if r == self.mm_sq_thread_trace_token_mask => "SQ_THREAD_TRACE_TOKEN_MASK",
            r if r == self.mm_sq_thread_trace_perf_mask => "SQ_THREAD_TRACE_PERF_MASK",
            r if r == self.mm_sq_thread_trace_ctrl => "SQ_THREAD_TRACE_CTRL",
            r if r == self.mm_sq_thread_trace_mode => "SQ_THREAD_TRACE_MODE",
            r if r == self.mm_sq_thread_trace_wptr => "SQ_THREAD_TRACE_WPTR",
            r if r == self.mm_sq_thread_trace_status => "SQ_THREAD_TRACE_STATUS",
            r if r == self.mm_sq_thread_trace_userdata[0] => "SQ_THREAD_TRACE_USERDATA_0",
            r if r == self.mm_sq_thread_trace_userdata[1] => "SQ_THREAD_TRACE_USERDATA_1",
            r if r == self.mm_sq_thread_trace_userdata[2] => "SQ_THREAD_TRACE_USERDATA_2",
            r if r == self.mm_sq_thread_trace_userdata[3] => "SQ_THREAD_TRACE_USERDATA_3",
            mmSQ_THREAD_TRACE_CNTR => "SQ_THREAD_TRACE_CNTR",
            mmRLC_SPM_PERFMON_CNTL__CI__VI => "RLC_SPM_PERFMON_CNTL",
            mmRLC_SPM_PERFMON_RING_BASE_LO__CI__VI => "RLC_SPM_PERFMON_RING_BASE_LO",
            mmRLC_SPM_PERFMON_RING_BASE_HI__CI__VI => "RLC_SPM_PERFMON_RING_BASE_HI",
            mmRLC_SPM_PERFMON_RING_SIZE__CI__VI => "RLC_SPM_PERFMON_RING_SIZE",
            mmRLC_SPM_PERFMON_SEGMENT_SIZE__CI__VI => "RLC_SPM_PERFMON_SEGMENT_SIZE",
            mmRLC_SPM_SE_MUXSEL_ADDR__CI__VI => "RLC_SPM_SE_MUXSEL_ADDR",
            mmRLC_SPM_SE_MUXSEL_DATA__CI__VI => "RLC_SPM_SE_MUXSEL_DATA",
            mmRLC_SPM_GLOBAL_MUXSEL_ADDR__CI__VI => "RLC_SPM_GLOBAL_MUXSEL_ADDR",
            mmRLC_SPM_GLOBAL_MUXSEL_DATA__CI__VI => "RLC_SPM_GLOBAL_MUXSEL_DATA",
            mmRLC_SPM_RING_RDPTR__CI__VI => "RLC_SPM_RING_RDPTR",
            _ => return None,
        };

        Some(name)
    }
}
