// CP_PERFMON_CNTL.PERFMON_STATE / SPM_PERFMON_STATE
pub const CP_PERFMON_STATE_DISABLE_AND_RESET: u32 = 0;
pub const CP_PERFMON_STATE_START_COUNTING: u32 = 1;
pub const CP_PERFMON_STATE_STOP_COUNTING: u32 = 2;

// *_PERFCOUNTER*_SELECT.CNTR_MODE / SQ_PERFCOUNTER*_SELECT.SPM_MODE
pub const PERFMON_SPM_MODE_OFF: u32 = 0;
pub const PERFMON_SPM_MODE_16BIT_CLAMP: u32 = 1;

reg_bitfield! {
    /// Steers subsequent register writes to one SE/SH/instance, or broadcasts them.
    pub struct GrbmGfxIndex {
        instance_index: 0, 8;
        sh_index: 8, 8;
        se_index: 16, 8;
        sh_broadcast_writes: 29, 1;
        instance_broadcast_writes: 30, 1;
        se_broadcast_writes: 31, 1;
    }
}

impl GrbmGfxIndex {
    /// The power-on default: every write reaches every SE, SH and instance.
    pub const fn broadcast_all() -> Self {
        Self(0)
            .with_se_broadcast_writes(1)
            .with_sh_broadcast_writes(1)
            .with_instance_broadcast_writes(1)
    }

    /// Targets one shader engine, broadcasting within it.
    pub const fn shader_engine(se_index: u32) -> Self {
        Self(0)
            .with_se_index(se_index)
            .with_sh_broadcast_writes(1)
            .with_instance_broadcast_writes(1)
    }
}

reg_bitfield! {
    /// Master perfmon control shared by the global counters and SPM.
    pub struct CpPerfmonCntl {
        perfmon_state: 0, 4;
        spm_perfmon_state: 4, 4;
        perfmon_enable_mode: 8, 2;
        perfmon_sample_enable: 10, 1;
    }
}

reg_bitfield! {
    pub struct RlcSpmPerfmonCntl {
        perfmon_ring_mode: 10, 2;
        perfmon_sample_interval: 16, 16;
    }
}

reg_bitfield! {
    /// Number of 256-bit lines per sample and per segment.
    /// SE3 has no field, hardware derives it from `perfmon_segment_size`.
    pub struct RlcSpmPerfmonSegmentSize {
        perfmon_segment_size: 0, 8;
        global_num_line: 11, 5;
        se0_num_line: 16, 5;
        se1_num_line: 21, 5;
        se2_num_line: 26, 5;
    }
}

impl RlcSpmPerfmonSegmentSize {
    pub const MAX_SEGMENT_SIZE: u32 = 0xFF;
    pub const MAX_NUM_LINE: u32 = 0x1F;
}

reg_bitfield! {
    pub struct RlcSpmPerfmonRingSize {
        ring_base_size: 0, 32;
    }
}

reg_bitfield! {
    /// Generic `<BLOCK>_PERFCOUNTER<n>_SELECT`, carries sub-slots 0 and 1.
    pub struct PerfCounterSelect {
        perf_sel: 0, 10;
        perf_sel1: 10, 10;
        cntr_mode: 20, 4;
    }
}

reg_bitfield! {
    /// Generic `<BLOCK>_PERFCOUNTER<n>_SELECT1`, carries sub-slots 2 and 3.
    pub struct PerfCounterSelect1 {
        perf_sel2: 0, 10;
        perf_sel3: 10, 10;
    }
}

reg_bitfield! {
    pub struct SqPerfCounterSelect {
        perf_sel: 0, 9;
        sqc_bank_mask: 12, 4;
        sqc_client_mask: 16, 4;
        spm_mode: 20, 4;
        simd_mask: 24, 4;
    }
}
