use tracing::debug;
use crate::GpuSize;
use crate::cmd_stream::{CmdSpace, CmdStream, WriteDataInfo};
use crate::pm4;
use crate::reg::*;
use super::*;

/// Muxsel address/data register pair of a segment and the GRBM_GFX_INDEX which reaches it.
fn muxsel_regs(segment: SpmSegment) -> (GrbmGfxIndex, u32, u32) {
    match segment.se_index() {
        None => (
            GrbmGfxIndex::broadcast_all(),
            mmRLC_SPM_GLOBAL_MUXSEL_ADDR__CI__VI,
            mmRLC_SPM_GLOBAL_MUXSEL_DATA__CI__VI,
        ),
        Some(se) => (
            GrbmGfxIndex::shader_engine(se),
            mmRLC_SPM_SE_MUXSEL_ADDR__CI__VI,
            mmRLC_SPM_SE_MUXSEL_DATA__CI__VI,
        ),
    }
}

impl SpmTrace<'_> {
    /// Programs the streaming counters, uploads the muxsel RAM, configures the RLC ring and
    /// leaves CP_PERFMON_CNTL in DISABLE_AND_RESET.
    ///
    /// Re-reserves command space before every counter and every muxsel dword.
    /// GRBM_GFX_INDEX is left pointing at the last uploaded segment.
    pub fn write_setup_commands(
        &mut self,
        base_gpu_virt_addr: GpuSize,
        cmd: &mut dyn CmdStream,
        mut cs: CmdSpace,
    ) -> CmdSpace {
        let reg_info = self.reg_info;
        let mut any_indexed = false;

        for counter in &self.spm_counters {
            cmd.commit_commands(cs);
            cs = cmd.reserve_commands();

            // a previous indexed counter left GRBM_GFX_INDEX isolated
            if any_indexed {
                cs = cmd.write_grbm_gfx_index_broadcast(&reg_info, cs);
            }

            cs = counter.write_setup_commands(&reg_info, cmd, cs);
            any_indexed |= counter.is_indexed();
        }

        for segment in self.active_segments() {
            let (grbm_gfx_index, addr_reg, data_reg) = muxsel_regs(segment);
            let ram = &self.muxsel_ram[segment as usize];

            debug_assert_eq!(ram.as_dwords().len(), self.muxsel_ram_dwords(segment) as usize);

            cs = cmd.write_set_one_config_reg(reg_info.mm_grbm_gfx_index, grbm_gfx_index.0, cs);
            cs = cmd.write_set_one_perf_ctr_reg(addr_reg, 0, cs);

            for dw in ram.as_dwords() {
                cmd.commit_commands(cs);
                cs = cmd.reserve_commands();
                cs = cmd.write(&pm4::build_write_data(&WriteDataInfo::register(data_reg), *dw), cs);
            }

            debug!("SPM {segment}: uploaded {} muxsel dwords", ram.as_dwords().len());
        }

        let ring_base = base_gpu_virt_addr + self.data_offset;

        self.spm_perfmon_cntl.set_perfmon_ring_mode(0);
        self.ring_base_lo = ring_base as u32;
        self.ring_base_hi = (ring_base >> 32) as u32;

        for (reg, val) in [
            (mmRLC_SPM_PERFMON_CNTL__CI__VI, self.spm_perfmon_cntl.0),
            (mmRLC_SPM_PERFMON_SEGMENT_SIZE__CI__VI, self.segment_size.0),
            (mmRLC_SPM_PERFMON_RING_BASE_LO__CI__VI, self.ring_base_lo),
            (mmRLC_SPM_PERFMON_RING_BASE_HI__CI__VI, self.ring_base_hi),
            (mmRLC_SPM_PERFMON_RING_SIZE__CI__VI, self.ring_size.0),
            // the ring never wraps
            (mmRLC_SPM_RING_RDPTR__CI__VI, 0),
        ] {
            cs = cmd.write_set_one_perf_ctr_reg(reg, val, cs);
        }

        let cp_perfmon_cntl = CpPerfmonCntl::default()
            .with_perfmon_state(CP_PERFMON_STATE_DISABLE_AND_RESET)
            .with_spm_perfmon_state(CP_PERFMON_STATE_DISABLE_AND_RESET);

        cmd.write_set_one_config_reg(reg_info.mm_cp_perfmon_cntl, cp_perfmon_cntl.0, cs)
    }

    /// Starts both the global perfmon and SPM sampling.
    /// Expects an idle GPU, the caller follows up with a PERFCOUNTER_START event.
    pub fn write_start_commands(&self, cmd: &mut dyn CmdStream, cs: CmdSpace) -> CmdSpace {
        let cp_perfmon_cntl = CpPerfmonCntl::default()
            .with_perfmon_state(CP_PERFMON_STATE_START_COUNTING)
            .with_spm_perfmon_state(CP_PERFMON_STATE_START_COUNTING)
            .with_perfmon_sample_enable(1);

        cmd.write_set_one_config_reg(self.reg_info.mm_cp_perfmon_cntl, cp_perfmon_cntl.0, cs)
    }

    /// Clears the RLC ring configuration and rewinds every uploaded muxsel RAM.
    pub fn write_end_commands(&self, cmd: &mut dyn CmdStream, mut cs: CmdSpace) -> CmdSpace {
        for reg in [
            mmRLC_SPM_PERFMON_CNTL__CI__VI,
            mmRLC_SPM_PERFMON_SEGMENT_SIZE__CI__VI,
            mmRLC_SPM_PERFMON_RING_SIZE__CI__VI,
            mmRLC_SPM_PERFMON_RING_BASE_LO__CI__VI,
            mmRLC_SPM_PERFMON_RING_BASE_HI__CI__VI,
        ] {
            cs = cmd.write_set_one_perf_ctr_reg(reg, 0, cs);
        }

        for segment in self.active_segments() {
            let (grbm_gfx_index, addr_reg, _) = muxsel_regs(segment);

            cs = cmd.write_set_one_config_reg(self.reg_info.mm_grbm_gfx_index, grbm_gfx_index.0, cs);
            cs = cmd.write_set_one_perf_ctr_reg(addr_reg, 0, cs);
        }

        cs
    }
}
