//! SQ thread trace (SQTT) on one shader engine.
//!
//! Every emitter isolates GRBM_GFX_INDEX to the traced SE/SH first and leaves it that way,
//! restoring broadcast is up to the caller.

use std::mem::{offset_of, size_of};
use bitflags::bitflags;
use tracing::debug;
use crate::GpuSize;
use crate::chip::{ChipProperties, GfxIpLevel, PerfCaps};
use crate::cmd_stream::*;
use crate::pm4;
use crate::reg::*;
use crate::{PerfTraceError, Result};

mod token;
pub use token::*;

pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;
/// SQ_THREAD_TRACE_BASE/SIZE are in 4 KiB units.
pub const BUFFER_ALIGN_SHIFT: u32 = 12;
pub const DATA_ALIGNMENT: usize = 1 << BUFFER_ALIGN_SHIFT;
/// Largest buffer SQ_THREAD_TRACE_SIZE.SIZE (22 bits) can describe.
pub const MAX_BUFFER_SIZE: usize = 0x3F_FFFF << BUFFER_ALIGN_SHIFT;

const SIMD_MASK_ALL: u32 = 0xF;
const RANDOM_SEED_MAX: u32 = 0xFFFF;
const TOKEN_MASK_ALL: u32 = 0xFFFF;
const REG_MASK_ALL: u32 = 0xFF;
const SH_CU_MASK_ALL: u32 = 0xFFFF;

bitflags! {
    /// Shader stages whose waves are traced.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ShaderStageMask: u32 {
        const PS = 1 << 0;
        const VS = 1 << 1;
        const GS = 1 << 2;
        const ES = 1 << 3;
        const HS = 1 << 4;
        const LS = 1 << 5;
        const CS = 1 << 6;
    }
}

/// Per-trace overrides, `None` keeps the hardware default chosen at construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThreadTraceOptions {
    /// Bytes, a multiple of [`DATA_ALIGNMENT`].
    pub buffer_size: Option<usize>,
    /// SQ_THREAD_TRACE_TOKEN_MASK.TOKEN_MASK
    pub token_mask: Option<u32>,
    /// SQ_THREAD_TRACE_TOKEN_MASK.REG_MASK
    pub reg_mask: Option<u32>,
    pub target_sh: Option<u32>,
    pub target_cu: Option<u32>,
    pub sh0_counter_mask: Option<u32>,
    pub sh1_counter_mask: Option<u32>,
    pub simd_mask: Option<u32>,
    pub vm_id_mask: Option<u32>,
    pub random_seed: Option<u32>,
    pub shader_type_mask: Option<ShaderStageMask>,
    pub issue_mask: Option<u32>,
    pub wrap_buffer: Option<bool>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThreadTraceInfo {
    pub shader_engine: u32,
    pub options: ThreadTraceOptions,
}

/// What the stop sequence copies out of the SQ, in this order.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThreadTraceInfoData {
    /// SQ_THREAD_TRACE_WPTR
    pub cur_offset: u32,
    /// SQ_THREAD_TRACE_STATUS
    pub trace_status: u32,
    /// SQ_THREAD_TRACE_CNTR
    pub write_counter: u32,
}

const _: () = {
    assert!(offset_of!(ThreadTraceInfoData, cur_offset) == 0);
    assert!(offset_of!(ThreadTraceInfoData, trace_status) == 4);
    assert!(offset_of!(ThreadTraceInfoData, write_counter) == 8);
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PerfTraceMarkerType {
    /// SQ_THREAD_TRACE_USERDATA_2
    A,
    /// SQ_THREAD_TRACE_USERDATA_3
    B,
}

impl PerfTraceMarkerType {
    const fn userdata_index(&self) -> usize {
        match self {
            Self::A => 2,
            Self::B => 3,
        }
    }
}

/// One shader engine's thread trace: its register images and where its buffers live.
#[derive(Clone, Debug)]
pub struct ThreadTrace<'c> {
    chip: &'c ChipProperties,
    reg_info: RegInfo,
    shader_engine: u32,
    data_offset: GpuSize,
    info_offset: GpuSize,
    data_size: usize,
    sq_thread_trace_size: SqThreadTraceSize,
    sq_thread_trace_mode: SqThreadTraceMode,
    sq_thread_trace_mask: SqThreadTraceMask,
    sq_thread_trace_token_mask: SqThreadTraceTokenMask,
    sq_thread_trace_perf_mask: SqThreadTracePerfMask,
}

impl<'c> ThreadTrace<'c> {
    pub fn new(chip: &'c ChipProperties, info: &ThreadTraceInfo) -> Result<Self> {
        if info.shader_engine >= chip.num_shader_engines {
            return Err(PerfTraceError::InvalidShaderEngine {
                se: info.shader_engine,
                num_se: chip.num_shader_engines,
            });
        }

        let mut tt = Self {
            chip,
            reg_info: chip.reg_info(),
            shader_engine: info.shader_engine,
            data_offset: 0,
            info_offset: 0,
            data_size: DEFAULT_BUFFER_SIZE,
            sq_thread_trace_size: SqThreadTraceSize::default()
                .with_size((DEFAULT_BUFFER_SIZE >> BUFFER_ALIGN_SHIFT) as u32),
            sq_thread_trace_mode: SqThreadTraceMode::default()
                .with_mask_ps(1)
                .with_mask_vs(1)
                .with_mask_gs(1)
                .with_mask_es(1)
                .with_mask_hs(1)
                .with_mask_ls(1)
                .with_mask_cs(1)
                .with_autoflush_en(1),
            sq_thread_trace_mask: SqThreadTraceMask::default()
                .with_simd_en(SIMD_MASK_ALL)
                .with_vm_id_mask(SQ_THREAD_TRACE_VM_ID_MASK_SINGLE)
                .with_random_seed(RANDOM_SEED_MAX),
            sq_thread_trace_token_mask: SqThreadTraceTokenMask::default()
                .with_token_mask(TOKEN_MASK_ALL)
                .with_reg_mask(REG_MASK_ALL),
            sq_thread_trace_perf_mask: SqThreadTracePerfMask::default()
                .with_sh0_mask(SH_CU_MASK_ALL)
                .with_sh1_mask(SH_CU_MASK_ALL),
        };

        if chip.caps.contains(PerfCaps::SQTT_STALL_FROM_ADAPTER) {
            let adapter = SqThreadTraceMask(chip.sq_thread_trace_mask);

            tt.sq_thread_trace_mask.set_reg_stall_en(adapter.reg_stall_en());
            tt.sq_thread_trace_mask.set_sq_stall_en(adapter.sq_stall_en());
            tt.sq_thread_trace_mask.set_spi_stall_en(adapter.spi_stall_en());
        }

        if let Some(cu) = tt.default_compute_unit() {
            tt.sq_thread_trace_mask.set_cu_sel(cu);
        }

        tt.apply_options(&info.options)?;

        debug!(
            "SQTT SE{}: SH{} CU{}, {} bytes, {:?}",
            tt.shader_engine,
            tt.sq_thread_trace_mask.sh_sel(),
            tt.sq_thread_trace_mask.cu_sel(),
            tt.data_size,
            tt.sq_thread_trace_mask,
        );

        Ok(tt)
    }

    /// Lowest CU of the SE which is active and not reserved for real-time queues.
    fn default_compute_unit(&self) -> Option<u32> {
        let se = self.shader_engine as usize;
        let active = match self.chip.gfx_level {
            GfxIpLevel::GfxIp6 => self.chip.active_cu_mask_gfx6[se][0],
            GfxIpLevel::GfxIp7 | GfxIpLevel::GfxIp8 => self.chip.active_cu_mask_gfx7[se],
        };
        let traceable = !self.chip.real_time_cu_mask & active;

        (traceable != 0).then(|| traceable.trailing_zeros())
    }

    fn apply_options(&mut self, opts: &ThreadTraceOptions) -> Result<()> {
        if let Some(size) = opts.buffer_size {
            if size == 0 || size % DATA_ALIGNMENT != 0 || size > MAX_BUFFER_SIZE {
                return Err(PerfTraceError::InvalidBufferSize(size));
            }

            self.sq_thread_trace_size.set_size((size >> BUFFER_ALIGN_SHIFT) as u32);
            self.data_size = size;
        }

        let mode = &mut self.sq_thread_trace_mode;
        let mask = &mut self.sq_thread_trace_mask;

        if let Some(token_mask) = opts.token_mask {
            self.sq_thread_trace_token_mask.set_token_mask(token_mask);
        }
        if let Some(reg_mask) = opts.reg_mask {
            self.sq_thread_trace_token_mask.set_reg_mask(reg_mask);
        }
        if let Some(sh) = opts.target_sh {
            mask.set_sh_sel(sh);
        }
        if let Some(cu) = opts.target_cu {
            mask.set_cu_sel(cu);
        }
        if let Some(sh0) = opts.sh0_counter_mask {
            self.sq_thread_trace_perf_mask.set_sh0_mask(sh0);
        }
        if let Some(sh1) = opts.sh1_counter_mask {
            self.sq_thread_trace_perf_mask.set_sh1_mask(sh1);
        }
        if let Some(simd) = opts.simd_mask {
            mask.set_simd_en(simd);
        }
        if let Some(vm_id) = opts.vm_id_mask {
            mask.set_vm_id_mask(vm_id);
        }
        if let Some(seed) = opts.random_seed {
            mask.set_random_seed(seed);
        }
        if let Some(stages) = opts.shader_type_mask {
            let bit = |stage| u32::from(stages.contains(stage));

            mode.set_mask_ps(bit(ShaderStageMask::PS));
            mode.set_mask_vs(bit(ShaderStageMask::VS));
            mode.set_mask_gs(bit(ShaderStageMask::GS));
            mode.set_mask_es(bit(ShaderStageMask::ES));
            mode.set_mask_hs(bit(ShaderStageMask::HS));
            mode.set_mask_ls(bit(ShaderStageMask::LS));
            mode.set_mask_cs(bit(ShaderStageMask::CS));
        }
        if let Some(issue_mask) = opts.issue_mask {
            mode.set_issue_mask(issue_mask);
        }
        if let Some(wrap) = opts.wrap_buffer {
            mode.set_wrap(u32::from(wrap));
        }

        Ok(())
    }

    pub fn shader_engine(&self) -> u32 {
        self.shader_engine
    }

    /// CU the SQ traces instructions of.
    pub fn compute_unit(&self) -> u32 {
        self.sq_thread_trace_mask.cu_sel()
    }

    pub fn data_alignment(&self) -> usize {
        DATA_ALIGNMENT
    }

    pub fn info_alignment(&self) -> usize {
        size_of::<u32>()
    }

    pub fn data_size(&self) -> usize {
        self.data_size
    }

    pub fn info_size(&self) -> usize {
        size_of::<ThreadTraceInfoData>()
    }

    pub fn data_offset(&self) -> GpuSize {
        self.data_offset
    }

    pub fn set_data_offset(&mut self, offset: GpuSize) {
        self.data_offset = offset;
    }

    pub fn info_offset(&self) -> GpuSize {
        self.info_offset
    }

    pub fn set_info_offset(&mut self, offset: GpuSize) {
        self.info_offset = offset;
    }

    pub fn sq_thread_trace_size(&self) -> SqThreadTraceSize {
        self.sq_thread_trace_size
    }

    pub fn sq_thread_trace_mode(&self) -> SqThreadTraceMode {
        self.sq_thread_trace_mode
    }

    pub fn sq_thread_trace_mask(&self) -> SqThreadTraceMask {
        self.sq_thread_trace_mask
    }

    pub fn sq_thread_trace_token_mask(&self) -> SqThreadTraceTokenMask {
        self.sq_thread_trace_token_mask
    }

    pub fn sq_thread_trace_perf_mask(&self) -> SqThreadTracePerfMask {
        self.sq_thread_trace_perf_mask
    }

    fn grbm_gfx_index(&self) -> GrbmGfxIndex {
        GrbmGfxIndex::default()
            .with_se_index(self.shader_engine)
            .with_sh_index(self.sq_thread_trace_mask.sh_sel())
            .with_instance_broadcast_writes(1)
    }

    fn write_isolate(&self, cmd: &mut dyn CmdStream, cs: CmdSpace) -> CmdSpace {
        cmd.write_set_one_config_reg(self.reg_info.mm_grbm_gfx_index, self.grbm_gfx_index().0, cs)
    }

    /// Points the SQ at the trace buffer and loads the trace configuration.
    pub fn write_setup_commands(
        &self,
        base_gpu_virt_addr: GpuSize,
        cmd: &mut dyn CmdStream,
        cs: CmdSpace,
    ) -> CmdSpace {
        let reg_info = &self.reg_info;
        let addr = base_gpu_virt_addr + self.data_offset;
        let base = SqThreadTraceBase::default().with_addr((addr >> BUFFER_ALIGN_SHIFT) as u32);

        let mut cs = self.write_isolate(cmd, cs);

        for (reg, val) in [
            (reg_info.mm_sq_thread_trace_base, base.0),
            (reg_info.mm_sq_thread_trace_size, self.sq_thread_trace_size.0),
            (reg_info.mm_sq_thread_trace_mask, self.sq_thread_trace_mask.0),
            (reg_info.mm_sq_thread_trace_token_mask, self.sq_thread_trace_token_mask.0),
            (reg_info.mm_sq_thread_trace_perf_mask, self.sq_thread_trace_perf_mask.0),
        ] {
            cs = cmd.write_set_one_perf_ctr_reg(reg, val, cs);
        }

        cs
    }

    /// Swaps the token filter of a running trace, and the register filter if `config` has one.
    pub fn write_update_token_mask_commands(
        &self,
        config: &ThreadTraceTokenConfig,
        cmd: &mut dyn CmdStream,
        cs: CmdSpace,
    ) -> CmdSpace {
        let mut token_mask = self.sq_thread_trace_token_mask
            .with_token_mask(config.hw_token_mask());

        if let Some(reg_mask) = config.hw_reg_mask() {
            token_mask.set_reg_mask(reg_mask);
        }

        let cs = self.write_isolate(cmd, cs);

        cmd.write_set_one_perf_ctr_reg(self.reg_info.mm_sq_thread_trace_token_mask, token_mask.0, cs)
    }

    pub fn write_start_commands(&self, cmd: &mut dyn CmdStream, cs: CmdSpace) -> CmdSpace {
        let ctrl = SqThreadTraceCtrl::default().with_reset_buffer(1);
        let mode = self.sq_thread_trace_mode.with_mode(SQ_THREAD_TRACE_MODE_ON);

        let cs = self.write_isolate(cmd, cs);
        let cs = cmd.write_set_one_perf_ctr_reg(self.reg_info.mm_sq_thread_trace_ctrl, ctrl.0, cs);

        cmd.write_set_one_perf_ctr_reg(self.reg_info.mm_sq_thread_trace_mode, mode.0, cs)
    }

    /// Turns the trace off, flushes it, waits for the SQ to go idle and copies
    /// WPTR/STATUS/CNTR into the info block.
    pub fn write_stop_commands(
        &self,
        base_gpu_virt_addr: GpuSize,
        cmd: &mut dyn CmdStream,
        cs: CmdSpace,
    ) -> CmdSpace {
        let reg_info = &self.reg_info;
        let mode = self.sq_thread_trace_mode.with_mode(SQ_THREAD_TRACE_MODE_OFF);

        let cs = self.write_isolate(cmd, cs);
        let cs = cmd.write_set_one_perf_ctr_reg(reg_info.mm_sq_thread_trace_mode, mode.0, cs);
        let cs = cmd.write(&pm4::build_event_write(VgtEventType::ThreadTraceFlush), cs);

        let wait = WaitRegMemInfo {
            space: WaitRegMemSpace::Register,
            function: WaitRegMemFunc::Equal,
            engine: Pm4Engine::Me,
            addr: reg_info.mm_sq_thread_trace_status as GpuSize,
            reference: 0,
            mask: SQ_THREAD_TRACE_STATUS__BUSY_MASK,
            poll_interval: 4,
        };
        let mut cs = cmd.write(&pm4::build_wait_reg_mem(&wait), cs);

        let info_addr = base_gpu_virt_addr + self.info_offset;

        for (reg, field_offset) in [
            (reg_info.mm_sq_thread_trace_wptr, offset_of!(ThreadTraceInfoData, cur_offset)),
            (reg_info.mm_sq_thread_trace_status, offset_of!(ThreadTraceInfoData, trace_status)),
            (mmSQ_THREAD_TRACE_CNTR, offset_of!(ThreadTraceInfoData, write_counter)),
        ] {
            let copy = CopyDataInfo {
                engine: Pm4Engine::Me,
                src_sel: CopyDataSrc::PerfCounter,
                src_addr: reg as GpuSize,
                dst_sel: CopyDataDst::AsyncMemory,
                dst_addr: info_addr + field_offset as GpuSize,
                count_sel_2dw: false,
                wr_confirm: true,
            };

            cs = cmd.write(&pm4::build_copy_data(&copy), cs);
        }

        cs
    }

    /// Writes `data` into the user-data register backing `marker`.
    /// GRBM_GFX_INDEX is left alone.
    pub fn write_insert_marker(
        &self,
        marker: PerfTraceMarkerType,
        data: u32,
        cmd: &mut dyn CmdStream,
        cs: CmdSpace,
    ) -> CmdSpace {
        let reg = self.reg_info.mm_sq_thread_trace_userdata[marker.userdata_index()];

        cmd.write_set_one_perf_ctr_reg(reg, data, cs)
    }
}
