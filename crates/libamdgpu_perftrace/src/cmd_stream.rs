use crate::GpuSize;
use crate::pm4;
use crate::reg::{
    CONFIG_SPACE_END,
    CONFIG_SPACE_START,
    GrbmGfxIndex,
    RegInfo,
    UCONFIG_SPACE_END,
    UCONFIG_SPACE_START,
};

/// Write cursor into the currently reserved command space, in dwords.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct CmdSpace(pub usize);

impl CmdSpace {
    pub const fn advance(self, dwords: usize) -> Self {
        Self(self.0 + dwords)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u32)]
pub enum Pm4Engine {
    #[default]
    Me = 0,
    Pfp = 1,
    Ce = 2,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Predicate {
    #[default]
    Disable,
    Enable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum WriteDataDst {
    Register = 0,
    AsyncMemory = 5,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteDataInfo {
    pub engine: Pm4Engine,
    pub dst_sel: WriteDataDst,
    /// Register offset for `WriteDataDst::Register`, byte address otherwise.
    pub dst_addr: GpuSize,
    pub wr_confirm: bool,
    pub predicate: Predicate,
}

impl WriteDataInfo {
    /// Confirmed register write from the ME, used for streaming muxsel RAM.
    pub const fn register(reg: u32) -> Self {
        Self {
            engine: Pm4Engine::Me,
            dst_sel: WriteDataDst::Register,
            dst_addr: reg as GpuSize,
            wr_confirm: true,
            predicate: Predicate::Disable,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum CopyDataSrc {
    Register = 0,
    PerfCounter = 4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum CopyDataDst {
    Register = 0,
    AsyncMemory = 5,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CopyDataInfo {
    pub engine: Pm4Engine,
    pub src_sel: CopyDataSrc,
    pub src_addr: GpuSize,
    pub dst_sel: CopyDataDst,
    pub dst_addr: GpuSize,
    /// 64-bit copy when set.
    pub count_sel_2dw: bool,
    pub wr_confirm: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum WaitRegMemFunc {
    Always = 0,
    Less = 1,
    LessEqual = 2,
    Equal = 3,
    NotEqual = 4,
    GreaterEqual = 5,
    Greater = 6,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum WaitRegMemSpace {
    Register = 0,
    Memory = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitRegMemInfo {
    pub space: WaitRegMemSpace,
    pub function: WaitRegMemFunc,
    pub engine: Pm4Engine,
    pub addr: GpuSize,
    pub reference: u32,
    pub mask: u32,
    pub poll_interval: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum VgtEventType {
    PerfcounterStart = 0x17,
    PerfcounterStop = 0x18,
    PerfcounterSample = 0x1B,
    ThreadTraceMarker = 0x35,
    ThreadTraceFlush = 0x36,
    ThreadTraceFinish = 0x37,
}

pub const fn is_config_reg(reg: u32) -> bool {
    CONFIG_SPACE_START <= reg && reg < CONFIG_SPACE_END
}

pub const fn is_uconfig_reg(reg: u32) -> bool {
    UCONFIG_SPACE_START <= reg && reg < UCONFIG_SPACE_END
}

/// The command buffer the perf traces write into.
///
/// Emission follows a reserve / write / commit cycle: `reserve_commands` opens a window of
/// `reserve_limit()` dwords and returns a cursor at its start, writes advance the cursor,
/// `commit_commands` closes the window at the cursor.
pub trait CmdStream {
    fn reserve_limit(&self) -> usize;
    fn reserve_commands(&mut self) -> CmdSpace;
    fn commit_commands(&mut self, cs: CmdSpace);
    /// Copies a finished packet to `cs` and returns the cursor past it.
    fn write(&mut self, dwords: &[u32], cs: CmdSpace) -> CmdSpace;

    /// CONFIG or UCONFIG register write through the SET_*_REG packets.
    fn write_set_one_config_reg(&mut self, reg: u32, value: u32, cs: CmdSpace) -> CmdSpace {
        if is_uconfig_reg(reg) {
            self.write(&pm4::build_set_one_uconfig_reg(reg, value), cs)
        } else {
            self.write(&pm4::build_set_one_config_reg(reg, value), cs)
        }
    }

    /// Perf counter registers outside the SET_*_REG ranges are written with WRITE_DATA.
    fn write_set_one_perf_ctr_reg(&mut self, reg: u32, value: u32, cs: CmdSpace) -> CmdSpace {
        if is_config_reg(reg) || is_uconfig_reg(reg) {
            self.write_set_one_config_reg(reg, value, cs)
        } else {
            let info = WriteDataInfo {
                wr_confirm: false,
                ..WriteDataInfo::register(reg)
            };

            self.write(&pm4::build_write_data(&info, value), cs)
        }
    }

    /// Points GRBM_GFX_INDEX back at every SE, SH and instance.
    /// Isolating emitters leave this to their caller.
    fn write_grbm_gfx_index_broadcast(&mut self, reg_info: &RegInfo, cs: CmdSpace) -> CmdSpace {
        self.write_set_one_config_reg(
            reg_info.mm_grbm_gfx_index,
            GrbmGfxIndex::broadcast_all().0,
            cs,
        )
    }
}
