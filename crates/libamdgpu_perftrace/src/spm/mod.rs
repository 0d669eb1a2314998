//! RLC streaming performance monitor (SPM) traces.
//!
//! A trace is planned in three steps:
//!   1. [`SpmTrace::calculate_segment_size`] sizes every segment of a sample,
//!   2. [`SpmTrace::calculate_muxsel_ram`] encodes the muxsel RAM and assigns the sample offsets,
//!   3. the `write_*_commands` emit the PM4 which programs the RLC.
//!
//! Sample layout (one 256-bit line per row, entries are 16 bits):
//!
//! ```text
//! Global: | TS TS TS TS even ... | odd ... | even ... | ...
//! SE0:    | even ...             | odd ... | ...
//! SE1..SE3
//! ```

use std::fmt;
use tracing::debug;
use crate::GpuSize;
use crate::chip::{ChipProperties, MAX_SHADER_ENGINES, PerfCaps};
use crate::counter::{PerfCounterInfo, StreamingCounter};
use crate::reg::{RegInfo, RlcSpmPerfmonCntl, RlcSpmPerfmonRingSize, RlcSpmPerfmonSegmentSize};
use crate::{PerfTraceError, Result, try_alloc_vec};

mod segment;

mod muxsel;
pub use muxsel::*;

mod commands;

mod layout;
pub use layout::*;

/// Entries (muxsel selectors / sample values) per 256-bit bitline.
pub const MUXSEL_ENTRIES_PER_BITLINE: u32 = 16;
pub const NUM_BITS_PER_BITLINE: u32 = 256;
pub const BYTES_PER_BITLINE: u32 = NUM_BITS_PER_BITLINE / 8;
pub const DWORDS_PER_BITLINE: u32 = NUM_BITS_PER_BITLINE / 32;
/// Entries 0..4 of every sample hold the 64-bit GPU timestamp.
pub const NUM_TIMESTAMP_ENTRIES: u32 = 4;

/// One segment of an SPM sample. The discriminant is the hardware segment index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum SpmSegment {
    Se0 = 0,
    Se1 = 1,
    Se2 = 2,
    Se3 = 3,
    Global = 4,
}

impl SpmSegment {
    pub const COUNT: usize = 5;

    /// Order of the segments inside a sample.
    pub const CANONICAL_ORDER: [Self; Self::COUNT] = [
        Self::Global,
        Self::Se0,
        Self::Se1,
        Self::Se2,
        Self::Se3,
    ];

    /// `None` past the last shader engine segment.
    pub const fn from_se_index(se_index: u32) -> Option<Self> {
        match se_index {
            0 => Some(Self::Se0),
            1 => Some(Self::Se1),
            2 => Some(Self::Se2),
            3 => Some(Self::Se3),
            _ => None,
        }
    }

    /// Shader engine index, `None` for Global.
    pub fn se_index(&self) -> Option<u32> {
        match self {
            Self::Global => None,
            se => Some(*se as u32),
        }
    }

    /// Segments in front of this one inside a sample.
    pub fn preceding(&self) -> &'static [Self] {
        let pos = Self::CANONICAL_ORDER.iter().position(|s| s == self).unwrap_or(0);
        &Self::CANONICAL_ORDER[..pos]
    }
}

impl fmt::Display for SpmSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Global => write!(f, "Global"),
            se => write!(f, "SE{}", *se as u32),
        }
    }
}

const _: () = assert!(SpmSegment::COUNT == MAX_SHADER_ENGINES + 1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpmTraceCreateInfo<'a> {
    /// Ring buffer size in bytes.
    pub ring_size: u32,
    /// Sample interval in SCLK cycles.
    pub spm_interval: u32,
    pub perf_counter_infos: &'a [PerfCounterInfo],
}

/// One SPM trace bound to a chip.
#[derive(Debug)]
pub struct SpmTrace<'c> {
    chip: &'c ChipProperties,
    reg_info: RegInfo,
    perf_counter_infos: Vec<PerfCounterInfo>,
    spm_counters: Vec<StreamingCounter>,
    muxsel_ram: [MuxselRam; SpmSegment::COUNT],
    spm_perfmon_cntl: RlcSpmPerfmonCntl,
    segment_size: RlcSpmPerfmonSegmentSize,
    ring_size: RlcSpmPerfmonRingSize,
    ring_base_lo: u32,
    ring_base_hi: u32,
    /// Offset of the ring inside the experiment's GPU memory.
    data_offset: GpuSize,
}

impl<'c> SpmTrace<'c> {
    pub fn new(chip: &'c ChipProperties) -> Self {
        Self {
            chip,
            reg_info: chip.reg_info(),
            perf_counter_infos: Vec::new(),
            spm_counters: Vec::new(),
            muxsel_ram: Default::default(),
            spm_perfmon_cntl: RlcSpmPerfmonCntl::default(),
            segment_size: RlcSpmPerfmonSegmentSize::default(),
            ring_size: RlcSpmPerfmonRingSize::default(),
            ring_base_lo: 0,
            ring_base_hi: 0,
            data_offset: 0,
        }
    }

    /// Copies the requests and latches ring size and sample interval.
    pub fn init(&mut self, create_info: &SpmTraceCreateInfo) -> Result<()> {
        if !self.chip.caps.contains(PerfCaps::SPM_TRACE) {
            return Err(PerfTraceError::SpmUnsupported(self.chip.asic_name));
        }

        let interval = u16::try_from(create_info.spm_interval)
            .map_err(|_| PerfTraceError::InvalidSampleInterval(create_info.spm_interval))?;

        let infos = create_info.perf_counter_infos;
        let mut perf_counter_infos = try_alloc_vec(infos.len(), "perf counter infos")?;
        perf_counter_infos.extend_from_slice(infos);

        self.perf_counter_infos = perf_counter_infos;
        self.ring_size = RlcSpmPerfmonRingSize::default().with_ring_base_size(create_info.ring_size);
        self.spm_perfmon_cntl = RlcSpmPerfmonCntl::default().with_perfmon_sample_interval(interval as u32);

        debug!(
            "SPM trace: {} counters, ring {:#X} bytes, interval {interval}",
            infos.len(),
            create_info.ring_size,
        );

        Ok(())
    }

    pub fn add_streaming_counter(&mut self, counter: StreamingCounter) -> Result<()> {
        self.spm_counters
            .try_reserve(1)
            .map_err(|_| PerfTraceError::OutOfMemory { what: "streaming counters", count: 1 })?;
        self.spm_counters.push(counter);

        Ok(())
    }

    pub fn chip(&self) -> &'c ChipProperties {
        self.chip
    }

    pub fn perf_counter_infos(&self) -> &[PerfCounterInfo] {
        &self.perf_counter_infos
    }

    pub fn streaming_counters(&self) -> &[StreamingCounter] {
        &self.spm_counters
    }

    pub fn ring_size(&self) -> GpuSize {
        self.ring_size.ring_base_size() as GpuSize
    }

    pub fn data_offset(&self) -> GpuSize {
        self.data_offset
    }

    pub fn set_data_offset(&mut self, offset: GpuSize) {
        self.data_offset = offset;
    }

    pub fn segment_size(&self) -> RlcSpmPerfmonSegmentSize {
        self.segment_size
    }

    pub fn muxsel_ram(&self, segment: SpmSegment) -> &MuxselRam {
        &self.muxsel_ram[segment as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::AsicName;

    #[test]
    fn canonical_order() {
        assert!(SpmSegment::Global.preceding().is_empty());
        assert_eq!(SpmSegment::Se2.preceding(), &[SpmSegment::Global, SpmSegment::Se0, SpmSegment::Se1]);
        assert_eq!(SpmSegment::Se3.to_string(), "SE3");
        assert_eq!(SpmSegment::Global.se_index(), None);
    }

    #[test]
    fn segment_from_se_index() {
        assert_eq!(SpmSegment::from_se_index(0), Some(SpmSegment::Se0));
        assert_eq!(SpmSegment::from_se_index(3), Some(SpmSegment::Se3));
        assert_eq!(SpmSegment::from_se_index(4), None);
        assert_eq!(SpmSegment::from_se_index(u32::MAX), None);
    }

    #[test]
    fn init_latches_registers() {
        let chip = ChipProperties::new(AsicName::CHIP_HAWAII);
        let mut trace = SpmTrace::new(&chip);
        let infos = [PerfCounterInfo { block: crate::block::GpuBlock::Tcc, instance: 0, event_id: 3 }];

        trace.init(&SpmTraceCreateInfo {
            ring_size: 0x10_0000,
            spm_interval: 4096,
            perf_counter_infos: &infos,
        }).unwrap();

        assert_eq!(trace.ring_size(), 0x10_0000);
        assert_eq!(trace.spm_perfmon_cntl.perfmon_sample_interval(), 4096);
        assert_eq!(trace.perf_counter_infos(), &infos);
    }

    #[test]
    fn gfx6_has_no_spm() {
        let chip = ChipProperties::new(AsicName::CHIP_TAHITI);
        let mut trace = SpmTrace::new(&chip);
        let err = trace.init(&SpmTraceCreateInfo {
            ring_size: 0x1000,
            spm_interval: 16,
            perf_counter_infos: &[],
        });

        assert_eq!(err, Err(PerfTraceError::SpmUnsupported(AsicName::CHIP_TAHITI)));
    }

    #[test]
    fn sample_interval_overflow() {
        let chip = ChipProperties::new(AsicName::CHIP_HAWAII);
        let mut trace = SpmTrace::new(&chip);
        let err = trace.init(&SpmTraceCreateInfo {
            ring_size: 0x1000,
            spm_interval: 0x1_0000,
            perf_counter_infos: &[],
        });

        assert_eq!(err, Err(PerfTraceError::InvalidSampleInterval(0x1_0000)));
    }
}
