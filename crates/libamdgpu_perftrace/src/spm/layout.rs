use tracing::warn;
use crate::GpuSize;
use crate::block::GpuBlock;
use crate::{Result, try_alloc_vec};
use super::*;

/// Where one requested counter lands in every sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpmCounterData {
    pub segment: SpmSegment,
    /// In 16-bit entries from the start of the sample.
    pub offset: u32,
    pub gpu_block: GpuBlock,
    pub instance: u32,
    pub event_id: u32,
}

/// Decoder-facing description of an SPM ring.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpmTraceLayout {
    /// Ring offset inside the experiment's GPU memory.
    pub offset: GpuSize,
    /// Write pointer, relative to `offset`.
    pub wptr_offset: GpuSize,
    /// First sample, relative to `offset`.
    pub sample_offset: GpuSize,
    pub sample_size_in_bytes: u32,
    /// Indexed by `SpmSegment as usize`.
    pub segment_size_in_bytes: [u32; SpmSegment::COUNT],
    /// One slot per requested counter, `None` if no streaming counter carries it.
    pub counter_data: Vec<Option<SpmCounterData>>,
}

impl SpmTraceLayout {
    /// The RLC writes its write pointer in the first dword, samples start 8 dwords in.
    pub const SAMPLE_OFFSET: GpuSize = 8 * 4;

    pub fn new(num_counters: usize) -> Result<Self> {
        let mut counter_data = try_alloc_vec(num_counters, "SPM layout counters")?;
        counter_data.resize(num_counters, None);

        Ok(Self { counter_data, ..Default::default() })
    }

    pub fn num_counters(&self) -> usize {
        self.counter_data.len()
    }
}

impl SpmTrace<'_> {
    /// Fills `layout`, which must be sized for exactly the requested counters.
    pub fn get_trace_layout(&self, layout: &mut SpmTraceLayout) {
        assert_eq!(
            layout.num_counters(),
            self.perf_counter_infos.len(),
            "SPM layout sized for a different number of counters",
        );

        layout.offset = self.data_offset;
        layout.wptr_offset = 0;
        layout.sample_offset = SpmTraceLayout::SAMPLE_OFFSET;
        layout.sample_size_in_bytes = self.segment_size.perfmon_segment_size() * BYTES_PER_BITLINE;

        for segment in SpmSegment::CANONICAL_ORDER {
            layout.segment_size_in_bytes[segment as usize] = self.segment_lines(segment) * BYTES_PER_BITLINE;
        }

        for (info, data) in self.perf_counter_infos.iter().zip(layout.counter_data.iter_mut()) {
            let found = self.spm_counters
                .iter()
                .filter(|c| c.block() == info.block && c.instance() == info.instance)
                .find_map(|c| {
                    let (sub_slot, event_id) = c.active_sub_slots().find(|(_, ev)| *ev == info.event_id)?;

                    Some(SpmCounterData {
                        segment: c.segment()?,
                        offset: c.data_offset(sub_slot),
                        gpu_block: info.block,
                        instance: info.instance,
                        event_id,
                    })
                });

            if found.is_none() {
                warn!("no streaming counter carries {}[{}] event {}", info.block, info.instance, info.event_id);
            }

            *data = found;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::{AsicName, ChipProperties};
    use crate::counter::{PerfCounterInfo, acquire_streaming_counters};

    fn planned<'c>(chip: &'c ChipProperties, infos: &[PerfCounterInfo], acquire: &[PerfCounterInfo]) -> SpmTrace<'c> {
        let mut trace = SpmTrace::new(chip);
        trace.init(&SpmTraceCreateInfo { ring_size: 0x4000, spm_interval: 32, perf_counter_infos: infos }).unwrap();
        for c in acquire_streaming_counters(chip, acquire).unwrap() {
            trace.add_streaming_counter(c).unwrap();
        }
        trace.calculate_segment_size().unwrap();
        trace.calculate_muxsel_ram().unwrap();
        trace
    }

    #[test]
    fn layout_matches_requests() {
        let chip = ChipProperties::new(AsicName::CHIP_POLARIS10);
        let infos = [
            PerfCounterInfo { block: GpuBlock::Tcc, instance: 0, event_id: 7 },
            PerfCounterInfo { block: GpuBlock::Sq, instance: 2, event_id: 4 },
            PerfCounterInfo { block: GpuBlock::Tcc, instance: 0, event_id: 9 },
        ];
        let mut trace = planned(&chip, &infos, &infos);
        trace.set_data_offset(0x3000);

        let mut layout = SpmTraceLayout::new(infos.len()).unwrap();
        trace.get_trace_layout(&mut layout);

        assert_eq!((layout.offset, layout.wptr_offset, layout.sample_offset), (0x3000, 0, 32));
        // Global 2 lines, SE2 2 lines
        assert_eq!(layout.sample_size_in_bytes, 4 * 32);
        assert_eq!(layout.segment_size_in_bytes[SpmSegment::Global as usize], 64);
        assert_eq!(layout.segment_size_in_bytes[SpmSegment::Se2 as usize], 64);
        assert_eq!(layout.segment_size_in_bytes[SpmSegment::Se3 as usize], 0);

        let data: Vec<_> = layout.counter_data.iter().map(|d| d.unwrap()).collect();
        assert_eq!((data[0].segment, data[0].offset, data[0].event_id), (SpmSegment::Global, 4, 7));
        assert_eq!((data[1].segment, data[1].offset), (SpmSegment::Se2, 32));
        assert_eq!((data[2].offset, data[2].gpu_block), (16, GpuBlock::Tcc));
    }

    #[test]
    fn unmatched_request_stays_empty() {
        let chip = ChipProperties::new(AsicName::CHIP_POLARIS10);
        let infos = [PerfCounterInfo { block: GpuBlock::Ta, instance: 0, event_id: 1 }];
        let trace = planned(&chip, &infos, &[]);

        let mut layout = SpmTraceLayout::new(1).unwrap();
        trace.get_trace_layout(&mut layout);

        assert_eq!(layout.counter_data, [None]);
    }

    #[test]
    #[should_panic(expected = "different number of counters")]
    fn layout_count_mismatch() {
        let chip = ChipProperties::new(AsicName::CHIP_POLARIS10);
        let trace = planned(&chip, &[], &[]);
        let mut layout = SpmTraceLayout::new(2).unwrap();

        trace.get_trace_layout(&mut layout);
    }
}
