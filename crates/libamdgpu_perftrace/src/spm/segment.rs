use tracing::debug;
use crate::{PerfTraceError, Result};
use crate::reg::RlcSpmPerfmonSegmentSize;
use super::*;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct ParityCount {
    even: u32,
    odd: u32,
}

impl ParityCount {
    fn add(&mut self, parity_id: u32) {
        if parity_id % 2 == 0 {
            self.even += 1;
        } else {
            self.odd += 1;
        }
    }

    /// Even lines hold counters 0/2 and odd lines 1/3, they alternate,
    /// so the segment needs twice the larger side.
    /// 32 even deltas and 16 odd deltas: 2 * max(2, 1) = 4 lines, line 3 stays empty.
    fn num_lines(&self) -> u32 {
        let even = self.even.div_ceil(MUXSEL_ENTRIES_PER_BITLINE);
        let odd = self.odd.div_ceil(MUXSEL_ENTRIES_PER_BITLINE);

        2 * even.max(odd)
    }
}

impl SpmTrace<'_> {
    /// Assigns every streaming counter to its segment and sizes the segments in bitlines.
    pub fn calculate_segment_size(&mut self) -> Result<()> {
        let chip = self.chip;
        let mut counts = [ParityCount::default(); SpmSegment::COUNT];

        counts[SpmSegment::Global as usize].even = NUM_TIMESTAMP_ENTRIES;

        for counter in self.spm_counters.iter_mut() {
            let block = counter.block();

            let segment = if block.uses_global_muxsel() {
                SpmSegment::Global
            } else {
                let se = chip.se_index(block, counter.instance());
                let invalid_se = PerfTraceError::InvalidShaderEngine {
                    se,
                    num_se: chip.num_shader_engines,
                };

                if se >= chip.num_shader_engines {
                    return Err(invalid_se);
                }

                SpmSegment::from_se_index(se).ok_or(invalid_se)?
            };

            counter.set_segment(segment);

            for (sub_slot, _) in counter.active_sub_slots() {
                counts[segment as usize].add(counter.parity_id(sub_slot));
            }
        }

        let lines = counts.map(|c| c.num_lines());

        for segment in SpmSegment::CANONICAL_ORDER {
            let lines = lines[segment as usize];

            if lines > RlcSpmPerfmonSegmentSize::MAX_NUM_LINE {
                return Err(PerfTraceError::SegmentOverflow {
                    segment,
                    lines,
                    max: RlcSpmPerfmonSegmentSize::MAX_NUM_LINE,
                });
            }
        }

        // SE3 has no field, hardware takes it from the total.
        let total: u32 = lines.iter().sum();

        self.segment_size = RlcSpmPerfmonSegmentSize::default()
            .with_perfmon_segment_size(total)
            .with_global_num_line(lines[SpmSegment::Global as usize])
            .with_se0_num_line(lines[SpmSegment::Se0 as usize])
            .with_se1_num_line(lines[SpmSegment::Se1 as usize])
            .with_se2_num_line(lines[SpmSegment::Se2 as usize]);

        debug!("SPM segment size: {:?}, SE3 {} lines", self.segment_size, lines[SpmSegment::Se3 as usize]);

        Ok(())
    }

    /// Bitlines of `segment` as programmed in RLC_SPM_PERFMON_SEGMENT_SIZE.
    pub fn segment_lines(&self, segment: SpmSegment) -> u32 {
        let s = &self.segment_size;

        match segment {
            SpmSegment::Global => s.global_num_line(),
            SpmSegment::Se0 => s.se0_num_line(),
            SpmSegment::Se1 => s.se1_num_line(),
            SpmSegment::Se2 => s.se2_num_line(),
            SpmSegment::Se3 => s.perfmon_segment_size().saturating_sub(
                s.global_num_line() + s.se0_num_line() + s.se1_num_line() + s.se2_num_line()
            ),
        }
    }

    pub fn muxsel_ram_dwords(&self, segment: SpmSegment) -> u32 {
        // The timestamp always takes a global line, zero means the trace has not been planned.
        assert!(self.segment_size.global_num_line() != 0, "SPM segment size has not been calculated");

        self.segment_lines(segment) * DWORDS_PER_BITLINE
    }

    /// Segments with selectors to upload, in sample order.
    pub fn active_segments(&self) -> impl Iterator<Item = SpmSegment> + '_ {
        SpmSegment::CANONICAL_ORDER
            .into_iter()
            .filter(|seg| self.segment_lines(*seg) != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::GpuBlock;
    use crate::chip::{AsicName, ChipProperties};
    use crate::counter::StreamingCounter;

    /// `n` TA counters on instance 0 (SE0), each streaming sub-slots 0 and 2.
    fn even_ta_counters(chip: &ChipProperties, n: u32) -> Vec<StreamingCounter> {
        (0..n).map(|slot| {
            let mut c = StreamingCounter::new(chip, GpuBlock::Ta, 0, slot);
            c.set_event_id(0, 1);
            c.set_event_id(2, 2);
            c
        }).collect()
    }

    fn plan(chip: &ChipProperties, counters: Vec<StreamingCounter>) -> Result<SpmTrace<'_>> {
        let mut trace = SpmTrace::new(chip);

        for c in counters {
            trace.add_streaming_counter(c)?;
        }
        trace.calculate_segment_size()?;

        Ok(trace)
    }

    #[test]
    fn parity_padding() {
        assert_eq!(ParityCount { even: 0, odd: 0 }.num_lines(), 0);
        assert_eq!(ParityCount { even: 4, odd: 0 }.num_lines(), 2);
        assert_eq!(ParityCount { even: 32, odd: 16 }.num_lines(), 4);
        assert_eq!(ParityCount { even: 1, odd: 17 }.num_lines(), 4);
    }

    #[test]
    fn timestamp_only() {
        let chip = ChipProperties::new(AsicName::CHIP_HAWAII);
        let trace = plan(&chip, Vec::new()).unwrap();

        assert_eq!(trace.segment_lines(SpmSegment::Global), 2);
        assert_eq!(trace.segment_size().perfmon_segment_size(), 2);
        assert_eq!(trace.active_segments().collect::<Vec<_>>(), [SpmSegment::Global]);
        assert_eq!(trace.muxsel_ram_dwords(SpmSegment::Se0), 0);
        assert_eq!(trace.muxsel_ram_dwords(SpmSegment::Global), 16);
    }

    #[test]
    fn seventeen_even_counters_need_four_lines() {
        let chip = ChipProperties::new(AsicName::CHIP_HAWAII);
        let mut counters = even_ta_counters(&chip, 9);
        // drop one so 17 even entries remain
        counters[8] = StreamingCounter::new(&chip, GpuBlock::Ta, 0, 8);
        counters[8].set_event_id(0, 1);

        let trace = plan(&chip, counters).unwrap();

        assert_eq!(trace.segment_lines(SpmSegment::Se0), 4);
        assert_eq!(trace.segment_size().perfmon_segment_size(), 6);
        assert!(trace.streaming_counters().iter().all(|c| c.segment() == Some(SpmSegment::Se0)));
    }

    #[test]
    fn se3_is_implicit() {
        let chip = ChipProperties::new(AsicName::CHIP_HAWAII);
        let instance = chip.block_info(GpuBlock::Ta).num_instances - 1;
        let mut c = StreamingCounter::new(&chip, GpuBlock::Ta, instance, 0);
        c.set_event_id(1, 7);

        let trace = plan(&chip, vec![c]).unwrap();
        let seg = trace.segment_size();

        assert_eq!(trace.streaming_counters()[0].segment(), Some(SpmSegment::Se3));
        assert_eq!((seg.se0_num_line(), seg.se1_num_line(), seg.se2_num_line()), (0, 0, 0));
        assert_eq!(trace.segment_lines(SpmSegment::Se3), 2);
        assert_eq!(seg.perfmon_segment_size(), 4);
    }

    #[test]
    fn segment_overflow() {
        let chip = ChipProperties::new(AsicName::CHIP_HAWAII);
        // 242 even entries: 16 even lines, 32 in total
        let err = plan(&chip, even_ta_counters(&chip, 121)).unwrap_err();

        assert_eq!(
            err,
            PerfTraceError::SegmentOverflow { segment: SpmSegment::Se0, lines: 32, max: 31 },
        );
    }

    #[test]
    fn shader_engine_out_of_range() {
        let mut chip = ChipProperties::new(AsicName::CHIP_HAWAII);
        // 16 CBs over 3 SEs: instance 15 lands on SE3
        chip.num_shader_engines = 3;
        let mut c = StreamingCounter::new(&chip, GpuBlock::Cb, 15, 0);
        c.set_event_id(0, 1);

        let mut trace = SpmTrace::new(&chip);
        trace.add_streaming_counter(c).unwrap();

        assert!(matches!(
            trace.calculate_segment_size(),
            Err(PerfTraceError::InvalidShaderEngine { se: 3, num_se: 3 }),
        ));
    }
}
