use tracing::trace;
use crate::block::{PerfmonSelData, global_muxsel_data, per_se_muxsel_data};
use crate::counter::MAX_STREAMING_CTR_PER_SUMMARY_CTR;
use crate::{Result, try_alloc_vec};
use super::*;

/// Muxsel RAM image of one segment.
///
/// Stored as dwords for the WRITE_DATA upload, addressed as 16-bit selector entries
/// (entry `2n` is the low half of dword `n`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MuxselRam {
    dwords: Vec<u32>,
}

impl MuxselRam {
    pub fn zeroed(num_dwords: usize) -> Result<Self> {
        let mut dwords = try_alloc_vec(num_dwords, "muxsel RAM")?;
        dwords.resize(num_dwords, 0);

        Ok(Self { dwords })
    }

    pub fn is_empty(&self) -> bool {
        self.dwords.is_empty()
    }

    pub fn as_dwords(&self) -> &[u32] {
        &self.dwords
    }

    pub fn num_entries(&self) -> usize {
        self.dwords.len() * 2
    }

    pub fn entry(&self, index: usize) -> PerfmonSelData {
        let shift = 16 * (index % 2);
        PerfmonSelData((self.dwords[index / 2] >> shift) as u16)
    }

    pub fn set_entry(&mut self, index: usize, sel: PerfmonSelData) {
        let shift = 16 * (index % 2);
        let dw = &mut self.dwords[index / 2];

        *dw = (*dw & !(0xFFFF << shift)) | ((sel.0 as u32) << shift);
    }

    pub fn entries(&self) -> impl Iterator<Item = PerfmonSelData> + '_ {
        (0..self.num_entries()).map(|i| self.entry(i))
    }
}

/// Next free even/odd entry of a segment.
#[derive(Clone, Copy, Debug)]
struct WriteIndex {
    even: u32,
    odd: u32,
}

impl WriteIndex {
    const INIT: Self = Self { even: 0, odd: MUXSEL_ENTRIES_PER_BITLINE };

    /// Returns the entry to write and moves past it, skipping the lines of the other parity.
    fn next(&mut self, parity_id: u32) -> u32 {
        let index = if parity_id % 2 == 0 { &mut self.even } else { &mut self.odd };
        let current = *index;

        *index += 1;

        if *index % MUXSEL_ENTRIES_PER_BITLINE == 0 {
            *index += MUXSEL_ENTRIES_PER_BITLINE;
        }

        current
    }
}

impl SpmTrace<'_> {
    /// Encodes the muxsel RAM of every segment and records each sub-slot's offset in the sample.
    ///
    /// The order selectors are written in is the order the deltas appear in a sample.
    /// Rebuilds from scratch, calling it again yields the same images and offsets.
    pub fn calculate_muxsel_ram(&mut self) -> Result<()> {
        let mut muxsel_ram: [MuxselRam; SpmSegment::COUNT] = Default::default();

        for segment in SpmSegment::CANONICAL_ORDER {
            let dwords = self.muxsel_ram_dwords(segment) as usize;

            if dwords != 0 {
                muxsel_ram[segment as usize] = MuxselRam::zeroed(dwords)?;
            }
        }

        // in 16-bit entries
        let mut segment_base = [0u32; SpmSegment::COUNT];

        for segment in SpmSegment::CANONICAL_ORDER {
            segment_base[segment as usize] = segment.preceding()
                .iter()
                .map(|s| self.segment_lines(*s) * MUXSEL_ENTRIES_PER_BITLINE)
                .sum();
        }

        let mut write_index = [WriteIndex::INIT; SpmSegment::COUNT];

        {
            let global = &mut muxsel_ram[SpmSegment::Global as usize];

            for i in 0..NUM_TIMESTAMP_ENTRIES {
                global.set_entry(i as usize, PerfmonSelData::TIMESTAMP);
            }
            write_index[SpmSegment::Global as usize].even = NUM_TIMESTAMP_ENTRIES;
        }

        let chip = self.chip;

        for counter in self.spm_counters.iter_mut() {
            let Some(segment) = counter.segment() else {
                panic!("{}[{}] has no SPM segment, plan the segment size first", counter.block(), counter.instance());
            };
            let block = counter.block();
            let instance = counter.instance();

            for sub_slot in 0..MAX_STREAMING_CTR_PER_SUMMARY_CTR {
                if counter.event_id(sub_slot).is_none() {
                    continue;
                }

                let counter_id = counter.parity_id(sub_slot);
                let sel = if block.uses_global_muxsel() {
                    global_muxsel_data(block, instance, counter_id)
                } else {
                    per_se_muxsel_data(chip, block, instance, counter_id)
                };

                let index = write_index[segment as usize].next(counter_id);
                muxsel_ram[segment as usize].set_entry(index as usize, sel);

                let offset = segment_base[segment as usize] + index;
                assert!(
                    offset >= NUM_TIMESTAMP_ENTRIES,
                    "{block}[{instance}] sub-slot {sub_slot} landed on the timestamp (offset {offset})",
                );

                trace!("{segment}: {block}[{instance}] slot {} sub-slot {sub_slot} -> entry {index}, offset {offset}", counter.slot());

                counter.set_data_offset(sub_slot, offset);
            }
        }

        self.muxsel_ram = muxsel_ram;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::GpuBlock;
    use crate::chip::{AsicName, ChipProperties};
    use crate::counter::StreamingCounter;

    #[test]
    fn entry_views_share_storage() {
        let mut ram = MuxselRam::zeroed(2).unwrap();
        ram.set_entry(1, PerfmonSelData(0xABCD));
        ram.set_entry(2, PerfmonSelData(0x1234));

        assert_eq!(ram.as_dwords(), &[0xABCD_0000, 0x0000_1234]);
        assert_eq!(ram.entry(1), PerfmonSelData(0xABCD));
        assert_eq!(ram.num_entries(), 4);
    }

    #[test]
    fn write_index_skips_other_parity() {
        let mut idx = WriteIndex::INIT;
        let even: Vec<_> = (0..17).map(|_| idx.next(0)).collect();

        assert_eq!(even[15], 15);
        assert_eq!(even[16], 32);
        assert_eq!(idx.next(1), 16);
    }

    fn planned_trace(chip: &ChipProperties) -> SpmTrace<'_> {
        let mut trace = SpmTrace::new(chip);
        let mut tcc = StreamingCounter::new(chip, GpuBlock::Tcc, 3, 0);
        tcc.set_event_id(0, 0x10);
        tcc.set_event_id(1, 0x11);
        let mut sq = StreamingCounter::new(chip, GpuBlock::Sq, 1, 1);
        sq.set_event_id(0, 0x20);

        trace.add_streaming_counter(tcc).unwrap();
        trace.add_streaming_counter(sq).unwrap();
        trace.calculate_segment_size().unwrap();
        trace.calculate_muxsel_ram().unwrap();
        trace
    }

    #[test]
    fn timestamp_and_offsets() {
        let chip = ChipProperties::new(AsicName::CHIP_HAWAII);
        let trace = planned_trace(&chip);
        let global = trace.muxsel_ram(SpmSegment::Global);
        let tcc = &trace.streaming_counters()[0];
        let sq = &trace.streaming_counters()[1];

        assert_eq!(&global.as_dwords()[..2], &[0xF0F0_F0F0, 0xF0F0_F0F0]);
        // even after the timestamp, odd at the start of line 1
        assert_eq!((tcc.data_offset(0), tcc.data_offset(1)), (4, 16));
        assert_eq!(global.entry(4).block(), GpuBlock::Tcc.spm_block_select());
        assert_eq!(global.entry(4).instance(), 3);
        assert_eq!(global.entry(16).counter(), 1);

        // SQ on SE1 with odd slot: behind Global (2 lines) and an empty SE0
        assert_eq!(sq.segment(), Some(SpmSegment::Se1));
        assert_eq!(sq.data_offset(0), 2 * 16 + 16);
        assert_eq!(trace.muxsel_ram(SpmSegment::Se1).entry(16).counter(), 1);
        assert!(trace.muxsel_ram(SpmSegment::Se0).is_empty());
    }

    #[test]
    fn rebuild_is_idempotent() {
        let chip = ChipProperties::new(AsicName::CHIP_HAWAII);
        let mut trace = planned_trace(&chip);
        let ram: Vec<_> = SpmSegment::CANONICAL_ORDER.iter().map(|s| trace.muxsel_ram(*s).clone()).collect();
        let counters = trace.streaming_counters().to_vec();

        trace.calculate_muxsel_ram().unwrap();

        for (s, before) in SpmSegment::CANONICAL_ORDER.iter().zip(&ram) {
            assert_eq!(trace.muxsel_ram(*s), before);
        }
        assert_eq!(trace.streaming_counters(), &counters[..]);
    }

    #[test]
    #[should_panic(expected = "plan the segment size first")]
    fn unplanned_counter_panics() {
        let chip = ChipProperties::new(AsicName::CHIP_HAWAII);
        let mut trace = planned_trace(&chip);
        let mut c = StreamingCounter::new(&chip, GpuBlock::Tcc, 4, 0);
        c.set_event_id(0, 1);
        trace.add_streaming_counter(c).unwrap();

        let _ = trace.calculate_muxsel_ram();
    }
}
