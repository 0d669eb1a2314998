use crate::block::GpuBlock;
use crate::chip::ChipProperties;
use crate::cmd_stream::{CmdSpace, CmdStream};
use crate::reg::*;
use crate::spm::SpmSegment;
use crate::{PerfTraceError, Result, try_alloc_vec};

/// Events one SPM counter slot can stream (SELECT carries 0/1, SELECT1 carries 2/3).
pub const MAX_STREAMING_CTR_PER_SUMMARY_CTR: usize = 4;

/// Largest event id the PERF_SEL field of `block` holds (9 bits on SQ, 10 elsewhere).
pub const fn max_event_id(block: GpuBlock) -> u32 {
    match block {
        GpuBlock::Sq => (1 << 9) - 1,
        _ => (1 << 10) - 1,
    }
}

/// One requested hardware counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PerfCounterInfo {
    pub block: GpuBlock,
    /// Chip-global instance index.
    pub instance: u32,
    pub event_id: u32,
}

/// A perf counter slot bound to SPM, streaming up to four events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamingCounter {
    block: GpuBlock,
    instance: u32,
    slot: u32,
    event_ids: [Option<u32>; MAX_STREAMING_CTR_PER_SUMMARY_CTR],
    segment: Option<SpmSegment>,
    /// In 16-bit sample entries.
    data_offsets: [u32; MAX_STREAMING_CTR_PER_SUMMARY_CTR],
    grbm_gfx_index: Option<GrbmGfxIndex>,
}

impl StreamingCounter {
    pub fn new(chip: &ChipProperties, block: GpuBlock, instance: u32, slot: u32) -> Self {
        let num_instances = chip.block_info(block).num_instances;

        let grbm_gfx_index = (num_instances > 1).then(|| {
            if block.uses_global_muxsel() {
                GrbmGfxIndex::default()
                    .with_instance_index(instance)
                    .with_sh_broadcast_writes(1)
                    .with_se_broadcast_writes(1)
            } else {
                GrbmGfxIndex::default()
                    .with_se_index(chip.se_index(block, instance))
                    .with_instance_index(chip.instance_in_se(block, instance))
                    .with_sh_broadcast_writes(1)
            }
        });

        Self {
            block,
            instance,
            slot,
            event_ids: [None; MAX_STREAMING_CTR_PER_SUMMARY_CTR],
            segment: None,
            data_offsets: [0; MAX_STREAMING_CTR_PER_SUMMARY_CTR],
            grbm_gfx_index,
        }
    }

    pub fn block(&self) -> GpuBlock {
        self.block
    }

    pub fn instance(&self) -> u32 {
        self.instance
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// SQ counters have a single select field per slot.
    pub fn num_sub_slots(&self) -> usize {
        if self.block == GpuBlock::Sq { 1 } else { MAX_STREAMING_CTR_PER_SUMMARY_CTR }
    }

    pub fn event_id(&self, sub_slot: usize) -> Option<u32> {
        self.event_ids[sub_slot]
    }

    pub fn set_event_id(&mut self, sub_slot: usize, event_id: u32) {
        assert!(sub_slot < self.num_sub_slots(), "{} has no sub-slot {sub_slot}", self.block);
        self.event_ids[sub_slot] = Some(event_id);
    }

    /// Puts `event_id` into the first free sub-slot.
    pub fn add_event(&mut self, event_id: u32) -> bool {
        let num_sub_slots = self.num_sub_slots();

        match self.event_ids[..num_sub_slots].iter_mut().find(|ev| ev.is_none()) {
            Some(ev) => {
                *ev = Some(event_id);
                true
            },
            None => false,
        }
    }

    /// `(sub_slot, event_id)` of every programmed sub-slot.
    pub fn active_sub_slots(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.event_ids
            .iter()
            .enumerate()
            .filter_map(|(sub_slot, ev)| ev.map(|ev| (sub_slot, ev)))
    }

    /// Streaming counter id. Its parity picks the even or odd bitlines.
    pub fn parity_id(&self, sub_slot: usize) -> u32 {
        if self.block == GpuBlock::Sq {
            self.slot
        } else {
            self.slot * MAX_STREAMING_CTR_PER_SUMMARY_CTR as u32 + sub_slot as u32
        }
    }

    pub fn segment(&self) -> Option<SpmSegment> {
        self.segment
    }

    pub fn set_segment(&mut self, segment: SpmSegment) {
        self.segment = Some(segment);
    }

    pub fn data_offset(&self, sub_slot: usize) -> u32 {
        self.data_offsets[sub_slot]
    }

    pub fn set_data_offset(&mut self, sub_slot: usize, offset: u32) {
        self.data_offsets[sub_slot] = offset;
    }

    /// Needs GRBM_GFX_INDEX steered to its SE/instance before programming.
    pub fn is_indexed(&self) -> bool {
        self.grbm_gfx_index.is_some()
    }

    /// Programs the select register(s) with the sub-slot events in SPM mode.
    /// Leaves GRBM_GFX_INDEX isolated for indexed counters.
    pub fn write_setup_commands(
        &self,
        reg_info: &RegInfo,
        cmd: &mut dyn CmdStream,
        mut cs: CmdSpace,
    ) -> CmdSpace {
        if let Some(grbm_gfx_index) = self.grbm_gfx_index {
            cs = cmd.write_set_one_config_reg(reg_info.mm_grbm_gfx_index, grbm_gfx_index.0, cs);
        }

        let base = self.block.perf_sel_reg_base();
        let ev = |sub_slot: usize| self.event_ids[sub_slot].unwrap_or(0);

        if self.block == GpuBlock::Sq {
            let select = SqPerfCounterSelect::default()
                .with_perf_sel(ev(0))
                .with_sqc_bank_mask(0xF)
                .with_sqc_client_mask(0xF)
                .with_spm_mode(PERFMON_SPM_MODE_16BIT_CLAMP)
                .with_simd_mask(0xF);

            cs = cmd.write_set_one_perf_ctr_reg(base + self.slot, select.0, cs);
        } else {
            let select = PerfCounterSelect::default()
                .with_perf_sel(ev(0))
                .with_perf_sel1(ev(1))
                .with_cntr_mode(PERFMON_SPM_MODE_16BIT_CLAMP);
            let select1 = PerfCounterSelect1::default()
                .with_perf_sel2(ev(2))
                .with_perf_sel3(ev(3));
            let reg = base + self.slot * 2;

            cs = cmd.write_set_one_perf_ctr_reg(reg, select.0, cs);
            cs = cmd.write_set_one_perf_ctr_reg(reg + 1, select1.0, cs);
        }

        cs
    }
}

/// Binds every request to a streaming counter slot.
///
/// Events on the same block instance share a slot until its sub-slots run out,
/// requests repeating an event reuse the existing sub-slot.
pub fn acquire_streaming_counters(
    chip: &ChipProperties,
    infos: &[PerfCounterInfo],
) -> Result<Vec<StreamingCounter>> {
    let mut counters: Vec<StreamingCounter> = try_alloc_vec(infos.len(), "streaming counters")?;

    for info in infos {
        let block_info = chip.block_info(info.block);

        if info.instance >= block_info.num_instances {
            return Err(PerfTraceError::InvalidInstance {
                block: info.block,
                instance: info.instance,
                num_instances: block_info.num_instances,
            });
        }

        let max = max_event_id(info.block);

        if info.event_id > max {
            return Err(PerfTraceError::InvalidEventId {
                block: info.block,
                event_id: info.event_id,
                max,
            });
        }

        let same_instance = |c: &StreamingCounter| c.block == info.block && c.instance == info.instance;

        if counters.iter().any(|c| same_instance(c) && c.event_ids.contains(&Some(info.event_id))) {
            continue;
        }

        if counters.iter_mut().any(|c| same_instance(c) && c.add_event(info.event_id)) {
            continue;
        }

        let slot = counters.iter().filter(|c| same_instance(c)).count() as u32;

        if slot >= block_info.num_spm_counters {
            return Err(PerfTraceError::CounterSlotsExhausted {
                block: info.block,
                instance: info.instance,
            });
        }

        let mut counter = StreamingCounter::new(chip, info.block, info.instance, slot);
        counter.set_event_id(0, info.event_id);
        counters.push(counter);
    }

    Ok(counters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::AsicName;
    use crate::pm4::CmdBuffer;

    fn info(block: GpuBlock, instance: u32, event_id: u32) -> PerfCounterInfo {
        PerfCounterInfo { block, instance, event_id }
    }

    #[test]
    fn events_share_a_slot() {
        let chip = ChipProperties::new(AsicName::CHIP_HAWAII);
        let infos: Vec<_> = (0..5).map(|ev| info(GpuBlock::Tcc, 2, ev)).collect();
        let counters = acquire_streaming_counters(&chip, &infos).unwrap();

        assert_eq!(counters.len(), 2);
        assert_eq!(counters[0].active_sub_slots().count(), 4);
        assert_eq!(counters[1].slot(), 1);
        assert_eq!(counters[1].event_id(0), Some(4));
        assert_eq!(counters[1].parity_id(0), 4);
    }

    #[test]
    fn sq_takes_one_slot_per_event() {
        let chip = ChipProperties::new(AsicName::CHIP_HAWAII);
        let infos = [info(GpuBlock::Sq, 1, 4), info(GpuBlock::Sq, 1, 5), info(GpuBlock::Sq, 1, 4)];
        let counters = acquire_streaming_counters(&chip, &infos).unwrap();

        assert_eq!(counters.len(), 2);
        assert_eq!(counters[1].parity_id(0), 1);
        assert_eq!(counters[1].num_sub_slots(), 1);
    }

    #[test]
    fn slot_exhaustion() {
        let chip = ChipProperties::new(AsicName::CHIP_HAWAII);
        // Cpg streams a single slot
        let infos: Vec<_> = (0..5).map(|ev| info(GpuBlock::Cpg, 0, ev)).collect();

        assert_eq!(
            acquire_streaming_counters(&chip, &infos),
            Err(PerfTraceError::CounterSlotsExhausted { block: GpuBlock::Cpg, instance: 0 }),
        );
    }

    #[test]
    fn instance_out_of_range() {
        let chip = ChipProperties::new(AsicName::CHIP_BONAIRE);
        let err = acquire_streaming_counters(&chip, &[info(GpuBlock::Sq, 1, 0)]).unwrap_err();

        assert!(matches!(err, PerfTraceError::InvalidInstance { num_instances: 1, .. }));
    }

    #[test]
    fn event_id_wider_than_perf_sel() {
        let chip = ChipProperties::new(AsicName::CHIP_HAWAII);

        assert_eq!(
            acquire_streaming_counters(&chip, &[info(GpuBlock::Tcc, 0, 1025)]),
            Err(PerfTraceError::InvalidEventId { block: GpuBlock::Tcc, event_id: 1025, max: 1023 }),
        );
        assert_eq!(
            acquire_streaming_counters(&chip, &[info(GpuBlock::Sq, 0, 512)]),
            Err(PerfTraceError::InvalidEventId { block: GpuBlock::Sq, event_id: 512, max: 511 }),
        );

        let counters = acquire_streaming_counters(&chip, &[info(GpuBlock::Tcc, 0, 1023)]).unwrap();
        assert_eq!(counters[0].event_id(0), Some(1023));
    }

    #[test]
    fn indexed_setup_isolates_instance() {
        let chip = ChipProperties::new(AsicName::CHIP_HAWAII);
        let reg_info = chip.reg_info();
        let mut counter = StreamingCounter::new(&chip, GpuBlock::Cb, 5, 0);
        counter.set_event_id(0, 0x10);
        counter.set_event_id(1, 0x11);
        counter.set_event_id(3, 0x13);

        let mut cmd = CmdBuffer::new();
        let cs = cmd.reserve_commands();
        let cs = counter.write_setup_commands(&reg_info, &mut cmd, cs);
        cmd.commit_commands(cs);

        let writes: Vec<_> = cmd.packets().filter_map(|p| p.as_reg_write()).collect();
        let grbm = GrbmGfxIndex(writes[0].1);

        assert!(counter.is_indexed());
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[0].0, reg_info.mm_grbm_gfx_index);
        assert_eq!((grbm.se_index(), grbm.instance_index(), grbm.se_broadcast_writes()), (1, 1, 0));

        let select = PerfCounterSelect(writes[1].1);
        let select1 = PerfCounterSelect1(writes[2].1);
        assert_eq!(writes[1].0, GpuBlock::Cb.perf_sel_reg_base());
        assert_eq!((select.perf_sel(), select.perf_sel1()), (0x10, 0x11));
        assert_eq!(select.cntr_mode(), PERFMON_SPM_MODE_16BIT_CLAMP);
        assert_eq!((select1.perf_sel2(), select1.perf_sel3()), (0, 0x13));
    }

    #[test]
    fn single_instance_block_is_not_indexed() {
        let chip = ChipProperties::new(AsicName::CHIP_BONAIRE);
        let counter = StreamingCounter::new(&chip, GpuBlock::Spi, 0, 0);

        assert!(!counter.is_indexed());
    }
}
