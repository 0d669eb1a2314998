use std::collections::HashSet;
use proptest::prelude::*;
use libamdgpu_perftrace::block::{GpuBlock, PerfmonSelData};
use libamdgpu_perftrace::chip::{AsicName, ChipProperties};
use libamdgpu_perftrace::counter::{PerfCounterInfo, acquire_streaming_counters};
use libamdgpu_perftrace::spm::*;

const ASICS: [AsicName; 4] = [
    AsicName::CHIP_BONAIRE,
    AsicName::CHIP_HAWAII,
    AsicName::CHIP_POLARIS10,
    AsicName::CHIP_POLARIS11,
];

fn counter_info(chip: ChipProperties) -> impl Strategy<Value = PerfCounterInfo> {
    (0..GpuBlock::COUNT, any::<u32>(), 0u32..32).prop_map(move |(b, instance, event_id)| {
        let block = GpuBlock::ALL[b];
        let num_instances = chip.block_info(block).num_instances;

        PerfCounterInfo { block, instance: instance % num_instances, event_id }
    })
}

fn chip_and_infos() -> impl Strategy<Value = (ChipProperties, Vec<PerfCounterInfo>)> {
    (0..ASICS.len()).prop_flat_map(|i| {
        let chip = ChipProperties::new(ASICS[i]);

        (Just(chip.clone()), prop::collection::vec(counter_info(chip), 0..48))
    })
}

/// `None` when the random request does not fit the hardware.
fn plan<'c>(chip: &'c ChipProperties, infos: &[PerfCounterInfo]) -> Option<SpmTrace<'c>> {
    let counters = acquire_streaming_counters(chip, infos).ok()?;
    let mut trace = SpmTrace::new(chip);

    trace.init(&SpmTraceCreateInfo { ring_size: 0x10_0000, spm_interval: 128, perf_counter_infos: infos }).ok()?;
    for c in counters {
        trace.add_streaming_counter(c).ok()?;
    }
    trace.calculate_segment_size().ok()?;
    trace.calculate_muxsel_ram().ok()?;

    Some(trace)
}

proptest! {
    #[test]
    fn segment_lines_add_up((chip, infos) in chip_and_infos()) {
        let Some(trace) = plan(&chip, &infos) else { return Ok(()) };
        let size = trace.segment_size();
        let lines: Vec<u32> = SpmSegment::CANONICAL_ORDER.iter().map(|s| trace.segment_lines(*s)).collect();

        prop_assert_eq!(lines.iter().sum::<u32>(), size.perfmon_segment_size());
        prop_assert!(trace.segment_lines(SpmSegment::Global) >= 2);

        for (segment, n) in SpmSegment::CANONICAL_ORDER.iter().zip(&lines) {
            // even and odd lines alternate
            prop_assert_eq!(n % 2, 0, "{} has {} lines", segment, n);
        }
    }

    #[test]
    fn segments_fit_their_counters((chip, infos) in chip_and_infos()) {
        let Some(trace) = plan(&chip, &infos) else { return Ok(()) };

        for segment in SpmSegment::CANONICAL_ORDER {
            let (mut even, mut odd) = (0u32, 0u32);

            if segment == SpmSegment::Global {
                even += NUM_TIMESTAMP_ENTRIES;
            }

            for c in trace.streaming_counters().iter().filter(|c| c.segment() == Some(segment)) {
                for (sub_slot, _) in c.active_sub_slots() {
                    if c.parity_id(sub_slot) % 2 == 0 { even += 1 } else { odd += 1 }
                }
            }

            let half = trace.segment_lines(segment) / 2;

            prop_assert!(even <= half * MUXSEL_ENTRIES_PER_BITLINE);
            prop_assert!(odd <= half * MUXSEL_ENTRIES_PER_BITLINE);
            // no spare pair of lines
            prop_assert!(half == 0 || (half - 1) * MUXSEL_ENTRIES_PER_BITLINE < even.max(odd));
        }
    }

    #[test]
    fn offsets_are_unique_and_in_range((chip, infos) in chip_and_infos()) {
        let Some(trace) = plan(&chip, &infos) else { return Ok(()) };
        let num_entries = trace.segment_size().perfmon_segment_size() * MUXSEL_ENTRIES_PER_BITLINE;
        let mut seen = HashSet::new();

        for c in trace.streaming_counters() {
            for (sub_slot, _) in c.active_sub_slots() {
                let offset = c.data_offset(sub_slot);

                prop_assert!(offset >= NUM_TIMESTAMP_ENTRIES);
                prop_assert!(offset < num_entries);
                prop_assert!(seen.insert(offset), "offset {} used twice", offset);
            }
        }
    }

    #[test]
    fn selector_sits_at_its_offset((chip, infos) in chip_and_infos()) {
        let Some(trace) = plan(&chip, &infos) else { return Ok(()) };

        for c in trace.streaming_counters() {
            let Some(segment) = c.segment() else {
                prop_assert!(false, "unplanned counter");
                continue;
            };
            let base: u32 = segment.preceding()
                .iter()
                .map(|s| trace.segment_lines(*s) * MUXSEL_ENTRIES_PER_BITLINE)
                .sum();
            let ram = trace.muxsel_ram(segment);

            for (sub_slot, _) in c.active_sub_slots() {
                let sel = ram.entry((c.data_offset(sub_slot) - base) as usize);

                prop_assert_eq!(sel.block(), c.block().spm_block_select());
                prop_assert_eq!(sel.counter() as u32, c.parity_id(sub_slot));
            }
        }
    }

    #[test]
    fn global_ram_starts_with_timestamp((chip, infos) in chip_and_infos()) {
        let Some(trace) = plan(&chip, &infos) else { return Ok(()) };
        let ram = trace.muxsel_ram(SpmSegment::Global);

        prop_assert_eq!(&ram.as_dwords()[..2], &[0xF0F0_F0F0, 0xF0F0_F0F0]);

        for i in 0..NUM_TIMESTAMP_ENTRIES as usize {
            prop_assert_eq!(ram.entry(i), PerfmonSelData::TIMESTAMP);
        }
    }

    #[test]
    fn replanning_is_stable((chip, infos) in chip_and_infos()) {
        let Some(mut trace) = plan(&chip, &infos) else { return Ok(()) };
        let counters = trace.streaming_counters().to_vec();
        let size = trace.segment_size();

        trace.calculate_segment_size().unwrap();
        trace.calculate_muxsel_ram().unwrap();

        prop_assert_eq!(trace.segment_size(), size);
        prop_assert_eq!(trace.streaming_counters(), &counters[..]);
    }

    #[test]
    fn layout_covers_every_request((chip, infos) in chip_and_infos()) {
        let Some(trace) = plan(&chip, &infos) else { return Ok(()) };
        let mut layout = SpmTraceLayout::new(infos.len()).unwrap();

        trace.get_trace_layout(&mut layout);

        prop_assert_eq!(
            layout.segment_size_in_bytes.iter().sum::<u32>(),
            layout.sample_size_in_bytes,
        );

        for (info, data) in infos.iter().zip(&layout.counter_data) {
            let Some(data) = data else {
                prop_assert!(false, "{:?} missing from the layout", info);
                continue;
            };

            prop_assert_eq!((data.gpu_block, data.instance, data.event_id), (info.block, info.instance, info.event_id));
            prop_assert!(data.offset * 2 < layout.sample_size_in_bytes);
        }
    }
}
