use libamdgpu_perftrace::GpuSize;
use libamdgpu_perftrace::block::GpuBlock;
use libamdgpu_perftrace::chip::{AsicName, ChipProperties, PerfCaps};
use libamdgpu_perftrace::pm4::CmdBuffer;
use libamdgpu_perftrace::reg::RegInfo;
use libamdgpu_perftrace::spm::{SpmSegment, SpmTraceLayout};
use crate::experiment::Experiment;

pub fn dump_asic_list() {
    println!("{:16} {:4} {:>2} {:>2} {:>3} {:>3}", "ASIC", "GFX", "SE", "SH", "CU", "SPM");

    for asic in AsicName::ALL {
        let chip = ChipProperties::new(asic);
        let num_cu: u32 = chip.active_cu_mask_gfx7[..chip.num_shader_engines as usize]
            .iter()
            .map(|mask| mask.count_ones())
            .sum();
        let spm = if chip.caps.contains(PerfCaps::SPM_TRACE) { "yes" } else { "no" };

        println!(
            "{:16} {:4} {:>2} {:>2} {:>3} {:>3}",
            asic.to_string(),
            chip.gfx_level.to_string(),
            chip.num_shader_engines,
            chip.num_shader_arrays,
            num_cu,
            spm,
        );
    }
}

#[cfg(any(feature = "libdrm_link", feature = "libdrm_dynamic_loading"))]
pub fn dump_device_list() {
    use libamdgpu_perftrace::DevicePath;

    for device_path in DevicePath::get_device_path_list() {
        println!("\n--------\n{device_path:?}");

        match device_path.chip_properties() {
            Ok(chip) => println!("ASIC Name = {}", chip.asic_name),
            Err(e) => println!("{e:#}"),
        }
    }
}

pub fn dump_chip(chip: &ChipProperties) {
    println!("ASIC Name                : {}", chip.asic_name);
    println!("GFX Level                : {}", chip.gfx_level);
    println!("Shader Engines           : {}", chip.num_shader_engines);
    println!("Shader Arrays per SE     : {}", chip.num_shader_arrays);

    for se in 0..chip.num_shader_engines as usize {
        println!("Active CU Mask (SE{se})    : {:#010X}", chip.active_cu_mask_gfx7[se]);
    }

    println!("Real-time CU Mask        : {:#010X}", chip.real_time_cu_mask);
    println!("Perf Caps                : {:?}", chip.caps);
}

pub fn dump_layout(layout: &SpmTraceLayout) {
    println!("SPM Layout:");
    println!("    ring offset          : {:#X}", layout.offset);
    println!("    wptr offset          : {:#X}", layout.wptr_offset);
    println!("    sample offset        : {:#X}", layout.sample_offset);
    println!("    sample size          : {} B", layout.sample_size_in_bytes);

    for segment in SpmSegment::CANONICAL_ORDER {
        let size = layout.segment_size_in_bytes[segment as usize];

        if size != 0 {
            println!("    {:20} : {size} B", segment.to_string());
        }
    }

    println!("    counters:");

    for (i, data) in layout.counter_data.iter().enumerate() {
        match data {
            Some(d) => println!(
                "        [{i:2}] {:>4}[{:2}] event {:3} -> {:6} entry {:3}",
                d.gpu_block.to_string(),
                d.instance,
                d.event_id,
                d.segment.to_string(),
                d.offset,
            ),
            None => println!("        [{i:2}] (not streamed)"),
        }
    }
}

fn dump_thread_traces(exp: &Experiment, base_addr: GpuSize) {
    for tt in exp.thread_traces() {
        println!(
            "Thread Trace SE{} CU{}:",
            tt.shader_engine(),
            tt.compute_unit(),
        );
        println!("    info                 : {:#X} ({} B)", base_addr + tt.info_offset(), tt.info_size());
        println!("    buffer               : {:#X} ({} KiB)", base_addr + tt.data_offset(), tt.data_size() >> 10);
        println!("    SQ_THREAD_TRACE_MODE       : {:#010X}", tt.sq_thread_trace_mode().0);
        println!("    SQ_THREAD_TRACE_MASK       : {:#010X}", tt.sq_thread_trace_mask().0);
        println!("    SQ_THREAD_TRACE_TOKEN_MASK : {:#010X}", tt.sq_thread_trace_token_mask().0);
        println!("    SQ_THREAD_TRACE_PERF_MASK  : {:#010X}", tt.sq_thread_trace_perf_mask().0);
    }
}

pub fn dump_packets(label: &str, reg_info: &RegInfo, cmd: &CmdBuffer) {
    println!(
        "{label}: {} dwords, {} reservations (peak {} dwords)",
        cmd.dwords().len(),
        cmd.num_reservations(),
        cmd.peak_reserved_dwords(),
    );

    for p in cmd.packets() {
        let pred = if p.predicated() { " (predicated)" } else { "" };

        if let Some((reg, val)) = p.as_reg_write() {
            let name = reg_info.reg_name(reg)
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("{reg:#06X}"));
            println!("    {:16} {name:32} = {val:#010X}{pred}", p.name());
        } else if let Some(event) = p.event_type() {
            println!("    {:16} event {event:#04X}{pred}", p.name());
        } else {
            let body: Vec<String> = p.body.iter().map(|dw| format!("{dw:08X}")).collect();
            println!("    {:16} {}{pred}", p.name(), body.join(" "));
        }
    }
}

pub fn dump_experiment(
    title: &str,
    exp: &Experiment,
    base_addr: GpuSize,
    cmd: Option<[&CmdBuffer; 2]>,
) -> anyhow::Result<()> {
    println!("{title}\n");

    dump_chip(exp.chip());

    println!();
    println!("Experiment Memory        : {:#X} - {:#X} ({} KiB)",
        base_addr,
        base_addr + exp.total_size(),
        exp.total_size() >> 10,
    );

    if let Some(spm) = exp.spm() {
        println!();
        println!("SPM: {} counters requested, {} streaming counters",
            spm.perf_counter_infos().len(),
            spm.streaming_counters().len(),
        );

        for segment in spm.active_segments() {
            let ram = spm.muxsel_ram(segment);
            let selects = ram.entries().filter(|sel| sel.0 != 0).count();
            println!("    {:6} {:2} lines, {selects} selects", segment.to_string(), spm.segment_lines(segment));
        }

        let counters: Vec<String> = GpuBlock::ALL.iter()
            .filter(|block| spm.streaming_counters().iter().any(|c| c.block() == **block))
            .map(|block| block.to_string())
            .collect();
        println!("    blocks: {}", counters.join(", "));
    }

    if let Some(layout) = exp.spm_layout() {
        println!();
        dump_layout(&layout?);
    }

    if !exp.thread_traces().is_empty() {
        println!();
        dump_thread_traces(exp, base_addr);
    }

    if let Some([begin, end]) = cmd {
        let reg_info = exp.chip().reg_info();

        println!();
        dump_packets("Begin", &reg_info, begin);
        println!();
        dump_packets("End", &reg_info, end);
    }

    Ok(())
}
