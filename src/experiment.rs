use libamdgpu_perftrace::GpuSize;
use libamdgpu_perftrace::chip::ChipProperties;
use libamdgpu_perftrace::cmd_stream::{CmdSpace, CmdStream, VgtEventType};
use libamdgpu_perftrace::counter::acquire_streaming_counters;
use libamdgpu_perftrace::pm4;
use libamdgpu_perftrace::spm::{BYTES_PER_BITLINE, SpmTrace, SpmTraceCreateInfo, SpmTraceLayout};
use libamdgpu_perftrace::thread_trace::{PerfTraceMarkerType, ThreadTrace, ThreadTraceTokenConfig};
use tracing::debug;
use crate::config::ExperimentConfig;

/// RLC_SPM_PERFMON_RING_BASE must point at a whole bitline.
const SPM_RING_ALIGNMENT: GpuSize = BYTES_PER_BITLINE as GpuSize;

/// Every trace of one experiment and the GPU memory they share.
///
/// Memory: thread trace info blocks, then thread trace buffers, then the SPM ring.
pub struct Experiment<'c> {
    chip: &'c ChipProperties,
    spm: Option<SpmTrace<'c>>,
    thread_traces: Vec<ThreadTrace<'c>>,
    marker: Option<u32>,
    token_update: Option<ThreadTraceTokenConfig>,
    total_size: GpuSize,
}

impl<'c> Experiment<'c> {
    pub fn new(chip: &'c ChipProperties, config: &ExperimentConfig) -> anyhow::Result<Self> {
        let spm = match &config.spm {
            Some(spm_config) => {
                let infos = config.counter_infos()?;
                let mut trace = SpmTrace::new(chip);

                trace.init(&SpmTraceCreateInfo {
                    ring_size: spm_config.ring_size,
                    spm_interval: spm_config.sample_interval,
                    perf_counter_infos: &infos,
                })?;

                for counter in acquire_streaming_counters(chip, &infos)? {
                    trace.add_streaming_counter(counter)?;
                }

                trace.calculate_segment_size()?;
                trace.calculate_muxsel_ram()?;

                Some(trace)
            },
            None => None,
        };

        let thread_traces = config.thread_traces
            .iter()
            .map(|tt| Ok(ThreadTrace::new(chip, &tt.to_info()?)?))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let token_update = config.token_update
            .as_ref()
            .map(|t| t.to_token_config())
            .transpose()?;

        let mut exp = Self {
            chip,
            spm,
            thread_traces,
            marker: config.marker,
            token_update,
            total_size: 0,
        };

        exp.place_traces();

        Ok(exp)
    }

    fn place_traces(&mut self) {
        let mut offset: GpuSize = 0;

        for tt in self.thread_traces.iter_mut() {
            offset = offset.next_multiple_of(tt.info_alignment() as GpuSize);
            tt.set_info_offset(offset);
            offset += tt.info_size() as GpuSize;
        }

        for tt in self.thread_traces.iter_mut() {
            offset = offset.next_multiple_of(tt.data_alignment() as GpuSize);
            tt.set_data_offset(offset);
            offset += tt.data_size() as GpuSize;
        }

        if let Some(spm) = &mut self.spm {
            offset = offset.next_multiple_of(SPM_RING_ALIGNMENT);
            spm.set_data_offset(offset);
            offset += spm.ring_size();
        }

        debug!("experiment memory: {offset:#X} bytes");

        self.total_size = offset;
    }

    pub fn chip(&self) -> &'c ChipProperties {
        self.chip
    }

    /// Bytes of GPU memory the experiment needs at its base address.
    pub fn total_size(&self) -> GpuSize {
        self.total_size
    }

    pub fn spm(&self) -> Option<&SpmTrace<'c>> {
        self.spm.as_ref()
    }

    pub fn thread_traces(&self) -> &[ThreadTrace<'c>] {
        &self.thread_traces
    }

    pub fn spm_layout(&self) -> Option<anyhow::Result<SpmTraceLayout>> {
        let spm = self.spm.as_ref()?;

        Some(SpmTraceLayout::new(spm.perf_counter_infos().len()).map(|mut layout| {
            spm.get_trace_layout(&mut layout);
            layout
        }).map_err(Into::into))
    }

    /// Setup and start of every trace. GRBM_GFX_INDEX is back to broadcast at the end.
    pub fn write_begin_commands(
        &mut self,
        base_gpu_virt_addr: GpuSize,
        cmd: &mut dyn CmdStream,
        mut cs: CmdSpace,
    ) -> CmdSpace {
        let reg_info = self.chip.reg_info();

        if let Some(spm) = &mut self.spm {
            cs = spm.write_setup_commands(base_gpu_virt_addr, cmd, cs);
            cs = cmd.write_grbm_gfx_index_broadcast(&reg_info, cs);
        }

        for tt in &self.thread_traces {
            cmd.commit_commands(cs);
            cs = cmd.reserve_commands();
            cs = tt.write_setup_commands(base_gpu_virt_addr, cmd, cs);
        }

        for tt in &self.thread_traces {
            cmd.commit_commands(cs);
            cs = cmd.reserve_commands();
            cs = tt.write_start_commands(cmd, cs);

            if let Some(token_config) = &self.token_update {
                cs = tt.write_update_token_mask_commands(token_config, cmd, cs);
            }
        }

        cs = cmd.write_grbm_gfx_index_broadcast(&reg_info, cs);

        if let Some(spm) = &self.spm {
            cs = spm.write_start_commands(cmd, cs);
            cs = cmd.write(&pm4::build_event_write(VgtEventType::PerfcounterStart), cs);
        }

        if let Some(marker) = self.marker {
            for tt in &self.thread_traces {
                cs = tt.write_insert_marker(PerfTraceMarkerType::A, marker, cmd, cs);
            }
        }

        cs
    }

    /// Stops every trace and copies the thread trace status out.
    pub fn write_end_commands(
        &self,
        base_gpu_virt_addr: GpuSize,
        cmd: &mut dyn CmdStream,
        mut cs: CmdSpace,
    ) -> CmdSpace {
        let reg_info = self.chip.reg_info();

        if let Some(spm) = &self.spm {
            cs = cmd.write(&pm4::build_event_write(VgtEventType::PerfcounterStop), cs);
            cs = spm.write_end_commands(cmd, cs);
            cs = cmd.write_grbm_gfx_index_broadcast(&reg_info, cs);
        }

        for tt in &self.thread_traces {
            cmd.commit_commands(cs);
            cs = cmd.reserve_commands();
            cs = tt.write_stop_commands(base_gpu_virt_addr, cmd, cs);
        }

        cmd.write_grbm_gfx_index_broadcast(&reg_info, cs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libamdgpu_perftrace::chip::AsicName;
    use libamdgpu_perftrace::pm4::CmdBuffer;
    use libamdgpu_perftrace::reg::GrbmGfxIndex;
    use crate::config::ThreadTraceConfig;

    fn config(chip: &ChipProperties) -> ExperimentConfig {
        let mut config = ExperimentConfig::preset(chip);
        config.thread_traces = (0..chip.num_shader_engines)
            .map(|se| ThreadTraceConfig { shader_engine: se, ..Default::default() })
            .collect();
        config.marker = Some(0xC0FFEE);
        config
    }

    #[test]
    fn memory_carve_out() {
        let chip = ChipProperties::new(AsicName::CHIP_TONGA);
        let exp = Experiment::new(&chip, &config(&chip)).unwrap();
        let tts = exp.thread_traces();

        assert_eq!(tts.iter().map(|tt| tt.info_offset()).collect::<Vec<_>>(), [0, 12, 24, 36]);
        assert_eq!(tts[0].data_offset(), 0x1000);
        assert_eq!(tts[3].data_offset(), 0x1000 + 3 * 0x10_0000);

        let spm_offset = 0x1000 + 4 * 0x10_0000;
        assert_eq!(exp.spm().unwrap().data_offset(), spm_offset);
        assert_eq!(exp.total_size(), spm_offset + 1024 * 1024);

        let layout = exp.spm_layout().unwrap().unwrap();
        assert_eq!(layout.offset, spm_offset);
        assert!(layout.counter_data.iter().all(|d| d.is_some()));
    }

    #[test]
    fn commands_end_in_broadcast() {
        let chip = ChipProperties::new(AsicName::CHIP_HAWAII);
        let reg_info = chip.reg_info();
        let mut exp = Experiment::new(&chip, &config(&chip)).unwrap();

        let mut cmd = CmdBuffer::new();
        let cs = cmd.reserve_commands();
        let cs = exp.write_begin_commands(0x10_0000_0000, &mut cmd, cs);
        let cs = exp.write_end_commands(0x10_0000_0000, &mut cmd, cs);
        cmd.commit_commands(cs);

        let grbm: Vec<u32> = cmd.packets()
            .filter_map(|p| p.as_reg_write())
            .filter(|(reg, _)| *reg == reg_info.mm_grbm_gfx_index)
            .map(|(_, val)| val)
            .collect();

        assert_eq!(grbm.last(), Some(&GrbmGfxIndex::broadcast_all().0));

        let markers = cmd.packets()
            .filter_map(|p| p.as_reg_write())
            .filter(|w| *w == (reg_info.mm_sq_thread_trace_userdata[2], 0xC0FFEE))
            .count();
        assert_eq!(markers, 4);

        let events: Vec<u32> = cmd.packets().filter_map(|p| p.event_type()).collect();
        assert_eq!(events.first(), Some(&(VgtEventType::PerfcounterStart as u32)));
        assert_eq!(events.iter().filter(|e| **e == VgtEventType::ThreadTraceFlush as u32).count(), 4);
    }

    #[test]
    fn spm_on_gfx6_is_an_error() {
        let chip = ChipProperties::new(AsicName::CHIP_TAHITI);

        assert!(Experiment::new(&chip, &ExperimentConfig::preset(&chip)).is_err());
    }
}
