use libamdgpu_perftrace::block::GpuBlock;
use libamdgpu_perftrace::chip::ChipProperties;
use libamdgpu_perftrace::spm::{SpmCounterData, SpmSegment, SpmTraceLayout};
use libamdgpu_perftrace::thread_trace::ThreadTrace;
use serde_json::{json, Map, Value};
use crate::OutputJson;

impl OutputJson for ChipProperties {
    fn json(&self) -> Value {
        let mut blocks = Map::new();

        for block in GpuBlock::ALL {
            let info = self.block_info(block);

            blocks.insert(
                block.to_string(),
                json!({
                    "instances": info.num_instances,
                    "spm_counters": info.num_spm_counters,
                }),
            );
        }

        json!({
            "ASIC Name": self.asic_name.to_string(),
            "GFX Level": self.gfx_level.to_string(),
            "Shader Engines": self.num_shader_engines,
            "Shader Arrays per SE": self.num_shader_arrays,
            "Active CU Mask": &self.active_cu_mask_gfx7[..self.num_shader_engines as usize],
            "Blocks": blocks,
        })
    }
}

impl OutputJson for SpmCounterData {
    fn json(&self) -> Value {
        json!({
            "block": self.gpu_block.to_string(),
            "instance": self.instance,
            "event_id": self.event_id,
            "segment": self.segment.to_string(),
            "offset": self.offset,
        })
    }
}

impl OutputJson for SpmTraceLayout {
    fn json(&self) -> Value {
        let mut segments = Map::new();

        for segment in SpmSegment::CANONICAL_ORDER {
            segments.insert(
                segment.to_string(),
                json!({
                    "value": self.segment_size_in_bytes[segment as usize],
                    "unit": "B",
                }),
            );
        }

        let counters: Vec<Value> = self.counter_data
            .iter()
            .map(|data| data.as_ref().map_or(Value::Null, |d| d.json()))
            .collect();

        json!({
            "offset": self.offset,
            "wptr_offset": self.wptr_offset,
            "sample_offset": self.sample_offset,
            "sample_size": {
                "value": self.sample_size_in_bytes,
                "unit": "B",
            },
            "segments": segments,
            "counters": counters,
        })
    }
}

impl OutputJson for ThreadTrace<'_> {
    fn json(&self) -> Value {
        json!({
            "shader_engine": self.shader_engine(),
            "compute_unit": self.compute_unit(),
            "info_offset": self.info_offset(),
            "data_offset": self.data_offset(),
            "data_size": {
                "value": self.data_size(),
                "unit": "B",
            },
            "SQ_THREAD_TRACE_MODE": format!("{:#010X}", self.sq_thread_trace_mode().0),
            "SQ_THREAD_TRACE_MASK": format!("{:#010X}", self.sq_thread_trace_mask().0),
            "SQ_THREAD_TRACE_TOKEN_MASK": format!("{:#010X}", self.sq_thread_trace_token_mask().0),
            "SQ_THREAD_TRACE_PERF_MASK": format!("{:#010X}", self.sq_thread_trace_perf_mask().0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libamdgpu_perftrace::chip::AsicName;
    use libamdgpu_perftrace::thread_trace::ThreadTraceInfo;

    #[test]
    fn layout_json() {
        let mut layout = SpmTraceLayout::new(2).unwrap();
        layout.sample_size_in_bytes = 64;
        layout.segment_size_in_bytes[SpmSegment::Global as usize] = 64;
        layout.counter_data[1] = Some(SpmCounterData {
            segment: SpmSegment::Global,
            offset: 4,
            gpu_block: GpuBlock::Tcc,
            instance: 1,
            event_id: 7,
        });

        let v = layout.json();

        assert_eq!(v["sample_offset"], 32);
        assert_eq!(v["segments"]["Global"]["value"], 64);
        assert_eq!(v["segments"]["SE3"]["value"], 0);
        assert!(v["counters"][0].is_null());
        assert_eq!(v["counters"][1]["block"], "TCC");
    }

    #[test]
    fn thread_trace_json() {
        let chip = ChipProperties::new(AsicName::CHIP_HAWAII);
        let tt = ThreadTrace::new(&chip, &ThreadTraceInfo { shader_engine: 2, ..Default::default() }).unwrap();

        let v = tt.json();

        assert_eq!(v["shader_engine"], 2);
        assert_eq!(v["data_size"]["value"], 1024 * 1024);
        assert_eq!(v["SQ_THREAD_TRACE_TOKEN_MASK"], "0x00FFFFFF");
    }
}
