use anyhow::{anyhow, Context};
use libamdgpu_perftrace::block::GpuBlock;
use libamdgpu_perftrace::chip::{AsicName, ChipProperties};
use libamdgpu_perftrace::counter::PerfCounterInfo;
use libamdgpu_perftrace::thread_trace::{
    ShaderStageMask,
    ThreadTraceInfo,
    ThreadTraceOptions,
    ThreadTraceRegTypeFlags,
    ThreadTraceTokenConfig,
    ThreadTraceTokenTypeFlags,
};
use serde::Deserialize;
use std::path::Path;
use std::fs;

/// JSON experiment description.
///
/// ```json
/// {
///     "asic": "hawaii",
///     "spm": { "ring_size": 1048576, "sample_interval": 4096,
///              "counters": [{ "block": "TCC", "instance": 0, "event": 7 }] },
///     "thread_traces": [{ "shader_engine": 0, "stages": ["CS"] }],
///     "marker": 1
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    /// Chip preset, ignored when the topology comes from a device.
    #[serde(default)]
    pub asic: Option<String>,
    #[serde(default)]
    pub spm: Option<SpmConfig>,
    #[serde(default)]
    pub thread_traces: Vec<ThreadTraceConfig>,
    /// Written to SQ_THREAD_TRACE_USERDATA_2 of every thread trace after start.
    #[serde(default)]
    pub marker: Option<u32>,
    /// Token filter switched to after start.
    #[serde(default)]
    pub token_update: Option<TokenConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpmConfig {
    #[serde(default = "SpmConfig::default_ring_size")]
    pub ring_size: u32,
    #[serde(default = "SpmConfig::default_sample_interval")]
    pub sample_interval: u32,
    pub counters: Vec<CounterConfig>,
}

impl SpmConfig {
    fn default_ring_size() -> u32 {
        1024 * 1024
    }

    fn default_sample_interval() -> u32 {
        4096
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CounterConfig {
    pub block: String,
    #[serde(default)]
    pub instance: u32,
    pub event: u32,
}

impl CounterConfig {
    pub fn to_info(&self) -> anyhow::Result<PerfCounterInfo> {
        let block = GpuBlock::from_name(&self.block)
            .ok_or_else(|| anyhow!("unknown GPU block: {:?}", self.block))?;

        Ok(PerfCounterInfo { block, instance: self.instance, event_id: self.event })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThreadTraceConfig {
    #[serde(default)]
    pub shader_engine: u32,
    pub buffer_size: Option<usize>,
    pub token_mask: Option<u32>,
    pub reg_mask: Option<u32>,
    pub target_sh: Option<u32>,
    pub target_cu: Option<u32>,
    pub sh0_counter_mask: Option<u32>,
    pub sh1_counter_mask: Option<u32>,
    pub simd_mask: Option<u32>,
    pub vm_id_mask: Option<u32>,
    pub random_seed: Option<u32>,
    /// "PS", "VS", "GS", "ES", "HS", "LS", "CS"
    pub stages: Option<Vec<String>>,
    pub issue_mask: Option<u32>,
    pub wrap_buffer: Option<bool>,
}

impl ThreadTraceConfig {
    pub fn to_info(&self) -> anyhow::Result<ThreadTraceInfo> {
        let shader_type_mask = self.stages.as_deref().map(parse_flags::<ShaderStageMask>).transpose()?;

        Ok(ThreadTraceInfo {
            shader_engine: self.shader_engine,
            options: ThreadTraceOptions {
                buffer_size: self.buffer_size,
                token_mask: self.token_mask,
                reg_mask: self.reg_mask,
                target_sh: self.target_sh,
                target_cu: self.target_cu,
                sh0_counter_mask: self.sh0_counter_mask,
                sh1_counter_mask: self.sh1_counter_mask,
                simd_mask: self.simd_mask,
                vm_id_mask: self.vm_id_mask,
                random_seed: self.random_seed,
                shader_type_mask,
                issue_mask: self.issue_mask,
                wrap_buffer: self.wrap_buffer,
            },
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    /// e.g. "WAVE_START", "INST"
    pub tokens: Vec<String>,
    /// e.g. "EVENT_REGS", "ALL_REG_WRITES". Absent keeps each trace's register filter.
    #[serde(default)]
    pub regs: Option<Vec<String>>,
}

impl TokenConfig {
    pub fn to_token_config(&self) -> anyhow::Result<ThreadTraceTokenConfig> {
        Ok(ThreadTraceTokenConfig {
            token_mask: parse_flags::<ThreadTraceTokenTypeFlags>(&self.tokens)?,
            reg_mask: self.regs
                .as_deref()
                .map(parse_flags::<ThreadTraceRegTypeFlags>)
                .transpose()?,
        })
    }
}

fn parse_flags<F: bitflags::Flags>(names: &[String]) -> anyhow::Result<F> {
    names.iter().try_fold(F::empty(), |acc, name| {
        let flag = F::from_name(&name.to_ascii_uppercase())
            .ok_or_else(|| anyhow!("unknown flag: {name:?}"))?;

        Ok(acc.union(flag))
    })
}

impl ExperimentConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path).with_context(|| format!("Failed to read {path:?}"))?;

        serde_json::from_str(&s).with_context(|| format!("Failed to parse {path:?}"))
    }

    /// A few busy counters on every shader engine plus a thread trace on SE0.
    pub fn preset(chip: &ChipProperties) -> Self {
        let mut counters = vec![
            CounterConfig { block: "TCC".to_string(), instance: 0, event: 3 },
            CounterConfig { block: "TCC".to_string(), instance: 0, event: 4 },
            CounterConfig { block: "CPG".to_string(), instance: 0, event: 1 },
        ];

        for se in 0..chip.num_shader_engines {
            counters.push(CounterConfig { block: "SQ".to_string(), instance: se, event: 4 });
        }

        Self {
            asic: Some(chip.asic_name.to_string()),
            spm: Some(SpmConfig {
                ring_size: SpmConfig::default_ring_size(),
                sample_interval: SpmConfig::default_sample_interval(),
                counters,
            }),
            thread_traces: vec![ThreadTraceConfig::default()],
            marker: None,
            token_update: None,
        }
    }

    pub fn asic_name(&self) -> anyhow::Result<Option<AsicName>> {
        self.asic.as_deref().map(|s| s.parse::<AsicName>()).transpose().map_err(|e| anyhow!(e))
    }

    pub fn counter_infos(&self) -> anyhow::Result<Vec<PerfCounterInfo>> {
        let Some(spm) = &self.spm else { return Ok(Vec::new()) };

        spm.counters.iter().map(CounterConfig::to_info).collect()
    }
}
