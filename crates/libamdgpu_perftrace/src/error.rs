use thiserror::Error;
use crate::block::GpuBlock;
use crate::chip::AsicName;
use crate::spm::SpmSegment;

/// Recoverable failures of trace creation and planning.
///
/// Planning bugs (mismatched counter counts, offsets inside the timestamp region, ...)
/// are not represented here, they panic.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PerfTraceError {
    #[error("{0} has no RLC streaming perf monitor")]
    SpmUnsupported(AsicName),

    #[error("out of memory while allocating {what} ({count} elements)")]
    OutOfMemory { what: &'static str, count: usize },

    #[error("sample interval {0} does not fit in RLC_SPM_PERFMON_CNTL.PERFMON_SAMPLE_INTERVAL")]
    InvalidSampleInterval(u32),

    #[error("shader engine {se} is out of range (device has {num_se})")]
    InvalidShaderEngine { se: u32, num_se: u32 },

    #[error("{block} has no instance {instance} (device has {num_instances})")]
    InvalidInstance { block: GpuBlock, instance: u32, num_instances: u32 },

    #[error("event {event_id} does not fit in the {block} PERF_SEL field (max {max})")]
    InvalidEventId { block: GpuBlock, event_id: u32, max: u32 },

    #[error("thread trace buffer size {0:#X} is zero, not 4 KiB aligned, or above SQ_THREAD_TRACE_SIZE")]
    InvalidBufferSize(usize),

    #[error("no free SPM counter slot on {block}[{instance}]")]
    CounterSlotsExhausted { block: GpuBlock, instance: u32 },

    #[error("{segment} needs {lines} bitlines, RLC_SPM_PERFMON_SEGMENT_SIZE allows {max}")]
    SegmentOverflow { segment: SpmSegment, lines: u32, max: u32 },
}

pub type Result<T> = std::result::Result<T, PerfTraceError>;

/// `Vec::with_capacity` that reports allocation failure instead of aborting.
pub(crate) fn try_alloc_vec<T>(count: usize, what: &'static str) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(count)
        .map_err(|_| PerfTraceError::OutOfMemory { what, count })?;

    Ok(v)
}
