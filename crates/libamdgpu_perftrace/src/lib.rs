//! Programming of the GFX6-8 streaming performance monitor (SPM) and SQ thread trace.
//!
//! Nothing here touches the GPU: traces are planned from [`chip::ChipProperties`] and
//! emitted as PM4 into a [`cmd_stream::CmdStream`].

pub mod reg;
pub mod chip;
pub mod block;
pub mod cmd_stream;
pub mod pm4;
pub mod counter;
pub mod spm;
pub mod thread_trace;

mod error;
pub use error::*;

#[cfg(any(feature = "libdrm_link", feature = "libdrm_dynamic_loading"))]
mod device_path;
#[cfg(any(feature = "libdrm_link", feature = "libdrm_dynamic_loading"))]
pub use device_path::DevicePath;

/// GPU virtual address or byte offset.
pub type GpuSize = u64;
