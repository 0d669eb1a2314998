use std::fmt;
use std::str::FromStr;
use bitflags::bitflags;
use crate::block::GpuBlock;
use crate::reg::{RegInfo, SqThreadTraceMask};

pub const MAX_SHADER_ENGINES: usize = 4;
pub const MAX_SH_PER_SE: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GfxIpLevel {
    GfxIp6,
    GfxIp7,
    GfxIp8,
}

impl fmt::Display for GfxIpLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::GfxIp6 => "GFX6",
            Self::GfxIp7 => "GFX7",
            Self::GfxIp8 => "GFX8",
        };

        write!(f, "{s}")
    }
}

#[allow(non_camel_case_types)]
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AsicName {
    CHIP_TAHITI,
    CHIP_PITCAIRN,
    CHIP_VERDE,
    CHIP_OLAND,
    CHIP_HAINAN,
    CHIP_BONAIRE,
    CHIP_KAVERI,
    CHIP_KABINI,
    CHIP_HAWAII,
    CHIP_TONGA,
    CHIP_ICELAND,
    CHIP_CARRIZO,
    CHIP_FIJI,
    CHIP_STONEY,
    CHIP_POLARIS10,
    CHIP_POLARIS11,
    CHIP_POLARIS12,
}

impl AsicName {
    pub const ALL: [Self; 17] = [
        Self::CHIP_TAHITI,
        Self::CHIP_PITCAIRN,
        Self::CHIP_VERDE,
        Self::CHIP_OLAND,
        Self::CHIP_HAINAN,
        Self::CHIP_BONAIRE,
        Self::CHIP_KAVERI,
        Self::CHIP_KABINI,
        Self::CHIP_HAWAII,
        Self::CHIP_TONGA,
        Self::CHIP_ICELAND,
        Self::CHIP_CARRIZO,
        Self::CHIP_FIJI,
        Self::CHIP_STONEY,
        Self::CHIP_POLARIS10,
        Self::CHIP_POLARIS11,
        Self::CHIP_POLARIS12,
    ];

    pub const fn gfx_level(&self) -> GfxIpLevel {
        match self {
            Self::CHIP_TAHITI |
            Self::CHIP_PITCAIRN |
            Self::CHIP_VERDE |
            Self::CHIP_OLAND |
            Self::CHIP_HAINAN => GfxIpLevel::GfxIp6,
            Self::CHIP_BONAIRE |
            Self::CHIP_KAVERI |
            Self::CHIP_KABINI |
            Self::CHIP_HAWAII => GfxIpLevel::GfxIp7,
            _ => GfxIpLevel::GfxIp8,
        }
    }

    /// [num_se, num_sh_per_se, num_cu_per_sh]
    const fn topology(&self) -> [u32; 3] {
        match self {
            Self::CHIP_TAHITI => [2, 2, 8],
            Self::CHIP_PITCAIRN => [2, 2, 5],
            Self::CHIP_VERDE => [1, 2, 5],
            Self::CHIP_OLAND => [1, 1, 6],
            Self::CHIP_HAINAN => [1, 1, 5],
            Self::CHIP_BONAIRE => [1, 2, 7],
            Self::CHIP_KAVERI => [1, 1, 8],
            Self::CHIP_KABINI => [1, 1, 2],
            Self::CHIP_HAWAII => [4, 1, 11],
            Self::CHIP_TONGA => [4, 1, 8],
            Self::CHIP_ICELAND => [1, 1, 6],
            Self::CHIP_CARRIZO => [1, 1, 8],
            Self::CHIP_FIJI => [4, 1, 16],
            Self::CHIP_STONEY => [1, 1, 3],
            Self::CHIP_POLARIS10 => [4, 1, 9],
            Self::CHIP_POLARIS11 => [2, 1, 8],
            Self::CHIP_POLARIS12 => [2, 1, 5],
        }
    }

    /// TCC channels (one per memory channel), the TCC instance count.
    pub const fn num_tcc_blocks(&self) -> u32 {
        match self {
            Self::CHIP_HAWAII |
            Self::CHIP_FIJI => 16,
            Self::CHIP_TAHITI => 12,
            Self::CHIP_PITCAIRN |
            Self::CHIP_TONGA |
            Self::CHIP_POLARIS10 => 8,
            Self::CHIP_VERDE |
            Self::CHIP_OLAND |
            Self::CHIP_BONAIRE |
            Self::CHIP_KAVERI |
            Self::CHIP_POLARIS11 |
            Self::CHIP_POLARIS12 => 4,
            Self::CHIP_HAINAN |
            Self::CHIP_KABINI |
            Self::CHIP_ICELAND |
            Self::CHIP_CARRIZO |
            Self::CHIP_STONEY => 2,
        }
    }
}

impl fmt::Display for AsicName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAsicName(pub String);

impl fmt::Display for UnknownAsicName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown ASIC name: {}", self.0)
    }
}

impl std::error::Error for UnknownAsicName {}

impl FromStr for AsicName {
    type Err = UnknownAsicName;

    /// Accepts "hawaii", "HAWAII" and "CHIP_HAWAII".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        let name = upper.trim_start_matches("CHIP_");

        let asic = match name {
            "TAHITI" => Self::CHIP_TAHITI,
            "PITCAIRN" => Self::CHIP_PITCAIRN,
            "VERDE" => Self::CHIP_VERDE,
            "OLAND" => Self::CHIP_OLAND,
            "HAINAN" => Self::CHIP_HAINAN,
            "BONAIRE" => Self::CHIP_BONAIRE,
            "KAVERI" => Self::CHIP_KAVERI,
            "KABINI" => Self::CHIP_KABINI,
            "HAWAII" => Self::CHIP_HAWAII,
            "TONGA" => Self::CHIP_TONGA,
            "ICELAND" => Self::CHIP_ICELAND,
            "CARRIZO" => Self::CHIP_CARRIZO,
            "FIJI" => Self::CHIP_FIJI,
            "STONEY" => Self::CHIP_STONEY,
            "POLARIS10" => Self::CHIP_POLARIS10,
            "POLARIS11" => Self::CHIP_POLARIS11,
            "POLARIS12" => Self::CHIP_POLARIS12,
            _ => return Err(UnknownAsicName(s.to_string())),
        };

        Ok(asic)
    }
}

bitflags! {
    /// Revision-gated perf features, resolved once from the ASIC.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PerfCaps: u32 {
        /// RLC streaming perf monitor (CI and later).
        const SPM_TRACE = 1 << 0;
        /// SQ_THREAD_TRACE_MASK stall enables come from the adapter-reported value.
        const SQTT_STALL_FROM_ADAPTER = 1 << 1;
    }
}

impl PerfCaps {
    pub fn resolve(asic_name: AsicName) -> Self {
        let gfx_level = asic_name.gfx_level();
        let mut caps = Self::empty();

        if GfxIpLevel::GfxIp7 <= gfx_level {
            caps |= Self::SPM_TRACE;
        }

        if gfx_level != GfxIpLevel::GfxIp6
            || asic_name == AsicName::CHIP_OLAND
            || asic_name == AsicName::CHIP_HAINAN
        {
            caps |= Self::SQTT_STALL_FROM_ADAPTER;
        }

        caps
    }
}

/// Per-block perf counter topology.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockInfo {
    /// Total instances across the chip.
    pub num_instances: u32,
    /// Counter slots which can feed SPM.
    pub num_spm_counters: u32,
}

/// Read-only hardware topology facts for one GPU.
#[derive(Clone, Debug)]
pub struct ChipProperties {
    pub asic_name: AsicName,
    pub gfx_level: GfxIpLevel,
    pub num_shader_engines: u32,
    pub num_shader_arrays: u32, // per SE
    /// GFX6 keeps one mask per shader array.
    pub active_cu_mask_gfx6: [[u32; MAX_SH_PER_SE]; MAX_SHADER_ENGINES],
    /// GFX7+ keeps one flat mask per shader engine.
    pub active_cu_mask_gfx7: [u32; MAX_SHADER_ENGINES],
    /// CUs reserved for real-time queues.
    pub real_time_cu_mask: u32,
    /// SQ_THREAD_TRACE_MASK value reported by the kernel driver.
    pub sq_thread_trace_mask: u32,
    pub blocks: [BlockInfo; GpuBlock::COUNT],
    pub caps: PerfCaps,
}

impl ChipProperties {
    pub fn new(asic_name: AsicName) -> Self {
        let [num_se, num_sh, num_cu] = asic_name.topology();
        let sh_mask = (1u32 << num_cu) - 1;

        let mut active_cu_mask_gfx6 = [[0u32; MAX_SH_PER_SE]; MAX_SHADER_ENGINES];
        let mut active_cu_mask_gfx7 = [0u32; MAX_SHADER_ENGINES];

        for se in 0..num_se as usize {
            for sh in 0..num_sh as usize {
                active_cu_mask_gfx6[se][sh] = sh_mask;
                active_cu_mask_gfx7[se] |= sh_mask << (16 * sh);
            }
        }

        // Oland may double-create waves with SPI stalls enabled.
        let spi_stall_en = if asic_name == AsicName::CHIP_OLAND { 0 } else { 1 };
        let sq_thread_trace_mask = SqThreadTraceMask::default()
            .with_reg_stall_en(1)
            .with_sq_stall_en(1)
            .with_spi_stall_en(spi_stall_en)
            .0;

        Self {
            asic_name,
            gfx_level: asic_name.gfx_level(),
            num_shader_engines: num_se,
            num_shader_arrays: num_sh,
            active_cu_mask_gfx6,
            active_cu_mask_gfx7,
            real_time_cu_mask: 0,
            sq_thread_trace_mask,
            blocks: default_block_info(num_se, num_sh * num_cu, asic_name.num_tcc_blocks()),
            caps: PerfCaps::resolve(asic_name),
        }
    }

    pub fn reg_info(&self) -> RegInfo {
        RegInfo::for_gfx_level(self.gfx_level)
    }

    pub fn block_info(&self, block: GpuBlock) -> &BlockInfo {
        &self.blocks[block as usize]
    }

    fn instances_per_se(&self, block: GpuBlock) -> u32 {
        (self.block_info(block).num_instances / self.num_shader_engines.max(1)).max(1)
    }

    /// Shader engine which owns `instance` of a per-SE block.
    pub fn se_index(&self, block: GpuBlock, instance: u32) -> u32 {
        instance / self.instances_per_se(block)
    }

    /// Instance index of a per-SE block, local to its shader engine.
    pub fn instance_in_se(&self, block: GpuBlock, instance: u32) -> u32 {
        instance % self.instances_per_se(block)
    }
}

fn default_block_info(num_se: u32, num_cu_per_se: u32, num_tcc: u32) -> [BlockInfo; GpuBlock::COUNT] {
    GpuBlock::ALL.map(|block| {
        let [per_unit, num_spm_counters] = match block {
            GpuBlock::Cpf |
            GpuBlock::Cpg |
            GpuBlock::Cpc |
            GpuBlock::Gds => [1, 1],
            GpuBlock::Tcc => [num_tcc, 2],
            GpuBlock::Tca => [2, 2],
            GpuBlock::Ia => [1, 1],
            GpuBlock::Cb |
            GpuBlock::Db => [4, 1],
            GpuBlock::Pa |
            GpuBlock::Sc |
            GpuBlock::Vgt => [1, 2],
            GpuBlock::Sx => [1, 2],
            GpuBlock::Spi => [1, 4],
            GpuBlock::Sq => [1, 8],
            GpuBlock::Ta |
            GpuBlock::Td |
            GpuBlock::Tcp => [num_cu_per_se, 1],
        };

        let num_instances = if block.uses_global_muxsel() {
            per_unit
        } else {
            per_unit * num_se
        };

        BlockInfo { num_instances, num_spm_counters }
    })
}

#[cfg(any(feature = "libdrm_link", feature = "libdrm_dynamic_loading"))]
mod drm {
    use super::*;
    use libdrm_amdgpu_sys::AMDGPU::{ASIC_NAME, drm_amdgpu_info_device, GPU_INFO};

    impl TryFrom<ASIC_NAME> for AsicName {
        type Error = UnknownAsicName;

        fn try_from(asic_name: ASIC_NAME) -> Result<Self, Self::Error> {
            let v = match asic_name {
                ASIC_NAME::CHIP_TAHITI => Self::CHIP_TAHITI,
                ASIC_NAME::CHIP_PITCAIRN => Self::CHIP_PITCAIRN,
                ASIC_NAME::CHIP_VERDE => Self::CHIP_VERDE,
                ASIC_NAME::CHIP_OLAND => Self::CHIP_OLAND,
                ASIC_NAME::CHIP_HAINAN => Self::CHIP_HAINAN,
                ASIC_NAME::CHIP_BONAIRE => Self::CHIP_BONAIRE,
                ASIC_NAME::CHIP_KAVERI => Self::CHIP_KAVERI,
                ASIC_NAME::CHIP_KABINI => Self::CHIP_KABINI,
                ASIC_NAME::CHIP_HAWAII => Self::CHIP_HAWAII,
                ASIC_NAME::CHIP_TONGA => Self::CHIP_TONGA,
                ASIC_NAME::CHIP_ICELAND => Self::CHIP_ICELAND,
                ASIC_NAME::CHIP_CARRIZO => Self::CHIP_CARRIZO,
                ASIC_NAME::CHIP_FIJI => Self::CHIP_FIJI,
                ASIC_NAME::CHIP_STONEY => Self::CHIP_STONEY,
                ASIC_NAME::CHIP_POLARIS10 => Self::CHIP_POLARIS10,
                ASIC_NAME::CHIP_POLARIS11 => Self::CHIP_POLARIS11,
                ASIC_NAME::CHIP_POLARIS12 => Self::CHIP_POLARIS12,
                _ => return Err(UnknownAsicName(format!("{asic_name:?}"))),
            };

            Ok(v)
        }
    }

    impl ChipProperties {
        /// Topology from the kernel driver. Per-block tables are derived from it.
        pub fn from_device_info(ext_info: &drm_amdgpu_info_device) -> Result<Self, UnknownAsicName> {
            let asic_name = AsicName::try_from(ext_info.get_asic_name())?;
            let mut chip = Self::new(asic_name);

            let num_se = (ext_info.num_shader_engines as usize).min(MAX_SHADER_ENGINES);
            let num_sh = (ext_info.num_shader_arrays_per_engine as usize).min(MAX_SH_PER_SE);

            chip.num_shader_engines = num_se as u32;
            chip.num_shader_arrays = num_sh as u32;
            chip.active_cu_mask_gfx6 = [[0; MAX_SH_PER_SE]; MAX_SHADER_ENGINES];
            chip.active_cu_mask_gfx7 = [0; MAX_SHADER_ENGINES];

            for se in 0..num_se {
                for sh in 0..num_sh {
                    let mask = ext_info.cu_bitmap[se][sh] & 0xFFFF;
                    chip.active_cu_mask_gfx6[se][sh] = mask;
                    chip.active_cu_mask_gfx7[se] |= mask << (16 * sh);
                }
            }

            let num_cu_per_se = chip.active_cu_mask_gfx7[0].count_ones();
            let num_tcc = match ext_info.num_tcc_blocks {
                0 => asic_name.num_tcc_blocks(),
                n => n,
            };
            chip.blocks = default_block_info(num_se as u32, num_cu_per_se, num_tcc);

            Ok(chip)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_by_revision() {
        let tahiti = PerfCaps::resolve(AsicName::CHIP_TAHITI);
        let oland = PerfCaps::resolve(AsicName::CHIP_OLAND);
        let hawaii = PerfCaps::resolve(AsicName::CHIP_HAWAII);

        assert!(tahiti.is_empty());
        assert_eq!(oland, PerfCaps::SQTT_STALL_FROM_ADAPTER);
        assert_eq!(hawaii, PerfCaps::SPM_TRACE | PerfCaps::SQTT_STALL_FROM_ADAPTER);
    }

    #[test]
    fn parse_asic_name() {
        assert_eq!("hawaii".parse::<AsicName>(), Ok(AsicName::CHIP_HAWAII));
        assert_eq!("CHIP_TONGA".parse::<AsicName>(), Ok(AsicName::CHIP_TONGA));
        assert!("navi10".parse::<AsicName>().is_err());
    }

    #[test]
    fn per_se_instance_mapping() {
        let chip = ChipProperties::new(AsicName::CHIP_HAWAII);

        // 4 CB instances per SE
        assert_eq!(chip.block_info(GpuBlock::Cb).num_instances, 16);
        assert_eq!(chip.se_index(GpuBlock::Cb, 0), 0);
        assert_eq!(chip.se_index(GpuBlock::Cb, 5), 1);
        assert_eq!(chip.instance_in_se(GpuBlock::Cb, 5), 1);
        assert_eq!(chip.se_index(GpuBlock::Sq, 3), 3);
    }

    #[test]
    fn tcc_follows_memory_channels() {
        let tcc = |asic: AsicName| ChipProperties::new(asic).block_info(GpuBlock::Tcc).num_instances;

        assert_eq!(tcc(AsicName::CHIP_HAWAII), 16);
        assert_eq!(tcc(AsicName::CHIP_TAHITI), 12);
        assert_eq!(tcc(AsicName::CHIP_POLARIS10), 8);
        assert_eq!(tcc(AsicName::CHIP_POLARIS11), 4);
        assert_eq!(tcc(AsicName::CHIP_STONEY), 2);

        // global blocks are not multiplied by the SE count
        let tonga = ChipProperties::new(AsicName::CHIP_TONGA);
        assert_eq!(tonga.block_info(GpuBlock::Tcc).num_instances, 8);
        assert_eq!(tonga.block_info(GpuBlock::Tca).num_instances, 2);
    }

    #[test]
    fn cu_masks() {
        let chip = ChipProperties::new(AsicName::CHIP_TAHITI);

        assert_eq!(chip.active_cu_mask_gfx6[1][1], 0xFF);
        assert_eq!(chip.active_cu_mask_gfx7[1], 0x00FF_00FF);
        assert_eq!(chip.active_cu_mask_gfx6[2], [0, 0]);
    }
}
