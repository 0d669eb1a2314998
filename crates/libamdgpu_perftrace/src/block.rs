use std::fmt;
use crate::chip::ChipProperties;

/// Hardware blocks with SPM-capable perf counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GpuBlock {
    Cpf,
    Cpg,
    Cpc,
    Gds,
    Tcc,
    Tca,
    Ia,
    Cb,
    Db,
    Pa,
    Sc,
    Sx,
    Spi,
    Sq,
    Ta,
    Td,
    Tcp,
    Vgt,
}

impl GpuBlock {
    pub const COUNT: usize = 18;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Cpf,
        Self::Cpg,
        Self::Cpc,
        Self::Gds,
        Self::Tcc,
        Self::Tca,
        Self::Ia,
        Self::Cb,
        Self::Db,
        Self::Pa,
        Self::Sc,
        Self::Sx,
        Self::Spi,
        Self::Sq,
        Self::Ta,
        Self::Td,
        Self::Tcp,
        Self::Vgt,
    ];

    /// Blocks outside the shader engines are sampled through RLC_SPM_GLOBAL_MUXSEL.
    pub const fn uses_global_muxsel(&self) -> bool {
        matches!(
            self,
            Self::Cpf |
            Self::Cpg |
            Self::Cpc |
            Self::Gds |
            Self::Tcc |
            Self::Tca |
            Self::Ia
        )
    }

    /// BLOCK field of the muxsel encoding.
    pub const fn spm_block_select(&self) -> u16 {
        match self {
            // global
            Self::Cpg => 0,
            Self::Cpc => 1,
            Self::Cpf => 2,
            Self::Gds => 3,
            Self::Tcc => 4,
            Self::Tca => 5,
            Self::Ia => 6,
            // per-SE
            Self::Cb => 0,
            Self::Db => 1,
            Self::Pa => 2,
            Self::Sx => 3,
            Self::Sc => 4,
            Self::Ta => 5,
            Self::Td => 6,
            Self::Tcp => 7,
            Self::Spi => 8,
            Self::Sq => 9,
            Self::Vgt => 10,
        }
    }

    /// `<BLOCK>_PERFCOUNTER0_SELECT` in UCONFIG space.
    ///
    /// Counter slot `n` owns `base + 2n` (SELECT) and `base + 2n + 1` (SELECT1),
    /// except SQ which has a single select register per slot at `base + n`.
    pub const fn perf_sel_reg_base(&self) -> u32 {
        match self {
            Self::Cpg => 0xD800,
            Self::Cpc => 0xD803,
            Self::Cpf => 0xD805,
            Self::Vgt => 0xD880,
            Self::Ia => 0xD884,
            Self::Pa => 0xD900,
            Self::Sc => 0xD940,
            Self::Spi => 0xD980,
            Self::Sq => 0xD9C0,
            Self::Gds => 0xDA40,
            Self::Sx => 0xDA80,
            Self::Ta => 0xDAC0,
            Self::Td => 0xDB00,
            Self::Tcp => 0xDB40,
            Self::Tcc => 0xDB80,
            Self::Tca => 0xDB90,
            Self::Cb => 0xDC41,
            Self::Db => 0xDC61,
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        let block = match s.to_ascii_uppercase().as_str() {
            "CPF" => Self::Cpf,
            "CPG" => Self::Cpg,
            "CPC" => Self::Cpc,
            "GDS" => Self::Gds,
            "TCC" => Self::Tcc,
            "TCA" => Self::Tca,
            "IA" => Self::Ia,
            "CB" => Self::Cb,
            "DB" => Self::Db,
            "PA" => Self::Pa,
            "SC" => Self::Sc,
            "SX" => Self::Sx,
            "SPI" => Self::Spi,
            "SQ" => Self::Sq,
            "TA" => Self::Ta,
            "TD" => Self::Td,
            "TCP" => Self::Tcp,
            "VGT" => Self::Vgt,
            _ => return None,
        };

        Some(block)
    }
}

impl fmt::Display for GpuBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = format!("{self:?}").to_ascii_uppercase();
        write!(f, "{s}")
    }
}

/// One 16-bit muxsel RAM entry: COUNTER[5:0], BLOCK[9:6], INSTANCE[15:10].
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct PerfmonSelData(pub u16);

impl PerfmonSelData {
    /// Encoding of the 64-bit GPU timestamp, fills the first four global entries.
    pub const TIMESTAMP: Self = Self(0xF0F0);

    pub const fn new(counter: u32, block: u16, instance: u32) -> Self {
        Self(
            (counter as u16 & 0x3F)
            | ((block & 0xF) << 6)
            | ((instance as u16 & 0x3F) << 10)
        )
    }

    pub const fn counter(&self) -> u16 {
        self.0 & 0x3F
    }

    pub const fn block(&self) -> u16 {
        (self.0 >> 6) & 0xF
    }

    pub const fn instance(&self) -> u16 {
        (self.0 >> 10) & 0x3F
    }
}

impl fmt::Debug for PerfmonSelData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PerfmonSelData")
            .field("counter", &self.counter())
            .field("block", &self.block())
            .field("instance", &self.instance())
            .finish()
    }
}

/// Muxsel entry for a block sampled by the global RLC path.
pub fn global_muxsel_data(block: GpuBlock, instance: u32, counter_id: u32) -> PerfmonSelData {
    assert!(block.uses_global_muxsel(), "{block} is sampled per shader engine");

    PerfmonSelData::new(counter_id, block.spm_block_select(), instance)
}

/// Muxsel entry for a block sampled by its shader engine, `instance` is chip-global.
pub fn per_se_muxsel_data(
    chip: &ChipProperties,
    block: GpuBlock,
    instance: u32,
    counter_id: u32,
) -> PerfmonSelData {
    assert!(!block.uses_global_muxsel(), "{block} is sampled by the global muxsel");

    PerfmonSelData::new(
        counter_id,
        block.spm_block_select(),
        chip.instance_in_se(block, instance),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::AsicName;

    #[test]
    fn global_blocks() {
        let global: Vec<_> = GpuBlock::ALL.iter().filter(|b| b.uses_global_muxsel()).collect();

        assert_eq!(global.len(), 7);
        assert!(!GpuBlock::Sq.uses_global_muxsel());
    }

    #[test]
    fn sel_data_fields() {
        let sel = PerfmonSelData::new(5, 9, 3);

        assert_eq!(sel.counter(), 5);
        assert_eq!(sel.block(), 9);
        assert_eq!(sel.instance(), 3);
        assert_eq!(sel.0, 5 | (9 << 6) | (3 << 10));
    }

    #[test]
    fn per_se_instance_is_local() {
        let chip = ChipProperties::new(AsicName::CHIP_HAWAII);
        // CB instance 6 is the third CB of SE1
        let sel = per_se_muxsel_data(&chip, GpuBlock::Cb, 6, 1);

        assert_eq!(sel.instance(), 2);
        assert_eq!(sel.block(), GpuBlock::Cb.spm_block_select());
    }

    #[test]
    fn block_names() {
        assert_eq!(GpuBlock::from_name("tcc"), Some(GpuBlock::Tcc));
        assert_eq!(GpuBlock::Spi.to_string(), "SPI");
        assert_eq!(GpuBlock::from_name("gl2c"), None);
    }

    #[test]
    #[should_panic]
    fn global_encoder_rejects_se_block() {
        let _ = global_muxsel_data(GpuBlock::Sq, 0, 0);
    }
}
