use bitflags::bitflags;

bitflags! {
    /// Thread trace token kinds a client can ask for.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ThreadTraceTokenTypeFlags: u32 {
        const MISC = 1 << 0;
        const TIMESTAMP = 1 << 1;
        const REG = 1 << 2;
        const WAVE_START = 1 << 3;
        const WAVE_ALLOC = 1 << 4;
        const REG_CS_PRIV = 1 << 5;
        const WAVE_END = 1 << 6;
        const EVENT = 1 << 7;
        const EVENT_CS = 1 << 8;
        const EVENT_GFX1 = 1 << 9;
        const INST = 1 << 10;
        const INST_PC = 1 << 11;
        const INST_USER_DATA = 1 << 12;
        const ISSUE = 1 << 13;
        const PERF = 1 << 14;
        const REG_CS = 1 << 15;
        // GFX9+ only, dropped on GFX6-8
        const VMEM_EXEC = 1 << 16;
        const ALU_EXEC = 1 << 17;
        const VALU_INST = 1 << 18;
        const WAVE_RDY = 1 << 19;
        const IMMED1 = 1 << 20;
        const IMMEDIATE = 1 << 21;
        const UTIL_COUNTER = 1 << 22;
    }
}

bitflags! {
    /// Register write/read classes reported through REG tokens.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ThreadTraceRegTypeFlags: u32 {
        const EVENT_REGS = 1 << 0;
        const DRAW_REGS = 1 << 1;
        const DISPATCH_REGS = 1 << 2;
        const USERDATA_REGS = 1 << 3;
        const MARKER_REGS = 1 << 4;
        const SHADER_CONFIG_REGS = 1 << 5;
        const SHADER_LAUNCH_STATE_REGS = 1 << 6;
        const GRAPHICS_PIPE_STATE_REGS = 1 << 7;
        const ASYNC_COMPUTE_REGS = 1 << 8;
        const GRAPHICS_CONTEXT_REGS = 1 << 9;
        const OTHER_CONFIG_REGS = 1 << 10;
        const ALL_REG_WRITES = 0x7FF;
        // no GFX6-8 equivalent
        const ALL_REG_READS = 1 << 11;
    }
}

// SQ_THREAD_TRACE_TOKEN_MASK.TOKEN_MASK bits
const TOKEN_MAP: [(ThreadTraceTokenTypeFlags, u32); 16] = [
    (ThreadTraceTokenTypeFlags::MISC, 0),
    (ThreadTraceTokenTypeFlags::TIMESTAMP, 1),
    (ThreadTraceTokenTypeFlags::REG, 2),
    (ThreadTraceTokenTypeFlags::WAVE_START, 3),
    (ThreadTraceTokenTypeFlags::WAVE_ALLOC, 4),
    (ThreadTraceTokenTypeFlags::REG_CS_PRIV, 5),
    (ThreadTraceTokenTypeFlags::WAVE_END, 6),
    (ThreadTraceTokenTypeFlags::EVENT, 7),
    (ThreadTraceTokenTypeFlags::EVENT_CS, 8),
    (ThreadTraceTokenTypeFlags::EVENT_GFX1, 9),
    (ThreadTraceTokenTypeFlags::INST, 10),
    (ThreadTraceTokenTypeFlags::INST_PC, 11),
    (ThreadTraceTokenTypeFlags::INST_USER_DATA, 12),
    (ThreadTraceTokenTypeFlags::ISSUE, 13),
    (ThreadTraceTokenTypeFlags::PERF, 14),
    (ThreadTraceTokenTypeFlags::REG_CS, 15),
];

// SQ_THREAD_TRACE_TOKEN_MASK.REG_MASK bits:
// EVENT_INITIATOR, DRAW_INITIATOR, DISPATCH_INITIATOR, USER_DATA, TT_MARKER_EVENT_INITIATOR,
// GFXDEC, SHDEC, OTHER
const REG_MAP: [(ThreadTraceRegTypeFlags, u32); 8] = [
    (ThreadTraceRegTypeFlags::EVENT_REGS, 0),
    (ThreadTraceRegTypeFlags::DRAW_REGS, 1),
    (ThreadTraceRegTypeFlags::DISPATCH_REGS, 2),
    (ThreadTraceRegTypeFlags::USERDATA_REGS, 3),
    (ThreadTraceRegTypeFlags::MARKER_REGS, 4),
    (
        ThreadTraceRegTypeFlags::GRAPHICS_PIPE_STATE_REGS
            .union(ThreadTraceRegTypeFlags::GRAPHICS_CONTEXT_REGS),
        5,
    ),
    (
        ThreadTraceRegTypeFlags::SHADER_CONFIG_REGS
            .union(ThreadTraceRegTypeFlags::SHADER_LAUNCH_STATE_REGS),
        6,
    ),
    (
        ThreadTraceRegTypeFlags::ASYNC_COMPUTE_REGS
            .union(ThreadTraceRegTypeFlags::OTHER_CONFIG_REGS),
        7,
    ),
];

/// Which tokens (and which register classes) a running thread trace should emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ThreadTraceTokenConfig {
    pub token_mask: ThreadTraceTokenTypeFlags,
    /// `None` leaves the register filter of a running trace alone.
    pub reg_mask: Option<ThreadTraceRegTypeFlags>,
}

impl Default for ThreadTraceTokenConfig {
    fn default() -> Self {
        Self::ALL
    }
}

impl ThreadTraceTokenConfig {
    pub const ALL: Self = Self {
        token_mask: ThreadTraceTokenTypeFlags::all(),
        reg_mask: Some(ThreadTraceRegTypeFlags::all()),
    };

    /// Value for SQ_THREAD_TRACE_TOKEN_MASK.TOKEN_MASK.
    pub fn hw_token_mask(&self) -> u32 {
        TOKEN_MAP
            .iter()
            .filter(|(flag, _)| self.token_mask.contains(*flag))
            .fold(0, |acc, (_, bit)| acc | (1 << bit))
    }

    /// Value for SQ_THREAD_TRACE_TOKEN_MASK.REG_MASK, if the register filter changes.
    pub fn hw_reg_mask(&self) -> Option<u32> {
        let reg_mask = self.reg_mask?;

        Some(REG_MAP
            .iter()
            .filter(|(flags, _)| reg_mask.intersects(*flags))
            .fold(0, |acc, (_, bit)| acc | (1 << bit)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_tokens() {
        let config = ThreadTraceTokenConfig::ALL;

        assert_eq!(config.hw_token_mask(), 0xFFFF);
        assert_eq!(config.hw_reg_mask(), Some(0xFF));
    }

    #[test]
    fn gfx9_tokens_are_dropped() {
        let config = ThreadTraceTokenConfig {
            token_mask: ThreadTraceTokenTypeFlags::VALU_INST | ThreadTraceTokenTypeFlags::WAVE_START,
            reg_mask: Some(ThreadTraceRegTypeFlags::ALL_REG_READS),
        };

        assert_eq!(config.hw_token_mask(), 1 << 3);
        assert_eq!(config.hw_reg_mask(), Some(0));
    }

    #[test]
    fn reg_classes_fold_into_decoder_bits() {
        let config = ThreadTraceTokenConfig {
            token_mask: ThreadTraceTokenTypeFlags::REG,
            reg_mask: Some(ThreadTraceRegTypeFlags::SHADER_LAUNCH_STATE_REGS | ThreadTraceRegTypeFlags::DRAW_REGS),
        };

        assert_eq!(config.hw_reg_mask(), Some((1 << 6) | (1 << 1)));
    }
}
