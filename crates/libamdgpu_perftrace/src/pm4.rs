//! PM4 type-3 packet encoding for the GFX6-8 CP.

use tracing::warn;
use crate::cmd_stream::*;
use crate::reg::{CONFIG_SPACE_START, UCONFIG_SPACE_START};

pub const PM4_TYPE_3: u32 = 3;

pub const IT_NOP: u8 = 0x10;
pub const IT_WRITE_DATA: u8 = 0x37;
pub const IT_WAIT_REG_MEM: u8 = 0x3C;
pub const IT_COPY_DATA: u8 = 0x40;
pub const IT_EVENT_WRITE: u8 = 0x46;
pub const IT_SET_CONFIG_REG: u8 = 0x68;
pub const IT_SET_UCONFIG_REG: u8 = 0x79;

pub const fn opcode_name(opcode: u8) -> &'static str {
    match opcode {
        IT_NOP => "NOP",
        IT_WRITE_DATA => "WRITE_DATA",
        IT_WAIT_REG_MEM => "WAIT_REG_MEM",
        IT_COPY_DATA => "COPY_DATA",
        IT_EVENT_WRITE => "EVENT_WRITE",
        IT_SET_CONFIG_REG => "SET_CONFIG_REG",
        IT_SET_UCONFIG_REG => "SET_UCONFIG_REG",
        _ => "UNKNOWN",
    }
}

/// `body_dwords` excludes the header.
pub const fn type3_header(opcode: u8, body_dwords: usize, predicate: Predicate) -> u32 {
    let pred = match predicate {
        Predicate::Disable => 0,
        Predicate::Enable => 1,
    };

    (PM4_TYPE_3 << 30)
        | ((((body_dwords - 1) as u32) & 0x3FFF) << 16)
        | ((opcode as u32) << 8)
        | pred
}

const fn lo(addr: u64) -> u32 {
    addr as u32
}

const fn hi(addr: u64) -> u32 {
    (addr >> 32) as u32
}

pub fn build_set_one_config_reg(reg: u32, value: u32) -> [u32; 3] {
    assert!(is_config_reg(reg), "{reg:#X} is not a CONFIG register");

    [
        type3_header(IT_SET_CONFIG_REG, 2, Predicate::Disable),
        reg - CONFIG_SPACE_START,
        value,
    ]
}

pub fn build_set_one_uconfig_reg(reg: u32, value: u32) -> [u32; 3] {
    assert!(is_uconfig_reg(reg), "{reg:#X} is not a UCONFIG register");

    [
        type3_header(IT_SET_UCONFIG_REG, 2, Predicate::Disable),
        reg - UCONFIG_SPACE_START,
        value,
    ]
}

// WRITE_DATA control dword
const WRITE_DATA_DST_SEL_SHIFT: u32 = 8;
const WRITE_DATA_WR_ONE_ADDR: u32 = 1 << 16;
const WRITE_DATA_WR_CONFIRM: u32 = 1 << 20;
const ENGINE_SEL_SHIFT: u32 = 30;

/// Single-dword WRITE_DATA.
pub fn build_write_data(info: &WriteDataInfo, data: u32) -> [u32; 5] {
    let mut control = ((info.dst_sel as u32) << WRITE_DATA_DST_SEL_SHIFT)
        | ((info.engine as u32) << ENGINE_SEL_SHIFT);

    if info.dst_sel == WriteDataDst::Register {
        // keep writing the same register rather than incrementing
        control |= WRITE_DATA_WR_ONE_ADDR;
    }
    if info.wr_confirm {
        control |= WRITE_DATA_WR_CONFIRM;
    }

    [
        type3_header(IT_WRITE_DATA, 4, info.predicate),
        control,
        lo(info.dst_addr),
        hi(info.dst_addr),
        data,
    ]
}

pub fn build_event_write(event: VgtEventType) -> [u32; 2] {
    // EVENT_INDEX 0: none of these events report a timestamp or ZPASS/SAMPLE data
    const EVENT_INDEX: u32 = 0;

    [
        type3_header(IT_EVENT_WRITE, 1, Predicate::Disable),
        (event as u32 & 0x3F) | (EVENT_INDEX << 8),
    ]
}

pub fn build_wait_reg_mem(info: &WaitRegMemInfo) -> [u32; 7] {
    let control = (info.function as u32)
        | ((info.space as u32) << 4)
        | ((info.engine as u32) << 8);

    [
        type3_header(IT_WAIT_REG_MEM, 6, Predicate::Disable),
        control,
        lo(info.addr),
        hi(info.addr),
        info.reference,
        info.mask,
        info.poll_interval,
    ]
}

pub fn build_copy_data(info: &CopyDataInfo) -> [u32; 6] {
    let mut control = (info.src_sel as u32)
        | ((info.dst_sel as u32) << 8)
        | ((info.engine as u32) << ENGINE_SEL_SHIFT);

    if info.count_sel_2dw {
        control |= 1 << 16;
    }
    if info.wr_confirm {
        control |= 1 << 20;
    }

    [
        type3_header(IT_COPY_DATA, 5, Predicate::Disable),
        control,
        lo(info.src_addr),
        hi(info.src_addr),
        lo(info.dst_addr),
        hi(info.dst_addr),
    ]
}

/// Recording `CmdStream` which checks the reserve/commit discipline.
#[derive(Debug, Clone)]
pub struct CmdBuffer {
    buf: Vec<u32>,
    reserve_start: Option<usize>,
    reserve_limit: usize,
    num_reservations: usize,
    peak_reserved: usize,
}

impl Default for CmdBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl CmdBuffer {
    pub const DEFAULT_RESERVE_LIMIT: usize = 256;

    pub fn new() -> Self {
        Self::with_reserve_limit(Self::DEFAULT_RESERVE_LIMIT)
    }

    pub fn with_reserve_limit(reserve_limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            reserve_start: None,
            reserve_limit,
            num_reservations: 0,
            peak_reserved: 0,
        }
    }

    /// Committed dwords.
    pub fn dwords(&self) -> &[u32] {
        let end = self.reserve_start.unwrap_or(self.buf.len());
        &self.buf[..end]
    }

    pub fn packets(&self) -> PacketIter<'_> {
        PacketIter::new(self.dwords())
    }

    pub fn num_reservations(&self) -> usize {
        self.num_reservations
    }

    /// Largest number of dwords committed from a single reservation.
    pub fn peak_reserved_dwords(&self) -> usize {
        self.peak_reserved
    }

    pub fn is_reserved(&self) -> bool {
        self.reserve_start.is_some()
    }
}

impl CmdStream for CmdBuffer {
    fn reserve_limit(&self) -> usize {
        self.reserve_limit
    }

    fn reserve_commands(&mut self) -> CmdSpace {
        assert!(self.reserve_start.is_none(), "command space is already reserved");

        let start = self.buf.len();
        self.reserve_start = Some(start);
        self.num_reservations += 1;

        CmdSpace(start)
    }

    fn commit_commands(&mut self, cs: CmdSpace) {
        let Some(start) = self.reserve_start.take() else {
            panic!("commit without a command reservation");
        };
        assert!(
            start <= cs.0 && cs.0 <= self.buf.len(),
            "commit cursor {} is outside of the reservation at {start}",
            cs.0,
        );

        self.buf.truncate(cs.0);
        self.peak_reserved = self.peak_reserved.max(cs.0 - start);
    }

    fn write(&mut self, dwords: &[u32], cs: CmdSpace) -> CmdSpace {
        let Some(start) = self.reserve_start else {
            panic!("write outside of a command reservation");
        };
        let end = cs.0 + dwords.len();
        assert!(
            start <= cs.0 && end <= start + self.reserve_limit,
            "writing {} dwords at {} overruns the reservation [{start}, {})",
            dwords.len(),
            cs.0,
            start + self.reserve_limit,
        );

        if self.buf.len() < end {
            self.buf.resize(end, 0);
        }
        self.buf[cs.0..end].copy_from_slice(dwords);

        CmdSpace(end)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Packet<'a> {
    pub header: u32,
    pub body: &'a [u32],
}

impl Packet<'_> {
    pub fn opcode(&self) -> u8 {
        ((self.header >> 8) & 0xFF) as u8
    }

    pub fn name(&self) -> &'static str {
        opcode_name(self.opcode())
    }

    pub fn predicated(&self) -> bool {
        (self.header & 1) != 0
    }

    /// `(register, value)` for packets which write a single register.
    pub fn as_reg_write(&self) -> Option<(u32, u32)> {
        match (self.opcode(), self.body) {
            (IT_SET_CONFIG_REG, [offset, value, ..]) => Some((offset + CONFIG_SPACE_START, *value)),
            (IT_SET_UCONFIG_REG, [offset, value, ..]) => Some((offset + UCONFIG_SPACE_START, *value)),
            (IT_WRITE_DATA, [control, addr_lo, _, value, ..])
                if (control >> WRITE_DATA_DST_SEL_SHIFT) & 0xF == WriteDataDst::Register as u32 =>
            {
                Some((*addr_lo, *value))
            },
            _ => None,
        }
    }

    /// EVENT_TYPE of an EVENT_WRITE packet.
    pub fn event_type(&self) -> Option<u32> {
        match (self.opcode(), self.body) {
            (IT_EVENT_WRITE, [event, ..]) => Some(event & 0x3F),
            _ => None,
        }
    }
}

/// Walks a dword stream packet by packet, stopping at the first malformed header.
#[derive(Clone, Debug)]
pub struct PacketIter<'a> {
    dwords: &'a [u32],
}

impl<'a> PacketIter<'a> {
    pub fn new(dwords: &'a [u32]) -> Self {
        Self { dwords }
    }
}

impl<'a> Iterator for PacketIter<'a> {
    type Item = Packet<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (&header, rest) = self.dwords.split_first()?;

        if header >> 30 != PM4_TYPE_3 {
            warn!("unsupported PM4 header: {header:#010X}");
            self.dwords = &[];
            return None;
        }

        let body_len = (((header >> 16) & 0x3FFF) + 1) as usize;

        if rest.len() < body_len {
            warn!("truncated {} packet: {} of {body_len} dwords", opcode_name(((header >> 8) & 0xFF) as u8), rest.len());
            self.dwords = &[];
            return None;
        }

        let (body, rest) = rest.split_at(body_len);
        self.dwords = rest;

        Some(Packet { header, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_encoding() {
        assert_eq!(type3_header(IT_SET_UCONFIG_REG, 2, Predicate::Disable), 0xC001_7900);
        assert_eq!(type3_header(IT_WRITE_DATA, 4, Predicate::Enable), 0xC003_3701);
    }

    #[test]
    fn set_reg_round_trip() {
        let mut cmd = CmdBuffer::new();
        let cs = cmd.reserve_commands();
        let cs = cmd.write_set_one_config_reg(0x200B, 0xE000_0000, cs);
        let cs = cmd.write_set_one_perf_ctr_reg(0xDC83, 0x1000, cs);
        cmd.commit_commands(cs);

        let writes: Vec<_> = cmd.packets().filter_map(|p| p.as_reg_write()).collect();
        assert_eq!(writes, [(0x200B, 0xE000_0000), (0xDC83, 0x1000)]);
        assert_eq!(cmd.dwords()[1], 0xB);
    }

    #[test]
    fn perf_ctr_reg_outside_set_ranges_uses_write_data() {
        let mut cmd = CmdBuffer::new();
        let cs = cmd.reserve_commands();
        let cs = cmd.write_set_one_perf_ctr_reg(0x3400, 7, cs);
        cmd.commit_commands(cs);

        let packet = cmd.packets().next().unwrap();
        assert_eq!(packet.opcode(), IT_WRITE_DATA);
        assert_eq!(packet.as_reg_write(), Some((0x3400, 7)));
    }

    #[test]
    fn write_data_control() {
        let [_, control, addr_lo, addr_hi, data] = build_write_data(&WriteDataInfo::register(0xDC86), 0x1234);

        assert_eq!(control, WRITE_DATA_WR_ONE_ADDR | WRITE_DATA_WR_CONFIRM);
        assert_eq!((addr_lo, addr_hi, data), (0xDC86, 0, 0x1234));
    }

    #[test]
    fn copy_data_to_memory() {
        let info = CopyDataInfo {
            engine: Pm4Engine::Me,
            src_sel: CopyDataSrc::PerfCounter,
            src_addr: 0xC338,
            dst_sel: CopyDataDst::AsyncMemory,
            dst_addr: 0x1_2345_6780,
            count_sel_2dw: false,
            wr_confirm: true,
        };
        let packet = build_copy_data(&info);

        assert_eq!(packet[1], 4 | (5 << 8) | (1 << 20));
        assert_eq!(&packet[2..], &[0xC338, 0, 0x2345_6780, 0x1]);
    }

    #[test]
    fn reservation_bookkeeping() {
        let mut cmd = CmdBuffer::with_reserve_limit(8);

        let cs = cmd.reserve_commands();
        let cs = cmd.write(&build_event_write(VgtEventType::ThreadTraceFlush), cs);
        cmd.commit_commands(cs);
        let cs = cmd.reserve_commands();
        assert_eq!(cs, CmdSpace(2));
        cmd.commit_commands(cs);

        assert_eq!(cmd.num_reservations(), 2);
        assert_eq!(cmd.peak_reserved_dwords(), 2);
        assert_eq!(cmd.packets().next().unwrap().event_type(), Some(0x36));
    }

    #[test]
    #[should_panic(expected = "overruns the reservation")]
    fn write_past_reservation_panics() {
        let mut cmd = CmdBuffer::with_reserve_limit(4);
        let cs = cmd.reserve_commands();
        let cs = cmd.write(&build_set_one_uconfig_reg(0xC200, 0), cs);
        cmd.write(&build_set_one_uconfig_reg(0xC200, 0), cs);
    }

    #[test]
    #[should_panic(expected = "outside of a command reservation")]
    fn write_without_reservation_panics() {
        let mut cmd = CmdBuffer::new();
        cmd.write(&[0], CmdSpace(0));
    }

    #[test]
    fn malformed_stream_stops() {
        // type-0 header
        assert_eq!(PacketIter::new(&[0x0000_1234, 0]).count(), 0);
        // truncated body
        let header = type3_header(IT_COPY_DATA, 5, Predicate::Disable);
        assert_eq!(PacketIter::new(&[header, 0, 0]).count(), 0);
    }
}
