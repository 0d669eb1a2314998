use libamdgpu_perftrace::pm4::PacketIter;
use libamdgpu_perftrace::reg::RegInfo;
use serde_json::{json, Value};

mod output_json;

pub fn version_json(title: &str) {
    let version = json!({
        "version": amdgpu_perftrace_version(),
        "title": title,
    });
    println!("{version}");
}

pub trait OutputJson {
    fn json(&self) -> Value;
}

pub fn amdgpu_perftrace_version() -> Value {
    json!({
        "major": env!("CARGO_PKG_VERSION_MAJOR").parse::<u32>().unwrap_or(0),
        "minor": env!("CARGO_PKG_VERSION_MINOR").parse::<u32>().unwrap_or(0),
        "patch": env!("CARGO_PKG_VERSION_PATCH").parse::<u32>().unwrap_or(0),
    })
}

/// One object per packet, register writes are named when `reg_info` knows them.
pub fn packets_json(reg_info: &RegInfo, packets: PacketIter<'_>) -> Value {
    let packets: Vec<Value> = packets.map(|p| {
        let mut v = json!({
            "opcode": p.name(),
            "header": format!("{:#010X}", p.header),
            "body": p.body.iter().map(|dw| format!("{dw:#010X}")).collect::<Vec<_>>(),
        });

        if let Some((reg, val)) = p.as_reg_write() {
            v["reg"] = json!({
                "offset": format!("{reg:#06X}"),
                "name": reg_info.reg_name(reg),
                "value": val,
            });
        }
        if let Some(event) = p.event_type() {
            v["event_type"] = json!(event);
        }

        v
    }).collect();

    Value::Array(packets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use libamdgpu_perftrace::chip::{AsicName, ChipProperties};
    use libamdgpu_perftrace::cmd_stream::{CmdStream, VgtEventType};
    use libamdgpu_perftrace::pm4::{self, CmdBuffer};

    #[test]
    fn named_register_writes() {
        let chip = ChipProperties::new(AsicName::CHIP_TONGA);
        let reg_info = chip.reg_info();
        let mut cmd = CmdBuffer::new();

        let cs = cmd.reserve_commands();
        let cs = cmd.write_grbm_gfx_index_broadcast(&reg_info, cs);
        let cs = cmd.write(&pm4::build_event_write(VgtEventType::ThreadTraceFlush), cs);
        cmd.commit_commands(cs);

        let v = packets_json(&reg_info, cmd.packets());

        assert_eq!(v[0]["opcode"], "SET_UCONFIG_REG");
        assert_eq!(v[0]["reg"]["name"], "GRBM_GFX_INDEX");
        assert_eq!(v[0]["reg"]["value"], 0xE000_0000u32);
        assert_eq!(v[1]["event_type"], 0x36);
        assert!(v[1].get("reg").is_none());
    }
}
