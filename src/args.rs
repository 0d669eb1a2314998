use libamdgpu_perftrace::GpuSize;
use libamdgpu_perftrace::chip::AsicName;
use std::path::PathBuf;

pub struct MainOpt {
    pub instance: Option<u32>, // renderD128 + instance
    pub asic: Option<AsicName>,
    pub config_path: Option<PathBuf>,
    pub base_addr: GpuSize,
    pub reserve_limit: usize, // dwords
    pub app_mode: AppMode,
    pub dump_mode: DumpMode,
    pub opt_dump_mode: OptDumpMode,
}

impl Default for MainOpt {
    fn default() -> Self {
        Self {
            instance: None,
            asic: None,
            config_path: None,
            base_addr: 0x1_0000_0000, // 4 GiB
            reserve_limit: 256,
            app_mode: AppMode::Text,
            dump_mode: DumpMode::Experiment,
            opt_dump_mode: OptDumpMode::NoOptDump,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
#[allow(clippy::upper_case_acronyms)]
pub enum AppMode {
    Text,
    #[cfg(feature = "json")]
    JSON,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DumpMode {
    Experiment,
    Layout,
    List,
    Version,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OptDumpMode {
    NoOptDump,
    Packets,
}

const HELP_MSG: &str = concat!(
    env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"), "\n",
    env!("CARGO_PKG_REPOSITORY"), "\n",
    "\n",
    "USAGE:\n",
    "    cargo run -- [options ..] or <", env!("CARGO_PKG_NAME"), "> [options ..]\n",
    "\n",
    "FLAGS:\n",
    "   --layout\n",
    "       Dump only the SPM sample layout.\n",
    "   -P, --packets\n",
    "       Also dump the PM4 packets of the begin/end command streams.\n",
    "   --list\n",
    "       Display a list of supported ASICs (and AMDGPU devices with libdrm).\n",
    "   -J, --json\n",
    "       Output JSON formatted data.\n",
    "   -V, --version\n",
    "       Print version information.\n",
    "   -h, --help\n",
    "       Print help information.\n",
    "\n",
    "OPTIONS:\n",
    "   -c, --config <Path>\n",
    "       Experiment description (JSON). Without it a preset experiment is planned.\n",
    "   --asic <String>\n",
    "       Plan for the named ASIC (e.g. \"hawaii\", \"polaris10\").\n",
    "   -i <u32>\n",
    "       Query the topology of GPU instance (/dev/dri/renderD{128+i}). (requires libdrm)\n",
    "   --base <u64>\n",
    "       GPU virtual address of the experiment memory. (default: 0x100000000)\n",
    "   --reserve-limit <usize>\n",
    "       Dwords per command space reservation. (default: 256)\n",
    "\n",
    "ENVIRONMENT:\n",
    "   PERFTRACE_LOG\n",
    "       Log filter, e.g. \"debug\" or \"libamdgpu_perftrace=trace\".\n",
);

const MIN_RESERVE_LIMIT: usize = 128;

fn parse_u64(s: &str) -> Option<u64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse::<u64>().ok(),
    }
}

impl MainOpt {
    #[allow(unused_assignments)]
    pub fn parse() -> Self {
        let mut opt = Self::default();
        let mut skip = false;

        let args = &std::env::args().skip(1).collect::<Vec<String>>();

        for (idx, arg) in args.iter().enumerate() {
            if skip {
                skip = false;
                continue;
            }

            if !arg.starts_with('-') {
                eprintln!("Unknown option: {arg}");
                continue;
            }

            match arg.as_str() {
                "-i" => {
                    #[cfg(any(feature = "libdrm_link", feature = "libdrm_dynamic_loading"))]
                    {
                        let Some(val_str) = args.get(idx+1) else {
                            eprintln!("missing argument: \"-i <u32>\"");
                            std::process::exit(1);
                        };
                        opt.instance = Some(val_str.parse::<u32>().unwrap_or_else(|_| {
                            eprintln!("Failed to parse from {val_str:?} to u32");
                            std::process::exit(1);
                        }));
                        skip = true;
                    }
                    #[cfg(not(any(feature = "libdrm_link", feature = "libdrm_dynamic_loading")))]
                    {
                        eprintln!("\"libdrm_link\" or \"libdrm_dynamic_loading\" feature is not enabled for this build.");
                        std::process::exit(1);
                    }
                },
                "--asic" => {
                    let Some(val_str) = args.get(idx+1) else {
                        eprintln!("missing argument: \"--asic <String>\"");
                        std::process::exit(1);
                    };
                    opt.asic = Some(val_str.parse::<AsicName>().unwrap_or_else(|e| {
                        eprintln!("{e}");
                        std::process::exit(1);
                    }));
                    skip = true;
                },
                "-c" | "--config" => {
                    let Some(val_str) = args.get(idx+1) else {
                        eprintln!("missing argument: \"--config <Path>\"");
                        std::process::exit(1);
                    };
                    opt.config_path = Some(PathBuf::from(val_str));
                    skip = true;
                },
                "--base" => {
                    let Some(addr) = args.get(idx+1).and_then(|s| parse_u64(s)) else {
                        eprintln!("missing or invalid argument: \"--base <u64>\"");
                        std::process::exit(1);
                    };
                    opt.base_addr = addr;
                    skip = true;
                },
                "--reserve-limit" | "--reserve_limit" => {
                    let Some(limit) = args.get(idx+1).and_then(|s| s.parse::<usize>().ok()) else {
                        eprintln!("missing or invalid argument: \"--reserve-limit <usize>\"");
                        std::process::exit(1);
                    };
                    // SPM end rewinds up to five muxsel RAMs in one reservation
                    if limit < MIN_RESERVE_LIMIT {
                        eprintln!("--reserve-limit must be at least {MIN_RESERVE_LIMIT} dwords");
                        std::process::exit(1);
                    }
                    opt.reserve_limit = limit;
                    skip = true;
                },
                "-J" | "--json" => {
                    #[cfg(feature = "json")]
                    {
                        opt.app_mode = AppMode::JSON;
                    }
                    #[cfg(not(feature = "json"))]
                    {
                        eprintln!("\"json\" feature is not enabled for this build.");
                        std::process::exit(1);
                    }
                },
                "--layout" => {
                    opt.dump_mode = DumpMode::Layout;
                },
                "-P" | "--packets" => {
                    opt.opt_dump_mode = OptDumpMode::Packets;
                },
                "-l" | "--list" => {
                    opt.dump_mode = DumpMode::List;
                },
                "-V" | "--version" => {
                    opt.dump_mode = DumpMode::Version;
                },
                "-h" | "--help" => {
                    println!("{HELP_MSG}");
                    std::process::exit(0);
                },
                _ => {
                    eprintln!("Unknown option: {arg}");
                    std::process::exit(1);
                },
            }
        }

        opt
    }
}
