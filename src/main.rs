use anyhow::{bail, Context};
use libamdgpu_perftrace::chip::ChipProperties;
use libamdgpu_perftrace::cmd_stream::{CmdSpace, CmdStream};
use libamdgpu_perftrace::pm4::CmdBuffer;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod args;
use args::{AppMode, DumpMode, MainOpt, OptDumpMode};

mod config;
use config::ExperimentConfig;

mod dump;

mod experiment;
use experiment::Experiment;

const TITLE: &str = env!("TITLE");

fn init_logger() {
    let filter = EnvFilter::try_from_env("PERFTRACE_LOG")
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `--asic` wins over `-i`, which wins over the "asic" of the experiment file.
fn chip_properties(main_opt: &MainOpt, config: Option<&ExperimentConfig>) -> anyhow::Result<ChipProperties> {
    if let Some(asic) = main_opt.asic {
        return Ok(ChipProperties::new(asic));
    }

    #[cfg(any(feature = "libdrm_link", feature = "libdrm_dynamic_loading"))]
    if let Some(instance) = main_opt.instance {
        return libamdgpu_perftrace::DevicePath::new(instance).chip_properties();
    }

    if let Some(asic) = config.map(|c| c.asic_name()).transpose()?.flatten() {
        return Ok(ChipProperties::new(asic));
    }

    #[cfg(any(feature = "libdrm_link", feature = "libdrm_dynamic_loading"))]
    return libamdgpu_perftrace::DevicePath::new(0).chip_properties()
        .context("no ASIC given and no AMDGPU device found");

    #[cfg(not(any(feature = "libdrm_link", feature = "libdrm_dynamic_loading")))]
    bail!("no ASIC given, use \"--asic <String>\" or an experiment file with \"asic\"");
}

fn record(reserve_limit: usize, f: impl FnOnce(&mut CmdBuffer, CmdSpace) -> CmdSpace) -> CmdBuffer {
    let mut cmd = CmdBuffer::with_reserve_limit(reserve_limit);
    let cs = cmd.reserve_commands();
    let cs = f(&mut cmd, cs);
    cmd.commit_commands(cs);

    cmd
}

fn main() -> anyhow::Result<()> {
    init_logger();

    let main_opt = MainOpt::parse();

    match main_opt.dump_mode {
        DumpMode::Version => {
            #[cfg(feature = "json")]
            if main_opt.app_mode == AppMode::JSON {
                amdgpu_perftrace_json::version_json(TITLE);
                return Ok(());
            }

            println!("{TITLE}");
            return Ok(());
        },
        DumpMode::List => {
            dump::dump_asic_list();
            #[cfg(any(feature = "libdrm_link", feature = "libdrm_dynamic_loading"))]
            dump::dump_device_list();
            return Ok(());
        },
        DumpMode::Experiment | DumpMode::Layout => {},
    }

    let config = main_opt.config_path
        .as_ref()
        .map(ExperimentConfig::load)
        .transpose()?;
    let chip = chip_properties(&main_opt, config.as_ref())?;
    let config = config.unwrap_or_else(|| ExperimentConfig::preset(&chip));

    info!("planning for {}", chip.asic_name);

    let mut exp = Experiment::new(&chip, &config)
        .with_context(|| format!("Failed to plan the experiment for {}", chip.asic_name))?;

    if main_opt.dump_mode == DumpMode::Layout {
        let Some(layout) = exp.spm_layout().transpose()? else {
            bail!("the experiment has no SPM trace");
        };

        match main_opt.app_mode {
            AppMode::Text => dump::dump_layout(&layout),
            #[cfg(feature = "json")]
            AppMode::JSON => {
                use amdgpu_perftrace_json::OutputJson;
                println!("{}", layout.json());
            },
        }

        return Ok(());
    }

    let base_addr = main_opt.base_addr;
    let begin = record(main_opt.reserve_limit, |cmd, cs| exp.write_begin_commands(base_addr, cmd, cs));
    let end = record(main_opt.reserve_limit, |cmd, cs| exp.write_end_commands(base_addr, cmd, cs));
    let with_packets = main_opt.opt_dump_mode == OptDumpMode::Packets;

    match main_opt.app_mode {
        AppMode::Text => {
            dump::dump_experiment(TITLE, &exp, base_addr, with_packets.then_some([&begin, &end]))?;
        },
        #[cfg(feature = "json")]
        AppMode::JSON => {
            use amdgpu_perftrace_json::{OutputJson, amdgpu_perftrace_version, packets_json};

            let reg_info = chip.reg_info();
            let mut v = serde_json::json!({
                "title": TITLE,
                "version": amdgpu_perftrace_version(),
                "chip": chip.json(),
                "base_addr": base_addr,
                "total_size": exp.total_size(),
                "thread_traces": exp.thread_traces().iter().map(|tt| tt.json()).collect::<Vec<_>>(),
            });

            if let Some(layout) = exp.spm_layout().transpose()? {
                v["spm"] = layout.json();
            }

            if with_packets {
                v["begin"] = packets_json(&reg_info, begin.packets());
                v["end"] = packets_json(&reg_info, end.packets());
            }

            println!("{v}");
        },
    }

    Ok(())
}
