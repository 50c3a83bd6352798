use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use nemul_gdb::{RspConfig, DEFAULT_PORT};
use nemul_vm::{SchedulerConfig, DEFAULT_INSTRUCTION_BUDGET};

const DEFAULT_TICK_US: u64 = 1000;

#[derive(Debug, Parser)]
#[command(name = "nemul", version, about = "Nemul console simulator")]
pub struct Cli {
    /// Log filter (tracing-subscriber EnvFilter syntax).
    ///
    /// Environment variable: `NEMUL_LOG`.
    #[arg(long, global = true, env = "NEMUL_LOG", default_value = "info")]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Boot the init process and run the host loop.
    Run(RunArgs),
    /// Replay a JSON-lines instruction trace against the interpreter.
    Replay(ReplayArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Flat binary to install as pid 1 instead of the built-in idle loop.
    ///
    /// The file is loaded at address 0; execution starts at 0x1000.
    #[arg(long)]
    pub init_image: Option<PathBuf>,

    /// TCP port of the GDB remote stub.
    ///
    /// Environment variable: `NEMUL_RSP_PORT`.
    #[arg(long, env = "NEMUL_RSP_PORT", default_value_t = DEFAULT_PORT)]
    pub rsp_port: u16,

    /// Address the GDB remote stub binds to.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub rsp_bind: IpAddr,

    /// Do not start the GDB remote stub. `NEMUL_RSP=0` has the same effect.
    #[arg(long)]
    pub no_rsp: bool,

    /// Instructions per scheduler quantum.
    #[arg(long, default_value_t = DEFAULT_INSTRUCTION_BUDGET)]
    pub budget: u64,

    /// Stop after this many host ticks. Runs until killed when omitted.
    #[arg(long)]
    pub ticks: Option<u64>,

    /// Host sleep between ticks, in microseconds.
    #[arg(long, default_value_t = DEFAULT_TICK_US)]
    pub tick_us: u64,
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Trace file, one JSON record per line.
    pub trace: PathBuf,

    /// Size of the scratch memory image each record runs against.
    #[arg(long, default_value_t = 1024 * 1024)]
    pub mem_size: usize,
}

impl RunArgs {
    pub fn rsp_config(&self) -> RspConfig {
        let env_enabled = env_flag("NEMUL_RSP").unwrap_or(true);
        RspConfig {
            enabled: !self.no_rsp && env_enabled,
            bind: self.rsp_bind,
            port: self.rsp_port,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            instruction_budget: self.budget,
        }
    }
}

/// `0`/`false`/`off` and `1`/`true`/`on`; anything else is ignored.
fn env_flag(name: &str) -> Option<bool> {
    let value = env::var(name).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "0" | "false" | "off" | "no" => Some(false),
        "1" | "true" | "on" | "yes" => Some(true),
        _ => None,
    }
}
