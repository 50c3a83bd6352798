#![forbid(unsafe_code)]

// The runner uses host sockets and the filesystem; keep a stub `main` so the
// workspace still builds for wasm targets.
#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
mod config;
#[cfg(not(target_arch = "wasm32"))]
mod replay;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::time::Duration;

    use anyhow::{bail, Context, Result};
    use clap::Parser;
    use nemul_gdb::RspServer;
    use nemul_vm::init_image::{default_image, from_flat_binary};
    use nemul_vm::{ProcessTable, Scheduler, UnimplementedSyscalls, MEM_MAX};
    use tracing::{debug, info};
    use tracing_subscriber::EnvFilter;

    use crate::config::{Cli, Command, RunArgs};

    pub fn main() -> Result<()> {
        let cli = Cli::parse();

        let filter = EnvFilter::try_new(&cli.log)
            .with_context(|| format!("invalid log filter {:?}", cli.log))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();

        match &cli.command {
            Command::Run(args) => run(args),
            Command::Replay(args) => crate::replay::run(args),
        }
    }

    fn load_init_image(args: &RunArgs) -> Result<Vec<u8>> {
        let Some(path) = &args.init_image else {
            return Ok(default_image());
        };
        let binary = std::fs::read(path)
            .with_context(|| format!("failed to read init image {}", path.display()))?;
        if binary.len() > MEM_MAX {
            bail!(
                "init image {} is {} bytes; the limit is {MEM_MAX}",
                path.display(),
                binary.len()
            );
        }
        Ok(from_flat_binary(&binary))
    }

    fn run(args: &RunArgs) -> Result<()> {
        let mut table = ProcessTable::with_init_image(load_init_image(args)?);
        let scheduler = Scheduler::new(args.scheduler_config());
        let mut rsp = RspServer::new(args.rsp_config());
        let mut syscalls = UnimplementedSyscalls;
        let tick = Duration::from_micros(args.tick_us);

        info!(
            budget = scheduler.config().instruction_budget,
            rsp = !rsp.is_disabled(),
            "starting"
        );

        let mut ticks = 0u64;
        let mut executed = 0u64;
        while args.ticks.map_or(true, |limit| ticks < limit) {
            rsp.poll(&mut table);
            if let Some(quantum) = scheduler.step(&mut table, &mut syscalls, &mut rsp) {
                executed += quantum.executed;
            }
            ticks += 1;
            if !tick.is_zero() {
                std::thread::sleep(tick);
            }
        }

        debug!(ticks, executed, "host loop finished");
        println!("ran {ticks} ticks, {executed} instructions");
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    native::main()
}
