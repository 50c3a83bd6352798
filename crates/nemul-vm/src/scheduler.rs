use nemul_cpu::Outcome;
use tracing::{debug, warn};

use crate::process::{DebugStop, Pid, Process};
use crate::table::ProcessTable;

/// Instructions per quantum, roughly one millisecond of the console's CPU.
pub const DEFAULT_INSTRUCTION_BUDGET: u64 = 300_000;

/// Handles the syscall trap. Reads the syscall number from `r0` and arguments
/// from `r1..r5`, and leaves the result in `r0`.
pub trait SyscallDispatcher {
    fn dispatch(&mut self, process: &mut Process);
}

/// Told when the scheduler debug-stops a process.
pub trait StopObserver {
    fn process_stopped(&mut self, pid: Pid, reason: DebugStop);
}

impl StopObserver for () {
    fn process_stopped(&mut self, _pid: Pid, _reason: DebugStop) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub instruction_budget: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            instruction_budget: DEFAULT_INSTRUCTION_BUDGET,
        }
    }
}

/// Summary of one scheduling quantum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantum {
    pub pid: Pid,
    pub executed: u64,
    pub outcome: Outcome,
}

/// Runs at most one process per call, first runnable in table order.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Advance simulated time by one quantum. Returns `None` when nothing is
    /// runnable.
    pub fn step(
        &self,
        table: &mut ProcessTable,
        syscalls: &mut dyn SyscallDispatcher,
        observer: &mut dyn StopObserver,
    ) -> Option<Quantum> {
        let process = table.next_runnable()?;
        let pid = process.pid;
        let mem = process.mem.as_mut()?;
        let res = nemul_cpu::run(&mut process.cpu, mem, self.config.instruction_budget);

        match res.outcome {
            Outcome::Ok => {}
            Outcome::Syscall => {
                debug!(pid, nr = process.cpu.regs[0], "syscall");
                syscalls.dispatch(process);
            }
            outcome => {
                let pc = process.cpu.pc().wrapping_sub(4);
                process.cpu.set_pc(pc);
                let reason = DebugStop::from_outcome(outcome).unwrap_or(DebugStop::Fatal);
                process.dbgstop = reason;
                if outcome == Outcome::Fatal {
                    warn!(pid, pc = format_args!("{pc:#010x}"), "fatal instruction");
                } else {
                    debug!(pid, pc = format_args!("{pc:#010x}"), ?reason, "process stopped");
                }
                observer.process_stopped(pid, reason);
            }
        }

        Some(Quantum {
            pid,
            executed: res.executed,
            outcome: res.outcome,
        })
    }
}
