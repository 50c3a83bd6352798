#![forbid(unsafe_code)]

//! Process table and cooperative scheduler.
//!
//! Everything runs on one host thread. A [`ProcessTable`] owns a fixed
//! number of process slots; the [`Scheduler`] picks one runnable process per
//! quantum and runs it through the interpreter until the instruction budget
//! is spent or the interpreter reports something the process cannot continue
//! past on its own. Syscalls are handed to a [`SyscallDispatcher`], debug
//! stops are reported to a [`StopObserver`].

mod errno;
pub mod init_image;
mod process;
mod scheduler;
mod syscall;
mod table;

pub use errno::Errno;
pub use process::{DebugStop, Pid, Process, ProcessState, ENTRY_POINT, ENV_MAX, MEM_MAX};
pub use scheduler::{
    Quantum, Scheduler, SchedulerConfig, StopObserver, SyscallDispatcher,
    DEFAULT_INSTRUCTION_BUDGET,
};
pub use syscall::UnimplementedSyscalls;
pub use table::{ProcessTable, INIT_PID, MAX_PROCESSES};
