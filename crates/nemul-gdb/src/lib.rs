#![forbid(unsafe_code)]

//! GDB Remote Serial Protocol server.
//!
//! Exposes the process table to a GDB client in multiprocess mode: each
//! emulated process is reported as a single-threaded inferior whose thread
//! id is `p<pid>.<pid>`. The server is polled from the emulation loop and
//! learns about breakpoints and faults through [`nemul_vm::StopObserver`].

mod commands;
pub mod packet;
mod server;
mod session;
pub mod thread;

pub use commands::{PREP_MEM_SIZE, REG_CPSR};
pub use server::{RspConfig, RspError, RspServer, DEFAULT_PORT, MAX_GIVE_UPS};
pub use session::{signal_for, Session, SIGBUS, SIGSEGV, SIGTRAP};
