use tracing::debug;

use crate::errno::Errno;
use crate::process::Process;
use crate::scheduler::SyscallDispatcher;

/// Answers every syscall with `-ENOSYS`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnimplementedSyscalls;

impl SyscallDispatcher for UnimplementedSyscalls {
    fn dispatch(&mut self, process: &mut Process) {
        debug!(pid = process.pid, nr = process.cpu.regs[0], "unimplemented syscall");
        process.cpu.regs[0] = Errno::ENOSYS.as_return();
    }
}
