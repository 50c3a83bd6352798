use nemul_cpu::state::REG_SP;
use nemul_cpu::{CpuState, Outcome, MIN_VALID_ADDR};

use crate::errno::Errno;

pub type Pid = u32;

/// Largest environment blob a process may carry.
pub const ENV_MAX: usize = 4096;

/// Hard cap on a process image.
pub const MEM_MAX: usize = 64 * 1024 * 1024;

/// Address execution starts at after reset or exec.
pub const ENTRY_POINT: u32 = MIN_VALID_ADDR;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
    /// Free slot.
    #[default]
    None,
    Alive,
    /// Exited, slot not yet reaped.
    Dead,
}

/// Why a process is frozen for the debugger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DebugStop {
    #[default]
    None,
    CtrlC,
    Signal,
    Breakpoint,
    DataAbort,
    AlignmentCheck,
    PrefetchAbort,
    Fatal,
}

impl DebugStop {
    /// Stop reason for a terminal interpreter outcome, or `None` for outcomes
    /// that do not stop the process.
    pub fn from_outcome(outcome: Outcome) -> Option<Self> {
        match outcome {
            Outcome::Ok | Outcome::Syscall => None,
            Outcome::AlignmentFault => Some(DebugStop::AlignmentCheck),
            Outcome::DataAbort => Some(DebugStop::DataAbort),
            Outcome::PrefetchAbort => Some(DebugStop::PrefetchAbort),
            Outcome::Breakpoint => Some(DebugStop::Breakpoint),
            Outcome::Fatal => Some(DebugStop::Fatal),
        }
    }

    #[inline]
    pub fn is_stopped(self) -> bool {
        self != DebugStop::None
    }
}

/// One emulated user process. A process is single-threaded; its thread id is
/// its pid.
#[derive(Debug, Clone, Default)]
pub struct Process {
    pub state: ProcessState,
    pub pid: Pid,
    pub ppid: Pid,
    /// Flat memory image. `None` means the process cannot run or be
    /// inspected.
    pub mem: Option<Vec<u8>>,
    /// Image staged by exec, moved into `mem` on commit.
    pub mexec: Option<Box<[u8]>>,
    pub cpu: CpuState,
    pub paused: bool,
    pub unpaused: bool,
    pub env: Vec<u8>,
    pub dbgstop: DebugStop,
    pub exit_code: i32,
}

impl Process {
    /// A fresh live process running `image` from [`ENTRY_POINT`].
    pub fn spawn(pid: Pid, ppid: Pid, image: Vec<u8>) -> Self {
        let mut process = Process {
            state: ProcessState::Alive,
            pid,
            ppid,
            ..Process::default()
        };
        process.start(image);
        process
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.state == ProcessState::Alive
    }

    /// Whether the scheduler may pick this process.
    pub fn is_runnable(&self) -> bool {
        self.is_alive()
            && self.mem.is_some()
            && !self.dbgstop.is_stopped()
            && (!self.paused || self.unpaused)
    }

    pub fn mem_size(&self) -> usize {
        self.mem.as_ref().map_or(0, Vec::len)
    }

    pub fn exit(&mut self, code: i32) {
        self.state = ProcessState::Dead;
        self.exit_code = code;
        self.mem = None;
        self.mexec = None;
        self.paused = false;
        self.unpaused = false;
    }

    /// Block until [`Process::unpause`] is called.
    pub fn pause(&mut self) {
        self.paused = true;
        self.unpaused = false;
    }

    /// Let a paused process run once more. Has no effect on a running one.
    pub fn unpause(&mut self) {
        if self.paused {
            self.unpaused = true;
        }
    }

    /// Grow or shrink the memory image. New bytes are zero.
    pub fn resize_memory(&mut self, len: usize) -> Result<(), Errno> {
        if len > MEM_MAX {
            return Err(Errno::ENOMEM);
        }
        if len <= MIN_VALID_ADDR as usize {
            return Err(Errno::EINVAL);
        }
        let mem = self.mem.as_mut().ok_or(Errno::EFAULT)?;
        if len > mem.len() {
            mem.try_reserve_exact(len - mem.len())
                .map_err(|_| Errno::ENOMEM)?;
            mem.resize(len, 0);
        } else {
            mem.truncate(len);
            mem.shrink_to_fit();
        }
        Ok(())
    }

    /// Stage a new image for [`Process::commit_exec`].
    pub fn stage_exec(&mut self, image: Vec<u8>) -> Result<(), Errno> {
        if image.len() > MEM_MAX {
            return Err(Errno::ENOMEM);
        }
        if image.len() <= MIN_VALID_ADDR as usize {
            return Err(Errno::EINVAL);
        }
        self.mexec = Some(image.into_boxed_slice());
        Ok(())
    }

    /// Replace the running image with the staged one and restart at
    /// [`ENTRY_POINT`]. The environment is kept.
    pub fn commit_exec(&mut self) -> Result<(), Errno> {
        let image = self.mexec.take().ok_or(Errno::EINVAL)?;
        self.start(image.into_vec());
        Ok(())
    }

    pub fn set_env(&mut self, env: &[u8]) -> Result<(), Errno> {
        if env.len() > ENV_MAX {
            return Err(Errno::EINVAL);
        }
        self.env.clear();
        self.env.extend_from_slice(env);
        Ok(())
    }

    fn start(&mut self, image: Vec<u8>) {
        let mut cpu = CpuState::at(ENTRY_POINT);
        cpu.regs[REG_SP] = (image.len() as u32) & !7;
        self.cpu = cpu;
        self.mem = Some(image);
        self.dbgstop = DebugStop::None;
    }
}
