use tracing::debug;

use crate::errno::Errno;
use crate::init_image;
use crate::process::{DebugStop, Pid, Process, ProcessState};

/// Number of process slots.
pub const MAX_PROCESSES: usize = 16;

pub const INIT_PID: Pid = 1;

/// Fixed arena of process slots.
///
/// Slot indices and pids are distinct: pid 1 lives in slot 0, forked
/// children get `slot + MAX_PROCESSES`, so two live processes never share a
/// pid.
#[derive(Debug, Clone)]
pub struct ProcessTable {
    slots: Vec<Process>,
    init_image: Vec<u8>,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable {
    /// A table holding only the default init process.
    pub fn new() -> Self {
        Self::with_init_image(init_image::default_image())
    }

    /// A table whose init process runs `image` instead of the built-in one.
    pub fn with_init_image(image: Vec<u8>) -> Self {
        let mut table = ProcessTable {
            slots: vec![Process::default(); MAX_PROCESSES],
            init_image: image,
        };
        table.reset();
        table
    }

    /// Drop every process and start a fresh init process.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = Process::default();
        }
        self.slots[0] = Process::spawn(INIT_PID, 0, self.init_image.clone());
        debug!(size = self.init_image.len(), "process table reset");
    }

    pub fn find(&self, pid: Pid) -> Option<&Process> {
        self.slots
            .iter()
            .find(|p| p.state != ProcessState::None && p.pid == pid)
    }

    pub fn find_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        self.slots
            .iter_mut()
            .find(|p| p.state != ProcessState::None && p.pid == pid)
    }

    /// Occupied slots in table order.
    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.slots.iter().filter(|p| p.state != ProcessState::None)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Process> {
        self.slots
            .iter_mut()
            .filter(|p| p.state != ProcessState::None)
    }

    pub fn alive_pids(&self) -> Vec<Pid> {
        self.iter().filter(|p| p.is_alive()).map(|p| p.pid).collect()
    }

    pub fn highest_alive_pid(&self) -> Option<Pid> {
        self.iter().filter(|p| p.is_alive()).map(|p| p.pid).max()
    }

    /// Duplicate `parent_pid` into a free slot and return the child's pid.
    pub fn fork(&mut self, parent_pid: Pid) -> Result<Pid, Errno> {
        let parent_idx = self
            .slots
            .iter()
            .position(|p| p.is_alive() && p.pid == parent_pid)
            .ok_or(Errno::ENOENT)?;
        let parent = &self.slots[parent_idx];
        let parent_mem = parent.mem.as_ref().ok_or(Errno::ENOENT)?;

        let slot = self
            .slots
            .iter()
            .position(|p| p.state == ProcessState::None)
            .ok_or(Errno::ENOSPC)?;

        let mut mem = Vec::new();
        mem.try_reserve_exact(parent_mem.len())
            .map_err(|_| Errno::ENOMEM)?;
        mem.extend_from_slice(parent_mem);

        let mut cpu = parent.cpu;
        cpu.regs[0] = 0;
        let pid = (slot + MAX_PROCESSES) as Pid;
        let child = Process {
            state: ProcessState::Alive,
            pid,
            ppid: parent_pid,
            mem: Some(mem),
            mexec: None,
            cpu,
            paused: false,
            unpaused: false,
            env: parent.env.clone(),
            dbgstop: DebugStop::None,
            exit_code: 0,
        };
        self.slots[slot] = child;
        debug!(parent = parent_pid, child = pid, "fork");
        Ok(pid)
    }

    /// Free the slot of an exited process and return its exit code.
    pub fn reap(&mut self, pid: Pid) -> Result<i32, Errno> {
        let slot = self
            .slots
            .iter_mut()
            .find(|p| p.state == ProcessState::Dead && p.pid == pid)
            .ok_or(Errno::ENOENT)?;
        let code = slot.exit_code;
        *slot = Process::default();
        Ok(code)
    }

    /// First runnable process in table order. Consumes a pending unpause.
    pub(crate) fn next_runnable(&mut self) -> Option<&mut Process> {
        let process = self.slots.iter_mut().find(|p| p.is_runnable())?;
        if process.unpaused {
            process.paused = false;
            process.unpaused = false;
        }
        Some(process)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_installs_init_only() {
        let mut table = ProcessTable::new();
        table.fork(INIT_PID).unwrap();
        table.reset();
        assert_eq!(table.alive_pids(), vec![INIT_PID]);
        let init = table.find(INIT_PID).unwrap();
        assert_eq!(init.cpu.pc(), 0x1000);
        assert_eq!(init.ppid, 0);
    }

    #[test]
    fn find_ignores_free_slots() {
        let table = ProcessTable::new();
        // Free slots carry pid 0.
        assert!(table.find(0).is_none());
    }

    #[test]
    fn reap_frees_slot() {
        let mut table = ProcessTable::new();
        let child = table.fork(INIT_PID).unwrap();
        assert_eq!(table.reap(child), Err(Errno::ENOENT));
        table.find_mut(child).unwrap().exit(7);
        assert_eq!(table.reap(child), Ok(7));
        assert!(table.find(child).is_none());
    }
}
