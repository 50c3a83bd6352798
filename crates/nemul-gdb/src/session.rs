//! Per-connection protocol state.
//!
//! A [`Session`] turns received bytes into replies. It does no I/O: the
//! server feeds it whatever the socket produced and drains [`Session::pending`]
//! back into the socket.

use nemul_vm::{DebugStop, Pid, ProcessTable};
use tracing::debug;

use crate::commands;
use crate::packet::{PacketEvent, PacketReader, PacketWriter};
use crate::thread::Target;

pub const SIGTRAP: u8 = 5;
pub const SIGBUS: u8 = 10;
pub const SIGSEGV: u8 = 11;

/// Signal number reported to GDB for a stop reason.
pub fn signal_for(reason: DebugStop) -> u8 {
    match reason {
        DebugStop::AlignmentCheck => SIGBUS,
        DebugStop::DataAbort | DebugStop::PrefetchAbort => SIGSEGV,
        _ => SIGTRAP,
    }
}

/// `T<sig>thread:p<pid>.<pid>;`
pub(crate) fn stop_reply(pid: Pid, signal: u8) -> Vec<u8> {
    let mut w = PacketWriter::new();
    w.str("T").hex8(signal).str("thread:").thread_id(pid).str(";");
    w.finish()
}

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    /// `Hg` selector: target of register and memory access.
    pub general: Option<Target>,
    /// `Hc` selector.
    pub cont: Option<Target>,
    /// Snapshot taken by `qfThreadInfo`, walked by `qsThreadInfo`.
    pub thread_list: Vec<Pid>,
    pub thread_cursor: usize,
    /// Client advertised `error-message+`.
    pub textual_errors: bool,
}

#[derive(Debug, Default)]
pub struct Session {
    reader: PacketReader,
    out: Vec<u8>,
    state: SessionState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process received bytes, queueing acks and replies. Returns the number
    /// of well-formed packets seen.
    pub fn feed(&mut self, bytes: &[u8], table: &mut ProcessTable) -> usize {
        let mut packets = 0;
        for event in self.reader.push(bytes) {
            match event {
                PacketEvent::Packet(payload) => {
                    packets += 1;
                    debug!(packet = %String::from_utf8_lossy(&payload), "rsp recv");
                    self.out.push(b'+');
                    if let Some(reply) = commands::dispatch(&mut self.state, table, &payload) {
                        self.out.extend_from_slice(&reply);
                    }
                }
                PacketEvent::Rejected => {
                    debug!("rsp packet rejected");
                    self.out.push(b'-');
                }
                PacketEvent::Interrupt => self.interrupt(table),
            }
        }
        packets
    }

    /// Ctrl-C: stop every running process and report the first one.
    pub fn interrupt(&mut self, table: &mut ProcessTable) {
        let mut first = None;
        for process in table.iter_mut() {
            if process.is_alive() && process.mem.is_some() && !process.dbgstop.is_stopped() {
                process.dbgstop = DebugStop::CtrlC;
                first.get_or_insert(process.pid);
            }
        }
        debug!(?first, "rsp interrupt");

        match first.or_else(|| table.highest_alive_pid()) {
            Some(pid) => self.out.extend_from_slice(&stop_reply(pid, SIGTRAP)),
            None => {
                let mut w = PacketWriter::new();
                w.str("W00");
                self.out.extend_from_slice(&w.finish());
            }
        }
    }

    /// Queue an asynchronous stop reply.
    pub fn notify_stop(&mut self, pid: Pid, reason: DebugStop) {
        self.out
            .extend_from_slice(&stop_reply(pid, signal_for(reason)));
    }

    /// Bytes waiting to be written.
    pub fn pending(&self) -> &[u8] {
        &self.out
    }

    /// Drop the first `n` pending bytes after they have been written.
    pub fn consume(&mut self, n: usize) {
        self.out.drain(..n.min(self.out.len()));
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out)
    }

    pub fn textual_errors(&self) -> bool {
        self.state.textual_errors
    }
}
