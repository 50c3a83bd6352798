//! Command dispatch.
//!
//! Each command is keyed by a literal prefix of the payload; the longest
//! matching prefix wins, so `vCont?` is not mistaken for `vCont`. Payloads
//! with no matching prefix get an empty reply, which GDB reads as
//! "unsupported".

use nemul_cpu::mem::check_range;
use nemul_vm::{DebugStop, Errno, Pid, Process, ProcessTable, INIT_PID};
use tracing::info;

use crate::packet::{decode_hex, PacketWriter, MAX_PACKET_SIZE};
use crate::session::{signal_for, SessionState, SIGTRAP};
use crate::thread::{Target, ThreadId};

/// Memory size `monitor prep` gives the init process.
pub const PREP_MEM_SIZE: usize = 16 * 1024 * 1024;

/// GDB register number of the CPSR in the ARM register layout.
pub const REG_CPSR: usize = 0x19;

const REGISTER_UNAVAILABLE: &str = "xxxxxxxx";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CommandError {
    errno: Errno,
    message: &'static str,
}

impl CommandError {
    const fn new(errno: Errno, message: &'static str) -> Self {
        Self { errno, message }
    }
}

pub(crate) enum Reply {
    Packet,
    /// No reply now; a stop reply follows later.
    Deferred,
}

type CommandResult = Result<Reply, CommandError>;

type Handler = fn(&mut SessionState, &mut ProcessTable, &str, &mut PacketWriter) -> CommandResult;

const COMMANDS: &[(&str, Handler)] = &[
    ("qSupported", supported),
    ("vCont?", vcont_actions),
    ("vCont", vcont),
    ("!", extended_mode),
    ("H", set_thread),
    ("g", read_registers),
    ("m", read_memory),
    ("M", write_memory),
    ("p", read_register),
    ("P", write_register),
    ("D", detach),
    ("T", thread_alive),
    ("?", stop_reason),
    ("qC", current_thread),
    ("qfThreadInfo", thread_info_first),
    ("qsThreadInfo", thread_info_next),
    ("qAttached", attached),
    ("qThreadExtraInfo,", thread_extra_info),
    ("qRcmd,", monitor),
];

/// Run one packet payload. Returns the framed reply, or `None` when the
/// reply is deferred.
pub(crate) fn dispatch(
    state: &mut SessionState,
    table: &mut ProcessTable,
    payload: &[u8],
) -> Option<Vec<u8>> {
    let mut out = PacketWriter::new();
    let Ok(payload) = std::str::from_utf8(payload) else {
        return Some(out.finish());
    };

    let command = COMMANDS
        .iter()
        .filter(|(prefix, _)| payload.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len());

    if let Some((prefix, handler)) = command {
        match handler(state, table, &payload[prefix.len()..], &mut out) {
            Ok(Reply::Packet) => {}
            Ok(Reply::Deferred) => return None,
            Err(err) => {
                out.clear();
                if state.textual_errors {
                    out.str("E.").str(err.message);
                } else {
                    out.str("E").hex8(err.errno.code() as u8);
                }
            }
        }
    }
    Some(out.finish())
}

const NO_PROCESS: CommandError = CommandError::new(Errno::ENOENT, "no such process");
const BAD_ARGS: CommandError = CommandError::new(Errno::EINVAL, "malformed arguments");
const BAD_ADDRESS: CommandError = CommandError::new(Errno::EFAULT, "address out of range");

fn parse_hex_u32(s: &str) -> Result<u32, CommandError> {
    u32::from_str_radix(s, 16).map_err(|_| BAD_ARGS)
}

fn parse_thread(s: &str, table: &ProcessTable) -> Result<Target, CommandError> {
    let id = ThreadId::parse(s).ok_or(BAD_ARGS)?;
    id.resolve(table).map_err(|_| NO_PROCESS)
}

/// Pid the general selector refers to. An unset or all-threads selector
/// means the highest live pid.
fn general_pid(state: &SessionState, table: &ProcessTable) -> Option<Pid> {
    match state.general {
        Some(Target::Pid(pid)) => Some(pid),
        _ => table.highest_alive_pid(),
    }
}

/// The general-selector process, if it has memory to inspect.
fn general_process<'t>(
    state: &SessionState,
    table: &'t mut ProcessTable,
) -> Result<&'t mut Process, CommandError> {
    let pid = general_pid(state, table).ok_or(NO_PROCESS)?;
    table
        .find_mut(pid)
        .filter(|p| p.mem.is_some())
        .ok_or(NO_PROCESS)
}

/// Parse `addr,len` and check `[addr, addr + len)` against `mem`.
fn memory_range(args: &str, mem: &[u8]) -> Result<(usize, usize), CommandError> {
    let (addr, len) = args.split_once(',').ok_or(BAD_ARGS)?;
    let addr = parse_hex_u32(addr)?;
    let len = parse_hex_u32(len)? as usize;
    let start = check_range(mem, addr, len).map_err(|_| BAD_ADDRESS)?;
    Ok((start, len))
}

fn supported(
    state: &mut SessionState,
    _table: &mut ProcessTable,
    args: &str,
    out: &mut PacketWriter,
) -> CommandResult {
    let features = args.strip_prefix(':').unwrap_or(args);
    state.textual_errors = features.split(';').any(|f| f == "error-message+");
    out.str(&format!(
        "PacketSize={MAX_PACKET_SIZE:x};multiprocess+;error-message+;hwbreak+"
    ));
    Ok(Reply::Packet)
}

fn vcont_actions(
    _state: &mut SessionState,
    _table: &mut ProcessTable,
    _args: &str,
    out: &mut PacketWriter,
) -> CommandResult {
    out.str("vCont;c;C");
    Ok(Reply::Packet)
}

/// `vCont;action[:thread]...`. Only continue actions are supported. An
/// action without a thread applies to the `Hc` selection, or to every
/// process when there is none.
fn vcont(
    state: &mut SessionState,
    table: &mut ProcessTable,
    args: &str,
    out: &mut PacketWriter,
) -> CommandResult {
    let actions = args.strip_prefix(';').ok_or(BAD_ARGS)?;
    let mut targets = Vec::new();
    for action in actions.split(';') {
        let (verb, thread) = match action.split_once(':') {
            Some((verb, thread)) => (verb, Some(thread)),
            None => (action, None),
        };
        let is_continue = verb == "c"
            || (verb.len() == 3 && verb.starts_with('C') && parse_hex_u32(&verb[1..]).is_ok());
        if !is_continue {
            return Ok(Reply::Packet);
        }
        targets.push(match thread {
            Some(thread) => parse_thread(thread, table)?,
            None => state.cont.unwrap_or(Target::All),
        });
    }

    for target in &targets {
        if let Target::Pid(pid) = *target {
            if !table.find(pid).is_some_and(Process::is_alive) {
                out.str("W00");
                return Ok(Reply::Packet);
            }
        }
    }

    for process in table.iter_mut().filter(|p| p.is_alive()) {
        if targets.iter().any(|t| t.matches(process.pid)) {
            process.dbgstop = DebugStop::None;
        }
    }
    Ok(Reply::Deferred)
}

fn extended_mode(
    _state: &mut SessionState,
    _table: &mut ProcessTable,
    _args: &str,
    out: &mut PacketWriter,
) -> CommandResult {
    out.str("OK");
    Ok(Reply::Packet)
}

/// `Hg<thread>` / `Hc<thread>`.
fn set_thread(
    state: &mut SessionState,
    table: &mut ProcessTable,
    args: &str,
    out: &mut PacketWriter,
) -> CommandResult {
    let (kind, thread) = match args.char_indices().nth(1) {
        Some((split, _)) => args.split_at(split),
        None => return Err(BAD_ARGS),
    };
    let target = parse_thread(thread, table)?;
    if let Target::Pid(pid) = target {
        table.find(pid).ok_or(NO_PROCESS)?;
    }
    match kind {
        "g" => state.general = Some(target),
        "c" => state.cont = Some(target),
        _ => return Err(BAD_ARGS),
    }
    out.str("OK");
    Ok(Reply::Packet)
}

fn read_registers(
    state: &mut SessionState,
    table: &mut ProcessTable,
    _args: &str,
    out: &mut PacketWriter,
) -> CommandResult {
    let regs = general_process(state, table)
        .map(|p| p.cpu.regs)
        .unwrap_or([0; 16]);
    for r in regs {
        out.hex32_le(r);
    }
    Ok(Reply::Packet)
}

fn read_memory(
    state: &mut SessionState,
    table: &mut ProcessTable,
    args: &str,
    out: &mut PacketWriter,
) -> CommandResult {
    let process = general_process(state, table)?;
    let mem = process.mem.as_deref().ok_or(NO_PROCESS)?;
    let (addr, len) = memory_range(args, mem)?;
    // Stay inside the advertised packet size; GDB retries the remainder.
    let len = len.min(MAX_PACKET_SIZE / 2);
    out.hex_bytes(&mem[addr..addr + len]);
    Ok(Reply::Packet)
}

fn write_memory(
    state: &mut SessionState,
    table: &mut ProcessTable,
    args: &str,
    out: &mut PacketWriter,
) -> CommandResult {
    let (range, data) = args.split_once(':').ok_or(BAD_ARGS)?;
    let data = decode_hex(data.as_bytes()).ok_or(BAD_ARGS)?;
    let process = general_process(state, table)?;
    let mem = process.mem.as_deref_mut().ok_or(NO_PROCESS)?;
    let (addr, len) = memory_range(range, mem)?;
    if data.len() != len {
        return Err(BAD_ARGS);
    }
    mem[addr..addr + len].copy_from_slice(&data);
    out.str("OK");
    Ok(Reply::Packet)
}

fn read_register(
    state: &mut SessionState,
    table: &mut ProcessTable,
    args: &str,
    out: &mut PacketWriter,
) -> CommandResult {
    let index = parse_hex_u32(args)? as usize;
    let process = general_process(state, table)?;
    match index {
        0..=14 => out.hex32_le(process.cpu.regs[index]),
        REG_CPSR => out.hex32_le(process.cpu.cpsr),
        _ => out.str(REGISTER_UNAVAILABLE),
    };
    Ok(Reply::Packet)
}

fn write_register(
    state: &mut SessionState,
    table: &mut ProcessTable,
    args: &str,
    out: &mut PacketWriter,
) -> CommandResult {
    let (index, value) = args.split_once('=').ok_or(BAD_ARGS)?;
    let index = parse_hex_u32(index)? as usize;
    let bytes: [u8; 4] = decode_hex(value.as_bytes())
        .and_then(|b| b.try_into().ok())
        .ok_or(BAD_ARGS)?;
    let value = u32::from_le_bytes(bytes);
    let process = general_process(state, table)?;
    match index {
        0..=14 => process.cpu.regs[index] = value,
        REG_CPSR => process.cpu.cpsr = value,
        _ => {
            return Err(CommandError::new(
                Errno::EINVAL,
                "register not writable",
            ))
        }
    }
    out.str("OK");
    Ok(Reply::Packet)
}

/// `D` detaches from everything, `D;<pid>` from one process.
fn detach(
    _state: &mut SessionState,
    table: &mut ProcessTable,
    args: &str,
    out: &mut PacketWriter,
) -> CommandResult {
    match args.strip_prefix(';') {
        Some(pid) => {
            let pid = parse_hex_u32(pid)?;
            table.find_mut(pid).ok_or(NO_PROCESS)?.dbgstop = DebugStop::None;
        }
        None => {
            for process in table.iter_mut() {
                process.dbgstop = DebugStop::None;
            }
        }
    }
    out.str("OK");
    Ok(Reply::Packet)
}

fn thread_alive(
    _state: &mut SessionState,
    table: &mut ProcessTable,
    args: &str,
    out: &mut PacketWriter,
) -> CommandResult {
    let alive = match parse_thread(args, table)? {
        Target::All => table.highest_alive_pid().is_some(),
        Target::Pid(pid) => table.find(pid).is_some_and(Process::is_alive),
    };
    if !alive {
        return Err(NO_PROCESS);
    }
    out.str("OK");
    Ok(Reply::Packet)
}

fn stop_reason(
    state: &mut SessionState,
    table: &mut ProcessTable,
    _args: &str,
    out: &mut PacketWriter,
) -> CommandResult {
    let stopped = table
        .iter()
        .find(|p| p.is_alive() && p.dbgstop.is_stopped())
        .map(|p| (p.pid, signal_for(p.dbgstop)));
    let reply = stopped.or_else(|| general_pid(state, table).map(|pid| (pid, SIGTRAP)));
    match reply {
        Some((pid, signal)) => {
            out.str("T")
                .hex8(signal)
                .str("thread:")
                .thread_id(pid)
                .str(";");
        }
        None => {
            out.str("W00");
        }
    }
    Ok(Reply::Packet)
}

fn current_thread(
    state: &mut SessionState,
    table: &mut ProcessTable,
    args: &str,
    out: &mut PacketWriter,
) -> CommandResult {
    if !args.is_empty() {
        // Some other `qC...` query.
        return Ok(Reply::Packet);
    }
    let pid = general_pid(state, table).ok_or(NO_PROCESS)?;
    out.str("QC").thread_id(pid);
    Ok(Reply::Packet)
}

fn thread_info_first(
    state: &mut SessionState,
    table: &mut ProcessTable,
    args: &str,
    out: &mut PacketWriter,
) -> CommandResult {
    state.thread_list = table.alive_pids();
    state.thread_cursor = 0;
    thread_info_next(state, table, args, out)
}

fn thread_info_next(
    state: &mut SessionState,
    _table: &mut ProcessTable,
    _args: &str,
    out: &mut PacketWriter,
) -> CommandResult {
    match state.thread_list.get(state.thread_cursor) {
        Some(&pid) => {
            state.thread_cursor += 1;
            out.str("m").thread_id(pid);
        }
        None => {
            out.str("l");
        }
    }
    Ok(Reply::Packet)
}

fn attached(
    _state: &mut SessionState,
    _table: &mut ProcessTable,
    _args: &str,
    out: &mut PacketWriter,
) -> CommandResult {
    out.str("1");
    Ok(Reply::Packet)
}

fn thread_extra_info(
    _state: &mut SessionState,
    table: &mut ProcessTable,
    args: &str,
    out: &mut PacketWriter,
) -> CommandResult {
    let Target::Pid(pid) = parse_thread(args, table)? else {
        return Err(BAD_ARGS);
    };
    let process = table.find(pid).ok_or(NO_PROCESS)?;
    let text = format!(
        "pid {} size {:#x} paused {} dbgstop {:?}",
        process.pid,
        process.mem_size(),
        process.paused,
        process.dbgstop
    );
    out.hex_bytes(text.as_bytes());
    Ok(Reply::Packet)
}

/// `monitor <cmd>`, hex encoded.
fn monitor(
    state: &mut SessionState,
    table: &mut ProcessTable,
    args: &str,
    out: &mut PacketWriter,
) -> CommandResult {
    let command = decode_hex(args.as_bytes())
        .and_then(|b| String::from_utf8(b).ok())
        .ok_or(BAD_ARGS)?;
    match command.trim() {
        "prep" => {
            table.reset();
            table
                .find_mut(INIT_PID)
                .ok_or(NO_PROCESS)?
                .resize_memory(PREP_MEM_SIZE)
                .map_err(|errno| CommandError::new(errno, "cannot resize init memory"))?;
            state.general = None;
            state.cont = None;
            state.thread_list.clear();
            state.thread_cursor = 0;
            info!("monitor prep: process table reset");
            out.str("OK");
            Ok(Reply::Packet)
        }
        _ => Err(CommandError::new(Errno::EINVAL, "unknown monitor command")),
    }
}
