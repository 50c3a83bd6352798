//! Non-blocking TCP transport.
//!
//! The server never blocks the emulation loop. Each [`RspServer::poll`]
//! advances the transport one step: bind, accept, or service the connected
//! client (flush queued output, then drain whatever the socket has).
//! Transport failures drop the connection and start over from binding;
//! after [`MAX_GIVE_UPS`] consecutive failures the server disables itself.

use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};

use nemul_vm::{DebugStop, Pid, ProcessTable, StopObserver};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::session::Session;

pub const DEFAULT_PORT: u16 = 1234;

/// Consecutive transport failures tolerated before the server gives up.
pub const MAX_GIVE_UPS: u32 = 5;

const READ_CHUNK: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RspConfig {
    pub enabled: bool,
    pub bind: IpAddr,
    /// `0` picks an ephemeral port; see [`RspServer::local_addr`].
    pub port: u16,
}

impl Default for RspConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
        }
    }
}

impl RspConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

#[derive(Debug, Error)]
pub enum RspError {
    #[error("failed to listen on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to accept debugger connection")]
    Accept(#[source] io::Error),

    #[error("failed to write to debugger")]
    Write(#[source] io::Error),

    #[error("failed to read from debugger")]
    Read(#[source] io::Error),

    #[error("debugger disconnected")]
    Disconnected,
}

#[derive(Debug)]
enum Transport {
    Unbound,
    Listening(TcpListener),
    Connected(TcpStream),
}

#[derive(Debug)]
pub struct RspServer {
    config: RspConfig,
    transport: Transport,
    session: Session,
    give_ups: u32,
    disabled: bool,
}

impl RspServer {
    pub fn new(config: RspConfig) -> Self {
        Self {
            config,
            transport: Transport::Unbound,
            session: Session::new(),
            give_ups: 0,
            disabled: !config.enabled,
        }
    }

    pub fn config(&self) -> &RspConfig {
        &self.config
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.transport, Transport::Connected(_))
    }

    /// Address of the listening or connected socket.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.transport {
            Transport::Unbound => None,
            Transport::Listening(listener) => listener.local_addr().ok(),
            Transport::Connected(stream) => stream.local_addr().ok(),
        }
    }

    /// Advance the transport one step. Never blocks.
    pub fn poll(&mut self, table: &mut ProcessTable) {
        if self.disabled {
            return;
        }
        if let Err(err) = self.advance(table) {
            self.give_up(err);
        }
    }

    fn advance(&mut self, table: &mut ProcessTable) -> Result<(), RspError> {
        let next = match &mut self.transport {
            Transport::Unbound => {
                let addr = self.config.addr();
                let listener = TcpListener::bind(addr)
                    .and_then(|l| l.set_nonblocking(true).map(|()| l))
                    .map_err(|source| RspError::Bind { addr, source })?;
                info!(addr = %listener.local_addr().unwrap_or(addr), "rsp listening");
                Transport::Listening(listener)
            }
            Transport::Listening(listener) => match listener.accept() {
                Ok((stream, peer)) => {
                    stream.set_nonblocking(true).map_err(RspError::Accept)?;
                    // Replies are small and latency bound.
                    stream.set_nodelay(true).map_err(RspError::Accept)?;
                    info!(%peer, "debugger attached");
                    self.session = Session::new();
                    Transport::Connected(stream)
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(err) => return Err(RspError::Accept(err)),
            },
            Transport::Connected(stream) => {
                flush(stream, &mut self.session)?;
                let (packets, failure) = receive(stream, &mut self.session, table);
                // A session that exchanged packets counts as healthy even if
                // the same read then hit end of stream.
                if packets > 0 {
                    self.give_ups = 0;
                }
                if let Some(err) = failure {
                    return Err(err);
                }
                flush(stream, &mut self.session)?;
                return Ok(());
            }
        };
        self.transport = next;
        Ok(())
    }

    fn give_up(&mut self, err: RspError) {
        let cause = std::error::Error::source(&err).map(ToString::to_string);
        warn!(error = %err, cause = cause.as_deref(), "rsp transport reset");
        self.transport = Transport::Unbound;
        self.session = Session::new();
        self.give_ups += 1;
        if self.give_ups >= MAX_GIVE_UPS {
            warn!(attempts = self.give_ups, "rsp server disabled");
            self.disabled = true;
        }
    }
}

impl StopObserver for RspServer {
    fn process_stopped(&mut self, pid: Pid, reason: DebugStop) {
        if self.is_connected() {
            debug!(pid, ?reason, "reporting stop to debugger");
            self.session.notify_stop(pid, reason);
        }
    }
}

fn flush(stream: &mut TcpStream, session: &mut Session) -> Result<(), RspError> {
    while !session.pending().is_empty() {
        match stream.write(session.pending()) {
            Ok(0) => return Err(RspError::Disconnected),
            Ok(n) => session.consume(n),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(RspError::Write(err)),
        }
    }
    Ok(())
}

/// Drain the socket into `session`. Returns the number of packets handled
/// alongside the error that ended the read, if any.
fn receive(
    stream: &mut TcpStream,
    session: &mut Session,
    table: &mut ProcessTable,
) -> (usize, Option<RspError>) {
    let mut buf = [0u8; READ_CHUNK];
    let mut packets = 0;
    loop {
        match stream.read(&mut buf) {
            Ok(0) => return (packets, Some(RspError::Disconnected)),
            Ok(n) => packets += session.feed(&buf[..n], table),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return (packets, None),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return (packets, Some(RspError::Read(err))),
        }
    }
}
