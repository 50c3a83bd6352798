#![cfg(not(target_arch = "wasm32"))]

use std::io::{ErrorKind, Read, Write};
use std::net::{IpAddr, Ipv4Addr, TcpListener, TcpStream};
use std::time::Duration;

use nemul_gdb::packet::PacketWriter;
use nemul_gdb::{RspConfig, RspServer, MAX_GIVE_UPS};
use nemul_vm::{DebugStop, ProcessTable, StopObserver, INIT_PID};

fn ephemeral() -> RspConfig {
    RspConfig {
        enabled: true,
        bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
    }
}

fn frame(payload: &str) -> Vec<u8> {
    let mut w = PacketWriter::new();
    w.str(payload);
    w.finish()
}

/// Poll the server until the client has received `expected` in full.
fn pump_until(
    server: &mut RspServer,
    table: &mut ProcessTable,
    client: &mut TcpStream,
    expected: &[u8],
) -> Vec<u8> {
    let mut got = Vec::new();
    let mut buf = [0u8; 512];
    for _ in 0..500 {
        server.poll(table);
        match client.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => got.extend_from_slice(&buf[..n]),
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(err) => panic!("client read failed: {err}"),
        }
        if got.len() >= expected.len() {
            break;
        }
    }
    got
}

fn connect(server: &mut RspServer, table: &mut ProcessTable) -> TcpStream {
    server.poll(table);
    let addr = server.local_addr().expect("server should be listening");
    let client = TcpStream::connect(addr).unwrap();
    client
        .set_read_timeout(Some(Duration::from_millis(5)))
        .unwrap();
    for _ in 0..500 {
        server.poll(table);
        if server.is_connected() {
            return client;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    panic!("server never accepted the connection");
}

#[test]
fn answers_over_tcp() {
    let mut table = ProcessTable::new();
    let mut server = RspServer::new(ephemeral());
    let mut client = connect(&mut server, &mut table);

    client.write_all(&frame("qAttached")).unwrap();
    let mut expected = b"+".to_vec();
    expected.extend(frame("1"));
    let got = pump_until(&mut server, &mut table, &mut client, &expected);
    assert_eq!(got, expected);

    // Stops are pushed without a request.
    server.process_stopped(INIT_PID, DebugStop::Breakpoint);
    let got = pump_until(
        &mut server,
        &mut table,
        &mut client,
        b"$T05thread:p1.1;#a6",
    );
    assert_eq!(got, b"$T05thread:p1.1;#a6");
}

#[test]
fn disconnect_returns_to_listening() {
    let mut table = ProcessTable::new();
    let mut server = RspServer::new(ephemeral());
    let client = connect(&mut server, &mut table);
    drop(client);

    poll_until_disconnected(&mut server, &mut table);
    assert!(!server.is_disabled());

    // The next poll binds again.
    server.poll(&mut table);
    assert!(server.local_addr().is_some());
}

fn poll_until_disconnected(server: &mut RspServer, table: &mut ProcessTable) {
    for _ in 0..500 {
        server.poll(table);
        if !server.is_connected() {
            return;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    panic!("server never noticed the disconnect");
}

#[test]
fn repeated_bind_failures_disable_the_server() {
    let taken = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let mut table = ProcessTable::new();
    let mut server = RspServer::new(RspConfig {
        port: taken.local_addr().unwrap().port(),
        ..ephemeral()
    });

    for _ in 1..MAX_GIVE_UPS {
        server.poll(&mut table);
        assert!(!server.is_disabled());
    }
    server.poll(&mut table);
    assert!(server.is_disabled());
    assert_eq!(server.local_addr(), None);

    // Freeing the port does not bring it back.
    drop(taken);
    server.poll(&mut table);
    assert!(server.is_disabled());
}

#[test]
fn sessions_that_exchange_packets_keep_the_server_alive() {
    let mut table = ProcessTable::new();
    let mut server = RspServer::new(ephemeral());

    for _ in 0..MAX_GIVE_UPS + 1 {
        let mut client = connect(&mut server, &mut table);
        // The packet and the end of stream land in the same read.
        client.write_all(&frame("qAttached")).unwrap();
        drop(client);
        poll_until_disconnected(&mut server, &mut table);
        assert!(!server.is_disabled());
    }
}

#[test]
fn disabled_server_never_binds() {
    let mut table = ProcessTable::new();
    let mut server = RspServer::new(RspConfig {
        enabled: false,
        ..ephemeral()
    });
    server.poll(&mut table);
    assert!(server.is_disabled());
    assert_eq!(server.local_addr(), None);

    // Stops are dropped while nobody is attached.
    server.process_stopped(INIT_PID, DebugStop::CtrlC);
}
