#![cfg(not(target_arch = "wasm32"))]

use nemul_gdb::packet::{PacketEvent, PacketReader, PacketWriter};
use nemul_gdb::Session;
use nemul_vm::ProcessTable;
use proptest::prelude::*;

/// Printable payload bytes that need no escaping and are not framing bytes.
fn payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        (0x20u8..0x7F).prop_filter("framing byte", |b| !matches!(*b, b'$' | b'#' | b'}' | b'*')),
        0..256,
    )
}

proptest! {
    #[test]
    fn framed_payload_decodes_intact(payload in payload()) {
        let mut w = PacketWriter::new();
        w.raw(&payload);
        let mut r = PacketReader::new();
        prop_assert_eq!(r.push(&w.finish()), vec![PacketEvent::Packet(payload)]);
    }

    #[test]
    fn corrupted_byte_is_nacked(
        payload in payload().prop_filter("non-empty", |p| !p.is_empty()),
        index in any::<prop::sample::Index>(),
        replacement in 0x20u8..0x7F,
    ) {
        let mut w = PacketWriter::new();
        w.raw(&payload);
        let mut bytes = w.finish();

        let at = 1 + index.index(payload.len());
        prop_assume!(!matches!(replacement, b'$' | b'#' | b'}' | b'*'));
        prop_assume!(bytes[at] != replacement);
        bytes[at] = replacement;

        let mut table = ProcessTable::new();
        let mut session = Session::new();
        prop_assert_eq!(session.feed(&bytes, &mut table), 0);
        prop_assert_eq!(session.take_output(), b"-".to_vec());
    }
}
