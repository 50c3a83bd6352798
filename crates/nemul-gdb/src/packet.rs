//! RSP packet framing.
//!
//! Client packets are `$<payload>#<hh>` where `hh` is the modulo-256 sum of
//! the payload bytes. Outside a packet the client may send `+`/`-`
//! acknowledgements (ignored) and a bare `0x03` to interrupt the target.
//!
//! Server packets use the same framing. Payload bytes `$`, `#`, `}` and `*`
//! are escaped as `}` followed by the byte XOR `0x20`; the checksum covers
//! the bytes as transmitted.

/// Largest payload accepted from the client. Advertised as `PacketSize`.
pub const MAX_PACKET_SIZE: usize = 0x1000;

/// Ctrl-C.
pub const INTERRUPT: u8 = 0x03;

const ESCAPE: u8 = b'}';

pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketEvent {
    /// A complete packet with a valid checksum. Acknowledge with `+`.
    Packet(Vec<u8>),
    /// Bad checksum or oversize payload. Acknowledge with `-`.
    Rejected,
    Interrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    Idle,
    Payload,
    Checksum1,
    Checksum2(u8),
}

/// Incremental decoder for the client byte stream.
#[derive(Debug, Clone)]
pub struct PacketReader {
    state: ReaderState,
    buf: Vec<u8>,
    overflow: bool,
}

impl Default for PacketReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketReader {
    pub fn new() -> Self {
        Self {
            state: ReaderState::Idle,
            buf: Vec::new(),
            overflow: false,
        }
    }

    /// Decode a chunk of received bytes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<PacketEvent> {
        chunk.iter().filter_map(|&b| self.push_byte(b)).collect()
    }

    pub fn push_byte(&mut self, byte: u8) -> Option<PacketEvent> {
        // Binary packets are not supported, so 0x03 is never payload.
        if byte == INTERRUPT {
            return Some(PacketEvent::Interrupt);
        }
        if byte == b'$' {
            self.buf.clear();
            self.overflow = false;
            self.state = ReaderState::Payload;
            return None;
        }

        match self.state {
            ReaderState::Idle => None,
            ReaderState::Payload => {
                if byte == b'#' {
                    self.state = ReaderState::Checksum1;
                } else if self.buf.len() < MAX_PACKET_SIZE {
                    self.buf.push(byte);
                } else {
                    self.overflow = true;
                }
                None
            }
            ReaderState::Checksum1 => match hex_value(byte) {
                Some(hi) => {
                    self.state = ReaderState::Checksum2(hi);
                    None
                }
                None => self.reject(),
            },
            ReaderState::Checksum2(hi) => {
                let Some(lo) = hex_value(byte) else {
                    return self.reject();
                };
                if self.overflow || checksum(&self.buf) != (hi << 4 | lo) {
                    return self.reject();
                }
                self.state = ReaderState::Idle;
                Some(PacketEvent::Packet(std::mem::take(&mut self.buf)))
            }
        }
    }

    fn reject(&mut self) -> Option<PacketEvent> {
        self.state = ReaderState::Idle;
        self.buf.clear();
        self.overflow = false;
        Some(PacketEvent::Rejected)
    }
}

/// Builder for one outgoing packet.
#[derive(Debug, Clone)]
pub struct PacketWriter {
    buf: Vec<u8>,
    sum: u8,
}

impl Default for PacketWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketWriter {
    pub fn new() -> Self {
        Self {
            buf: vec![b'$'],
            sum: 0,
        }
    }

    /// Whether nothing has been written after the leading `$`.
    pub fn is_empty(&self) -> bool {
        self.buf.len() == 1
    }

    pub fn clear(&mut self) {
        self.buf.truncate(1);
        self.sum = 0;
    }

    fn emit(&mut self, byte: u8) {
        self.buf.push(byte);
        self.sum = self.sum.wrapping_add(byte);
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        for &b in bytes {
            if matches!(b, b'$' | b'#' | b'}' | b'*') {
                self.emit(ESCAPE);
                self.emit(b ^ 0x20);
            } else {
                self.emit(b);
            }
        }
        self
    }

    pub fn str(&mut self, s: &str) -> &mut Self {
        self.raw(s.as_bytes())
    }

    pub fn hex8(&mut self, val: u8) -> &mut Self {
        self.emit(HEX_DIGITS[usize::from(val >> 4)]);
        self.emit(HEX_DIGITS[usize::from(val & 0xF)]);
        self
    }

    /// Eight digits, most significant first.
    pub fn hex32_be(&mut self, val: u32) -> &mut Self {
        for b in val.to_be_bytes() {
            self.hex8(b);
        }
        self
    }

    /// Eight digits in target (little-endian) byte order, as GDB expects
    /// register contents.
    pub fn hex32_le(&mut self, val: u32) -> &mut Self {
        for b in val.to_le_bytes() {
            self.hex8(b);
        }
        self
    }

    pub fn hex_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        for &b in bytes {
            self.hex8(b);
        }
        self
    }

    /// Multiprocess thread id `p<pid>.<pid>`; every process has a single
    /// thread whose id equals the pid.
    pub fn thread_id(&mut self, pid: u32) -> &mut Self {
        self.str(&format!("p{pid:x}.{pid:x}"))
    }

    /// Terminate the packet with `#hh` and return the wire bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let sum = self.sum;
        self.buf.push(b'#');
        self.buf.push(HEX_DIGITS[usize::from(sum >> 4)]);
        self.buf.push(HEX_DIGITS[usize::from(sum & 0xF)]);
        self.buf
    }
}

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

pub fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Decode a hex string into bytes. Odd lengths and non-hex digits fail.
pub fn decode_hex(s: &[u8]) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    s.chunks_exact(2)
        .map(|pair| Some(hex_value(pair[0])? << 4 | hex_value(pair[1])?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_known_packets() {
        let mut w = PacketWriter::new();
        w.str("OK");
        assert_eq!(w.finish(), b"$OK#9a");

        assert_eq!(PacketWriter::new().finish(), b"$#00");
    }

    #[test]
    fn escapes_reserved_bytes() {
        let mut w = PacketWriter::new();
        w.raw(b"a#b");
        // '#' ^ 0x20 == 0x03
        assert_eq!(w.finish(), b"$a}\x03b#43");
    }

    #[test]
    fn hex_helpers() {
        let mut w = PacketWriter::new();
        w.hex32_be(0x1234_ABCD).hex32_le(0x1234_ABCD).hex8(5);
        let out = w.finish();
        assert_eq!(&out[1..out.len() - 3], b"1234abcdcdab341205");

        let mut w = PacketWriter::new();
        w.thread_id(0x11);
        let out = w.finish();
        assert_eq!(&out[1..out.len() - 3], b"p11.11");
    }

    #[test]
    fn decodes_hex_case_insensitively() {
        assert_eq!(decode_hex(b"0aFf"), Some(vec![0x0A, 0xFF]));
        assert_eq!(decode_hex(b"abc"), None);
        assert_eq!(decode_hex(b"zz"), None);
    }

    #[test]
    fn dollar_resynchronizes() {
        let mut r = PacketReader::new();
        let events = r.push(b"$garbage$OK#9a");
        assert_eq!(events, vec![PacketEvent::Packet(b"OK".to_vec())]);
    }

    #[test]
    fn interrupt_mid_packet_keeps_accumulating() {
        let mut r = PacketReader::new();
        let events = r.push(b"$O\x03K#9a");
        assert_eq!(
            events,
            vec![PacketEvent::Interrupt, PacketEvent::Packet(b"OK".to_vec())]
        );
    }

    #[test]
    fn acks_between_packets_are_ignored() {
        let mut r = PacketReader::new();
        let events = r.push(b"+-+$OK#9A+");
        assert_eq!(events, vec![PacketEvent::Packet(b"OK".to_vec())]);
    }

    #[test]
    fn oversize_payload_is_rejected() {
        let mut r = PacketReader::new();
        let mut bytes = vec![b'$'];
        bytes.extend(std::iter::repeat(b'a').take(MAX_PACKET_SIZE + 1));
        bytes.extend_from_slice(b"#00");
        assert_eq!(r.push(&bytes), vec![PacketEvent::Rejected]);
    }
}
