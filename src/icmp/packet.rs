use byteorder::{BigEndian, NativeEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

pub const ICMP_ECHO_REQUEST: u8 = 8;

/// Offset of the ICMP header inside the received datagram (fixed IPv4 header).
pub const IP_HEADER_LEN: usize = 20;

/// Smallest datagram that can hold the IP header, the ICMP echo header and
/// the echoed 8-byte send timestamp.
pub const MIN_REPLY_LEN: usize = 36;

/// RFC 1071 internet checksum over an arbitrary byte buffer.
///
/// Words are paired little-endian (byte[2i] low, byte[2i+1] high), summed
/// into a 32-bit accumulator, a trailing odd byte counts as a standalone low
/// byte, carries are folded until the sum fits in 16 bits, and the one's
/// complement is byte-swapped so the caller can insert it in network order.
pub fn compute_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut words = data.chunks_exact(2);
    for pair in &mut words {
        sum += u16::from_le_bytes([pair[0], pair[1]]) as u32;
    }
    if let [last] = words.remainder() {
        sum += *last as u32;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    (!(sum as u16)).swap_bytes()
}

/// An outgoing ICMP Echo Request: header, send timestamp, caller payload.
/// Built fresh for every attempt and immutable once built.
#[derive(Debug, Clone)]
pub struct EchoRequest {
    pub identifier: u16,
    pub sequence: u16,
    pub timestamp: f64,
    pub payload: Vec<u8>,
}

impl EchoRequest {
    pub fn new(identifier: u16, sequence: u16, payload: Vec<u8>) -> Self {
        Self {
            identifier,
            sequence,
            timestamp: crate::utils::unix_now(),
            payload,
        }
    }

    fn encode(&self, checksum: u16) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(16 + self.payload.len());
        bytes.write_u8(ICMP_ECHO_REQUEST).unwrap();
        bytes.write_u8(0).unwrap();
        bytes.write_u16::<BigEndian>(checksum).unwrap();
        bytes.write_u16::<BigEndian>(self.identifier).unwrap();
        bytes.write_u16::<BigEndian>(self.sequence).unwrap();
        // The remote stack echoes the timestamp back verbatim, so native
        // byte order round-trips.
        bytes.write_f64::<NativeEndian>(self.timestamp).unwrap();
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Serialize twice: once with a zero checksum to feed the checksum
    /// engine, once more with the computed value in place.
    pub fn to_bytes(&self) -> Vec<u8> {
        let checksum = compute_checksum(&self.encode(0));
        self.encode(checksum)
    }
}

/// An ICMP Echo Reply header parsed out of a raw datagram. Ephemeral;
/// dropped as soon as correlation has run.
#[derive(Debug, Clone)]
pub struct EchoReply {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
    pub identifier: u16,
    pub sequence: u16,
    pub timestamp: f64,
}

impl EchoReply {
    /// Parse a received IP datagram. Returns `None` when the datagram is too
    /// short to carry an echo header plus timestamp; callers treat that the
    /// same as an irrelevant reply.
    pub fn from_datagram(data: &[u8]) -> Option<Self> {
        if data.len() < MIN_REPLY_LEN {
            return None;
        }
        let mut cursor = Cursor::new(&data[IP_HEADER_LEN..]);
        let icmp_type = cursor.read_u8().ok()?;
        let code = cursor.read_u8().ok()?;
        let checksum = cursor.read_u16::<BigEndian>().ok()?;
        let identifier = cursor.read_u16::<BigEndian>().ok()?;
        let sequence = cursor.read_u16::<BigEndian>().ok()?;
        let timestamp = cursor.read_f64::<NativeEndian>().ok()?;
        Some(Self {
            icmp_type,
            code,
            checksum,
            identifier,
            sequence,
            timestamp,
        })
    }

    /// The identifier/sequence pair is the sole demultiplexing key.
    pub fn matches(&self, identifier: u16, sequence: u16) -> bool {
        self.identifier == identifier && self.sequence == sequence
    }
}
