//! Coprocessor link framing
//!
//! The bridge MCU has no network stack of its own; datagrams and push events
//! are handed to a network coprocessor over UART. Frame format:
//!
//! ```text
//! ┌───────┬──────────┬──────┬─────────────┬────────────┐
//! │ START │ LENGTH   │ TYPE │ PAYLOAD     │ CHECKSUM   │
//! │ 1B    │ 2B (LE)  │ 1B   │ 0–512B      │ 2B (LE)    │
//! └───────┴──────────┴──────┴─────────────┴────────────┘
//! ```
//!
//! CHECKSUM is Fletcher-16 over LENGTH, TYPE and PAYLOAD.

use core::net::{Ipv4Addr, SocketAddrV4};

use heapless::Vec;

/// Frame synchronization byte
pub const LINK_START: u8 = 0xA5;

/// Maximum payload size in bytes
pub const MAX_LINK_PAYLOAD: usize = 512;

/// Bytes added around the payload (START + LENGTH + TYPE + CHECKSUM)
pub const LINK_OVERHEAD: usize = 1 + 2 + 1 + 2;

/// Maximum complete frame size
pub const MAX_LINK_FRAME: usize = MAX_LINK_PAYLOAD + LINK_OVERHEAD;

/// Send a datagram: `[ip:4][port:2 LE][data...]`
pub const MSG_DATAGRAM: u8 = 0x30;

/// Send a push event: `[name_len:1][name...][data...]`
pub const MSG_PUSH_EVENT: u8 = 0x31;

/// Coprocessor interface report: `[kind:1][ip:4][netmask:4]` per interface
pub const MSG_INTERFACES: u8 = 0x40;

/// A push-stream client connected on the coprocessor (no payload)
pub const MSG_SUBSCRIBE: u8 = 0x41;

/// Bytes per entry of an interface report
pub const INTERFACE_ENTRY_LEN: usize = 9;

/// Errors that can occur during link framing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// Payload exceeds maximum allowed size
    PayloadTooLarge,
    /// Output buffer too small for the encoded frame
    BufferTooSmall,
    /// Checksum mismatch
    InvalidChecksum,
    /// Declared length exceeds the maximum payload
    InvalidLength,
    /// Payload does not match its message type
    InvalidMessage,
}

/// Fletcher-16 over a byte slice
pub fn fletcher16(bytes: &[u8]) -> u16 {
    let (mut sum1, mut sum2) = (0u16, 0u16);
    for &byte in bytes {
        sum1 = (sum1 + u16::from(byte)) % 255;
        sum2 = (sum2 + sum1) % 255;
    }
    (sum2 << 8) | sum1
}

/// Messages carried over the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMessage<'a> {
    /// One connectionless datagram to `dst`
    Datagram { dst: SocketAddrV4, data: &'a [u8] },
    /// One named event for every push-stream subscriber
    PushEvent { event: &'a str, data: &'a str },
    /// Active network interfaces, raw `INTERFACE_ENTRY_LEN`-byte entries
    Interfaces { entries: &'a [u8] },
    /// New push-stream subscriber waiting for the current frame
    Subscribe,
}

/// One entry of an interface report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceEntry {
    /// 0 = station, 1 = access point, anything else = other
    pub kind: u8,
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

impl InterfaceEntry {
    pub fn to_bytes(&self) -> [u8; INTERFACE_ENTRY_LEN] {
        let mut out = [0u8; INTERFACE_ENTRY_LEN];
        out[0] = self.kind;
        out[1..5].copy_from_slice(&self.ip.octets());
        out[5..9].copy_from_slice(&self.netmask.octets());
        out
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            kind: bytes[0],
            ip: Ipv4Addr::new(bytes[1], bytes[2], bytes[3], bytes[4]),
            netmask: Ipv4Addr::new(bytes[5], bytes[6], bytes[7], bytes[8]),
        }
    }
}

impl<'a> LinkMessage<'a> {
    fn msg_type(&self) -> u8 {
        match self {
            LinkMessage::Datagram { .. } => MSG_DATAGRAM,
            LinkMessage::PushEvent { .. } => MSG_PUSH_EVENT,
            LinkMessage::Interfaces { .. } => MSG_INTERFACES,
            LinkMessage::Subscribe => MSG_SUBSCRIBE,
        }
    }

    /// Entries of an interface report; empty for other messages
    pub fn interfaces(&self) -> impl Iterator<Item = InterfaceEntry> + 'a {
        let entries: &'a [u8] = match self {
            LinkMessage::Interfaces { entries } => entries,
            _ => &[],
        };
        entries
            .chunks_exact(INTERFACE_ENTRY_LEN)
            .map(InterfaceEntry::from_bytes)
    }

    fn payload_len(&self) -> usize {
        match self {
            LinkMessage::Datagram { data, .. } => 4 + 2 + data.len(),
            LinkMessage::PushEvent { event, data } => 1 + event.len() + data.len(),
            LinkMessage::Interfaces { entries } => entries.len(),
            LinkMessage::Subscribe => 0,
        }
    }

    /// Encode this message as a complete frame into `buffer`
    ///
    /// Returns the number of bytes written.
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, LinkError> {
        let payload_len = self.payload_len();
        if payload_len > MAX_LINK_PAYLOAD {
            return Err(LinkError::PayloadTooLarge);
        }
        let frame_len = payload_len + LINK_OVERHEAD;
        let out = buffer
            .get_mut(..frame_len)
            .ok_or(LinkError::BufferTooSmall)?;

        let len_bytes = (payload_len as u16).to_le_bytes();
        out[0] = LINK_START;
        out[1] = len_bytes[0];
        out[2] = len_bytes[1];
        out[3] = self.msg_type();

        let payload = &mut out[4..4 + payload_len];
        match self {
            LinkMessage::Datagram { dst, data } => {
                payload[..4].copy_from_slice(&dst.ip().octets());
                payload[4..6].copy_from_slice(&dst.port().to_le_bytes());
                payload[6..].copy_from_slice(data);
            }
            LinkMessage::PushEvent { event, data } => {
                if event.len() > u8::MAX as usize {
                    return Err(LinkError::InvalidMessage);
                }
                payload[0] = event.len() as u8;
                payload[1..1 + event.len()].copy_from_slice(event.as_bytes());
                payload[1 + event.len()..].copy_from_slice(data.as_bytes());
            }
            LinkMessage::Interfaces { entries } => {
                if entries.len() % INTERFACE_ENTRY_LEN != 0 {
                    return Err(LinkError::InvalidMessage);
                }
                payload.copy_from_slice(entries);
            }
            LinkMessage::Subscribe => {}
        }

        let checksum = fletcher16(&out[1..4 + payload_len]).to_le_bytes();
        out[4 + payload_len] = checksum[0];
        out[5 + payload_len] = checksum[1];

        Ok(frame_len)
    }

    /// Interpret a received frame
    pub fn parse(frame: &'a LinkFrame) -> Result<Self, LinkError> {
        let payload = frame.payload.as_slice();
        match frame.msg_type {
            MSG_DATAGRAM => {
                if payload.len() < 6 {
                    return Err(LinkError::InvalidMessage);
                }
                let ip = Ipv4Addr::new(payload[0], payload[1], payload[2], payload[3]);
                let port = u16::from_le_bytes([payload[4], payload[5]]);
                Ok(LinkMessage::Datagram {
                    dst: SocketAddrV4::new(ip, port),
                    data: &payload[6..],
                })
            }
            MSG_PUSH_EVENT => {
                let (&name_len, rest) = payload.split_first().ok_or(LinkError::InvalidMessage)?;
                let name_len = name_len as usize;
                if rest.len() < name_len {
                    return Err(LinkError::InvalidMessage);
                }
                let (event, data) = rest.split_at(name_len);
                Ok(LinkMessage::PushEvent {
                    event: core::str::from_utf8(event).map_err(|_| LinkError::InvalidMessage)?,
                    data: core::str::from_utf8(data).map_err(|_| LinkError::InvalidMessage)?,
                })
            }
            MSG_INTERFACES if payload.len() % INTERFACE_ENTRY_LEN == 0 => {
                Ok(LinkMessage::Interfaces { entries: payload })
            }
            MSG_SUBSCRIBE => Ok(LinkMessage::Subscribe),
            _ => Err(LinkError::InvalidMessage),
        }
    }
}

/// A received frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFrame {
    /// Message type identifier
    pub msg_type: u8,
    /// Payload data
    pub payload: Vec<u8, MAX_LINK_PAYLOAD>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Start,
    LengthLow,
    LengthHigh,
    Type,
    Payload,
    ChecksumLow,
    ChecksumHigh,
}

/// Byte-at-a-time link frame parser
#[derive(Debug, Clone)]
pub struct LinkParser {
    state: ParseState,
    length: u16,
    msg_type: u8,
    checksum_low: u8,
    payload: Vec<u8, MAX_LINK_PAYLOAD>,
}

impl Default for LinkParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkParser {
    /// Create a new parser waiting for a START byte
    pub fn new() -> Self {
        Self {
            state: ParseState::Start,
            length: 0,
            msg_type: 0,
            checksum_low: 0,
            payload: Vec::new(),
        }
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        self.state = ParseState::Start;
        self.length = 0;
        self.msg_type = 0;
        self.checksum_low = 0;
        self.payload.clear();
    }

    /// Feed one byte
    ///
    /// Returns `Ok(Some(frame))` once a complete, verified frame is parsed.
    pub fn feed(&mut self, byte: u8) -> Result<Option<LinkFrame>, LinkError> {
        match self.state {
            ParseState::Start => {
                if byte == LINK_START {
                    self.state = ParseState::LengthLow;
                }
                Ok(None)
            }
            ParseState::LengthLow => {
                self.length = u16::from(byte);
                self.state = ParseState::LengthHigh;
                Ok(None)
            }
            ParseState::LengthHigh => {
                self.length |= u16::from(byte) << 8;
                if self.length as usize > MAX_LINK_PAYLOAD {
                    self.reset();
                    return Err(LinkError::InvalidLength);
                }
                self.state = ParseState::Type;
                Ok(None)
            }
            ParseState::Type => {
                self.msg_type = byte;
                self.payload.clear();
                self.state = if self.length == 0 {
                    ParseState::ChecksumLow
                } else {
                    ParseState::Payload
                };
                Ok(None)
            }
            ParseState::Payload => {
                // Bounded by the length check above
                let _ = self.payload.push(byte);
                if self.payload.len() == self.length as usize {
                    self.state = ParseState::ChecksumLow;
                }
                Ok(None)
            }
            ParseState::ChecksumLow => {
                self.checksum_low = byte;
                self.state = ParseState::ChecksumHigh;
                Ok(None)
            }
            ParseState::ChecksumHigh => {
                let received = u16::from_le_bytes([self.checksum_low, byte]);
                let expected = self.expected_checksum();
                if received != expected {
                    self.reset();
                    return Err(LinkError::InvalidChecksum);
                }
                let frame = LinkFrame {
                    msg_type: self.msg_type,
                    payload: self.payload.clone(),
                };
                self.reset();
                Ok(Some(frame))
            }
        }
    }

    fn expected_checksum(&self) -> u16 {
        let mut header = [0u8; 3];
        header[..2].copy_from_slice(&self.length.to_le_bytes());
        header[2] = self.msg_type;
        let (mut sum1, mut sum2) = (0u16, 0u16);
        for &byte in header.iter().chain(self.payload.iter()) {
            sum1 = (sum1 + u16::from(byte)) % 255;
            sum2 = (sum2 + sum1) % 255;
        }
        (sum2 << 8) | sum1
    }
}
