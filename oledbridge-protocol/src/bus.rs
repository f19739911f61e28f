//! Character-controller bus grammar
//!
//! Every logical operation on the bus is exactly two bytes:
//! ```text
//! ┌─────────┬─────────┐
//! │ CONTROL │ PAYLOAD │
//! └─────────┴─────────┘
//! ```
//! - CONTROL `0x80`: payload is a controller command
//! - CONTROL `0x40`: payload is a character written to display memory
//!
//! A read request returns a single status byte holding the current linear
//! address. The same grammar is used inbound (slave role) and outbound
//! (master role, driving a physical panel).

/// Control byte routing the payload to command processing
pub const CTRL_COMMAND: u8 = 0x80;

/// Control byte routing the payload to display memory
pub const CTRL_DATA: u8 = 0x40;

/// Linear addresses are 7 bits wide
pub const ADDRESS_MASK: u8 = 0x7F;

/// First printable character
pub const PRINTABLE_MIN: u8 = 0x20;

/// Last printable character
pub const PRINTABLE_MAX: u8 = 0x7E;

/// Command opcodes of the emulated controller
pub mod opcode {
    pub const CLEAR: u8 = 0x01;
    pub const HOME: u8 = 0x02;
    pub const ENTRY_MODE: u8 = 0x04;
    pub const DISPLAY_CONTROL: u8 = 0x08;
    pub const CURSOR_SHIFT: u8 = 0x10;
    pub const FUNCTION_SET: u8 = 0x20;
    pub const SET_CGRAM_ADDR: u8 = 0x40;
    pub const SET_DDRAM_ADDR: u8 = 0x80;

    /// Mask selecting the display-control opcode bits
    pub const DISPLAY_CONTROL_MASK: u8 = 0xF8;

    pub const BIT_DISPLAY_ON: u8 = 0x04;
    pub const BIT_CURSOR_ON: u8 = 0x02;
    pub const BIT_BLINK_ON: u8 = 0x01;

    /// Entry mode: increment address after each write
    pub const BIT_ENTRY_INCREMENT: u8 = 0x02;
}

/// Check whether a byte is printable ASCII (0x20-0x7E)
#[inline]
pub const fn is_printable(byte: u8) -> bool {
    byte >= PRINTABLE_MIN && byte <= PRINTABLE_MAX
}

/// Coerce a byte into the printable range
///
/// Anything outside 0x20-0x7E becomes a space.
#[inline]
pub const fn sanitize(byte: u8) -> u8 {
    if is_printable(byte) {
        byte
    } else {
        b' '
    }
}

/// Status byte returned on a read request
#[inline]
pub const fn status_byte(address: u8) -> u8 {
    address & ADDRESS_MASK
}

/// Where a pair's payload is routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Control {
    /// Payload is a command opcode
    Command,
    /// Payload is a character
    Data,
}

impl Control {
    /// Parse a control byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            CTRL_COMMAND => Some(Control::Command),
            CTRL_DATA => Some(Control::Data),
            _ => None,
        }
    }

    /// Convert to wire format byte
    pub fn to_byte(self) -> u8 {
        match self {
            Control::Command => CTRL_COMMAND,
            Control::Data => CTRL_DATA,
        }
    }
}

/// Presentation flags carried by the display-control command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplayFlags {
    pub display_on: bool,
    pub cursor_on: bool,
    pub blink_on: bool,
}

impl DisplayFlags {
    /// Display on, cursor and blink off
    pub const ON: Self = Self {
        display_on: true,
        cursor_on: false,
        blink_on: false,
    };

    /// Decode the low three bits of a display-control opcode
    pub fn from_bits(bits: u8) -> Self {
        Self {
            display_on: bits & opcode::BIT_DISPLAY_ON != 0,
            cursor_on: bits & opcode::BIT_CURSOR_ON != 0,
            blink_on: bits & opcode::BIT_BLINK_ON != 0,
        }
    }

    /// Encode as the low three bits of a display-control opcode
    pub fn to_bits(self) -> u8 {
        let mut bits = 0;
        if self.display_on {
            bits |= opcode::BIT_DISPLAY_ON;
        }
        if self.cursor_on {
            bits |= opcode::BIT_CURSOR_ON;
        }
        if self.blink_on {
            bits |= opcode::BIT_BLINK_ON;
        }
        bits
    }
}

/// A decoded command payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Blank all cells, cursor and address to (0,0)
    Clear,
    /// Cursor and address to (0,0), content untouched
    Home,
    /// Set the linear address (7 bits)
    SetAddress(u8),
    /// Set display/cursor/blink flags
    DisplayControl(DisplayFlags),
    /// Anything else; accepted without effect
    Other(u8),
}

impl Command {
    /// Decode a command payload
    ///
    /// Exact matches take precedence over masked matches, so `0x01` is
    /// always Clear and `0x02` always Home.
    pub fn decode(byte: u8) -> Self {
        if byte == opcode::CLEAR {
            Command::Clear
        } else if byte == opcode::HOME {
            Command::Home
        } else if byte & opcode::SET_DDRAM_ADDR != 0 {
            Command::SetAddress(byte & ADDRESS_MASK)
        } else if byte & opcode::DISPLAY_CONTROL_MASK == opcode::DISPLAY_CONTROL {
            Command::DisplayControl(DisplayFlags::from_bits(byte))
        } else {
            Command::Other(byte)
        }
    }

    /// Encode to the wire opcode
    pub fn encode(self) -> u8 {
        match self {
            Command::Clear => opcode::CLEAR,
            Command::Home => opcode::HOME,
            Command::SetAddress(addr) => opcode::SET_DDRAM_ADDR | (addr & ADDRESS_MASK),
            Command::DisplayControl(flags) => opcode::DISPLAY_CONTROL | flags.to_bits(),
            Command::Other(byte) => byte,
        }
    }
}

/// One (control, payload) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transaction {
    pub control: u8,
    pub payload: u8,
}

impl Transaction {
    /// Build a command pair
    pub fn command(command: Command) -> Self {
        Self {
            control: CTRL_COMMAND,
            payload: command.encode(),
        }
    }

    /// Build a raw command pair from an opcode byte
    pub fn raw_command(opcode: u8) -> Self {
        Self {
            control: CTRL_COMMAND,
            payload: opcode,
        }
    }

    /// Build a character pair
    pub fn data(byte: u8) -> Self {
        Self {
            control: CTRL_DATA,
            payload: byte,
        }
    }

    /// Routing of this pair, `None` for an unknown control byte
    pub fn kind(&self) -> Option<Control> {
        Control::from_byte(self.control)
    }

    /// Wire bytes
    pub fn to_bytes(self) -> [u8; 2] {
        [self.control, self.payload]
    }
}

/// Splits one bus transfer into pairs
///
/// A trailing unpaired byte is not yielded; it is available through
/// [`Pairs::stray`] so the caller can report and drop it.
pub struct Pairs<'a> {
    chunks: core::slice::ChunksExact<'a, u8>,
}

impl<'a> Pairs<'a> {
    /// Iterate over the pairs of a complete transfer
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            chunks: bytes.chunks_exact(2),
        }
    }

    /// The unpaired trailing byte of the transfer, if any
    pub fn stray(&self) -> Option<u8> {
        self.chunks.remainder().first().copied()
    }
}

impl Iterator for Pairs<'_> {
    type Item = Transaction;

    fn next(&mut self) -> Option<Self::Item> {
        match self.chunks.next()? {
            [control, payload] => Some(Transaction {
                control: *control,
                payload: *payload,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_from_byte() {
        assert_eq!(Control::from_byte(0x80), Some(Control::Command));
        assert_eq!(Control::from_byte(0x40), Some(Control::Data));
        assert_eq!(Control::from_byte(0x00), None);
        assert_eq!(Control::from_byte(0xC0), None);
    }

    #[test]
    fn test_decode_exact_commands() {
        assert_eq!(Command::decode(0x01), Command::Clear);
        assert_eq!(Command::decode(0x02), Command::Home);
    }

    #[test]
    fn test_decode_set_address_masks_high_bit() {
        assert_eq!(Command::decode(0x80), Command::SetAddress(0x00));
        assert_eq!(Command::decode(0x80 | 0x14), Command::SetAddress(0x14));
        assert_eq!(Command::decode(0xFF), Command::SetAddress(0x7F));
    }

    #[test]
    fn test_decode_display_control() {
        assert_eq!(
            Command::decode(0x0C),
            Command::DisplayControl(DisplayFlags::ON)
        );
        assert_eq!(
            Command::decode(0x0B),
            Command::DisplayControl(DisplayFlags {
                display_on: false,
                cursor_on: true,
                blink_on: true,
            })
        );
        assert_eq!(
            Command::decode(0x08),
            Command::DisplayControl(DisplayFlags::default())
        );
    }

    #[test]
    fn test_decode_other_commands() {
        // Entry mode, cursor shift, function set, CGRAM address
        for byte in [0x06, 0x10, 0x14, 0x28, 0x2A, 0x40, 0x79] {
            assert_eq!(Command::decode(byte), Command::Other(byte));
        }
        assert_eq!(Command::decode(0x00), Command::Other(0x00));
    }

    #[test]
    fn test_command_encode_matches_decode() {
        for byte in 0..=u8::MAX {
            assert_eq!(Command::decode(byte).encode(), byte);
        }
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize(b'A'), b'A');
        assert_eq!(sanitize(0x20), 0x20);
        assert_eq!(sanitize(0x7E), 0x7E);
        assert_eq!(sanitize(0x7F), b' ');
        assert_eq!(sanitize(0x1F), b' ');
        assert_eq!(sanitize(0x00), b' ');
        assert_eq!(sanitize(0xE0), b' ');
    }

    #[test]
    fn test_status_byte_masks_to_seven_bits() {
        assert_eq!(status_byte(0x14), 0x14);
        assert_eq!(status_byte(0xD4), 0x54);
    }

    #[test]
    fn test_pairs_even_transfer() {
        let bytes = [0x80, 0x01, 0x40, b'H', 0x40, b'I'];
        let mut pairs = Pairs::new(&bytes);
        assert_eq!(pairs.next(), Some(Transaction::command(Command::Clear)));
        assert_eq!(pairs.next(), Some(Transaction::data(b'H')));
        assert_eq!(pairs.next(), Some(Transaction::data(b'I')));
        assert_eq!(pairs.next(), None);
        assert_eq!(pairs.stray(), None);
    }

    #[test]
    fn test_pairs_odd_transfer_reports_stray() {
        let bytes = [0x40, b'A', 0x80];
        let mut pairs = Pairs::new(&bytes);
        assert_eq!(pairs.next(), Some(Transaction::data(b'A')));
        assert_eq!(pairs.next(), None);
        assert_eq!(pairs.stray(), Some(0x80));
    }

    #[test]
    fn test_pairs_single_byte() {
        let bytes = [0x40];
        let mut pairs = Pairs::new(&bytes);
        assert_eq!(pairs.next(), None);
        assert_eq!(pairs.stray(), Some(0x40));
    }

    #[test]
    fn test_flags_bits_roundtrip() {
        for bits in 0..8u8 {
            assert_eq!(DisplayFlags::from_bits(bits).to_bits(), bits);
        }
    }
}
