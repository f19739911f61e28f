//! Bus-slave decoder
//!
//! Applies the emulated controller's command language to a [`DisplayModel`].
//! Called from the bus receive path, so it never blocks and never touches
//! the network; sinks are driven later from the polling tick.

use oledbridge_protocol::bus::{status_byte, Command, Control, Pairs, Transaction};

use crate::model::{AddressMap, DisplayModel};

/// Running decoder counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecoderStats {
    /// Pairs routed to command or character processing
    pub pairs: u32,
    /// Pairs dropped for an unknown control byte
    pub unknown_control: u32,
    /// Trailing unpaired bytes dropped
    pub stray: u32,
    /// Status bytes served
    pub status_reads: u32,
    /// Operations discarded by the overflow policy
    pub overflow_ignored: u32,
}

/// Result of one receive callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReceiveOutcome {
    /// Pairs applied to the model
    pub applied: usize,
    /// Pairs dropped for an unknown control byte
    pub unknown_control: usize,
    /// The unpaired trailing byte, if any
    pub stray: Option<u8>,
    /// An operator-significant command (clear) was seen
    pub force: bool,
}

/// Emulated character controller
#[derive(Debug, Clone, Default)]
pub struct BusDecoder {
    map: AddressMap,
    stats: DecoderStats,
}

impl BusDecoder {
    pub fn new(map: AddressMap) -> Self {
        Self {
            map,
            stats: DecoderStats::default(),
        }
    }

    pub fn map(&self) -> &AddressMap {
        &self.map
    }

    /// Swap the address mapping; takes effect on the next pair
    pub fn set_map(&mut self, map: AddressMap) {
        self.map = map;
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Consume one complete bus transfer
    ///
    /// Bytes are taken strictly as (control, payload) pairs. A trailing odd
    /// byte is reported and dropped, never carried into the next call.
    pub fn receive(&mut self, model: &mut DisplayModel, bytes: &[u8], now_ms: u32) -> ReceiveOutcome {
        let mut outcome = ReceiveOutcome::default();
        let mut pairs = Pairs::new(bytes);

        for pair in pairs.by_ref() {
            match self.apply(model, pair) {
                Some(force) => {
                    outcome.applied += 1;
                    outcome.force |= force;
                }
                None => outcome.unknown_control += 1,
            }
        }

        if let Some(byte) = pairs.stray() {
            warn!("bus: stray trailing byte {=u8:#x}", byte);
            self.stats.stray = self.stats.stray.wrapping_add(1);
            outcome.stray = Some(byte);
        }

        if outcome.applied > 0 {
            model.touch(now_ms);
        }
        outcome
    }

    /// Apply one pair
    ///
    /// Returns `None` for an unknown control byte, otherwise whether the
    /// pair should force a broadcast.
    pub fn apply(&mut self, model: &mut DisplayModel, pair: Transaction) -> Option<bool> {
        let force = match pair.kind() {
            Some(Control::Command) => self.command(model, Command::decode(pair.payload)),
            Some(Control::Data) => {
                self.character(model, pair.payload);
                false
            }
            None => {
                warn!(
                    "bus: unknown control {=u8:#x} (payload {=u8:#x})",
                    pair.control,
                    pair.payload
                );
                self.stats.unknown_control = self.stats.unknown_control.wrapping_add(1);
                return None;
            }
        };
        self.stats.pairs = self.stats.pairs.wrapping_add(1);
        Some(force)
    }

    /// Serve a read request
    pub fn request(&mut self, model: &DisplayModel) -> u8 {
        self.stats.status_reads = self.stats.status_reads.wrapping_add(1);
        let status = status_byte(model.address());
        trace!("bus: status {=u8:#x}", status);
        status
    }

    fn command(&mut self, model: &mut DisplayModel, command: Command) -> bool {
        match command {
            Command::Clear => {
                debug!("bus: clear");
                model.clear();
                true
            }
            Command::Home => {
                debug!("bus: home");
                model.home();
                false
            }
            Command::SetAddress(address) => {
                match self.map.resolve(u16::from(address)) {
                    Some((address, cursor)) => {
                        debug!(
                            "bus: address {=u8:#x} -> ({=u8},{=u8})",
                            address,
                            cursor.row,
                            cursor.col
                        );
                        model.set_position(cursor, address);
                    }
                    None => self.overflow_ignored(),
                }
                false
            }
            Command::DisplayControl(flags) => {
                debug!(
                    "bus: display={=bool} cursor={=bool} blink={=bool}",
                    flags.display_on,
                    flags.cursor_on,
                    flags.blink_on
                );
                model.set_flags(flags);
                false
            }
            Command::Other(opcode) => {
                trace!("bus: accepted opcode {=u8:#x}", opcode);
                false
            }
        }
    }

    fn character(&mut self, model: &mut DisplayModel, byte: u8) {
        let cursor = model.cursor();
        model.set_cell(cursor.row as usize, cursor.col as usize, byte);

        match self.map.settle(cursor.advance()) {
            Some((address, next)) => model.set_position(next, address),
            None => self.overflow_ignored(),
        }
    }

    fn overflow_ignored(&mut self) {
        debug!("bus: address overflow ignored");
        self.stats.overflow_ignored = self.stats.overflow_ignored.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cursor, OverflowPolicy, RowTable};
    use oledbridge_protocol::{COLS, ROWS};
    use proptest::prelude::*;

    fn sequential() -> BusDecoder {
        BusDecoder::new(AddressMap::new(RowTable::SEQUENTIAL, OverflowPolicy::Wrap))
    }

    fn standard() -> BusDecoder {
        BusDecoder::new(AddressMap::new(RowTable::STANDARD, OverflowPolicy::Wrap))
    }

    #[test]
    fn test_clear_then_hi() {
        let mut decoder = sequential();
        let mut model = DisplayModel::blank();
        model.write_row(1, b"leftover");

        let outcome = decoder.receive(
            &mut model,
            &[0x80, 0x01, 0x40, b'H', 0x40, b'I'],
            1234,
        );

        assert_eq!(outcome.applied, 3);
        assert!(outcome.force);
        assert_eq!(model.row_str(0), "HI                  ");
        assert_eq!(model.row_str(1), "                    ");
        assert_eq!(model.row_str(2), "                    ");
        assert_eq!(model.row_str(3), "                    ");
        assert_eq!(model.cursor(), Cursor::new(0, 2));
        assert_eq!(model.address(), 0x02);
        assert_eq!(model.last_update_ms(), 1234);
    }

    #[test]
    fn test_set_address_standard_vs_sequential() {
        let mut model = DisplayModel::blank();
        standard().receive(&mut model, &[0x80, 0x80 | 0x14], 0);
        assert_eq!(model.cursor(), Cursor::new(2, 0));
        assert_eq!(model.address(), 0x14);

        let mut model = DisplayModel::blank();
        sequential().receive(&mut model, &[0x80, 0x80 | 0x14], 0);
        assert_eq!(model.cursor(), Cursor::new(0, 19));
        assert_eq!(model.address(), 0x14);
    }

    #[test]
    fn test_home_keeps_content() {
        let mut decoder = sequential();
        let mut model = DisplayModel::blank();
        decoder.receive(&mut model, &[0x40, b'A', 0x40, b'B', 0x80, 0x02], 0);
        assert_eq!(model.row_str(0), "AB                  ");
        assert_eq!(model.cursor(), Cursor::HOME);
        assert_eq!(model.address(), 0);
    }

    #[test]
    fn test_display_control_flags() {
        let mut decoder = sequential();
        let mut model = DisplayModel::blank();
        decoder.receive(&mut model, &[0x80, 0x0B], 0);
        let flags = model.flags();
        assert!(!flags.display_on);
        assert!(flags.cursor_on);
        assert!(flags.blink_on);

        decoder.receive(&mut model, &[0x80, 0x0C], 0);
        assert_eq!(model.flags(), oledbridge_protocol::DisplayFlags::ON);
    }

    #[test]
    fn test_other_commands_have_no_effect() {
        let mut decoder = sequential();
        let mut model = DisplayModel::blank();
        model.write_row(0, b"keep");
        let before = model.clone();
        let outcome = decoder.receive(&mut model, &[0x80, 0x06, 0x80, 0x2A, 0x80, 0x10], 0);
        assert_eq!(outcome.applied, 3);
        model.touch(0);
        assert_eq!(model, before);
    }

    #[test]
    fn test_unknown_control_dropped() {
        let mut decoder = sequential();
        let mut model = DisplayModel::blank();
        let outcome = decoder.receive(&mut model, &[0x00, b'X', 0xC0, b'Y', 0x40, b'Z'], 7);
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.unknown_control, 2);
        assert_eq!(model.row_str(0), "Z                   ");
        assert_eq!(decoder.stats().unknown_control, 2);
    }

    #[test]
    fn test_stray_byte_not_carried_over() {
        let mut decoder = sequential();
        let mut model = DisplayModel::blank();

        let outcome = decoder.receive(&mut model, &[0x40, b'A', 0x40], 0);
        assert_eq!(outcome.stray, Some(0x40));
        assert_eq!(decoder.stats().stray, 1);

        // If 0x40 were held over, this would be read as a 'B' write
        let outcome = decoder.receive(&mut model, &[b'B', 0x40], 0);
        assert_eq!(outcome.applied, 0);
        assert_eq!(outcome.unknown_control, 1);
        assert_eq!(model.row_str(0), "A                   ");
    }

    #[test]
    fn test_no_valid_pairs_does_not_touch() {
        let mut decoder = sequential();
        let mut model = DisplayModel::blank();
        decoder.receive(&mut model, &[0x13], 500);
        assert_eq!(model.last_update_ms(), 0);
    }

    #[test]
    fn test_write_wraps_rows_and_address() {
        let mut decoder = standard();
        let mut model = DisplayModel::blank();
        // Jump to the last cell of row 0
        decoder.receive(&mut model, &[0x80, 0x80 | 0x13], 0);
        decoder.receive(&mut model, &[0x40, b'x'], 0);
        assert_eq!(model.cursor(), Cursor::new(1, 0));
        assert_eq!(model.address(), 0x40);

        // Last cell of row 3 wraps to the top
        decoder.receive(&mut model, &[0x80, 0x80 | 0x67], 0);
        assert_eq!(model.cursor(), Cursor::new(3, 19));
        decoder.receive(&mut model, &[0x40, b'y'], 0);
        assert_eq!(model.cell(3, 19), b'y');
        assert_eq!(model.cursor(), Cursor::HOME);
        assert_eq!(model.address(), 0x00);
    }

    #[test]
    fn test_character_sanitized() {
        let mut decoder = sequential();
        let mut model = DisplayModel::blank();
        decoder.receive(&mut model, &[0x40, 0x00, 0x40, 0xFF, 0x40, b'~'], 0);
        assert_eq!(model.row_str(0), "  ~                 ");
    }

    #[test]
    fn test_request_is_passive() {
        let mut decoder = sequential();
        let mut model = DisplayModel::blank();
        decoder.receive(&mut model, &[0x80, 0x80 | 0x45], 0);
        let before = model.clone();
        assert_eq!(decoder.request(&model), 0x45);
        assert_eq!(model, before);
        assert_eq!(decoder.stats().status_reads, 1);
    }

    #[test]
    fn test_ignore_policy_holds_position() {
        let table = RowTable::new([0x00, 0x20, 0x40, 0x7A]).unwrap();
        let mut decoder = BusDecoder::new(AddressMap::new(table, OverflowPolicy::Ignore));
        let mut model = DisplayModel::blank();
        // 0x7F -> row 3, col 5; writing advances to col 6 = 0x80
        decoder.receive(&mut model, &[0x80, 0xFF], 0);
        assert_eq!(model.cursor(), Cursor::new(3, 5));
        decoder.receive(&mut model, &[0x40, b'Q'], 0);
        assert_eq!(model.cell(3, 5), b'Q');
        assert_eq!(model.cursor(), Cursor::new(3, 5));
        assert_eq!(model.address(), 0x7F);
        assert_eq!(decoder.stats().overflow_ignored, 1);
    }

    #[test]
    fn test_wrap_policy_resets_on_overflow() {
        let table = RowTable::new([0x00, 0x20, 0x40, 0x7A]).unwrap();
        let mut decoder = BusDecoder::new(AddressMap::new(table, OverflowPolicy::Wrap));
        let mut model = DisplayModel::blank();
        decoder.receive(&mut model, &[0x80, 0xFF, 0x40, b'Q'], 0);
        assert_eq!(model.cursor(), Cursor::HOME);
        assert_eq!(model.address(), 0);
    }

    proptest! {
        #[test]
        fn prop_set_address_keeps_cursor_in_grid(payload: u8) {
            for mut decoder in [sequential(), standard()] {
                let mut model = DisplayModel::blank();
                decoder.receive(&mut model, &[0x80, 0x80 | payload], 0);
                let cursor = model.cursor();
                prop_assert!((cursor.row as usize) < ROWS);
                prop_assert!((cursor.col as usize) < COLS);
                prop_assert_eq!(decoder.request(&model), payload & 0x7F);
            }
        }

        #[test]
        fn prop_write_stream_keeps_address_consistent(
            text in proptest::collection::vec(any::<u8>(), 0..200)
        ) {
            let mut decoder = standard();
            let mut model = DisplayModel::blank();
            for byte in &text {
                decoder.receive(&mut model, &[0x40, *byte], 0);
            }
            let expected = RowTable::STANDARD.address_of(model.cursor()) as u8;
            prop_assert_eq!(model.address(), expected);
            let written = text.len() % (ROWS * COLS);
            prop_assert_eq!(
                model.cursor(),
                Cursor::new(written / COLS, written % COLS)
            );
        }

        #[test]
        fn prop_clear_always_blank(
            text in proptest::collection::vec(any::<u8>(), 0..64)
        ) {
            let mut decoder = sequential();
            let mut model = DisplayModel::blank();
            let mut bytes = std::vec::Vec::new();
            for byte in &text {
                bytes.push(0x40);
                bytes.push(*byte);
            }
            decoder.receive(&mut model, &bytes, 0);
            decoder.receive(&mut model, &[0x80, 0x01], 0);
            for row in 0..ROWS {
                prop_assert_eq!(model.row_str(row), "                    ");
            }
            prop_assert_eq!(model.cursor(), Cursor::HOME);
        }
    }
}
