//! Canonical 20x4 display state

use oledbridge_protocol::bus::{sanitize, DisplayFlags};
use oledbridge_protocol::telemetry::{CursorPos, DisplayFrame, TelemetryError};
use oledbridge_protocol::{COLS, ROWS};

/// Cursor position, always inside the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cursor {
    pub row: u8,
    pub col: u8,
}

impl Cursor {
    /// Top-left cell
    pub const HOME: Self = Self { row: 0, col: 0 };

    /// Create a cursor, saturating out-of-range inputs to the nearest cell
    pub fn new(row: usize, col: usize) -> Self {
        Self {
            row: row.min(ROWS - 1) as u8,
            col: col.min(COLS - 1) as u8,
        }
    }

    /// Next cell in write order
    ///
    /// Column overflow moves to the next row, row overflow wraps to row 0.
    pub fn advance(self) -> Self {
        let col = self.col as usize + 1;
        if col < COLS {
            Self {
                row: self.row,
                col: col as u8,
            }
        } else {
            Self {
                row: ((self.row as usize + 1) % ROWS) as u8,
                col: 0,
            }
        }
    }
}

impl From<Cursor> for CursorPos {
    fn from(cursor: Cursor) -> Self {
        CursorPos {
            r: cursor.row,
            c: cursor.col,
        }
    }
}

/// Four lines shown at startup
pub type Greeting = [[u8; COLS]; ROWS];

/// Build a greeting from text lines, padding or truncating each to 20 columns
pub fn greeting_from_lines(lines: [&str; ROWS]) -> Greeting {
    let mut rows = [[b' '; COLS]; ROWS];
    for (row, line) in rows.iter_mut().zip(lines.iter()) {
        for (cell, byte) in row.iter_mut().zip(line.bytes()) {
            *cell = sanitize(byte);
        }
    }
    rows
}

/// Default startup banner
pub const DEFAULT_GREETING: [&str; ROWS] = [
    "Theia OLED Emulator",
    "US2066 20x4 @ 0x3C",
    "Waiting for host...",
    "",
];

/// Display model shared by the decoder, the panel mirror and the sinks
///
/// Every cell holds printable ASCII at all times; the cursor never leaves
/// the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayModel {
    rows: [[u8; COLS]; ROWS],
    cursor: Cursor,
    address: u8,
    flags: DisplayFlags,
    last_update_ms: u32,
}

impl Default for DisplayModel {
    fn default() -> Self {
        Self::blank()
    }
}

impl DisplayModel {
    /// All spaces, display on, cursor home
    pub fn blank() -> Self {
        Self {
            rows: [[b' '; COLS]; ROWS],
            cursor: Cursor::HOME,
            address: 0,
            flags: DisplayFlags::ON,
            last_update_ms: 0,
        }
    }

    /// Model showing `greeting`, display on
    pub fn with_greeting(greeting: &Greeting) -> Self {
        let mut model = Self::blank();
        for (row, line) in model.rows.iter_mut().zip(greeting.iter()) {
            for (cell, &byte) in row.iter_mut().zip(line.iter()) {
                *cell = sanitize(byte);
            }
        }
        model
    }

    pub fn rows(&self) -> &[[u8; COLS]; ROWS] {
        &self.rows
    }

    /// One row as text
    pub fn row_str(&self, row: usize) -> &str {
        // Cells are printable ASCII, so this never fails
        core::str::from_utf8(&self.rows[row.min(ROWS - 1)]).unwrap_or("")
    }

    pub fn cell(&self, row: usize, col: usize) -> u8 {
        self.rows[row.min(ROWS - 1)][col.min(COLS - 1)]
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Current linear address
    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn flags(&self) -> DisplayFlags {
        self.flags
    }

    /// Time of the last mutation (ms)
    pub fn last_update_ms(&self) -> u32 {
        self.last_update_ms
    }

    /// Store a character, coercing non-printable bytes to space
    ///
    /// Out-of-range coordinates are ignored.
    pub fn set_cell(&mut self, row: usize, col: usize, byte: u8) {
        if row < ROWS && col < COLS {
            self.rows[row][col] = sanitize(byte);
        }
    }

    /// Replace one row, padding with spaces or truncating to 20 columns
    pub fn write_row(&mut self, row: usize, text: &[u8]) {
        if row >= ROWS {
            return;
        }
        for (col, cell) in self.rows[row].iter_mut().enumerate() {
            *cell = sanitize(text.get(col).copied().unwrap_or(b' '));
        }
    }

    /// Blank every cell, cursor and address to (0,0)
    pub fn clear(&mut self) {
        self.rows = [[b' '; COLS]; ROWS];
        self.home();
    }

    /// Cursor and address to (0,0), content untouched
    pub fn home(&mut self) {
        self.cursor = Cursor::HOME;
        self.address = 0;
    }

    /// Move the cursor and record the matching address
    pub fn set_position(&mut self, cursor: Cursor, address: u8) {
        self.cursor = cursor;
        self.address = address;
    }

    pub fn set_flags(&mut self, flags: DisplayFlags) {
        self.flags = flags;
    }

    /// Record a mutation time
    pub fn touch(&mut self, now_ms: u32) {
        self.last_update_ms = now_ms;
    }

    /// Serialize into a telemetry frame
    pub fn to_frame(&self, mode: &str, source_address: u8) -> Result<DisplayFrame, TelemetryError> {
        DisplayFrame::from_cells(
            mode,
            source_address,
            self.flags,
            self.cursor.into(),
            &self.rows,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cursor_saturates() {
        assert_eq!(Cursor::new(9, 99), Cursor { row: 3, col: 19 });
        assert_eq!(Cursor::new(1, 5), Cursor { row: 1, col: 5 });
    }

    #[test]
    fn test_cursor_advance_wraps() {
        assert_eq!(Cursor::new(0, 18).advance(), Cursor::new(0, 19));
        assert_eq!(Cursor::new(0, 19).advance(), Cursor::new(1, 0));
        assert_eq!(Cursor::new(3, 19).advance(), Cursor::HOME);
    }

    #[test]
    fn test_greeting() {
        let model = DisplayModel::with_greeting(&greeting_from_lines(DEFAULT_GREETING));
        assert_eq!(model.row_str(0), "Theia OLED Emulator");
        assert_eq!(model.row_str(3), "                    ");
        assert!(model.flags().display_on);
        assert_eq!(model.cursor(), Cursor::HOME);
    }

    #[test]
    fn test_greeting_truncates_and_pads() {
        let g = greeting_from_lines(["a line that is far too long", "x", "\u{7f}", ""]);
        assert_eq!(&g[0], b"a line that is far t");
        assert_eq!(&g[1], b"x                   ");
        assert_eq!(g[2][0], b' ');
    }

    #[test]
    fn test_clear() {
        let mut model = DisplayModel::with_greeting(&greeting_from_lines(DEFAULT_GREETING));
        model.set_position(Cursor::new(2, 7), 0x47);
        model.clear();
        for row in 0..ROWS {
            assert_eq!(model.row_str(row), "                    ");
        }
        assert_eq!(model.cursor(), Cursor::HOME);
        assert_eq!(model.address(), 0);
    }

    #[test]
    fn test_home_keeps_content() {
        let mut model = DisplayModel::blank();
        model.set_cell(1, 1, b'Z');
        model.set_position(Cursor::new(1, 2), 0x22);
        model.home();
        assert_eq!(model.cell(1, 1), b'Z');
        assert_eq!(model.cursor(), Cursor::HOME);
        assert_eq!(model.address(), 0);
    }

    #[test]
    fn test_set_cell_out_of_range_ignored() {
        let mut model = DisplayModel::blank();
        model.set_cell(4, 0, b'X');
        model.set_cell(0, 20, b'X');
        assert_eq!(model, DisplayModel::blank());
    }

    #[test]
    fn test_write_row_pads() {
        let mut model = DisplayModel::blank();
        model.write_row(2, b"HI\x01");
        assert_eq!(model.row_str(2), "HI                  ");
    }

    #[test]
    fn test_to_frame_carries_state() {
        let mut model = DisplayModel::blank();
        model.set_cell(0, 0, b'H');
        model.set_position(Cursor::new(0, 1), 0x01);
        let frame = model.to_frame("US2066", 0x3C).unwrap();
        assert_eq!(frame.rows[0].as_str(), "H                   ");
        assert_eq!(frame.cursor, CursorPos { r: 0, c: 1 });
        assert!(frame.disp);
    }

    proptest! {
        #[test]
        fn prop_cell_equals_sanitized_input(row in 0usize..ROWS, col in 0usize..COLS, byte: u8) {
            let mut model = DisplayModel::blank();
            model.set_cell(row, col, byte);
            prop_assert_eq!(model.cell(row, col), sanitize(byte));
        }
    }
}
