//! Telemetry frame record
//!
//! One frame is a complete snapshot of the emulated display. It is the same
//! record for every sink (UDP datagram, push stream, state endpoint):
//!
//! ```text
//! {"type":"lcd20x4","mode":"US2066","addr":"0x3C",
//!  "disp":true,"cur":false,"blink":false,
//!  "cursor":{"r":0,"c":2},
//!  "rows":["HI                  ","...","...","..."]}
//! ```
//!
//! Rows are sanitized while the frame is built, independently of any
//! sanitization done when the cells were written.

use alloc::string::String as JsonString;
use core::fmt::Write;

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::bus::{is_printable, sanitize, DisplayFlags};
use crate::{COLS, ROWS};

/// Type discriminator carried by every frame
pub const FRAME_TYPE: &str = "lcd20x4";

/// Default mode discriminator (the emulated controller family)
pub const DEFAULT_MODE: &str = "US2066";

/// Default UDP destination port
pub const DEFAULT_UDP_PORT: u16 = 35182;

/// Push-stream event name carrying a frame
pub const EVENT_FRAME: &str = "message";

/// Push-stream event name for the empty keepalive
pub const EVENT_KEEPALIVE: &str = "ka";

/// Maximum length of the type/mode discriminators
pub const TAG_LEN: usize = 16;

/// Errors building, encoding or decoding a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryError {
    /// A string field exceeded its fixed capacity
    Capacity,
    /// JSON encoding failed
    Encode,
    /// JSON decoding failed
    Decode,
    /// A decoded row is not exactly 20 printable characters
    InvalidRow,
}

/// Cursor position as carried in a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CursorPos {
    pub r: u8,
    pub c: u8,
}

/// One serialized display snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayFrame {
    #[serde(rename = "type")]
    pub kind: String<TAG_LEN>,
    pub mode: String<TAG_LEN>,
    pub addr: String<8>,
    pub disp: bool,
    pub cur: bool,
    pub blink: bool,
    pub cursor: CursorPos,
    pub rows: [String<COLS>; ROWS],
}

impl DisplayFrame {
    /// Build a frame from raw display cells
    ///
    /// Every cell passes through [`sanitize`], so the frame always holds
    /// exactly four rows of twenty printable characters whatever the cells
    /// contain.
    pub fn from_cells(
        mode: &str,
        source_address: u8,
        flags: DisplayFlags,
        cursor: CursorPos,
        cells: &[[u8; COLS]; ROWS],
    ) -> Result<Self, TelemetryError> {
        let mut addr = String::new();
        write!(addr, "0x{:02X}", source_address).map_err(|_| TelemetryError::Capacity)?;

        let mut rows: [String<COLS>; ROWS] = core::array::from_fn(|_| String::new());
        for (row, line) in rows.iter_mut().zip(cells.iter()) {
            for &byte in line {
                push_cell(row, sanitize(byte))?;
            }
        }

        Ok(Self {
            kind: String::try_from(FRAME_TYPE).map_err(|_| TelemetryError::Capacity)?,
            mode: String::try_from(mode).map_err(|_| TelemetryError::Capacity)?,
            addr,
            disp: flags.display_on,
            cur: flags.cursor_on,
            blink: flags.blink_on,
            cursor,
            rows,
        })
    }

    /// Presentation flags of this frame
    pub fn flags(&self) -> DisplayFlags {
        DisplayFlags {
            display_on: self.disp,
            cursor_on: self.cur,
            blink_on: self.blink,
        }
    }

    /// Check the row shape invariant (4 rows × 20 printable characters)
    pub fn validate(&self) -> Result<(), TelemetryError> {
        let well_formed = self
            .rows
            .iter()
            .all(|row| row.len() == COLS && row.bytes().all(is_printable));
        if well_formed {
            Ok(())
        } else {
            Err(TelemetryError::InvalidRow)
        }
    }

    /// Encode as a JSON record
    pub fn to_json(&self) -> Result<JsonString, TelemetryError> {
        serde_json::to_string(self).map_err(|_| TelemetryError::Encode)
    }

    /// Decode a JSON record and check its row shape
    pub fn from_json(bytes: &[u8]) -> Result<Self, TelemetryError> {
        let frame: Self = serde_json::from_slice(bytes).map_err(|_| TelemetryError::Decode)?;
        frame.validate()?;
        Ok(frame)
    }
}

fn push_cell(row: &mut String<COLS>, byte: u8) -> Result<(), TelemetryError> {
    row.push(char::from(byte)).map_err(|_| TelemetryError::Capacity)
}
