//! US2066 character OLED driver (I2C)
//!
//! The US2066 speaks the HD44780 command set plus an extended "OLED"
//! command set used for timing, bias and contrast. Every bus write is a
//! control byte followed by payload:
//!
//! - `0x80 cmd` - one command
//! - `0x40 data..` - character data, auto-incrementing DDRAM address
//!
//! # Row mapping
//!
//! Panels disagree on where each row starts in DDRAM. The driver keeps a
//! [`RowTable`] and a small signed column offset, applied to every cursor
//! placement. The logical 20×4 view is kept in a local mirror so any
//! operation that disturbs the panel can replay what was last shown.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;

use oledbridge_core::config::{clamp_column_offset, PanelConfig};
use oledbridge_core::model::{Cursor, DisplayModel, RowTable};
use oledbridge_protocol::bus::{opcode, sanitize, DisplayFlags, CTRL_COMMAND, CTRL_DATA};
use oledbridge_protocol::{COLS, ROWS};

/// Extended command set opcodes
pub mod ext {
    /// Function set, RE=1
    pub const FUNCTION_SET_RE1: u8 = 0x2A;
    /// Function set, RE=0
    pub const FUNCTION_SET_RE0: u8 = 0x28;
    /// OLED command set enable (SD=1)
    pub const OLED_CMD_ON: u8 = 0x79;
    /// OLED command set disable (SD=0)
    pub const OLED_CMD_OFF: u8 = 0x78;
    /// Set contrast (two bytes)
    pub const SET_CONTRAST: u8 = 0x81;
}

/// Bytes per data write
pub const DATA_CHUNK: usize = 8;

/// Settling time after each bus write
const SETTLE_US: u32 = 60;

/// Settling time after clear and home
const LONG_DELAY_MS: u32 = 2;

/// Reset pulse phase length
const RESET_PULSE_MS: u32 = 10;

/// Column test pattern, one character per column
pub const ALIGNMENT_PATTERN: &[u8; COLS] = b"0123456789abcdefghij";

/// Bring-up between reset and the universal clear/home/display-on.
/// Everything is a command except the single data byte after 0x72.
const BRING_UP: &[(u8, u8)] = &[
    (CTRL_COMMAND, ext::FUNCTION_SET_RE1),
    (CTRL_COMMAND, ext::OLED_CMD_ON),
    // Display clock divide ratio / oscillator frequency
    (CTRL_COMMAND, 0xD5),
    (CTRL_COMMAND, 0x70),
    (CTRL_COMMAND, ext::OLED_CMD_OFF),
    // Extended function set: 5-dot font, 4-line
    (CTRL_COMMAND, 0x09),
    (CTRL_COMMAND, opcode::ENTRY_MODE | opcode::BIT_ENTRY_INCREMENT),
    // Function selection B: ROM/CGRAM
    (CTRL_COMMAND, 0x72),
    (CTRL_DATA, 0x00),
    (CTRL_COMMAND, ext::FUNCTION_SET_RE1),
    (CTRL_COMMAND, ext::OLED_CMD_ON),
    // SEG pins hardware configuration
    (CTRL_COMMAND, 0xDA),
    (CTRL_COMMAND, 0x10),
    // Function selection C
    (CTRL_COMMAND, 0xDC),
    (CTRL_COMMAND, 0x00),
    (CTRL_COMMAND, ext::SET_CONTRAST),
    (CTRL_COMMAND, 0x7F),
    // Phase length
    (CTRL_COMMAND, 0xD9),
    (CTRL_COMMAND, 0xF1),
    // VCOMH deselect level
    (CTRL_COMMAND, 0xDB),
    (CTRL_COMMAND, 0x40),
    (CTRL_COMMAND, ext::OLED_CMD_OFF),
    (CTRL_COMMAND, ext::FUNCTION_SET_RE0),
];

/// Panel driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PanelError<E> {
    /// Bus write failed
    Bus(E),
    /// Bring-up has not completed successfully
    NotInitialized,
    /// Contrast control failed earlier this session
    ContrastUnsupported,
}

/// US2066 panel on an I2C bus
pub struct Us2066<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    rows: RowTable,
    column_offset: i8,
    /// What the panel currently shows, logical columns
    mirror: [[u8; COLS]; ROWS],
    cursor: Cursor,
    flags: DisplayFlags,
    initialized: bool,
    bus_error: bool,
    contrast_capable: bool,
}

impl<I2C: I2c, D: DelayNs> Us2066<I2C, D> {
    /// Create a driver; call [`Us2066::init`] before drawing
    pub fn new(i2c: I2C, delay: D, config: &PanelConfig) -> Self {
        Self {
            i2c,
            delay,
            address: config.address,
            rows: config.rows,
            column_offset: clamp_column_offset(config.column_offset as i32),
            mirror: [[b' '; COLS]; ROWS],
            cursor: Cursor::HOME,
            flags: DisplayFlags::ON,
            initialized: false,
            bus_error: false,
            contrast_capable: true,
        }
    }

    /// Run the bring-up sequence
    ///
    /// Stops at the first failed write. The driver stays uninitialized
    /// until a later `init` succeeds.
    pub fn init(&mut self) -> Result<(), PanelError<I2C::Error>> {
        self.initialized = false;
        self.bus_error = false;

        for &(control, byte) in BRING_UP {
            self.send(control, byte)?;
        }

        self.send(CTRL_COMMAND, opcode::CLEAR)?;
        self.delay.delay_ms(LONG_DELAY_MS);
        self.send(CTRL_COMMAND, opcode::HOME)?;
        self.delay.delay_ms(LONG_DELAY_MS);
        self.send(CTRL_COMMAND, opcode::DISPLAY_CONTROL | opcode::BIT_DISPLAY_ON)?;

        self.mirror = [[b' '; COLS]; ROWS];
        self.cursor = Cursor::HOME;
        self.flags = DisplayFlags::ON;
        self.initialized = !self.bus_error;
        if self.initialized {
            info!("us2066: ready at {=u8:#x}", self.address);
        }
        Ok(())
    }

    /// Pulse the reset line (low, then high), then run [`Us2066::init`]
    pub fn init_with_reset<P: OutputPin>(
        &mut self,
        reset: &mut P,
    ) -> Result<(), PanelError<I2C::Error>> {
        let low = reset.set_low();
        self.delay.delay_ms(RESET_PULSE_MS);
        let high = reset.set_high();
        self.delay.delay_ms(RESET_PULSE_MS);
        if low.is_err() || high.is_err() {
            warn!("us2066: reset line not driven");
        }
        self.init()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Any write failed since the last bring-up
    pub fn has_bus_error(&self) -> bool {
        self.bus_error
    }

    pub fn supports_contrast(&self) -> bool {
        self.contrast_capable
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn row_table(&self) -> RowTable {
        self.rows
    }

    /// Select the physical row bases; applies to the next placement
    pub fn set_row_table(&mut self, rows: RowTable) {
        self.rows = rows;
    }

    pub fn column_offset(&self) -> i8 {
        self.column_offset
    }

    /// Set the column correction, clamped to the supported range
    pub fn set_column_offset(&mut self, offset: i32) {
        self.column_offset = clamp_column_offset(offset);
    }

    /// Logical cursor
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn flags(&self) -> DisplayFlags {
        self.flags
    }

    /// Mirrored content of one row
    pub fn row(&self, row: usize) -> Option<&[u8; COLS]> {
        self.mirror.get(row)
    }

    /// Raw command byte
    pub fn command(&mut self, cmd: u8) -> Result<(), PanelError<I2C::Error>> {
        self.ensure_ready()?;
        self.send(CTRL_COMMAND, cmd)
    }

    /// Move the cursor
    ///
    /// Row and column saturate into the grid; the column offset is then
    /// applied and the physical column clamped again.
    pub fn set_cursor(&mut self, col: usize, row: usize) -> Result<(), PanelError<I2C::Error>> {
        self.ensure_ready()?;
        let cursor = Cursor::new(row, col);
        let address = self.physical_address(cursor.row as usize, cursor.col as usize);
        self.send(CTRL_COMMAND, opcode::SET_DDRAM_ADDR | address)?;
        self.cursor = cursor;
        Ok(())
    }

    /// Write one character at the cursor and advance it
    pub fn write(&mut self, byte: u8) -> Result<(), PanelError<I2C::Error>> {
        let byte = sanitize(byte);
        let cursor = self.cursor;
        self.set_cursor(cursor.col as usize, cursor.row as usize)?;
        self.send(CTRL_DATA, byte)?;
        self.mirror[cursor.row as usize][cursor.col as usize] = byte;
        self.cursor = cursor.advance();
        Ok(())
    }

    /// Write a string character by character
    pub fn print(&mut self, text: &str) -> Result<(), PanelError<I2C::Error>> {
        text.bytes().try_for_each(|byte| self.write(byte))
    }

    /// Replace one row in a single addressed burst
    ///
    /// Text is padded or truncated to 20 columns. The cursor ends on the
    /// last column of the row.
    pub fn write_row(&mut self, row: usize, text: &[u8]) -> Result<(), PanelError<I2C::Error>> {
        self.ensure_ready()?;
        if row >= ROWS {
            return Ok(());
        }

        let mut line = [b' '; COLS];
        for (cell, &byte) in line.iter_mut().zip(text.iter()) {
            *cell = sanitize(byte);
        }

        let address = self.physical_address(row, 0);
        self.send(CTRL_COMMAND, opcode::SET_DDRAM_ADDR | address)?;
        self.send_data(&line)?;

        self.mirror[row] = line;
        self.cursor = Cursor::new(row, COLS - 1);
        Ok(())
    }

    /// Blank the panel and the mirror
    pub fn clear(&mut self) -> Result<(), PanelError<I2C::Error>> {
        self.ensure_ready()?;
        self.send(CTRL_COMMAND, opcode::CLEAR)?;
        self.delay.delay_ms(LONG_DELAY_MS);
        self.mirror = [[b' '; COLS]; ROWS];
        self.cursor = Cursor::HOME;
        self.replay()
    }

    /// Cursor home, content kept
    pub fn home(&mut self) -> Result<(), PanelError<I2C::Error>> {
        self.ensure_ready()?;
        self.send(CTRL_COMMAND, opcode::HOME)?;
        self.delay.delay_ms(LONG_DELAY_MS);
        self.cursor = Cursor::HOME;
        self.replay()
    }

    /// Apply display/cursor/blink flags, then replay the mirror
    pub fn set_flags(&mut self, flags: DisplayFlags) -> Result<(), PanelError<I2C::Error>> {
        self.ensure_ready()?;
        self.apply_flags(flags)?;
        self.replay()
    }

    pub fn set_display(&mut self, on: bool) -> Result<(), PanelError<I2C::Error>> {
        self.set_flags(DisplayFlags {
            display_on: on,
            ..self.flags
        })
    }

    pub fn set_cursor_visible(&mut self, on: bool) -> Result<(), PanelError<I2C::Error>> {
        self.set_flags(DisplayFlags {
            cursor_on: on,
            ..self.flags
        })
    }

    pub fn set_blink(&mut self, on: bool) -> Result<(), PanelError<I2C::Error>> {
        self.set_flags(DisplayFlags {
            blink_on: on,
            ..self.flags
        })
    }

    /// Set drive current
    ///
    /// The first failure marks contrast unsupported for the rest of the
    /// session; later calls fail without touching the bus.
    pub fn set_contrast(&mut self, level: u8) -> Result<(), PanelError<I2C::Error>> {
        self.ensure_ready()?;
        if !self.contrast_capable {
            return Err(PanelError::ContrastUnsupported);
        }

        let result = self.contrast_sequence(level);
        if result.is_err() {
            warn!("us2066: contrast not supported, disabling");
            self.contrast_capable = false;
        }
        result
    }

    /// Alphanumeric ramp on every row, for checking row and column mapping
    pub fn test_alignment(&mut self) -> Result<(), PanelError<I2C::Error>> {
        (0..ROWS).try_for_each(|row| self.write_row(row, ALIGNMENT_PATTERN))
    }

    /// Bring the panel in line with `model`
    ///
    /// Only rows that differ from the mirror are re-sent; flags and cursor
    /// follow.
    pub fn mirror(&mut self, model: &DisplayModel) -> Result<(), PanelError<I2C::Error>> {
        self.ensure_ready()?;
        let mut moved = false;
        for (row, line) in model.rows().iter().enumerate() {
            if self.mirror[row] != *line {
                self.write_row(row, line)?;
                moved = true;
            }
        }
        if model.flags() != self.flags {
            self.apply_flags(model.flags())?;
        }
        let target = model.cursor();
        if moved || target != self.cursor {
            self.set_cursor(target.col as usize, target.row as usize)?;
        }
        Ok(())
    }

    /// Release the bus and delay
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    /// Enter the OLED command set, write the level, and always leave it again
    ///
    /// Failures here do not mark the bus as faulted; the first error is
    /// returned once the exit pair has been attempted.
    fn contrast_sequence(&mut self, level: u8) -> Result<(), PanelError<I2C::Error>> {
        let set = [
            (CTRL_COMMAND, ext::FUNCTION_SET_RE1),
            (CTRL_COMMAND, ext::OLED_CMD_ON),
            (CTRL_COMMAND, ext::SET_CONTRAST),
            (CTRL_DATA, level),
        ];
        let exit = [
            (CTRL_COMMAND, ext::OLED_CMD_OFF),
            (CTRL_COMMAND, ext::FUNCTION_SET_RE0),
        ];

        let mut first = None;
        for (control, byte) in set {
            if let Err(e) = self.send_raw(control, byte) {
                first = Some(e);
                break;
            }
        }
        for (control, byte) in exit {
            if let Err(e) = self.send_raw(control, byte) {
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(PanelError::Bus(e)),
            None => Ok(()),
        }
    }

    fn apply_flags(&mut self, flags: DisplayFlags) -> Result<(), PanelError<I2C::Error>> {
        self.send(CTRL_COMMAND, opcode::DISPLAY_CONTROL | flags.to_bits())?;
        self.flags = flags;
        Ok(())
    }

    /// Re-send every mirrored row
    fn replay(&mut self) -> Result<(), PanelError<I2C::Error>> {
        for row in 0..ROWS {
            let line = self.mirror[row];
            self.write_row(row, &line)?;
        }
        Ok(())
    }

    fn physical_address(&self, row: usize, col: usize) -> u8 {
        let col = (col as i32 + self.column_offset as i32).clamp(0, COLS as i32 - 1) as u8;
        self.rows.base(row).wrapping_add(col) & 0x7F
    }

    fn ensure_ready(&self) -> Result<(), PanelError<I2C::Error>> {
        if self.initialized {
            Ok(())
        } else {
            Err(PanelError::NotInitialized)
        }
    }

    fn send(&mut self, control: u8, byte: u8) -> Result<(), PanelError<I2C::Error>> {
        let result = self.send_raw(control, byte);
        self.track(result)
    }

    fn send_raw(&mut self, control: u8, byte: u8) -> Result<(), I2C::Error> {
        let result = self.i2c.write(self.address, &[control, byte]);
        self.delay.delay_us(SETTLE_US);
        result
    }

    fn send_data(&mut self, bytes: &[u8]) -> Result<(), PanelError<I2C::Error>> {
        for chunk in bytes.chunks(DATA_CHUNK) {
            let mut frame = [0u8; DATA_CHUNK + 1];
            frame[0] = CTRL_DATA;
            frame[1..=chunk.len()].copy_from_slice(chunk);
            let result = self.i2c.write(self.address, &frame[..=chunk.len()]);
            self.track(result)?;
            self.delay.delay_us(SETTLE_US);
        }
        Ok(())
    }

    fn track(&mut self, result: Result<(), I2C::Error>) -> Result<(), PanelError<I2C::Error>> {
        result.map_err(|e| {
            self.bus_error = true;
            PanelError::Bus(e)
        })
    }
}
