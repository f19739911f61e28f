//! Board wiring
//!
//! Pin numbers the firmware binds at startup. The configuration file is
//! checked against these; the RP2040 I2C blocks take typed pins, so a
//! different assignment needs a rebuild.

/// Emulated controller (I2C1 target)
pub const BUS_SDA: u8 = 2;
pub const BUS_SCL: u8 = 3;

/// Physical panel (I2C0 controller)
pub const PANEL_SDA: u8 = 4;
pub const PANEL_SCL: u8 = 5;
pub const PANEL_RESET: u8 = 6;

/// Coprocessor link (UART0)
pub const LINK_TX: u8 = 0;
pub const LINK_RX: u8 = 1;
pub const LINK_BAUDRATE: u32 = 115_200;
