//! OLED bridge wire formats
//!
//! This crate holds every byte-level format the bridge speaks:
//!
//! - [`bus`]: the two-byte (control, payload) grammar of a 20x4 character
//!   controller, shared by the inbound slave role and the outbound panel
//!   driver.
//! - [`telemetry`]: the JSON frame describing one display snapshot.
//! - [`link`]: the framing used to hand datagrams and push events to the
//!   network coprocessor.
//!
//! The display geometry is fixed at [`ROWS`] × [`COLS`].

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod bus;
pub mod link;
pub mod telemetry;

/// Number of display rows
pub const ROWS: usize = 4;

/// Number of display columns
pub const COLS: usize = 20;

pub use bus::{
    sanitize, status_byte, Command, Control, DisplayFlags, Pairs, Transaction, CTRL_COMMAND,
    CTRL_DATA,
};
pub use link::{
    InterfaceEntry, LinkError, LinkFrame, LinkMessage, LinkParser, LINK_START, MAX_LINK_FRAME,
};
pub use telemetry::{CursorPos, DisplayFrame, TelemetryError, DEFAULT_UDP_PORT};
