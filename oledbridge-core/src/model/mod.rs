//! Display model and address mapping

pub mod address;
pub mod display;

pub use address::{AddressMap, OverflowPolicy, RowTable};
pub use display::{greeting_from_lines, Cursor, DisplayModel, Greeting, DEFAULT_GREETING};
