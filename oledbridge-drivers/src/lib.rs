//! Hardware driver implementations
//!
//! - US2066 20×4 character OLED over I2C, with row mapping, column
//!   correction and a local mirror for replay
//! - Coprocessor link: frames carried over UART to the network side

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod link;
pub mod us2066;

pub use link::{CoprocessorLink, LinkInterfaces, SharedLink};
pub use us2066::{PanelError, Us2066};
