//! Board-agnostic display-state bridge
//!
//! Everything that does not depend on a particular chip:
//!
//! - Display model and row address mapping
//! - Bus-slave decoder for the emulated character controller
//! - Change detection and frame fan-out (datagram broadcast, push stream)
//! - Bus attachment control
//! - Bridge context tying these together
//! - Configuration types and parser
//!
//! ```text
//! bus receive ──► BusDecoder ──► DisplayModel ◄── DriveSession (application)
//!                                     │
//!                        polling tick ▼
//!                               FrameSource ──► fan_out ──► FrameSink(s)
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

#[macro_use]
mod fmt;

pub mod bridge;
pub mod config;
pub mod decoder;
pub mod drive;
pub mod model;
pub mod runtime;
pub mod sync;
pub mod traits;

pub use bridge::{deliver, Bridge, TickReport};
pub use config::{parse_config, BridgeConfig, ConfigError};
pub use decoder::{BusDecoder, DecoderStats, ReceiveOutcome};
pub use drive::DriveSession;
pub use model::{Cursor, DisplayModel};
pub use runtime::RuntimeController;
