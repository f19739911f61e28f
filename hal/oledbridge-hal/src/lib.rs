//! OLED bridge hardware abstraction layer
//!
//! Traits implemented by chip-specific HALs so the bridge logic can attach
//! to a bus and talk to its network coprocessor without knowing the chip.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  oledbridge-core / oledbridge-firmware  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  oledbridge-hal (this crate - traits)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!           ┌───────────────────┐
//!           │ oledbridge-hal-   │
//!           │     rp2040        │
//!           └───────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`i2c::I2cTarget`] - attach/detach as a bus target (slave)
//! - [`uart::UartTx`] - serial transmit

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod i2c;
pub mod uart;

pub use i2c::{I2cConfig, I2cTarget, I2cTargetConfig, TargetConfigError};
pub use uart::UartTx;
