//! RP2040-specific HAL for the OLED bridge firmware
//!
//! This crate provides RP2040-specific implementations of the shared
//! `oledbridge-hal` traits:
//!
//! - I2C pin mapping and target (slave) configuration
//! - Bus attachment handle for the task that owns the I2C target
//! - UART transmit adapter

#![no_std]

pub mod i2c;
pub mod uart;

pub use i2c::{gpio_to_i2c, BusCommand, I2cId, I2cPinRole, TargetControl, TargetError};
pub use uart::IoUartTx;

// Re-export shared traits from oledbridge-hal for convenience
pub use oledbridge_hal::{I2cTarget, I2cTargetConfig, UartTx};
