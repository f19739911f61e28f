//! I2C bus abstractions
//!
//! The bridge sits on the bus as a target (slave). Chip HALs implement
//! [`I2cTarget`] so attach and detach can be driven from portable code.

/// Lowest assignable 7-bit address
pub const MIN_TARGET_ADDRESS: u8 = 0x08;

/// Highest assignable 7-bit address
pub const MAX_TARGET_ADDRESS: u8 = 0x77;

/// Default address of a 20x4 character OLED
pub const DEFAULT_TARGET_ADDRESS: u8 = 0x3C;

/// I2C configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cConfig {
    /// Clock frequency in Hz
    pub frequency: u32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl I2cConfig {
    /// Standard mode (100 kHz)
    pub const STANDARD: Self = Self { frequency: 100_000 };
}

/// Rejected target configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TargetConfigError {
    /// Address falls in a reserved range
    ReservedAddress(u8),
    /// SDA and SCL on the same pin
    PinConflict(u8),
}

/// Target (slave) configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cTargetConfig {
    /// Data pin number
    pub sda_pin: u8,
    /// Clock pin number
    pub scl_pin: u8,
    /// 7-bit address to answer on
    pub address: u8,
    /// Expected bus clock, for pad filtering where the chip supports it
    pub frequency: u32,
}

impl Default for I2cTargetConfig {
    fn default() -> Self {
        Self {
            sda_pin: 2,
            scl_pin: 3,
            address: DEFAULT_TARGET_ADDRESS,
            frequency: I2cConfig::STANDARD.frequency,
        }
    }
}

impl I2cTargetConfig {
    /// Check the address and pin assignment
    pub fn validate(&self) -> Result<(), TargetConfigError> {
        if !(MIN_TARGET_ADDRESS..=MAX_TARGET_ADDRESS).contains(&self.address) {
            return Err(TargetConfigError::ReservedAddress(self.address));
        }
        if self.sda_pin == self.scl_pin {
            return Err(TargetConfigError::PinConflict(self.sda_pin));
        }
        Ok(())
    }
}

/// I2C bus target
///
/// Attaching makes the device answer on the bus; detaching releases the
/// pins so the bus is left alone.
pub trait I2cTarget {
    /// Error type for attach failures
    type Error;

    /// Start answering on the configured address
    ///
    /// Attaching an already attached target re-applies the configuration.
    fn attach(&mut self, config: &I2cTargetConfig) -> Result<(), Self::Error>;

    /// Stop answering and release the bus
    fn detach(&mut self);

    /// Whether the target is currently answering
    fn is_attached(&self) -> bool;
}

impl<T: I2cTarget + ?Sized> I2cTarget for &mut T {
    type Error = T::Error;

    fn attach(&mut self, config: &I2cTargetConfig) -> Result<(), Self::Error> {
        (**self).attach(config)
    }

    fn detach(&mut self) {
        (**self).detach()
    }

    fn is_attached(&self) -> bool {
        (**self).is_attached()
    }
}
