//! I2C pin mapping and target attachment
//!
//! RP2040 has two I2C controllers. Every GPIO maps to exactly one of them
//! in a fixed pattern: pins 0/1 are I2C0 SDA/SCL, 2/3 are I2C1 SDA/SCL, and
//! the pattern repeats every four pins.
//!
//! The I2C target itself is owned by an async task; [`TargetControl`] is
//! the handle the bridge holds. Attaching checks the requested pins against
//! the board wiring and signals the task, which then (re)creates the target.

use embassy_rp::i2c_slave;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use oledbridge_hal::i2c::{I2cTarget, I2cTargetConfig, TargetConfigError};

/// Highest GPIO number on the RP2040
pub const MAX_GPIO: u8 = 29;

/// I2C controller identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cId {
    I2c0,
    I2c1,
}

/// Function of a pin on its I2C controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cPinRole {
    Sda,
    Scl,
}

/// Determine which I2C controller and role a GPIO pin has
pub fn gpio_to_i2c(gpio: u8) -> Option<(I2cId, I2cPinRole)> {
    if gpio > MAX_GPIO {
        return None;
    }
    let id = if gpio & 0b10 == 0 {
        I2cId::I2c0
    } else {
        I2cId::I2c1
    };
    let role = if gpio & 0b1 == 0 {
        I2cPinRole::Sda
    } else {
        I2cPinRole::Scl
    };
    Some((id, role))
}

/// Errors when attaching the emulated target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TargetError {
    /// Address or pin assignment rejected
    Config(TargetConfigError),
    /// Pin cannot carry that signal on this controller
    PinFunction { pin: u8 },
    /// Pins valid but not the ones the board wires to the target task
    NotWired { sda: u8, scl: u8 },
}

/// Request for the task that owns the I2C target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusCommand {
    Attach(I2cTargetConfig),
    Detach,
}

/// Build the embassy target configuration
pub fn target_config(config: &I2cTargetConfig) -> i2c_slave::Config {
    let mut cfg = i2c_slave::Config::default();
    cfg.addr = u16::from(config.address);
    cfg.general_call = false;
    cfg
}

/// Bridge-side handle to the I2C target task
pub struct TargetControl {
    commands: &'static Signal<CriticalSectionRawMutex, BusCommand>,
    controller: I2cId,
    sda_pin: u8,
    scl_pin: u8,
    attached: bool,
}

impl TargetControl {
    /// Handle for a task whose target is wired to `sda_pin`/`scl_pin`
    pub fn new(
        commands: &'static Signal<CriticalSectionRawMutex, BusCommand>,
        controller: I2cId,
        sda_pin: u8,
        scl_pin: u8,
    ) -> Self {
        Self {
            commands,
            controller,
            sda_pin,
            scl_pin,
            attached: false,
        }
    }

    /// Check a configuration against the board wiring
    pub fn check(&self, config: &I2cTargetConfig) -> Result<(), TargetError> {
        config.validate().map_err(TargetError::Config)?;
        for (pin, role) in [
            (config.sda_pin, I2cPinRole::Sda),
            (config.scl_pin, I2cPinRole::Scl),
        ] {
            if gpio_to_i2c(pin) != Some((self.controller, role)) {
                return Err(TargetError::PinFunction { pin });
            }
        }
        if config.sda_pin != self.sda_pin || config.scl_pin != self.scl_pin {
            return Err(TargetError::NotWired {
                sda: config.sda_pin,
                scl: config.scl_pin,
            });
        }
        Ok(())
    }
}

impl I2cTarget for TargetControl {
    type Error = TargetError;

    fn attach(&mut self, config: &I2cTargetConfig) -> Result<(), TargetError> {
        self.check(config)?;
        self.commands.signal(BusCommand::Attach(*config));
        self.attached = true;
        Ok(())
    }

    fn detach(&mut self) {
        self.commands.signal(BusCommand::Detach);
        self.attached = false;
    }

    fn is_attached(&self) -> bool {
        self.attached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpio_mapping() {
        assert_eq!(gpio_to_i2c(0), Some((I2cId::I2c0, I2cPinRole::Sda)));
        assert_eq!(gpio_to_i2c(3), Some((I2cId::I2c1, I2cPinRole::Scl)));
        assert_eq!(gpio_to_i2c(4), Some((I2cId::I2c0, I2cPinRole::Sda)));
        assert_eq!(gpio_to_i2c(5), Some((I2cId::I2c0, I2cPinRole::Scl)));
        assert_eq!(gpio_to_i2c(26), Some((I2cId::I2c1, I2cPinRole::Sda)));
        assert_eq!(gpio_to_i2c(30), None);
    }

    static COMMANDS: Signal<CriticalSectionRawMutex, BusCommand> = Signal::new();

    fn control() -> TargetControl {
        TargetControl::new(&COMMANDS, I2cId::I2c1, 2, 3)
    }

    #[test]
    fn test_check_wiring() {
        let ctl = control();
        assert_eq!(ctl.check(&I2cTargetConfig::default()), Ok(()));

        let swapped = I2cTargetConfig {
            sda_pin: 3,
            scl_pin: 2,
            ..I2cTargetConfig::default()
        };
        assert_eq!(ctl.check(&swapped), Err(TargetError::PinFunction { pin: 3 }));

        let elsewhere = I2cTargetConfig {
            sda_pin: 6,
            scl_pin: 7,
            ..I2cTargetConfig::default()
        };
        assert_eq!(
            ctl.check(&elsewhere),
            Err(TargetError::NotWired { sda: 6, scl: 7 })
        );
    }
}
