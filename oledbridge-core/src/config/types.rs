//! Configuration type definitions
//!
//! Defaults reproduce the stock deployment: target at 0x3C on GP2/GP3,
//! sequential row bases on the emulated side, a US2066 panel at 0x3C on
//! the second bus with standard row bases, telemetry on UDP 35182.

use core::net::Ipv4Addr;

use heapless::{String, Vec};

use oledbridge_hal::i2c::{I2cConfig, I2cTargetConfig};
use oledbridge_protocol::telemetry::{DEFAULT_MODE, DEFAULT_UDP_PORT, TAG_LEN};

use crate::model::{greeting_from_lines, AddressMap, Greeting, OverflowPolicy, RowTable, DEFAULT_GREETING};
use crate::sync::{SyncTiming, DEFAULT_KEEPALIVE_MS, MAX_STATIC_DESTINATIONS};

/// Largest accepted panel column correction, either direction
pub const MAX_COLUMN_OFFSET: i8 = 4;

/// Clamp a column correction into range
pub fn clamp_column_offset(offset: i32) -> i8 {
    offset.clamp(-(MAX_COLUMN_OFFSET as i32), MAX_COLUMN_OFFSET as i32) as i8
}

/// Emulated controller addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AddressingConfig {
    /// Row bases the host expects
    pub rows: RowTable,
    /// Handling of addresses past 0x7F
    pub overflow: OverflowPolicy,
}

impl AddressingConfig {
    pub fn map(&self) -> AddressMap {
        AddressMap::new(self.rows, self.overflow)
    }
}

/// Physical panel (bus master side)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PanelConfig {
    /// Mirror the model onto a physical panel
    pub enabled: bool,
    /// Panel 7-bit address
    pub address: u8,
    /// Data pin number
    pub sda_pin: u8,
    /// Clock pin number
    pub scl_pin: u8,
    /// Bus clock
    pub i2c: I2cConfig,
    /// Physical DDRAM row bases
    pub rows: RowTable,
    /// Column correction, clamped to ±[`MAX_COLUMN_OFFSET`]
    pub column_offset: i8,
    /// Contrast applied after bring-up
    pub contrast: Option<u8>,
    /// Reset line, pulsed before bring-up
    pub reset_pin: Option<u8>,
    /// Publish frames for the drive direction at this interval
    pub telemetry_interval_ms: Option<u32>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: 0x3C,
            sda_pin: 4,
            scl_pin: 5,
            i2c: I2cConfig::STANDARD,
            rows: RowTable::STANDARD,
            column_offset: 0,
            contrast: None,
            reset_pin: None,
            telemetry_interval_ms: None,
        }
    }
}

/// Frame publishing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Destination UDP port
    pub port: u16,
    /// Re-send interval while unchanged
    pub heartbeat_ms: u32,
    /// Minimum spacing of change-triggered frames
    pub min_interval_ms: u32,
    /// Frames forced right after start
    pub boot_burst: u8,
    /// Spacing of the boot frames
    pub boot_spacing_ms: u32,
    /// Push-stream idle time before a keepalive
    pub keepalive_ms: u32,
    /// Mode discriminator carried in every frame
    pub mode: String<TAG_LEN>,
    /// Address reported in frames; the bus address when unset
    pub source_address: Option<u8>,
    /// Fixed destinations in addition to the interface broadcasts
    pub destinations: Vec<Ipv4Addr, MAX_STATIC_DESTINATIONS>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        let timing = SyncTiming::default();
        let mut mode = String::new();
        // DEFAULT_MODE fits TAG_LEN
        let _ = mode.push_str(DEFAULT_MODE);
        Self {
            port: DEFAULT_UDP_PORT,
            heartbeat_ms: timing.heartbeat_ms,
            min_interval_ms: timing.min_interval_ms,
            boot_burst: timing.boot_burst,
            boot_spacing_ms: timing.boot_spacing_ms,
            keepalive_ms: DEFAULT_KEEPALIVE_MS,
            mode,
            source_address: None,
            destinations: Vec::new(),
        }
    }
}

impl TelemetryConfig {
    /// Scheduling parameters for the change detector
    pub fn timing(&self) -> SyncTiming {
        SyncTiming {
            min_interval_ms: self.min_interval_ms,
            heartbeat_ms: self.heartbeat_ms,
            boot_burst: self.boot_burst,
            boot_spacing_ms: self.boot_spacing_ms,
        }
        .normalized()
    }
}

/// Complete bridge configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Bus target parameters, remembered for re-enable
    pub bus: I2cTargetConfig,
    pub addressing: AddressingConfig,
    pub panel: PanelConfig,
    pub telemetry: TelemetryConfig,
    /// Attach to the bus at start
    pub enabled: bool,
    /// Content shown before the host writes anything
    pub greeting: Greeting,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bus: I2cTargetConfig::default(),
            addressing: AddressingConfig::default(),
            panel: PanelConfig::default(),
            telemetry: TelemetryConfig::default(),
            enabled: true,
            greeting: greeting_from_lines(DEFAULT_GREETING),
        }
    }
}

impl BridgeConfig {
    /// Address reported in frames
    pub fn source_address(&self) -> u8 {
        self.telemetry.source_address.unwrap_or(self.bus.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_stock_deployment() {
        let config = BridgeConfig::default();
        assert_eq!(config.bus.address, 0x3C);
        assert_eq!(config.addressing.rows, RowTable::SEQUENTIAL);
        assert_eq!(config.addressing.overflow, OverflowPolicy::Wrap);
        assert_eq!(config.panel.rows, RowTable::STANDARD);
        assert_eq!(config.panel.i2c.frequency, 100_000);
        assert_eq!(config.telemetry.port, 35182);
        assert_eq!(config.telemetry.heartbeat_ms, 2000);
        assert_eq!(config.telemetry.min_interval_ms, 100);
        assert_eq!(config.telemetry.keepalive_ms, 15_000);
        assert_eq!(config.telemetry.mode.as_str(), "US2066");
        assert!(config.enabled);
        assert_eq!(&config.greeting[0], b"Theia OLED Emulator");
    }

    #[test]
    fn test_source_address_falls_back_to_bus() {
        let mut config = BridgeConfig::default();
        config.bus.address = 0x3D;
        assert_eq!(config.source_address(), 0x3D);
        config.telemetry.source_address = Some(0x27);
        assert_eq!(config.source_address(), 0x27);
    }

    #[test]
    fn test_timing_applies_floor() {
        let telemetry = TelemetryConfig {
            min_interval_ms: 20,
            ..TelemetryConfig::default()
        };
        assert_eq!(telemetry.timing().min_interval_ms, 100);
    }

    #[test]
    fn test_clamp_column_offset() {
        assert_eq!(clamp_column_offset(-9), -4);
        assert_eq!(clamp_column_offset(2), 2);
        assert_eq!(clamp_column_offset(100), 4);
    }
}
