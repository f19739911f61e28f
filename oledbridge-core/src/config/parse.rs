//! Minimal TOML parser for the bridge configuration
//!
//! Handles only the subset `bridge.toml` uses:
//! - `[section]` headers
//! - `key = value` with strings, integers (decimal or `0x` hex) and booleans
//! - single-line flat arrays of integers or strings
//! - comments (`# ...`)
//!
//! Unknown keys are ignored. The firmware build validates the same file
//! against the full TOML grammar.

use core::net::Ipv4Addr;

use heapless::{String, Vec};

use oledbridge_protocol::{COLS, ROWS};

use crate::model::{OverflowPolicy, RowTable};

use super::types::{clamp_column_offset, BridgeConfig};

/// Largest array the parser accepts
const MAX_ARRAY: usize = 8;

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Unknown or malformed section header
    InvalidSection,
    /// Line is neither a header nor `key = value`
    InvalidLine,
    /// Value has the wrong type or is out of range
    InvalidValue,
    /// Unknown row-mapping profile or overflow policy name
    InvalidProfile,
    /// Address outside the assignable 7-bit range
    InvalidAddress,
    /// Too many array items, or a string too long for its field
    TooManyItems,
    /// `profile = "custom"` without a `rows` table
    MissingRows,
}

/// Current parsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Bus,
    Addressing,
    Panel,
    Telemetry,
    Greeting,
}

/// Row table being assembled for one section
#[derive(Debug, Clone, Copy, Default)]
struct RowsDraft {
    custom: bool,
    explicit: Option<RowTable>,
}

impl RowsDraft {
    fn finish(self, target: &mut RowTable) -> Result<(), ConfigError> {
        match (self.custom, self.explicit) {
            (_, Some(table)) => {
                *target = table;
                Ok(())
            }
            (true, None) => Err(ConfigError::MissingRows),
            (false, None) => Ok(()),
        }
    }
}

/// Parse TOML text into a [`BridgeConfig`], starting from the defaults
pub fn parse_config(input: &str) -> Result<BridgeConfig, ConfigError> {
    let mut config = BridgeConfig::default();
    let mut section = Section::Root;
    let mut emulated_rows = RowsDraft::default();
    let mut panel_rows = RowsDraft::default();

    for line in input.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            section = parse_section_header(&line[1..line.len() - 1])?;
            continue;
        }

        let (key, value) = parse_key_value(line).ok_or(ConfigError::InvalidLine)?;
        match section {
            Section::Addressing if key == "profile" => {
                emulated_rows = profile_draft(value, &mut config.addressing.rows)?
            }
            Section::Addressing if key == "rows" => {
                emulated_rows.explicit = Some(parse_row_table(value)?)
            }
            Section::Panel if key == "profile" => {
                panel_rows = profile_draft(value, &mut config.panel.rows)?
            }
            Section::Panel if key == "rows" => panel_rows.explicit = Some(parse_row_table(value)?),
            _ => apply_value(section, key, value, &mut config)?,
        }
    }

    emulated_rows.finish(&mut config.addressing.rows)?;
    panel_rows.finish(&mut config.panel.rows)?;

    Ok(config)
}

fn parse_section_header(header: &str) -> Result<Section, ConfigError> {
    match header.trim() {
        "bus" => Ok(Section::Bus),
        "addressing" => Ok(Section::Addressing),
        "panel" => Ok(Section::Panel),
        "telemetry" => Ok(Section::Telemetry),
        "greeting" => Ok(Section::Greeting),
        _ => Err(ConfigError::InvalidSection),
    }
}

fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = strip_comment(&line[eq_pos + 1..]).trim();

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Cut a trailing `# comment` that is not inside a string
fn strip_comment(value: &str) -> &str {
    let mut in_string = false;
    for (i, c) in value.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '#' if !in_string => return &value[..i],
            _ => {}
        }
    }
    value
}

fn apply_value(
    section: Section,
    key: &str,
    value: &str,
    config: &mut BridgeConfig,
) -> Result<(), ConfigError> {
    match section {
        Section::Root => match key {
            "enabled" => config.enabled = parse_bool(value)?,
            _ => debug!("config: ignoring root key"),
        },
        Section::Bus => {
            let bus = &mut config.bus;
            match key {
                "sda_pin" => bus.sda_pin = parse_pin(value)?,
                "scl_pin" => bus.scl_pin = parse_pin(value)?,
                "address" => bus.address = parse_address(value)?,
                "frequency" => bus.frequency = parse_int(value)?,
                _ => debug!("config: ignoring bus key"),
            }
        }
        Section::Addressing => match key {
            "overflow" => {
                config.addressing.overflow =
                    OverflowPolicy::from_name(parse_string(value)?).ok_or(ConfigError::InvalidProfile)?
            }
            _ => debug!("config: ignoring addressing key"),
        },
        Section::Panel => {
            let panel = &mut config.panel;
            match key {
                "enabled" => panel.enabled = parse_bool(value)?,
                "address" => panel.address = parse_address(value)?,
                "sda_pin" => panel.sda_pin = parse_pin(value)?,
                "scl_pin" => panel.scl_pin = parse_pin(value)?,
                "frequency" => panel.i2c.frequency = parse_int(value)?,
                "column_offset" => panel.column_offset = clamp_column_offset(parse_int(value)?),
                "contrast" => panel.contrast = Some(parse_int(value)?),
                "reset_pin" => panel.reset_pin = Some(parse_pin(value)?),
                "telemetry_interval_ms" => panel.telemetry_interval_ms = Some(parse_int(value)?),
                _ => debug!("config: ignoring panel key"),
            }
        }
        Section::Telemetry => {
            let telemetry = &mut config.telemetry;
            match key {
                "port" => telemetry.port = parse_int(value)?,
                "heartbeat_ms" => telemetry.heartbeat_ms = parse_int(value)?,
                "min_interval_ms" => telemetry.min_interval_ms = parse_int(value)?,
                "boot_burst" => telemetry.boot_burst = parse_int(value)?,
                "boot_spacing_ms" => telemetry.boot_spacing_ms = parse_int(value)?,
                "keepalive_ms" => telemetry.keepalive_ms = parse_int(value)?,
                "mode" => {
                    telemetry.mode = String::try_from(parse_string(value)?)
                        .map_err(|_| ConfigError::TooManyItems)?
                }
                "source_address" => telemetry.source_address = Some(parse_address(value)?),
                "destinations" => {
                    telemetry.destinations.clear();
                    for item in parse_array(value)? {
                        let ip: Ipv4Addr = parse_string(item)?
                            .parse()
                            .map_err(|_| ConfigError::InvalidValue)?;
                        telemetry
                            .destinations
                            .push(ip)
                            .map_err(|_| ConfigError::TooManyItems)?;
                    }
                }
                _ => debug!("config: ignoring telemetry key"),
            }
        }
        Section::Greeting => match key {
            "lines" => {
                let lines = parse_array(value)?;
                if lines.len() > ROWS {
                    return Err(ConfigError::TooManyItems);
                }
                config.greeting = [[b' '; COLS]; ROWS];
                for (row, item) in config.greeting.iter_mut().zip(lines) {
                    let text = parse_string(item)?;
                    for (cell, byte) in row.iter_mut().zip(text.bytes()) {
                        *cell = oledbridge_protocol::sanitize(byte);
                    }
                }
            }
            _ => debug!("config: ignoring greeting key"),
        },
    }
    Ok(())
}

/// Named profile; `custom` defers to an explicit `rows` table
fn profile_draft(value: &str, target: &mut RowTable) -> Result<RowsDraft, ConfigError> {
    let name = parse_string(value)?;
    if name == "custom" {
        return Ok(RowsDraft {
            custom: true,
            explicit: None,
        });
    }
    *target = RowTable::from_profile(name).ok_or(ConfigError::InvalidProfile)?;
    Ok(RowsDraft::default())
}

fn parse_row_table(value: &str) -> Result<RowTable, ConfigError> {
    let items = parse_array(value)?;
    if items.len() != ROWS {
        return Err(ConfigError::InvalidValue);
    }
    let mut bases = [0u8; ROWS];
    for (base, item) in bases.iter_mut().zip(items) {
        *base = parse_int(item)?;
    }
    RowTable::new(bases).ok_or(ConfigError::InvalidAddress)
}

/// Split a single-line `[a, b, c]` into trimmed items
fn parse_array(value: &str) -> Result<Vec<&str, MAX_ARRAY>, ConfigError> {
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .ok_or(ConfigError::InvalidValue)?;

    let mut items = Vec::new();
    let mut rest = inner.trim();
    while !rest.is_empty() {
        let (item, tail) = if rest.starts_with('"') {
            // Quoted item may contain commas
            let close = rest[1..].find('"').ok_or(ConfigError::InvalidValue)? + 2;
            (&rest[..close], &rest[close..])
        } else {
            match rest.find(',') {
                Some(pos) => (&rest[..pos], &rest[pos..]),
                None => (rest, ""),
            }
        };
        items.push(item.trim()).map_err(|_| ConfigError::TooManyItems)?;

        let tail = tail.trim_start();
        rest = match tail.strip_prefix(',') {
            Some(after) => after.trim_start(),
            None if tail.is_empty() => tail,
            None => return Err(ConfigError::InvalidValue),
        };
    }
    Ok(items)
}

fn parse_string(value: &str) -> Result<&str, ConfigError> {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        Ok(&value[1..value.len() - 1])
    } else {
        // Allow unquoted strings for simple values
        Ok(value)
    }
}

fn parse_int<T: TryFrom<i64>>(value: &str) -> Result<T, ConfigError> {
    let value = strip_separators(value);
    let raw = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => value.parse(),
    }
    .map_err(|_| ConfigError::InvalidValue)?;
    T::try_from(raw).map_err(|_| ConfigError::InvalidValue)
}

fn parse_bool(value: &str) -> Result<bool, ConfigError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::InvalidValue),
    }
}

/// Pin as a plain number or `"gpioN"`
fn parse_pin(value: &str) -> Result<u8, ConfigError> {
    let value = parse_string(value)?;
    let number = value.strip_prefix("gpio").unwrap_or(value);
    parse_int(number)
}

fn parse_address(value: &str) -> Result<u8, ConfigError> {
    let address: u8 = parse_int(value)?;
    if (0x08..=0x77).contains(&address) {
        Ok(address)
    } else {
        Err(ConfigError::InvalidAddress)
    }
}

/// Drop TOML `1_000` style digit separators
fn strip_separators(value: &str) -> String<24> {
    let mut out = String::new();
    for c in value.chars().filter(|&c| c != '_') {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# Bridge configuration
enabled = true

[bus]
sda_pin = "gpio2"
scl_pin = 3
address = 0x3C        # stock controller address

[addressing]
profile = "standard"
overflow = "clamp"

[panel]
address = 0x3D
profile = "custom"
rows = [0x00, 0x20, 0x40, 0x60]
column_offset = -7
contrast = 0xCF
reset_pin = "gpio6"
telemetry_interval_ms = 250

[telemetry]
port = 40000
heartbeat_ms = 5_000
mode = "SSD1311"
destinations = ["192.168.4.255", "10.0.0.255"]

[greeting]
lines = ["Hello, bridge", "line two", "", "v1"]
"#;

    #[test]
    fn test_parse_full_sample() {
        let config = parse_config(SAMPLE).unwrap();
        assert!(config.enabled);
        assert_eq!(config.bus.sda_pin, 2);
        assert_eq!(config.bus.scl_pin, 3);
        assert_eq!(config.bus.address, 0x3C);
        assert_eq!(config.addressing.rows, RowTable::STANDARD);
        assert_eq!(config.addressing.overflow, OverflowPolicy::Clamp);
        assert_eq!(config.panel.address, 0x3D);
        assert_eq!(config.panel.rows, RowTable::SEQUENTIAL);
        assert_eq!(config.panel.column_offset, -4);
        assert_eq!(config.panel.contrast, Some(0xCF));
        assert_eq!(config.panel.reset_pin, Some(6));
        assert_eq!(config.panel.telemetry_interval_ms, Some(250));
        assert_eq!(config.telemetry.port, 40000);
        assert_eq!(config.telemetry.heartbeat_ms, 5000);
        assert_eq!(config.telemetry.mode.as_str(), "SSD1311");
        assert_eq!(
            config.telemetry.destinations.as_slice(),
            &[Ipv4Addr::new(192, 168, 4, 255), Ipv4Addr::new(10, 0, 0, 255)]
        );
        assert_eq!(&config.greeting[0], b"Hello, bridge       ");
        assert_eq!(&config.greeting[2], &[b' '; COLS]);
    }

    #[test]
    fn test_empty_input_gives_defaults() {
        assert_eq!(parse_config("").unwrap(), BridgeConfig::default());
        assert_eq!(parse_config("# only a comment\n\n").unwrap(), BridgeConfig::default());
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert_eq!(parse_config("[wifi]\nssid = \"x\""), Err(ConfigError::InvalidSection));
    }

    #[test]
    fn test_unknown_key_ignored() {
        let config = parse_config("[bus]\nspeed_mode = \"turbo\"\n").unwrap();
        assert_eq!(config.bus, BridgeConfig::default().bus);
    }

    #[test]
    fn test_emulator_profile_alias() {
        let config = parse_config("[addressing]\nprofile = \"emulator\"").unwrap();
        assert_eq!(config.addressing.rows, RowTable::SEQUENTIAL);
    }

    #[test]
    fn test_firmware_config_matches_defaults() {
        let shipped = include_str!("../../../oledbridge-firmware/bridge.toml");
        let config = parse_config(shipped).unwrap();
        let defaults = BridgeConfig::default();
        assert_eq!(config.addressing.rows, RowTable::SEQUENTIAL);
        assert_eq!(config.addressing.rows, defaults.addressing.rows);
        assert_eq!(config.addressing.overflow, OverflowPolicy::Wrap);
        assert_eq!(config.greeting, defaults.greeting);
    }

    #[test]
    fn test_unknown_profile_rejected() {
        assert_eq!(
            parse_config("[panel]\nprofile = \"diagonal\""),
            Err(ConfigError::InvalidProfile)
        );
    }

    #[test]
    fn test_custom_profile_requires_rows() {
        assert_eq!(
            parse_config("[panel]\nprofile = \"custom\""),
            Err(ConfigError::MissingRows)
        );
    }

    #[test]
    fn test_rows_must_be_seven_bit() {
        assert_eq!(
            parse_config("[addressing]\nrows = [0x00, 0x40, 0x14, 0x80]"),
            Err(ConfigError::InvalidAddress)
        );
        assert_eq!(
            parse_config("[addressing]\nrows = [0, 1, 2]"),
            Err(ConfigError::InvalidValue)
        );
    }

    #[test]
    fn test_reserved_address_rejected() {
        assert_eq!(parse_config("[bus]\naddress = 0x78"), Err(ConfigError::InvalidAddress));
        assert_eq!(parse_config("[bus]\naddress = 3"), Err(ConfigError::InvalidAddress));
    }

    #[test]
    fn test_invalid_values() {
        assert_eq!(parse_config("enabled = yes"), Err(ConfigError::InvalidValue));
        assert_eq!(parse_config("[telemetry]\nport = 70000"), Err(ConfigError::InvalidValue));
        assert_eq!(parse_config("[bus]\nnot a pair"), Err(ConfigError::InvalidLine));
    }

    #[test]
    fn test_parse_array() {
        let items = parse_array(r#"["a, b", 2 ,"c"]"#).unwrap();
        assert_eq!(items.as_slice(), &["\"a, b\"", "2", "\"c\""]);
        assert!(parse_array("[]").unwrap().is_empty());
        assert!(parse_array("1, 2").is_err());
    }

    #[test]
    fn test_parse_int_forms() {
        assert_eq!(parse_int::<u8>("0x3C"), Ok(0x3C));
        assert_eq!(parse_int::<u32>("100_000"), Ok(100_000));
        assert_eq!(parse_int::<i8>("-3"), Ok(-3));
        assert_eq!(parse_int::<u8>("256"), Err(ConfigError::InvalidValue));
    }

    #[test]
    fn test_hash_inside_string_kept() {
        let config = parse_config("[telemetry]\nmode = \"A#1\" # comment").unwrap();
        assert_eq!(config.telemetry.mode.as_str(), "A#1");
    }
}
