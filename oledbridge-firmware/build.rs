//! Build script for oledbridge-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates bridge.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate bridge.toml at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=bridge.toml");

    let config_path = Path::new("bridge.toml");
    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: bridge.toml not found!                                   ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds bridge.toml as its configuration.           ║\n\
            ║  Please create one in the oledbridge-firmware directory.         ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read bridge.toml                               ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in bridge.toml                       ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                {}\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = Vec::new();
    validate_bus(&config, &mut errors);
    validate_addressing(&config, "addressing", &mut errors);
    validate_panel(&config, &mut errors);
    validate_telemetry(&config, &mut errors);
    validate_greeting(&config, &mut errors);
    report("Invalid bridge.toml", &errors);

    println!("cargo:warning=bridge.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn report(title: &str, errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        errors
            .iter()
            .map(|e| format!("║  • {:<62} ║", e))
            .collect::<Vec<_>>()
            .join("\n")
    );
}

fn section<'a>(config: &'a toml::Value, name: &str) -> Option<&'a toml::Table> {
    config.get(name).and_then(|v| v.as_table())
}

/// Pins are `N` or `"gpioN"`
fn check_pin(table: &toml::Table, section: &str, key: &str, errors: &mut Vec<String>) {
    let pin = match table.get(key) {
        None => return,
        Some(toml::Value::Integer(n)) => Some(*n),
        Some(toml::Value::String(s)) => s
            .strip_prefix("gpio")
            .and_then(|n| n.parse::<i64>().ok()),
        Some(_) => None,
    };
    match pin {
        Some(0..=29) => {}
        _ => errors.push(format!("[{}] {} must be 0-29 or \"gpioN\"", section, key)),
    }
}

fn check_address(table: &toml::Table, section: &str, key: &str, errors: &mut Vec<String>) {
    match table.get(key) {
        None => {}
        Some(toml::Value::Integer(0x08..=0x77)) => {}
        Some(_) => errors.push(format!("[{}] {} must be 0x08-0x77", section, key)),
    }
}

fn check_range(
    table: &toml::Table,
    section: &str,
    key: &str,
    range: std::ops::RangeInclusive<i64>,
    errors: &mut Vec<String>,
) {
    match table.get(key) {
        None => {}
        Some(toml::Value::Integer(n)) if range.contains(n) => {}
        Some(_) => errors.push(format!(
            "[{}] {} must be {}-{}",
            section,
            key,
            range.start(),
            range.end()
        )),
    }
}

fn validate_bus(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(bus) = section(config, "bus") else {
        return;
    };
    check_pin(bus, "bus", "sda_pin", errors);
    check_pin(bus, "bus", "scl_pin", errors);
    check_address(bus, "bus", "address", errors);
    if bus.get("sda_pin").is_some() && bus.get("sda_pin") == bus.get("scl_pin") {
        errors.push("[bus] sda_pin and scl_pin must differ".into());
    }
}

/// Row table: `profile` plus `rows` when custom
fn validate_addressing(config: &toml::Value, name: &str, errors: &mut Vec<String>) {
    let Some(table) = section(config, name) else {
        return;
    };
    match table.get("profile").and_then(|p| p.as_str()) {
        None | Some("standard" | "sequential" | "emulator" | "alternative") => {}
        Some("custom") => match table.get("rows").and_then(|r| r.as_array()) {
            Some(rows) if rows.len() == 4 => {
                for row in rows {
                    if !matches!(row.as_integer(), Some(0..=0x7F)) {
                        errors.push(format!("[{}] rows must be 0x00-0x7F", name));
                        break;
                    }
                }
            }
            _ => errors.push(format!("[{}] custom profile needs rows = [4 bases]", name)),
        },
        Some(other) => errors.push(format!("[{}] unknown profile '{}'", name, other)),
    }
    if let Some(overflow) = table.get("overflow") {
        if !matches!(overflow.as_str(), Some("wrap" | "clamp" | "ignore")) {
            errors.push(format!("[{}] overflow must be wrap, clamp or ignore", name));
        }
    }
}

fn validate_panel(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(panel) = section(config, "panel") else {
        return;
    };
    validate_addressing(config, "panel", errors);
    check_address(panel, "panel", "address", errors);
    check_pin(panel, "panel", "sda_pin", errors);
    check_pin(panel, "panel", "scl_pin", errors);
    check_pin(panel, "panel", "reset_pin", errors);
    check_range(panel, "panel", "contrast", 0..=255, errors);
    check_range(panel, "panel", "telemetry_interval_ms", 0..=i64::from(u32::MAX), errors);
}

fn validate_telemetry(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(telemetry) = section(config, "telemetry") else {
        return;
    };
    check_range(telemetry, "telemetry", "port", 1..=65535, errors);
    check_range(telemetry, "telemetry", "boot_burst", 0..=255, errors);
    check_address(telemetry, "telemetry", "source_address", errors);
    if let Some(mode) = telemetry.get("mode") {
        if !matches!(mode.as_str(), Some(m) if !m.is_empty() && m.len() <= 16) {
            errors.push("[telemetry] mode must be 1-16 characters".into());
        }
    }
    if let Some(destinations) = telemetry.get("destinations") {
        match destinations.as_array() {
            Some(list) if list.len() <= 4 => {
                for dst in list {
                    if dst.as_str().and_then(|s| s.parse::<Ipv4Addr>().ok()).is_none() {
                        errors.push(format!("[telemetry] bad destination {}", dst));
                    }
                }
            }
            _ => errors.push("[telemetry] destinations must list up to 4 addresses".into()),
        }
    }
}

fn validate_greeting(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(greeting) = section(config, "greeting") else {
        return;
    };
    match greeting.get("lines").and_then(|l| l.as_array()) {
        None => {}
        Some(lines) if lines.len() > 4 => {
            errors.push("[greeting] at most 4 lines".into());
        }
        Some(lines) => {
            for line in lines {
                match line.as_str() {
                    Some(s) if s.len() <= 20 => {}
                    _ => errors.push("[greeting] lines must be strings of up to 20".into()),
                }
            }
        }
    }
}
