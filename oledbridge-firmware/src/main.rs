//! OLED bridge firmware
//!
//! Poses as a 20×4 US2066 character OLED on an I2C bus, keeps the text the
//! host writes, mirrors it onto a real panel and publishes it as JSON frames
//! through a network coprocessor.

#![no_std]
#![no_main]

extern crate alloc;

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::i2c::{Config as I2cConfig, I2c, InterruptHandler as I2cInterruptHandler};
use embassy_rp::peripherals::{I2C1, UART0};
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use embedded_alloc::LlffHeap as Heap;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use oledbridge_core::{parse_config, Bridge, BridgeConfig};
use oledbridge_hal_rp2040::{I2cId, TargetControl};

use crate::channels::{now_ms, BRIDGE, BUS_COMMAND};

// Heap allocator for frame encoding
#[global_allocator]
static HEAP: Heap = Heap::empty();

// Heap size: 16KB
const HEAP_SIZE: usize = 16 * 1024;

/// Embedded configuration (compiled into firmware)
/// Edit bridge.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../bridge.toml");

mod board;
mod channels;
mod tasks;

bind_interrupts!(pub struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
    I2C1_IRQ => I2cInterruptHandler<I2C1>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 1024]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("OLED bridge firmware starting...");

    init_heap();

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let config = load_config();

    // Bridge context; begin() queues the first attach for the bus task
    let control = TargetControl::new(&BUS_COMMAND, I2cId::I2c1, board::BUS_SDA, board::BUS_SCL);
    let mut bridge = Bridge::new(&config, control);
    if !bridge.begin(now_ms()) {
        warn!("Bus not acquired; frames are still published");
    }
    BRIDGE.lock(|cell| cell.replace(Some(bridge)));

    // Coprocessor link
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = board::LINK_BAUDRATE;
    let tx_buf = TX_BUF.init([0u8; 1024]);
    let rx_buf = RX_BUF.init([0u8; 256]);
    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();
    info!(
        "Link UART initialized (tx gpio{=u8}, rx gpio{=u8})",
        board::LINK_TX,
        board::LINK_RX
    );

    spawner.spawn(tasks::bus_task(p.I2C1, p.PIN_3, p.PIN_2)).unwrap();
    spawner
        .spawn(tasks::tick_task(tx, (&config.telemetry).into()))
        .unwrap();
    spawner.spawn(tasks::link_rx_task(rx)).unwrap();

    // Physical panel, if configured and wired where the board expects it
    let panel = config.panel;
    if !panel.enabled {
        info!("Panel mirror disabled");
    } else if panel.sda_pin != board::PANEL_SDA || panel.scl_pin != board::PANEL_SCL {
        warn!(
            "Panel pins gpio{=u8}/gpio{=u8} not wired on this board, mirror disabled",
            panel.sda_pin,
            panel.scl_pin
        );
    } else {
        let mut i2c_config = I2cConfig::default();
        i2c_config.frequency = panel.i2c.frequency;
        let i2c = I2c::new_blocking(p.I2C0, p.PIN_5, p.PIN_4, i2c_config);

        let reset = match panel.reset_pin {
            Some(board::PANEL_RESET) => Some(Output::new(p.PIN_6, Level::High)),
            Some(other) => {
                warn!("Panel reset gpio{=u8} not wired, ignored", other);
                None
            }
            None => None,
        };

        spawner
            .spawn(tasks::panel_task(i2c, reset, panel))
            .unwrap();
    }

    info!("All tasks spawned, bridge running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}

/// Initialize the heap allocator
fn init_heap() {
    use core::mem::MaybeUninit;
    static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
    #[allow(static_mut_refs)]
    unsafe {
        HEAP.init(HEAP_MEM.as_ptr() as usize, HEAP_SIZE)
    }
}

/// Parse the embedded configuration, falling back to defaults
fn load_config() -> BridgeConfig {
    match parse_config(EMBEDDED_CONFIG) {
        Ok(config) => {
            info!(
                "Configuration loaded: target {=u8:#x}, port {=u16}",
                config.bus.address,
                config.telemetry.port
            );
            config
        }
        Err(e) => {
            // build.rs validates bridge.toml, so this only trips on parser gaps
            error!("Failed to parse embedded config: {}", e);
            error!("Using default configuration");
            BridgeConfig::default()
        }
    }
}
