//! Physical panel mirror task
//!
//! Copies the bridge's display model onto a US2066 panel on I2C0. The model
//! is cloned under the lock only when its fingerprint moved; the bus writes
//! happen after the lock is released.

use defmt::*;
use embassy_rp::gpio::Output;
use embassy_rp::i2c::{Blocking, I2c};
use embassy_rp::peripherals::I2C0;
use embassy_time::{Delay, Duration, Ticker, Timer};

use oledbridge_core::config::PanelConfig;
use oledbridge_core::sync::Fingerprint;
use oledbridge_drivers::Us2066;

use crate::channels::with_bridge;

/// Mirror refresh interval in milliseconds
pub const PANEL_REFRESH_MS: u64 = 50;

/// Wait before retrying a panel that failed to initialize
pub const PANEL_RETRY_MS: u64 = 1000;

/// Panel task - mirrors the display model onto hardware
#[embassy_executor::task]
pub async fn panel_task(
    i2c: I2c<'static, I2C0, Blocking>,
    mut reset: Option<Output<'static>>,
    config: PanelConfig,
) {
    info!("Panel task started (address {=u8:#x})", config.address);

    let mut panel = Us2066::new(i2c, Delay, &config);
    let mut ticker = Ticker::every(Duration::from_millis(PANEL_REFRESH_MS));
    let mut shown: Option<Fingerprint> = None;

    loop {
        if !panel.is_initialized() || panel.has_bus_error() {
            let result = match reset.as_mut() {
                Some(pin) => panel.init_with_reset(pin),
                None => panel.init(),
            };
            if let Err(e) = result {
                warn!("Panel init failed: {:?}", e);
                Timer::after_millis(PANEL_RETRY_MS).await;
                continue;
            }
            if let Some(level) = config.contrast {
                if let Err(e) = panel.set_contrast(level) {
                    warn!("Panel contrast not applied: {:?}", e);
                }
            }
            info!("Panel ready");
            shown = None;
        }

        ticker.next().await;

        let changed = with_bridge(|bridge| {
            let model = bridge.display();
            let fingerprint = Fingerprint::of(model);
            (shown != Some(fingerprint)).then(|| (fingerprint, model.clone()))
        })
        .flatten();

        if let Some((fingerprint, model)) = changed {
            match panel.mirror(&model) {
                Ok(()) => shown = Some(fingerprint),
                Err(e) => warn!("Panel mirror failed: {:?}", e),
            }
        }
    }
}
