//! Polling tick
//!
//! Applies deferred enable/disable requests, asks the bridge for a due
//! frame and fans it out over the coprocessor link. The bridge lock is held
//! only for the poll; the UART writes happen after it is released.

use core::cell::RefCell;
use core::net::Ipv4Addr;

use defmt::*;
use embassy_rp::uart::BufferedUartTx;
use embassy_time::{Duration, Ticker};
use heapless::Vec;

use oledbridge_core::config::TelemetryConfig;
use oledbridge_core::sync::{idle_all, Broadcaster, FrameSink, PushHub, MAX_STATIC_DESTINATIONS};
use oledbridge_core::traits::PushSubscriber;
use oledbridge_core::deliver;
use oledbridge_drivers::link::{CoprocessorLink, SharedLink};
use oledbridge_hal_rp2040::IoUartTx;
use oledbridge_protocol::telemetry::EVENT_FRAME;

use crate::channels::{now_ms, with_bridge, SharedInterfaces, SUBSCRIBE};

/// Tick interval in milliseconds
pub const TICK_INTERVAL_MS: u64 = 20;

type LinkUart = IoUartTx<BufferedUartTx>;

/// Publishing parameters the tick task needs
pub struct TelemetrySettings {
    pub port: u16,
    pub keepalive_ms: u32,
    pub destinations: Vec<Ipv4Addr, MAX_STATIC_DESTINATIONS>,
}

impl From<&TelemetryConfig> for TelemetrySettings {
    fn from(config: &TelemetryConfig) -> Self {
        Self {
            port: config.port,
            keepalive_ms: config.keepalive_ms,
            destinations: config.destinations.clone(),
        }
    }
}

/// Tick task - polls the bridge and delivers frames
#[embassy_executor::task]
pub async fn tick_task(tx: BufferedUartTx, settings: TelemetrySettings) {
    info!("Tick task started");

    let link = RefCell::new(CoprocessorLink::new(IoUartTx::new(tx)));
    let mut broadcaster = Broadcaster::new(SharedLink::new(&link), SharedInterfaces, settings.port)
        .with_static(&settings.destinations);
    // The coprocessor fans push events out to its own clients
    let mut hub: PushHub<SharedLink<'_, LinkUart>, 1> = PushHub::new(settings.keepalive_ms);

    let mut ticker = Ticker::every(Duration::from_millis(TICK_INTERVAL_MS));
    let mut bus_ok_before = true;

    loop {
        ticker.next().await;
        let now = now_ms();

        if SUBSCRIBE.signaled() {
            SUBSCRIBE.reset();
            subscribe(&mut hub, SharedLink::new(&link));
        }

        let Some((bus_ok, pending)) = with_bridge(|bridge| (bridge.service(), bridge.poll(now)))
        else {
            continue;
        };

        if bus_ok != bus_ok_before {
            if bus_ok {
                info!("Bus attachment restored");
            } else {
                warn!("Bus attachment does not match the requested state");
            }
            bus_ok_before = bus_ok;
        }

        let mut sinks: [&mut dyn FrameSink; 2] = [&mut broadcaster, &mut hub];
        if let Some(frame) = pending {
            let report = deliver(&frame, &mut sinks);
            debug!(
                "Frame ({}) delivered {=u16}/{=u16}",
                frame.reason, report.delivered, report.attempted
            );
        }
        idle_all(&mut sinks, now);
    }
}

/// Send the current state to a newly connected live-view client
fn subscribe<'a>(hub: &mut PushHub<SharedLink<'a, LinkUart>, 1>, mut link: SharedLink<'a, LinkUart>) {
    let snapshot = match with_bridge(|bridge| bridge.snapshot_json()) {
        Some(Ok(json)) => json,
        Some(Err(e)) => {
            error!("Snapshot encode failed: {}", e);
            return;
        }
        None => return,
    };

    if hub.is_empty() {
        // Hub of one is empty, so subscribe cannot hand the link back
        let _ = hub.subscribe(link, &snapshot);
    } else if link.send_event(EVENT_FRAME, &snapshot, 0).is_err() {
        warn!("Snapshot to new subscriber failed");
    }
}
