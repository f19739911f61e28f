//! Bridge context
//!
//! One explicitly constructed object owns the display model, the bus
//! decoder, the frame source and the bus attachment. Callers hold it behind
//! whatever lock their executor provides; the bus path only needs
//! [`Bridge::on_receive`] and [`Bridge::on_request`], the polling tick
//! needs [`Bridge::service`] and [`Bridge::poll`]. Delivery to sinks takes
//! the encoded frame and does not need the bridge at all.

use alloc::string::String;

use oledbridge_hal::i2c::{I2cTarget, I2cTargetConfig};
use oledbridge_protocol::telemetry::TelemetryError;

use crate::config::{AddressingConfig, BridgeConfig};
use crate::decoder::{BusDecoder, DecoderStats, ReceiveOutcome};
use crate::model::DisplayModel;
use crate::runtime::RuntimeController;
use crate::sync::{fan_out, idle_all, DeliveryReport, FrameSink, FrameSource, PendingFrame, SendReason};

/// Outcome of one polling tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    /// Bus attachment matches the requested state
    pub bus_ok: bool,
    /// A frame went out, and why
    pub sent: Option<SendReason>,
    /// Delivery totals for the frame, if one went out
    pub delivery: DeliveryReport,
}

/// Emulated display bridge
pub struct Bridge<T> {
    model: DisplayModel,
    decoder: BusDecoder,
    source: FrameSource,
    runtime: RuntimeController<T>,
    bus: I2cTargetConfig,
    start_enabled: bool,
}

impl<T: I2cTarget> Bridge<T> {
    /// Build the bridge with the configured greeting on display
    pub fn new(config: &BridgeConfig, target: T) -> Self {
        Self {
            model: DisplayModel::with_greeting(&config.greeting),
            decoder: BusDecoder::new(config.addressing.map()),
            source: FrameSource::new(
                config.telemetry.timing(),
                config.telemetry.mode.as_str(),
                config.source_address(),
            ),
            runtime: RuntimeController::new(target),
            bus: config.bus,
            start_enabled: config.enabled,
        }
    }

    /// Attach to the bus (if enabled) and start the boot frames
    ///
    /// Returns `false` when the bus could not be acquired; frames are
    /// published regardless.
    pub fn begin(&mut self, now_ms: u32) -> bool {
        let attached = self.runtime.begin(self.bus, self.start_enabled);
        self.source.start(now_ms);
        info!(
            "bridge: started at {=u8:#x}, bus {}",
            self.bus.address,
            if attached { "ok" } else { "unavailable" }
        );
        attached
    }

    /// Receive callback: one complete transfer from the host
    pub fn on_receive(&mut self, bytes: &[u8], now_ms: u32) -> ReceiveOutcome {
        let outcome = self.decoder.receive(&mut self.model, bytes, now_ms);
        if outcome.force {
            self.source.request_force();
        }
        outcome
    }

    /// Request callback: status byte for the host
    pub fn on_request(&mut self) -> u8 {
        self.decoder.request(&self.model)
    }

    /// Apply deferred enable/disable requests
    pub fn service(&mut self) -> bool {
        self.runtime.service()
    }

    /// Encoded frame, if one is due
    pub fn poll(&mut self, now_ms: u32) -> Option<PendingFrame> {
        self.source.poll(&self.model, now_ms)
    }

    /// Service, poll and deliver in one step
    ///
    /// For callers that can hold the bridge during network I/O; others use
    /// [`Bridge::poll`] and [`deliver`] separately.
    pub fn tick(&mut self, sinks: &mut [&mut dyn FrameSink], now_ms: u32) -> TickReport {
        let bus_ok = self.service();
        let pending = self.poll(now_ms);
        let mut report = TickReport {
            bus_ok,
            ..TickReport::default()
        };
        if let Some(frame) = pending {
            report.sent = Some(frame.reason);
            report.delivery = deliver(&frame, sinks);
        }
        idle_all(sinks, now_ms);
        report
    }

    /// Live model
    pub fn display(&self) -> &DisplayModel {
        &self.model
    }

    /// Current state, encoded exactly like a sent frame
    pub fn snapshot_json(&self) -> Result<String, TelemetryError> {
        self.source.encode(&self.model)
    }

    /// Request the bus be attached or released on the next tick
    pub fn set_enabled(&mut self, enabled: bool) {
        self.runtime.set_enabled(enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.runtime.is_enabled()
    }

    pub fn is_attached(&self) -> bool {
        self.runtime.is_attached()
    }

    /// Send a frame on the next poll regardless of coalescing
    pub fn force_broadcast(&mut self) {
        self.source.request_force();
    }

    /// Swap the emulated address mapping; applies from the next pair
    pub fn set_addressing(&mut self, addressing: AddressingConfig) {
        self.decoder.set_map(addressing.map());
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    pub fn runtime(&self) -> &RuntimeController<T> {
        &self.runtime
    }
}

/// Fan a pending frame out to every sink
pub fn deliver(frame: &PendingFrame, sinks: &mut [&mut dyn FrameSink]) -> DeliveryReport {
    fan_out(frame.json.as_str(), sinks, frame.at_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OverflowPolicy, RowTable};
    use oledbridge_protocol::DisplayFrame;
    use std::vec::Vec;

    #[derive(Default)]
    struct FakeTarget {
        attached: bool,
        refuse: bool,
    }

    impl I2cTarget for FakeTarget {
        type Error = ();

        fn attach(&mut self, _config: &I2cTargetConfig) -> Result<(), ()> {
            if self.refuse {
                return Err(());
            }
            self.attached = true;
            Ok(())
        }

        fn detach(&mut self) {
            self.attached = false;
        }

        fn is_attached(&self) -> bool {
            self.attached
        }
    }

    #[derive(Default)]
    struct Collect {
        frames: Vec<std::string::String>,
        idles: u32,
    }

    impl FrameSink for Collect {
        fn deliver(&mut self, frame: &str, _now_ms: u32) -> DeliveryReport {
            self.frames.push(frame.into());
            DeliveryReport::new(1, 1)
        }

        fn idle(&mut self, _now_ms: u32) {
            self.idles += 1;
        }
    }

    fn quiet_config() -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.telemetry.boot_burst = 0;
        config
    }

    fn started(config: &BridgeConfig) -> Bridge<FakeTarget> {
        let mut bridge = Bridge::new(config, FakeTarget::default());
        assert!(bridge.begin(0));
        // Drain the initial boot frame
        assert_eq!(bridge.poll(0).map(|f| f.reason), Some(SendReason::Boot));
        bridge
    }

    #[test]
    fn test_greeting_shown_at_start() {
        let bridge = Bridge::new(&BridgeConfig::default(), FakeTarget::default());
        assert_eq!(bridge.display().row_str(0), "Theia OLED Emulator");
        assert!(bridge.display().flags().display_on);
    }

    #[test]
    fn test_clear_then_text_forces_frame() {
        let mut bridge = started(&quiet_config());
        bridge.on_receive(&[0x80, 0x01, 0x40, b'H', 0x40, b'I'], 5);

        let frame = bridge.poll(6).unwrap();
        assert_eq!(frame.reason, SendReason::Forced);
        let decoded = DisplayFrame::from_json(frame.json.as_bytes()).unwrap();
        assert_eq!(decoded.rows[0].as_str(), "HI                  ");
        assert_eq!(decoded.rows[1].as_str(), "                    ");
        assert_eq!((decoded.cursor.r, decoded.cursor.c), (0, 2));
        assert_eq!(bridge.on_request(), 0x02);
    }

    #[test]
    fn test_text_without_clear_is_coalesced() {
        let mut bridge = started(&quiet_config());
        bridge.on_receive(&[0x40, b'A'], 10);
        assert!(bridge.poll(10).is_none());
        assert_eq!(bridge.poll(101).map(|f| f.reason), Some(SendReason::Changed));
    }

    #[test]
    fn test_snapshot_matches_sent_frame() {
        let mut bridge = started(&quiet_config());
        bridge.on_receive(&[0x80, 0x01, 0x40, b'Z'], 1);
        let snapshot = bridge.snapshot_json().unwrap();
        let frame = bridge.poll(2).unwrap();
        assert_eq!(snapshot, frame.json);
    }

    #[test]
    fn test_disable_keeps_model() {
        let mut bridge = started(&quiet_config());
        bridge.on_receive(&[0x40, b'K'], 1);
        bridge.set_enabled(false);
        assert!(bridge.is_attached());
        assert!(bridge.service());
        assert!(!bridge.is_attached());
        assert_eq!(bridge.display().cell(0, 0), b'K');

        bridge.set_enabled(true);
        assert!(bridge.service());
        assert!(bridge.is_attached());
        assert_eq!(bridge.display().cell(0, 0), b'K');
    }

    #[test]
    fn test_begin_reports_bus_failure() {
        let target = FakeTarget {
            refuse: true,
            ..FakeTarget::default()
        };
        let mut bridge = Bridge::new(&BridgeConfig::default(), target);
        assert!(!bridge.begin(0));
        // Frames still flow
        assert!(bridge.poll(0).is_some());
    }

    #[test]
    fn test_tick_delivers_and_idles() {
        let mut bridge = Bridge::new(&quiet_config(), FakeTarget::default());
        bridge.begin(0);
        let mut sink = Collect::default();

        let report = bridge.tick(&mut [&mut sink], 0);
        assert!(report.bus_ok);
        assert_eq!(report.sent, Some(SendReason::Boot));
        assert_eq!(report.delivery, DeliveryReport::new(1, 1));

        let report = bridge.tick(&mut [&mut sink], 10);
        assert_eq!(report.sent, None);
        assert_eq!(sink.frames.len(), 1);
        assert_eq!(sink.idles, 2);
    }

    #[test]
    fn test_force_broadcast() {
        let mut bridge = started(&quiet_config());
        bridge.force_broadcast();
        assert_eq!(bridge.poll(1).map(|f| f.reason), Some(SendReason::Forced));
    }

    #[test]
    fn test_set_addressing_applies_to_next_pair() {
        let mut bridge = started(&quiet_config());
        bridge.on_receive(&[0x80, 0x80 | 0x14], 1);
        assert_eq!(bridge.display().cursor().row, 0);

        bridge.set_addressing(AddressingConfig {
            rows: RowTable::STANDARD,
            overflow: OverflowPolicy::Wrap,
        });
        bridge.on_receive(&[0x80, 0x80 | 0x14], 2);
        assert_eq!(bridge.display().cursor().row, 2);
        assert_eq!(bridge.display().cursor().col, 0);
    }

    #[test]
    fn test_stats_count_anomalies() {
        let mut bridge = started(&quiet_config());
        bridge.on_receive(&[0x00, 0x41, 0x40], 1);
        let stats = bridge.stats();
        assert_eq!(stats.unknown_control, 1);
        assert_eq!(stats.stray, 1);
    }
}
