//! Drive direction
//!
//! Application code writes into a [`DisplayModel`] and a panel driver
//! mirrors it onto hardware. The same change detection publishes frames
//! for that model, with the panel's own minimum interval.

use crate::config::BridgeConfig;
use crate::model::{Cursor, DisplayModel};
use crate::sync::{FrameSource, PendingFrame};

/// Model written by the application, optionally published
pub struct DriveSession {
    model: DisplayModel,
    source: Option<FrameSource>,
}

impl DriveSession {
    /// Publishing is enabled only when `panel.telemetry_interval_ms` is set
    pub fn new(config: &BridgeConfig) -> Self {
        let source = config.panel.telemetry_interval_ms.map(|interval_ms| {
            let mut timing = config.telemetry.timing();
            timing.min_interval_ms = interval_ms;
            FrameSource::new(
                timing,
                config.telemetry.mode.as_str(),
                config.panel.address,
            )
        });
        Self {
            model: DisplayModel::with_greeting(&config.greeting),
            source,
        }
    }

    pub fn model(&self) -> &DisplayModel {
        &self.model
    }

    pub fn is_publishing(&self) -> bool {
        self.source.is_some()
    }

    pub fn start(&mut self, now_ms: u32) {
        if let Some(source) = self.source.as_mut() {
            source.start(now_ms);
        }
    }

    /// Write `text` from `cursor`, stopping at the end of the row
    pub fn print(&mut self, cursor: Cursor, text: &str, now_ms: u32) {
        let row = cursor.row as usize;
        for (col, byte) in (cursor.col as usize..).zip(text.bytes()) {
            self.model.set_cell(row, col, byte);
        }
        self.model.touch(now_ms);
    }

    /// Replace one row
    pub fn write_row(&mut self, row: usize, text: &str, now_ms: u32) {
        self.model.write_row(row, text.as_bytes());
        self.model.touch(now_ms);
    }

    /// Blank the model and publish right away
    pub fn clear(&mut self, now_ms: u32) {
        self.model.clear();
        self.model.touch(now_ms);
        if let Some(source) = self.source.as_mut() {
            source.request_force();
        }
    }

    /// Encoded frame, if publishing and one is due
    pub fn poll(&mut self, now_ms: u32) -> Option<PendingFrame> {
        self.source.as_mut()?.poll(&self.model, now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SendReason;

    fn publishing(interval_ms: u32) -> DriveSession {
        let mut config = BridgeConfig::default();
        config.telemetry.boot_burst = 0;
        config.panel.telemetry_interval_ms = Some(interval_ms);
        DriveSession::new(&config)
    }

    #[test]
    fn test_not_publishing_by_default() {
        let mut session = DriveSession::new(&BridgeConfig::default());
        session.start(0);
        assert!(!session.is_publishing());
        assert!(session.poll(10_000).is_none());
    }

    #[test]
    fn test_print_stops_at_row_end() {
        let mut session = DriveSession::new(&BridgeConfig::default());
        session.clear(0);
        session.print(Cursor::new(1, 17), "ABCDEF", 5);
        assert_eq!(session.model().row_str(1), "                 ABC");
        assert_eq!(session.model().row_str(2), "                    ");
        assert_eq!(session.model().last_update_ms(), 5);
    }

    #[test]
    fn test_publishing_uses_panel_interval() {
        let mut session = publishing(500);
        session.start(0);
        assert_eq!(session.poll(0).map(|f| f.reason), Some(SendReason::Boot));

        session.write_row(0, "temperature 21C", 10);
        assert!(session.poll(400).is_none());
        assert_eq!(session.poll(501).map(|f| f.reason), Some(SendReason::Changed));
    }

    #[test]
    fn test_interval_floor() {
        let mut session = publishing(20);
        session.start(0);
        session.poll(0);
        session.write_row(0, "x", 1);
        assert!(session.poll(50).is_none());
        assert!(session.poll(101).is_some());
    }

    #[test]
    fn test_clear_forces_frame() {
        let mut session = publishing(1000);
        session.start(0);
        session.poll(0);
        session.clear(5);
        assert_eq!(session.poll(6).map(|f| f.reason), Some(SendReason::Forced));
    }
}
