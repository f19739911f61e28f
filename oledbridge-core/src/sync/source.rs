//! Frame production
//!
//! Pairs a [`ChangeDetector`] with the frame identity (mode and source
//! address) so a due send comes back as an owned, already encoded frame.
//! Encoding happens wherever `poll` is called; delivery can then run
//! elsewhere, e.g. outside a lock.

use alloc::string::String;

use heapless::String as HString;

use oledbridge_protocol::telemetry::{TelemetryError, TAG_LEN};

use crate::model::DisplayModel;

use super::detector::{ChangeDetector, SendReason, SyncTiming};

/// Encoded frame waiting for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFrame {
    /// JSON record
    pub json: String,
    pub reason: SendReason,
    /// Poll time that produced the frame
    pub at_ms: u32,
}

/// Decides when to send and encodes the frame
#[derive(Debug, Clone)]
pub struct FrameSource {
    detector: ChangeDetector,
    mode: HString<TAG_LEN>,
    source_address: u8,
}

impl FrameSource {
    pub fn new(timing: SyncTiming, mode: &str, source_address: u8) -> Self {
        let mut tag = HString::new();
        for c in mode.chars() {
            if tag.push(c).is_err() {
                break;
            }
        }
        Self {
            detector: ChangeDetector::new(timing),
            mode: tag,
            source_address,
        }
    }

    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    pub fn start(&mut self, now_ms: u32) {
        self.detector.start(now_ms);
    }

    pub fn stop(&mut self) {
        self.detector.stop();
    }

    pub fn request_force(&mut self) {
        self.detector.request_force();
    }

    /// Encode `model` as it would be sent
    pub fn encode(&self, model: &DisplayModel) -> Result<String, TelemetryError> {
        model
            .to_frame(self.mode.as_str(), self.source_address)?
            .to_json()
    }

    /// Return an encoded frame if one is due
    pub fn poll(&mut self, model: &DisplayModel, now_ms: u32) -> Option<PendingFrame> {
        let reason = self.detector.poll(model, now_ms)?;
        match self.encode(model) {
            Ok(json) => {
                if reason.is_forced() {
                    info!("sync: {} frame {=str}", reason, json.as_str());
                } else {
                    trace!("sync: {} frame", reason);
                }
                Some(PendingFrame {
                    json,
                    reason,
                    at_ms: now_ms,
                })
            }
            Err(_e) => {
                error!("sync: frame encode failed: {}", _e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oledbridge_protocol::DisplayFrame;

    #[test]
    fn test_poll_encodes_frame() {
        let mut source = FrameSource::new(SyncTiming::default(), "US2066", 0x3C);
        let mut model = DisplayModel::blank();
        model.write_row(0, b"HELLO");
        source.start(0);

        let frame = source.poll(&model, 0).unwrap();
        assert_eq!(frame.reason, SendReason::Boot);
        assert_eq!(frame.at_ms, 0);

        let decoded = DisplayFrame::from_json(frame.json.as_bytes()).unwrap();
        assert_eq!(decoded.addr.as_str(), "0x3C");
        assert_eq!(decoded.mode.as_str(), "US2066");
        assert_eq!(decoded.rows[0].as_str(), "HELLO               ");
    }

    #[test]
    fn test_nothing_due_before_start() {
        let mut source = FrameSource::new(SyncTiming::default(), "US2066", 0x3C);
        assert!(source.poll(&DisplayModel::blank(), 5000).is_none());
    }

    #[test]
    fn test_long_mode_truncated() {
        let source = FrameSource::new(SyncTiming::default(), "A-VERY-LONG-MODE-NAME", 0x3C);
        let json = source.encode(&DisplayModel::blank()).unwrap();
        assert!(json.contains("\"mode\":\"A-VERY-LONG-MODE\""));
    }
}
