//! Change detection and send scheduling

use crate::model::DisplayModel;

use super::fingerprint::Fingerprint;

/// Lowest accepted minimum inter-send interval
pub const MIN_INTERVAL_FLOOR_MS: u32 = 100;

/// Send scheduling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SyncTiming {
    /// A changed model is sent only once this much time has passed since the last send
    pub min_interval_ms: u32,
    /// An unchanged model is re-sent after this long
    pub heartbeat_ms: u32,
    /// Forced frames sent right after start
    pub boot_burst: u8,
    /// Spacing between boot frames
    pub boot_spacing_ms: u32,
}

impl Default for SyncTiming {
    fn default() -> Self {
        Self {
            min_interval_ms: 100,
            heartbeat_ms: 2000,
            boot_burst: 3,
            boot_spacing_ms: 250,
        }
    }
}

impl SyncTiming {
    /// Raise the minimum interval to the floor
    pub fn normalized(mut self) -> Self {
        self.min_interval_ms = self.min_interval_ms.max(MIN_INTERVAL_FLOOR_MS);
        self
    }
}

/// Why a frame is being sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendReason {
    /// Startup frame or boot burst
    Boot,
    /// Content changed
    Changed,
    /// Liveness while unchanged
    Heartbeat,
    /// Operator-significant event
    Forced,
}

impl SendReason {
    /// Whether the frame should be dumped to the log in full
    pub fn is_forced(self) -> bool {
        matches!(self, SendReason::Boot | SendReason::Forced)
    }
}

/// Decides when the model is due for a send
///
/// Inactive until [`ChangeDetector::start`]. Every send resets both the
/// coalescing window and the heartbeat timer.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    timing: SyncTiming,
    started: bool,
    initial_pending: bool,
    force_pending: bool,
    burst_left: u8,
    burst_last_ms: u32,
    last_fingerprint: Option<Fingerprint>,
    last_send_ms: u32,
    last_heartbeat_ms: u32,
}

impl ChangeDetector {
    pub fn new(timing: SyncTiming) -> Self {
        Self {
            timing: timing.normalized(),
            started: false,
            initial_pending: false,
            force_pending: false,
            burst_left: 0,
            burst_last_ms: 0,
            last_fingerprint: None,
            last_send_ms: 0,
            last_heartbeat_ms: 0,
        }
    }

    pub fn timing(&self) -> SyncTiming {
        self.timing
    }

    /// Begin scheduling: one immediate frame, then the boot burst
    pub fn start(&mut self, now_ms: u32) {
        self.started = true;
        self.initial_pending = true;
        self.burst_left = self.timing.boot_burst;
        self.burst_last_ms = now_ms;
        self.last_send_ms = now_ms;
        self.last_heartbeat_ms = now_ms;
    }

    /// Stop scheduling; pending forced frames are dropped
    pub fn stop(&mut self) {
        self.started = false;
        self.initial_pending = false;
        self.force_pending = false;
        self.burst_left = 0;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Frames left in the boot burst
    pub fn burst_remaining(&self) -> u8 {
        self.burst_left
    }

    /// Send on the next poll regardless of coalescing
    pub fn request_force(&mut self) {
        self.force_pending = true;
    }

    /// Decide whether `model` should be sent now
    ///
    /// A `Some` result is taken as sent: the caller is expected to encode
    /// and deliver the frame.
    pub fn poll(&mut self, model: &DisplayModel, now_ms: u32) -> Option<SendReason> {
        if !self.started {
            return None;
        }

        if self.initial_pending {
            self.initial_pending = false;
            return Some(self.sent(model, now_ms, SendReason::Boot));
        }

        if self.force_pending {
            self.force_pending = false;
            return Some(self.sent(model, now_ms, SendReason::Forced));
        }

        if self.burst_left > 0 {
            if now_ms.wrapping_sub(self.burst_last_ms) >= self.timing.boot_spacing_ms {
                self.burst_left -= 1;
                self.burst_last_ms = now_ms;
                return Some(self.sent(model, now_ms, SendReason::Boot));
            }
            // Organic sends wait for the burst to finish
            return None;
        }

        let fingerprint = Fingerprint::of(model);
        let changed = self.last_fingerprint != Some(fingerprint);
        let interval = now_ms.wrapping_sub(self.last_send_ms) > self.timing.min_interval_ms;
        let heartbeat = now_ms.wrapping_sub(self.last_heartbeat_ms) > self.timing.heartbeat_ms;

        if changed && interval {
            Some(self.record(fingerprint, now_ms, SendReason::Changed))
        } else if heartbeat {
            Some(self.record(fingerprint, now_ms, SendReason::Heartbeat))
        } else {
            None
        }
    }

    fn sent(&mut self, model: &DisplayModel, now_ms: u32, reason: SendReason) -> SendReason {
        self.record(Fingerprint::of(model), now_ms, reason)
    }

    fn record(&mut self, fingerprint: Fingerprint, now_ms: u32, reason: SendReason) -> SendReason {
        self.last_fingerprint = Some(fingerprint);
        self.last_send_ms = now_ms;
        self.last_heartbeat_ms = now_ms;
        reason
    }
}
