//! Change detection and frame fan-out
//!
//! ```text
//! DisplayModel ──► ChangeDetector ──► PendingFrame (JSON) ──► fan_out
//!                   (fingerprint,                              ├─► Broadcaster (UDP)
//!                    heartbeat,                                └─► PushHub (live view)
//!                    boot burst)
//! ```

pub mod broadcast;
pub mod detector;
pub mod fanout;
pub mod fingerprint;
pub mod push;
pub mod source;

pub use broadcast::{Broadcaster, MAX_DESTINATIONS, MAX_STATIC_DESTINATIONS};
pub use detector::{ChangeDetector, SendReason, SyncTiming, MIN_INTERVAL_FLOOR_MS};
pub use fanout::{fan_out, idle_all, DeliveryReport, FrameSink};
pub use fingerprint::Fingerprint;
pub use push::{PushHub, DEFAULT_KEEPALIVE_MS};
pub use source::{FrameSource, PendingFrame};
