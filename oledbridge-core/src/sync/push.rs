//! Push-stream subscribers
//!
//! Holds the live-view clients. Each frame goes out as a named event; a
//! subscriber whose send fails is dropped without affecting the others.
//! Idle streams get an empty keepalive event.

use heapless::Vec;

use oledbridge_protocol::telemetry::{EVENT_FRAME, EVENT_KEEPALIVE};

use crate::traits::PushSubscriber;

use super::fanout::{DeliveryReport, FrameSink};

/// Default idle time before a keepalive
pub const DEFAULT_KEEPALIVE_MS: u32 = 15_000;

/// Fixed-capacity set of push subscribers
pub struct PushHub<S, const N: usize> {
    subscribers: Vec<S, N>,
    keepalive_ms: u32,
    last_activity_ms: u32,
    next_id: u32,
}

impl<S: PushSubscriber, const N: usize> PushHub<S, N> {
    pub fn new(keepalive_ms: u32) -> Self {
        Self {
            subscribers: Vec::new(),
            keepalive_ms,
            last_activity_ms: 0,
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Attach a subscriber and send it `current` straight away
    ///
    /// Returns the subscriber back if the hub is full. A subscriber whose
    /// first send fails is not kept.
    pub fn subscribe(&mut self, mut subscriber: S, current: &str) -> Result<(), S> {
        if self.subscribers.is_full() {
            return Err(subscriber);
        }
        let id = self.take_id();
        match subscriber.send_event(EVENT_FRAME, current, id) {
            Ok(()) => {
                // Capacity checked above
                let _ = self.subscribers.push(subscriber);
                debug!("push: subscriber attached ({=usize} total)", self.subscribers.len());
            }
            Err(_e) => debug!("push: subscriber failed on first frame"),
        }
        Ok(())
    }

    /// Send one event to every subscriber, dropping those that fail
    fn broadcast_event(&mut self, event: &str, data: &str, now_ms: u32) -> DeliveryReport {
        let id = self.take_id();
        let attempted = self.subscribers.len() as u16;
        self.subscribers
            .retain_mut(|subscriber| subscriber.send_event(event, data, id).is_ok());
        let delivered = self.subscribers.len() as u16;
        if delivered < attempted {
            debug!("push: dropped {=u16} subscriber(s)", attempted - delivered);
        }
        self.last_activity_ms = now_ms;
        DeliveryReport::new(attempted, delivered)
    }

    /// Publish a frame
    pub fn publish(&mut self, frame: &str, now_ms: u32) -> DeliveryReport {
        self.broadcast_event(EVENT_FRAME, frame, now_ms)
    }

    /// Send a keepalive if nothing went out for longer than the keepalive interval
    pub fn keepalive(&mut self, now_ms: u32) -> Option<DeliveryReport> {
        if now_ms.wrapping_sub(self.last_activity_ms) > self.keepalive_ms {
            Some(self.broadcast_event(EVENT_KEEPALIVE, "", now_ms))
        } else {
            None
        }
    }

    fn take_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }
}

impl<S: PushSubscriber, const N: usize> FrameSink for PushHub<S, N> {
    fn deliver(&mut self, frame: &str, now_ms: u32) -> DeliveryReport {
        self.publish(frame, now_ms)
    }

    fn idle(&mut self, now_ms: u32) {
        let _ = self.keepalive(now_ms);
    }
}
