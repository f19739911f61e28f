//! Frame sinks and fan-out

/// Per-delivery outcome
///
/// Not an error: a sink that reaches nobody is a health signal only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeliveryReport {
    /// Destinations tried
    pub attempted: u16,
    /// Destinations that accepted the frame
    pub delivered: u16,
}

impl DeliveryReport {
    pub const fn new(attempted: u16, delivered: u16) -> Self {
        Self {
            attempted,
            delivered,
        }
    }

    /// Combine two reports
    pub fn merge(self, other: Self) -> Self {
        Self {
            attempted: self.attempted.saturating_add(other.attempted),
            delivered: self.delivered.saturating_add(other.delivered),
        }
    }

    /// Destinations that rejected the frame
    pub fn failed(&self) -> u16 {
        self.attempted.saturating_sub(self.delivered)
    }
}

/// Anything that accepts serialized frames
pub trait FrameSink {
    /// Deliver one frame to every destination of this sink
    ///
    /// A failure on one destination must not stop the others.
    fn deliver(&mut self, frame: &str, now_ms: u32) -> DeliveryReport;

    /// Called on every tick whether or not a frame was sent
    fn idle(&mut self, _now_ms: u32) {}
}

impl<T: FrameSink + ?Sized> FrameSink for &mut T {
    fn deliver(&mut self, frame: &str, now_ms: u32) -> DeliveryReport {
        (**self).deliver(frame, now_ms)
    }

    fn idle(&mut self, now_ms: u32) {
        (**self).idle(now_ms)
    }
}

/// Deliver one frame to every sink
///
/// Logs a warning when no destination at all accepted the frame.
pub fn fan_out(frame: &str, sinks: &mut [&mut dyn FrameSink], now_ms: u32) -> DeliveryReport {
    let report = sinks
        .iter_mut()
        .map(|sink| sink.deliver(frame, now_ms))
        .fold(DeliveryReport::default(), DeliveryReport::merge);

    if report.delivered == 0 {
        warn!(
            "sync: frame reached no sink ({=u16} attempted)",
            report.attempted
        );
    } else if report.failed() > 0 {
        debug!(
            "sync: frame delivered to {=u16}/{=u16}",
            report.delivered,
            report.attempted
        );
    }
    report
}

/// Run the idle hook of every sink
pub fn idle_all(sinks: &mut [&mut dyn FrameSink], now_ms: u32) {
    for sink in sinks.iter_mut() {
        sink.idle(now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        report: DeliveryReport,
        frames: u32,
        idles: u32,
    }

    impl Fixed {
        fn new(attempted: u16, delivered: u16) -> Self {
            Self {
                report: DeliveryReport::new(attempted, delivered),
                frames: 0,
                idles: 0,
            }
        }
    }

    impl FrameSink for Fixed {
        fn deliver(&mut self, _frame: &str, _now_ms: u32) -> DeliveryReport {
            self.frames += 1;
            self.report
        }

        fn idle(&mut self, _now_ms: u32) {
            self.idles += 1;
        }
    }

    #[test]
    fn test_fan_out_sums_reports() {
        let mut a = Fixed::new(3, 2);
        let mut b = Fixed::new(2, 0);
        let report = fan_out("{}", &mut [&mut a, &mut b], 0);
        assert_eq!(report, DeliveryReport::new(5, 2));
        assert_eq!(report.failed(), 3);
        assert_eq!(a.frames, 1);
        assert_eq!(b.frames, 1);
    }

    #[test]
    fn test_failing_sink_does_not_stop_others() {
        let mut dead = Fixed::new(1, 0);
        let mut live = Fixed::new(1, 1);
        let report = fan_out("{}", &mut [&mut dead, &mut live], 0);
        assert_eq!(report.delivered, 1);
        assert_eq!(live.frames, 1);
    }

    #[test]
    fn test_no_sinks() {
        assert_eq!(fan_out("{}", &mut [], 0), DeliveryReport::default());
    }

    #[test]
    fn test_idle_all() {
        let mut a = Fixed::new(0, 0);
        let mut b = Fixed::new(0, 0);
        idle_all(&mut [&mut a, &mut b], 10);
        assert_eq!((a.idles, b.idles), (1, 1));
    }
}
