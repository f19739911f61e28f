//! Datagram broadcaster
//!
//! Sends each frame to the limited broadcast address and to the subnet
//! broadcast address of every active interface. Each destination is tried
//! independently.

use core::net::{Ipv4Addr, SocketAddrV4};

use heapless::Vec;

use crate::traits::{DatagramSink, NetInterfaces, MAX_INTERFACES};

use super::fanout::{DeliveryReport, FrameSink};

/// Extra fixed destinations accepted from configuration
pub const MAX_STATIC_DESTINATIONS: usize = 4;

/// Upper bound on destinations per frame
pub const MAX_DESTINATIONS: usize = 1 + MAX_INTERFACES + MAX_STATIC_DESTINATIONS;

/// Datagram fan-out sink
pub struct Broadcaster<D, I> {
    sink: D,
    interfaces: I,
    port: u16,
    extra: Vec<Ipv4Addr, MAX_STATIC_DESTINATIONS>,
}

impl<D: DatagramSink, I: NetInterfaces> Broadcaster<D, I> {
    pub fn new(sink: D, interfaces: I, port: u16) -> Self {
        Self {
            sink,
            interfaces,
            port,
            extra: Vec::new(),
        }
    }

    /// Add fixed destinations (e.g. from configuration)
    pub fn with_static(mut self, destinations: &[Ipv4Addr]) -> Self {
        for &dst in destinations.iter().take(MAX_STATIC_DESTINATIONS) {
            let _ = self.extra.push(dst);
        }
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut D {
        &mut self.sink
    }

    /// Current destination list, de-duplicated, without zero addresses
    pub fn destinations(&self) -> Vec<Ipv4Addr, MAX_DESTINATIONS> {
        let mut out: Vec<Ipv4Addr, MAX_DESTINATIONS> = Vec::new();
        let subnets = self
            .interfaces
            .active_interfaces()
            .into_iter()
            .filter(|iface| !iface.ip.is_unspecified())
            .map(|iface| iface.subnet_broadcast());

        let candidates = core::iter::once(Ipv4Addr::BROADCAST)
            .chain(subnets)
            .chain(self.extra.iter().copied());

        for dst in candidates {
            if dst.is_unspecified() || out.contains(&dst) {
                continue;
            }
            if out.push(dst).is_err() {
                break;
            }
        }
        out
    }
}

impl<D: DatagramSink, I: NetInterfaces> FrameSink for Broadcaster<D, I> {
    fn deliver(&mut self, frame: &str, _now_ms: u32) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for dst in self.destinations() {
            report.attempted += 1;
            match self.sink.send_to(SocketAddrV4::new(dst, self.port), frame.as_bytes()) {
                Ok(()) => report.delivered += 1,
                Err(_e) => {
                    debug!("udp: send to {=[u8; 4]} failed", dst.octets());
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{InterfaceAddr, InterfaceKind, NetError};
    use oledbridge_protocol::DEFAULT_UDP_PORT;

    #[derive(Default)]
    struct Recorder {
        sent: std::vec::Vec<(SocketAddrV4, std::vec::Vec<u8>)>,
        fail: std::vec::Vec<Ipv4Addr>,
    }

    impl DatagramSink for Recorder {
        fn send_to(&mut self, dst: SocketAddrV4, payload: &[u8]) -> Result<(), NetError> {
            if self.fail.contains(dst.ip()) {
                return Err(NetError::Unavailable);
            }
            self.sent.push((dst, payload.to_vec()));
            Ok(())
        }
    }

    struct Ifaces(std::vec::Vec<InterfaceAddr>);

    impl NetInterfaces for Ifaces {
        fn active_interfaces(&self) -> Vec<InterfaceAddr, MAX_INTERFACES> {
            self.0.iter().copied().take(MAX_INTERFACES).collect()
        }
    }

    fn sta() -> InterfaceAddr {
        InterfaceAddr::new(
            InterfaceKind::Station,
            Ipv4Addr::new(192, 168, 1, 42),
            Ipv4Addr::new(255, 255, 255, 0),
        )
    }

    fn ap() -> InterfaceAddr {
        InterfaceAddr::new(
            InterfaceKind::AccessPoint,
            Ipv4Addr::new(192, 168, 4, 1),
            Ipv4Addr::new(255, 255, 255, 0),
        )
    }

    #[test]
    fn test_destinations_both_interfaces() {
        let b = Broadcaster::new(Recorder::default(), Ifaces(vec![sta(), ap()]), DEFAULT_UDP_PORT);
        assert_eq!(
            b.destinations().as_slice(),
            &[
                Ipv4Addr::BROADCAST,
                Ipv4Addr::new(192, 168, 1, 255),
                Ipv4Addr::new(192, 168, 4, 255),
            ]
        );
    }

    #[test]
    fn test_destinations_skip_down_interface_and_duplicates() {
        let down = InterfaceAddr::new(
            InterfaceKind::Station,
            Ipv4Addr::UNSPECIFIED,
            Ipv4Addr::UNSPECIFIED,
        );
        let b = Broadcaster::new(
            Recorder::default(),
            Ifaces(vec![down, sta(), sta()]),
            DEFAULT_UDP_PORT,
        )
        .with_static(&[Ipv4Addr::new(192, 168, 1, 255), Ipv4Addr::UNSPECIFIED]);

        assert_eq!(
            b.destinations().as_slice(),
            &[Ipv4Addr::BROADCAST, Ipv4Addr::new(192, 168, 1, 255)]
        );
    }

    #[test]
    fn test_no_interfaces_still_broadcasts() {
        let mut b = Broadcaster::new(Recorder::default(), Ifaces(vec![]), 35182);
        let report = b.deliver("{\"type\":\"lcd20x4\"}", 0);
        assert_eq!(report, DeliveryReport::new(1, 1));
        let (dst, payload) = &b.sink().sent[0];
        assert_eq!(*dst, SocketAddrV4::new(Ipv4Addr::BROADCAST, 35182));
        assert_eq!(payload.as_slice(), b"{\"type\":\"lcd20x4\"}");
    }

    #[test]
    fn test_one_failure_does_not_stop_others() {
        let recorder = Recorder {
            fail: vec![Ipv4Addr::new(192, 168, 1, 255)],
            ..Recorder::default()
        };
        let mut b = Broadcaster::new(recorder, Ifaces(vec![sta(), ap()]), 35182);
        let report = b.deliver("x", 0);
        assert_eq!(report, DeliveryReport::new(3, 2));
        let ips: std::vec::Vec<_> = b.sink().sent.iter().map(|(d, _)| *d.ip()).collect();
        assert_eq!(ips, vec![Ipv4Addr::BROADCAST, Ipv4Addr::new(192, 168, 4, 255)]);
    }
}
