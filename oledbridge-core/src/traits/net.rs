//! Network collaborators
//!
//! The bridge never owns sockets. It hands datagrams and push events to
//! these traits and reads the active interface list from them.

use core::net::{Ipv4Addr, SocketAddrV4};

use heapless::Vec;

/// Maximum interfaces considered for subnet broadcast
pub const MAX_INTERFACES: usize = 4;

/// Errors reported by network collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetError {
    /// Interface or link is down
    Unavailable,
    /// Transmit queue or buffer full
    WouldBlock,
    /// Message too large for the transport
    TooLarge,
    /// Peer went away (push subscriber)
    Disconnected,
    /// Transport-specific failure
    Io,
}

/// Role of a network interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterfaceKind {
    /// Infrastructure-mode client
    Station,
    /// Local access point
    AccessPoint,
    /// Anything else (wired, tunnel)
    Other,
}

/// One active interface address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceAddr {
    pub kind: InterfaceKind,
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

impl InterfaceAddr {
    pub const fn new(kind: InterfaceKind, ip: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        Self { kind, ip, netmask }
    }

    /// Directed subnet broadcast address (`ip | !netmask`)
    pub fn subnet_broadcast(&self) -> Ipv4Addr {
        let ip = u32::from(self.ip);
        let mask = u32::from(self.netmask);
        Ipv4Addr::from(ip | !mask)
    }
}

/// Connectionless datagram transmit
pub trait DatagramSink {
    /// Send one datagram; fire-and-forget, no retry
    fn send_to(&mut self, dst: SocketAddrV4, payload: &[u8]) -> Result<(), NetError>;
}

/// Source of the currently active interfaces
pub trait NetInterfaces {
    fn active_interfaces(&self) -> Vec<InterfaceAddr, MAX_INTERFACES>;
}

/// A long-lived push-stream client
pub trait PushSubscriber {
    /// Deliver one named event
    fn send_event(&mut self, event: &str, data: &str, id: u32) -> Result<(), NetError>;
}

impl<T: DatagramSink + ?Sized> DatagramSink for &mut T {
    fn send_to(&mut self, dst: SocketAddrV4, payload: &[u8]) -> Result<(), NetError> {
        (**self).send_to(dst, payload)
    }
}
