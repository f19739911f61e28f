//! Coprocessor link driver
//!
//! The bridge MCU has no network stack of its own. Datagrams and push
//! events are framed with the link protocol and written to a UART; the
//! network coprocessor on the other end owns the sockets. The coprocessor
//! reports its interfaces back, which [`LinkInterfaces`] turns into the
//! list the broadcaster needs.

use core::cell::RefCell;
use core::net::SocketAddrV4;

use heapless::Vec;

use oledbridge_core::traits::{
    DatagramSink, InterfaceAddr, InterfaceKind, NetError, NetInterfaces, PushSubscriber,
    MAX_INTERFACES,
};
use oledbridge_hal::uart::UartTx;
use oledbridge_protocol::link::{InterfaceEntry, LinkError, LinkMessage};
use oledbridge_protocol::MAX_LINK_FRAME;

/// Link transmit counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkCounters {
    pub frames_sent: u32,
    pub oversized: u32,
    pub tx_errors: u32,
}

/// UART-backed transport to the network coprocessor
pub struct CoprocessorLink<U> {
    uart: U,
    buf: [u8; MAX_LINK_FRAME],
    counters: LinkCounters,
}

impl<U: UartTx> CoprocessorLink<U> {
    pub fn new(uart: U) -> Self {
        Self {
            uart,
            buf: [0; MAX_LINK_FRAME],
            counters: LinkCounters::default(),
        }
    }

    /// Frame and write one message
    pub fn send(&mut self, msg: &LinkMessage<'_>) -> Result<(), NetError> {
        let len = match msg.encode(&mut self.buf) {
            Ok(len) => len,
            Err(LinkError::PayloadTooLarge | LinkError::BufferTooSmall) => {
                self.counters.oversized += 1;
                warn!("link: message too large for a frame");
                return Err(NetError::TooLarge);
            }
            Err(_e) => {
                self.counters.tx_errors += 1;
                return Err(NetError::Io);
            }
        };
        if self.uart.write_blocking(&self.buf[..len]).is_err() {
            self.counters.tx_errors += 1;
            return Err(NetError::Io);
        }
        self.counters.frames_sent += 1;
        trace!("link: sent {=usize} bytes", len);
        Ok(())
    }

    pub fn counters(&self) -> LinkCounters {
        self.counters
    }

    pub fn uart_mut(&mut self) -> &mut U {
        &mut self.uart
    }

    pub fn release(self) -> U {
        self.uart
    }
}

impl<U: UartTx> DatagramSink for CoprocessorLink<U> {
    fn send_to(&mut self, dst: SocketAddrV4, payload: &[u8]) -> Result<(), NetError> {
        self.send(&LinkMessage::Datagram { dst, data: payload })
    }
}

impl<U: UartTx> PushSubscriber for CoprocessorLink<U> {
    // The coprocessor numbers events per client
    fn send_event(&mut self, event: &str, data: &str, _id: u32) -> Result<(), NetError> {
        self.send(&LinkMessage::PushEvent { event, data })
    }
}

/// Handle letting several sinks share one link
///
/// Both the broadcaster and the push hub want to own their transport; each
/// gets a copy of this handle instead.
pub struct SharedLink<'a, U>(&'a RefCell<CoprocessorLink<U>>);

impl<'a, U> SharedLink<'a, U> {
    pub fn new(link: &'a RefCell<CoprocessorLink<U>>) -> Self {
        Self(link)
    }
}

impl<U> Clone for SharedLink<'_, U> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<U> Copy for SharedLink<'_, U> {}

impl<U: UartTx> DatagramSink for SharedLink<'_, U> {
    fn send_to(&mut self, dst: SocketAddrV4, payload: &[u8]) -> Result<(), NetError> {
        let mut link = self.0.try_borrow_mut().map_err(|_| NetError::WouldBlock)?;
        link.send_to(dst, payload)
    }
}

impl<U: UartTx> PushSubscriber for SharedLink<'_, U> {
    fn send_event(&mut self, event: &str, data: &str, id: u32) -> Result<(), NetError> {
        let mut link = self.0.try_borrow_mut().map_err(|_| NetError::WouldBlock)?;
        link.send_event(event, data, id)
    }
}

/// Interfaces last reported by the coprocessor
#[derive(Debug, Clone, Default)]
pub struct LinkInterfaces {
    interfaces: Vec<InterfaceAddr, MAX_INTERFACES>,
}

impl LinkInterfaces {
    pub const fn new() -> Self {
        Self {
            interfaces: Vec::new(),
        }
    }

    /// Replace the list from an interface report
    ///
    /// Returns `false` for any other message. Entries beyond
    /// [`MAX_INTERFACES`] are dropped.
    pub fn update(&mut self, msg: &LinkMessage<'_>) -> bool {
        if !matches!(msg, LinkMessage::Interfaces { .. }) {
            return false;
        }
        self.interfaces.clear();
        for entry in msg.interfaces() {
            if self.interfaces.push(to_interface(entry)).is_err() {
                debug!("link: interface report truncated");
                break;
            }
        }
        debug!("link: {=usize} interface(s) active", self.interfaces.len());
        true
    }

    pub fn clear(&mut self) {
        self.interfaces.clear();
    }

    pub fn as_slice(&self) -> &[InterfaceAddr] {
        &self.interfaces
    }
}

impl NetInterfaces for LinkInterfaces {
    fn active_interfaces(&self) -> Vec<InterfaceAddr, MAX_INTERFACES> {
        self.interfaces.clone()
    }
}

fn to_interface(entry: InterfaceEntry) -> InterfaceAddr {
    let kind = match entry.kind {
        0 => InterfaceKind::Station,
        1 => InterfaceKind::AccessPoint,
        _ => InterfaceKind::Other,
    };
    InterfaceAddr::new(kind, entry.ip, entry.netmask)
}
