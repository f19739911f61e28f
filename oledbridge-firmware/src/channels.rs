//! Inter-task state
//!
//! The bridge sits behind a blocking mutex: the bus task and the tick task
//! each hold it only for a decode or a poll, never across an await.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::Instant;

use oledbridge_core::traits::{InterfaceAddr, NetInterfaces, MAX_INTERFACES};
use oledbridge_core::Bridge;
use oledbridge_drivers::link::LinkInterfaces;
use oledbridge_hal_rp2040::{BusCommand, TargetControl};

pub type FwBridge = Bridge<TargetControl>;

/// The bridge context, installed once by `main`
pub static BRIDGE: Mutex<CriticalSectionRawMutex, RefCell<Option<FwBridge>>> =
    Mutex::new(RefCell::new(None));

/// Attach/detach requests for the bus task
pub static BUS_COMMAND: Signal<CriticalSectionRawMutex, BusCommand> = Signal::new();

/// A live-view client connected on the coprocessor
pub static SUBSCRIBE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Interfaces last reported over the link
pub static INTERFACES: Mutex<CriticalSectionRawMutex, RefCell<LinkInterfaces>> =
    Mutex::new(RefCell::new(LinkInterfaces::new()));

/// Run `f` on the bridge; `None` until it is installed
pub fn with_bridge<R>(f: impl FnOnce(&mut FwBridge) -> R) -> Option<R> {
    BRIDGE.lock(|cell| cell.borrow_mut().as_mut().map(f))
}

/// Milliseconds since boot, wrapping
pub fn now_ms() -> u32 {
    Instant::now().as_millis() as u32
}

/// [`NetInterfaces`] view of [`INTERFACES`]
pub struct SharedInterfaces;

impl NetInterfaces for SharedInterfaces {
    fn active_interfaces(&self) -> heapless::Vec<InterfaceAddr, MAX_INTERFACES> {
        INTERFACES.lock(|cell| cell.borrow().active_interfaces())
    }
}
