//! Collaborator traits
//!
//! These traits define the interface between the bridge logic and the
//! transports that carry its frames. Bus attachment lives in
//! `oledbridge-hal`.

pub mod net;

pub use net::{
    DatagramSink, InterfaceAddr, InterfaceKind, NetError, NetInterfaces, PushSubscriber,
    MAX_INTERFACES,
};
