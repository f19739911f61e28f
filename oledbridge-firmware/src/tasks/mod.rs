//! Embassy async tasks
//!
//! Each task runs independently and communicates via the statics in
//! `channels`.

pub mod bus;
pub mod link_rx;
pub mod panel;
pub mod tick;

pub use bus::bus_task;
pub use link_rx::link_rx_task;
pub use panel::panel_task;
pub use tick::{tick_task, TelemetrySettings};
