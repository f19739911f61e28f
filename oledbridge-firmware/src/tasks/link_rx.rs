//! Coprocessor link receive task
//!
//! Parses frames from the network coprocessor: interface reports update the
//! broadcast targets, subscribe notices ask the tick task for a snapshot.

use defmt::*;
use embassy_rp::uart::BufferedUartRx;
use embedded_io_async::Read;

use oledbridge_protocol::{LinkFrame, LinkMessage, LinkParser};

use crate::channels::{INTERFACES, SUBSCRIBE};

/// Buffer size for UART receive
const RX_BUF_SIZE: usize = 64;

/// Link RX task - receives and parses frames from the coprocessor
#[embassy_executor::task]
pub async fn link_rx_task(mut rx: BufferedUartRx) {
    info!("Link RX task started");

    let mut parser = LinkParser::new();
    let mut buf = [0u8; RX_BUF_SIZE];

    loop {
        match rx.read(&mut buf).await {
            Ok(n) if n > 0 => {
                for &byte in &buf[..n] {
                    match parser.feed(byte) {
                        Ok(Some(frame)) => handle_frame(&frame),
                        Ok(None) => {}
                        Err(e) => warn!("Link frame error: {:?}", e),
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!("UART read error: {:?}", e);
                parser.reset();
            }
        }
    }
}

fn handle_frame(frame: &LinkFrame) {
    match LinkMessage::parse(frame) {
        Ok(msg @ LinkMessage::Interfaces { .. }) => {
            INTERFACES.lock(|cell| cell.borrow_mut().update(&msg));
        }
        Ok(LinkMessage::Subscribe) => {
            debug!("Live-view client connected");
            SUBSCRIBE.signal(());
        }
        Ok(_) => warn!("Unexpected link message {=u8:#x}", frame.msg_type),
        Err(e) => warn!("Bad link message: {:?}", e),
    }
}
