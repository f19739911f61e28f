//! Emulated controller task
//!
//! Owns the I2C1 target. Waits for an attach request, then serves host
//! transfers until told to detach or re-attach with new parameters.

use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_rp::i2c_slave::{Command, Error as TargetBusError, I2cSlave};
use embassy_rp::peripherals::{I2C1, PIN_2, PIN_3};
use embassy_rp::Peri;

use oledbridge_hal_rp2040::i2c::target_config;
use oledbridge_hal_rp2040::{BusCommand, I2cTargetConfig};

use crate::channels::{now_ms, with_bridge, BUS_COMMAND};
use crate::Irqs;

/// Largest single host transfer handled in one piece
const RX_BUF_SIZE: usize = 128;

/// Bus task - I2C target for the emulated display controller
#[embassy_executor::task]
pub async fn bus_task(
    mut i2c: Peri<'static, I2C1>,
    mut scl: Peri<'static, PIN_3>,
    mut sda: Peri<'static, PIN_2>,
) {
    info!("Bus task started");

    let mut next: Option<I2cTargetConfig> = None;
    loop {
        let config = match next.take() {
            Some(config) => config,
            None => match BUS_COMMAND.wait().await {
                BusCommand::Attach(config) => config,
                BusCommand::Detach => continue,
            },
        };

        let mut target = I2cSlave::new(
            i2c.reborrow(),
            scl.reborrow(),
            sda.reborrow(),
            Irqs,
            target_config(&config),
        );
        info!("I2C target listening at {=u8:#x}", config.address);

        next = serve(&mut target).await;
        info!("I2C target released");
    }
}

/// Serve transfers; returns new parameters on re-attach, `None` on detach
async fn serve(target: &mut I2cSlave<'_, I2C1>) -> Option<I2cTargetConfig> {
    let mut buf = [0u8; RX_BUF_SIZE];
    loop {
        match select(target.listen(&mut buf), BUS_COMMAND.wait()).await {
            Either::First(Ok(Command::Write(len))) => receive(&buf[..len]),
            Either::First(Ok(Command::WriteRead(len))) => {
                receive(&buf[..len]);
                respond(target).await;
            }
            Either::First(Ok(Command::Read)) => respond(target).await,
            Either::First(Ok(Command::GeneralCall(_))) => trace!("General call ignored"),
            Either::First(Err(TargetBusError::PartialWrite(len))) => {
                warn!("Host transfer longer than {=usize} bytes, split", RX_BUF_SIZE);
                receive(&buf[..len]);
            }
            Either::First(Err(e)) => warn!("I2C target error: {:?}", e),
            Either::Second(BusCommand::Attach(config)) => return Some(config),
            Either::Second(BusCommand::Detach) => return None,
        }
    }
}

/// Hand one transfer to the decoder
fn receive(bytes: &[u8]) {
    let now = now_ms();
    if let Some(outcome) = with_bridge(|bridge| bridge.on_receive(bytes, now)) {
        trace!(
            "RX: {=usize} bytes, {=usize} pairs applied",
            bytes.len(),
            outcome.applied
        );
        if outcome.unknown_control > 0 || outcome.stray.is_some() {
            debug!(
                "RX: {=usize} unknown control byte(s), stray {:?}",
                outcome.unknown_control,
                outcome.stray
            );
        }
    }
}

/// Answer a host read with the status byte
async fn respond(target: &mut I2cSlave<'_, I2C1>) {
    let status = with_bridge(|bridge| bridge.on_request()).unwrap_or(0);
    if let Err(e) = target.respond_and_fill(&[status], status).await {
        warn!("Status read failed: {:?}", e);
    }
}
