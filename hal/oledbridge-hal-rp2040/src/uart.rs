//! UART transmit adapter
//!
//! embassy-rp's UART halves implement `embedded_io::Write`; this wraps any
//! such writer as an [`oledbridge_hal::UartTx`].

use embedded_io::Write;

use oledbridge_hal::uart::UartTx;

/// Blocking transmitter over an `embedded_io` writer
pub struct IoUartTx<W> {
    inner: W,
}

impl<W: Write> IoUartTx<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> UartTx for IoUartTx<W> {
    type Error = W::Error;

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.inner.write_all(data)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.inner.flush()
    }
}
