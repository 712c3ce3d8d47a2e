use embassy_futures::select::{select, Either};
use embassy_stm32::gpio::{AnyPin, Output};
use embassy_stm32::peripherals::{DMA1_CH5, DMA1_CH6, USART2};
use embassy_stm32::usart::{self, Uart};
use embassy_time::{Duration, Timer};

use grid_ballast::error::BusError;
use grid_ballast::rs485::HalfDuplexPort;

pub type Rs485Uart = Uart<'static, USART2, DMA1_CH6, DMA1_CH5>;

/// Bits per character on the wire at 8E1.
const FRAME_BITS: u64 = 11;

/// USART2 behind a half-duplex transceiver. `de` high drives the bus.
pub struct Rs485Port {
    uart: Rs485Uart,
    de: Output<'static, AnyPin>,
    /// Time for the data and shift registers to empty after the last DMA write.
    drain: Duration,
}

impl Rs485Port {
    pub fn new(uart: Rs485Uart, mut de: Output<'static, AnyPin>, baud_rate: u32) -> Self {
        de.set_low();
        let drain = Duration::from_micros(2 * FRAME_BITS * 1_000_000 / baud_rate.max(1) as u64);
        Self { uart, de, drain }
    }
}

impl HalfDuplexPort for Rs485Port {
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, BusError> {
        match select(self.uart.read_until_idle(buf), Timer::after(timeout)).await {
            Either::First(Ok(n)) => Ok(n),
            // Frame partly lost; the next window starts clean.
            Either::First(Err(usart::Error::Overrun)) => Ok(0),
            Either::First(Err(_)) => Err(BusError),
            Either::Second(()) => Ok(0),
        }
    }

    fn begin_transmit(&mut self) {
        self.de.set_high();
    }

    async fn write_byte(&mut self, byte: u8) -> Result<(), BusError> {
        self.uart.write(&[byte]).await.map_err(|_| BusError)
    }

    async fn end_transmit(&mut self) -> Result<(), BusError> {
        // Releasing DE before the stop bit is out truncates the last byte.
        // Sleep through the drain so the TC wait below returns at once.
        Timer::after(self.drain).await;
        let flushed = self.uart.blocking_flush().map_err(|_| BusError);
        self.de.set_low();
        flushed
    }
}
