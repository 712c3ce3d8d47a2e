#![no_std]
#![no_main]

//! # Bench probe for the heater board link
//!
//! Runs only the RS-485 master against a heater board, pinned to a fixed
//! setpoint, and prints every temperature change and fault over RTT.
//!
//! ## Usage
//! ```sh
//! cargo run --release --features firmware --bin rs485-probe --target thumbv7em-none-eabihf
//! ```
//!
//! Wiring is the same as the main firmware (USART2 on PA2/PA3, DE on PA1).

// ── Modules (explicit paths from src/bin/) ────────────────────────────────────
#[path = "../board.rs"] mod board;
#[path = "../bus.rs"]   mod bus;

use embassy_executor::Spawner;
use embassy_stm32::gpio::{Level, Output, Pin, Speed};
use embassy_stm32::usart::Uart;
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_time::{Duration, Ticker};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use grid_ballast::config::SerialConfig;
use grid_ballast::rs485::SerialLink;
use grid_ballast::SharedStore;

use crate::board::Board;
use crate::bus::Rs485Port;

// ── Parameters ────────────────────────────────────────────────────────────────

/// Setpoint held in the store for the whole session.
const PROBE_SETPOINT: u8 = 105;

const REPORT_PERIOD: Duration = Duration::from_millis(250);

static STORE: StaticCell<SharedStore> = StaticCell::new();

// ── Interrupts ────────────────────────────────────────────────────────────────
bind_interrupts!(struct Irqs {
    USART2 => embassy_stm32::usart::InterruptHandler<peripherals::USART2>;
});

// ── Link task ─────────────────────────────────────────────────────────────────
#[embassy_executor::task]
async fn link_task(port: Rs485Port, store: &'static SharedStore) {
    SerialLink::new(port, store, SerialConfig::default()).run().await
}

// ── Main ──────────────────────────────────────────────────────────────────────
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let board = Board::init();
    let p = board.p;

    let store: &'static SharedStore = STORE.init(SharedStore::new());
    store.modify(|s| s.set_point = PROBE_SETPOINT).await;

    let serial = SerialConfig::default();
    let uart = Uart::new(
        p.USART2, p.PA3, p.PA2,
        Irqs,
        p.DMA1_CH6, p.DMA1_CH5,
        board::rs485_config(serial.baud_rate),
    ).unwrap();
    let de = Output::new(p.PA1.degrade(), Level::Low, Speed::VeryHigh);
    spawner.spawn(link_task(Rs485Port::new(uart, de, serial.baud_rate), store)).unwrap();

    let mut led = Output::new(p.PC13, Level::High, Speed::Low);
    defmt::info!("probe: pushing setpoint {}", PROBE_SETPOINT);

    // Print only on change so a quiet board gives a quiet log.
    let mut last_temps = (i16::MIN, i16::MIN);
    let mut last_faults = 0;
    let mut ticker = Ticker::every(REPORT_PERIOD);
    loop {
        ticker.next().await;
        led.toggle();

        let s = store.read().await;
        if (s.temp_top, s.temp_bottom) != last_temps {
            last_temps = (s.temp_top, s.temp_bottom);
            defmt::info!("probe: top={} bottom={}", s.temp_top, s.temp_bottom);
        }

        let faults = store.last_fault();
        if faults.count != last_faults {
            last_faults = faults.count;
            defmt::warn!("probe: {} faults, last {}", faults.count, faults.last);
        }
    }
}
