#![no_std]
#![no_main]

mod board;
mod bus;
mod tasks;

use embassy_executor::{InterruptExecutor, Spawner};
use embassy_stm32::adc::{Adc, SampleTime};
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Input, Level, Output, Pin, Pull, Speed};
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_stm32::usart::Uart;
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_time::{Delay, Duration, Timer};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use grid_ballast::config::{
    ControllerConfig, CurrentConfig, FrequencyConfig, InitialState, SerialConfig,
};
use grid_ballast::freq::SharedEdges;
use grid_ballast::SharedStore;

use crate::board::Board;
use crate::bus::Rs485Port;
use crate::tasks::current_task::CtChannel;

// ── Shared objects ────────────────────────────────────────────────────────────
//  Created once in main, then handed to each task by reference.
static STORE: StaticCell<SharedStore> = StaticCell::new();
static EDGES: StaticCell<SharedEdges> = StaticCell::new();

// ── Interrupt bindings ────────────────────────────────────────────────────────
bind_interrupts!(struct Irqs {
    USART2 => embassy_stm32::usart::InterruptHandler<peripherals::USART2>;
});

// Edge capture runs in interrupt context, pended through the unused UART5
// vector, so a busy thread-mode task cannot delay the timestamp.
static EDGE_EXECUTOR: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn UART5() {
    EDGE_EXECUTOR.on_interrupt()
}

// ── Main ──────────────────────────────────────────────────────────────────────
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // 1. Board init (168 MHz PLL)
    let board = Board::init();
    let p = board.p;

    // 2. Store, seeded before any task can read it
    let store: &'static SharedStore = STORE.init(SharedStore::new());
    let edges: &'static SharedEdges = EDGES.init(SharedEdges::new());
    let boot = InitialState::default();
    store.modify(|s| boot.seed(s)).await;
    defmt::info!(
        "boot: setpoint {} band {}..{} Hz mode {}",
        boot.set_point,
        boot.threshold_under_hz,
        boot.threshold_over_hz,
        boot.mode
    );

    // 3. Zero-crossing pulse on PB0 (EXTI0), diagnostic toggle on PB1
    let pulse = ExtiInput::new(Input::new(p.PB0, Pull::None), p.EXTI0);
    let diag = Output::new(p.PB1.degrade(), Level::Low, Speed::Low);

    // 4. Heater board link: USART2 @ 19200 8E1 (TX=PA2, RX=PA3), DE=PA1
    let serial = SerialConfig::default();
    let uart = Uart::new(
        p.USART2, p.PA3, p.PA2,
        Irqs,
        p.DMA1_CH6, p.DMA1_CH5,
        board::rs485_config(serial.baud_rate),
    ).unwrap();
    let de = Output::new(p.PA1.degrade(), Level::Low, Speed::VeryHigh);
    let port = Rs485Port::new(uart, de, serial.baud_rate);

    // 5. Current transformer on PA0 (ADC1_IN0)
    let mut adc = Adc::new(p.ADC1, &mut Delay);
    adc.set_sample_time(SampleTime::Cycles480);
    let ct = CtChannel { adc, pin: p.PA0 };

    // 6. Heartbeat LED (PC13)
    let mut led = Output::new(p.PC13, Level::High, Speed::Low);

    // 7. Spawn all tasks; edge capture preempts everything in thread mode
    interrupt::UART5.set_priority(Priority::P6);
    let edge_spawner = EDGE_EXECUTOR.start(interrupt::UART5);
    edge_spawner.spawn(tasks::edge_task::edge_task(pulse, diag, edges)).unwrap();

    // Edge stamps come from embassy-time, so the estimator runs at its tick rate.
    let freq = FrequencyConfig::with_tick_hz(embassy_time::TICK_HZ);
    spawner.spawn(tasks::frequency_task::frequency_task(edges, store, freq)).unwrap();

    spawner.spawn(tasks::rs485_task::rs485_task(port, store, serial)).unwrap();

    spawner.spawn(tasks::controller_task::controller_task(
        store,
        ControllerConfig::default(),
    )).unwrap();

    spawner.spawn(tasks::current_task::current_task(
        ct,
        store,
        CurrentConfig::default(),
    )).unwrap();

    spawner.spawn(tasks::status_task::status_task(store)).unwrap();

    // 8. Main task: LED heartbeat @ 1 Hz
    loop {
        led.toggle();
        Timer::after(Duration::from_millis(500)).await;
    }
}
