//! Clock tree and pin map of the controller board.
//!
//! | signal               | pin  | peripheral            |
//! |----------------------|------|-----------------------|
//! | zero-crossing pulse  | PB0  | EXTI0                 |
//! | edge diagnostic      | PB1  | GPIO out              |
//! | RS-485 TX / RX       | PA2 / PA3 | USART2 (DMA1 CH6 / CH5) |
//! | RS-485 driver enable | PA1  | GPIO out, high = TX   |
//! | current transformer  | PA0  | ADC1_IN0              |
//! | heartbeat LED        | PC13 | GPIO out              |

use embassy_stm32::rcc::*;
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_stm32::usart::{Config as UsartConfig, DataBits, Parity, StopBits};
use embassy_stm32::Config;

pub struct Board {
    pub p: embassy_stm32::Peripherals,
}

impl Board {
    pub fn init() -> Self {
        let mut config = Config::default();
        config.rcc.hse = Some(Hse {
            freq: TimeHertz(8_000_000),
            mode: HseMode::Oscillator,
        });
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL168,
            divp: Some(PllPDiv::DIV2), // 168 MHz
            divq: None,
            divr: None,
        });
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;

        let p = embassy_stm32::init(config);

        Self { p }
    }
}

/// Heater board line settings: 8 data bits, even parity, one stop bit.
pub fn rs485_config(baud_rate: u32) -> UsartConfig {
    let mut config = UsartConfig::default();
    config.baudrate = baud_rate;
    config.data_bits = DataBits::DataBits8;
    config.parity = Parity::ParityEven;
    config.stop_bits = StopBits::STOP1;
    config
}
