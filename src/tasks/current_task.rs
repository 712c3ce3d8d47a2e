use embassy_executor::task;
use embassy_stm32::adc::Adc;
use embassy_stm32::peripherals::{ADC1, PA0};

use grid_ballast::config::CurrentConfig;
use grid_ballast::current::{self, CurrentSense};
use grid_ballast::SharedStore;

/// Current transformer burden on ADC1_IN0.
pub struct CtChannel {
    pub adc: Adc<'static, ADC1>,
    pub pin: PA0,
}

impl CurrentSense for CtChannel {
    fn sample(&mut self) -> u16 {
        self.adc.read(&mut self.pin)
    }
}

#[task]
pub async fn current_task(ct: CtChannel, store: &'static SharedStore, config: CurrentConfig) {
    current::run(ct, store, config).await
}
