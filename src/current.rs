//! Heater power from a current transformer on an ADC channel.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Ticker;
// Provides `sqrt` on no_std targets; std's inherent method wins on the host.
#[allow(unused_imports)]
use micromath::F32Ext;

use crate::config::CurrentConfig;
use crate::store::StateStore;

/// One raw conversion from the current transformer channel.
pub trait CurrentSense {
    fn sample(&mut self) -> u16;
}

/// Sum of squared scaled samples over a fixed window.
pub struct RmsAccumulator {
    config: CurrentConfig,
    sum_sq: f32,
    count: u32,
}

impl RmsAccumulator {
    pub const fn new(config: CurrentConfig) -> Self {
        Self {
            config,
            sum_sq: 0.0,
            count: 0,
        }
    }

    /// Adds one ADC reading; returns the window's power in watts once it fills.
    pub fn push(&mut self, raw: u16) -> Option<f32> {
        let amps = raw as f32 * self.config.adc_scale;
        self.sum_sq += amps * amps;
        self.count += 1;
        if self.count < self.config.window.max(1) {
            return None;
        }

        let rms = (self.sum_sq / self.count as f32).sqrt();
        self.sum_sq = 0.0;
        self.count = 0;
        Some(rms * self.config.line_voltage)
    }
}

pub async fn run<S: CurrentSense, M: RawMutex>(
    mut sense: S,
    store: &StateStore<M>,
    config: CurrentConfig,
) -> ! {
    info!("ct: sampling every {} us", config.sample_period.as_micros());
    let mut acc = RmsAccumulator::new(config);
    let mut ticker = Ticker::every(config.sample_period);
    loop {
        if let Some(watts) = acc.push(sense.sample()) {
            store.modify(|s| s.power = watts as i32).await;
            trace!("ct: {} W", watts);
        }
        ticker.next().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_reading_gives_its_own_rms() {
        let config = CurrentConfig::default();
        let mut acc = RmsAccumulator::new(config);
        let raw = 2_000u16;
        for _ in 1..config.window {
            assert_eq!(acc.push(raw), None);
        }
        let watts = acc.push(raw).unwrap();
        let expected = raw as f32 * config.adc_scale * config.line_voltage;
        assert!((watts - expected).abs() < 1e-3, "{watts} vs {expected}");
    }

    #[test]
    fn square_wave_rms() {
        let config = CurrentConfig {
            window: 4,
            adc_scale: 1.0,
            line_voltage: 1.0,
            ..CurrentConfig::default()
        };
        let mut acc = RmsAccumulator::new(config);
        let out: Vec<_> = [3u16, 4, 3, 4].into_iter().map(|r| acc.push(r)).collect();
        // sqrt((9 + 16 + 9 + 16) / 4)
        let rms = out[3].unwrap();
        assert!((rms - 12.5f32.sqrt()).abs() < 1e-5);
        assert!(out[..3].iter().all(Option::is_none));
    }

    #[test]
    fn window_resets() {
        let config = CurrentConfig {
            window: 2,
            ..CurrentConfig::default()
        };
        let mut acc = RmsAccumulator::new(config);
        acc.push(4_000);
        acc.push(4_000);
        acc.push(0);
        assert_eq!(acc.push(0), Some(0.0));
    }
}
