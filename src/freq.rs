//! Mains frequency from zero-crossing edge timestamps.
//!
//! The edge interrupt only stamps the counter and posts it to an
//! [`EdgeHandoff`]; everything else runs in task context.
//!
//! Debounce strategy: an interval shorter than `min_period_ticks` is bounce and
//! is dropped without moving the anchor, so the next genuine edge is still
//! measured from the last genuine one. Double pulses per crossing fall out the
//! same way. Intervals that pass but give a frequency at or below
//! `min_frequency_hz` move the anchor and are not averaged.

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::signal::Signal;

use crate::config::FrequencyConfig;
use crate::store::StateStore;

/// Handoff usable from an interrupt handler.
pub type SharedEdges = EdgeHandoff<CriticalSectionRawMutex>;

/// Depth-1 edge mailbox between the edge interrupt and the estimator task.
/// Posting never blocks and overwrites an edge the task has not yet taken.
pub struct EdgeHandoff<M: RawMutex> {
    latest: Signal<M, u64>,
}

impl<M: RawMutex> EdgeHandoff<M> {
    pub const fn new() -> Self {
        Self {
            latest: Signal::new(),
        }
    }

    /// Interrupt-safe.
    pub fn post(&self, tick: u64) {
        self.latest.signal(tick);
    }

    pub async fn next(&self) -> u64 {
        self.latest.wait().await
    }

    pub fn try_take(&self) -> Option<u64> {
        self.latest.try_take()
    }
}

impl<M: RawMutex> Default for EdgeHandoff<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EdgeOutcome {
    /// First edge, nothing to measure against yet.
    Primed,
    Bounce,
    Implausible,
    Accumulating,
    Averaged(f32),
}

pub struct FrequencyEstimator {
    config: FrequencyConfig,
    anchor: Option<u64>,
    sum: f32,
    count: u32,
}

impl FrequencyEstimator {
    pub const fn new(config: FrequencyConfig) -> Self {
        Self {
            config,
            anchor: None,
            sum: 0.0,
            count: 0,
        }
    }

    pub fn on_edge(&mut self, tick: u64) -> EdgeOutcome {
        let Some(prev) = self.anchor else {
            self.anchor = Some(tick);
            return EdgeOutcome::Primed;
        };

        let duration = tick.wrapping_sub(prev);
        if duration < self.config.min_period_ticks {
            return EdgeOutcome::Bounce;
        }
        self.anchor = Some(tick);

        let hz = self.config.tick_hz as f32 / duration as f32;
        if hz <= self.config.min_frequency_hz {
            return EdgeOutcome::Implausible;
        }

        self.sum += hz;
        self.count += 1;
        if self.count < self.config.window.max(1) {
            return EdgeOutcome::Accumulating;
        }

        let mean = self.sum / self.count as f32;
        self.sum = 0.0;
        self.count = 0;
        EdgeOutcome::Averaged(mean)
    }

    /// Takes one edge and commits `grid_freq` if it closed a window.
    pub async fn step<S: RawMutex, M: RawMutex>(
        &mut self,
        edges: &EdgeHandoff<S>,
        store: &StateStore<M>,
    ) -> EdgeOutcome {
        let tick = edges.next().await;
        let outcome = self.on_edge(tick);
        match outcome {
            EdgeOutcome::Averaged(hz) => {
                store.modify(|s| s.grid_freq = hz).await;
                debug!("freq: {} Hz", hz);
            }
            EdgeOutcome::Implausible => trace!("freq: implausible edge at {}", tick),
            _ => {}
        }
        outcome
    }

    pub async fn run<S: RawMutex, M: RawMutex>(
        mut self,
        edges: &EdgeHandoff<S>,
        store: &StateStore<M>,
    ) -> ! {
        info!("freq: estimator started, window {}", self.config.window);
        loop {
            self.step(edges, store).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SharedStore;
    use futures::executor::block_on;

    const PERIOD: u64 = 16_667;

    fn estimator() -> FrequencyEstimator {
        FrequencyEstimator::new(FrequencyConfig::default())
    }

    #[test]
    fn first_edge_only_primes() {
        let mut est = estimator();
        assert_eq!(est.on_edge(1_000), EdgeOutcome::Primed);
        assert_eq!(est.on_edge(1_000 + PERIOD), EdgeOutcome::Accumulating);
    }

    #[test]
    fn bounce_keeps_the_anchor() {
        let mut est = estimator();
        est.on_edge(0);
        assert_eq!(est.on_edge(40), EdgeOutcome::Bounce);
        assert_eq!(est.on_edge(PERIOD / 2), EdgeOutcome::Bounce);
        assert_eq!(est.on_edge(PERIOD), EdgeOutcome::Accumulating);
        assert_eq!(est.count, 1);
        assert!((est.sum - 1e6 / PERIOD as f32).abs() < 1e-3);
    }

    #[test]
    fn disconnected_input_is_not_averaged() {
        let mut est = estimator();
        est.on_edge(0);
        // 1 s gap: 1 Hz
        assert_eq!(est.on_edge(1_000_000), EdgeOutcome::Implausible);
        assert_eq!(est.count, 0);
        assert_eq!(est.on_edge(1_000_000 + PERIOD), EdgeOutcome::Accumulating);
    }

    #[test]
    fn counter_wraparound() {
        let mut est = estimator();
        est.on_edge(u64::MAX - 100);
        assert_eq!(est.on_edge(PERIOD - 101), EdgeOutcome::Accumulating);
    }

    #[test]
    fn converges_after_one_window() {
        let config = FrequencyConfig::default();
        let mut est = FrequencyEstimator::new(config);
        let expected = config.tick_hz as f32 / PERIOD as f32;

        let mut tick = 5_000u64;
        est.on_edge(tick);
        let mut result = None;
        for i in 0..config.window {
            // Bounce shortly after every third edge.
            if i % 3 == 0 {
                assert_eq!(est.on_edge(tick + 120), EdgeOutcome::Bounce);
            }
            tick += PERIOD;
            if let EdgeOutcome::Averaged(hz) = est.on_edge(tick) {
                result = Some(hz);
            }
        }

        let hz = result.expect("no average after a full window");
        assert!((hz - expected).abs() < 5e-3, "{hz} vs {expected}");
        assert_eq!(est.count, 0);
    }

    #[test]
    fn interrupt_latency_jitter_stays_inside_the_band() {
        use crate::config::{ControllerConfig, InitialState};
        use crate::controller::ThresholdController;
        use crate::state::{Mode, SystemState};

        let config = FrequencyConfig::default();
        let mut est = FrequencyEstimator::new(config);
        let expected = config.tick_hz as f32 / PERIOD as f32;

        // Each edge stamped up to 30 µs off its true crossing.
        let mut seed = 0x2545_f491u32;
        let mut jitter = || {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            ((seed >> 16) % 61) as i64 - 30
        };

        let mut result = None;
        for k in 0..=config.window as i64 {
            let tick = (5_000 + k * PERIOD as i64 + jitter()) as u64;
            match est.on_edge(tick) {
                EdgeOutcome::Averaged(hz) => result = Some(hz),
                EdgeOutcome::Bounce | EdgeOutcome::Implausible => panic!("edge {k} dropped"),
                _ => {}
            }
        }

        let hz = result.expect("no average after a full window");
        assert!((hz - expected).abs() < 5e-3, "{hz} vs {expected}");

        let mut state = SystemState::new();
        InitialState::default().seed(&mut state);
        state.mode = Mode::FrequencyResponsive;
        state.grid_freq = hz;
        let controller = ThresholdController::new(ControllerConfig::default());
        assert_eq!(controller.decide(&state), None);
    }

    #[test]
    fn handoff_keeps_only_latest_edge() {
        let edges = SharedEdges::new();
        assert_eq!(edges.try_take(), None);
        edges.post(10);
        edges.post(20);
        assert_eq!(edges.try_take(), Some(20));
        assert_eq!(edges.try_take(), None);
    }

    #[test]
    fn completed_window_is_committed_to_store() {
        let config = FrequencyConfig {
            window: 4,
            ..FrequencyConfig::default()
        };
        let store = SharedStore::new();
        let edges = SharedEdges::new();
        let mut est = FrequencyEstimator::new(config);

        for k in 0..4u64 {
            edges.post(k * 20_000);
            block_on(est.step(&edges, &store));
        }
        assert_eq!(block_on(store.read()).grid_freq, 0.0);

        edges.post(4 * 20_000);
        assert_eq!(block_on(est.step(&edges, &store)), EdgeOutcome::Averaged(50.0));
        assert_eq!(block_on(store.read()).grid_freq, 50.0);
    }
}
