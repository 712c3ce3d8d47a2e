use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Ticker;

use crate::config::ControllerConfig;
use crate::state::{Mode, SystemState};
use crate::store::StateStore;

/// Moves the heater setpoint to shed or absorb load when the grid leaves the
/// band between the two thresholds stored in [`SystemState`].
pub struct ThresholdController {
    config: ControllerConfig,
}

impl ThresholdController {
    pub const fn new(config: ControllerConfig) -> Self {
        Self { config }
    }

    /// New setpoint for `state`, or `None` to leave it alone.
    ///
    /// A non-positive `grid_freq` means no window has been averaged yet and is
    /// never acted on.
    pub fn decide(&self, state: &SystemState) -> Option<u8> {
        if state.mode != Mode::FrequencyResponsive || state.grid_freq <= 0.0 {
            return None;
        }
        let wanted = if state.grid_freq > state.threshold_over_hz {
            self.config.absorb_setpoint
        } else if state.grid_freq < state.threshold_under_hz {
            self.config.shed_setpoint
        } else {
            return None;
        };
        (wanted != state.set_point).then_some(wanted)
    }

    /// One control step. Returns the setpoint it wrote, if any.
    pub async fn tick<M: RawMutex>(&self, store: &StateStore<M>) -> Option<u8> {
        let changed = store
            .modify(|s| {
                let next = self.decide(s)?;
                s.set_point = next;
                Some((s.grid_freq, next))
            })
            .await;

        let (hz, sp) = changed?;
        info!("ctrl: {} Hz, setpoint -> {}", hz, sp);
        Some(sp)
    }

    pub async fn run<M: RawMutex>(self, store: &StateStore<M>) -> ! {
        info!("ctrl: threshold controller started");
        let mut ticker = Ticker::every(self.config.period);
        loop {
            self.tick(store).await;
            ticker.next().await;
        }
    }
}
