//! Compile-time defaults. Each task receives its own `Copy` config at spawn.

use embassy_time::Duration;

use crate::state::{Mode, SystemState};

// ── Frequency estimator ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyConfig {
    /// Rate of the free-running counter the edge timestamps come from.
    pub tick_hz: u64,
    /// Edge intervals shorter than this are bounce (15 ms rejects half-periods at 60 Hz).
    pub min_period_ticks: u64,
    /// Instantaneous readings at or below this are a disconnected input, not the grid.
    pub min_frequency_hz: f32,
    /// Accepted samples averaged before a value is committed.
    pub window: u32,
}

impl FrequencyConfig {
    pub const fn new() -> Self {
        Self {
            tick_hz: 1_000_000,
            min_period_ticks: 15_000,
            min_frequency_hz: 40.0,
            window: 200,
        }
    }

    /// Defaults for a counter running at `tick_hz`. The bounce floor stays 15 ms.
    pub const fn with_tick_hz(tick_hz: u64) -> Self {
        let base = Self::new();
        Self {
            tick_hz,
            min_period_ticks: base.min_period_ticks * tick_hz / base.tick_hz,
            ..base
        }
    }
}

// ── Serial master ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    /// Read timeout while a new setpoint still has to be pushed.
    pub chase_timeout: Duration,
    /// Read timeout once the board runs the current setpoint.
    pub sync_timeout: Duration,
    pub verify_telemetry_checksum: bool,
}

impl SerialConfig {
    pub const fn new() -> Self {
        Self {
            baud_rate: 19_200,
            chase_timeout: Duration::from_millis(20),
            sync_timeout: Duration::from_millis(40),
            verify_telemetry_checksum: true,
        }
    }
}

// ── Threshold controller ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerConfig {
    pub period: Duration,
    /// Setpoint forced while the grid runs fast (absorb surplus generation).
    pub absorb_setpoint: u8,
    /// Setpoint forced while the grid runs slow (shed load).
    pub shed_setpoint: u8,
}

impl ControllerConfig {
    pub const fn new() -> Self {
        Self {
            period: Duration::from_millis(500),
            absorb_setpoint: 140,
            shed_setpoint: 100,
        }
    }
}

// ── Current sampler ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentConfig {
    pub sample_period: Duration,
    pub window: u32,
    /// Amps per ADC count at the current transformer burden.
    pub adc_scale: f32,
    pub line_voltage: f32,
}

impl CurrentConfig {
    pub const fn new() -> Self {
        Self {
            sample_period: Duration::from_micros(320),
            window: 50,
            adc_scale: 0.000_87,
            line_voltage: 120.0,
        }
    }
}

// ── Boot state ────────────────────────────────────────────────────────────────

/// Values written into the store before any task starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialState {
    pub set_point: u8,
    pub threshold_over_hz: f32,
    pub threshold_under_hz: f32,
    pub mode: Mode,
}

impl InitialState {
    pub const fn new() -> Self {
        Self {
            set_point: 122,
            threshold_over_hz: 60.01,
            threshold_under_hz: 59.99,
            mode: Mode::Manual,
        }
    }

    pub fn seed(&self, state: &mut SystemState) {
        state.set_point = self.set_point;
        state.threshold_over_hz = self.threshold_over_hz;
        state.threshold_under_hz = self.threshold_under_hz;
        state.mode = self.mode;
    }
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for CurrentConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for InitialState {
    fn default() -> Self {
        Self::new()
    }
}
