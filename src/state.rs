//! The single record every task exchanges through [`crate::store::StateStore`].
//!
//! All types are `Copy`: readers take a full snapshot, writers copy a full record back.

pub const MIC_BUFFER_SIZE: usize = 64;

// ── Operating mode ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Mode {
    /// Setpoint only changes on operator request.
    #[default]
    Manual = 0,
    /// The threshold controller owns the setpoint.
    FrequencyResponsive = 1,
}

// ── System state ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemState {
    pub timestamp: u32,
    /// Heater draw in watts (RMS current × line voltage).
    pub power: i32,
    pub mic: [i16; MIC_BUFFER_SIZE],
    pub leak_sensor: bool,
    /// Raw heater-board temperature bytes.
    pub temp_bottom: i16,
    pub temp_top: i16,
    /// Averaged mains frequency in Hz, 0.0 until the first window completes.
    pub grid_freq: f32,
    pub gps_location: i32,
    /// Thermostat setpoint pushed to the heater board.
    pub set_point: u8,
    pub heating_status: bool,
    pub mode: Mode,
    pub threshold_over_hz: f32,
    pub threshold_under_hz: f32,
}

impl SystemState {
    /// All-zero record, the state at power-on.
    pub const fn new() -> Self {
        Self {
            timestamp: 0,
            power: 0,
            mic: [0; MIC_BUFFER_SIZE],
            leak_sensor: false,
            temp_bottom: 0,
            temp_top: 0,
            grid_freq: 0.0,
            gps_location: 0,
            set_point: 0,
            heating_status: false,
            mode: Mode::Manual,
            threshold_over_hz: 0.0,
            threshold_under_hz: 0.0,
        }
    }
}

impl Default for SystemState {
    fn default() -> Self {
        Self::new()
    }
}
