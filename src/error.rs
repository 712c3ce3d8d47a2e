use core::fmt;

/// Why an inbound serial frame was thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    Empty,
    /// Recognised prefix, but too few bytes for the frame it announces.
    Short { len: usize },
    UnknownPrefix,
    Checksum { expected: u8, actual: u8 },
    /// Checksum is fine but a redundant field disagrees (command frames carry the setpoint twice).
    Mismatch,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty frame"),
            Self::Short { len } => write!(f, "short frame ({len} bytes)"),
            Self::UnknownPrefix => f.write_str("unrecognised frame prefix"),
            Self::Checksum { expected, actual } => {
                write!(f, "checksum mismatch (expected {expected:#04x}, got {actual:#04x})")
            }
            Self::Mismatch => f.write_str("redundant setpoint bytes disagree"),
        }
    }
}

/// The UART driver reported an error on read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusError;

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("serial bus driver error")
    }
}

/// A condition worth surfacing to consumers of the store. Never changes control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    Frame(FrameError),
    Bus,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(e) => write!(f, "frame discarded: {e}"),
            Self::Bus => fmt::Display::fmt(&BusError, f),
        }
    }
}

impl From<FrameError> for Fault {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

impl From<BusError> for Fault {
    fn from(_: BusError) -> Self {
        Self::Bus
    }
}
