//! Wire format of the heater board's RS-485 link.
//!
//! The board is the slave: it sends a poll frame when it is ready to accept a
//! command, and a telemetry frame periodically on its own. The master answers a
//! poll with either a setpoint command or a fixed acknowledgment.
//!
//! Every frame that carries a checksum ends in the 8-bit truncated sum of all
//! bytes before it.

use crate::error::FrameError;

pub const POLL: [u8; 2] = [0x87, 0x00];
pub const TELEMETRY_PREFIX: [u8; 4] = [0x40, 0x09, 0x14, 0x00];
pub const COMMAND_PREFIX: [u8; 3] = [0x87, 0x09, 0x03];
pub const ACK: [u8; 5] = [0x07, 0x01, 0x03, 0x04, 0x0F];

pub const COMMAND_LEN: usize = 6;
/// Shortest telemetry frame that still carries both temperature bytes and a checksum.
pub const TELEMETRY_MIN_LEN: usize = 18;
pub const TEMP_TOP_OFFSET: usize = 15;
pub const TEMP_BOTTOM_OFFSET: usize = 16;

pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Checks the trailing sum byte of `frame`.
pub fn verify_checksum(frame: &[u8]) -> Result<(), FrameError> {
    let (&actual, body) = frame.split_last().ok_or(FrameError::Empty)?;
    let expected = checksum(body);
    if expected == actual {
        Ok(())
    } else {
        Err(FrameError::Checksum { expected, actual })
    }
}

pub fn command_frame(set_point: u8) -> [u8; COMMAND_LEN] {
    let [a, b, c] = COMMAND_PREFIX;
    let mut frame = [a, b, c, set_point, set_point, 0];
    frame[COMMAND_LEN - 1] = checksum(&frame[..COMMAND_LEN - 1]);
    frame
}

/// Inverse of [`command_frame`]. Used by the bench probe to check its own
/// echo and by tests.
pub fn parse_command(frame: &[u8]) -> Result<u8, FrameError> {
    if frame.is_empty() {
        return Err(FrameError::Empty);
    }
    if frame.len() < COMMAND_LEN {
        return Err(FrameError::Short { len: frame.len() });
    }
    let frame = &frame[..COMMAND_LEN];
    if frame[..3] != COMMAND_PREFIX {
        return Err(FrameError::UnknownPrefix);
    }
    verify_checksum(frame)?;
    if frame[3] != frame[4] {
        return Err(FrameError::Mismatch);
    }
    Ok(frame[3])
}

/// Raw temperature bytes reported by the heater board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Temperatures {
    pub top: i16,
    pub bottom: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Inbound {
    Poll,
    Telemetry(Temperatures),
}

/// Recognises one received frame.
///
/// A buffer that is a strict prefix of a known frame is reported as `Short`
/// so that a read cut off by the timeout is distinguishable from line noise.
pub fn classify(frame: &[u8], verify_telemetry: bool) -> Result<Inbound, FrameError> {
    if frame.is_empty() {
        return Err(FrameError::Empty);
    }

    if frame.starts_with(&TELEMETRY_PREFIX) {
        if frame.len() < TELEMETRY_MIN_LEN {
            return Err(FrameError::Short { len: frame.len() });
        }
        if verify_telemetry {
            verify_checksum(frame)?;
        }
        return Ok(Inbound::Telemetry(Temperatures {
            top: frame[TEMP_TOP_OFFSET] as i16,
            bottom: frame[TEMP_BOTTOM_OFFSET] as i16,
        }));
    }

    if frame.starts_with(&POLL) {
        return Ok(Inbound::Poll);
    }

    if TELEMETRY_PREFIX.starts_with(frame) || POLL.starts_with(frame) {
        return Err(FrameError::Short { len: frame.len() });
    }
    Err(FrameError::UnknownPrefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry(top: u8, bottom: u8) -> [u8; TELEMETRY_MIN_LEN] {
        let mut f = [0u8; TELEMETRY_MIN_LEN];
        f[..4].copy_from_slice(&TELEMETRY_PREFIX);
        f[TEMP_TOP_OFFSET] = top;
        f[TEMP_BOTTOM_OFFSET] = bottom;
        f[TELEMETRY_MIN_LEN - 1] = checksum(&f[..TELEMETRY_MIN_LEN - 1]);
        f
    }

    #[test]
    fn command_checksum_for_every_setpoint() {
        for sp in 0..=255u8 {
            let frame = command_frame(sp);
            let expected = (0x87u32 + 0x09 + 0x03 + 2 * sp as u32) % 256;
            assert_eq!(frame[5] as u32, expected, "setpoint {sp}");
            assert_eq!(parse_command(&frame), Ok(sp));
        }
    }

    #[test]
    fn any_single_corrupted_byte_is_rejected() {
        for sp in 0..=255u8 {
            let good = command_frame(sp);
            for i in 0..COMMAND_LEN {
                for flip in [0x01u8, 0x80, 0xFF] {
                    let mut bad = good;
                    bad[i] ^= flip;
                    assert!(
                        parse_command(&bad).is_err(),
                        "setpoint {sp}, byte {i} ^ {flip:#04x} accepted"
                    );
                }
            }
        }
    }

    #[test]
    fn known_command_bytes() {
        // 0x87 + 0x09 + 0x03 + 122 + 122 = 0x187
        assert_eq!(command_frame(122), [0x87, 0x09, 0x03, 122, 122, 0x87]);
    }

    #[test]
    fn poll_is_recognised() {
        assert_eq!(classify(&POLL, true), Ok(Inbound::Poll));
        assert_eq!(classify(&[0x87], true), Err(FrameError::Short { len: 1 }));
    }

    #[test]
    fn telemetry_yields_temperatures() {
        let frame = telemetry(55, 48);
        assert_eq!(
            classify(&frame, true),
            Ok(Inbound::Telemetry(Temperatures { top: 55, bottom: 48 }))
        );
    }

    #[test]
    fn telemetry_checksum_is_optional() {
        let mut frame = telemetry(55, 48);
        frame[TELEMETRY_MIN_LEN - 1] ^= 0x10;
        assert!(matches!(classify(&frame, true), Err(FrameError::Checksum { .. })));
        assert!(matches!(classify(&frame, false), Ok(Inbound::Telemetry(_))));
    }

    #[test]
    fn truncated_telemetry_is_short() {
        let frame = telemetry(1, 2);
        assert_eq!(classify(&frame[..10], true), Err(FrameError::Short { len: 10 }));
        assert_eq!(classify(&frame[..2], true), Err(FrameError::Short { len: 2 }));
    }

    #[test]
    fn noise_is_rejected() {
        assert_eq!(classify(&[], true), Err(FrameError::Empty));
        assert_eq!(classify(&[0x11, 0x22, 0x33], true), Err(FrameError::UnknownPrefix));
        assert_eq!(classify(&ACK, true), Err(FrameError::UnknownPrefix));
    }

    #[test]
    fn parse_command_reports_reason() {
        assert_eq!(parse_command(&[]), Err(FrameError::Empty));
        assert_eq!(parse_command(&[0x87, 0x09]), Err(FrameError::Short { len: 2 }));
        assert_eq!(parse_command(&[0, 0, 0, 0, 0, 0]), Err(FrameError::UnknownPrefix));

        let mut split = [0x87, 0x09, 0x03, 10, 12, 0];
        split[5] = checksum(&split[..5]);
        assert_eq!(parse_command(&split), Err(FrameError::Mismatch));
    }
}
