//! Master side of the heater board link.
//!
//! [`SerialMaster`] is the pure poll/ack state machine. [`SerialLink`] wraps it
//! around a [`HalfDuplexPort`] and the store: each cycle it reads one frame,
//! answers polls, and copies telemetry temperatures into the store.
//!
//! | state          | poll received        | after successful send |
//! |----------------|----------------------|-----------------------|
//! | `AwaitingPoll` | reply `Command(sp)`  | `SentSetpoint`        |
//! | `SentSetpoint` | reply `Ack`          | `SentSetpoint`        |
//!
//! A changed target while in `SentSetpoint` drops back to `AwaitingPoll`, so
//! the next poll pushes the new value. Telemetry never changes the state.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Duration;

use crate::config::SerialConfig;
use crate::error::{BusError, Fault};
use crate::protocol::{self, Inbound, ACK, COMMAND_LEN};
use crate::store::StateStore;

const RX_BUF_SIZE: usize = 64;

// ── State machine ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    AwaitingPoll,
    SentSetpoint,
}

/// What the master sends in answer to a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reply {
    Command(u8),
    Ack,
}

/// Encoded reply, at most one command frame long.
pub struct ReplyFrame {
    buf: [u8; COMMAND_LEN],
    len: usize,
}

impl ReplyFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl Reply {
    pub fn encode(&self) -> ReplyFrame {
        match *self {
            Self::Command(sp) => ReplyFrame {
                buf: protocol::command_frame(sp),
                len: COMMAND_LEN,
            },
            Self::Ack => {
                let mut buf = [0; COMMAND_LEN];
                buf[..ACK.len()].copy_from_slice(&ACK);
                ReplyFrame { buf, len: ACK.len() }
            }
        }
    }
}

pub struct SerialMaster {
    state: LinkState,
    /// Setpoint most recently confirmed on the wire.
    last_sent: Option<u8>,
    target: u8,
}

impl SerialMaster {
    pub const fn new(target: u8) -> Self {
        Self {
            state: LinkState::AwaitingPoll,
            last_sent: None,
            target,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn last_sent(&self) -> Option<u8> {
        self.last_sent
    }

    pub fn target(&self) -> u8 {
        self.target
    }

    pub fn retarget(&mut self, target: u8) {
        self.target = target;
        if self.state == LinkState::SentSetpoint && self.last_sent != Some(target) {
            self.state = LinkState::AwaitingPoll;
        }
    }

    pub fn in_sync(&self) -> bool {
        self.state == LinkState::SentSetpoint && self.last_sent == Some(self.target)
    }

    /// Short while a push is outstanding so the next poll is caught; long once
    /// in sync to leave the bus to telemetry.
    pub fn read_timeout(&self, config: &SerialConfig) -> Duration {
        if self.in_sync() {
            config.sync_timeout
        } else {
            config.chase_timeout
        }
    }

    pub fn on_poll(&self) -> Reply {
        match self.state {
            LinkState::AwaitingPoll => Reply::Command(self.target),
            LinkState::SentSetpoint => Reply::Ack,
        }
    }

    /// Call only after `reply` went out completely.
    pub fn transmitted(&mut self, reply: Reply) {
        if let Reply::Command(sp) = reply {
            self.last_sent = Some(sp);
            self.state = LinkState::SentSetpoint;
        }
    }
}

// ── Bus ───────────────────────────────────────────────────────────────────────

/// A UART with a driver-enable line. The port idles in receive direction.
#[allow(async_fn_in_trait)]
pub trait HalfDuplexPort {
    /// Reads one frame into `buf`. Returns `Ok(0)` if nothing arrived within `timeout`.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, BusError>;

    /// Switches the transceiver to transmit.
    fn begin_transmit(&mut self);

    async fn write_byte(&mut self, byte: u8) -> Result<(), BusError>;

    /// Waits for the last stop bit, then switches back to receive. An error
    /// means the tail of the frame may not have left the UART intact.
    async fn end_transmit(&mut self) -> Result<(), BusError>;
}

/// Writes `frame` one byte at a time with the bus turned around for the
/// duration. The port is back in receive even if a write fails, unless the
/// future is dropped mid-frame.
pub async fn send_frame<P: HalfDuplexPort>(port: &mut P, frame: &[u8]) -> Result<(), BusError> {
    port.begin_transmit();
    let mut written = Ok(());
    for &byte in frame {
        written = port.write_byte(byte).await;
        if written.is_err() {
            break;
        }
    }
    let released = port.end_transmit().await;
    written.and(released)
}

// ── Link task ─────────────────────────────────────────────────────────────────

pub struct SerialLink<'a, P, M: RawMutex> {
    port: P,
    store: &'a StateStore<M>,
    master: SerialMaster,
    config: SerialConfig,
    rx: [u8; RX_BUF_SIZE],
}

impl<'a, P: HalfDuplexPort, M: RawMutex> SerialLink<'a, P, M> {
    pub fn new(port: P, store: &'a StateStore<M>, config: SerialConfig) -> Self {
        Self {
            port,
            store,
            master: SerialMaster::new(0),
            config,
            rx: [0; RX_BUF_SIZE],
        }
    }

    pub fn master(&self) -> &SerialMaster {
        &self.master
    }

    /// One receive window: pick up the current target, read a frame and act on it.
    pub async fn poll_cycle(&mut self) {
        let target = self.store.read().await.set_point;
        if target != self.master.target() {
            debug!("rs485: target setpoint {}", target);
        }
        self.master.retarget(target);

        let timeout = self.master.read_timeout(&self.config);
        let len = match self.port.receive(&mut self.rx, timeout).await {
            Ok(0) => return,
            Ok(n) => n.min(RX_BUF_SIZE),
            Err(e) => {
                warn!("rs485: receive failed: {:?}", e);
                self.store.record_fault(e.into());
                return;
            }
        };

        let frame = protocol::classify(&self.rx[..len], self.config.verify_telemetry_checksum);
        // Nothing of this frame is carried into the next window.
        self.rx[..len].fill(0);

        match frame {
            Ok(Inbound::Poll) => self.answer_poll().await,
            Ok(Inbound::Telemetry(t)) => {
                trace!("rs485: telemetry top={} bottom={}", t.top, t.bottom);
                self.store
                    .modify(|s| {
                        s.temp_top = t.top;
                        s.temp_bottom = t.bottom;
                    })
                    .await;
            }
            Err(e) => {
                debug!("rs485: dropped frame: {:?}", e);
                self.store.record_fault(Fault::Frame(e));
            }
        }
    }

    async fn answer_poll(&mut self) {
        let reply = self.master.on_poll();
        match send_frame(&mut self.port, reply.encode().as_bytes()).await {
            Ok(()) => {
                match reply {
                    Reply::Command(sp) => info!("rs485: pushed setpoint {}", sp),
                    Reply::Ack => trace!("rs485: ack"),
                }
                self.master.transmitted(reply);
            }
            Err(e) => {
                warn!("rs485: send failed: {:?}", e);
                self.store.record_fault(e.into());
            }
        }
    }

    pub async fn run(mut self) -> ! {
        info!("rs485: master started at {} baud", self.config.baud_rate);
        loop {
            self.poll_cycle().await;
        }
    }
}
