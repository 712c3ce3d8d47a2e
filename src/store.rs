use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::blocking_mutex::Mutex;

use crate::error::Fault;
use crate::state::SystemState;
use crate::sync::WriterPriorityLock;

/// Store shared between the firmware tasks and interrupt-safe producers.
pub type SharedStore = StateStore<CriticalSectionRawMutex>;

/// Last fault seen by any task, plus how many have been recorded since boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultLog {
    pub last: Option<Fault>,
    pub count: u32,
}

/// Owner of the one [`SystemState`]. Only whole records go in or out.
pub struct StateStore<M: RawMutex> {
    state: WriterPriorityLock<M, SystemState>,
    faults: Mutex<M, Cell<FaultLog>>,
}

impl<M: RawMutex> StateStore<M> {
    pub const fn new() -> Self {
        Self {
            state: WriterPriorityLock::new(SystemState::new()),
            faults: Mutex::new(Cell::new(FaultLog { last: None, count: 0 })),
        }
    }

    /// Snapshot of the whole record.
    pub async fn read(&self) -> SystemState {
        *self.state.acquire_read().await
    }

    /// Replace the whole record.
    pub async fn write(&self, next: SystemState) {
        *self.state.acquire_write().await = next;
    }

    /// Copy out, mutate, copy back, all under one write lock.
    pub async fn modify<R>(&self, f: impl FnOnce(&mut SystemState) -> R) -> R {
        let mut guard = self.state.acquire_write().await;
        let mut local = *guard;
        let out = f(&mut local);
        *guard = local;
        out
    }

    /// Snapshot without waiting; `None` while a writer holds or is queued.
    pub fn try_read(&self) -> Option<SystemState> {
        self.state.try_read().map(|guard| *guard)
    }

    pub fn record_fault(&self, fault: Fault) {
        self.faults.lock(|log| {
            let prev = log.get();
            log.set(FaultLog {
                last: Some(fault),
                count: prev.count.saturating_add(1),
            });
        });
    }

    pub fn last_fault(&self) -> FaultLog {
        self.faults.lock(Cell::get)
    }
}

impl<M: RawMutex> Default for StateStore<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrameError;
    use crate::state::{Mode, MIC_BUFFER_SIZE};
    use futures::executor::block_on;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    /// Every field derived from one generation number.
    fn stamped(generation: u32) -> SystemState {
        let g = generation as i32;
        SystemState {
            timestamp: generation,
            power: g,
            mic: [g as i16; MIC_BUFFER_SIZE],
            leak_sensor: generation % 2 == 1,
            temp_bottom: g as i16,
            temp_top: g as i16,
            grid_freq: generation as f32,
            gps_location: g,
            set_point: generation as u8,
            heating_status: generation % 2 == 1,
            mode: if generation % 2 == 1 { Mode::FrequencyResponsive } else { Mode::Manual },
            threshold_over_hz: generation as f32,
            threshold_under_hz: generation as f32,
        }
    }

    fn is_consistent(s: &SystemState) -> bool {
        *s == stamped(s.timestamp)
    }

    #[test]
    fn starts_zeroed() {
        let store: SharedStore = StateStore::new();
        assert_eq!(block_on(store.read()), SystemState::new());
        assert_eq!(store.last_fault(), FaultLog::default());
    }

    #[test]
    fn write_then_read_returns_whole_record() {
        let store: SharedStore = StateStore::new();
        block_on(store.write(stamped(9)));
        assert_eq!(block_on(store.read()), stamped(9));
        assert_eq!(store.try_read(), Some(stamped(9)));
    }

    #[test]
    fn modify_keeps_untouched_fields() {
        let store: SharedStore = StateStore::new();
        block_on(store.write(stamped(3)));
        let old = block_on(store.modify(|s| core::mem::replace(&mut s.grid_freq, 60.0)));
        assert_eq!(old, 3.0);

        let after = block_on(store.read());
        assert_eq!(after.grid_freq, 60.0);
        assert_eq!(after.mic, stamped(3).mic);
        assert_eq!(after.set_point, 3);
    }

    #[test]
    fn faults_are_counted() {
        let store: SharedStore = StateStore::new();
        store.record_fault(Fault::Bus);
        store.record_fault(FrameError::UnknownPrefix.into());
        let log = store.last_fault();
        assert_eq!(log.count, 2);
        assert_eq!(log.last, Some(Fault::Frame(FrameError::UnknownPrefix)));
    }

    #[test]
    fn concurrent_readers_never_see_torn_records() {
        let store: Arc<SharedStore> = Arc::new(StateStore::new());
        let stop = Arc::new(AtomicBool::new(false));

        let writers: Vec<_> = (0..2u32)
            .map(|w| {
                let store = store.clone();
                thread::spawn(move || {
                    for i in 0..2_000u32 {
                        block_on(store.write(stamped(i * 2 + w)));
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let store = store.clone();
                let stop = stop.clone();
                thread::spawn(move || {
                    let mut seen = 0u32;
                    while !stop.load(Ordering::Relaxed) {
                        let snap = block_on(store.read());
                        assert!(is_consistent(&snap), "torn read: {snap:?}");
                        seen += 1;
                    }
                    seen
                })
            })
            .collect();

        for w in writers {
            w.join().unwrap();
        }
        stop.store(true, Ordering::Relaxed);
        for r in readers {
            assert!(r.join().unwrap() > 0);
        }
        assert!(is_consistent(&block_on(store.read())));
    }
}
