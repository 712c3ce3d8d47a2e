//! Reader/writer lock that prefers writers.
//!
//! Consumers of the shared state want the freshest value, so once a writer is
//! queued no new reader is admitted. Readers already inside finish normally;
//! the writer gets the resource as soon as they drain.
//!
//! The four gates of the classic semaphore construction are folded into one
//! blocking critical section:
//!
//! | gate                  | expressed as                         |
//! |-----------------------|--------------------------------------|
//! | reader admission      | closed while `writers > 0`           |
//! | reader-count mutex    | `readers`, only touched under `state` |
//! | writer-count mutex    | `writers`, only touched under `state` |
//! | resource              | held while `writing \|\| readers > 0` |
//!
//! # Preconditions
//!
//! The lock is not reentrant. A task holding either guard must not acquire the
//! lock again: a reader asking for write access, or a writer asking for
//! anything, waits forever on itself.
//!
//! Nothing here may be awaited from interrupt context.

use core::cell::{RefCell, UnsafeCell};
use core::future::{poll_fn, Future};
use core::ops::{Deref, DerefMut};
use core::pin::Pin;
use core::task::{Context, Poll};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::waitqueue::MultiWakerRegistration;

/// Waker slots per side of the lock. Must be at least the number of tasks
/// that can block on one side at once: a full registration wakes every
/// waiter, and with more tasks than slots they keep displacing each other.
pub const MAX_WAITERS: usize = 8;

type WakerSet = MultiWakerRegistration<MAX_WAITERS>;

struct LockState {
    readers: usize,
    /// Writers queued or holding.
    writers: usize,
    writing: bool,
    reader_wakers: WakerSet,
    writer_wakers: WakerSet,
}

impl LockState {
    const fn new() -> Self {
        Self {
            readers: 0,
            writers: 0,
            writing: false,
            reader_wakers: WakerSet::new(),
            writer_wakers: WakerSet::new(),
        }
    }

    fn admits_reader(&self) -> bool {
        self.writers == 0
    }

    fn resource_free(&self) -> bool {
        !self.writing && self.readers == 0
    }
}

pub struct WriterPriorityLock<M: RawMutex, T> {
    state: Mutex<M, RefCell<LockState>>,
    data: UnsafeCell<T>,
}

unsafe impl<M: RawMutex + Sync, T: Send + Sync> Sync for WriterPriorityLock<M, T> {}

impl<M: RawMutex, T> WriterPriorityLock<M, T> {
    pub const fn new(value: T) -> Self {
        Self {
            state: Mutex::new(RefCell::new(LockState::new())),
            data: UnsafeCell::new(value),
        }
    }

    /// Shared access. Waits while a writer holds the lock or is queued for it.
    pub async fn acquire_read(&self) -> ReadGuard<'_, M, T> {
        poll_fn(|cx| {
            self.state.lock(|s| {
                let mut s = s.borrow_mut();
                if s.admits_reader() {
                    s.readers += 1;
                    Poll::Ready(())
                } else {
                    s.reader_wakers.register(cx.waker());
                    Poll::Pending
                }
            })
        })
        .await;
        ReadGuard { lock: self }
    }

    /// Exclusive access. Queues immediately (closing reader admission), then
    /// waits for readers already inside to leave.
    pub async fn acquire_write(&self) -> WriteGuard<'_, M, T> {
        WriteAcquire {
            lock: self,
            queued: false,
        }
        .await;
        WriteGuard { lock: self }
    }

    pub fn try_read(&self) -> Option<ReadGuard<'_, M, T>> {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            if s.admits_reader() {
                s.readers += 1;
                Some(ReadGuard { lock: self })
            } else {
                None
            }
        })
    }

    /// Fails if anyone holds the lock or another writer is already queued.
    pub fn try_write(&self) -> Option<WriteGuard<'_, M, T>> {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            if s.writers == 0 && s.resource_free() {
                s.writers = 1;
                s.writing = true;
                Some(WriteGuard { lock: self })
            } else {
                None
            }
        })
    }

    fn release_read(&self) {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            s.readers = match s.readers.checked_sub(1) {
                Some(n) => n,
                None => panic!("rwlock: read released without a reader inside"),
            };
            if s.readers == 0 {
                s.writer_wakers.wake();
            }
        })
    }

    fn release_write(&self) {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            if !s.writing {
                panic!("rwlock: write released without a writer inside");
            }
            s.writing = false;
            s.writers -= 1;
            if s.writers > 0 {
                s.writer_wakers.wake();
            } else {
                s.reader_wakers.wake();
            }
        })
    }

    /// Leaves the writer queue without having taken the resource.
    fn abandon_write(&self) {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            s.writers -= 1;
            if s.writers == 0 {
                s.reader_wakers.wake();
            }
        })
    }
}

/// Counts itself into `writers` on first poll; backs out again if dropped
/// before it gets the resource.
struct WriteAcquire<'a, M: RawMutex, T> {
    lock: &'a WriterPriorityLock<M, T>,
    queued: bool,
}

impl<M: RawMutex, T> Future for WriteAcquire<'_, M, T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let lock = this.lock;
        lock.state.lock(|s| {
            let mut s = s.borrow_mut();
            if !this.queued {
                s.writers += 1;
                this.queued = true;
            }
            if s.resource_free() {
                s.writing = true;
                // Ownership of the `writers` slot moves to the guard.
                this.queued = false;
                Poll::Ready(())
            } else {
                s.writer_wakers.register(cx.waker());
                Poll::Pending
            }
        })
    }
}

impl<M: RawMutex, T> Drop for WriteAcquire<'_, M, T> {
    fn drop(&mut self) {
        if self.queued {
            self.lock.abandon_write();
        }
    }
}

pub struct ReadGuard<'a, M: RawMutex, T> {
    lock: &'a WriterPriorityLock<M, T>,
}

impl<M: RawMutex, T> ReadGuard<'_, M, T> {
    pub fn release(self) {}
}

impl<M: RawMutex, T> Deref for ReadGuard<'_, M, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: readers > 0 keeps every writer out.
        unsafe { &*self.lock.data.get() }
    }
}

impl<M: RawMutex, T> Drop for ReadGuard<'_, M, T> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

pub struct WriteGuard<'a, M: RawMutex, T> {
    lock: &'a WriterPriorityLock<M, T>,
}

impl<M: RawMutex, T> WriteGuard<'_, M, T> {
    pub fn release(self) {}
}

impl<M: RawMutex, T> Deref for WriteGuard<'_, M, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: `writing` excludes every other guard.
        unsafe { &*self.lock.data.get() }
    }
}

impl<M: RawMutex, T> DerefMut for WriteGuard<'_, M, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<M: RawMutex, T> Drop for WriteGuard<'_, M, T> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}
