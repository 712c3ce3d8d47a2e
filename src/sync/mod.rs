pub mod rwlock;

pub use rwlock::{ReadGuard, WriteGuard, WriterPriorityLock};
