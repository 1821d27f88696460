#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod error;
pub mod interrupt;
pub mod scheduler;

pub use interrupt::{InterruptControl, LocalIrq};
pub use scheduler::{PriorityScheduler, QueueFlags, QueueId, KS_PRIORITY_SCHEDULER};
