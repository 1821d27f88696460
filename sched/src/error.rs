use core::fmt;
use common::config::{PRIORITY_MAXIMUM, PRIORITY_MINIMUM};
use common::types::{Prio, Tid};
use log::error;

use crate::scheduler::QueueId;

/// Misuse of the scheduling core. None of these are recoverable: the caller
/// broke a precondition and the kernel stops before any invariant is lost.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ContractViolation {
    InterruptsEnabled,
    PriorityOutOfRange(Prio),
    AlreadyHolder { tid: Tid, queue: QueueId },
    AlreadyWaiting { tid: Tid, queue: QueueId },
    HeldByOther { tid: Tid, holder: Tid, queue: QueueId },
    NotWaiting { tid: Tid, queue: QueueId },
    RetireWhileWaiting { tid: Tid, queue: QueueId },
    UnknownQueue(QueueId),
    NoCurrentThread,
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractViolation::InterruptsEnabled => {
                write!(f, "scheduling state touched with interrupts enabled")
            }
            ContractViolation::PriorityOutOfRange(prio) => {
                write!(f, "priority {} outside [{}, {}]", prio, PRIORITY_MINIMUM, PRIORITY_MAXIMUM)
            }
            ContractViolation::AlreadyHolder { tid, queue } => {
                write!(f, "thread {} already holds {}", tid, queue)
            }
            ContractViolation::AlreadyWaiting { tid, queue } => {
                write!(f, "thread {} already waits on {}", tid, queue)
            }
            ContractViolation::HeldByOther { tid, holder, queue } => {
                write!(f, "thread {} cannot acquire {}: held by thread {}", tid, queue, holder)
            }
            ContractViolation::NotWaiting { tid, queue } => {
                write!(f, "thread {} is not waiting on {}", tid, queue)
            }
            ContractViolation::RetireWhileWaiting { tid, queue } => {
                write!(f, "thread {} retired while waiting on {}", tid, queue)
            }
            ContractViolation::UnknownQueue(queue) => {
                write!(f, "{} was not created by this scheduler", queue)
            }
            ContractViolation::NoCurrentThread => {
                write!(f, "no current thread installed")
            }
        }
    }
}

#[cold]
pub fn fatal(violation: ContractViolation) -> ! {
    error!("[sched] {}", violation);
    panic!("{}", violation);
}
