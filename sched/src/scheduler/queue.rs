use alloc::vec::Vec;
use core::cmp::Reverse;
use core::fmt;
use bitflags::*;
use common::config::WAITERS_INIT_CAPACITY;
use common::types::{Prio, Tick, Tid};

use super::thread_state::ThreadTable;

bitflags! {
    pub struct QueueFlags: u8 {
        /// Waiters donate their effective priority to the holder.
        const TRANSFER_PRIORITY = 1 << 0;
    }
}

/// Handle of a resource queue, as handed out by the scheduler.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub struct QueueId {
    owner: usize,
    index: usize,
}

impl QueueId {
    pub(crate) const fn new(owner: usize, index: usize) -> Self {
        QueueId { owner, index }
    }

    /// Instance id of the scheduler that created the queue.
    pub fn owner(self) -> usize {
        self.owner
    }

    pub fn index(self) -> usize {
        self.index
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue#{}", self.index)
    }
}

/// Arbitration queue of one resource: unordered waiters, at most one holder.
///
/// Waiters are kept in arrival order and ranked only when a decision is
/// made, since their effective priorities move while they wait.
pub struct ResourceQueue {
    id: QueueId,
    flags: QueueFlags,
    waiters: Vec<Tid>,
    holder: Option<Tid>,
}

impl ResourceQueue {
    pub fn new(id: QueueId, transfer_priority: bool) -> Self {
        let mut flags = QueueFlags::empty();
        flags.set(QueueFlags::TRANSFER_PRIORITY, transfer_priority);
        ResourceQueue {
            id,
            flags,
            waiters: Vec::with_capacity(WAITERS_INIT_CAPACITY),
            holder: None,
        }
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn flags(&self) -> QueueFlags {
        self.flags
    }

    pub fn transfers_priority(&self) -> bool {
        self.flags.contains(QueueFlags::TRANSFER_PRIORITY)
    }

    pub fn holder(&self) -> Option<Tid> {
        self.holder
    }

    pub fn is_free(&self) -> bool {
        self.holder.is_none()
    }

    pub fn waiters(&self) -> &[Tid] {
        &self.waiters
    }

    pub(super) fn push_waiter(&mut self, tid: Tid) {
        self.waiters.push(tid);
    }

    pub(super) fn remove_waiter(&mut self, tid: Tid) -> bool {
        match self.waiters.iter().position(|&t| t == tid) {
            Some(pos) => {
                self.waiters.remove(pos);
                true
            }
            None => false,
        }
    }

    pub(super) fn set_holder(&mut self, holder: Option<Tid>) -> Option<Tid> {
        core::mem::replace(&mut self.holder, holder)
    }

    /// Effective priority descending, then wait stamp ascending.
    fn selection_key(&self, threads: &ThreadTable, tid: Tid) -> Option<(Reverse<Prio>, Tick)> {
        let state = threads.get(tid)?;
        let tick = state.wait_tick(self.id)?;
        Some((Reverse(state.effective_priority()), tick))
    }

    /// The waiter `next_thread` would hand the resource to.
    pub fn pick_next(&self, threads: &ThreadTable) -> Option<Tid> {
        self.waiters
            .iter()
            .filter_map(|&tid| self.selection_key(threads, tid).map(|key| (key, tid)))
            .min_by_key(|(key, _)| *key)
            .map(|(_, tid)| tid)
    }

    /// All waiters, best candidate first.
    pub fn ordered_waiters(&self, threads: &ThreadTable) -> Vec<Tid> {
        let mut ranked: Vec<_> = self
            .waiters
            .iter()
            .filter_map(|&tid| self.selection_key(threads, tid).map(|key| (key, tid)))
            .collect();
        ranked.sort_unstable_by_key(|(key, _)| *key);
        ranked.into_iter().map(|(_, tid)| tid).collect()
    }

    /// Priority this queue donates to its holder, if any.
    pub fn donation(&self, threads: &ThreadTable) -> Option<Prio> {
        if !self.transfers_priority() {
            return None;
        }
        self.waiters
            .iter()
            .map(|&tid| threads.effective_priority(tid))
            .max()
    }
}
