use alloc::collections::{BTreeMap, BTreeSet};
use common::config::PRIORITY_DEFAULT;
use common::types::{Prio, Tick, Tid};
use log::trace;

use super::QueueId;

/// Scheduling record of one thread.
pub struct ThreadState {
    tid: Tid,
    priority: Prio,
    effective_priority: Prio,
    held: BTreeSet<QueueId>,
    waiting: BTreeMap<QueueId, Tick>,
}

impl ThreadState {
    pub fn new(tid: Tid) -> Self {
        ThreadState {
            tid,
            priority: PRIORITY_DEFAULT,
            effective_priority: PRIORITY_DEFAULT,
            held: BTreeSet::new(),
            waiting: BTreeMap::new(),
        }
    }

    pub fn tid(&self) -> Tid {
        self.tid
    }

    pub fn priority(&self) -> Prio {
        self.priority
    }

    pub fn effective_priority(&self) -> Prio {
        self.effective_priority
    }

    pub fn held(&self) -> impl Iterator<Item = QueueId> + '_ {
        self.held.iter().copied()
    }

    pub fn waiting_on(&self) -> impl Iterator<Item = QueueId> + '_ {
        self.waiting.keys().copied()
    }

    pub fn wait_tick(&self, queue: QueueId) -> Option<Tick> {
        self.waiting.get(&queue).copied()
    }

    pub fn holds(&self, queue: QueueId) -> bool {
        self.held.contains(&queue)
    }

    pub fn is_waiting_on(&self, queue: QueueId) -> bool {
        self.waiting.contains_key(&queue)
    }

    pub(super) fn set_priority(&mut self, prio: Prio) {
        self.priority = prio;
    }

    pub(super) fn set_effective_priority(&mut self, prio: Prio) {
        self.effective_priority = prio;
    }

    pub(super) fn add_held(&mut self, queue: QueueId) {
        self.held.insert(queue);
    }

    pub(super) fn remove_held(&mut self, queue: QueueId) -> bool {
        self.held.remove(&queue)
    }

    pub(super) fn add_waiting(&mut self, queue: QueueId, tick: Tick) {
        self.waiting.insert(queue, tick);
    }

    pub(super) fn remove_waiting(&mut self, queue: QueueId) -> Option<Tick> {
        self.waiting.remove(&queue)
    }
}

/// Side table from thread identity to its scheduling record. Records are
/// created on first mutation; reads of an unknown thread see the defaults.
#[derive(Default)]
pub struct ThreadTable {
    states: BTreeMap<Tid, ThreadState>,
}

impl ThreadTable {
    pub fn new() -> Self {
        ThreadTable {
            states: BTreeMap::new(),
        }
    }

    pub fn get(&self, tid: Tid) -> Option<&ThreadState> {
        self.states.get(&tid)
    }

    pub fn get_mut(&mut self, tid: Tid) -> Option<&mut ThreadState> {
        self.states.get_mut(&tid)
    }

    pub fn get_or_insert(&mut self, tid: Tid) -> &mut ThreadState {
        self.states.entry(tid).or_insert_with(|| {
            trace!("[sched] new thread state for {}", tid);
            ThreadState::new(tid)
        })
    }

    pub fn remove(&mut self, tid: Tid) -> Option<ThreadState> {
        self.states.remove(&tid)
    }

    pub fn priority(&self, tid: Tid) -> Prio {
        self.get(tid).map_or(PRIORITY_DEFAULT, ThreadState::priority)
    }

    pub fn effective_priority(&self, tid: Tid) -> Prio {
        self.get(tid).map_or(PRIORITY_DEFAULT, ThreadState::effective_priority)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ThreadState> {
        self.states.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_thread_reads_defaults() {
        let table = ThreadTable::new();
        assert_eq!(table.priority(42), PRIORITY_DEFAULT);
        assert_eq!(table.effective_priority(42), PRIORITY_DEFAULT);
        assert!(table.is_empty());
    }

    #[test]
    fn record_is_created_once() {
        let mut table = ThreadTable::new();
        table.get_or_insert(5).set_priority(6);
        assert_eq!(table.get_or_insert(5).priority(), 6);
        assert_eq!(table.len(), 1);
        assert!(table.remove(5).is_some());
        assert!(table.get(5).is_none());
    }

    #[test]
    fn waiting_keeps_stamp_per_queue() {
        let mut state = ThreadState::new(1);
        let a = QueueId::new(0, 0);
        let b = QueueId::new(0, 1);
        state.add_waiting(a, 10);
        state.add_waiting(b, 11);
        assert_eq!(state.wait_tick(a), Some(10));
        assert_eq!(state.remove_waiting(b), Some(11));
        assert!(!state.is_waiting_on(b));
        assert_eq!(state.waiting_on().count(), 1);
    }
}
