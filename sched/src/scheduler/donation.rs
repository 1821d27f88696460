use alloc::collections::VecDeque;
use core::cmp::max;
use common::types::{Prio, Tid};
use log::{trace, warn};

use super::queue::ResourceQueue;
use super::thread_state::ThreadTable;

/// Recomputes `tid`'s effective priority from its base priority and the
/// waiters of the transferring queues it holds. Returns `(old, new)` when the
/// cached value moved.
pub fn recompute(threads: &mut ThreadTable, queues: &[ResourceQueue], tid: Tid) -> Option<(Prio, Prio)> {
    let (old, new) = {
        let table = &*threads;
        let state = table.get(tid)?;
        let base = state.priority();
        let donated = state
            .held()
            .filter_map(|queue| queues.get(queue.index()))
            .filter_map(|queue| queue.donation(table))
            .max();
        (state.effective_priority(), donated.map_or(base, |prio| max(prio, base)))
    };
    if new == old {
        return None;
    }
    threads.get_mut(tid)?.set_effective_priority(new);
    Some((old, new))
}

/// Walks waiter -> queue -> holder edges outward from `origin`, recomputing
/// every holder whose donors changed.
///
/// A simple path visits each thread once, so a chain longer than the number
/// of live records can only come from a wait cycle; propagation stops there.
pub fn propagate(threads: &mut ThreadTable, queues: &[ResourceQueue], origin: Tid) {
    let depth_limit = threads.len();
    let mut pending = VecDeque::new();
    pending.push_back((origin, 0usize));

    while let Some((tid, depth)) = pending.pop_front() {
        let (old, new) = match recompute(threads, queues, tid) {
            Some(change) => change,
            None => continue,
        };
        trace!("[sched] thread {} effective priority {} -> {}", tid, old, new);

        if depth >= depth_limit {
            warn!("[sched] wait cycle through thread {}, donation stops here", tid);
            continue;
        }

        let state = match threads.get(tid) {
            Some(state) => state,
            None => continue,
        };
        for queue in state.waiting_on() {
            let queue = match queues.get(queue.index()) {
                Some(queue) => queue,
                None => continue,
            };
            if !queue.transfers_priority() {
                continue;
            }
            if let Some(holder) = queue.holder() {
                pending.push_back((holder, depth + 1));
            }
        }
    }
}
