mod clock;
mod donation;
mod queue;
mod thread_state;

use alloc::vec::Vec;
use core::sync::atomic::AtomicUsize;
use core::sync::atomic::Ordering::SeqCst;
use common::types::{Prio, Tid};
use common::utils::{is_valid_prio, prio_dec, prio_inc};
use lazy_static::*;
use log::debug;
use spin::Mutex;

use crate::error::{fatal, ContractViolation};
use crate::interrupt::{InterruptControl, LocalIrq};
use clock::WaitClock;

pub use queue::{QueueFlags, QueueId, ResourceQueue};
pub use thread_state::{ThreadState, ThreadTable};

// zero is never handed out
static SCHEDULER_SEQ: AtomicUsize = AtomicUsize::new(1);

lazy_static! {
    pub static ref KS_PRIORITY_SCHEDULER: Mutex<PriorityScheduler> = Mutex::new(PriorityScheduler::new());
}

/// A scheduler that hands resources to waiters by priority, with priority
/// donation from waiters to holders.
///
/// Among waiters of the same (highest) effective priority the one that has
/// waited longest wins. A thread that always finds a higher-priority waiter
/// ahead of it may starve.
///
/// Every method except [`increase_priority`](Self::increase_priority) and
/// [`decrease_priority`](Self::decrease_priority) must be called with
/// interrupts disabled.
pub struct PriorityScheduler<I: InterruptControl = LocalIrq> {
    id: usize,
    irq: I,
    threads: ThreadTable,
    queues: Vec<ResourceQueue>,
    clock: WaitClock,
    current: Option<Tid>,
}

impl PriorityScheduler<LocalIrq> {
    pub fn new() -> Self {
        Self::with_interrupts(LocalIrq::new())
    }
}

impl Default for PriorityScheduler<LocalIrq> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: InterruptControl> PriorityScheduler<I> {
    pub fn with_interrupts(irq: I) -> Self {
        PriorityScheduler {
            id: SCHEDULER_SEQ.fetch_add(1, SeqCst),
            irq,
            threads: ThreadTable::new(),
            queues: Vec::new(),
            clock: WaitClock::new(),
            current: None,
        }
    }

    pub fn irq(&self) -> &I {
        &self.irq
    }

    /// Runs `f` with interrupts disabled, then puts them back the way they were.
    pub fn without_interrupts<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let old = self.irq.set(false);
        let ret = f(self);
        self.irq.set(old);
        ret
    }

    #[inline]
    fn assert_atomic(&self) {
        if !self.irq.disabled() {
            fatal(ContractViolation::InterruptsEnabled);
        }
    }

    fn queue_index(&self, queue: QueueId) -> usize {
        if queue.owner() != self.id || queue.index() >= self.queues.len() {
            fatal(ContractViolation::UnknownQueue(queue));
        }
        queue.index()
    }

    fn propagate(&mut self, origin: Tid) {
        donation::propagate(&mut self.threads, &self.queues, origin);
    }

    pub fn set_current_thread(&mut self, tid: Tid) {
        self.assert_atomic();
        self.threads.get_or_insert(tid);
        self.current = Some(tid);
    }

    pub fn current_thread(&self) -> Option<Tid> {
        self.current
    }

    /// Allocates a new resource queue. With `transfer_priority` set, waiters
    /// donate their effective priority to whoever holds the queue.
    pub fn new_resource_queue(&mut self, transfer_priority: bool) -> QueueId {
        let id = QueueId::new(self.id, self.queues.len());
        self.queues.push(ResourceQueue::new(id, transfer_priority));
        debug!("[sched] new {} (transfer: {})", id, transfer_priority);
        id
    }

    pub fn get_priority(&self, tid: Tid) -> Prio {
        self.assert_atomic();
        self.threads.priority(tid)
    }

    pub fn get_effective_priority(&self, tid: Tid) -> Prio {
        self.assert_atomic();
        self.threads.effective_priority(tid)
    }

    pub fn set_priority(&mut self, tid: Tid, prio: Prio) {
        self.assert_atomic();
        if !is_valid_prio(prio) {
            fatal(ContractViolation::PriorityOutOfRange(prio));
        }

        let state = self.threads.get_or_insert(tid);
        if state.priority() == prio {
            return;
        }
        state.set_priority(prio);
        self.propagate(tid);
    }

    /// Raises the current thread's priority by one. Returns `false` at the
    /// maximum.
    pub fn increase_priority(&mut self) -> bool {
        self.without_interrupts(|sched| {
            let tid = sched.current_or_fatal();
            match prio_inc(sched.get_priority(tid)) {
                Some(prio) => {
                    sched.set_priority(tid, prio);
                    true
                }
                None => false,
            }
        })
    }

    /// Lowers the current thread's priority by one. Returns `false` at the
    /// minimum.
    pub fn decrease_priority(&mut self) -> bool {
        self.without_interrupts(|sched| {
            let tid = sched.current_or_fatal();
            match prio_dec(sched.get_priority(tid)) {
                Some(prio) => {
                    sched.set_priority(tid, prio);
                    true
                }
                None => false,
            }
        })
    }

    fn current_or_fatal(&self) -> Tid {
        match self.current {
            Some(tid) => tid,
            None => fatal(ContractViolation::NoCurrentThread),
        }
    }

    /// Runs the donation recompute for `tid` and returns its effective
    /// priority afterwards.
    pub fn refresh_effective_priority(&mut self, tid: Tid) -> Prio {
        self.assert_atomic();
        self.threads.get_or_insert(tid);
        self.propagate(tid);
        self.threads.effective_priority(tid)
    }

    /// Registers `tid` as waiting for `queue`, stamped with the current wait
    /// tick. The holder, if any, immediately sees the new donor.
    pub fn wait_for_access(&mut self, queue: QueueId, tid: Tid) {
        self.assert_atomic();
        let index = self.queue_index(queue);
        let holder = self.queues[index].holder();
        if holder == Some(tid) {
            fatal(ContractViolation::AlreadyHolder { tid, queue });
        }

        let state = self.threads.get_or_insert(tid);
        if state.is_waiting_on(queue) {
            fatal(ContractViolation::AlreadyWaiting { tid, queue });
        }
        let tick = self.clock.tick();
        state.add_waiting(queue, tick);
        self.queues[index].push_waiter(tid);
        debug!("[sched] thread {} waits on {} at tick {}", tid, queue, tick);

        if self.queues[index].transfers_priority() {
            if let Some(holder) = holder {
                self.propagate(holder);
            }
        }
    }

    /// Makes `tid` the holder of a free `queue`, without waiting. Used for
    /// initial ownership; a pending wait of `tid` on `queue` is dropped.
    pub fn acquire(&mut self, queue: QueueId, tid: Tid) {
        self.assert_atomic();
        let index = self.queue_index(queue);
        match self.queues[index].holder() {
            Some(holder) if holder == tid => fatal(ContractViolation::AlreadyHolder { tid, queue }),
            Some(holder) => fatal(ContractViolation::HeldByOther { tid, holder, queue }),
            None => {}
        }
        self.install_holder(index, tid);
    }

    fn install_holder(&mut self, index: usize, tid: Tid) {
        let queue = self.queues[index].id();
        let state = self.threads.get_or_insert(tid);
        if state.remove_waiting(queue).is_some() {
            self.queues[index].remove_waiter(tid);
        }
        state.add_held(queue);
        self.queues[index].set_holder(Some(tid));
        self.propagate(tid);
    }

    fn release_holder(&mut self, index: usize) -> Option<Tid> {
        let queue = self.queues[index].id();
        let holder = self.queues[index].set_holder(None)?;
        if let Some(state) = self.threads.get_mut(holder) {
            state.remove_held(queue);
        }
        self.propagate(holder);
        Some(holder)
    }

    /// Releases the current holder and hands `queue` to the best waiter, which
    /// is returned. With no waiters the queue is left free.
    pub fn next_thread(&mut self, queue: QueueId) -> Option<Tid> {
        self.assert_atomic();
        let index = self.queue_index(queue);
        if let Some(old) = self.release_holder(index) {
            debug!("[sched] thread {} releases {}", old, queue);
        }

        let next = self.queues[index].pick_next(&self.threads)?;
        self.install_holder(index, next);
        debug!(
            "[sched] {} handed to thread {} (effective {})",
            queue,
            next,
            self.threads.effective_priority(next)
        );
        Some(next)
    }

    /// The thread `next_thread` would return, leaving the queue untouched.
    pub fn pick_next_thread(&self, queue: QueueId) -> Option<Tid> {
        self.assert_atomic();
        let index = self.queue_index(queue);
        self.queues[index].pick_next(&self.threads)
    }

    /// Withdraws a waiting thread from `queue`, e.g. after its wait was aborted.
    pub fn cancel_wait(&mut self, queue: QueueId, tid: Tid) {
        self.assert_atomic();
        let index = self.queue_index(queue);
        let removed = self.threads.get_mut(tid).and_then(|state| state.remove_waiting(queue));
        if removed.is_none() {
            fatal(ContractViolation::NotWaiting { tid, queue });
        }
        self.queues[index].remove_waiter(tid);
        debug!("[sched] thread {} stops waiting on {}", tid, queue);

        if self.queues[index].transfers_priority() {
            if let Some(holder) = self.queues[index].holder() {
                self.propagate(holder);
            }
        }
    }

    /// Drops the record of a finished thread. Queues it still holds become
    /// free; their waiters stay queued for the next `next_thread`.
    pub fn retire_thread(&mut self, tid: Tid) {
        self.assert_atomic();
        let state = match self.threads.get(tid) {
            Some(state) => state,
            None => return,
        };
        if let Some(queue) = state.waiting_on().next() {
            fatal(ContractViolation::RetireWhileWaiting { tid, queue });
        }

        if let Some(state) = self.threads.remove(tid) {
            for queue in state.held() {
                if let Some(q) = self.queues.get_mut(queue.index()) {
                    q.set_holder(None);
                }
            }
        }
        if self.current == Some(tid) {
            self.current = None;
        }
        debug!("[sched] thread {} retired", tid);
    }

    pub fn holder(&self, queue: QueueId) -> Option<Tid> {
        self.assert_atomic();
        self.queues[self.queue_index(queue)].holder()
    }

    pub fn transfers_priority(&self, queue: QueueId) -> bool {
        self.assert_atomic();
        self.queues[self.queue_index(queue)].transfers_priority()
    }

    /// Waiters of `queue`, in the order `next_thread` would serve them.
    pub fn waiters(&self, queue: QueueId) -> Vec<Tid> {
        self.assert_atomic();
        self.queues[self.queue_index(queue)].ordered_waiters(&self.threads)
    }

    pub fn waiting_on(&self, tid: Tid) -> Vec<QueueId> {
        self.assert_atomic();
        self.threads
            .get(tid)
            .map(|state| state.waiting_on().collect())
            .unwrap_or_default()
    }

    pub fn held_by(&self, tid: Tid) -> Vec<QueueId> {
        self.assert_atomic();
        self.threads
            .get(tid)
            .map(|state| state.held().collect())
            .unwrap_or_default()
    }

    pub fn thread_state(&self, tid: Tid) -> Option<&ThreadState> {
        self.assert_atomic();
        self.threads.get(tid)
    }

    pub fn thread_states(&self) -> impl Iterator<Item = &ThreadState> {
        self.assert_atomic();
        self.threads.iter()
    }

    /// Dumps `queue` to the log: holder first, then waiters in service order.
    pub fn print(&self, queue: QueueId) {
        self.assert_atomic();
        let q = &self.queues[self.queue_index(queue)];
        match q.holder() {
            Some(holder) => debug!(
                "{} held by {} (prio {}, effective {})",
                queue,
                holder,
                self.threads.priority(holder),
                self.threads.effective_priority(holder)
            ),
            None => debug!("{} free", queue),
        }
        for tid in q.ordered_waiters(&self.threads) {
            let tick = self.threads.get(tid).and_then(|state| state.wait_tick(queue));
            debug!(
                "    waiter {} (prio {}, effective {}, since {:?})",
                tid,
                self.threads.priority(tid),
                self.threads.effective_priority(tid),
                tick
            );
        }
    }
}
