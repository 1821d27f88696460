use common::config::WAIT_TICK_START;
use common::types::Tick;

/// Logical clock stamping the moment a thread starts waiting. Stamps are
/// strictly increasing for the lifetime of the scheduler.
pub struct WaitClock {
    next: Tick,
}

impl WaitClock {
    pub const fn new() -> Self {
        WaitClock { next: WAIT_TICK_START }
    }

    pub fn tick(&mut self) -> Tick {
        let now = self.next;
        self.next += 1;
        now
    }

    #[cfg(test)]
    pub fn now(&self) -> Tick {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_strictly_increase() {
        let mut clock = WaitClock::new();
        let a = clock.tick();
        let b = clock.tick();
        let c = clock.tick();
        assert_eq!(a, WAIT_TICK_START);
        assert!(a < b && b < c);
        assert_eq!(clock.now(), c + 1);
    }
}
