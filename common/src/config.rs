
// priority
pub const PRIORITY_MINIMUM: usize = 0;
pub const PRIORITY_MAXIMUM: usize = 7;
pub const PRIORITY_DEFAULT: usize = PRIORITY_MINIMUM + 1;
pub const NUM_PRIORITIES: usize = PRIORITY_MAXIMUM - PRIORITY_MINIMUM + 1;

// resource queue
pub const WAITERS_INIT_CAPACITY: usize = 8;

// wait clock, first stamp handed out
pub const WAIT_TICK_START: u64 = 1;
