pub type Prio = usize;
pub type Tid = usize;
pub type Tick = u64;
