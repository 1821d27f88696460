use crate::config::{PRIORITY_MAXIMUM, PRIORITY_MINIMUM};
use crate::types::Prio;

#[inline]
pub fn is_valid_prio(prio: Prio) -> bool {
    (PRIORITY_MINIMUM..=PRIORITY_MAXIMUM).contains(&prio)
}

#[inline]
pub fn prio_inc(prio: Prio) -> Option<Prio> {
    if prio >= PRIORITY_MAXIMUM {
        return None;
    }
    Some(prio + 1)
}

#[inline]
pub fn prio_dec(prio: Prio) -> Option<Prio> {
    if prio <= PRIORITY_MINIMUM {
        return None;
    }
    Some(prio - 1)
}
