use core::sync::atomic::AtomicBool;
use core::sync::atomic::Ordering::SeqCst;

/// The interrupt-enable primitive the scheduling core runs under. Every
/// scheduler operation must execute while interrupts are disabled.
pub trait InterruptControl {
    /// Sets the enable flag, returning the previous value.
    fn set(&self, enabled: bool) -> bool;

    fn enabled(&self) -> bool;

    fn disabled(&self) -> bool {
        !self.enabled()
    }
}

/// Interrupt flag of a single hart. Starts enabled.
pub struct LocalIrq {
    enabled: AtomicBool,
}

impl LocalIrq {
    pub const fn new() -> Self {
        LocalIrq {
            enabled: AtomicBool::new(true),
        }
    }
}

impl Default for LocalIrq {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptControl for LocalIrq {
    fn set(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, SeqCst)
    }

    fn enabled(&self) -> bool {
        self.enabled.load(SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_returns_previous_state() {
        let irq = LocalIrq::new();
        assert!(irq.enabled());
        let old = irq.set(false);
        assert!(old);
        assert!(irq.disabled());
        // nested disable keeps them off
        let inner = irq.set(false);
        assert!(!inner);
        irq.set(inner);
        assert!(irq.disabled());
        irq.set(old);
        assert!(irq.enabled());
    }
}
