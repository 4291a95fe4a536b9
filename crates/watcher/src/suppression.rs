use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Shared flag telling the mutation listener that the loop itself is
/// writing. Relevant mutations seen while it is raised are counted and
/// dropped.
#[derive(Debug, Clone, Default)]
pub struct Suppression {
    active: Arc<AtomicBool>,
    discarded: Arc<AtomicU64>,
}

impl Suppression {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag until the returned guard is dropped.
    #[must_use]
    pub fn enter(&self) -> SuppressionGuard {
        self.active.store(true, Ordering::SeqCst);
        SuppressionGuard {
            active: Arc::clone(&self.active),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn record_discard(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub struct SuppressionGuard {
    active: Arc<AtomicBool>,
}

impl Drop for SuppressionGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_lowers_flag_on_drop() {
        let suppression = Suppression::new();
        assert!(!suppression.is_active());
        {
            let _guard = suppression.enter();
            assert!(suppression.clone().is_active());
            suppression.record_discard();
        }
        assert!(!suppression.is_active());
        assert_eq!(suppression.discarded(), 1);
    }
}
