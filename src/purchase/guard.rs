use crate::state::SharedHandle;
use tracing::debug;

/// Scope of one purchase cycle. Entering saves and disables auto-target;
/// dropping restores it and clears the purchase request, however the cycle
/// ended (death, timeout, cancellation, panic).
#[must_use = "dropping the guard ends the purchase cycle"]
pub struct PurchaseGuard {
    shared: SharedHandle,
}

impl PurchaseGuard {
    pub fn enter(shared: &SharedHandle) -> Self {
        shared.lock().begin_purchase_cycle();
        debug!("Purchase cycle entered, auto-target suspended");
        Self {
            shared: shared.clone(),
        }
    }
}

impl Drop for PurchaseGuard {
    fn drop(&mut self) {
        if let Some(restored) = self.shared.lock().end_purchase_cycle() {
            debug!("Purchase cycle left, auto-target restored to {}", restored);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::shared_test_state;

    #[test]
    fn guard_restores_on_drop() {
        let shared = shared_test_state();
        shared.lock().request_purchase();
        {
            let _guard = PurchaseGuard::enter(&shared);
            assert!(!shared.lock().auto_target_enabled);
            assert!(shared.lock().purchase_in_progress());
        }
        let state = shared.lock();
        assert!(state.auto_target_enabled);
        assert!(!state.purchase_requested());
        assert_eq!(state.saved_auto_target(), None);
    }

    #[test]
    fn guard_restores_on_unwind() {
        let shared = shared_test_state();
        shared.lock().auto_target_enabled = false;
        let inner = shared.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = PurchaseGuard::enter(&inner);
            panic!("purchase step failed");
        }));
        assert!(result.is_err());
        let state = shared.lock();
        assert!(!state.auto_target_enabled);
        assert!(!state.purchase_in_progress());
    }
}
