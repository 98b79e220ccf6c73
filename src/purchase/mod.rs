pub mod guard;
pub mod worker;

pub use guard::PurchaseGuard;
pub use worker::{CycleOutcome, Preconditions, PurchaseWorker};
