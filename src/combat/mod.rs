pub mod liveness;
pub mod worker;

pub use liveness::{LivenessState, LivenessTracker};
pub use worker::LivenessWorker;
