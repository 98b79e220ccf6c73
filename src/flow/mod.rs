pub mod machine;
pub mod worker;

pub use machine::{FlowClassifiers, FlowDecision, FlowProbes, FlowState, FlowStep, SearchCheck};
pub use worker::FlowWorker;
