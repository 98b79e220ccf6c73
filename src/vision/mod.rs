pub mod classifier;
pub mod inert;
pub mod target;

pub use classifier::{Classifier, ClassifierResult, Probe, ProbeOutcome, best_match};
pub use inert::{InertClassifier, InertDetector};
pub use target::{Target, TargetDetector, scale_to_window, select_best_target};
