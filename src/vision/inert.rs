use super::classifier::{Classifier, ClassifierResult};
use super::target::{Target, TargetDetector};
use crate::common::{Frame, Region};

/// Classifier that never matches. Stands in for real models in dry runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct InertClassifier;

impl Classifier for InertClassifier {
    fn detect(&self, _frame: &Frame, _region: Option<Region>) -> ClassifierResult {
        ClassifierResult::miss()
    }

    fn name(&self) -> &str {
        "inert"
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct InertDetector;

impl TargetDetector for InertDetector {
    fn detect(&self, _frame: &Frame) -> Vec<Target> {
        Vec::new()
    }

    fn name(&self) -> &str {
        "inert"
    }
}
