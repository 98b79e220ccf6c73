use crate::common::{Frame, Region};
use std::fmt;
use std::sync::Arc;

/// Outcome of a single classifier call. Ownership of `artifact` moves to the
/// caller, which drops it once it is done (or hands a clone to shared state).
#[derive(Debug, Clone, Default)]
pub struct ClassifierResult {
    pub confidence: f32,
    pub region: Option<Region>,
    pub artifact: Option<Frame>,
}

impl ClassifierResult {
    pub fn new(confidence: f32) -> Self {
        Self {
            confidence,
            region: None,
            artifact: None,
        }
    }

    pub fn miss() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_artifact(mut self, artifact: Frame) -> Self {
        self.artifact = Some(artifact);
        self
    }
}

/// Pixel-level classifier (template matcher, colour probe, ...).
///
/// Implementations are pure and synchronous: the same frame and region always
/// give the same answer, and nothing outside the returned value is touched.
pub trait Classifier: Send + Sync {
    fn detect(&self, frame: &Frame, region: Option<Region>) -> ClassifierResult;
    fn name(&self) -> &str;
}

/// A classifier bound to the fixed threshold and search region it is used with.
#[derive(Clone)]
pub struct Probe {
    label: String,
    classifier: Arc<dyn Classifier>,
    threshold: f32,
    region: Option<Region>,
}

impl Probe {
    pub fn new(label: impl Into<String>, classifier: Arc<dyn Classifier>, threshold: f32) -> Self {
        Self {
            label: label.into(),
            classifier,
            threshold,
            region: None,
        }
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Runs the classifier and reports whether it cleared the threshold.
    pub fn evaluate(&self, frame: &Frame) -> ProbeOutcome {
        let result = self.classifier.detect(frame, self.region);
        ProbeOutcome {
            matched: result.confidence >= self.threshold,
            result,
        }
    }

    pub fn matches(&self, frame: &Frame) -> bool {
        let outcome = self.evaluate(frame);
        tracing::trace!(
            "{} ({}): confidence {:.3}, matched={}",
            self.label,
            self.classifier.name(),
            outcome.result.confidence,
            outcome.matched
        );
        outcome.matched
    }
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe")
            .field("label", &self.label)
            .field("classifier", &self.classifier.name())
            .field("threshold", &self.threshold)
            .field("region", &self.region)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub matched: bool,
    pub result: ClassifierResult,
}

/// Picks the best-scoring probe that clears its threshold.
pub fn best_match<'a>(
    probes: &'a [Probe],
    frame: &Frame,
) -> Option<(&'a Probe, ProbeOutcome)> {
    probes
        .iter()
        .map(|probe| (probe, probe.evaluate(frame)))
        .filter(|(_, outcome)| outcome.matched)
        .max_by(|(_, a), (_, b)| a.result.confidence.total_cmp(&b.result.confidence))
}
