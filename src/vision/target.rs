use crate::common::{BoundingBox, Frame, Size};
use serde::{Deserialize, Serialize};

const HEAD_LABEL: &str = "head";

/// One object reported by the neural detector, in detector input space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub bbox: BoundingBox,
    pub label: String,
    pub confidence: f32,
}

impl Target {
    pub fn new(bbox: BoundingBox, label: impl Into<String>, confidence: f32) -> Self {
        Self {
            bbox,
            label: label.into(),
            confidence,
        }
    }

    pub fn is_head(&self) -> bool {
        self.label.eq_ignore_ascii_case(HEAD_LABEL)
    }
}

pub trait TargetDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Vec<Target>;
    fn name(&self) -> &str;
}

/// Linear mapping from detector input space to window pixels.
pub fn scale_to_window(x: f32, y: f32, model_input: Size, window: Size) -> (f32, f32) {
    (
        x * window.width as f32 / model_input.width as f32,
        y * window.height as f32 / model_input.height as f32,
    )
}

/// Picks the target to act on this tick: any head before any other label,
/// then the one closest to the window centre.
pub fn select_best_target<'a>(
    targets: &'a [Target],
    min_confidence: f32,
    model_input: Size,
    window: Size,
) -> Option<&'a Target> {
    let center = (window.width as f32 / 2.0, window.height as f32 / 2.0);
    targets
        .iter()
        .filter(|target| target.confidence >= min_confidence)
        .map(|target| {
            let (cx, cy) = target.bbox.center();
            let (x, y) = scale_to_window(cx, cy, model_input, window);
            let distance = ((x - center.0).powi(2) + (y - center.1).powi(2)).sqrt();
            (target, distance)
        })
        .min_by(|(a, da), (b, db)| {
            b.is_head()
                .cmp(&a.is_head())
                .then_with(|| da.total_cmp(db))
        })
        .map(|(target, _)| target)
}
