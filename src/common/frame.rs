use chrono::{DateTime, Utc};
use image::DynamicImage;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// One captured sample of the automated window.
///
/// Cloning is cheap and shares the pixel buffer; the buffer is released when
/// the last clone is dropped. `sequence` increases with every publish so
/// consumers can compare recency without looking at timestamps.
#[derive(Clone)]
pub struct Frame {
    sequence: u64,
    image: Arc<DynamicImage>,
    captured_at: DateTime<Utc>,
    frame_id: Uuid,
}

impl Frame {
    pub fn new(sequence: u64, image: DynamicImage) -> Self {
        Self {
            sequence,
            image: Arc::new(image),
            captured_at: Utc::now(),
            frame_id: Uuid::new_v4(),
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn id(&self) -> Uuid {
        self.frame_id
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    #[cfg(test)]
    pub(crate) fn shared_image(&self) -> Arc<DynamicImage> {
        Arc::clone(&self.image)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (width, height) = self.dimensions();
        f.debug_struct("Frame")
            .field("sequence", &self.sequence)
            .field("frame_id", &self.frame_id)
            .field("width", &width)
            .field("height", &height)
            .field("captured_at", &self.captured_at)
            .finish()
    }
}
