use super::FrameDistributor;
use crate::error::{CaptureError, WorkerError};
use crate::worker::{Worker, ensure_running, sleep_or_cancel};
use async_trait::async_trait;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Producer side of the distributor: whatever grabs the window surface.
pub trait FrameSource: Send {
    /// Next captured image, `Ok(None)` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<DynamicImage>, CaptureError>;
    fn name(&self) -> &str;
}

/// Replays still images from a directory in file-name order.
pub struct ImageDirectorySource {
    paths: Vec<PathBuf>,
    position: usize,
    looping: bool,
}

impl ImageDirectorySource {
    pub fn open(dir: &Path, looping: bool) -> Result<Self, CaptureError> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        IMAGE_EXTENSIONS
                            .iter()
                            .any(|known| ext.eq_ignore_ascii_case(known))
                    })
            })
            .collect();
        if paths.is_empty() {
            return Err(CaptureError::EmptySource(dir.display().to_string()));
        }
        paths.sort();
        info!("Replaying {} images from {}", paths.len(), dir.display());
        Ok(Self {
            paths,
            position: 0,
            looping,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageDirectorySource {
    fn next_frame(&mut self) -> Result<Option<DynamicImage>, CaptureError> {
        if self.position >= self.paths.len() {
            if !self.looping {
                return Ok(None);
            }
            self.position = 0;
        }
        let path = &self.paths[self.position];
        self.position += 1;
        Ok(Some(image::open(path)?))
    }

    fn name(&self) -> &str {
        "image-directory"
    }
}

/// Pumps a [`FrameSource`] into the distributor at a fixed pace.
pub struct CaptureWorker {
    source: Box<dyn FrameSource>,
    distributor: Arc<FrameDistributor>,
    interval: Duration,
}

impl CaptureWorker {
    pub fn new(
        source: Box<dyn FrameSource>,
        distributor: Arc<FrameDistributor>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            distributor,
            interval,
        }
    }
}

#[async_trait]
impl Worker for CaptureWorker {
    fn name(&self) -> &'static str {
        "capture"
    }

    async fn run(&mut self, cancel: CancellationToken) -> Result<(), WorkerError> {
        info!("Capturing from {}", self.source.name());
        let result = loop {
            if let Err(e) = ensure_running(&cancel) {
                break Err(e);
            }
            match self.source.next_frame() {
                Ok(Some(image)) => {
                    let sequence = self.distributor.publish(image);
                    debug!("Published frame {}", sequence);
                }
                Ok(None) => {
                    info!("Capture source {} exhausted", self.source.name());
                    break Ok(());
                }
                Err(e) => {
                    // A single unreadable frame is a gap, not a failure.
                    warn!("Dropping frame from {}: {}", self.source.name(), e);
                }
            }
            if let Err(e) = sleep_or_cancel(&cancel, self.interval).await {
                break Err(e);
            }
        };
        self.distributor.close();
        result
    }
}
