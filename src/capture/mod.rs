pub mod distributor;
pub mod source;

pub use distributor::{FrameDistributor, FrameSignal};
pub use source::{CaptureWorker, FrameSource, ImageDirectorySource};
