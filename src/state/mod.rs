pub mod reader;
pub mod shared;

pub use reader::{StateReader, StateSnapshot};
pub use shared::{ArtifactSlot, MapObservation, SharedHandle, SharedState, shared};
