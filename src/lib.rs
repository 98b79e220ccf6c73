pub mod capture;
pub mod combat;
pub mod common;
pub mod config;
pub mod error;
pub mod flow;
pub mod input;
pub mod map;
pub mod orchestrator;
pub mod purchase;
pub mod state;
pub mod targeting;
pub mod vision;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Settings;
pub use error::{BotError, CaptureError, WorkerError};
pub use orchestrator::{ManagedResource, Orchestrator, OrchestratorBuilder, StopReport};
pub use state::{StateReader, StateSnapshot};
