//! The indexing core: lifecycle state, job orchestration and status.

pub mod error;
mod orchestrator;
mod recording;
mod state;
mod status;

pub use error::IndexError;
pub use orchestrator::{
    Accepted, IndexComponents, IndexOrchestrator, IndexRequest, OrchestratorSettings, QueryAnswer,
    QuerySource,
};
pub use recording::{JobReport, RecordingOutcome, RecordingReport};
pub use state::{IndexPhase, IndexStateHandle, IndexStatus};
pub use status::{Capabilities, StatusRegistry, UploadsStatus};
