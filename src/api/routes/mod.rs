//! API route modules.

pub mod index;
pub mod status;
pub mod upload;

use crate::index::{IndexOrchestrator, StatusRegistry};
use crate::uploads::UploadStagingArea;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: IndexOrchestrator,
    pub status: StatusRegistry,
    pub uploads: UploadStagingArea,
}
