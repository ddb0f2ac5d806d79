//! Seam between the orchestrator and the external export capability.

use async_trait::async_trait;

use super::types::{ExportRequest, ExportedModel};
use crate::Result;

/// An external capability that turns a checkpoint into an ONNX file.
///
/// Implementations write the produced file wherever the underlying library
/// chooses and report its location; relocation is the orchestrator's job.
#[async_trait]
pub trait ExportBackend: Send + Sync {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// Confirm the capability can be reached.
    ///
    /// Returns `ExportError::DependencyUnavailable` when it cannot.
    async fn probe(&self) -> Result<()>;

    /// Export the checkpoint named by `request` with its settings.
    async fn export(&self, request: &ExportRequest) -> Result<ExportedModel>;
}
