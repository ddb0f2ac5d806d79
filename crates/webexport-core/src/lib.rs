//! webexport core - export a trained YOLO checkpoint to ONNX for the browser.
//!
//! This crate resolves the fixed project layout, drives the external export
//! capability, relocates the produced graph to `public/models/best.onnx` and
//! reports what was produced. It can be used programmatically without the
//! `webexport` binary.
//!
//! # Example
//!
//! ```rust,ignore
//! use webexport_core::{ExportPreset, ExportRequest, ModelExporter, ProjectLayout, UltralyticsBackend};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> webexport_core::Result<()> {
//!     let layout = ProjectLayout::discover()?;
//!     let request = ExportRequest::for_preset(&layout, ExportPreset::Browser);
//!
//!     let exporter = ModelExporter::new(UltralyticsBackend::for_layout(&layout, None));
//!     let report = exporter.run(&request).await?;
//!     println!("{report}");
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod layout;
pub mod report;

// Re-export commonly used types
pub use config::{ExportPreset, ExportSettings, PathsConfig, Precision};
pub use error::{ExportError, Result};
pub use export::{
    ExportBackend, ExportRequest, ExportedModel, GraphSummary, GraphTensor, ModelExporter,
    UltralyticsBackend,
};
pub use layout::ProjectLayout;
pub use report::ExportReport;
