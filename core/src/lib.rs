//! Layout-preserving PDF translation pipeline.
//!
//! A page is rasterized ([`raster`]), its structure detected by an ONNX
//! layout model ([`layout`]), its native text harvested ([`extract`]),
//! the two merged into translatable regions ([`matcher`]), the regions
//! translated ([`translate`]), and the result re-emitted into a copy of
//! the original PDF ([`pdfwrite`]). [`orchestrator`] sequences all of it
//! per run.

pub mod config;
pub mod entities;
pub mod error;
pub mod extract;
pub mod layout;
pub mod matcher;
pub mod orchestrator;
pub mod pdfwrite;
pub mod raster;
pub mod translate;

pub use config::AppSettings;
pub use entities::{PageRegions, TranslatorUsage};
pub use error::{PipelineError, Result};
pub use orchestrator::{run, AbortFlag, ProgressEvent, RunRequest, RunResult};
