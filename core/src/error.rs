//! Public error type for the pipeline. Internal helpers use `anyhow::Result`
//! with `.context(...)`; the orchestrator is the single seam that folds an
//! `anyhow::Error` into the right variant here before it crosses the API.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("asset missing: {path}")]
    AssetMissing { path: PathBuf },

    #[error("failed to render page {page_number}: {cause}")]
    RenderFailed { page_number: usize, cause: String },

    #[error("layout inference failed: {0}")]
    InferenceFailed(String),

    #[error("text extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("translation failed: {0}")]
    TranslationFailed(String),

    #[error("failed to write output PDF: {0}")]
    WriteFailed(String),

    #[error("run cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, PipelineError>;
