//! Error types for the classification engine

use thiserror::Error;

/// Errors produced by artifact bootstrap, fetching, and inference
#[derive(Debug, Error)]
pub enum Error {
    /// Remote fetch failed (bad URL, network error, or non-2xx status)
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// The artifact was exported for an accelerator this build cannot use
    #[error(
        "Model artifact was exported for the '{required}' accelerator, which is not \
         available in this environment. Re-export the model under a compatible \
         environment (CPU) and restart."
    )]
    IncompatibleArtifact { required: String },

    /// Artifact deserialization failed for any other reason
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    /// Submitted bytes are not a decodable image
    #[error("Image decode failed: {0}")]
    ImageDecode(String),

    /// The forward pass failed
    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
