// file: error.rs
// desc: error type shared by inference, model loading and the UI

use thiserror::Error;

/// Errors surfaced to the UI. Cloneable so they can sit in a signal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Pixel buffer or model output has the wrong size.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// Weight record could not be downloaded.
    #[error("failed to fetch model from {url}: {reason}")]
    ModelFetch { url: String, reason: String },

    /// Weight record bytes could not be decoded into the model.
    #[error("failed to decode model weights: {reason}")]
    ModelDecode { reason: String },

    /// Model output could not be read back.
    #[error("inference failed: {reason}")]
    Inference { reason: String },

    #[error("no browser window available")]
    NoWindow,
}

pub type Result<T> = std::result::Result<T, Error>;
