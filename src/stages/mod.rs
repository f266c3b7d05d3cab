//! Transform stages.
//!
//! A stage is one stateless processing step applied to an artifact flowing
//! through a pipeline: compile styles, add vendor prefixes and minify,
//! strip-minify scripts, compress an image. Concrete stages delegate to
//! external crates where one exists; the pipeline itself only sequences them.

pub mod css;
pub mod img;
pub mod js;

pub use css::{CssPrint, ScssCompile};
pub use img::ImageCompress;
pub use js::JsMinify;

use crate::pipeline::Artifact;
use thiserror::Error;

/// Error from a single transform stage.
///
/// Stage failures are isolated per file: the pipeline records them and keeps
/// building the rest of the batch.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StageError {
    /// The source could not be parsed (e.g. malformed style syntax)
    #[error("syntax error: {0}")]
    Syntax(String),
    /// The transform itself failed
    #[error("{0}")]
    Transform(String),
    /// A text stage received or produced bytes that are not valid UTF-8
    #[error("input is not valid UTF-8")]
    NotUtf8,
    /// I/O error while transforming
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One transform step in a pipeline.
///
/// Stages are stateless per invocation and applied strictly in the order the
/// pipeline lists them.
pub trait Stage: Send + Sync {
    /// Short stage name used in error reports and logs.
    fn name(&self) -> &'static str;

    /// Apply the transform to an artifact, producing the next artifact.
    fn apply(&self, artifact: Artifact) -> Result<Artifact, StageError>;
}

/// Decode artifact bytes as UTF-8 text.
pub(crate) fn artifact_text(artifact: &Artifact) -> Result<&str, StageError> {
    std::str::from_utf8(&artifact.bytes).map_err(|_| StageError::NotUtf8)
}
