use thiserror::Error;

use common_arrayfile::ArrayFileError;
use common_fasta::FastaError;
use common_types::DimensionError;
use embedding_client::EmbedError;
use sequence_store::StoreError;
use vector_index::IndexError;

/// The pipeline-level error taxonomy. Parse errors are fatal for their
/// file, NotFound degrades to placeholders, Dimension kills a single item,
/// connectivity failures are logged and skipped; the batch loops decide
/// which is which via the summary they build.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] FastaError),

    #[error(transparent)]
    ArrayFile(#[from] ArrayFileError),

    #[error(transparent)]
    Dimension(#[from] DimensionError),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error("failed to serialize homolog bundles: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {path}: {error}")]
    Output {
        path: String,
        error: std::io::Error,
    },
}

impl PipelineError {
    /// True when an external collaborator is unreachable, as opposed to bad
    /// input or a missing record.
    pub fn is_connectivity(&self) -> bool {
        match self {
            PipelineError::Store(error) => error.is_connectivity(),
            PipelineError::Index(error) => error.is_connectivity(),
            PipelineError::Embed(error) => error.is_connectivity(),
            _ => false,
        }
    }
}
