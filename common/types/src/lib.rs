pub mod embedding;
pub mod fingerprint;
pub mod records;
pub mod summary;

pub use embedding::{
    check_dimension, mean_pool, DimensionError, Embedding, EmbeddingModel, ModelParsingError,
    EMBEDDING_DIM,
};
pub use fingerprint::{Fingerprint, FingerprintParseError};
pub use records::{
    AnnotationValue, HomologBundle, InsertOutcome, SequenceRecord, SourceLink, SEQUENCE_NOT_FOUND,
};
pub use summary::{BatchSummary, ItemOutcome, ItemStatus};
