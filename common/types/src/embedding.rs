use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Width of the vectors the index collection is built for.
pub const EMBEDDING_DIM: usize = 1024;

/// Model variants served by the inference service. All of them go through
/// the same embed(sequence) contract and produce vectors of EMBEDDING_DIM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EmbeddingModel {
    #[serde(rename = "prot-t5")]
    #[default]
    ProtT5,
    #[serde(rename = "esm2-3b")]
    Esm2_3b,
    #[serde(rename = "esm2-650m")]
    Esm2_650m,
    #[serde(rename = "esm2-150m")]
    Esm2_150m,
}

#[derive(Error, Debug, Clone)]
#[error("Invalid model: {model}")]
pub struct ModelParsingError {
    pub model: String,
}

impl FromStr for EmbeddingModel {
    type Err = ModelParsingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prot-t5" | "prott5" => Ok(EmbeddingModel::ProtT5),
            "esm2-3b" => Ok(EmbeddingModel::Esm2_3b),
            "esm2-650m" => Ok(EmbeddingModel::Esm2_650m),
            "esm2-150m" => Ok(EmbeddingModel::Esm2_150m),
            m => Err(ModelParsingError {
                model: m.to_string(),
            }),
        }
    }
}

impl Display for EmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingModel::ProtT5 => write!(f, "ProtT5"),
            EmbeddingModel::Esm2_3b => write!(f, "ESM2-3B"),
            EmbeddingModel::Esm2_650m => write!(f, "ESM2-650M"),
            EmbeddingModel::Esm2_150m => write!(f, "ESM2-150M"),
        }
    }
}

/// What an embedding backend hands back: either one vector per sequence, or
/// a per-residue matrix that still needs pooling before it can be searched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Embedding {
    PerSequence(Vec<f32>),
    PerResidue(Vec<Vec<f32>>),
}

impl Embedding {
    /// Reduces to a single vector; per-residue matrices are mean-pooled.
    pub fn pooled(self) -> Vec<f32> {
        match self {
            Embedding::PerSequence(vector) => vector,
            Embedding::PerResidue(rows) => mean_pool(&rows),
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            Embedding::PerSequence(vector) => vector.len(),
            Embedding::PerResidue(rows) => rows.first().map_or(0, Vec::len),
        }
    }
}

/// Column-wise mean over per-residue rows.
pub fn mean_pool(rows: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    let mut pooled = vec![0.0f32; first.len()];
    for row in rows {
        for (acc, value) in pooled.iter_mut().zip(row) {
            *acc += value;
        }
    }
    let count = rows.len() as f32;
    for acc in pooled.iter_mut() {
        *acc /= count;
    }
    pooled
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("embedding dimension mismatch: expected {expected}, got {actual}")]
pub struct DimensionError {
    pub expected: usize,
    pub actual: usize,
}

/// Rejects wrong-width vectors before they reach the index client.
pub fn check_dimension(vector: &[f32]) -> Result<(), DimensionError> {
    if vector.len() == EMBEDDING_DIM {
        Ok(())
    } else {
        Err(DimensionError {
            expected: EMBEDDING_DIM,
            actual: vector.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_parses_cli_spellings() {
        assert_eq!(
            "ProtT5".parse::<EmbeddingModel>().unwrap(),
            EmbeddingModel::ProtT5
        );
        assert_eq!(
            "ESM2-3B".parse::<EmbeddingModel>().unwrap(),
            EmbeddingModel::Esm2_3b
        );
        assert_eq!(
            "esm2-150m".parse::<EmbeddingModel>().unwrap(),
            EmbeddingModel::Esm2_150m
        );
        assert!("esm3".parse::<EmbeddingModel>().is_err());
    }

    #[test]
    fn test_model_display_round_trips() {
        for model in [
            EmbeddingModel::ProtT5,
            EmbeddingModel::Esm2_3b,
            EmbeddingModel::Esm2_650m,
            EmbeddingModel::Esm2_150m,
        ] {
            assert_eq!(model.to_string().parse::<EmbeddingModel>().unwrap(), model);
        }
    }

    #[test]
    fn test_untagged_embedding_shapes() {
        let single: Embedding = serde_json::from_str("[1.0, 2.0, 3.0]").unwrap();
        assert_eq!(single, Embedding::PerSequence(vec![1.0, 2.0, 3.0]));

        let matrix: Embedding = serde_json::from_str("[[1.0, 2.0], [3.0, 4.0]]").unwrap();
        assert_eq!(
            matrix,
            Embedding::PerResidue(vec![vec![1.0, 2.0], vec![3.0, 4.0]])
        );
    }

    #[test]
    fn test_mean_pool_averages_rows() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert_eq!(mean_pool(&rows), vec![2.0, 3.0]);
        assert!(mean_pool(&[]).is_empty());
    }

    #[test]
    fn test_pooled_passes_single_vectors_through() {
        let vector = vec![1.0, 2.0, 3.0];
        assert_eq!(
            Embedding::PerSequence(vector.clone()).pooled(),
            vector
        );
    }

    #[test]
    fn test_check_dimension() {
        assert!(check_dimension(&vec![0.0; EMBEDDING_DIM]).is_ok());
        let err = check_dimension(&vec![0.0; 3]).unwrap_err();
        assert_eq!(err.expected, EMBEDDING_DIM);
        assert_eq!(err.actual, 3);
    }
}
