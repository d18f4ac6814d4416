use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use common_types::Fingerprint;

use crate::{IndexError, IndexPoint, ScoredNeighbor, SearchParams, VectorIndex};

/// In-process stand-in for the vector service: a brute-force cosine scan
/// with the same contract. The exact flag is moot here, every search is
/// exact.
#[derive(Default)]
pub struct MemoryVectorIndex {
    points: Mutex<HashMap<Uuid, IndexPoint>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.lock().expect("index lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn ensure_collection(&self) -> Result<(), IndexError> {
        Ok(())
    }

    async fn upsert(&self, points: &[IndexPoint]) -> Result<(), IndexError> {
        let mut stored = self.points.lock().expect("index lock poisoned");
        for point in points {
            stored.insert(point.fingerprint.point_id(), point.clone());
        }
        Ok(())
    }

    async fn retrieve(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<f32>>, IndexError> {
        let stored = self.points.lock().expect("index lock poisoned");
        Ok(stored
            .get(&fingerprint.point_id())
            .filter(|point| point.payload.fingerprint() == Some(*fingerprint))
            .map(|point| point.vector.clone()))
    }

    async fn search(
        &self,
        vector: &[f32],
        params: SearchParams,
    ) -> Result<Vec<ScoredNeighbor>, IndexError> {
        let stored = self.points.lock().expect("index lock poisoned");
        let mut neighbors: Vec<ScoredNeighbor> = stored
            .values()
            .map(|point| ScoredNeighbor {
                fingerprint: point.fingerprint,
                score: cosine_similarity(vector, &point.vector),
            })
            .collect();
        neighbors.sort_by(|a, b| b.score.total_cmp(&a.score));
        neighbors.truncate(params.limit);
        Ok(neighbors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(index: usize) -> Vec<f32> {
        let mut v = vec![0.0; 8];
        v[index] = 1.0;
        v
    }

    fn point(sequence: &str, vector: Vec<f32>) -> IndexPoint {
        IndexPoint::new(Fingerprint::of_sequence(sequence), vector, None, None)
    }

    #[tokio::test]
    async fn test_search_returns_at_most_limit_sorted_descending() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(&[
                point("A", axis(0)),
                point("B", axis(1)),
                point("C", vec![0.9, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            ])
            .await
            .unwrap();

        let params = SearchParams {
            limit: 2,
            ..SearchParams::default()
        };
        let neighbors = index.search(&axis(0), params).await.unwrap();

        assert_eq!(neighbors.len(), 2);
        assert!(neighbors[0].score >= neighbors[1].score);
        assert_eq!(neighbors[0].fingerprint, Fingerprint::of_sequence("A"));
    }

    #[tokio::test]
    async fn test_own_vector_is_the_top_neighbor_with_maximal_score() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(&[point("A", axis(0)), point("B", axis(3))])
            .await
            .unwrap();

        let neighbors = index.search(&axis(0), SearchParams::default()).await.unwrap();
        assert_eq!(neighbors[0].fingerprint, Fingerprint::of_sequence("A"));
        assert!((neighbors[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_fingerprint() {
        let index = MemoryVectorIndex::new();
        index.upsert(&[point("A", axis(0))]).await.unwrap();
        index.upsert(&[point("A", axis(1))]).await.unwrap();

        assert_eq!(index.len(), 1);
        let vector = index
            .retrieve(&Fingerprint::of_sequence("A"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vector, axis(1));
    }

    #[tokio::test]
    async fn test_retrieve_unknown_fingerprint_is_none() {
        let index = MemoryVectorIndex::new();
        assert!(index
            .retrieve(&Fingerprint::of_sequence("A"))
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_cosine_similarity_handles_zero_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }
}
