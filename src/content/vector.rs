use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::ledger::DEFAULT_LIST_LIMIT;
use super::schema::{QueryMatch, VectorRecord};
use crate::error::{ContentError, Result};

/// In-memory vector index ranking documents by cosine similarity.
///
/// Queries are brute force: every stored embedding is scored, O(n·d) per
/// query. That is fine for the small corpora this serves; there is no
/// approximate-nearest-neighbor structure.
///
/// The first insert fixes the embedding dimension for the life of the index.
/// Contents are not persisted.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    inner: Arc<RwLock<IndexState>>,
}

#[derive(Debug, Default)]
struct IndexState {
    records: Vec<VectorRecord>,
    dimension: Option<usize>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Embedding dimension, once the first record has been inserted.
    pub fn dimension(&self) -> Option<usize> {
        self.inner.read().dimension
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    /// Check that `embedding` could be inserted without touching the index.
    pub fn check_embedding(&self, embedding: &[f32]) -> Result<()> {
        check_values(embedding)?;
        check_dimension(self.inner.read().dimension, embedding.len())
    }

    /// Append a record.
    pub fn insert(&self, record: VectorRecord) -> Result<()> {
        check_values(&record.embedding)?;

        let mut state = self.inner.write();
        check_dimension(state.dimension, record.embedding.len())?;
        state.dimension.get_or_insert(record.embedding.len());
        debug!(id = %record.id, total = state.records.len() + 1, "Vector record inserted");
        state.records.push(record);
        Ok(())
    }

    /// Top `k` records by descending cosine similarity to `query`.
    ///
    /// Ties keep insertion order. An empty index or `k == 0` yields an empty
    /// result; a query of the wrong dimension scores 0 against everything.
    pub fn query(&self, query: &[f32], k: usize) -> Vec<QueryMatch> {
        if k == 0 {
            return Vec::new();
        }

        let state = self.inner.read();
        let mut scored: Vec<(f32, &VectorRecord)> = state
            .records
            .iter()
            .map(|record| (cosine_similarity(query, &record.embedding), record))
            .collect();
        // sort_by is stable, equal scores stay in insertion order
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        scored
            .into_iter()
            .take(k)
            .map(|(similarity, record)| QueryMatch {
                id: record.id.clone(),
                document: record.document.clone(),
                metadata: record.metadata.clone(),
                distance: 1.0 - similarity,
            })
            .collect()
    }

    /// The most recently inserted records, newest first, regardless of
    /// similarity. `None` and `Some(0)` fall back to [`DEFAULT_LIST_LIMIT`].
    pub fn get_all(&self, limit: Option<usize>) -> Vec<VectorRecord> {
        let limit = match limit {
            Some(n) if n > 0 => n,
            _ => DEFAULT_LIST_LIMIT,
        };
        self.inner
            .read()
            .records
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().records.iter().any(|record| record.id == id)
    }

    /// Drop the oldest record with `id`. Later records sharing the id stay
    /// searchable, matching the ledger removing only its first match.
    pub fn remove(&self, id: &str) -> bool {
        let mut state = self.inner.write();
        let Some(pos) = state.records.iter().position(|record| record.id == id) else {
            return false;
        };
        state.records.remove(pos);
        debug!(id, remaining = state.records.len(), "Vector record removed");
        true
    }
}

/// Cosine similarity `(a·b) / (|a|·|b|)`, in `[-1, 1]`.
///
/// Mismatched dimensions, empty or zero-magnitude vectors score 0; the result
/// is never NaN or infinite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    if similarity.is_finite() {
        similarity.clamp(-1.0, 1.0) as f32
    } else {
        0.0
    }
}

fn check_values(embedding: &[f32]) -> Result<()> {
    if embedding.is_empty() {
        return Err(ContentError::validation("embedding is empty"));
    }
    if let Some(pos) = embedding.iter().position(|v| !v.is_finite()) {
        return Err(ContentError::validation(format!(
            "embedding component {pos} is not finite"
        )));
    }
    Ok(())
}

fn check_dimension(expected: Option<usize>, actual: usize) -> Result<()> {
    match expected {
        Some(expected) if expected != actual => Err(ContentError::validation(format!(
            "embedding dimension mismatch: index holds {expected}, got {actual}"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::schema::{ContentType, FileRecord};
    use proptest::prelude::*;

    fn record(id: &str, embedding: Vec<f32>) -> VectorRecord {
        let mut file = FileRecord::text(format!("{id}.txt"), id);
        file.id = id.to_string();
        VectorRecord::for_file(&file, embedding, format!("document {id}"))
    }

    #[test]
    fn cosine_of_vector_with_itself_is_one() {
        let v = [0.3, -1.2, 4.0, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_opposite_vectors_is_minus_one() {
        let v = [0.3f32, -1.2, 4.0, 0.5];
        let neg: Vec<f32> = v.iter().map(|x| -x).collect();
        assert!((cosine_similarity(&v, &neg) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_degenerate_inputs_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[f32::NAN, 1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn query_on_empty_index_is_empty() {
        let index = VectorIndex::new();
        assert!(index.query(&[1.0, 0.0], 5).is_empty());
        assert!(index.get_all(None).is_empty());
    }

    #[test]
    fn nearest_of_two_axes() {
        let index = VectorIndex::new();
        index.insert(record("t1", vec![1.0, 0.0])).unwrap();
        index.insert(record("t2", vec![0.0, 1.0])).unwrap();

        let query = [0.9f32, 0.1];
        let hits = index.query(&query, 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "t1");
        assert_eq!(hits[0].document, "document t1");

        let expected = 1.0 - cosine_similarity(&query, &[1.0, 0.0]);
        assert!((hits[0].distance - expected).abs() < 1e-6);
        assert!((hits[0].similarity() - 0.9939).abs() < 1e-3);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let index = VectorIndex::new();
        index.insert(record("first", vec![1.0, 1.0])).unwrap();
        index.insert(record("other", vec![-1.0, 0.0])).unwrap();
        index.insert(record("second", vec![2.0, 2.0])).unwrap();
        index.insert(record("third", vec![0.5, 0.5])).unwrap();

        let ids: Vec<String> = index.query(&[1.0, 1.0], 4).into_iter().map(|m| m.id).collect();
        assert_eq!(ids, ["first", "second", "third", "other"]);
    }

    #[test]
    fn mismatched_query_scores_everything_zero() {
        let index = VectorIndex::new();
        index.insert(record("a", vec![1.0, 0.0])).unwrap();
        index.insert(record("b", vec![0.0, 1.0])).unwrap();

        let hits = index.query(&[1.0, 0.0, 0.0], 5);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|m| m.distance == 1.0));
        assert_eq!(hits[0].id, "a");
    }

    #[test]
    fn k_zero_yields_nothing() {
        let index = VectorIndex::new();
        index.insert(record("a", vec![1.0])).unwrap();
        assert!(index.query(&[1.0], 0).is_empty());
    }

    #[test]
    fn insert_enforces_a_single_dimension() {
        let index = VectorIndex::new();
        index.insert(record("a", vec![1.0, 0.0, 0.0])).unwrap();
        assert_eq!(index.dimension(), Some(3));

        let err = index.insert(record("b", vec![1.0, 0.0])).unwrap_err();
        assert!(matches!(err, ContentError::Validation(_)));
        assert!(index.check_embedding(&[0.0, 1.0]).is_err());
        assert!(index.check_embedding(&[0.0, 1.0, 0.0]).is_ok());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn insert_rejects_empty_and_non_finite_embeddings() {
        let index = VectorIndex::new();
        assert!(index.insert(record("a", vec![])).is_err());
        assert!(index.insert(record("b", vec![1.0, f32::INFINITY])).is_err());
        assert!(index.is_empty());
        assert_eq!(index.dimension(), None);
    }

    #[test]
    fn get_all_lists_newest_first() {
        let index = VectorIndex::new();
        for id in ["a", "b", "c"] {
            index.insert(record(id, vec![1.0, 0.0])).unwrap();
        }
        let ids: Vec<String> = index.get_all(Some(2)).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, ["c", "b"]);
        assert_eq!(index.get_all(Some(0)).len(), 3);
    }

    #[test]
    fn remove_drops_matching_records() {
        let index = VectorIndex::new();
        index.insert(record("a", vec![1.0, 0.0])).unwrap();
        index.insert(record("b", vec![0.0, 1.0])).unwrap();

        assert!(index.remove("a"));
        assert!(!index.remove("a"));
        let hits = index.query(&[1.0, 0.0], 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b");
    }

    #[test]
    fn remove_takes_only_the_oldest_duplicate() {
        let index = VectorIndex::new();
        let mut older = record("dup", vec![1.0, 0.0]);
        older.document = "older".into();
        let mut newer = record("dup", vec![1.0, 0.0]);
        newer.document = "newer".into();
        index.insert(older).unwrap();
        index.insert(newer).unwrap();

        assert!(index.remove("dup"));
        assert!(index.contains("dup"));
        let hits = index.query(&[1.0, 0.0], 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document, "newer");
    }

    #[test]
    fn metadata_is_denormalized_from_the_file() {
        let file = FileRecord::media(ContentType::Image, "cat.png", "images/cat.png");
        let long_doc = "x".repeat(500);
        let rec = VectorRecord::for_file(&file, vec![1.0], long_doc.clone());
        assert_eq!(rec.metadata.kind, ContentType::Image);
        assert_eq!(rec.metadata.filename, "cat.png");
        assert_eq!(rec.metadata.timestamp, file.timestamp);
        assert_eq!(rec.metadata.preview.len(), 200);
        assert_eq!(rec.document, long_doc);
    }

    #[test]
    fn concurrent_inserts_and_queries() {
        let index = VectorIndex::new();
        std::thread::scope(|scope| {
            for t in 0..4 {
                let index = index.clone();
                scope.spawn(move || {
                    for i in 0..50 {
                        index
                            .insert(record(&format!("{t}-{i}"), vec![t as f32 + 1.0, i as f32]))
                            .unwrap();
                        let _ = index.query(&[1.0, 1.0], 3);
                    }
                });
            }
        });
        assert_eq!(index.len(), 200);
    }

    fn embeddings(dim: usize) -> impl Strategy<Value = Vec<Vec<f32>>> {
        proptest::collection::vec(proptest::collection::vec(-1.0f32..1.0, dim), 0..40)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn query_results_are_sorted_and_bounded(
            stored in embeddings(8),
            query in proptest::collection::vec(-1.0f32..1.0, 8),
            k in 0usize..20,
        ) {
            let index = VectorIndex::new();
            for (i, embedding) in stored.iter().enumerate() {
                index.insert(record(&i.to_string(), embedding.clone())).unwrap();
            }

            let hits = index.query(&query, k);
            prop_assert!(hits.len() <= k);
            prop_assert!(hits.len() <= stored.len());
            prop_assert_eq!(hits.len(), k.min(stored.len()));
            for pair in hits.windows(2) {
                prop_assert!(pair[0].distance <= pair[1].distance);
            }
        }

        #[test]
        fn similarity_is_bounded_and_finite(
            a in proptest::collection::vec(-1000.0f32..1000.0, 1..16),
            b in proptest::collection::vec(-1000.0f32..1000.0, 1..16),
        ) {
            let sim = cosine_similarity(&a, &b);
            prop_assert!(sim.is_finite());
            prop_assert!((-1.0..=1.0).contains(&sim));
            if a.len() != b.len() {
                prop_assert_eq!(sim, 0.0);
            }
        }

        #[test]
        fn nonzero_vector_is_its_own_nearest_direction(
            v in proptest::collection::vec(-10.0f32..10.0, 4),
        ) {
            prop_assume!(v.iter().any(|x| x.abs() > 1e-3));
            prop_assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
        }
    }
}
