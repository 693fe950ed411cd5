//! Cosine similarity over stored embeddings.

use ndarray::ArrayView1;

/// Cosine similarity of two vectors. Zero when either is empty, zero-length
/// or the dimensions differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let a = ArrayView1::from(a);
    let b = ArrayView1::from(b);
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a < 1e-9 || norm_b < 1e-9 {
        return 0.0;
    }
    a.dot(&b) / (norm_a * norm_b)
}

/// Serialize an embedding for a TEXT column. Empty vectors are stored as NULL.
pub fn encode_embedding(embedding: Option<&[f32]>) -> Option<String> {
    embedding
        .filter(|e| !e.is_empty())
        .and_then(|e| serde_json::to_string(e).ok())
}

pub fn decode_embedding(raw: Option<String>) -> Option<Vec<f32>> {
    raw.and_then(|s| serde_json::from_str::<Vec<f32>>(&s).ok())
        .filter(|e| !e.is_empty())
}
