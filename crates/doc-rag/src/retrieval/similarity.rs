//! Vector similarity and diversity-aware selection

/// Euclidean norm
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity using precomputed norms
///
/// Zero vectors have similarity 0 with everything.
pub fn cosine_with_norms(a: &[f32], b: &[f32], norm_a: f32, norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (norm_a * norm_b)
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    cosine_with_norms(a, b, magnitude(a), magnitude(b))
}

/// Candidate for MMR selection
#[derive(Debug, Clone, Copy)]
pub struct MmrCandidate<'a> {
    /// Similarity to the query
    pub score: f32,
    pub vector: &'a [f32],
    pub norm: f32,
}

/// Maximal Marginal Relevance
///
/// Greedily picks up to `k` candidates maximizing
/// `lambda * relevance - (1 - lambda) * max_similarity_to_selected`.
/// Returns positions into `candidates` in selection order. Ties keep the
/// earlier candidate, so input order decides between equal scores.
pub fn mmr_select(candidates: &[MmrCandidate<'_>], k: usize, lambda: f32) -> Vec<usize> {
    let k = k.min(candidates.len());
    let mut selected: Vec<usize> = Vec::with_capacity(k);
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    while selected.len() < k {
        let mut best_pos = 0;
        let mut best_mmr = f32::NEG_INFINITY;

        for (pos, &idx) in remaining.iter().enumerate() {
            let candidate = &candidates[idx];
            let redundancy = selected
                .iter()
                .map(|&s| {
                    let other = &candidates[s];
                    cosine_with_norms(candidate.vector, other.vector, candidate.norm, other.norm)
                })
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if selected.is_empty() { 0.0 } else { redundancy };

            let mmr = lambda * candidate.score - (1.0 - lambda) * redundancy;
            if mmr > best_mmr {
                best_mmr = mmr;
                best_pos = pos;
            }
        }

        selected.push(remaining.remove(best_pos));
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        // Magnitude does not matter
        assert!((cosine_similarity(&[3.0, 4.0], &[0.6, 0.8]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_mmr_prefers_diverse_results() {
        let near_dup_a = [1.0, 0.0, 0.0];
        let near_dup_b = [0.99, 0.01, 0.0];
        let different = [0.7, 0.7, 0.0];
        let candidates = [
            MmrCandidate { score: 0.95, vector: &near_dup_a, norm: magnitude(&near_dup_a) },
            MmrCandidate { score: 0.94, vector: &near_dup_b, norm: magnitude(&near_dup_b) },
            MmrCandidate { score: 0.80, vector: &different, norm: magnitude(&different) },
        ];

        assert_eq!(mmr_select(&candidates, 2, 0.5), vec![0, 2]);
        // Pure relevance keeps similarity order
        assert_eq!(mmr_select(&candidates, 2, 1.0), vec![0, 1]);
    }

    #[test]
    fn test_mmr_handles_small_pools() {
        let v = [1.0, 0.0];
        let candidates = [MmrCandidate { score: 0.5, vector: &v, norm: 1.0 }];
        assert_eq!(mmr_select(&candidates, 4, 0.5), vec![0]);
        assert!(mmr_select(&[], 4, 0.5).is_empty());
    }
}
