//! Observation-to-identity matching.

use nalgebra::DMatrix;

/// Match observations to identities by greedy maximum similarity.
///
/// # Arguments
/// * `similarity` - Similarity matrix (n_observations x n_identities)
/// * `identity_ids` - Identity number of each column, used for tie-breaking
/// * `min_similarity` - Matches must score strictly above this floor
///
/// # Returns
/// Tuple of (matched_obs_indices, matched_identity_indices) in acceptance
/// order. Equal similarities go to the lowest identity number, then to the
/// lowest observation index.
pub fn match_greedy(
    similarity: &DMatrix<f64>,
    identity_ids: &[u32],
    min_similarity: f64,
) -> (Vec<usize>, Vec<usize>) {
    let n_observations = similarity.nrows();
    let n_identities = similarity.ncols();
    debug_assert_eq!(identity_ids.len(), n_identities);

    if n_observations == 0 || n_identities == 0 {
        return (Vec::new(), Vec::new());
    }

    // Collect all acceptable (similarity, obs_idx, identity_idx) pairs
    let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
    for i in 0..n_observations {
        for j in 0..n_identities {
            let s = similarity[(i, j)];
            if s.is_finite() && s > min_similarity {
                pairs.push((s, i, j));
            }
        }
    }

    pairs.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| identity_ids[a.2].cmp(&identity_ids[b.2]))
            .then_with(|| a.1.cmp(&b.1))
    });

    let mut used_obs = vec![false; n_observations];
    let mut used_identities = vec![false; n_identities];

    let mut matched_obs = Vec::new();
    let mut matched_identities = Vec::new();

    for (_s, obs_idx, identity_idx) in pairs {
        if used_obs[obs_idx] || used_identities[identity_idx] {
            continue;
        }

        matched_obs.push(obs_idx);
        matched_identities.push(identity_idx);
        used_obs[obs_idx] = true;
        used_identities[identity_idx] = true;
    }

    (matched_obs, matched_identities)
}

/// Per-observation assignment built from a match result.
pub fn assignments(n_observations: usize, matched_obs: &[usize], matched_identities: &[usize]) -> Vec<Option<usize>> {
    let mut result = vec![None; n_observations];
    for (&o, &t) in matched_obs.iter().zip(matched_identities) {
        result[o] = Some(t);
    }
    result
}
