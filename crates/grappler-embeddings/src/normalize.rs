//! Vector math shared by the index and the embedders.

fn norm(v: &[f32]) -> f32 {
    dot_product(v, v).sqrt()
}

/// Scale `vector` to unit length in place. Zero vectors are left as-is.
pub fn normalize_l2(vector: &mut [f32]) {
    let n = norm(vector);
    if n > 0.0 {
        vector.iter_mut().for_each(|v| *v /= n);
    }
}

/// Cosine of the angle between `a` and `b`.
///
/// Mismatched lengths, empty vectors and zero vectors score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        0.0
    } else {
        dot_product(a, b) / denom
    }
}

/// Straight-line distance; infinite for mismatched lengths.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

/// Inner product over the common prefix of `a` and `b`.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
