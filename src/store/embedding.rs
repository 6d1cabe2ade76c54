//! Hashed bag-of-words embeddings.
//!
//! Each lowercase alphanumeric token is FNV-1a hashed into one of `dims`
//! buckets; the resulting count vector is L2-normalized so that a dot product
//! is the cosine similarity.

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|tok| !tok.is_empty())
        .map(str::to_lowercase)
}

fn bucket(token: &str, dims: usize) -> usize {
    let mut h = FNV_OFFSET;
    for b in token.as_bytes() {
        h ^= u64::from(*b);
        h = h.wrapping_mul(FNV_PRIME);
    }
    (h % dims as u64) as usize
}

pub fn embed(text: &str, dims: usize) -> Vec<f32> {
    let mut v = vec![0.0_f32; dims.max(1)];
    let len = v.len();
    for tok in tokens(text) {
        v[bucket(&tok, len)] += 1.0;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// `1 - cos(a, b)` for normalized vectors; 1.0 when either is all zeros.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    (1.0 - dot).clamp(0.0, 2.0)
}
