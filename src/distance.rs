use itertools::Itertools;
use ultraviolet::f32x8;

pub const FEATURE_LANES_SIZE: usize = 8;

/// Feature (embedding) vector representation: lane-blocked SIMD storage.
///
/// A 512-dimensional face embedding occupies 64 blocks; a tail shorter than one block is
/// zero-padded, which leaves dot products and norms unchanged.
///
pub type Feature = Vec<f32x8>;

/// Utility trait to get conversion between feature vector representations
///
pub trait FromVec<V, R> {
    fn from_vec(vec: V) -> R;
}

impl FromVec<&Feature, Vec<f32>> for Vec<f32> {
    fn from_vec(vec: &Feature) -> Vec<f32> {
        vec.iter().flat_map(|block| block.to_array()).collect()
    }
}

/// Feature from &[f32]
///
impl FromVec<&[f32], Feature> for Feature {
    fn from_vec(vec: &[f32]) -> Feature {
        let blocks = vec.iter().copied().chunks(FEATURE_LANES_SIZE);
        (&blocks)
            .into_iter()
            .map(|block| {
                let mut lanes = [0.0_f32; FEATURE_LANES_SIZE];
                for (lane, value) in lanes.iter_mut().zip(block) {
                    *lane = value;
                }
                f32x8::new(lanes)
            })
            .collect()
    }
}

/// Feature from Vec<f32>
///
impl FromVec<Vec<f32>, Feature> for Feature {
    fn from_vec(vec: Vec<f32>) -> Feature {
        Feature::from_vec(vec.as_slice())
    }
}

/// Euclidean norm of a feature vector
///
pub fn norm(f: &Feature) -> f32 {
    f.iter()
        .map(|block| (*block * *block).reduce_add())
        .sum::<f32>()
        .sqrt()
}

/// Cosine of the angle between two vectors
///
/// The three accumulators ride in SIMD registers over a single pass and reduce once at the
/// end. When the feature lengths don't match, the comparison covers the shared prefix.
///
pub fn cosine(f1: &Feature, f2: &Feature) -> f32 {
    let mut dot = f32x8::splat(0.0);
    let mut sq1 = f32x8::splat(0.0);
    let mut sq2 = f32x8::splat(0.0);

    for (a, b) in f1.iter().zip(f2.iter()) {
        dot += *a * *b;
        sq1 += *a * *a;
        sq2 += *b * *b;
    }

    dot.reduce_add() / (sq1.reduce_add() * sq2.reduce_add()).sqrt()
}

/// Cosine similarity mapped to `[0, 1]`: `(cos + 1) / 2`.
///
/// Returns `0.0` when either vector has a zero norm, for which the cosine is undefined.
///
pub fn similarity(f1: &Feature, f2: &Feature) -> f32 {
    if norm(f1) == 0.0 || norm(f2) == 0.0 {
        return 0.0;
    }
    ((cosine(f1, f2) + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Scales the feature to unit norm. A zero vector is returned unchanged.
///
pub fn unit_norm(f: &Feature) -> Feature {
    let n = norm(f);
    if n == 0.0 {
        return f.clone();
    }
    f.iter().map(|block| *block / f32x8::splat(n)).collect()
}

#[cfg(test)]
mod tests {
    use crate::distance::{
        cosine, norm, similarity, unit_norm, Feature, FromVec, FEATURE_LANES_SIZE,
    };
    use crate::testing::random_feature;
    use crate::EPS;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn packs_and_unpacks_embedding_features() {
        let mut rng = StdRng::seed_from_u64(11);
        let feature = random_feature(&mut rng, 512);
        assert_eq!(feature.len(), 512 / FEATURE_LANES_SIZE);

        let raw: Vec<f32> = Vec::from_vec(&feature);
        assert_eq!(raw.len(), 512);
        let repacked: Vec<f32> = Vec::from_vec(&Feature::from_vec(raw.as_slice()));
        assert_eq!(repacked, raw);
    }

    #[test]
    fn short_tail_is_zero_padded() {
        let feature = Feature::from_vec(vec![0.5_f32; 11]);
        assert_eq!(feature.len(), 2);

        let raw: Vec<f32> = Vec::from_vec(&feature);
        assert_eq!(raw.len(), 2 * FEATURE_LANES_SIZE);
        assert!(raw[..11].iter().all(|v| *v == 0.5));
        assert!(raw[11..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn cosine_axes() {
        let v1 = Feature::from_vec(vec![1.0_f32, 0.0, 0.0]);
        let v2 = Feature::from_vec(vec![0.0_f32, 1.0, 0.0]);
        let v3 = Feature::from_vec(vec![-1.0_f32, 0.0, 0.0]);

        assert!((cosine(&v1, &v1) - 1.0).abs() < EPS);
        assert!((cosine(&v1, &v3) + 1.0).abs() < EPS);
        assert!(cosine(&v1, &v2).abs() < EPS);
    }

    #[test]
    fn similarity_bounds() {
        let v1 = Feature::from_vec(vec![1.0_f32, 0.0]);
        let v2 = Feature::from_vec(vec![-1.0_f32, 0.0]);
        assert!((similarity(&v1, &v1) - 1.0).abs() < EPS);
        assert!(similarity(&v1, &v2).abs() < EPS);

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let a = random_feature(&mut rng, 64);
            let b = random_feature(&mut rng, 64);
            let s = similarity(&a, &b);
            assert!((0.0..=1.0).contains(&s));
        }
    }

    #[test]
    fn zero_vector_similarity_is_zero() {
        let z = Feature::from_vec(vec![0.0_f32; 8]);
        let v = Feature::from_vec(vec![1.0_f32, 0.0]);
        assert_eq!(similarity(&z, &v), 0.0);
        assert_eq!(similarity(&v, &z), 0.0);
    }

    #[test]
    fn unit_norm_scales() {
        let mut rng = StdRng::seed_from_u64(19);
        let raw: Vec<f32> = (0..512).map(|_| rng.gen_range(-2.0..2.0)).collect();
        let u = unit_norm(&Feature::from_vec(raw));
        assert!((norm(&u) - 1.0).abs() < 1e-4);
    }
}
