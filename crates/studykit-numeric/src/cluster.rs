use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use studykit_core::{FeatureVector, MlError, MlResult};

use crate::distance::euclidean_distance;

/// Output of a k-means run.
#[derive(Debug, Clone)]
pub struct KMeansResult {
    pub centroids: Vec<FeatureVector>,
    pub labels: Vec<usize>,
    /// Sum of squared distances to assigned centroids.
    pub inertia: f64,
    pub iterations: usize,
}

/// Lloyd's algorithm with seeded random-point initialization.
///
/// Stops early once labels are stable. A fixed seed makes the run
/// deterministic; `None` draws a fresh entropy seed.
pub fn k_means(
    data: &[FeatureVector],
    k: usize,
    max_iterations: usize,
    seed: Option<u64>,
) -> MlResult<KMeansResult> {
    if data.is_empty() {
        return Err(MlError::EmptyInput);
    }
    if k == 0 {
        return Err(MlError::InvalidOperation("k must be positive".into()));
    }
    if k > data.len() {
        return Err(MlError::InsufficientData { required: k, got: data.len() });
    }
    let dim = data[0].len();
    for row in data {
        if row.len() != dim {
            return Err(MlError::DimensionMismatch { expected: dim, got: row.len() });
        }
    }

    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    // Initial centroids: k distinct points.
    let mut indices: Vec<usize> = (0..data.len()).collect();
    indices.shuffle(&mut rng);
    let mut centroids: Vec<FeatureVector> =
        indices[..k].iter().map(|&i| data[i].clone()).collect();

    let mut labels = vec![0usize; data.len()];
    let mut iterations = 0;

    for iter in 0..max_iterations {
        iterations = iter + 1;

        // Assignment step.
        let mut changed = false;
        for (i, point) in data.iter().enumerate() {
            let mut best = 0;
            let mut best_dist = f64::INFINITY;
            for (c, centroid) in centroids.iter().enumerate() {
                let d = euclidean_distance(point, centroid);
                if d < best_dist {
                    best_dist = d;
                    best = c;
                }
            }
            if labels[i] != best {
                labels[i] = best;
                changed = true;
            }
        }
        if !changed && iter > 0 {
            break;
        }

        // Update step. Empty clusters keep their previous centroid.
        let mut sums = vec![vec![0.0; dim]; k];
        let mut counts = vec![0usize; k];
        for (i, point) in data.iter().enumerate() {
            counts[labels[i]] += 1;
            for (j, &v) in point.iter().enumerate() {
                sums[labels[i]][j] += v;
            }
        }
        for c in 0..k {
            if counts[c] > 0 {
                for j in 0..dim {
                    centroids[c][j] = sums[c][j] / counts[c] as f64;
                }
            }
        }
    }

    let inertia = data
        .iter()
        .zip(labels.iter())
        .map(|(p, &l)| {
            let d = euclidean_distance(p, &centroids[l]);
            d * d
        })
        .sum();

    Ok(KMeansResult { centroids, labels, inertia, iterations })
}
