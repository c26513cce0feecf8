//! Linear projection of embedding vectors onto a few principal components.
//!
//! Components are found by power iteration on the implicit covariance
//! `XᵀX` of the mean-centered data, with deflation against previously found
//! components. Only matrix-vector products are needed, so the cost is
//! `O(n·d)` per iteration regardless of embedding width.

/// Projection errors.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("Vector {index} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },
    #[error("Vector {0} contains a non-finite value")]
    NonFinite(usize),
    #[error("Cannot project zero-dimensional vectors")]
    EmptyVectors,
}

/// Dimensionality reduction applied before density grouping.
pub trait Projection: Send + Sync {
    /// Project `vectors` to `dimensions` coordinates each.
    ///
    /// Must be deterministic for identical input.
    fn project(
        &self,
        vectors: &[Vec<f32>],
        dimensions: usize,
    ) -> Result<Vec<Vec<f64>>, ProjectionError>;
}

/// Principal component analysis without scaling.
#[derive(Debug, Clone)]
pub struct PcaProjection {
    /// Maximum power iterations per component.
    pub max_iterations: usize,
    /// Convergence threshold on the change of a component between iterations.
    pub tolerance: f64,
}

impl PcaProjection {
    /// Create with an iteration budget.
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            tolerance: 1e-10,
        }
    }

    /// Principal components of centered data, strongest first.
    ///
    /// Fewer than `count` components are returned when the data has lower rank.
    pub fn components(&self, centered: &[Vec<f64>], count: usize) -> Vec<Vec<f64>> {
        let width = centered.first().map_or(0, Vec::len);
        let mut components: Vec<Vec<f64>> = Vec::with_capacity(count);

        for k in 0..count.min(width) {
            let mut v = initial_vector(width, k);
            orthogonalize(&mut v, &components);
            if normalize(&mut v) == 0.0 {
                break;
            }

            let mut converged = false;
            for _ in 0..self.max_iterations {
                let mut next = covariance_apply(centered, &v);
                orthogonalize(&mut next, &components);
                if normalize(&mut next) < 1e-12 {
                    // No variance left outside the found components
                    return components;
                }
                let delta: f64 = next
                    .iter()
                    .zip(&v)
                    .map(|(a, b)| (a - b).abs())
                    .fold(0.0, f64::max);
                v = next;
                if delta < self.tolerance {
                    converged = true;
                    break;
                }
            }
            if !converged {
                log::debug!("Principal component {} stopped before converging", k);
            }

            canonical_sign(&mut v);
            components.push(v);
        }

        components
    }
}

impl Default for PcaProjection {
    fn default() -> Self {
        Self::new(200)
    }
}

impl Projection for PcaProjection {
    fn project(
        &self,
        vectors: &[Vec<f32>],
        dimensions: usize,
    ) -> Result<Vec<Vec<f64>>, ProjectionError> {
        let Some(first) = vectors.first() else {
            return Ok(Vec::new());
        };
        let width = first.len();
        if width == 0 {
            return Err(ProjectionError::EmptyVectors);
        }

        for (index, vector) in vectors.iter().enumerate() {
            if vector.len() != width {
                return Err(ProjectionError::DimensionMismatch {
                    index,
                    expected: width,
                    found: vector.len(),
                });
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(ProjectionError::NonFinite(index));
            }
        }

        let n = vectors.len() as f64;
        let mut mean = vec![0.0f64; width];
        for vector in vectors {
            for (m, &x) in mean.iter_mut().zip(vector) {
                *m += x as f64;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let centered: Vec<Vec<f64>> = vectors
            .iter()
            .map(|vector| {
                vector
                    .iter()
                    .zip(&mean)
                    .map(|(&x, m)| x as f64 - m)
                    .collect()
            })
            .collect();

        let components = self.components(&centered, dimensions);

        // Missing components (rank-deficient data) project to zero
        Ok(centered
            .iter()
            .map(|row| {
                (0..dimensions)
                    .map(|k| components.get(k).map_or(0.0, |c| dot(row, c)))
                    .collect()
            })
            .collect())
    }
}

/// Deterministic, non-degenerate start vector for component `k`.
fn initial_vector(width: usize, k: usize) -> Vec<f64> {
    (0..width)
        .map(|j| 1.0 + ((j * 7 + k * 13) % 11) as f64 * 0.1)
        .collect()
}

/// `Xᵀ(Xv)` without materializing the covariance matrix.
fn covariance_apply(rows: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; v.len()];
    for row in rows {
        let s = dot(row, v);
        for (o, x) in out.iter_mut().zip(row) {
            *o += s * x;
        }
    }
    out
}

fn orthogonalize(v: &mut [f64], basis: &[Vec<f64>]) {
    for b in basis {
        let p = dot(v, b);
        for (x, y) in v.iter_mut().zip(b) {
            *x -= p * y;
        }
    }
}

/// Normalize in place, returning the original norm.
fn normalize(v: &mut [f64]) -> f64 {
    let norm = dot(v, v).sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    norm
}

/// Flip so the largest-magnitude entry is positive.
fn canonical_sign(v: &mut [f64]) {
    let pivot = v
        .iter()
        .copied()
        .fold(0.0f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
    if pivot < 0.0 {
        for x in v.iter_mut() {
            *x = -*x;
        }
    }
}

#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
