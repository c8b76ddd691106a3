//! Gaussian process-noise samples.

use nalgebra::{Cholesky, DMatrix, DVector, SVD};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::{AbstractionError, Result};

/// Square root `L` of a covariance (`L Lᵀ = Σ`).
///
/// Cholesky for positive-definite input, otherwise `U √S` from the SVD so
/// semi-definite covariances (noise-free axes) work too.
pub fn covariance_sqrt(cov: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if !cov.is_square() {
        return Err(AbstractionError::DimensionMismatch {
            what: "noise covariance",
            expected: cov.nrows(),
            got: cov.ncols(),
        });
    }
    if let Some(ch) = Cholesky::new(cov.clone()) {
        return Ok(ch.l());
    }
    let svd = SVD::new(cov.clone(), true, false);
    if svd.singular_values.iter().any(|s| !s.is_finite()) {
        return Err(AbstractionError::invalid("noise covariance is not finite"));
    }
    let u = svd
        .u
        .ok_or_else(|| AbstractionError::invalid("noise covariance decomposition failed"))?;
    let root = &u * DMatrix::from_diagonal(&svd.singular_values.map(f64::sqrt));
    // Indefinite input does not reconstruct.
    if (&root * root.transpose() - cov).amax() > 1e-6 * (1.0 + cov.amax()) {
        return Err(AbstractionError::invalid("noise covariance is not positive semi-definite"));
    }
    Ok(root)
}

/// `count` draws from `N(0, cov)` with a seeded `StdRng`.
pub fn gaussian_samples(cov: &DMatrix<f64>, count: usize, seed: u64) -> Result<Vec<DVector<f64>>> {
    let root = covariance_sqrt(cov)?;
    let n = cov.nrows();
    let mut rng = StdRng::seed_from_u64(seed);
    Ok((0..count)
        .map(|_| {
            let z = DVector::from_fn(n, |_, _| StandardNormal.sample(&mut rng));
            &root * z
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    #[test]
    fn sample_covariance_matches() {
        let cov = dmatrix![1.0, 0.5; 0.5, 2.0];
        let s = gaussian_samples(&cov, 20_000, 42).unwrap();
        let n = s.len() as f64;
        let mut emp = DMatrix::<f64>::zeros(2, 2);
        for x in &s {
            emp += x * x.transpose();
        }
        emp /= n;
        assert!((&emp - &cov).amax() < 0.08, "empirical covariance {emp}");
    }

    #[test]
    fn semidefinite_covariance_keeps_flat_axis() {
        let cov = dmatrix![1.0, 0.0; 0.0, 0.0];
        let s = gaussian_samples(&cov, 100, 1).unwrap();
        assert!(s.iter().all(|x| x[1].abs() < 1e-9));
        assert!(s.iter().any(|x| x[0].abs() > 1e-3));
    }

    #[test]
    fn indefinite_covariance_rejected() {
        assert!(covariance_sqrt(&dmatrix![1.0, 0.0; 0.0, -1.0]).is_err());
    }

    #[test]
    fn same_seed_same_samples() {
        let cov = DMatrix::identity(3, 3);
        assert_eq!(gaussian_samples(&cov, 10, 9).unwrap(), gaussian_samples(&cov, 10, 9).unwrap());
    }
}
