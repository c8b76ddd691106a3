//! Greedy sample clustering.

use nalgebra::DVector;

use crate::error::{AbstractionError, Result};

/// Group of samples summarized by its count and bounding box.
#[derive(Clone, Debug, PartialEq)]
pub struct Cluster {
    pub value: usize,
    pub lb: DVector<f64>,
    pub ub: DVector<f64>,
}

impl Cluster {
    pub fn singleton(x: &DVector<f64>) -> Self {
        Self {
            value: 1,
            lb: x.clone(),
            ub: x.clone(),
        }
    }

    /// Same cluster translated by `t`.
    pub fn shifted(&self, t: &DVector<f64>) -> Cluster {
        Cluster {
            value: self.value,
            lb: &self.lb + t,
            ub: &self.ub + t,
        }
    }
}

/// One cluster per sample.
pub fn singletons(samples: &[DVector<f64>]) -> Vec<Cluster> {
    samples.iter().map(Cluster::singleton).collect()
}

/// Greedy clustering: take the first remaining sample, move every remaining
/// sample strictly closer than `radius` (Euclidean) into its cluster, repeat.
pub fn cluster_samples(samples: &[DVector<f64>], radius: f64) -> Result<Vec<Cluster>> {
    if !(radius.is_finite() && radius > 0.0) {
        return Err(AbstractionError::invalid(format!(
            "clustering radius must be positive, got {radius}"
        )));
    }
    let mut remaining: Vec<&DVector<f64>> = samples.iter().collect();
    let mut clusters = Vec::new();
    while let Some(&seed) = remaining.first() {
        let (inside, rest): (Vec<&DVector<f64>>, Vec<&DVector<f64>>) =
            remaining.into_iter().partition(|x| (*x - seed).norm() < radius);
        let mut lb = seed.clone();
        let mut ub = seed.clone();
        for x in &inside {
            lb = lb.inf(x);
            ub = ub.sup(x);
        }
        clusters.push(Cluster {
            value: inside.len(),
            lb,
            ub,
        });
        remaining = rest;
    }
    let clustered: usize = clusters.iter().map(|c| c.value).sum();
    if clustered != samples.len() {
        return Err(AbstractionError::ClusterMismatch {
            clustered,
            samples: samples.len(),
        });
    }
    tracing::info!(samples = samples.len(), clusters = clusters.len(), "samples clustered");
    Ok(clusters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;
    use proptest::prelude::*;

    #[test]
    fn nearby_samples_share_a_cluster() {
        let s = vec![
            dvector![0.0, 0.0],
            dvector![5.0, 5.0],
            dvector![0.1, -0.1],
            dvector![5.05, 4.9],
            dvector![0.5, 0.0],
        ];
        let c = cluster_samples(&s, 0.2).unwrap();
        assert_eq!(c.len(), 3);
        assert_eq!(c[0].value, 2);
        assert_eq!(c[0].lb, dvector![0.0, -0.1]);
        assert_eq!(c[0].ub, dvector![0.1, 0.0]);
        assert_eq!(c[1].value, 2);
        assert_eq!(c[2].value, 1);
    }

    #[test]
    fn shifted_moves_both_corners() {
        let c = Cluster {
            value: 3,
            lb: dvector![0.0, -1.0],
            ub: dvector![1.0, 0.0],
        };
        let s = c.shifted(&dvector![2.0, 0.5]);
        assert_eq!(s.value, 3);
        assert_eq!(s.lb, dvector![2.0, -0.5]);
        assert_eq!(s.ub, dvector![3.0, 0.5]);
    }

    #[test]
    fn radius_is_strict() {
        let s = vec![dvector![0.0], dvector![1.0]];
        assert_eq!(cluster_samples(&s, 1.0).unwrap().len(), 2);
        assert!(cluster_samples(&s, 0.0).is_err());
    }

    proptest! {
        #[test]
        fn cluster_sizes_sum_to_sample_count(
            pts in proptest::collection::vec((-3.0f64..3.0, -3.0f64..3.0), 0..200),
            radius in 0.05f64..2.0,
        ) {
            let s: Vec<DVector<f64>> = pts.iter().map(|&(x, y)| dvector![x, y]).collect();
            let c = cluster_samples(&s, radius).unwrap();
            prop_assert_eq!(c.iter().map(|c| c.value).sum::<usize>(), s.len());
            for cl in &c {
                prop_assert!(cl.lb.iter().zip(cl.ub.iter()).all(|(l, u)| l <= u));
            }
        }
    }
}
