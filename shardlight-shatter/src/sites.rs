//! Random fracture sites in the unit pane.

use crate::FractureParams;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use na::Point2;
use rand::Rng;

/// Gaussian draws landing outside the pane are retried this many times before falling back to a
/// uniform site.
const CLUSTER_RETRIES: usize = 64;

/// Standard normal pair via Box-Muller.
fn gaussian_pair<R: Rng + ?Sized>(rng: &mut R) -> (f64, f64) {
    // (0, 1], ln(0) is not an option.
    let u1 = 1. - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    let r = (-2. * u1.ln()).sqrt();
    let (sin, cos) = (std::f64::consts::TAU * u2).sin_cos();
    (r * cos, r * sin)
}

fn inside_pane(p: &Point2<f64>) -> bool {
    (0. ..=1.).contains(&p.x) && (0. ..=1.).contains(&p.y)
}

fn clustered<R: Rng + ?Sized>(rng: &mut R, sigma: f64) -> Point2<f64> {
    for _ in 0..CLUSTER_RETRIES {
        let (dx, dy) = gaussian_pair(rng);
        let p = Point2::new(0.5 + dx * sigma, 0.5 + dy * sigma);
        if inside_pane(&p) {
            return p;
        }
    }
    trace!("Cluster draw kept missing the pane, using a uniform site.");
    uniform(rng)
}

fn uniform<R: Rng + ?Sized>(rng: &mut R) -> Point2<f64> {
    Point2::new(rng.random::<f64>(), rng.random::<f64>())
}

/// Draws `base_sites + rand(0..extra_sites)` sites, roughly `cluster_fraction` of them clustered
/// around the pane centre.
///
/// The result is sorted by `(x, y)` and free of exact duplicates.
pub fn scatter_sites<R: Rng + ?Sized>(rng: &mut R, params: &FractureParams) -> Vec<Point2<f64>> {
    let extra = if params.extra_sites > 0 {
        rng.random_range(0..params.extra_sites)
    } else {
        0
    };
    let count = params.base_sites + extra;
    let mut sites: Vec<_> = (0..count)
        .map(|_| {
            if rng.random_bool(params.cluster_fraction) {
                clustered(rng, params.cluster_sigma)
            } else {
                uniform(rng)
            }
        })
        .collect();
    sites.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sites.dedup();
    debug!("Scattered {} sites ({} requested).", sites.len(), count);
    sites
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn site_count_is_within_range() {
        let params = FractureParams::default();
        for seed in 0..16 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let sites = scatter_sites(&mut rng, &params);
            assert!(sites.len() >= 1 && sites.len() < 120);
            assert!(sites.iter().all(inside_pane));
        }
    }

    #[test]
    fn sites_are_sorted_and_unique() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let sites = scatter_sites(&mut rng, &FractureParams::default());
        for w in sites.windows(2) {
            assert!((w[0].x, w[0].y) < (w[1].x, w[1].y));
        }
    }

    #[test]
    fn clustering_pulls_towards_the_centre() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let params = FractureParams {
            base_sites: 400,
            extra_sites: 0,
            cluster_fraction: 1.,
            ..FractureParams::default()
        };
        let sites = scatter_sites(&mut rng, &params);
        assert_eq!(sites.len(), 400);
        let near = sites
            .iter()
            .filter(|p| (*p - Point2::new(0.5, 0.5)).norm() < 0.3)
            .count();
        // Well over the ~28% a uniform scatter would put there.
        assert!(near > 300, "only {} of 400 clustered sites near the centre", near);
    }

    #[test]
    fn same_seed_same_sites() {
        let params = FractureParams::default();
        let a = scatter_sites(&mut ChaCha8Rng::seed_from_u64(5), &params);
        let b = scatter_sites(&mut ChaCha8Rng::seed_from_u64(5), &params);
        assert_eq!(a, b);
    }
}
