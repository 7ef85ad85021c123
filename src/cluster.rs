//! Online (mini-batch) k-means, used to reduce per-face colors to a small palette.
//!
//! Each run seeds its centers with k-means++ on a random subset of the samples, then repeatedly
//! draws a batch, assigns every sample in it to its nearest center and nudges that center towards
//! it with a per-center learning rate of `1 / count`. Several runs are made and the one with the
//! lowest inertia over all samples is kept.

use super::params::Params;
use super::{Error, Result, Rgb};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

pub type Point = [f32; 3];

/// Label for each sample, and the color each label stands for.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAssignment {
    /// 1-1 with input samples, each in `0..centroids.len()`.
    pub labels: Vec<usize>,
    /// Centroids truncated to integers.
    pub centroids: Vec<Rgb>,
    /// Sum of squared distances from each sample to its (untruncated) centroid.
    pub inertia: f32,
}

impl ClusterAssignment {
    /// Number of clusters requested, including empty ones.
    pub fn k(&self) -> usize {
        self.centroids.len()
    }
    /// Number of samples with each label.
    pub fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.k()];
        for &l in &self.labels {
            counts[l] += 1;
        }
        counts
    }
    /// Number of labels that have at least one sample.
    pub fn num_non_empty(&self) -> usize {
        self.counts().into_iter().filter(|&c| c > 0).count()
    }
    /// Indices of samples with label `l`.
    pub fn members(&self, l: usize) -> impl Iterator<Item = usize> + '_ {
        self.labels
            .iter()
            .enumerate()
            .filter_map(move |(i, &li)| (li == l).then_some(i))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MiniBatchKMeans {
    pub k: usize,
    pub batch_size: usize,
    pub n_init: usize,
    /// Number of passes over the data, in units of `samples / batch_size` steps.
    pub max_iter: usize,
    /// Stop once the smoothed batch inertia hasn't improved for this many steps.
    pub max_no_improvement: usize,
    pub seed: Option<u64>,
}

impl MiniBatchKMeans {
    pub fn new(k: usize) -> Self {
        Self::from_params(&Params::with_colors(k))
    }

    pub fn from_params(p: &Params) -> Self {
        Self {
            k: p.num_colors,
            batch_size: p.batch_size,
            n_init: p.n_init,
            max_iter: p.max_iter,
            max_no_improvement: p.max_no_improvement,
            seed: p.seed,
        }
    }

    pub fn seeded(self, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..self
        }
    }

    /// Cluster colors into `k` groups.
    pub fn fit(&self, colors: &[Rgb]) -> Result<ClusterAssignment> {
        if colors.is_empty() {
            return Err(Error::EmptyMesh);
        }
        if self.k == 0 {
            return Err(Error::InvalidParams {
                name: "k",
                reason: String::from("must be positive"),
            });
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidParams {
                name: "batch_size",
                reason: String::from("must be positive"),
            });
        }
        let samples = colors
            .iter()
            .map(|c| c.map(f32::from))
            .collect::<Vec<Point>>();

        let mut rng = match self.seed {
            Some(s) => SmallRng::seed_from_u64(s),
            None => SmallRng::from_os_rng(),
        };

        let mut centers = self.run_once(&samples, &mut rng);
        let mut best = inertia(&samples, &centers);
        debug!(run = 0, inertia = best, "mini-batch k-means run");
        for run in 1..self.n_init {
            let next = self.run_once(&samples, &mut rng);
            let score = inertia(&samples, &next);
            debug!(run, inertia = score, "mini-batch k-means run");
            if score < best {
                best = score;
                centers = next;
            }
        }

        let labels = samples.iter().map(|p| nearest(&centers, p).0).collect();
        let centroids = centers
            .iter()
            .map(|c| c.map(|v| v.clamp(0., 255.) as u8))
            .collect();
        Ok(ClusterAssignment {
            labels,
            centroids,
            inertia: best,
        })
    }

    fn run_once(&self, samples: &[Point], rng: &mut SmallRng) -> Vec<Point> {
        let n = samples.len();
        let init_size = self.batch_size.saturating_mul(3).clamp(self.k.min(n), n);
        let init_samples = if init_size == n {
            samples.to_vec()
        } else {
            rand::seq::index::sample(rng, n, init_size)
                .into_iter()
                .map(|i| samples[i])
                .collect::<Vec<_>>()
        };
        let mut centers = kmeans_pp(&init_samples, self.k, rng);
        let mut counts = vec![0usize; self.k];

        let batch_size = self.batch_size.min(n);
        let n_steps = (self.max_iter.saturating_mul(n) / batch_size).max(1);
        // weight of the newest batch in the smoothed inertia
        let alpha = (2. * batch_size as f32 / (n as f32 + 1.)).min(1.);

        let mut ewa_inertia: Option<f32> = None;
        let mut best_ewa = f32::INFINITY;
        let mut no_improvement = 0;
        for step in 0..n_steps {
            let mut batch_inertia = 0.;
            for _ in 0..batch_size {
                let p = samples[rng.random_range(0..n)];
                let (ci, d) = nearest(&centers, &p);
                counts[ci] += 1;
                let eta = 1. / counts[ci] as f32;
                let c = &mut centers[ci];
                for i in 0..3 {
                    c[i] += eta * (p[i] - c[i]);
                }
                batch_inertia += d;
            }
            let batch_inertia = batch_inertia / batch_size as f32;

            let ewa = match ewa_inertia {
                None => batch_inertia,
                Some(prev) => prev * (1. - alpha) + batch_inertia * alpha,
            };
            ewa_inertia = Some(ewa);
            if ewa < best_ewa {
                best_ewa = ewa;
                no_improvement = 0;
            } else {
                no_improvement += 1;
                if no_improvement >= self.max_no_improvement {
                    debug!(step, n_steps, "no improvement in smoothed inertia, stopping");
                    break;
                }
            }
        }
        centers
    }
}

#[inline]
fn dist2(a: &Point, b: &Point) -> f32 {
    (0..3).map(|i| (a[i] - b[i]) * (a[i] - b[i])).sum()
}

/// Index of the nearest center and the squared distance to it. Ties go to the lower index.
fn nearest(centers: &[Point], p: &Point) -> (usize, f32) {
    let mut best = (0, f32::INFINITY);
    for (ci, c) in centers.iter().enumerate() {
        let d = dist2(c, p);
        if d < best.1 {
            best = (ci, d);
        }
    }
    best
}

/// Sum of squared distances from each sample to its nearest center.
pub fn inertia(samples: &[Point], centers: &[Point]) -> f32 {
    samples.iter().map(|p| nearest(centers, p).1).sum()
}

/// k-means++ seeding: each new center is drawn with probability proportional to its
/// squared distance from the closest existing center.
fn kmeans_pp(samples: &[Point], k: usize, rng: &mut impl Rng) -> Vec<Point> {
    let n = samples.len();
    let mut centers = Vec::with_capacity(k);
    centers.push(samples[rng.random_range(0..n)]);
    let mut d2 = samples
        .iter()
        .map(|p| dist2(p, &centers[0]))
        .collect::<Vec<_>>();

    while centers.len() < k {
        let total: f32 = d2.iter().sum();
        let next = if total <= 0. {
            // fewer distinct samples than clusters
            rng.random_range(0..n)
        } else {
            let mut r = rng.random::<f32>() * total;
            let mut next = n - 1;
            for (i, &d) in d2.iter().enumerate() {
                if r < d {
                    next = i;
                    break;
                }
                r -= d;
            }
            next
        };
        let c = samples[next];
        centers.push(c);
        for (d, p) in d2.iter_mut().zip(samples) {
            *d = d.min(dist2(p, &c));
        }
    }
    centers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noisy(base: Rgb, n: usize) -> Vec<Rgb> {
        (0..n)
            .map(|i| base.map(|c| c.saturating_add((i % 5) as u8).saturating_sub(2)))
            .collect()
    }

    #[test]
    fn test_two_groups() {
        let mut colors = noisy([250, 10, 10], 50);
        colors.extend(noisy([10, 10, 250], 70));
        let a = MiniBatchKMeans::new(2).seeded(7).fit(&colors).unwrap();

        assert_eq!(a.labels.len(), colors.len());
        let reds = a.labels[0];
        let blues = a.labels[50];
        assert_ne!(reds, blues);
        assert!(a.labels[..50].iter().all(|&l| l == reds));
        assert!(a.labels[50..].iter().all(|&l| l == blues));

        let [r, _, b] = a.centroids[reds];
        assert!(r > 240 && b < 20, "{:?}", a.centroids);
        let [r, _, b] = a.centroids[blues];
        assert!(b > 240 && r < 20, "{:?}", a.centroids);
    }

    #[test]
    fn test_more_clusters_than_colors() {
        let colors = vec![[1, 2, 3], [200, 100, 0], [1, 2, 3], [200, 100, 0]];
        let a = MiniBatchKMeans::new(8).seeded(0).fit(&colors).unwrap();
        assert_eq!(a.k(), 8);
        assert_eq!(a.counts().iter().sum::<usize>(), 4);
        assert_eq!(a.num_non_empty(), 2);
        assert_eq!(a.inertia, 0.);
        assert!(a.labels.iter().all(|&l| l < 8));
    }

    #[test]
    fn test_seed_is_deterministic() {
        let colors = (0..500u32)
            .map(|i| [(i * 7 % 256) as u8, (i * 13 % 256) as u8, (i * 29 % 256) as u8])
            .collect::<Vec<_>>();
        let km = MiniBatchKMeans::new(5).seeded(42);
        assert_eq!(km.fit(&colors).unwrap(), km.fit(&colors).unwrap());
    }

    #[test]
    fn test_single_color() {
        let a = MiniBatchKMeans::new(3)
            .seeded(1)
            .fit(&[[9, 9, 9]; 10])
            .unwrap();
        assert_eq!(a.num_non_empty(), 1);
        assert!(a.centroids.contains(&[9, 9, 9]));
    }

    #[test]
    fn test_huge_batch_size() {
        let km = MiniBatchKMeans {
            batch_size: usize::MAX,
            ..MiniBatchKMeans::new(2).seeded(4)
        };
        let colors = [[0, 0, 0], [0, 0, 0], [255, 255, 255]];
        let a = km.fit(&colors).unwrap();
        assert_eq!(a.num_non_empty(), 2);
        assert_eq!(a.labels[0], a.labels[1]);
        assert_ne!(a.labels[0], a.labels[2]);
    }

    #[test]
    fn test_empty() {
        assert!(matches!(
            MiniBatchKMeans::new(2).fit(&[]),
            Err(Error::EmptyMesh)
        ));
    }

    #[test]
    fn test_members() {
        let a = ClusterAssignment {
            labels: vec![1, 0, 1],
            centroids: vec![[0; 3], [1; 3]],
            inertia: 0.,
        };
        assert_eq!(a.members(1).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(a.counts(), vec![1, 2]);
    }
}
