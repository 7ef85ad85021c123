//! Parameters for color reduction.

use super::{Error, Result};

/// Fewest colors a model can be split into.
pub const MIN_COLORS: usize = 2;
/// Most colors a model can be split into.
pub const MAX_COLORS: usize = 16;

/// Parameters for color reduction and export.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    /// Number of palette colors (and at most the number of parts). Default: 8
    pub num_colors: usize,

    /// Samples drawn per mini-batch step. Default: 4096
    pub batch_size: usize,

    /// Number of independent k-means runs, the best is kept. Default: 3
    pub n_init: usize,

    /// Passes over the data per run. Default: 100
    pub max_iter: usize,

    /// Early stopping patience, in batches. Default: 10
    pub max_no_improvement: usize,

    /// Seed for clustering, if None seeded from the OS.
    pub seed: Option<u64>,

    /// Also produce a GLB preview of the colored parts. Default: false
    pub preview: bool,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            num_colors: 8,
            batch_size: 4096,
            n_init: 3,
            max_iter: 100,
            max_no_improvement: 10,
            seed: None,
            preview: false,
        }
    }
}

impl Params {
    #[must_use]
    pub fn with_colors(num_colors: usize) -> Self {
        Self {
            num_colors,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn seeded(self, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..self
        }
    }

    #[must_use]
    pub fn with_preview(self, preview: bool) -> Self {
        Self { preview, ..self }
    }

    /// Check that every parameter is usable.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_COLORS..=MAX_COLORS).contains(&self.num_colors) {
            return Err(Error::ClusterCount {
                got: self.num_colors,
                min: MIN_COLORS,
                max: MAX_COLORS,
            });
        }
        let positive = [
            ("batch_size", self.batch_size),
            ("n_init", self.n_init),
            ("max_iter", self.max_iter),
        ];
        for (name, v) in positive {
            if v == 0 {
                return Err(Error::InvalidParams {
                    name,
                    reason: String::from("must be positive"),
                });
            }
        }
        Ok(())
    }
}

#[test]
fn test_color_bounds() {
    for k in MIN_COLORS..=MAX_COLORS {
        Params::with_colors(k).validate().unwrap();
    }
    for k in [0, 1, 17, 100] {
        assert!(matches!(
            Params::with_colors(k).validate(),
            Err(Error::ClusterCount { got, .. }) if got == k
        ));
    }
}

#[test]
fn test_zero_batch() {
    let p = Params {
        batch_size: 0,
        ..Default::default()
    };
    assert!(matches!(
        p.validate(),
        Err(Error::InvalidParams {
            name: "batch_size",
            ..
        })
    ));
}
