#[cfg(not(feature = "f64"))]
pub type F = f32;

#[cfg(feature = "f64")]
pub type F = f64;

/// 8-bit RGB color.
pub type Rgb = [u8; 3];
/// 8-bit RGBA color.
pub type Rgba = [u8; 4];

/// Crate wide error type.
pub mod error;
pub use error::{Error, Result};

/// Unified triangle mesh representation.
pub mod mesh;
pub use mesh::Mesh;

/// Source materials and their base color textures.
pub mod material;
pub use material::{Material, Texture};

/// Load GLTF meshes, and write colored previews.
pub mod gltf;
pub use self::gltf::TexturedScene;

/// Per-face texture sampling.
pub mod sample;

/// Mini-batch k-means over face colors.
pub mod cluster;
pub use cluster::ClusterAssignment;

/// Splitting a mesh into one part per color.
pub mod segment;
pub use segment::ColorPart;

/// 3MF reading and writing.
pub mod threemf;

/// Human readable palette legends.
pub mod palette;
pub use palette::{Palette, PaletteEntry};

/// Tunable parameters.
pub mod params;
pub use params::Params;

/// Load -> sample -> cluster -> segment -> export.
pub mod pipeline;
pub use pipeline::{Output, process_file, process_glb};

pub mod util;

/// Re-exported for textures.
pub use image;

pub(crate) fn kmul<const N: usize>(k: F, v: [F; N]) -> [F; N] {
    v.map(|v| v * k)
}

pub(crate) fn add<const N: usize>(a: [F; N], b: [F; N]) -> [F; N] {
    std::array::from_fn(|i| a[i] + b[i])
}

/// Apply a transformation (col major 4x4) to a point
pub fn tform_point(tform: [[F; 4]; 4], p: [F; 3]) -> [F; 3] {
    let out = (0..4)
        .map(|i| {
            if i == 3 {
                tform[i]
            } else {
                kmul(p[i], tform[i])
            }
        })
        .fold([0.; 4], add);
    if out[3] == 0. {
        return [out[0], out[1], out[2]];
    }
    std::array::from_fn(|i| out[i] / out[3])
}

/// Identity Matrix
pub fn identity<const N: usize>() -> [[F; N]; N] {
    let mut out = [[0.; N]; N];
    for i in 0..N {
        out[i][i] = 1.;
    }
    out
}

/// Matrix multiplication.
/// For composing transforms together.
pub fn matmul<const N: usize>(ta: [[F; N]; N], tb: [[F; N]; N]) -> [[F; N]; N] {
    let mut out = [[0.; N]; N];
    for i in 0..N {
        for j in 0..N {
            for k in 0..N {
                out[i][j] += ta[i][k] * tb[k][j];
            }
        }
    }
    out
}

#[test]
fn test_tform_point() {
    let mut t = identity::<4>();
    t[3] = [1., 2., 3., 1.];
    assert_eq!(tform_point(t, [1., 1., 1.]), [2., 3., 4.]);

    let mut s = identity::<4>();
    s[0][0] = 2.;
    // child translation, then parent scale
    let st = matmul(t, s);
    assert_eq!(tform_point(st, [1., 0., 0.]), [4., 2., 3.]);
}
