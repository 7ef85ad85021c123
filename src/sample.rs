use super::gltf::TexturedScene;
use super::material::Texture;
use super::{Error, F, Result, Rgb};

/// Map a UV coordinate to the nearest pixel `[col, row]` of a `width x height` image.
///
/// The row is flipped, since `v = 0` is the bottom of the image.
/// Coordinates are truncated then clamped, so any UV (even NaN or infinite) lands in bounds.
pub fn uv_to_pixel([u, v]: [F; 2], width: u32, height: u32) -> [u32; 2] {
    let max_col = width.saturating_sub(1);
    let max_row = height.saturating_sub(1);
    let col = (u * max_col as F) as i64;
    let row = ((1. - v) * max_row as F) as i64;
    [
        col.clamp(0, max_col as i64) as u32,
        row.clamp(0, max_row as i64) as u32,
    ]
}

impl Texture {
    /// Nearest neighbor lookup at `uv`.
    pub fn sample(&self, uv: [F; 2]) -> Rgb {
        let [col, row] = uv_to_pixel(uv, self.width(), self.height());
        self.image.get_pixel(col, row).0
    }
}

/// One color per face, sampled from the texture of each face's material at the face's mean UV.
///
/// Faces whose material has no texture take the material's flat color,
/// faces without any material use the first textured material.
/// Fails with `TextureNotFound` if no material has a texture.
pub fn sample_face_colors(scene: &TexturedScene) -> Result<Vec<Rgb>> {
    let Some(fallback) = scene.first_textured() else {
        return Err(Error::TextureNotFound);
    };
    let mesh = &scene.mesh;
    let colors = (0..mesh.f.len())
        .map(|fi| {
            let mi = mesh.face_mat[fi].unwrap_or(fallback);
            let mat = scene.materials.get(mi).ok_or_else(|| {
                Error::invalid_mesh(format!("face {fi} uses missing material {mi}"))
            })?;
            Ok(match &mat.texture {
                Some(tex) => tex.sample(mesh.face_uv(fi)),
                None => mat.flat_color(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(colors)
}
