use super::cluster::{ClusterAssignment, MiniBatchKMeans};
use super::gltf::{self as gltf_io, TexturedScene};
use super::palette::Palette;
use super::params::Params;
use super::sample::sample_face_colors;
use super::segment::{ColorPart, segment};
use super::threemf;
use super::util::extension_to_format;
use super::{Error, Result};

use std::path::Path;
use tracing::{info, warn};

/// Everything produced from one input model.
#[derive(Debug, Clone)]
pub struct Output {
    pub parts: Vec<ColorPart>,
    pub palette: Palette,
    pub assignment: ClusterAssignment,
    /// Serialized 3MF package.
    pub model_3mf: Vec<u8>,
    /// Binary GLTF of the colored parts, if requested.
    pub preview_glb: Option<Vec<u8>>,
}

impl Output {
    /// Suggested MIME type for `model_3mf`.
    pub fn mime_type(&self) -> &'static str {
        threemf::MIME_TYPE
    }

    pub fn write_3mf(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.model_3mf)?;
        Ok(())
    }

    /// Write the preview, rendering it now if it was not requested up front.
    pub fn write_preview(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = match &self.preview_glb {
            Some(b) => b.clone(),
            None => preview_bytes(&self.parts)?,
        };
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn write_palette(&self, path: impl AsRef<Path>) -> Result<()> {
        self.palette.save(path)
    }

    /// Write the 3MF and any requested preview or palette.
    /// If any write fails, files already written by this call are removed.
    pub fn write_all(
        &self,
        model: &Path,
        preview: Option<&Path>,
        palette: Option<&Path>,
    ) -> Result<()> {
        let mut written = vec![];
        let res = self.write_each(model, preview, palette, &mut written);
        if res.is_err() {
            for p in written {
                if let Err(e) = std::fs::remove_file(p) {
                    warn!(path = %p.display(), "failed to remove partial output: {e}");
                }
            }
        }
        res
    }

    fn write_each<'a>(
        &self,
        model: &'a Path,
        preview: Option<&'a Path>,
        palette: Option<&'a Path>,
        written: &mut Vec<&'a Path>,
    ) -> Result<()> {
        if let Some(p) = preview {
            self.write_preview(p)?;
            written.push(p);
        }
        if let Some(p) = palette {
            self.write_palette(p)?;
            written.push(p);
        }
        // model last
        self.write_3mf(model)?;
        written.push(model);
        info!(path = %model.display(), parts = self.parts.len(), "saved 3MF");
        Ok(())
    }
}

fn preview_bytes(parts: &[ColorPart]) -> Result<Vec<u8>> {
    let mut out = vec![];
    gltf_io::save_preview_glb(parts, &mut out)?;
    Ok(out)
}

/// Reduce an already loaded scene to colored parts.
pub fn process(scene: &TexturedScene, params: &Params) -> Result<Output> {
    params.validate()?;
    if scene.mesh.f.is_empty() {
        return Err(Error::EmptyMesh);
    }
    if !scene.has_texture() {
        return Err(Error::TextureNotFound);
    }

    let colors = sample_face_colors(scene)?;
    info!(faces = colors.len(), k = params.num_colors, "clustering face colors");
    let assignment = MiniBatchKMeans::from_params(params).fit(&colors)?;

    let parts = segment(&scene.mesh, &assignment)?;
    info!(
        parts = parts.len(),
        k = params.num_colors,
        "split mesh by color"
    );
    let palette = Palette::from_parts(&parts);
    let model_3mf = threemf::to_bytes(&parts)?;
    info!(bytes = model_3mf.len(), "wrote 3MF");

    let preview_glb = if params.preview {
        Some(preview_bytes(&parts)?)
    } else {
        None
    };

    Ok(Output {
        parts,
        palette,
        assignment,
        model_3mf,
        preview_glb,
    })
}

/// Run the whole conversion on the bytes of a GLB file.
pub fn process_glb(bytes: &[u8], params: &Params) -> Result<Output> {
    params.validate()?;
    let scene = gltf_io::load_slice(bytes)?;
    process(&scene, params)
}

/// Run the whole conversion on a `.glb` or `.gltf` file.
pub fn process_file(path: impl AsRef<Path>, params: &Params) -> Result<Output> {
    let path = path.as_ref();
    if !extension_to_format(path).is_mesh_input() {
        return Err(Error::UnsupportedFormat(path.to_path_buf()));
    }
    params.validate()?;
    let scene = gltf_io::load(path)?;
    process(&scene, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{Material, Texture};
    use crate::mesh::Mesh;
    use image::RgbImage;

    fn quad_scene() -> TexturedScene {
        let mut mesh = Mesh::new_geometry(
            vec![
                [0., 0., 0.],
                [1., 0., 0.],
                [1., 1., 0.],
                [0., 0., 0.],
                [1., 1., 0.],
                [0., 1., 0.],
            ],
            vec![[0, 1, 2], [3, 4, 5]],
        );
        // first face samples the left half, second the right half
        mesh.uv = vec![[0.1, 0.5]; 3];
        mesh.uv.extend([[0.9, 0.5]; 3]);
        mesh.face_mat = vec![Some(0); 2];
        let image = RgbImage::from_fn(4, 4, |x, _| {
            if x < 2 {
                image::Rgb([200, 0, 0])
            } else {
                image::Rgb([0, 0, 200])
            }
        });
        TexturedScene {
            mesh,
            materials: vec![Material {
                texture: Some(Texture::new(image)),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_process_scene() {
        let out = process(&quad_scene(), &Params::with_colors(2).seeded(3)).unwrap();
        assert_eq!(out.parts.len(), 2);
        assert_eq!(out.parts.iter().map(ColorPart::num_faces).sum::<usize>(), 2);
        assert_eq!(out.palette.len(), out.parts.len());
        assert!(out.preview_glb.is_none());
        assert_eq!(out.mime_type(), "model/3mf");
        assert_eq!(threemf::read_bytes(&out.model_3mf).unwrap().len(), out.parts.len());
    }

    #[test]
    fn test_rejects_bad_params() {
        assert!(matches!(
            process(&quad_scene(), &Params::with_colors(1)),
            Err(Error::ClusterCount { .. })
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            process_file("model.obj", &Params::default()),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_no_texture() {
        let mut scene = quad_scene();
        scene.materials[0].texture = None;
        assert!(matches!(
            process(&scene, &Params::default()),
            Err(Error::TextureNotFound)
        ));
    }
}
