use crate::material::{Material, Texture, rgb_from_gltf_image};
use crate::mesh::Mesh;
use crate::{Error, F, Result, identity, matmul, tform_point};

use tracing::{debug, info, warn};

/// Write colored parts as a binary GLTF for previewing.
pub mod preview;
pub use preview::save_preview_glb;

/// A GLTF scene flattened into a single mesh, with the materials its faces reference.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TexturedScene {
    pub mesh: Mesh,
    pub materials: Vec<Material>,
}

impl TexturedScene {
    /// `true` if any material carries a base color texture.
    pub fn has_texture(&self) -> bool {
        self.materials.iter().any(|m| m.texture.is_some())
    }

    /// Index of the first material with a texture.
    pub fn first_textured(&self) -> Option<usize> {
        self.materials.iter().position(|m| m.texture.is_some())
    }
}

/// Load a GLTF/GLB file into a TexturedScene.
pub fn load<P>(path: P) -> Result<TexturedScene>
where
    P: AsRef<std::path::Path>,
{
    let (doc, buffers, images) = gltf::import(path)?;
    from_document(&doc, &buffers, &images)
}

/// Load an in-memory GLB (or self-contained GLTF) into a TexturedScene.
pub fn load_slice(bytes: &[u8]) -> Result<TexturedScene> {
    let (doc, buffers, images) = gltf::import_slice(bytes)?;
    from_document(&doc, &buffers, &images)
}

fn load_material(mat: &gltf::Material, images: &[gltf::image::Data]) -> Result<Material> {
    let pbr = mat.pbr_metallic_roughness();
    let tex_info = pbr.base_color_texture().or_else(|| {
        mat.pbr_specular_glossiness()
            .and_then(|sg| sg.diffuse_texture())
    });
    let texture = match tex_info {
        None => None,
        Some(info) => {
            let src = info.texture().source().index();
            let Some(data) = images.get(src) else {
                return Err(Error::InvalidTexture(format!("missing image {src}")));
            };
            Some(Texture {
                image: rgb_from_gltf_image(data)?,
                tex_coord: info.tex_coord(),
            })
        }
    };
    Ok(Material {
        name: mat.name().map(String::from).unwrap_or_default(),
        base_color_factor: pbr.base_color_factor().map(|v| v as F),
        texture,
    })
}

fn from_document(
    doc: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    images: &[gltf::image::Data],
) -> Result<TexturedScene> {
    let mut out = TexturedScene::default();
    for mat in doc.materials() {
        out.materials.push(load_material(&mat, images)?);
    }

    let scenes = match doc.default_scene() {
        Some(s) => vec![s],
        None => doc.scenes().collect::<Vec<_>>(),
    };
    for scene in scenes {
        for root_node in scene.nodes() {
            traverse_node(&root_node, identity::<4>(), buffers, &mut out)?;
        }
    }

    // GLTF has v pointing down the image, flip to match bottom-up texture lookups.
    out.mesh.flip_uv_v();
    out.mesh.validate()?;
    info!(
        vertices = out.mesh.v.len(),
        faces = out.mesh.f.len(),
        materials = out.materials.len(),
        "loaded GLTF scene"
    );
    Ok(out)
}

fn traverse_node(
    node: &gltf::Node,
    parent_tform: [[F; 4]; 4],
    buffers: &[gltf::buffer::Data],
    out: &mut TexturedScene,
) -> Result<()> {
    let local = node.transform().matrix().map(|col| col.map(|v| v as F));
    let tform = matmul(local, parent_tform);

    if let Some(m) = node.mesh() {
        for p in m.primitives() {
            read_primitive(&p, tform, buffers, out)?;
        }
    }
    for child in node.children() {
        traverse_node(&child, tform, buffers, out)?;
    }
    Ok(())
}

fn read_primitive(
    p: &gltf::Primitive,
    tform: [[F; 4]; 4],
    buffers: &[gltf::buffer::Data],
    out: &mut TexturedScene,
) -> Result<()> {
    if p.mode() != gltf::mesh::Mode::Triangles {
        warn!(mode = ?p.mode(), "skipping non-triangle primitive");
        return Ok(());
    }
    let reader = p.reader(|buffer: gltf::Buffer| buffers.get(buffer.index()).map(|data| &data[..]));
    let Some(ps) = reader.read_positions() else {
        warn!("skipping primitive without positions");
        return Ok(());
    };

    let mesh = &mut out.mesh;
    let offset = mesh.v.len();
    mesh.v
        .extend(ps.map(|p| tform_point(tform, p.map(|v| v as F))));
    let nv = mesh.v.len() - offset;

    let mat_idx = p.material().index();
    let uv_set = mat_idx
        .and_then(|mi| out.materials.get(mi))
        .and_then(|m| m.texture.as_ref())
        .map_or(0, |t| t.tex_coord);
    match reader.read_tex_coords(uv_set) {
        Some(uvs) => mesh
            .uv
            .extend(uvs.into_f32().map(|uv| uv.map(|c| c as F))),
        None => warn!(uv_set, "primitive has no UVs, using [0, 0]"),
    }
    // pad (or cut) so that every vertex has exactly one UV
    mesh.uv.resize(mesh.v.len(), [0.; 2]);

    let idxs = match reader.read_indices() {
        Some(idxs) => idxs.into_u32().collect::<Vec<_>>(),
        None => (0..nv as u32).collect(),
    };
    if idxs.len() % 3 != 0 {
        warn!(
            indices = idxs.len(),
            "index count is not a multiple of 3, dropping trailing indices"
        );
    }
    for tri in idxs.chunks_exact(3) {
        let f = [tri[0], tri[1], tri[2]].map(|vi| vi as usize + offset);
        if f.iter().any(|&vi| vi >= mesh.v.len()) {
            return Err(Error::invalid_content(format!(
                "triangle {tri:?} out of bounds for {nv} vertices"
            )));
        }
        mesh.f.push(f);
        mesh.face_mat.push(mat_idx);
    }
    debug!(vertices = nv, material = ?mat_idx, "read primitive");
    Ok(())
}
