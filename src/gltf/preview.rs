use crate::segment::ColorPart;
use crate::{Error, Result};

use gltf_json::validation::{Checked::Valid, USize64};
use std::borrow::Cow;
use std::io::Write;
use std::mem;

fn to_f32(v: crate::F) -> f32 {
    v as f32
}

/// sRGB encoded channel to linear, as GLTF color factors are linear.
pub fn srgb_to_linear(c: u8) -> f32 {
    let c = c as f32 / 255.;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Save colored parts as a glb file (binary GLTF file).
/// Each part becomes its own node, mesh and flat-colored material.
pub fn save_preview_glb(parts: &[ColorPart], dst: impl Write) -> Result<()> {
    if parts.is_empty() {
        return Err(Error::EmptyMesh);
    }
    let mut root = gltf_json::Root::default();
    let mut bytes: Vec<u8> = vec![];

    let mut v_offsets = vec![];
    for part in parts {
        v_offsets.push(bytes.len());
        for v in &part.mesh.v {
            bytes.extend(v.iter().flat_map(|&c| to_f32(c).to_le_bytes()));
        }
    }
    let f_offset = bytes.len();
    let mut f_offsets = vec![];
    for part in parts {
        f_offsets.push(bytes.len() - f_offset);
        for f in &part.mesh.f {
            bytes.extend(f.iter().flat_map(|&vi| (vi as u32).to_le_bytes()));
        }
    }

    let buf_len = bytes.len();
    let buffer = root.push(gltf_json::Buffer {
        byte_length: USize64::from(buf_len),
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        uri: None,
    });
    let v_buffer_view = root.push(gltf_json::buffer::View {
        buffer,
        byte_length: USize64::from(f_offset),
        byte_offset: None,
        byte_stride: Some(gltf_json::buffer::Stride(3 * mem::size_of::<f32>())),
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        target: Some(Valid(gltf_json::buffer::Target::ArrayBuffer)),
    });
    let idx_buffer_view = root.push(gltf_json::buffer::View {
        buffer,
        byte_length: USize64::from(buf_len - f_offset),
        byte_offset: Some(USize64::from(f_offset)),
        byte_stride: None,
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        target: Some(Valid(gltf_json::buffer::Target::ElementArrayBuffer)),
    });

    let mut nodes = vec![];
    for (pi, part) in parts.iter().enumerate() {
        let [lb, ub] = part.mesh.aabb().unwrap_or_default().map(|p| p.map(to_f32));
        let positions = root.push(gltf_json::Accessor {
            buffer_view: Some(v_buffer_view),
            byte_offset: Some(USize64::from(v_offsets[pi])),
            count: USize64::from(part.mesh.v.len()),
            component_type: Valid(gltf_json::accessor::GenericComponentType(
                gltf_json::accessor::ComponentType::F32,
            )),
            extensions: Default::default(),
            extras: Default::default(),
            type_: Valid(gltf_json::accessor::Type::Vec3),
            min: Some(gltf_json::Value::from(Vec::from(lb))),
            max: Some(gltf_json::Value::from(Vec::from(ub))),
            name: None,
            normalized: false,
            sparse: None,
        });
        let faces = root.push(gltf_json::Accessor {
            buffer_view: Some(idx_buffer_view),
            byte_offset: Some(USize64::from(f_offsets[pi])),
            count: USize64::from(part.mesh.num_tris() * 3),
            component_type: Valid(gltf_json::accessor::GenericComponentType(
                gltf_json::accessor::ComponentType::U32,
            )),
            extensions: Default::default(),
            extras: Default::default(),
            type_: Valid(gltf_json::accessor::Type::Scalar),
            min: None,
            max: None,
            name: None,
            normalized: false,
            sparse: None,
        });

        let [r, g, b, a] = part.color;
        let material = root.push(gltf_json::Material {
            name: Some(part.name.clone()),
            pbr_metallic_roughness: gltf_json::material::PbrMetallicRoughness {
                base_color_factor: gltf_json::material::PbrBaseColorFactor([
                    srgb_to_linear(r),
                    srgb_to_linear(g),
                    srgb_to_linear(b),
                    a as f32 / 255.,
                ]),
                metallic_factor: gltf_json::material::StrengthFactor(0.),
                ..Default::default()
            },
            ..Default::default()
        });

        let primitive = gltf_json::mesh::Primitive {
            attributes: {
                let mut map = std::collections::BTreeMap::new();
                map.insert(Valid(gltf_json::mesh::Semantic::Positions), positions);
                map
            },
            extensions: Default::default(),
            extras: Default::default(),
            indices: Some(faces),
            material: Some(material),
            mode: Valid(gltf_json::mesh::Mode::Triangles),
            targets: None,
        };
        let mesh = root.push(gltf_json::Mesh {
            extensions: Default::default(),
            extras: Default::default(),
            name: Some(part.name.clone()),
            primitives: vec![primitive],
            weights: None,
        });
        nodes.push(root.push(gltf_json::Node {
            mesh: Some(mesh),
            name: Some(part.name.clone()),
            ..Default::default()
        }));
    }

    let scene = root.push(gltf_json::Scene {
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        nodes,
    });
    root.scene = Some(scene);

    let json_string =
        gltf_json::serialize::to_string(&root).map_err(|e| Error::Json(e.to_string()))?;
    let mut json_offset = json_string.len();
    align_to_multiple_of_four(&mut json_offset);
    let glb = gltf::binary::Glb {
        header: gltf::binary::Header {
            magic: *b"glTF",
            version: 2,
            // N.B., the size of binary glTF file is limited to range of `u32`.
            length: (json_offset + buf_len)
                .try_into()
                .map_err(|_| Error::invalid_content("file size exceeds binary glTF limit"))?,
        },
        bin: Some(Cow::Owned(to_padded_byte_vector(bytes))),
        json: Cow::Owned(json_string.into_bytes()),
    };
    glb.to_writer(dst)?;
    Ok(())
}

fn align_to_multiple_of_four(n: &mut usize) {
    *n = (*n + 3) & !3;
}

fn to_padded_byte_vector(mut bytes: Vec<u8>) -> Vec<u8> {
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    bytes
}

#[test]
fn test_srgb_to_linear() {
    assert_eq!(srgb_to_linear(0), 0.);
    assert!((srgb_to_linear(255) - 1.).abs() < 1e-6);
    assert!((srgb_to_linear(128) - 0.2158605).abs() < 1e-4);
}
