#![allow(dead_code)]

use colorsplit::image::{ImageFormat, Rgb, RgbImage};
use std::borrow::Cow;
use std::io::Cursor;

pub const RED: [u8; 3] = [220, 20, 30];
pub const BLUE: [u8; 3] = [20, 40, 210];

/// Number of faces in the cube fixtures.
pub const CUBE_TRIS: usize = 12;

/// Top row on the image is `y = 0`.
pub const TOP: [u8; 3] = [250, 200, 0];
pub const BOTTOM: [u8; 3] = [0, 120, 90];

fn encode_png(img: &RgbImage) -> Vec<u8> {
    let mut out = Cursor::new(vec![]);
    img.write_to(&mut out, ImageFormat::Png)
        .expect("Failed to encode PNG");
    out.into_inner()
}

/// Left half red, right half blue.
fn two_tone_png() -> Vec<u8> {
    encode_png(&RgbImage::from_fn(4, 4, |x, _| {
        if x < 2 { Rgb(RED) } else { Rgb(BLUE) }
    }))
}

/// Top half `TOP`, bottom half `BOTTOM`.
fn top_bottom_png() -> Vec<u8> {
    encode_png(&RgbImage::from_fn(4, 4, |_, y| {
        if y < 2 { Rgb(TOP) } else { Rgb(BOTTOM) }
    }))
}

/// Unit cube with 4 vertices per side. The first three sides map to the red half of the
/// texture, the last three to the blue half.
fn cube() -> (Vec<[f32; 3]>, Vec<[f32; 2]>, Vec<u32>) {
    let sides: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        // (normal, tangent, bitangent)
        ([1., 0., 0.], [0., 1., 0.], [0., 0., 1.]),
        ([0., 1., 0.], [0., 0., 1.], [1., 0., 0.]),
        ([0., 0., 1.], [1., 0., 0.], [0., 1., 0.]),
        ([-1., 0., 0.], [0., 0., 1.], [0., 1., 0.]),
        ([0., -1., 0.], [1., 0., 0.], [0., 0., 1.]),
        ([0., 0., -1.], [0., 1., 0.], [1., 0., 0.]),
    ];
    let mut v = vec![];
    let mut uv = vec![];
    let mut idx = vec![];
    for (si, (n, t, b)) in sides.into_iter().enumerate() {
        let base = v.len() as u32;
        for [s, r] in [[-1., -1.], [1., -1.], [1., 1.], [-1., 1.]] {
            v.push(std::array::from_fn(|i| n[i] + s * t[i] + r * b[i]));
            uv.push(if si < 3 { [0.1, 0.5] } else { [0.9, 0.5] });
        }
        idx.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (v, uv, idx)
}

fn pad4(bytes: &mut Vec<u8>) {
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
}

fn glb(json: String, mut bin: Vec<u8>) -> Vec<u8> {
    pad4(&mut bin);
    let glb = gltf::binary::Glb {
        header: gltf::binary::Header {
            magic: *b"glTF",
            version: 2,
            length: 0,
        },
        json: Cow::Owned(json.into_bytes()),
        bin: Some(Cow::Owned(bin)),
    };
    glb.to_vec().expect("Failed to write GLB")
}

const CUBE_NODES: &str = r#"[{ "mesh": 0, "name": "cube" }]"#;

/// GLB holding a cube textured in two colors, `RED` on 6 faces and `BLUE` on the other 6.
pub fn two_tone_cube_glb() -> Vec<u8> {
    let (v, uv, idx) = cube();
    build_glb(&v, &uv, &idx, Some(two_tone_png()), CUBE_NODES)
}

/// GLB holding a cube with UVs but no material or texture.
pub fn untextured_cube_glb() -> Vec<u8> {
    let (v, uv, idx) = cube();
    build_glb(&v, &uv, &idx, None, CUBE_NODES)
}

/// Two disjoint triangles under a translated parent and scaled child node.
/// The first triangle has glTF UVs at `v = 0.1` (near the top of the image), the second at
/// `v = 0.9`. The texture is `TOP` over `BOTTOM`.
pub fn nested_top_bottom_glb() -> Vec<u8> {
    let v = [
        [0., 0., 0.],
        [1., 0., 0.],
        [0., 1., 0.],
        [0., 0., 1.],
        [1., 0., 1.],
        [0., 1., 1.],
    ];
    let uv = [[0.5, 0.1], [0.5, 0.1], [0.5, 0.1], [0.5, 0.9], [0.5, 0.9], [0.5, 0.9]];
    let idx = [0, 1, 2, 3, 4, 5];
    let nodes = r#"[
    { "name": "parent", "translation": [10.0, 0.0, 0.0], "children": [1] },
    { "name": "child", "scale": [2.0, 2.0, 2.0], "mesh": 0 }
  ]"#;
    build_glb(&v, &uv, &idx, Some(top_bottom_png()), nodes)
}

/// Single-primitive GLB. Scene 0 has node 0 as its only root.
fn build_glb(
    v: &[[f32; 3]],
    uv: &[[f32; 2]],
    idx: &[u32],
    png: Option<Vec<u8>>,
    nodes: &str,
) -> Vec<u8> {
    let mut bin: Vec<u8> = vec![];
    bin.extend(v.iter().flatten().flat_map(|c| c.to_le_bytes()));
    let uv_offset = bin.len();
    bin.extend(uv.iter().flatten().flat_map(|c| c.to_le_bytes()));
    let idx_offset = bin.len();
    bin.extend(idx.iter().flat_map(|i| i.to_le_bytes()));
    let png_offset = bin.len();

    let mut lb = [f32::INFINITY; 3];
    let mut ub = [f32::NEG_INFINITY; 3];
    for p in v {
        for i in 0..3 {
            lb[i] = lb[i].min(p[i]);
            ub[i] = ub[i].max(p[i]);
        }
    }
    let [lb, ub] = [lb, ub].map(|b| format!("[{:.1}, {:.1}, {:.1}]", b[0], b[1], b[2]));

    let (material, png_view, images) = match png {
        Some(png) => {
            let png_len = png.len();
            bin.extend(png);
            let png_view = format!(
                r#",
    {{ "buffer": 0, "byteOffset": {png_offset}, "byteLength": {png_len} }}"#
            );
            let images = String::from(
                r#",
  "materials": [{ "name": "painted", "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } } }],
  "textures": [{ "source": 0 }],
  "images": [{ "bufferView": 3, "mimeType": "image/png" }]"#,
            );
            (r#", "material": 0"#, png_view, images)
        }
        None => ("", String::new(), String::new()),
    };
    let mut padded = bin.len();
    while padded % 4 != 0 {
        padded += 1;
    }

    let json = format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": {nodes},
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0, "TEXCOORD_0": 1 }}, "indices": 2{material} }}] }}],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": {nv}, "type": "VEC3", "min": {lb}, "max": {ub} }},
    {{ "bufferView": 1, "componentType": 5126, "count": {nv}, "type": "VEC2" }},
    {{ "bufferView": 2, "componentType": 5125, "count": {ni}, "type": "SCALAR" }}
  ],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": {uv_offset} }},
    {{ "buffer": 0, "byteOffset": {uv_offset}, "byteLength": {uv_len} }},
    {{ "buffer": 0, "byteOffset": {idx_offset}, "byteLength": {idx_len} }}{png_view}
  ],
  "buffers": [{{ "byteLength": {padded} }}]{images}
}}"#,
        nv = v.len(),
        ni = idx.len(),
        uv_len = idx_offset - uv_offset,
        idx_len = png_offset - idx_offset,
    );
    glb(json, bin)
}
