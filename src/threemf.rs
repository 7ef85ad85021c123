//! 3MF (3D Manufacturing Format) support.
//!
//! 3MF is a ZIP archive of XML files describing geometry for 3D printing:
//! - `3D/3dmodel.model` - the model: resources (materials, objects) and the build plate
//! - `[Content_Types].xml` - MIME type mappings
//! - `_rels/.rels` - relationships, pointing at the model
//!
//! Each colored part is written as its own object, and references one entry of a single
//! `<basematerials>` group whose `displaycolor` is the part's color. Slicers show these as
//! separate, individually colored objects.
//!
//! Reading supports what is written, plus per-triangle material references and
//! `#RRGGBB` colors. Components, textures and the other extensions are ignored.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::mesh::Mesh;
use crate::segment::{ColorPart, part_name};
use crate::{Error, F, Result, Rgba};

/// MIME type of 3MF files.
pub const MIME_TYPE: &str = "model/3mf";

/// 3MF core namespace URI.
const NAMESPACE_3MF: &str = "http://schemas.microsoft.com/3dmanufacturing/core/2015/02";

/// Path of the model inside the archive.
const MODEL_PATH: &str = "3D/3dmodel.model";

/// Content types XML for 3MF.
const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="model" ContentType="application/vnd.ms-package.3dmanufacturing-3dmodel+xml"/>
</Types>"#;

/// Relationships XML for 3MF.
const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Target="/3D/3dmodel.model" Id="rel0" Type="http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel"/>
</Relationships>"#;

/// Id of the single basematerials group, objects are numbered after it.
const MATERIALS_ID: usize = 1;

/// `#RRGGBBAA`
pub fn display_color([r, g, b, a]: Rgba) -> String {
    format!("#{r:02X}{g:02X}{b:02X}{a:02X}")
}

/// Parse `#RRGGBB` or `#RRGGBBAA`, alpha defaults to opaque.
pub fn parse_display_color(s: &str) -> Result<Rgba> {
    let bad = || Error::invalid_content(format!("invalid color {s:?}"));
    let hex = s.trim().strip_prefix('#').ok_or_else(bad)?;
    if !matches!(hex.len(), 6 | 8) || !hex.is_ascii() {
        return Err(bad());
    }
    let channel = |i: usize| u8::from_str_radix(&hex[2 * i..2 * i + 2], 16).map_err(|_| bad());
    let a = if hex.len() == 8 { channel(3)? } else { 255 };
    Ok([channel(0)?, channel(1)?, channel(2)?, a])
}

/// Write colored parts as a 3MF archive into `dst`.
pub fn write<W: Write + Seek>(parts: &[ColorPart], dst: W) -> Result<W> {
    let mut zip = ZipWriter::new(dst);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(CONTENT_TYPES_XML.as_bytes())?;

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(RELS_XML.as_bytes())?;

    let model_xml = model_xml(parts)?;
    zip.start_file(MODEL_PATH, options)?;
    zip.write_all(&model_xml)?;

    Ok(zip.finish()?)
}

/// Write colored parts as an in-memory 3MF archive.
pub fn to_bytes(parts: &[ColorPart]) -> Result<Vec<u8>> {
    Ok(write(parts, Cursor::new(vec![]))?.into_inner())
}

/// Save colored parts to a 3MF file at `path`.
pub fn save(parts: &[ColorPart], path: impl AsRef<Path>) -> Result<()> {
    let f = File::create(path.as_ref())?;
    let mut out = write(parts, BufWriter::new(f))?;
    out.flush()?;
    info!(parts = parts.len(), path = %path.as_ref().display(), "saved 3MF");
    Ok(())
}

fn start<W: Write>(w: &mut Writer<W>, e: BytesStart<'_>) -> Result<()> {
    w.write_event(Event::Start(e))?;
    Ok(())
}
fn end<W: Write>(w: &mut Writer<W>, name: &str) -> Result<()> {
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
fn empty<W: Write>(w: &mut Writer<W>, e: BytesStart<'_>) -> Result<()> {
    w.write_event(Event::Empty(e))?;
    Ok(())
}

/// Generate `3D/3dmodel.model`.
pub fn model_xml(parts: &[ColorPart]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut w = Writer::new_with_indent(Cursor::new(&mut buffer), b' ', 2);

    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut model = BytesStart::new("model");
    model.push_attribute(("unit", "millimeter"));
    model.push_attribute(("xml:lang", "en-US"));
    model.push_attribute(("xmlns", NAMESPACE_3MF));
    start(&mut w, model)?;

    let mut meta = BytesStart::new("metadata");
    meta.push_attribute(("name", "Application"));
    start(&mut w, meta)?;
    w.write_event(Event::Text(BytesText::new(env!("CARGO_PKG_NAME"))))?;
    end(&mut w, "metadata")?;

    start(&mut w, BytesStart::new("resources"))?;

    let mut mats = BytesStart::new("basematerials");
    mats.push_attribute(("id", MATERIALS_ID.to_string().as_str()));
    start(&mut w, mats)?;
    for part in parts {
        let mut base = BytesStart::new("base");
        base.push_attribute(("name", part.name.as_str()));
        base.push_attribute(("displaycolor", display_color(part.color).as_str()));
        empty(&mut w, base)?;
    }
    end(&mut w, "basematerials")?;

    for (pi, part) in parts.iter().enumerate() {
        let mut object = BytesStart::new("object");
        object.push_attribute(("id", (MATERIALS_ID + 1 + pi).to_string().as_str()));
        object.push_attribute(("type", "model"));
        object.push_attribute(("name", part.name.as_str()));
        object.push_attribute(("pid", MATERIALS_ID.to_string().as_str()));
        object.push_attribute(("pindex", pi.to_string().as_str()));
        start(&mut w, object)?;
        start(&mut w, BytesStart::new("mesh"))?;

        start(&mut w, BytesStart::new("vertices"))?;
        for [x, y, z] in &part.mesh.v {
            let mut vertex = BytesStart::new("vertex");
            vertex.push_attribute(("x", x.to_string().as_str()));
            vertex.push_attribute(("y", y.to_string().as_str()));
            vertex.push_attribute(("z", z.to_string().as_str()));
            empty(&mut w, vertex)?;
        }
        end(&mut w, "vertices")?;

        start(&mut w, BytesStart::new("triangles"))?;
        for [v1, v2, v3] in &part.mesh.f {
            let mut tri = BytesStart::new("triangle");
            tri.push_attribute(("v1", v1.to_string().as_str()));
            tri.push_attribute(("v2", v2.to_string().as_str()));
            tri.push_attribute(("v3", v3.to_string().as_str()));
            empty(&mut w, tri)?;
        }
        end(&mut w, "triangles")?;

        end(&mut w, "mesh")?;
        end(&mut w, "object")?;
    }
    end(&mut w, "resources")?;

    start(&mut w, BytesStart::new("build"))?;
    for pi in 0..parts.len() {
        let mut item = BytesStart::new("item");
        item.push_attribute(("objectid", (MATERIALS_ID + 1 + pi).to_string().as_str()));
        empty(&mut w, item)?;
    }
    end(&mut w, "build")?;

    end(&mut w, "model")?;
    Ok(buffer)
}

/// Read colored parts back from a 3MF archive.
pub fn read<R: Read + Seek>(src: R) -> Result<Vec<ColorPart>> {
    let mut archive = ZipArchive::new(src)?;
    let content = read_model_file(&mut archive)?;
    parse_model(&content)
}

/// Read colored parts from an in-memory 3MF archive.
pub fn read_bytes(bytes: &[u8]) -> Result<Vec<ColorPart>> {
    read(Cursor::new(bytes))
}

/// Load colored parts from a 3MF file at `path`.
pub fn load(path: impl AsRef<Path>) -> Result<Vec<ColorPart>> {
    let f = File::open(path)?;
    read(BufReader::new(f))
}

/// Read the 3D model file from the archive.
fn read_model_file<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let model_paths = [MODEL_PATH, "3d/3dmodel.model", "3D/3DModel.model"];
    for model_path in model_paths {
        if let Ok(mut file) = archive.by_name(model_path) {
            let mut content = String::new();
            file.read_to_string(&mut content)?;
            return Ok(content);
        }
    }

    // Otherwise the first .model file
    let name = archive
        .file_names()
        .find(|n| {
            Path::new(n)
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("model"))
        })
        .map(String::from);
    let Some(name) = name else {
        return Err(Error::invalid_content(
            "3MF archive does not contain a model file",
        ));
    };
    let mut file = archive.by_name(&name)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

/// Object being parsed.
#[derive(Default)]
struct RawObject {
    id: usize,
    name: Option<String>,
    prop: Option<(usize, usize)>,
    first_tri_prop: Option<(usize, usize)>,
    mesh: Mesh,
}

/// Attributes of an element by local name, unescaped.
fn attrs(e: &BytesStart<'_>) -> Result<HashMap<String, String>> {
    let mut out = HashMap::new();
    for a in e.attributes() {
        let a = a.map_err(|err| Error::invalid_content(format!("malformed attribute: {err}")))?;
        let key = String::from_utf8_lossy(a.key.local_name().as_ref()).into_owned();
        let raw = std::str::from_utf8(&a.value)
            .map_err(|e| Error::invalid_content(format!("invalid UTF-8 in attribute: {e}")))?;
        let value = quick_xml::escape::unescape(raw)
            .map_err(|e| Error::invalid_content(format!("invalid attribute {key}: {e}")))?;
        out.insert(key, value.into_owned());
    }
    Ok(out)
}

fn parse_attr<T: std::str::FromStr>(
    attrs: &HashMap<String, String>,
    key: &str,
    elem: &str,
) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    let Some(v) = attrs.get(key) else {
        return Ok(None);
    };
    v.trim()
        .parse()
        .map(Some)
        .map_err(|e| Error::invalid_content(format!("invalid {elem} {key} = {v:?}: {e}")))
}

fn required<T>(v: Option<T>, key: &str, elem: &str) -> Result<T> {
    v.ok_or_else(|| Error::invalid_content(format!("{elem} is missing {key}")))
}

/// Parse the model XML into parts, in build order.
pub fn parse_model(content: &str) -> Result<Vec<ColorPart>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    // basematerials id -> colors
    let mut materials: HashMap<usize, Vec<Rgba>> = HashMap::new();
    let mut curr_group: Option<(usize, Vec<Rgba>)> = None;
    let mut objects: Vec<RawObject> = vec![];
    let mut curr_obj: Option<RawObject> = None;
    let mut build: Vec<usize> = vec![];

    let mut buf = Vec::new();
    loop {
        buf.clear();
        let (e, is_empty) = match reader.read_event_into(&mut buf)? {
            Event::Start(e) => (e, false),
            Event::Empty(e) => (e, true),
            Event::End(e) => {
                match e.local_name().as_ref() {
                    b"basematerials" => {
                        if let Some((id, colors)) = curr_group.take() {
                            materials.insert(id, colors);
                        }
                    }
                    b"object" => objects.extend(curr_obj.take()),
                    _ => {}
                }
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };
        let a = attrs(&e)?;
        match e.local_name().as_ref() {
            b"basematerials" => {
                let id = required(parse_attr(&a, "id", "basematerials")?, "id", "basematerials")?;
                if is_empty {
                    materials.insert(id, vec![]);
                } else {
                    curr_group = Some((id, vec![]));
                }
            }
            b"base" => {
                if let Some((_, colors)) = curr_group.as_mut() {
                    let color = match a.get("displaycolor") {
                        Some(c) => parse_display_color(c)?,
                        None => [255; 4],
                    };
                    colors.push(color);
                }
            }
            b"object" if !is_empty => {
                let pid = parse_attr(&a, "pid", "object")?;
                let pindex = parse_attr(&a, "pindex", "object")?;
                curr_obj = Some(RawObject {
                    id: required(parse_attr(&a, "id", "object")?, "id", "object")?,
                    name: a.get("name").cloned(),
                    prop: pid.map(|pid| (pid, pindex.unwrap_or(0))),
                    ..Default::default()
                });
            }
            b"vertex" => {
                if let Some(obj) = curr_obj.as_mut() {
                    let coord = |k: &str| -> Result<F> {
                        required(parse_attr(&a, k, "vertex")?, k, "vertex")
                    };
                    obj.mesh.v.push([coord("x")?, coord("y")?, coord("z")?]);
                    obj.mesh.uv.push([0.; 2]);
                }
            }
            b"triangle" => {
                if let Some(obj) = curr_obj.as_mut() {
                    let idx = |k: &str| -> Result<usize> {
                        required(parse_attr(&a, k, "triangle")?, k, "triangle")
                    };
                    obj.mesh.f.push([idx("v1")?, idx("v2")?, idx("v3")?]);
                    obj.mesh.face_mat.push(None);
                    if obj.first_tri_prop.is_none()
                        && let Some(pid) = parse_attr(&a, "pid", "triangle")?
                    {
                        let p1 = parse_attr(&a, "p1", "triangle")?.unwrap_or(0);
                        obj.first_tri_prop = Some((pid, p1));
                    }
                }
            }
            b"item" => {
                build.push(required(parse_attr(&a, "objectid", "item")?, "objectid", "item")?);
            }
            _ => {}
        }
    }

    let by_id = objects
        .iter()
        .enumerate()
        .map(|(i, o)| (o.id, i))
        .collect::<HashMap<_, _>>();
    let order = if build.is_empty() {
        (0..objects.len()).collect::<Vec<_>>()
    } else {
        build
            .iter()
            .map(|id| {
                by_id.get(id).copied().ok_or_else(|| {
                    Error::invalid_content(format!("build item references unknown object {id}"))
                })
            })
            .collect::<Result<Vec<_>>>()?
    };

    let mut parts = vec![];
    for (n, oi) in order.into_iter().enumerate() {
        let obj = &objects[oi];
        obj.mesh.validate()?;
        let color = obj
            .prop
            .or(obj.first_tri_prop)
            .and_then(|(pid, pindex)| materials.get(&pid)?.get(pindex).copied())
            .unwrap_or([255; 4]);
        parts.push(ColorPart {
            name: obj.name.clone().unwrap_or_else(|| part_name(n + 1)),
            color,
            mesh: obj.mesh.clone(),
            source_faces: vec![],
        });
    }
    debug!(parts = parts.len(), "parsed 3MF model");
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri_part(name: &str, color: Rgba, offset: F) -> ColorPart {
        ColorPart {
            name: String::from(name),
            color,
            mesh: Mesh::new_geometry(
                vec![[offset, 0., 0.], [offset + 1., 0., 0.], [offset, 1., 0.5]],
                vec![[0, 1, 2]],
            ),
            source_faces: vec![0],
        }
    }

    #[test]
    fn test_display_color() {
        assert_eq!(display_color([255, 0, 16, 255]), "#FF0010FF");
        assert_eq!(parse_display_color("#FF0010FF").unwrap(), [255, 0, 16, 255]);
        assert_eq!(parse_display_color("#ff0010").unwrap(), [255, 0, 16, 255]);
        assert_eq!(parse_display_color("#00000080").unwrap(), [0, 0, 0, 128]);
        assert!(parse_display_color("FF0010").is_err());
        assert!(parse_display_color("#FF00").is_err());
        assert!(parse_display_color("#GG0000").is_err());
    }

    #[test]
    fn test_model_xml_contents() {
        let parts = [
            tri_part("Color_1", [255, 0, 0, 255], 0.),
            tri_part("Color_2", [0, 0, 255, 255], 2.),
        ];
        let xml = String::from_utf8(model_xml(&parts).unwrap()).unwrap();
        assert!(xml.contains("<basematerials id=\"1\">"));
        assert!(xml.contains("displaycolor=\"#FF0000FF\""));
        assert!(xml.contains("name=\"Color_2\""));
        assert!(xml.contains("pindex=\"1\""));
        assert!(xml.contains("<item objectid=\"3\"/>"));
        assert_eq!(xml.matches("<object ").count(), 2);
        assert_eq!(xml.matches("<triangle ").count(), 2);
    }

    #[test]
    fn test_roundtrip() {
        let parts = vec![
            tri_part("Color_1", [255, 0, 0, 255], 0.),
            tri_part("Color_2", [0, 0, 255, 255], 2.25),
        ];
        let bytes = to_bytes(&parts).unwrap();
        let read = read_bytes(&bytes).unwrap();
        assert_eq!(read.len(), 2);
        for (a, b) in parts.iter().zip(&read) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.color, b.color);
            assert_eq!(a.mesh.v, b.mesh.v);
            assert_eq!(a.mesh.f, b.mesh.f);
        }
    }

    #[test]
    fn test_parse_triangle_colors() {
        let xml = r##"<?xml version="1.0" encoding="UTF-8"?>
<model unit="millimeter" xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02">
  <resources>
    <basematerials id="5">
      <base name="a" displaycolor="#112233"/>
      <base name="b" displaycolor="#445566FF"/>
    </basematerials>
    <object id="9" type="model">
      <mesh>
        <vertices>
          <vertex x="0" y="0" z="0"/>
          <vertex x="1" y="0" z="0"/>
          <vertex x="0" y="1" z="0"/>
        </vertices>
        <triangles>
          <triangle v1="0" v2="1" v3="2" pid="5" p1="1"/>
        </triangles>
      </mesh>
    </object>
  </resources>
  <build>
    <item objectid="9"/>
  </build>
</model>"##;
        let parts = parse_model(xml).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].color, [0x44, 0x55, 0x66, 0xFF]);
        assert_eq!(parts[0].name, "Color_1");
        assert_eq!(parts[0].num_faces(), 1);
    }

    #[test]
    fn test_bad_index() {
        let xml = r#"<model><resources><object id="1"><mesh>
            <vertices><vertex x="0" y="0" z="0"/></vertices>
            <triangles><triangle v1="0" v2="1" v3="2"/></triangles>
        </mesh></object></resources></model>"#;
        assert!(parse_model(xml).is_err());
    }

    #[test]
    fn test_malformed_attribute() {
        let xml = r#"<model><resources><object id="1"><mesh>
            <vertices><vertex x="0" x="1" y="0" z="0"/></vertices>
        </mesh></object></resources></model>"#;
        let Err(Error::InvalidContent(msg)) = parse_model(xml) else {
            panic!("duplicated attribute was accepted");
        };
        assert!(msg.contains("malformed attribute"), "{msg}");
    }

    #[test]
    fn test_unknown_build_item() {
        let xml = r#"<model><resources/><build><item objectid="4"/></build></model>"#;
        assert!(matches!(parse_model(xml), Err(Error::InvalidContent(_))));
    }

    #[test]
    fn test_missing_model_file() {
        let mut zip = ZipWriter::new(Cursor::new(vec![]));
        zip.start_file("readme.txt", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"hi").unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        assert!(matches!(read_bytes(&bytes), Err(Error::InvalidContent(_))));
    }
}
