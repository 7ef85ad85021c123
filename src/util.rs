use std::path::Path;

/// File formats supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    // Inputs
    /// GLTF Binary Format (.glb)
    GLB,
    /// GLTF JSON Format (.gltf), buffers and images may be in sidecar files
    GLTF,

    // Outputs
    /// 3D Manufacturing Format (.3mf)
    ThreeMF,
    /// PNG image (.png), for palette swatches
    PNG,
    /// JSON (.json), for palette legends
    JSON,
    /// Plain text (.txt), for palette legends
    TXT,

    /// Other unsupported file formats
    Unknown,
}

impl FileFormat {
    /// Can be loaded as a textured mesh.
    pub fn is_mesh_input(self) -> bool {
        matches!(self, FileFormat::GLB | FileFormat::GLTF)
    }
}

/// Given something that looks like a path parse it into a FileFormat.
pub fn extension_to_format(s: impl AsRef<Path>) -> FileFormat {
    let s = s.as_ref();
    let Some(e) = s.extension() else {
        return FileFormat::Unknown;
    };
    let Some(e) = e.to_str() else {
        return FileFormat::Unknown;
    };

    let matches = [
        ("glb", FileFormat::GLB),
        ("gltf", FileFormat::GLTF),
        ("3mf", FileFormat::ThreeMF),
        ("png", FileFormat::PNG),
        ("json", FileFormat::JSON),
        ("txt", FileFormat::TXT),
    ];
    for (ext, fmt) in matches {
        if ext.eq_ignore_ascii_case(e) {
            return fmt;
        }
    }
    FileFormat::Unknown
}

#[test]
fn test_extension_to_format() {
    assert_eq!(extension_to_format("a/b/model.GLB"), FileFormat::GLB);
    assert_eq!(extension_to_format("x.3mf"), FileFormat::ThreeMF);
    assert_eq!(extension_to_format("legend.json"), FileFormat::JSON);
    assert_eq!(extension_to_format("noext"), FileFormat::Unknown);
    assert_eq!(extension_to_format("x.fbx"), FileFormat::Unknown);
    assert!(FileFormat::GLTF.is_mesh_input());
    assert!(!FileFormat::ThreeMF.is_mesh_input());
}

/// Quote and escape `s` as a JSON string.
pub fn json_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Append a key value pair to a given JSON object.
pub fn append_json(s: &mut String, indent: usize, k: &str, v: &str) {
    let mut saw_bracket = false;
    let mut is_start = false;
    while let Some(l) = s.pop() {
        if l == '}' {
            saw_bracket = true;
            continue;
        }

        if !l.is_whitespace() && saw_bracket {
            is_start = l == '{';
            s.push(l);
            break;
        }
    }
    if !is_start {
        s.push(',');
    }
    s.push('\n');
    for _ in 0..indent {
        s.push(' ');
    }
    s.push_str(&json_string(k));
    s.push_str(": ");
    s.push_str(&json_string(v));
    s.push('\n');
    for _ in 0..indent.saturating_sub(2) {
        s.push(' ');
    }
    s.push('}');
}

#[test]
fn test_append_json() {
    let mut v = String::from("{}");
    append_json(&mut v, 2, "test", "2");
    assert_eq!(v, "{\n  \"test\": \"2\"\n}");
    append_json(&mut v, 2, "other", "de\"rp");
    assert_eq!(v, "{\n  \"test\": \"2\",\n  \"other\": \"de\\\"rp\"\n}");
}

#[test]
fn test_append_json_nested_indent() {
    let mut v = String::from("{}");
    append_json(&mut v, 4, "a", "b");
    assert_eq!(v, "{\n    \"a\": \"b\"\n  }");
}

#[test]
fn test_json_string_escapes() {
    assert_eq!(json_string("plain"), "\"plain\"");
    assert_eq!(json_string("a\\b\nc\t"), "\"a\\\\b\\nc\\u0009\"");
}
