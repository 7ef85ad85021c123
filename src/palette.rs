use super::segment::ColorPart;
use super::util::{FileFormat, append_json, extension_to_format};
use super::{Result, Rgb};

use image::RgbImage;
use std::path::Path;

/// Side length of each swatch square when saving a palette as an image.
pub const SWATCH_CELL: u32 = 32;

/// One line of the legend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteEntry {
    pub name: String,
    pub color: Rgb,
    /// `"R, G, B"`
    pub rgb: String,
    /// `"#RRGGBB"`
    pub hex: String,
}

impl PaletteEntry {
    pub fn new(name: impl Into<String>, color: Rgb) -> Self {
        let [r, g, b] = color;
        Self {
            name: name.into(),
            color,
            rgb: format!("{r}, {g}, {b}"),
            hex: format!("#{r:02X}{g:02X}{b:02X}"),
        }
    }
}

/// Colors of each part, so filaments can be matched up by hand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Palette {
    pub entries: Vec<PaletteEntry>,
}

impl Palette {
    pub fn from_parts(parts: &[ColorPart]) -> Self {
        let entries = parts
            .iter()
            .map(|p| PaletteEntry::new(p.name.clone(), p.rgb()))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One `name\tRGB(r, g, b)\t#RRGGBB` line per entry.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for e in &self.entries {
            out.push_str(&format!("{}\tRGB({})\t{}\n", e.name, e.rgb, e.hex));
        }
        out
    }

    /// JSON array of `{ "name", "rgb", "hex" }` objects.
    pub fn to_json(&self) -> String {
        if self.entries.is_empty() {
            return String::from("[]");
        }
        let mut out = String::from("[\n");
        for (i, e) in self.entries.iter().enumerate() {
            let mut obj = String::from("{}");
            append_json(&mut obj, 4, "name", e.name.as_str());
            append_json(&mut obj, 4, "rgb", e.rgb.as_str());
            append_json(&mut obj, 4, "hex", e.hex.as_str());
            out.push_str("  ");
            out.push_str(&obj);
            if i + 1 != self.entries.len() {
                out.push(',');
            }
            out.push('\n');
        }
        out.push(']');
        out
    }

    /// A horizontal strip of `cell x cell` squares, one per entry.
    pub fn swatch(&self, cell: u32) -> RgbImage {
        let cell = cell.max(1);
        let w = cell * self.entries.len() as u32;
        RgbImage::from_fn(w, cell, |x, _| {
            image::Rgb(self.entries[(x / cell) as usize].color)
        })
    }

    /// Write the legend, as JSON, a PNG swatch or plain text depending on the extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        match extension_to_format(path) {
            FileFormat::JSON => std::fs::write(path, self.to_json())?,
            FileFormat::PNG => self.swatch(SWATCH_CELL).save(path)?,
            _ => std::fs::write(path, self.to_text())?,
        }
        Ok(())
    }
}
