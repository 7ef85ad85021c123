use super::{Error, F, Result, Rgb};
use image::{DynamicImage, ImageBuffer, RgbImage};

/// Base color texture of a material, already converted to 8-bit RGB.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub image: RgbImage,
    /// Which UV set of the primitive is used to look up this texture.
    pub tex_coord: u32,
}

impl Texture {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            tex_coord: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Source material from loaded mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// Linear RGBA, multiplied into the texture by renderers (ignored when sampling).
    pub base_color_factor: [F; 4],
    pub texture: Option<Texture>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color_factor: [1.; 4],
            texture: None,
        }
    }
}

impl Material {
    /// Flat color of this material, used for faces whose material has no texture.
    pub fn flat_color(&self) -> Rgb {
        let [r, g, b, _] = self.base_color_factor;
        [r, g, b].map(|c| (c.clamp(0., 1.) * 255.) as u8)
    }
}

/// Convert a decoded GLTF image into an 8-bit RGB image.
/// Alpha channels are dropped, 16-bit and float channels are rescaled.
pub fn rgb_from_gltf_image(data: &gltf::image::Data) -> Result<RgbImage> {
    use gltf::image::Format;
    let gltf::image::Data {
        pixels,
        format,
        width,
        height,
    } = data;
    let (w, h) = (*width, *height);
    let bad = || {
        Error::InvalidTexture(format!(
            "{format:?} image of {w}x{h} has {} bytes",
            pixels.len()
        ))
    };

    fn u16s(b: &[u8]) -> Vec<u16> {
        b.chunks_exact(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]))
            .collect()
    }
    fn f32s(b: &[u8]) -> Vec<f32> {
        b.chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    let px = pixels.clone();
    let img = match format {
        Format::R8 => ImageBuffer::from_raw(w, h, px).map(DynamicImage::ImageLuma8),
        Format::R8G8 => ImageBuffer::from_raw(w, h, px).map(DynamicImage::ImageLumaA8),
        Format::R8G8B8 => ImageBuffer::from_raw(w, h, px).map(DynamicImage::ImageRgb8),
        Format::R8G8B8A8 => ImageBuffer::from_raw(w, h, px).map(DynamicImage::ImageRgba8),
        Format::R16 => ImageBuffer::from_raw(w, h, u16s(pixels)).map(DynamicImage::ImageLuma16),
        Format::R16G16 => {
            ImageBuffer::from_raw(w, h, u16s(pixels)).map(DynamicImage::ImageLumaA16)
        }
        Format::R16G16B16 => {
            ImageBuffer::from_raw(w, h, u16s(pixels)).map(DynamicImage::ImageRgb16)
        }
        Format::R16G16B16A16 => {
            ImageBuffer::from_raw(w, h, u16s(pixels)).map(DynamicImage::ImageRgba16)
        }
        Format::R32G32B32FLOAT => {
            ImageBuffer::from_raw(w, h, f32s(pixels)).map(DynamicImage::ImageRgb32F)
        }
        Format::R32G32B32A32FLOAT => {
            ImageBuffer::from_raw(w, h, f32s(pixels)).map(DynamicImage::ImageRgba32F)
        }
        #[allow(unreachable_patterns)]
        _ => None,
    };
    let img = img.ok_or_else(bad)?;
    if img.width() == 0 || img.height() == 0 {
        return Err(bad());
    }
    Ok(img.to_rgb8())
}

#[test]
fn test_rgba_drops_alpha() {
    let data = gltf::image::Data {
        pixels: vec![255, 0, 0, 10, 0, 255, 0, 255],
        format: gltf::image::Format::R8G8B8A8,
        width: 2,
        height: 1,
    };
    let img = rgb_from_gltf_image(&data).unwrap();
    assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0]);
    assert_eq!(img.get_pixel(1, 0).0, [0, 255, 0]);
}

#[test]
fn test_gray_expands() {
    let data = gltf::image::Data {
        pixels: vec![7],
        format: gltf::image::Format::R8,
        width: 1,
        height: 1,
    };
    let img = rgb_from_gltf_image(&data).unwrap();
    assert_eq!(img.get_pixel(0, 0).0, [7, 7, 7]);
}

#[test]
fn test_short_buffer_is_invalid() {
    let data = gltf::image::Data {
        pixels: vec![0; 5],
        format: gltf::image::Format::R8G8B8,
        width: 2,
        height: 1,
    };
    assert!(matches!(
        rgb_from_gltf_image(&data),
        Err(Error::InvalidTexture(_))
    ));
}

#[test]
fn test_flat_color() {
    let m = Material {
        base_color_factor: [1., 0.5, 0., 1.],
        ..Default::default()
    };
    assert_eq!(m.flat_color(), [255, 127, 0]);
}
