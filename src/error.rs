use std::path::PathBuf;
use thiserror::Error;

/// Result type for every fallible operation in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while converting a textured mesh into colored parts.
#[derive(Debug, Error)]
pub enum Error {
    /// No material in the input carries a usable base color texture.
    #[error("no texture found, the file may not have any color")]
    TextureNotFound,

    /// A texture was present but could not be turned into an RGB image.
    #[error("invalid texture: {0}")]
    InvalidTexture(String),

    /// Requested number of colors is outside the supported range.
    #[error("number of colors must be in [{min}, {max}], got {got}")]
    ClusterCount { got: usize, min: usize, max: usize },

    /// Some other parameter is unusable.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParams { name: &'static str, reason: String },

    /// Mesh has no faces to color.
    #[error("mesh has no faces")]
    EmptyMesh,

    /// Mesh attributes are inconsistent.
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    /// Input file is malformed.
    #[error("invalid file content: {0}")]
    InvalidContent(String),

    /// File extension is not one that can be read or written.
    #[error("unsupported file format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GLTF error: {0}")]
    Gltf(#[from] gltf::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON serialization error: {0}")]
    Json(String),
}

impl Error {
    pub fn invalid_content(msg: impl Into<String>) -> Self {
        Self::InvalidContent(msg.into())
    }
    pub fn invalid_mesh(msg: impl Into<String>) -> Self {
        Self::InvalidMesh(msg.into())
    }
}
