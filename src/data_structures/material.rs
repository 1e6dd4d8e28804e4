//! Surface descriptions attached to mesh parts.

use std::sync::Arc;

use crate::resources::blob::BlobUrl;

/// Which faces of a triangle get shaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Side {
    #[default]
    Front,
    Back,
    Double,
}

/// A diffuse texture taken from the archive.
///
/// `pixels` is filled in by preloading; a reference without pixels still
/// names its blob but draws as untextured.
#[derive(Clone, Debug)]
pub struct TextureRef {
    pub blob: BlobUrl,
    pub pixels: Option<Arc<image::RgbaImage>>,
}

impl TextureRef {
    pub fn new(blob: BlobUrl) -> Self {
        Self { blob, pixels: None }
    }

    pub fn url(&self) -> &str {
        self.blob.url()
    }

    pub fn is_loaded(&self) -> bool {
        self.pixels.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub ambient: [f32; 3],
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    pub shininess: f32,
    pub opacity: f32,
    pub side: Side,
    /// Whether scene lights affect this material. Unlit materials show their diffuse colour as-is.
    pub lights: bool,
    /// Diffuse texture path as written in the material file.
    pub map_kd: Option<String>,
    pub diffuse_map: Option<TextureRef>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            ambient: [1.0; 3],
            diffuse: [1.0; 3],
            specular: [0.07; 3],
            shininess: 30.0,
            opacity: 1.0,
            side: Side::Front,
            lights: true,
            map_kd: None,
            diffuse_map: None,
        }
    }
}
