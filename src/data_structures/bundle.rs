//! Decoded archive contents.

use std::collections::HashMap;

use crate::resources::blob::BlobUrl;

/// Role of an archive entry, derived from its file name alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Geometry,
    Material,
    Texture,
}

impl EntryKind {
    pub const GEOMETRY_SUFFIX: &'static str = ".obj";
    pub const MATERIAL_SUFFIX: &'static str = ".mtl";

    /// `.obj` is geometry, `.mtl` is material, everything else is a texture.
    pub fn classify(name: &str) -> Self {
        if has_suffix(name, Self::GEOMETRY_SUFFIX) {
            EntryKind::Geometry
        } else if has_suffix(name, Self::MATERIAL_SUFFIX) {
            EntryKind::Material
        } else {
            EntryKind::Texture
        }
    }

    pub fn is_text(self) -> bool {
        !matches!(self, EntryKind::Texture)
    }
}

fn has_suffix(name: &str, suffix: &str) -> bool {
    name.len() >= suffix.len()
        && name.is_char_boundary(name.len() - suffix.len())
        && name[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

/// Decoded content of one entry.
#[derive(Clone, Debug)]
pub enum EntryPayload {
    Text(String),
    Blob(BlobUrl),
}

/// Everything one archive decodes into, partitioned by role.
#[derive(Clone, Debug, Default)]
pub struct AssetBundle {
    pub geometry: Option<String>,
    pub material: Option<String>,
    pub textures: HashMap<String, BlobUrl>,
}

impl AssetBundle {
    /// Store a decoded entry in the slot its kind selects.
    ///
    /// Text payloads for texture entries are kept as blobs of their bytes, and
    /// blob payloads for text entries are decoded lossily, so every entry lands
    /// in exactly one slot.
    pub fn insert(&mut self, name: &str, kind: EntryKind, payload: EntryPayload) {
        match kind {
            EntryKind::Geometry => {
                if self.geometry.is_some() {
                    log::warn!("archive holds more than one geometry file, {name} replaces the previous one");
                }
                self.geometry = Some(payload.into_text());
            }
            EntryKind::Material => {
                if self.material.is_some() {
                    log::warn!("archive holds more than one material file, {name} replaces the previous one");
                }
                self.material = Some(payload.into_text());
            }
            EntryKind::Texture => {
                let blob = match payload {
                    EntryPayload::Blob(blob) => blob,
                    EntryPayload::Text(text) => BlobUrl::create(name, text.into_bytes()),
                };
                self.textures.insert(name.to_string(), blob);
            }
        }
    }

    pub fn slot_count(&self) -> usize {
        self.geometry.is_some() as usize + self.material.is_some() as usize + self.textures.len()
    }
}

impl EntryPayload {
    fn into_text(self) -> String {
        match self {
            EntryPayload::Text(text) => text,
            EntryPayload::Blob(blob) => String::from_utf8_lossy(blob.bytes()).into_owned(),
        }
    }
}
