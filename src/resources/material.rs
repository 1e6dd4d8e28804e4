//! Material parsing, texture resolution and texture preloading.

use std::{
    collections::HashMap,
    io::{BufReader, Cursor},
    sync::Arc,
};

use crate::{
    data_structures::material::{Material, Side, TextureRef},
    resources::blob::BlobUrl,
};

/// Materials of one archive, in the order the material file defines them.
#[derive(Clone, Debug, Default)]
pub struct MaterialSet {
    materials: Vec<Material>,
}

/// Parse MTL text. Every material is shaded double sided.
///
/// Without material text the set is empty. A stream the parser rejects is
/// logged and treated like a missing one: the model still shows, untextured.
pub fn parse_materials(text: Option<&str>) -> MaterialSet {
    let Some(text) = text else {
        return MaterialSet::default();
    };
    match load_mtl(text) {
        Ok(materials) => MaterialSet {
            materials: materials.into_iter().map(from_tobj).collect(),
        },
        Err(e) => {
            log::warn!("material file could not be parsed, continuing without materials: {e}");
            MaterialSet::default()
        }
    }
}

pub(crate) fn load_mtl(text: &str) -> Result<Vec<tobj::Material>, tobj::LoadError> {
    let (materials, _) = tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(text)))?;
    Ok(materials)
}

fn from_tobj(m: tobj::Material) -> Material {
    let defaults = Material::default();
    Material {
        ambient: m.ambient.unwrap_or(defaults.ambient),
        diffuse: m.diffuse.unwrap_or(defaults.diffuse),
        specular: m.specular.unwrap_or(defaults.specular),
        shininess: m.shininess.unwrap_or(defaults.shininess),
        opacity: m.dissolve.unwrap_or(defaults.opacity),
        side: Side::Double,
        lights: true,
        map_kd: m.diffuse_texture.filter(|path| !path.trim().is_empty()),
        diffuse_map: None,
        name: m.name,
    }
}

/// Final segment of a texture path as written in a material file.
pub fn texture_file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Find the blob a material's texture path refers to.
///
/// Material files name textures relative to wherever they were exported, so
/// only the final path segment is compared. An exact key wins; otherwise an
/// entry stored under a directory with the same file name is accepted.
pub fn resolve_texture<'a>(path: &str, textures: &'a HashMap<String, BlobUrl>) -> Option<&'a BlobUrl> {
    let file_name = texture_file_name(path);
    textures.get(file_name).or_else(|| {
        textures
            .iter()
            .filter(|(name, _)| texture_file_name(name) == file_name)
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, blob)| blob)
    })
}

impl MaterialSet {
    pub fn from_materials(materials: Vec<Material>) -> Self {
        Self { materials }
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        self.materials.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.name == name)
    }

    /// Point every `map_kd` at the archive blob with the same file name.
    /// Returns how many references were resolved.
    pub fn resolve_textures(&mut self, textures: &HashMap<String, BlobUrl>) -> usize {
        let mut resolved = 0;
        for material in &mut self.materials {
            let Some(path) = material.map_kd.as_deref() else {
                continue;
            };
            material.diffuse_map = resolve_texture(path, textures).cloned().map(TextureRef::new);
            match material.diffuse_map {
                Some(_) => resolved += 1,
                None => log::debug!("texture {path} of material {} is not in the archive", material.name),
            }
        }
        resolved
    }

    /// Decode the pixels of every resolved texture so the first frame is textured.
    ///
    /// Materials sharing a blob share the decoded image.
    pub fn preload(&mut self) {
        let mut decoded: HashMap<String, Option<Arc<image::RgbaImage>>> = HashMap::new();
        for material in &mut self.materials {
            let Some(texture) = material.diffuse_map.as_mut() else {
                continue;
            };
            let pixels = decoded
                .entry(texture.url().to_string())
                .or_insert_with(|| match image::load_from_memory(texture.blob.bytes()) {
                    Ok(img) => Some(Arc::new(img.to_rgba8())),
                    Err(e) => {
                        log::warn!("texture {} could not be decoded: {e}", texture.blob.name());
                        None
                    }
                });
            texture.pixels = pixels.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MTL: &str = "\
newmtl wood
Ka 0.2 0.2 0.2
Kd 0.8 0.6 0.4
map_Kd textures/deep/wood.png

newmtl paint
Kd 1 0 0
";

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn parsed_materials_are_double_sided() {
        let set = parse_materials(Some(MTL));
        assert_eq!(set.len(), 2);
        let wood = set.get("wood").unwrap();
        assert_eq!(wood.side, Side::Double);
        assert_eq!(wood.diffuse, [0.8, 0.6, 0.4]);
        assert_eq!(wood.map_kd.as_deref(), Some("textures/deep/wood.png"));
        assert!(set.get("paint").unwrap().map_kd.is_none());
    }

    #[test]
    fn missing_material_text_gives_empty_set() {
        assert!(parse_materials(None).is_empty());
    }

    #[test]
    fn final_path_segment_selects_the_texture() {
        assert_eq!(texture_file_name("a/b/c/tex.png"), "tex.png");
        assert_eq!(texture_file_name("C:\\art\\tex.png"), "tex.png");
        assert_eq!(texture_file_name("tex.png"), "tex.png");

        let tex = BlobUrl::create("tex.png", vec![1]);
        let textures = HashMap::from([("tex.png".to_string(), tex.clone())]);
        assert_eq!(resolve_texture("a/b/c/tex.png", &textures), Some(&tex));
        assert_eq!(resolve_texture("a/b/c/other.png", &textures), None);
    }

    #[test]
    fn nested_archive_entries_match_by_file_name() {
        let tex = BlobUrl::create("maps/tex.png", vec![1]);
        let textures = HashMap::from([("maps/tex.png".to_string(), tex.clone())]);
        assert_eq!(resolve_texture("tex.png", &textures), Some(&tex));
    }

    #[test]
    fn unresolved_textures_are_left_empty() {
        let mut set = parse_materials(Some(MTL));
        let resolved = set.resolve_textures(&HashMap::new());
        assert_eq!(resolved, 0);
        assert!(set.iter().all(|m| m.diffuse_map.is_none()));
    }

    #[test]
    fn preload_decodes_resolved_textures() {
        let mut set = parse_materials(Some(MTL));
        let textures = HashMap::from([("wood.png".to_string(), BlobUrl::create("wood.png", png_bytes()))]);
        assert_eq!(set.resolve_textures(&textures), 1);
        set.preload();
        let map = set.get("wood").unwrap().diffuse_map.as_ref().unwrap();
        let pixels = map.pixels.as_ref().unwrap();
        assert_eq!(pixels.dimensions(), (2, 2));
        assert_eq!(pixels.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn undecodable_texture_keeps_its_reference() {
        let mut set = parse_materials(Some(MTL));
        let textures = HashMap::from([("wood.png".to_string(), BlobUrl::create("wood.png", vec![0, 1, 2]))]);
        set.resolve_textures(&textures);
        set.preload();
        let map = set.get("wood").unwrap().diffuse_map.as_ref().unwrap();
        assert!(!map.is_loaded());
        assert!(!map.url().is_empty());
    }
}
