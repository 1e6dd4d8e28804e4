//! The scene a preview draws: background, lights and the assembled model.
//!
//! A [`SceneObject`] is the model built from one archive. It is a flat list of
//! [`MeshPart`]s that share one translation, which is how framing recenters a
//! model without touching its vertices.

use cgmath::{Point3, Vector3, Zero};
use serde::{Deserialize, Serialize};

use crate::data_structures::{bounds::Aabb, material::Material};

/// Linear RGB colour. (De)serialises as a `0xRRGGBB` integer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color::from_hex(0xffffff);

    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as f32 / 255.0,
            g: ((hex >> 8) & 0xff) as f32 / 255.0,
            b: (hex & 0xff) as f32 / 255.0,
        }
    }

    pub fn to_hex(self) -> u32 {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
        (c(self.r) << 16) | (c(self.g) << 8) | c(self.b)
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<u32> for Color {
    fn from(hex: u32) -> Self {
        Color::from_hex(hex)
    }
}

impl From<Color> for u32 {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

impl From<Color> for wgpu::Color {
    fn from(c: Color) -> Self {
        wgpu::Color {
            r: c.r as f64,
            g: c.g as f64,
            b: c.b as f64,
            a: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Light {
    Ambient {
        color: Color,
    },
    /// Shines from `position` towards the origin.
    Directional {
        color: Color,
        intensity: f32,
        position: [f32; 3],
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshKind {
    Triangles,
    LineSegments,
}

/// Vertex data of one mesh part. Indices address all attribute arrays alike;
/// `normals` and `tex_coords` are either empty or as long as `positions`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty() || self.positions.is_empty()
    }

    pub fn bounding_box(&self) -> Option<Aabb> {
        Aabb::from_points(self.positions.iter().map(|p| Point3::from(*p)))
    }
}

#[derive(Clone, Debug)]
pub struct MeshPart {
    pub name: String,
    pub kind: MeshKind,
    pub geometry: Geometry,
    pub material: Option<Material>,
}

impl MeshPart {
    pub fn is_mesh(&self) -> bool {
        self.kind == MeshKind::Triangles
    }
}

#[derive(Clone, Debug)]
pub struct SceneObject {
    pub name: String,
    pub position: Vector3<f32>,
    pub children: Vec<MeshPart>,
}

impl SceneObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: Vector3::zero(),
            children: Vec::new(),
        }
    }

    /// World-space box over every child, including the object's translation.
    pub fn bounding_box(&self) -> Option<Aabb> {
        self.children
            .iter()
            .filter_map(|part| part.geometry.bounding_box())
            .reduce(Aabb::union)
            .map(|b| b.translate(self.position))
    }

    pub fn vertex_count(&self) -> usize {
        self.children.iter().map(|p| p.geometry.vertex_count()).sum()
    }
}

#[derive(Clone, Debug)]
pub struct Scene {
    pub background: Color,
    pub lights: Vec<Light>,
    objects: Vec<SceneObject>,
    revision: u64,
}

impl Scene {
    pub fn new(background: Color) -> Self {
        Self {
            background,
            lights: Vec::new(),
            objects: Vec::new(),
            revision: 0,
        }
    }

    /// Scene lit the way every preview starts out: two white key lights above
    /// the model and a grey ambient term.
    pub fn with_default_lights(background: Color) -> Self {
        let mut scene = Self::new(background);
        scene.lights = vec![
            Light::Directional {
                color: Color::WHITE,
                intensity: 0.6,
                position: [50.0, 100.0, 20.0],
            },
            Light::Directional {
                color: Color::WHITE,
                intensity: 0.6,
                position: [-50.0, 100.0, 20.0],
            },
            Light::Ambient {
                color: Color::from_hex(0x999999),
            },
        ];
        scene
    }

    pub fn add(&mut self, object: SceneObject) {
        self.objects.push(object);
        self.touch();
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    /// Mutable access to the objects. Bumps the revision so cached GPU data is rebuilt.
    pub fn objects_mut(&mut self) -> &mut [SceneObject] {
        self.touch();
        &mut self.objects
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(points: &[[f32; 3]]) -> MeshPart {
        MeshPart {
            name: "p".into(),
            kind: MeshKind::Triangles,
            geometry: Geometry {
                positions: points.to_vec(),
                indices: (0..points.len() as u32).collect(),
                ..Default::default()
            },
            material: None,
        }
    }

    #[test]
    fn hex_colours_round_trip_through_config_form() {
        let sky = Color::from_hex(0x87cefa);
        assert_eq!(sky.to_hex(), 0x87cefa);
        assert_eq!(u32::from(Color::from(0xed4337)), 0xed4337);
    }

    #[test]
    fn object_box_includes_translation() {
        let mut object = SceneObject::new("o");
        object.children.push(part(&[[0.0, 0.0, 0.0], [2.0, 2.0, 2.0]]));
        object.children.push(part(&[[-1.0, 0.0, 4.0]]));
        object.position = Vector3::new(1.0, 0.0, 0.0);
        let b = object.bounding_box().unwrap();
        assert_eq!(b.min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(b.max, Point3::new(3.0, 2.0, 4.0));
        assert_eq!(object.vertex_count(), 3);
    }

    #[test]
    fn structural_changes_bump_the_revision() {
        let mut scene = Scene::with_default_lights(Color::WHITE);
        assert_eq!(scene.lights.len(), 3);
        let start = scene.revision();
        scene.add(SceneObject::new("o"));
        assert!(scene.revision() > start);
        let after_add = scene.revision();
        scene.objects_mut()[0].position = Vector3::new(1.0, 1.0, 1.0);
        assert!(scene.revision() > after_add);
    }
}
