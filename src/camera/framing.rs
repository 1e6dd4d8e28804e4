use cgmath::{EuclideanSpace, InnerSpace, Point3, Vector3, Zero};
use serde::{Deserialize, Serialize};

use crate::{
    camera::Camera,
    data_structures::{bounds::Aabb, scene::SceneObject},
};

/// Where the camera goes once a model is loaded. Both policies move the model
/// so its bounding box is centred on the origin and aim the camera at the origin.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum FramingPolicy {
    /// Eye at `position + extent * distance_factor` per axis.
    BoundingBox { distance_factor: f32 },
    /// Eye at `(position + centroid) * distance_factor`, the centroid being the
    /// mean vertex of the first part.
    Centroid { distance_factor: f32 },
}

impl Default for FramingPolicy {
    fn default() -> Self {
        Self::BoundingBox { distance_factor: 0.9 }
    }
}

impl FramingPolicy {
    pub fn distance_factor(&self) -> f32 {
        match *self {
            Self::BoundingBox { distance_factor } | Self::Centroid { distance_factor } => distance_factor,
        }
    }
}

/// Recenter `object` on the origin and place `camera` in front of it.
///
/// Returns the bounding box the object was centred by, in model space. A model
/// without vertices is framed as a point at the origin.
pub fn frame_object(object: &mut SceneObject, camera: &mut Camera, policy: FramingPolicy) -> Aabb {
    let bounds = local_bounds(object).unwrap_or_else(|| Aabb::from_point(Point3::origin()));
    object.position = -bounds.center().to_vec();

    let factor = policy.distance_factor();
    let eye = match policy {
        FramingPolicy::BoundingBox { .. } => object.position + bounds.extent() * factor,
        FramingPolicy::Centroid { .. } => (object.position + centroid(object)) * factor,
    };
    let eye = if is_usable_eye(eye) {
        eye
    } else {
        log::debug!("framing produced a degenerate eye {eye:?}, backing off along z");
        Vector3::new(0.0, 0.0, factor.abs().max(1.0))
    };

    camera.position = Point3::from_vec(eye);
    camera.look_at(Point3::origin());
    log::debug!(
        "framed {} at {:?}, camera at {:?}",
        object.name,
        object.position,
        camera.position
    );
    bounds
}

/// Mean position of the first part's vertices.
///
/// Zero when the first part is not a triangle mesh, when there is no part at
/// all, or when the part has no vertices.
pub fn centroid(object: &SceneObject) -> Vector3<f32> {
    let Some(first) = object.children.first().filter(|part| part.is_mesh()) else {
        log::error!("first child of {} is not a mesh, using a zero centroid", object.name);
        return Vector3::zero();
    };
    let positions = &first.geometry.positions;
    if positions.is_empty() {
        return Vector3::zero();
    }
    let sum = positions
        .iter()
        .fold(Vector3::zero(), |acc: Vector3<f32>, p| acc + Vector3::from(*p));
    let mean = sum / positions.len() as f32;
    if mean.x.is_finite() && mean.y.is_finite() && mean.z.is_finite() {
        mean
    } else {
        Vector3::zero()
    }
}

fn local_bounds(object: &SceneObject) -> Option<Aabb> {
    object.bounding_box().map(|b| b.translate(-object.position))
}

fn is_usable_eye(eye: Vector3<f32>) -> bool {
    eye.x.is_finite() && eye.y.is_finite() && eye.z.is_finite() && eye.magnitude2() > f32::EPSILON
}
