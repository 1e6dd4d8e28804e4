//! Preview data structures: archive bundles, scenes, materials and textures.
//!
//! - `bundle` is the decoded archive, one slot per entry
//! - `completion` is the barrier that hands the bundle over once every entry decoded
//! - `scene` holds the scene graph (background, lights, objects, mesh parts)
//! - `material` describes surfaces and their texture references
//! - `bounds` is the axis-aligned box used for framing
//! - `texture` wraps GPU textures

pub mod bounds;
pub mod bundle;
pub mod completion;
pub mod material;
pub mod scene;
pub mod texture;
