use std::{
    borrow::Cow,
    io::{BufReader, Cursor},
};

use crate::{
    data_structures::scene::{Geometry, MeshKind, MeshPart, SceneObject},
    error::PreviewError,
    resources::material::MaterialSet,
};

/**
 * Parses OBJ text into a scene object whose parts carry the given materials.
 *
 * Faces are loaded without triangulation so their arities survive: two-vertex
 * faces (`l` statements) become a `LineSegments` part, polygons are fan
 * triangulated into a `Triangles` part and points are dropped.
 */
pub async fn parse_geometry(text: Option<&str>, materials: &MaterialSet) -> Result<SceneObject, PreviewError> {
    let mut object = SceneObject::new("model");
    let Some(text) = text else {
        log::warn!("archive contains no geometry file, the preview stays empty");
        return Ok(object);
    };

    let material_text = materials_source(materials);
    let text = with_material_library(text, materials);
    let mut obj_reader = BufReader::new(Cursor::new(text.as_ref()));
    let (models, obj_materials) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: false,
            single_index: true,
            ignore_points: true,
            ignore_lines: false,
            ..Default::default()
        },
        |_| {
            let text = material_text.clone();
            async move { tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(text))) }
        },
    )
    .await
    .map_err(PreviewError::Geometry)?;

    // The loader answers with the same material file, ids translate to names.
    let names: Vec<String> = obj_materials
        .map(|mats| mats.into_iter().map(|m| m.name).collect())
        .unwrap_or_default();

    for model in models {
        let material = model
            .mesh
            .material_id
            .and_then(|id| names.get(id))
            .and_then(|name| materials.get(name))
            .cloned();
        let (triangles, lines) = split_faces(&model.mesh);
        for (kind, indices) in [(MeshKind::Triangles, triangles), (MeshKind::LineSegments, lines)] {
            if indices.is_empty() {
                continue;
            }
            object.children.push(MeshPart {
                name: model.name.clone(),
                kind,
                geometry: geometry_of(&model.mesh, indices),
                material: material.clone(),
            });
        }
    }
    log::debug!(
        "geometry holds {} parts with {} vertices",
        object.children.len(),
        object.vertex_count()
    );
    Ok(object)
}

/// Wireframe parts are drawn unlit regardless of the scene's lights.
pub fn disable_line_lighting(object: &mut SceneObject) -> usize {
    let mut changed = 0;
    for part in &mut object.children {
        if part.kind != MeshKind::LineSegments {
            continue;
        }
        if let Some(material) = part.material.as_mut() {
            material.lights = false;
            changed += 1;
        }
    }
    changed
}

/// tobj only resolves `usemtl` against libraries named by `mtllib`. Archives
/// carry their one material file regardless, so a geometry file without a
/// library statement is given one.
fn with_material_library<'a>(text: &'a str, materials: &MaterialSet) -> Cow<'a, str> {
    let declared = text
        .lines()
        .any(|line| line.split_whitespace().next() == Some("mtllib"));
    if declared || materials.is_empty() {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(format!("mtllib archive.mtl\n{text}"))
    }
}

/// Minimal material file naming every material, so tobj ids can be mapped back by name.
fn materials_source(materials: &MaterialSet) -> String {
    materials.iter().map(|m| format!("newmtl {}\n", m.name)).collect()
}

/// Split a tobj mesh's index list into triangle and line-segment indices.
pub(crate) fn split_faces(mesh: &tobj::Mesh) -> (Vec<u32>, Vec<u32>) {
    if mesh.face_arities.is_empty() {
        // tobj leaves the arities empty when every face is a triangle
        return (mesh.indices.clone(), Vec::new());
    }
    let mut triangles = Vec::new();
    let mut lines = Vec::new();
    let mut start = 0usize;
    for &arity in &mesh.face_arities {
        let arity = arity as usize;
        let Some(face) = mesh.indices.get(start..start + arity) else {
            log::warn!("face list is shorter than its arities claim, dropping the rest");
            break;
        };
        match arity {
            0 | 1 => {}
            2 => lines.extend_from_slice(face),
            _ => {
                for i in 1..arity - 1 {
                    triangles.extend_from_slice(&[face[0], face[i], face[i + 1]]);
                }
            }
        }
        start += arity;
    }
    (triangles, lines)
}

fn geometry_of(mesh: &tobj::Mesh, indices: Vec<u32>) -> Geometry {
    let vertex_count = mesh.positions.len() / 3;
    let positions = mesh
        .positions
        .chunks_exact(3)
        .map(|p| [p[0], p[1], p[2]])
        .collect();
    let normals = if mesh.normals.len() == vertex_count * 3 {
        mesh.normals.chunks_exact(3).map(|n| [n[0], n[1], n[2]]).collect()
    } else {
        Vec::new()
    };
    let tex_coords = if mesh.texcoords.len() == vertex_count * 2 {
        mesh.texcoords.chunks_exact(2).map(|t| [t[0], t[1]]).collect()
    } else {
        Vec::new()
    };
    Geometry {
        positions,
        normals,
        tex_coords,
        indices: indices.into_iter().filter(|&i| (i as usize) < vertex_count).collect(),
    }
}
