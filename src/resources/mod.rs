//! All logic for turning a remote archive into a scene object:
//! fetching, extracting entries, parsing materials and geometry.

use crate::{
    data_structures::{bundle::AssetBundle, scene::SceneObject},
    error::PreviewError,
    resources::{archive::ZipReader, fetch::ArchiveFetcher},
};

pub mod archive;
pub mod blob;
pub mod fetch;
pub mod geometry;
pub mod material;

/// Fetch the archive at `url` and decode all of its entries.
pub async fn load_bundle<F: ArchiveFetcher + ?Sized>(fetcher: &F, url: &str) -> Result<AssetBundle, PreviewError> {
    let bytes = fetcher.fetch(url).await?;
    log::info!("fetched {} bytes from {url}", bytes.len());
    archive::extract(&ZipReader::new(bytes)).await
}

/// Build the renderable model of a bundle.
///
/// Materials are parsed first and their texture paths are pointed at the
/// archive's blobs. Textures are decoded before the geometry is parsed, so the
/// first frame already shows them.
pub async fn assemble_scene(bundle: AssetBundle) -> Result<SceneObject, PreviewError> {
    let AssetBundle {
        geometry,
        material,
        textures,
    } = bundle;

    let mut materials = material::parse_materials(material.as_deref());
    let resolved = materials.resolve_textures(&textures);
    log::debug!(
        "{} materials, {resolved} of them textured from {} archive images",
        materials.len(),
        textures.len()
    );
    materials.preload();

    let mut object = geometry::parse_geometry(geometry.as_deref(), &materials).await?;
    let unlit = geometry::disable_line_lighting(&mut object);
    if unlit > 0 {
        log::debug!("{unlit} line parts switched to unlit shading");
    }
    Ok(object)
}

/// Fetch, extract and assemble in one go.
pub async fn load_model<F: ArchiveFetcher + ?Sized>(fetcher: &F, url: &str) -> Result<SceneObject, PreviewError> {
    let bundle = load_bundle(fetcher, url).await?;
    assemble_scene(bundle).await
}
