//! Per mount point wiring of the preview pipeline.
//!
//! Every preview gets its own [`PreviewContext`]. Nothing here is shared
//! between mount points, so one failing preview never touches another.

use std::sync::LazyLock;

use cgmath::Deg;
use regex::Regex;

use crate::{
    camera::{Camera, Projection, controls::Controls, framing::{FramingPolicy, frame_object}},
    config::PreviewConfig,
    data_structures::scene::{Color, Scene, SceneObject},
    error::PreviewError,
    flow::{FrameScheduler, RenderLoop, RenderTarget, ViewportState},
    resources::{self, fetch::ArchiveFetcher},
};

static MOUNT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"render-pane(\d+)\.(\d+)").expect("mount id pattern is valid"));

/// A page element hosting one preview, with the model it shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MountPoint {
    pub element_id: String,
    pub model_id: String,
    pub revision: String,
}

impl MountPoint {
    /// Read model id and revision from an element id like `render-pane12.3`.
    pub fn parse(element_id: &str) -> Option<Self> {
        let captures = MOUNT_ID.captures(element_id)?;
        Some(Self {
            element_id: element_id.to_string(),
            model_id: captures[1].to_string(),
            revision: captures[2].to_string(),
        })
    }

    pub fn url(&self, api_root: &str) -> String {
        model_url(api_root, &self.model_id, &self.revision)
    }
}

/// Mount points among candidate element ids. Ids that do not name a model are skipped.
pub fn discover<I, S>(element_ids: I) -> Vec<MountPoint>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    element_ids
        .into_iter()
        .filter_map(|id| {
            let id = id.as_ref();
            let mount = MountPoint::parse(id);
            if mount.is_none() {
                log::warn!("element {id:?} does not name a model and revision, skipping it");
            }
            mount
        })
        .collect()
}

pub fn model_url(api_root: &str, model_id: &str, revision: &str) -> String {
    format!("{}/model/{model_id}/{revision}", api_root.trim_end_matches('/'))
}

/// Scene, camera and viewport of one preview.
#[derive(Clone, Debug)]
pub struct PreviewContext {
    pub scene: Scene,
    pub camera: Camera,
    pub projection: Projection,
    pub viewport: ViewportState,
    pub framing: FramingPolicy,
    pub failure_color: Color,
}

impl PreviewContext {
    /// Empty, lit scene on the sky background, seen from the default camera.
    pub fn new(config: &PreviewConfig, viewport: ViewportState) -> Self {
        let projection = Projection::new(
            viewport.width,
            viewport.height,
            Deg(config.camera.fovy_degrees),
            config.camera.znear,
            config.camera.zfar,
        );
        Self {
            scene: Scene::with_default_lights(config.sky_color),
            camera: Camera::default(),
            projection,
            viewport,
            framing: config.framing,
            failure_color: config.failure_color,
        }
    }

    /// Frame the model and add it to the scene.
    pub fn insert(&mut self, mut object: SceneObject) {
        frame_object(&mut object, &mut self.camera, self.framing);
        log::info!(
            "showing {} with {} parts and {} vertices",
            object.name,
            object.children.len(),
            object.vertex_count()
        );
        self.scene.add(object);
    }

    /// Signal a failed load through the background colour.
    pub fn degrade(&mut self, error: &PreviewError) {
        log::error!("preview could not be loaded: {error}");
        self.scene.background = self.failure_color;
    }
}

#[derive(Debug)]
pub enum PreviewOutcome {
    Loaded,
    /// Shown with the failure colour and an empty scene.
    Degraded(PreviewError),
    /// The user aborted the download. Nothing is shown.
    Cancelled,
}

impl PreviewOutcome {
    pub fn starts_loop(&self) -> bool {
        !matches!(self, PreviewOutcome::Cancelled)
    }
}

/// Fetch and assemble the model at `url` into `ctx`.
pub async fn load_preview<F: ArchiveFetcher + ?Sized>(ctx: &mut PreviewContext, fetcher: &F, url: &str) -> PreviewOutcome {
    let started = instant::Instant::now();
    match resources::load_model(fetcher, url).await {
        Ok(object) => {
            log::info!("{url} loaded in {:?}", started.elapsed());
            ctx.insert(object);
            PreviewOutcome::Loaded
        }
        Err(e) if e.is_cancellation() => {
            log::debug!("download of {url} was aborted");
            PreviewOutcome::Cancelled
        }
        Err(e) => {
            ctx.degrade(&e);
            PreviewOutcome::Degraded(e)
        }
    }
}

/// Draw the empty sky once so the element is not blank while the archive loads.
pub fn draw_initial_frame<T: RenderTarget + ?Sized>(ctx: &mut PreviewContext, target: &mut T) {
    let (width, height) = ctx.viewport.size();
    if width > 0 && height > 0 && target.surface_size() != (width, height) {
        target.set_surface_size(width, height);
        ctx.projection.resize(width, height);
    }
    target.draw(&ctx.scene, &ctx.camera, &ctx.projection);
}

/// The whole pipeline for one mount point.
///
/// Returns the running loop, or `None` when the download was aborted, in which
/// case nothing beyond the initial frame was drawn.
pub async fn run_preview<T, C, S, F>(
    mut ctx: PreviewContext,
    fetcher: &F,
    url: &str,
    mut target: T,
    controls: C,
    scheduler: S,
) -> Option<RenderLoop<T, C, S>>
where
    T: RenderTarget,
    C: Controls,
    S: FrameScheduler,
    F: ArchiveFetcher + ?Sized,
{
    draw_initial_frame(&mut ctx, &mut target);
    let outcome = load_preview(&mut ctx, fetcher, url).await;
    if !outcome.starts_loop() {
        return None;
    }
    let mut render_loop = RenderLoop::new(ctx, target, controls, scheduler);
    render_loop.start();
    Some(render_loop)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_ids_carry_model_and_revision() {
        let mount = MountPoint::parse("render-pane12.3").unwrap();
        assert_eq!(mount.model_id, "12");
        assert_eq!(mount.revision, "3");
        assert_eq!(mount.url("/api"), "/api/model/12/3");
    }

    #[test]
    fn malformed_ids_are_skipped_without_affecting_others() {
        let mounts = discover(["render-pane1.2", "render-pane", "render-paneX.1", "render-pane3-4", "render-pane5.6"]);
        let ids: Vec<_> = mounts.iter().map(|m| (m.model_id.as_str(), m.revision.as_str())).collect();
        assert_eq!(ids, vec![("1", "2"), ("5", "6")]);
    }

    #[test]
    fn ids_stay_opaque() {
        let mount = MountPoint::parse("render-pane007.010").unwrap();
        assert_eq!((mount.model_id.as_str(), mount.revision.as_str()), ("007", "010"));
    }

    #[test]
    fn api_root_trailing_slash_is_ignored() {
        assert_eq!(model_url("/r/api/", "4", "1"), "/r/api/model/4/1");
        assert_eq!(model_url("", "4", "1"), "/model/4/1");
    }

    #[test]
    fn new_contexts_show_the_lit_sky() {
        let config = PreviewConfig::default();
        let ctx = PreviewContext::new(&config, ViewportState::fixed(800, 600));
        assert_eq!(ctx.scene.background, config.sky_color);
        assert_eq!(ctx.scene.lights.len(), 3);
        assert!(ctx.scene.is_empty());
        assert_eq!(ctx.projection.aspect(), 800.0 / 600.0);
    }

    #[test]
    fn degrading_switches_to_the_failure_colour() {
        let config = PreviewConfig::default();
        let mut ctx = PreviewContext::new(&config, ViewportState::fixed(1, 1));
        ctx.degrade(&PreviewError::Incomplete);
        assert_eq!(ctx.scene.background, config.failure_color);
    }
}
