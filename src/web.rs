//! Browser entry points.
//!
//! On load every `div.render-pane` element whose id names a model gets a
//! canvas and its own preview. `display_preview` mounts a single preview from
//! page scripts.

use std::{cell::RefCell, rc::Rc};

use anyhow::{Context as _, anyhow};
use wasm_bindgen::{JsCast, prelude::*};
use web_sys::{Element, HtmlCanvasElement, PointerEvent, WheelEvent};

use crate::{
    camera::{Camera, Projection, controls::OrbitControls},
    config::PreviewConfig,
    context::GpuContext,
    data_structures::scene::Scene,
    flow::{FrameScheduler, RenderLoop, RenderTarget, ViewportSource, ViewportState},
    preview::{MountPoint, PreviewContext, discover, run_preview},
    render::GpuRenderer,
    resources::fetch::HttpFetcher,
};

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;
type PreviewLoop = RenderLoop<CanvasTarget, Rc<RefCell<OrbitControls>>, AnimationFrameScheduler>;

/// Schedules frames with `requestAnimationFrame`.
///
/// The callback is installed once with [`AnimationFrameScheduler::set_callback`]
/// and requested again for every frame.
#[derive(Clone, Default)]
pub struct AnimationFrameScheduler {
    callback: FrameCallback,
}

impl AnimationFrameScheduler {
    pub fn set_callback(&self, f: impl FnMut() + 'static) {
        *self.callback.borrow_mut() = Some(Closure::new(f));
    }
}

impl FrameScheduler for AnimationFrameScheduler {
    fn schedule(&mut self) {
        let callback = self.callback.borrow();
        let Some(callback) = callback.as_ref() else {
            log::warn!("no frame callback installed, frame not scheduled");
            return;
        };
        let requested = web_sys::window()
            .ok_or_else(|| JsValue::from_str("no window"))
            .and_then(|window| window.request_animation_frame(callback.as_ref().unchecked_ref()));
        if let Err(e) = requested {
            log::error!("requestAnimationFrame failed: {e:?}");
        }
    }
}

/// Client size of the element hosting a preview.
pub struct ElementSize(pub Element);

impl ViewportSource for ElementSize {
    fn viewport_size(&self) -> Option<(u32, u32)> {
        let (width, height) = (self.0.client_width(), self.0.client_height());
        (width > 0 && height > 0).then_some((width as u32, height as u32))
    }
}

/// The renderer plus the canvas it draws to. Resizing sets the canvas'
/// drawing buffer size before the surface is reconfigured.
pub struct CanvasTarget {
    canvas: HtmlCanvasElement,
    renderer: GpuRenderer,
}

impl RenderTarget for CanvasTarget {
    fn surface_size(&self) -> (u32, u32) {
        self.renderer.surface_size()
    }

    fn set_surface_size(&mut self, width: u32, height: u32) {
        self.canvas.set_width(width);
        self.canvas.set_height(height);
        self.renderer.set_surface_size(width, height);
    }

    fn draw(&mut self, scene: &Scene, camera: &Camera, projection: &Projection) {
        self.renderer.draw(scene, camera, projection);
    }
}

/// Mount a preview for every matching element of the page.
#[wasm_bindgen(start)]
pub fn setup_render_panes() {
    crate::init_logging();
    mount_all(Rc::new(PreviewConfig::default()));
}

/// Like the automatic setup, with a TOML configuration.
#[wasm_bindgen]
pub fn setup_render_panes_with(config: &str) -> Result<(), JsValue> {
    let config = PreviewConfig::from_toml_str(config).map_err(|e| JsValue::from_str(&format!("{e:#}")))?;
    mount_all(Rc::new(config));
    Ok(())
}

/// Show model `model_id` at `revision` in the element `element_id`.
///
/// Without an explicit size the preview follows the element's client size.
#[wasm_bindgen]
pub fn display_preview(element_id: String, model_id: String, revision: String, width: Option<u32>, height: Option<u32>) {
    let mount = MountPoint {
        element_id,
        model_id,
        revision,
    };
    spawn_preview(mount, Rc::new(PreviewConfig::default()), width, height);
}

fn mount_all(config: Rc<PreviewConfig>) {
    let ids = match element_ids(&config.mount_selector) {
        Ok(ids) => ids,
        Err(e) => {
            log::error!("cannot look for preview elements: {e:#}");
            return;
        }
    };
    let mounts = discover(ids);
    log::info!("mounting {} previews", mounts.len());
    for mount in mounts {
        spawn_preview(mount, config.clone(), None, None);
    }
}

fn element_ids(selector: &str) -> anyhow::Result<Vec<String>> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .context("no document")?;
    let nodes = document
        .query_selector_all(selector)
        .map_err(|e| anyhow!("invalid selector {selector:?}: {e:?}"))?;
    Ok((0..nodes.length())
        .filter_map(|i| nodes.get(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .map(|element| element.id())
        .collect())
}

fn spawn_preview(mount: MountPoint, config: Rc<PreviewConfig>, width: Option<u32>, height: Option<u32>) {
    wasm_bindgen_futures::spawn_local(async move {
        if let Err(e) = mount_preview(&mount, &config, width, height).await {
            log::error!("preview {} could not start: {e:#}", mount.element_id);
        }
    });
}

async fn mount_preview(
    mount: &MountPoint,
    config: &PreviewConfig,
    width: Option<u32>,
    height: Option<u32>,
) -> anyhow::Result<()> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .context("no document")?;
    let element = document
        .get_element_by_id(&mount.element_id)
        .with_context(|| format!("no element {}", mount.element_id))?;
    let canvas: HtmlCanvasElement = document
        .create_element("canvas")
        .map_err(|e| anyhow!("cannot create a canvas: {e:?}"))?
        .dyn_into()
        .map_err(|_| anyhow!("created element is not a canvas"))?;
    element
        .append_child(&canvas)
        .map_err(|e| anyhow!("cannot attach the canvas: {e:?}"))?;

    let host = ElementSize(element.clone());
    let viewport = ViewportState::with_overrides(
        width.or(config.width),
        height.or(config.height),
        host.viewport_size().unwrap_or((1, 1)),
    );
    canvas.set_width(viewport.width.max(1));
    canvas.set_height(viewport.height.max(1));

    let gpu = GpuContext::new(wgpu::SurfaceTarget::Canvas(canvas.clone()), viewport.size()).await?;
    let target = CanvasTarget {
        canvas: canvas.clone(),
        renderer: GpuRenderer::new(gpu),
    };
    let controls = Rc::new(RefCell::new(OrbitControls::new(&config.controls)));
    attach_controls(&canvas, &controls)?;

    let slot: Rc<RefCell<Option<PreviewLoop>>> = Rc::new(RefCell::new(None));
    let scheduler = AnimationFrameScheduler::default();
    let frame_slot = slot.clone();
    scheduler.set_callback(move || {
        if let Some(render_loop) = frame_slot.borrow_mut().as_mut() {
            render_loop.frame();
        }
    });

    let ctx = PreviewContext::new(config, viewport);
    let url = mount.url(&config.api_root);
    let fetcher = HttpFetcher;
    if let Some(render_loop) = run_preview(ctx, &fetcher, &url, target, controls, scheduler).await {
        *slot.borrow_mut() = Some(render_loop.with_viewport_source(host));
    }
    Ok(())
}

fn attach_controls(canvas: &HtmlCanvasElement, controls: &Rc<RefCell<OrbitControls>>) -> anyhow::Result<()> {
    let listen = |event: &str, callback: Closure<dyn FnMut(web_sys::Event)>| -> anyhow::Result<()> {
        canvas
            .add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())
            .map_err(|e| anyhow!("cannot listen to {event}: {e:?}"))?;
        // Listeners live as long as the canvas.
        callback.forget();
        Ok(())
    };

    let c = controls.clone();
    listen(
        "pointerdown",
        Closure::new(move |event: web_sys::Event| {
            if let Some(event) = event.dyn_ref::<PointerEvent>() {
                c.borrow_mut().pointer_down(event.offset_x() as f64, event.offset_y() as f64);
            }
        }),
    )?;
    let c = controls.clone();
    listen(
        "pointermove",
        Closure::new(move |event: web_sys::Event| {
            if let Some(event) = event.dyn_ref::<PointerEvent>() {
                c.borrow_mut().pointer_move(event.offset_x() as f64, event.offset_y() as f64);
            }
        }),
    )?;
    for end in ["pointerup", "pointerleave"] {
        let c = controls.clone();
        listen(end, Closure::new(move |_: web_sys::Event| c.borrow_mut().pointer_up()))?;
    }
    let c = controls.clone();
    listen(
        "wheel",
        Closure::new(move |event: web_sys::Event| {
            if let Some(wheel) = event.dyn_ref::<WheelEvent>() {
                event.prevent_default();
                c.borrow_mut().zoom((wheel.delta_y() / 100.0) as f32);
            }
        }),
    )?;
    Ok(())
}
