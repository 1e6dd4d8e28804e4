//! Desktop viewer: `flow-preview <archive.zip> [--config preview.toml]`.
//!
//! Opens a window and runs the same preview pipeline the browser uses, reading
//! the archive from disk.

#[cfg(not(target_arch = "wasm32"))]
mod viewer {
    use std::{
        path::{Path, PathBuf},
        sync::Arc,
    };

    use anyhow::Context as _;
    use clap::Parser;
    use flow_preview::{
        PreviewConfig, PreviewContext,
        camera::controls::OrbitControls,
        context::GpuContext,
        flow::{FrameScheduler, RenderLoop},
        render::GpuRenderer,
        resources::fetch::FileFetcher,
        run_preview,
    };
    use tokio::runtime::Runtime;
    use winit::{
        application::ApplicationHandler,
        event::WindowEvent,
        event_loop::{ActiveEventLoop, EventLoop},
        window::{Window, WindowId},
    };

    type ViewerLoop = RenderLoop<GpuRenderer, OrbitControls, RedrawScheduler>;

    #[derive(Parser, Debug)]
    #[command(name = "flow-preview")]
    #[command(about = "Preview a zipped OBJ/MTL model in a window")]
    struct Args {
        /// Zip archive holding the model, its materials and textures
        archive: PathBuf,

        /// Preview configuration in TOML
        #[arg(long)]
        config: Option<PathBuf>,
    }

    /// Frames are requested as redraws of the window.
    struct RedrawScheduler(Arc<Window>);

    impl FrameScheduler for RedrawScheduler {
        fn schedule(&mut self) {
            self.0.request_redraw();
        }
    }

    struct Viewer {
        runtime: Runtime,
        config: PreviewConfig,
        archive: PathBuf,
        preview: Option<ViewerLoop>,
    }

    impl Viewer {
        fn open(&self, window: Arc<Window>) -> anyhow::Result<Option<ViewerLoop>> {
            let size = window.inner_size();
            let viewport = self.config.viewport((size.width, size.height));
            let gpu = self
                .runtime
                .block_on(GpuContext::new(window.clone(), viewport.size()))?;

            let root = self.archive.parent().unwrap_or(Path::new("."));
            let name = self
                .archive
                .file_name()
                .and_then(|name| name.to_str())
                .context("archive path has no file name")?;
            let fetcher = FileFetcher::new(root);

            let ctx = PreviewContext::new(&self.config, viewport);
            let render_loop = self.runtime.block_on(run_preview(
                ctx,
                &fetcher,
                name,
                GpuRenderer::new(gpu),
                OrbitControls::new(&self.config.controls),
                RedrawScheduler(window.clone()),
            ));
            Ok(render_loop.map(|render_loop| {
                render_loop.with_viewport_source(move || {
                    let size = window.inner_size();
                    Some((size.width, size.height))
                })
            }))
        }
    }

    impl ApplicationHandler for Viewer {
        fn resumed(&mut self, event_loop: &ActiveEventLoop) {
            if self.preview.is_some() {
                return;
            }
            let attributes = Window::default_attributes().with_title("flow-preview");
            let window = match event_loop.create_window(attributes) {
                Ok(window) => Arc::new(window),
                Err(e) => {
                    log::error!("cannot open a window: {e}");
                    event_loop.exit();
                    return;
                }
            };
            match self.open(window) {
                Ok(Some(preview)) => self.preview = Some(preview),
                Ok(None) => {
                    log::info!("loading was cancelled");
                    event_loop.exit();
                }
                Err(e) => {
                    log::error!("preview could not start: {e:#}");
                    event_loop.exit();
                }
            }
        }

        fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
            let Some(preview) = self.preview.as_mut() else {
                return;
            };
            match event {
                WindowEvent::CloseRequested => {
                    preview.cancellation().cancel();
                    event_loop.exit();
                }
                WindowEvent::RedrawRequested => {
                    preview.frame();
                }
                WindowEvent::Resized(_) => preview.scheduler().0.request_redraw(),
                other => {
                    preview.controls_mut().handle_window_event(&other);
                }
            }
        }
    }

    pub fn run() -> anyhow::Result<()> {
        flow_preview::init_logging();

        let args = Args::parse();
        let config = match &args.config {
            Some(path) => PreviewConfig::load(path)?,
            None => PreviewConfig::default(),
        };

        let event_loop = EventLoop::new()?;
        let mut viewer = Viewer {
            runtime: Runtime::new()?,
            config,
            archive: args.archive,
            preview: None,
        };
        event_loop.run_app(&mut viewer)?;
        Ok(())
    }

}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    viewer::run()
}

#[cfg(target_arch = "wasm32")]
fn main() {}
