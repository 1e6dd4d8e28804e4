//! flow-preview
//!
//! Embeddable previews of 3D models. A preview fetches a zip archive holding an
//! OBJ model, its MTL materials and texture images, assembles a scene from it,
//! frames the camera on the model and keeps rendering while following the size
//! of its host element. Runs in the browser (WASM, WebGL) and natively.
//!
//! High-level modules
//! - `resources`: fetching, archive extraction and OBJ/MTL parsing
//! - `data_structures`: asset bundle, scene model, completion tracking, textures
//! - `camera`: camera, projection, orbit controls and framing policies
//! - `flow`: the per-preview frame loop and the traits it is driven through
//! - `preview`: mount points and the pipeline of one preview
//! - `context`, `pipelines`, `render`: drawing with wgpu
//! - `config`: preview configuration
//! - `web`: browser entry points
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod pipelines;
pub mod preview;
pub mod render;
pub mod resources;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use config::PreviewConfig;
pub use error::PreviewError;
pub use preview::{MountPoint, PreviewContext, PreviewOutcome, load_preview, run_preview};

/// Route `log` output to stderr natively and to the console in the browser.
pub fn init_logging() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_error_panic_hook::set_once();
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::warn_1(&format!("Could not initialize logger: {e}").into());
        }
    }
}
