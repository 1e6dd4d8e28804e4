//! Preview configuration.
//!
//! Every field has a default matching how previews behave on the model pages,
//! so an empty TOML document (or no document at all) is a valid configuration.

use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::{
    camera::framing::FramingPolicy,
    data_structures::scene::Color,
    flow::ViewportState,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Prefix of the model API. Archives live at `<api_root>/model/<id>/<revision>`.
    pub api_root: String,
    /// CSS selector of the elements that host previews.
    pub mount_selector: String,
    pub sky_color: Color,
    /// Background shown when the archive could not be loaded.
    pub failure_color: Color,
    pub framing: FramingPolicy,
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    /// Fixed logical size. When unset the preview follows its host element.
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            api_root: "/api".into(),
            mount_selector: "div.render-pane".into(),
            sky_color: Color::from_hex(0x87cefa),
            failure_color: Color::from_hex(0xed4337),
            framing: FramingPolicy::default(),
            camera: CameraConfig::default(),
            controls: ControlsConfig::default(),
            width: None,
            height: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fovy_degrees: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fovy_degrees: 75.0,
            znear: 0.1,
            zfar: 1000.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    /// Fraction of the remaining motion dropped per frame. `None` stops motion immediately.
    pub damping: Option<f32>,
    /// Radians per pixel of pointer drag.
    pub rotate_speed: f32,
    /// Dolly factor per wheel notch.
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            damping: None,
            rotate_speed: 0.005,
            zoom_speed: 0.95,
            min_distance: 0.01,
            max_distance: 900.0,
        }
    }
}

impl PreviewConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid preview configuration")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("could not read configuration {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    /// Viewport for a host of `host` pixels. Configured dimensions stay fixed.
    pub fn viewport(&self, host: (u32, u32)) -> ViewportState {
        ViewportState::with_overrides(self.width, self.height, host)
    }
}
