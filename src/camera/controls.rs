use std::{cell::RefCell, f32::consts::PI, rc::Rc};

use cgmath::{InnerSpace, Vector3};

use crate::{camera::Camera, config::ControlsConfig};

/// Interactive camera manipulation, advanced once per frame.
pub trait Controls {
    /// Apply pending input to the camera. Returns whether the camera moved.
    fn update(&mut self, camera: &mut Camera) -> bool;
}

/// Input handlers and the render loop both need the controls in the browser.
impl<T: Controls> Controls for Rc<RefCell<T>> {
    fn update(&mut self, camera: &mut Camera) -> bool {
        self.borrow_mut().update(camera)
    }
}

/// Controls that never move the camera.
impl Controls for () {
    fn update(&mut self, _camera: &mut Camera) -> bool {
        false
    }
}

// Keeps the polar angle off the poles where the azimuth is undefined.
const POLE_MARGIN: f32 = 1e-4;

/// Orbits the camera around its target: pointer drags rotate, the wheel dollies.
///
/// Input only accumulates deltas; [`Controls::update`] applies them. With
/// damping, each update applies a fraction of what is pending and the camera
/// glides to a stop over the following frames.
#[derive(Clone, Debug)]
pub struct OrbitControls {
    rotate_speed: f32,
    zoom_speed: f32,
    damping: Option<f32>,
    min_distance: f32,
    max_distance: f32,
    pending_azimuth: f32,
    pending_polar: f32,
    pending_scale: f32,
    drag_origin: Option<(f64, f64)>,
    #[cfg(not(target_arch = "wasm32"))]
    cursor: Option<(f64, f64)>,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self::new(&ControlsConfig::default())
    }
}

impl OrbitControls {
    pub fn new(config: &ControlsConfig) -> Self {
        Self {
            rotate_speed: config.rotate_speed,
            zoom_speed: config.zoom_speed,
            damping: config.damping.map(|d| d.clamp(0.0, 1.0)).filter(|d| *d > 0.0),
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            pending_azimuth: 0.0,
            pending_polar: 0.0,
            pending_scale: 1.0,
            drag_origin: None,
            #[cfg(not(target_arch = "wasm32"))]
            cursor: None,
        }
    }

    /// Rotate by a pointer movement measured in pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.pending_azimuth -= dx * self.rotate_speed;
        self.pending_polar -= dy * self.rotate_speed;
    }

    /// Dolly by wheel notches. Positive notches move away from the target.
    pub fn zoom(&mut self, notches: f32) {
        if self.zoom_speed > 0.0 {
            self.pending_scale *= self.zoom_speed.powf(-notches);
        }
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        self.drag_origin = Some((x, y));
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if let Some((ox, oy)) = self.drag_origin {
            self.rotate((x - ox) as f32, (y - oy) as f32);
            self.drag_origin = Some((x, y));
        }
    }

    pub fn pointer_up(&mut self) {
        self.drag_origin = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_origin.is_some()
    }

    pub fn is_idle(&self) -> bool {
        self.pending_azimuth == 0.0 && self.pending_polar == 0.0 && self.pending_scale == 1.0
    }

    /// Feed a window event of the desktop viewer. Returns whether it was consumed.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn handle_window_event(&mut self, event: &winit::event::WindowEvent) -> bool {
        use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                match (state, self.cursor) {
                    (ElementState::Pressed, Some((x, y))) => self.pointer_down(x, y),
                    (ElementState::Pressed, None) => {}
                    (ElementState::Released, _) => self.pointer_up(),
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Some((position.x, position.y));
                self.pointer_move(position.x, position.y);
                self.is_dragging()
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let notches = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -*y,
                    MouseScrollDelta::PixelDelta(p) => -(p.y as f32) / 100.0,
                };
                self.zoom(notches);
                true
            }
            _ => false,
        }
    }

    fn take_step(&mut self) -> (f32, f32, f32) {
        match self.damping {
            Some(factor) => {
                let step = (
                    self.pending_azimuth * factor,
                    self.pending_polar * factor,
                    self.pending_scale.powf(factor),
                );
                self.pending_azimuth -= step.0;
                self.pending_polar -= step.1;
                self.pending_scale /= step.2;
                if self.pending_azimuth.abs() < 1e-6 && self.pending_polar.abs() < 1e-6 {
                    self.pending_azimuth = 0.0;
                    self.pending_polar = 0.0;
                }
                if (self.pending_scale - 1.0).abs() < 1e-6 {
                    self.pending_scale = 1.0;
                }
                step
            }
            None => {
                let step = (self.pending_azimuth, self.pending_polar, self.pending_scale);
                self.pending_azimuth = 0.0;
                self.pending_polar = 0.0;
                self.pending_scale = 1.0;
                step
            }
        }
    }
}

impl Controls for OrbitControls {
    fn update(&mut self, camera: &mut Camera) -> bool {
        if self.is_idle() {
            return false;
        }
        let (d_azimuth, d_polar, scale) = self.take_step();

        let offset = camera.position - camera.target;
        let radius = offset.magnitude();
        if radius <= f32::EPSILON || !radius.is_finite() {
            return false;
        }
        // Spherical coordinates around the y axis.
        let azimuth = offset.x.atan2(offset.z) + d_azimuth;
        let polar = ((offset.y / radius).clamp(-1.0, 1.0).acos() + d_polar).clamp(POLE_MARGIN, PI - POLE_MARGIN);
        let radius = (radius * scale).clamp(self.min_distance, self.max_distance);

        let offset = Vector3::new(
            radius * polar.sin() * azimuth.sin(),
            radius * polar.cos(),
            radius * polar.sin() * azimuth.cos(),
        );
        camera.position = camera.target + offset;
        true
    }
}
