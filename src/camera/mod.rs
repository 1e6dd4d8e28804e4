//! Perspective camera, projection and the uniform the shaders read.
//!
//! - [`Camera`] is a look-at camera: an eye position aimed at a target
//! - [`Projection`] owns the aspect ratio and is resized by the render loop
//! - [`controls`] moves the camera in response to user input
//! - [`framing`] places the camera in front of a freshly loaded model

use cgmath::{InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Vector3};

pub mod controls;
pub mod framing;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new((0.0, 0.0, 5.0), (0.0, 0.0, 0.0))
    }
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>, T: Into<Point3<f32>>>(position: P, target: T) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
            up: Vector3::unit_y(),
        }
    }

    pub fn look_at(&mut self, target: Point3<f32>) {
        self.target = target;
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.target).magnitude()
    }

    /// World to view transform.
    ///
    /// Looking straight along `up` would make the basis degenerate, so the
    /// z axis stands in for it. An eye sitting on its target looks down -z.
    pub fn calc_matrix(&self) -> Matrix4<f32> {
        let mut target = self.target;
        let mut dir = target - self.position;
        if dir.magnitude2() <= f32::EPSILON {
            dir = -Vector3::unit_z();
            target = self.position + dir;
        }
        let up = if dir.normalize().cross(self.up).magnitude2() <= 1e-10 {
            Vector3::unit_z()
        } else {
            self.up
        };
        Matrix4::look_at_rh(self.position, target, up)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        let mut projection = Self {
            aspect: 1.0,
            fovy: fovy.into(),
            znear,
            zfar,
        };
        projection.resize(width, height);
        projection
    }

    /// Zero sized surfaces keep the previous aspect ratio.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn fovy(&self) -> Rad<f32> {
        self.fovy
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_position: [f32; 4],
    pub view_proj: [[f32; 4]; 4],
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }
}

impl CameraUniform {
    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}
