#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    io::{Cursor, Write},
    rc::Rc,
};

use cgmath::Point3;
use flow_preview::{
    PreviewError,
    camera::{Camera, Projection},
    data_structures::scene::{Color, Scene},
    flow::{FrameScheduler, RenderTarget},
    resources::fetch::ArchiveFetcher,
};
use futures::future::LocalBoxFuture;
use zip::write::SimpleFileOptions;

/// What a [`MockFetcher`] answers with.
pub enum Reply {
    Archive(Vec<u8>),
    /// No response headers ever arrived.
    Abort,
    /// Headers arrived with this status.
    Status(u16),
}

pub struct MockFetcher {
    reply: Reply,
    requests: RefCell<Vec<String>>,
}

impl MockFetcher {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl ArchiveFetcher for MockFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, PreviewError>> {
        self.requests.borrow_mut().push(url.to_string());
        Box::pin(async move {
            match &self.reply {
                Reply::Archive(bytes) => Ok(bytes.clone()),
                Reply::Abort => Err(PreviewError::Aborted),
                Reply::Status(status) => Err(PreviewError::Status {
                    url: url.to_string(),
                    status: *status,
                }),
            }
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DrawRecord {
    pub background: Color,
    pub objects: usize,
    pub camera: Point3<f32>,
    pub aspect: f32,
}

#[derive(Debug, Default)]
pub struct DrawLog {
    pub draws: Vec<DrawRecord>,
    pub resizes: Vec<(u32, u32)>,
}

/// Render target that remembers every draw. The log is shared so it can be
/// inspected after the target was moved into a loop, or dropped with it.
pub struct RecordingTarget {
    size: (u32, u32),
    pub log: Rc<RefCell<DrawLog>>,
}

impl RecordingTarget {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            log: Rc::default(),
        }
    }
}

impl RenderTarget for RecordingTarget {
    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn set_surface_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.log.borrow_mut().resizes.push((width, height));
    }

    fn draw(&mut self, scene: &Scene, camera: &Camera, projection: &Projection) {
        self.log.borrow_mut().draws.push(DrawRecord {
            background: scene.background,
            objects: scene.objects().len(),
            camera: camera.position,
            aspect: projection.aspect(),
        });
    }
}

/// Counts frame requests instead of calling back.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    pub requests: Rc<Cell<usize>>,
}

impl FrameScheduler for ManualScheduler {
    fn schedule(&mut self) {
        self.requests.set(self.requests.get() + 1);
    }
}

pub fn zip_of(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn png_bytes(rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba(rgba));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// A textured quad spanning (0, 0, 0) to (2, 4, 6).
pub const QUAD_OBJ: &str = "\
mtllib model.mtl
o quad
v 0 0 0
v 2 0 0
v 2 4 6
v 0 4 6
vt 0 0
vt 1 0
vt 1 1
vt 0 1
usemtl wood
f 1/1 2/2 3/3 4/4
";

pub const WOOD_MTL: &str = "\
newmtl wood
Kd 1 1 1
map_Kd C:\\exports\\textures\\wood.png
";

pub fn textured_quad_archive() -> Vec<u8> {
    let png = png_bytes([120, 80, 40, 255]);
    zip_of(&[
        ("model.obj", QUAD_OBJ.as_bytes()),
        ("model.mtl", WOOD_MTL.as_bytes()),
        ("wood.png", &png),
    ])
}

pub fn assert_close(actual: Point3<f32>, expected: [f32; 3]) {
    let close = |a: f32, b: f32| (a - b).abs() < 1e-4;
    assert!(
        close(actual.x, expected[0]) && close(actual.y, expected[1]) && close(actual.z, expected[2]),
        "{actual:?} is not close to {expected:?}"
    );
}
