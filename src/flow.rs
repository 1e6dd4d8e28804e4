//! Frame loop of a preview.
//!
//! A [`RenderLoop`] owns everything one preview needs between frames and is
//! driven by a host scheduler: `requestAnimationFrame` in the browser, redraw
//! requests in the desktop viewer and a manual scheduler in tests.
//!
//! # Lifecycle
//!
//! The loop starts [`LoopState::Idle`]. [`RenderLoop::start`] moves it to
//! [`LoopState::Running`] once and draws the first frame. Every frame after that:
//! 1. Asks the scheduler for the next frame before doing any work
//! 2. Syncs the drawing surface with the viewport, updating the projection on change
//! 3. Advances the camera controls
//! 4. Draws the scene once
//!
//! Nothing inside the loop ends it. The owner cancels it through its
//! [`CancellationFlag`] when the host element goes away.

use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::{
    camera::{Camera, Projection, controls::Controls},
    data_structures::scene::Scene,
    preview::PreviewContext,
};

/// Host primitive that calls back into the loop for the next frame.
pub trait FrameScheduler {
    fn schedule(&mut self);
}

/// Anything a scene can be drawn to.
pub trait RenderTarget {
    /// Current size of the drawing surface in pixels.
    fn surface_size(&self) -> (u32, u32);
    fn set_surface_size(&mut self, width: u32, height: u32);
    fn draw(&mut self, scene: &Scene, camera: &Camera, projection: &Projection);
}

/// Reports the logical size of the element hosting a preview.
pub trait ViewportSource {
    /// `None` while the host has no layout yet.
    fn viewport_size(&self) -> Option<(u32, u32)>;
}

impl<F: Fn() -> Option<(u32, u32)>> ViewportSource for F {
    fn viewport_size(&self) -> Option<(u32, u32)> {
        self()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Sizing {
    /// Sized by the caller, host size changes are ignored.
    Fixed,
    /// Tracks the host element's size every frame.
    #[default]
    FollowHost,
}

/// Logical size the preview should have. Only the loop changes it.
///
/// Each axis is sized on its own, so an explicit width can sit next to a
/// height that follows the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewportState {
    pub width: u32,
    pub height: u32,
    pub width_sizing: Sizing,
    pub height_sizing: Sizing,
}

impl ViewportState {
    pub fn fixed(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            width_sizing: Sizing::Fixed,
            height_sizing: Sizing::Fixed,
        }
    }

    pub fn follow_host(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            width_sizing: Sizing::FollowHost,
            height_sizing: Sizing::FollowHost,
        }
    }

    /// Explicit dimensions stay fixed, missing ones start at `host` and follow it.
    pub fn with_overrides(width: Option<u32>, height: Option<u32>, host: (u32, u32)) -> Self {
        let axis = |explicit: Option<u32>, host: u32| match explicit {
            Some(size) => (size, Sizing::Fixed),
            None => (host, Sizing::FollowHost),
        };
        let (width, width_sizing) = axis(width, host.0);
        let (height, height_sizing) = axis(height, host.1);
        Self {
            width,
            height,
            width_sizing,
            height_sizing,
        }
    }

    pub fn follows_host(&self) -> bool {
        self.width_sizing == Sizing::FollowHost || self.height_sizing == Sizing::FollowHost
    }

    /// Take the host's size on every axis that follows it.
    pub fn follow(&mut self, (width, height): (u32, u32)) {
        if self.width_sizing == Sizing::FollowHost {
            self.width = width;
        }
        if self.height_sizing == Sizing::FollowHost {
            self.height = height;
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
}

/// Outcome of one [`RenderLoop::frame`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Frame {
    Drawn { resized: bool },
    /// Cancelled, or not started. Nothing was scheduled.
    Stopped,
}

/// Shared stop switch of a loop, checked at the top of every frame.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub struct RenderLoop<T, C, S> {
    ctx: PreviewContext,
    target: T,
    controls: C,
    scheduler: S,
    host: Option<Box<dyn ViewportSource>>,
    state: LoopState,
    cancel: CancellationFlag,
    frames: u64,
    resizes: u64,
}

impl<T, C, S> Debug for RenderLoop<T, C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderLoop")
            .field("state", &self.state)
            .field("viewport", &self.ctx.viewport)
            .field("frames", &self.frames)
            .field("resizes", &self.resizes)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl<T: RenderTarget, C: Controls, S: FrameScheduler> RenderLoop<T, C, S> {
    pub fn new(ctx: PreviewContext, target: T, controls: C, scheduler: S) -> Self {
        Self {
            ctx,
            target,
            controls,
            scheduler,
            host: None,
            state: LoopState::Idle,
            cancel: CancellationFlag::default(),
            frames: 0,
            resizes: 0,
        }
    }

    /// Source of host sizes for [`Sizing::FollowHost`] viewports.
    pub fn with_viewport_source(mut self, source: impl ViewportSource + 'static) -> Self {
        self.host = Some(Box::new(source));
        self
    }

    /// Idle to running, then the first frame. Returns `false` if the loop had already started.
    pub fn start(&mut self) -> bool {
        if self.state == LoopState::Running {
            log::warn!("render loop started twice, ignoring");
            return false;
        }
        self.state = LoopState::Running;
        log::debug!("render loop running at {:?}", self.ctx.viewport.size());
        self.frame();
        true
    }

    pub fn frame(&mut self) -> Frame {
        if self.state != LoopState::Running || self.cancel.is_cancelled() {
            return Frame::Stopped;
        }
        // Schedule first, so a slow frame never loses the next one.
        self.scheduler.schedule();

        let resized = self.sync_surface();
        self.controls.update(&mut self.ctx.camera);
        self.target.draw(&self.ctx.scene, &self.ctx.camera, &self.ctx.projection);
        self.frames += 1;
        Frame::Drawn { resized }
    }

    /// Drive up to `n` frames without a host clock. Returns how many were drawn.
    pub fn run_frames(&mut self, n: usize) -> usize {
        (0..n).take_while(|_| self.frame() != Frame::Stopped).count()
    }

    fn sync_surface(&mut self) -> bool {
        if self.ctx.viewport.follows_host() {
            if let Some(host_size) = self.host.as_ref().and_then(|host| host.viewport_size()) {
                self.ctx.viewport.follow(host_size);
            }
        }
        let (width, height) = self.ctx.viewport.size();
        if width == 0 || height == 0 || self.target.surface_size() == (width, height) {
            return false;
        }
        log::debug!("resizing surface from {:?} to {:?}", self.target.surface_size(), (width, height));
        self.target.set_surface_size(width, height);
        self.ctx.projection.resize(width, height);
        self.resizes += 1;
        true
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn resizes(&self) -> u64 {
        self.resizes
    }

    pub fn context(&self) -> &PreviewContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut PreviewContext {
        &mut self.ctx
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn controls_mut(&mut self) -> &mut C {
        &mut self.controls
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use crate::{config::PreviewConfig, data_structures::scene::Color};

    #[derive(Default)]
    struct Surface {
        size: (u32, u32),
        resizes: Vec<(u32, u32)>,
        draws: Vec<Color>,
    }

    impl RenderTarget for Surface {
        fn surface_size(&self) -> (u32, u32) {
            self.size
        }

        fn set_surface_size(&mut self, width: u32, height: u32) {
            self.size = (width, height);
            self.resizes.push((width, height));
        }

        fn draw(&mut self, scene: &Scene, _camera: &Camera, _projection: &Projection) {
            self.draws.push(scene.background);
        }
    }

    #[derive(Default)]
    struct Ticks(Rc<Cell<usize>>);

    impl FrameScheduler for Ticks {
        fn schedule(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn running_loop(surface: (u32, u32), viewport: ViewportState) -> RenderLoop<Surface, (), Ticks> {
        let ctx = PreviewContext::new(&PreviewConfig::default(), viewport);
        let mut render_loop = RenderLoop::new(
            ctx,
            Surface {
                size: surface,
                ..Default::default()
            },
            (),
            Ticks::default(),
        );
        render_loop.start();
        render_loop
    }

    #[test]
    fn first_frame_resizes_then_stays_put() {
        let mut render_loop = running_loop((640, 480), ViewportState::fixed(800, 600));
        assert_eq!(render_loop.target().size, (800, 600));
        assert_eq!(render_loop.target().resizes, vec![(800, 600)]);
        assert_eq!(render_loop.context().projection.aspect(), 800.0 / 600.0);

        assert_eq!(render_loop.frame(), Frame::Drawn { resized: false });
        assert_eq!(render_loop.target().resizes.len(), 1);
        assert_eq!(render_loop.resizes(), 1);
    }

    #[test]
    fn host_size_changes_are_followed() {
        let host = Rc::new(Cell::new((300, 200)));
        let source = host.clone();
        let ctx = PreviewContext::new(&PreviewConfig::default(), ViewportState::follow_host(300, 200));
        let mut render_loop = RenderLoop::new(ctx, Surface::default(), (), Ticks::default())
            .with_viewport_source(move || Some(source.get()));
        render_loop.start();
        assert_eq!(render_loop.target().size, (300, 200));

        host.set((500, 250));
        assert_eq!(render_loop.frame(), Frame::Drawn { resized: true });
        assert_eq!(render_loop.context().viewport.size(), (500, 250));
        assert_eq!(render_loop.context().projection.aspect(), 2.0);
    }

    #[test]
    fn fixed_viewports_ignore_the_host() {
        let ctx = PreviewContext::new(&PreviewConfig::default(), ViewportState::fixed(320, 240));
        let mut render_loop = RenderLoop::new(ctx, Surface::default(), (), Ticks::default())
            .with_viewport_source(|| Some((1000, 1000)));
        render_loop.start();
        render_loop.run_frames(3);
        assert_eq!(render_loop.target().resizes, vec![(320, 240)]);
    }

    #[test]
    fn explicit_dimensions_survive_host_changes() {
        let host = Rc::new(Cell::new((640, 480)));
        let source = host.clone();
        let viewport = ViewportState::with_overrides(Some(300), None, host.get());
        assert_eq!(viewport.size(), (300, 480));
        let ctx = PreviewContext::new(&PreviewConfig::default(), viewport);
        let mut render_loop = RenderLoop::new(ctx, Surface::default(), (), Ticks::default())
            .with_viewport_source(move || Some(source.get()));
        render_loop.start();
        assert_eq!(render_loop.target().size, (300, 480));

        host.set((1024, 200));
        render_loop.run_frames(2);
        assert_eq!(render_loop.context().viewport.size(), (300, 200));
        assert_eq!(render_loop.target().resizes, vec![(300, 480), (300, 200)]);
        assert_eq!(render_loop.context().projection.aspect(), 1.5);
    }

    #[test]
    fn every_frame_schedules_the_next_one() {
        let mut render_loop = running_loop((10, 10), ViewportState::fixed(10, 10));
        assert_eq!(render_loop.run_frames(4), 4);
        assert_eq!(render_loop.scheduler().0.get(), 5);
        assert_eq!(render_loop.frames(), 5);
        assert_eq!(render_loop.target().draws.len(), 5);
    }

    #[test]
    fn next_frame_is_requested_before_drawing() {
        struct Logged(Rc<std::cell::RefCell<Vec<&'static str>>>);
        impl FrameScheduler for Logged {
            fn schedule(&mut self) {
                self.0.borrow_mut().push("schedule");
            }
        }
        impl RenderTarget for Logged {
            fn surface_size(&self) -> (u32, u32) {
                (10, 10)
            }
            fn set_surface_size(&mut self, _width: u32, _height: u32) {}
            fn draw(&mut self, _scene: &Scene, _camera: &Camera, _projection: &Projection) {
                self.0.borrow_mut().push("draw");
            }
        }

        let log = Rc::new(std::cell::RefCell::new(Vec::new()));
        let ctx = PreviewContext::new(&PreviewConfig::default(), ViewportState::fixed(10, 10));
        let mut render_loop = RenderLoop::new(ctx, Logged(log.clone()), (), Logged(log.clone()));
        render_loop.start();
        render_loop.frame();
        assert_eq!(*log.borrow(), vec!["schedule", "draw", "schedule", "draw"]);
    }

    #[test]
    fn idle_loops_do_not_draw() {
        let ctx = PreviewContext::new(&PreviewConfig::default(), ViewportState::fixed(10, 10));
        let mut render_loop = RenderLoop::new(ctx, Surface::default(), (), Ticks::default());
        assert_eq!(render_loop.state(), LoopState::Idle);
        assert_eq!(render_loop.frame(), Frame::Stopped);
        assert!(render_loop.start());
        assert!(!render_loop.start());
        assert_eq!(render_loop.frames(), 1);
    }

    #[test]
    fn cancelled_loops_stop_scheduling() {
        let mut render_loop = running_loop((10, 10), ViewportState::fixed(10, 10));
        render_loop.cancellation().cancel();
        assert_eq!(render_loop.run_frames(10), 0);
        assert_eq!(render_loop.scheduler().0.get(), 1);
    }

    #[test]
    fn zero_sized_viewports_leave_the_surface_alone() {
        let mut render_loop = running_loop((64, 64), ViewportState::fixed(0, 480));
        assert!(render_loop.target().resizes.is_empty());
        assert_eq!(render_loop.frames(), 1);
    }
}
