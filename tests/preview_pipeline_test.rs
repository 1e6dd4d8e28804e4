use flow_preview::{
    MountPoint, PreviewConfig, PreviewContext, PreviewError, PreviewOutcome,
    camera::controls::OrbitControls,
    flow::{LoopState, ViewportState},
    load_preview, run_preview,
};
use futures::executor::block_on;

use crate::common::test_utils::{
    ManualScheduler, MockFetcher, RecordingTarget, Reply, assert_close, textured_quad_archive, zip_of,
};

mod common;

fn context(config: &PreviewConfig) -> PreviewContext {
    PreviewContext::new(config, ViewportState::fixed(640, 480))
}

#[test]
fn textured_model_is_framed_and_kept_rendering() {
    let config = PreviewConfig::default();
    let fetcher = MockFetcher::new(Reply::Archive(textured_quad_archive()));
    let target = RecordingTarget::new(1, 1);
    let log = target.log.clone();
    let scheduler = ManualScheduler::default();
    let requests = scheduler.requests.clone();

    let url = MountPoint::parse("render-pane12.3").unwrap().url(&config.api_root);
    let mut render_loop = block_on(run_preview(
        context(&config),
        &fetcher,
        &url,
        target,
        OrbitControls::new(&config.controls),
        scheduler,
    ))
    .expect("a loaded preview keeps rendering");

    assert_eq!(fetcher.requests(), vec!["/api/model/12/3".to_string()]);
    assert_eq!(render_loop.state(), LoopState::Running);

    let scene = &render_loop.context().scene;
    assert_eq!(scene.background, config.sky_color);
    assert_eq!(scene.objects().len(), 1);
    let model = &scene.objects()[0];
    assert_close(cgmath::Point3::new(model.position.x, model.position.y, model.position.z), [-1.0, -2.0, -3.0]);

    let material = model.children[0].material.as_ref().expect("quad uses the wood material");
    let texture = material.diffuse_map.as_ref().expect("wood.png resolved from the archive");
    assert!(!texture.url().is_empty());
    assert!(texture.is_loaded());

    // Eye at position + extent * 0.9
    assert_close(render_loop.context().camera.position, [0.8, 1.6, 2.4]);

    assert_eq!(render_loop.run_frames(3), 3);
    let log = log.borrow();
    // Initial sky, the first loop frame, then three more.
    assert_eq!(log.draws.len(), 5);
    assert_eq!(log.draws[0].objects, 0);
    assert_close(log.draws[0].camera, [0.0, 0.0, 5.0]);
    assert!(log.draws[1..].iter().all(|d| d.objects == 1 && d.background == config.sky_color));
    assert_eq!(log.resizes, vec![(640, 480)]);
    assert_eq!(requests.get(), 4);
}

#[test]
fn server_errors_show_the_failure_colour_and_keep_the_loop() {
    let config = PreviewConfig::default();
    let fetcher = MockFetcher::new(Reply::Status(500));
    let target = RecordingTarget::new(640, 480);
    let log = target.log.clone();

    let mut render_loop = block_on(run_preview(
        context(&config),
        &fetcher,
        "/api/model/1/1",
        target,
        (),
        ManualScheduler::default(),
    ))
    .expect("failed previews still render");

    assert!(render_loop.context().scene.is_empty());
    assert_eq!(render_loop.context().scene.background, config.failure_color);
    assert_eq!(render_loop.run_frames(2), 2);
    assert!(render_loop.frames() > 0);

    let log = log.borrow();
    assert_eq!(log.draws[0].background, config.sky_color);
    assert!(log.draws[1..].iter().all(|d| d.background == config.failure_color && d.objects == 0));
    assert!(log.resizes.is_empty());
}

#[test]
fn aborted_downloads_stop_after_the_initial_frame() {
    let config = PreviewConfig::default();
    let fetcher = MockFetcher::new(Reply::Abort);
    let target = RecordingTarget::new(640, 480);
    let log = target.log.clone();
    let scheduler = ManualScheduler::default();
    let requests = scheduler.requests.clone();

    let render_loop = block_on(run_preview(
        context(&config),
        &fetcher,
        "/api/model/1/1",
        target,
        (),
        scheduler,
    ));

    assert!(render_loop.is_none());
    let log = log.borrow();
    assert_eq!(log.draws.len(), 1);
    assert_eq!(log.draws[0].objects, 0);
    assert_eq!(log.draws[0].background, config.sky_color);
    assert_eq!(requests.get(), 0);
}

#[test]
fn corrupt_archives_degrade() {
    let config = PreviewConfig::default();
    let mut ctx = context(&config);
    let fetcher = MockFetcher::new(Reply::Archive(b"PK but not really".to_vec()));

    let outcome = block_on(load_preview(&mut ctx, &fetcher, "/api/model/1/1"));

    assert!(matches!(outcome, PreviewOutcome::Degraded(PreviewError::Archive(_))));
    assert!(outcome.starts_loop());
    assert_eq!(ctx.scene.background, config.failure_color);
    assert!(ctx.scene.is_empty());
}

#[test]
fn archive_without_geometry_shows_an_empty_model() {
    let config = PreviewConfig::default();
    let mut ctx = context(&config);
    let archive = zip_of(&[("readme.txt", b"no model here")]);
    let fetcher = MockFetcher::new(Reply::Archive(archive));

    let outcome = block_on(load_preview(&mut ctx, &fetcher, "/api/model/1/1"));

    assert!(matches!(outcome, PreviewOutcome::Loaded));
    assert_eq!(ctx.scene.background, config.sky_color);
    assert_eq!(ctx.scene.objects().len(), 1);
    assert_eq!(ctx.scene.objects()[0].vertex_count(), 0);
    assert_close(ctx.camera.position, [0.0, 0.0, 1.0]);
}

#[test]
fn previews_do_not_share_state() {
    let config = PreviewConfig::default();
    let good = MockFetcher::new(Reply::Archive(textured_quad_archive()));
    let bad = MockFetcher::new(Reply::Status(404));
    let mut first = context(&config);
    let mut second = context(&config);

    block_on(load_preview(&mut first, &good, "/api/model/1/1"));
    block_on(load_preview(&mut second, &bad, "/api/model/2/1"));

    assert_eq!(first.scene.background, config.sky_color);
    assert_eq!(first.scene.objects().len(), 1);
    assert_eq!(second.scene.background, config.failure_color);
    assert!(second.scene.is_empty());
}

#[tokio::test]
async fn archives_are_read_from_disk_by_url() {
    use flow_preview::{preview::model_url, resources::fetch::FileFetcher};

    let root = std::env::temp_dir().join(format!("flow-preview-{}", std::process::id()));
    let dir = root.join("api/model/7");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("2"), textured_quad_archive()).unwrap();

    let config = PreviewConfig::default();
    let fetcher = FileFetcher::new(&root);
    let mut ctx = context(&config);
    let outcome = load_preview(&mut ctx, &fetcher, &model_url(&config.api_root, "7", "2")).await;
    assert!(matches!(outcome, PreviewOutcome::Loaded));
    assert_eq!(ctx.scene.objects().len(), 1);

    let mut missing = context(&config);
    let outcome = load_preview(&mut missing, &fetcher, &model_url(&config.api_root, "7", "3")).await;
    assert!(matches!(
        outcome,
        PreviewOutcome::Degraded(PreviewError::Status { status: 404, .. })
    ));

    std::fs::remove_dir_all(&root).unwrap();
}
