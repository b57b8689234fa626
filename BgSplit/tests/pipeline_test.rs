use std::collections::BTreeSet;
use std::sync::Arc;

use bgsplit::host::memory::{
    MemoryImageSource, MemoryParticipantStore, MemorySceneStore, MemoryStorage, RecordingNotifier,
};
use bgsplit::prelude::*;
use bgsplit::scene::SceneRect;
use image::{DynamicImage, Rgba, RgbaImage};
use pretty_assertions::assert_eq;

const BG: &str = "maps/dungeon.png";

struct Fixture {
    participants: Arc<MemoryParticipantStore>,
    images: Arc<MemoryImageSource>,
    storage: Arc<MemoryStorage>,
    scenes: Arc<MemorySceneStore>,
    notifier: Arc<RecordingNotifier>,
    splitter: Splitter,
    scene: SceneId,
}

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    }))
}

fn fixture(width: u32, height: u32) -> Fixture {
    let participants = Arc::new(MemoryParticipantStore::new());
    let images = Arc::new(MemoryImageSource::new());
    let storage = Arc::new(MemoryStorage::new());
    let scenes = Arc::new(MemorySceneStore::new());
    let notifier = Arc::new(RecordingNotifier::new());

    images.insert(BG, gradient(width, height));
    let mut scene = Scene::new("scene1", width, height, Some(BG.to_string()));
    scene.scene_rect = SceneRect {
        x: 250,
        y: 100,
        width,
        height,
    };
    scenes.insert(scene);

    let host = Host {
        participants: participants.clone(),
        images: images.clone(),
        storage: storage.clone(),
        scenes: scenes.clone(),
        notifier: notifier.clone(),
    };
    let config = SplitterConfig {
        format: TileFormat::Png,
        ..SplitterConfig::for_world("test-world")
    };
    let splitter = Splitter::new(config, host).unwrap();

    Fixture {
        participants,
        images,
        storage,
        scenes,
        notifier,
        splitter,
        scene: SceneId::new("scene1"),
    }
}

impl Fixture {
    async fn report(&self, participant: &str, limit: u32) {
        self.splitter
            .report_capability(&ParticipantId::new(participant), limit)
            .await
            .unwrap();
    }

    fn gm_update(&self) -> BackgroundUpdate {
        BackgroundUpdate {
            scene: self.scene.clone(),
            new_src: Some(BG.to_string()),
            actor: Actor {
                participant: ParticipantId::new("gm"),
                privileged: true,
            },
        }
    }

    fn tile_ids(&self) -> BTreeSet<String> {
        self.scenes
            .document(&self.scene)
            .unwrap()
            .tiles
            .iter()
            .map(|t| t.id.to_string())
            .collect()
    }

    fn background(&self) -> Option<String> {
        self.scenes.document(&self.scene).unwrap().scene.background
    }
}

fn expect_split(outcome: SplitOutcome) -> SplitReport {
    match outcome {
        SplitOutcome::Split(report) => report,
        SplitOutcome::Skipped(reason) => panic!("expected a split, got {reason:?}"),
    }
}

#[tokio::test]
async fn test_oversized_background_is_split() {
    let fx = fixture(100, 80);
    fx.report("gm", 64).await;
    fx.report("player", 40).await;

    let report = expect_split(fx.splitter.handle_background_update(&fx.gm_update()).await.unwrap());

    // ceiling floor(40 * 0.95) = 38 -> 3 columns, 3 rows
    assert_eq!(report.limit, 40);
    assert_eq!((report.cols, report.rows), (3, 3));
    assert_eq!(report.tile_count(), 9);
    assert_eq!(report.removed, 0);
    assert_eq!(fx.background(), None);

    let doc = fx.scenes.document(&fx.scene).unwrap();
    let placements: Vec<(i64, i64, u32, u32)> = doc
        .tiles
        .iter()
        .map(|t| (t.x, t.y, t.width, t.height))
        .collect();
    assert_eq!(
        placements,
        vec![
            (250, 100, 33, 26),
            (283, 100, 33, 26),
            (316, 100, 34, 26),
            (250, 126, 33, 27),
            (283, 126, 33, 27),
            (316, 126, 34, 27),
            (250, 153, 33, 27),
            (283, 153, 33, 27),
            (316, 153, 34, 27),
        ]
    );

    let first = &doc.tiles[0];
    assert_eq!(first.id.as_str(), "split-bg-scene1-0-0");
    assert_eq!(
        first.texture.src,
        "worlds/test-world/assets/bg-tiles/split-bg-scene1-0-0.png"
    );
    assert!(first.is_generated("bg-texture-size-fix"));

    assert!(fx.storage.has_directory("data", "worlds/test-world/assets/bg-tiles"));
    assert_eq!(fx.storage.paths().len(), 9);

    let last = fx
        .storage
        .blob("data:worlds/test-world/assets/bg-tiles/split-bg-scene1-2-2.png")
        .unwrap();
    let decoded = image::load_from_memory(&last).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (34, 27));

    let success = fx.notifier.at_level(NotifyLevel::Success);
    assert_eq!(
        success,
        vec!["bg-texture-size-fix | Background successfully split into 9 tiles (3x3).".to_string()]
    );
}

#[tokio::test]
async fn test_background_that_fits_is_left_alone() {
    let fx = fixture(2048, 2048);
    fx.report("gm", 4096).await;

    let outcome = fx.splitter.handle_background_update(&fx.gm_update()).await.unwrap();
    assert_eq!(
        outcome,
        SplitOutcome::Skipped(SkipReason::FitsWithinLimit {
            width: 2048,
            height: 2048,
            limit: 4096
        })
    );
    assert_eq!(fx.background(), Some(BG.to_string()));
    assert!(fx.tile_ids().is_empty());
    assert!(fx.storage.paths().is_empty());
}

#[tokio::test]
async fn test_no_reported_capability_aborts_without_mutation() {
    let fx = fixture(100, 80);
    fx.participants.add_participant("gm");

    let outcome = fx.splitter.handle_background_update(&fx.gm_update()).await.unwrap();
    assert_eq!(outcome, SplitOutcome::Skipped(SkipReason::NoCapabilityData));

    assert_eq!(fx.notifier.at_level(NotifyLevel::Warning).len(), 1);
    assert_eq!(fx.images.load_count(), 0);
    assert_eq!(fx.background(), Some(BG.to_string()));
    assert!(fx.tile_ids().is_empty());
}

#[tokio::test]
async fn test_unprivileged_actor_is_ignored() {
    let fx = fixture(100, 80);
    fx.report("player", 40).await;

    let mut event = fx.gm_update();
    event.actor = Actor {
        participant: ParticipantId::new("player"),
        privileged: false,
    };
    let outcome = fx.splitter.handle_background_update(&event).await.unwrap();
    assert_eq!(outcome, SplitOutcome::Skipped(SkipReason::NotPrivileged));
    assert_eq!(fx.images.load_count(), 0);
}

#[tokio::test]
async fn test_update_without_background_is_ignored() {
    let fx = fixture(100, 80);
    fx.report("gm", 40).await;

    let mut event = fx.gm_update();
    event.new_src = None;
    let outcome = fx.splitter.handle_background_update(&event).await.unwrap();
    assert_eq!(outcome, SplitOutcome::Skipped(SkipReason::NoBackground));
}

#[tokio::test]
async fn test_fix_background_falls_back_to_scene_background() {
    let fx = fixture(100, 80);
    fx.report("gm", 40).await;

    let report = expect_split(fx.splitter.fix_background(&fx.scene, None).await.unwrap());
    assert_eq!(report.tile_count(), 9);
}

#[tokio::test]
async fn test_image_load_failure() {
    let fx = fixture(100, 80);
    fx.report("gm", 40).await;

    let mut event = fx.gm_update();
    event.new_src = Some("maps/missing.webp".to_string());
    let err = fx.splitter.handle_background_update(&event).await.unwrap_err();

    assert!(matches!(err, Error::ImageLoad { .. }));
    assert_eq!(fx.notifier.at_level(NotifyLevel::Error).len(), 1);
    assert_eq!(fx.background(), Some(BG.to_string()));
    assert!(fx.tile_ids().is_empty());
}

#[tokio::test]
async fn test_resplit_replaces_previous_generation() {
    let fx = fixture(100, 80);
    fx.report("gm", 40).await;

    let first = expect_split(fx.splitter.handle_background_update(&fx.gm_update()).await.unwrap());
    let first_ids = fx.tile_ids();

    // Setting the background again re-triggers the split
    fx.scenes.set_background(&fx.scene, Some(BG.to_string())).await.unwrap();
    let second = expect_split(fx.splitter.handle_background_update(&fx.gm_update()).await.unwrap());

    assert_eq!((first.cols, first.rows), (second.cols, second.rows));
    assert_eq!(second.removed, 9);
    assert_eq!(fx.tile_ids(), first_ids);
    assert_eq!(fx.scenes.document(&fx.scene).unwrap().tiles.len(), 9);
    assert_eq!(fx.storage.paths().len(), 9);
}

#[tokio::test]
async fn test_user_tiles_survive_resplit() {
    let fx = fixture(100, 80);
    fx.report("gm", 40).await;
    expect_split(fx.splitter.handle_background_update(&fx.gm_update()).await.unwrap());

    let mut user_tile = fx.scenes.document(&fx.scene).unwrap().tiles[0].clone();
    user_tile.id = TileId::new("hand-placed");
    user_tile.flags.clear();
    fx.scenes.insert_tile(&fx.scene, user_tile);

    expect_split(fx.splitter.handle_background_update(&fx.gm_update()).await.unwrap());
    let ids = fx.tile_ids();
    assert_eq!(ids.len(), 10);
    assert!(ids.contains("hand-placed"));
}

#[tokio::test]
async fn test_existing_directory_is_not_an_error() {
    let fx = fixture(100, 80);
    fx.report("gm", 40).await;
    fx.storage
        .create_directory("data", "worlds/test-world/assets/bg-tiles")
        .await
        .unwrap();

    let report = expect_split(fx.splitter.handle_background_update(&fx.gm_update()).await.unwrap());
    assert_eq!(report.tile_count(), 9);
}

#[tokio::test]
async fn test_directory_failure_aborts_before_tiles() {
    let fx = fixture(100, 80);
    fx.report("gm", 40).await;
    fx.storage.fail_create_directory("EACCES: permission denied");

    let err = fx.splitter.handle_background_update(&fx.gm_update()).await.unwrap_err();
    assert!(matches!(err, Error::DirectoryCreate { .. }));
    assert!(fx.storage.paths().is_empty());
    assert!(fx.tile_ids().is_empty());
    assert_eq!(fx.background(), Some(BG.to_string()));
}

#[tokio::test]
async fn test_upload_failure_rolls_back_uploaded_blobs() {
    let fx = fixture(100, 80);
    fx.report("gm", 40).await;
    fx.storage.fail_uploads_after(4);

    let err = fx.splitter.handle_background_update(&fx.gm_update()).await.unwrap_err();
    assert!(matches!(err, Error::Upload { .. }), "{err}");
    assert!(fx.storage.paths().is_empty());
    assert!(fx.tile_ids().is_empty());
    assert_eq!(fx.background(), Some(BG.to_string()));
}

#[tokio::test]
async fn test_tile_creation_failure_rolls_back() {
    let fx = fixture(100, 80);
    fx.report("gm", 40).await;
    fx.scenes.fail_create_tiles(true);

    let err = fx.splitter.handle_background_update(&fx.gm_update()).await.unwrap_err();
    assert!(matches!(err, Error::SceneStore { .. }));
    assert!(fx.storage.paths().is_empty());
    assert!(fx.tile_ids().is_empty());
}

#[tokio::test]
async fn test_background_clear_failure_removes_created_tiles() {
    let fx = fixture(100, 80);
    fx.report("gm", 40).await;
    fx.scenes.fail_set_background(true);

    let err = fx.splitter.handle_background_update(&fx.gm_update()).await.unwrap_err();
    assert!(matches!(err, Error::SceneStore { .. }));
    assert!(fx.tile_ids().is_empty());
    assert!(fx.storage.paths().is_empty());
    assert_eq!(fx.background(), Some(BG.to_string()));
}

#[tokio::test]
async fn test_dimension_mismatch_warns_and_continues() {
    let fx = fixture(100, 80);
    fx.report("gm", 40).await;
    fx.images.insert("maps/bigger.png", gradient(120, 80));

    let mut event = fx.gm_update();
    event.new_src = Some("maps/bigger.png".to_string());
    let report = expect_split(fx.splitter.handle_background_update(&event).await.unwrap());

    assert_eq!(report.cols, 4);
    let warnings = fx.notifier.at_level(NotifyLevel::Warning);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("Scene dims (100x80) != image (120x80)"));
}

#[tokio::test]
async fn test_limit_too_small_for_padding() {
    let fx = fixture(100, 80);
    fx.report("gm", 1).await;

    let err = fx.splitter.handle_background_update(&fx.gm_update()).await.unwrap_err();
    assert!(matches!(err, Error::CapacityTooSmall { limit: 1, .. }));
    assert!(fx.tile_ids().is_empty());
    assert_eq!(fx.background(), Some(BG.to_string()));
}

#[tokio::test]
async fn test_cleanup_failure_is_reported() {
    let fx = fixture(100, 80);
    fx.report("gm", 40).await;
    expect_split(fx.splitter.handle_background_update(&fx.gm_update()).await.unwrap());
    let first_ids = fx.tile_ids();

    fx.scenes.set_background(&fx.scene, Some(BG.to_string())).await.unwrap();
    fx.scenes.fail_delete_tiles(true);
    let err = fx.splitter.handle_background_update(&fx.gm_update()).await.unwrap_err();

    assert!(matches!(err, Error::SceneStore { .. }));
    let errors = fx.notifier.at_level(NotifyLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("Failed to remove old background tiles"));
    assert_eq!(fx.tile_ids(), first_ids);
    assert_eq!(fx.background(), Some(BG.to_string()));
}
