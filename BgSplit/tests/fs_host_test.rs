use std::sync::Arc;

use bgsplit::host::fs::{FsImageSource, FsTileStorage, JsonParticipantStore, JsonSceneStore};
use bgsplit::prelude::*;
use image::{Rgb, RgbImage};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

#[tokio::test]
async fn test_split_on_local_directory() {
    let dir = tempdir().unwrap();
    let root = dir.path();

    let background = RgbImage::from_fn(90, 70, |x, y| Rgb([x as u8, y as u8, 200]));
    background.save(root.join("map.png")).unwrap();

    let storage = Arc::new(FsTileStorage::new(root));
    let scenes = Arc::new(JsonSceneStore::new(root.join("scene.json")));
    scenes
        .upsert_scene(Scene::new("tavern", 90, 70, Some("map.png".to_string())))
        .await
        .unwrap();

    let host = Host {
        participants: Arc::new(JsonParticipantStore::new(root.join("participants.json"))),
        images: Arc::new(FsImageSource::new(root)),
        storage: storage.clone(),
        scenes: scenes.clone(),
        notifier: Arc::new(TracingNotifier),
    };
    let splitter = Splitter::new(SplitterConfig::for_world("local"), host).unwrap();
    splitter
        .report_capability(&ParticipantId::new("gm"), 40)
        .await
        .unwrap();

    let outcome = splitter
        .fix_background(&SceneId::new("tavern"), None)
        .await
        .unwrap();
    let SplitOutcome::Split(report) = outcome else {
        panic!("expected a split, got {outcome:?}");
    };
    assert_eq!((report.cols, report.rows), (3, 2));

    let scene = scenes.scene(&SceneId::new("tavern")).await.unwrap();
    assert_eq!(scene.background, None);

    let tiles = scenes.tiles(&SceneId::new("tavern")).await.unwrap();
    assert_eq!(tiles.len(), 6);
    for tile in &tiles {
        let file = storage.resolve("data", &tile.texture.src);
        let decoded = image::open(&file).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (tile.width, tile.height));
    }

    // Running again replaces the tiles in place
    scenes
        .set_background(&SceneId::new("tavern"), Some("map.png".to_string()))
        .await
        .unwrap();
    let outcome = splitter
        .fix_background(&SceneId::new("tavern"), None)
        .await
        .unwrap();
    let SplitOutcome::Split(report) = outcome else {
        panic!("expected a split, got {outcome:?}");
    };
    assert_eq!(report.removed, 6);
    assert_eq!(scenes.tiles(&SceneId::new("tavern")).await.unwrap().len(), 6);
}
