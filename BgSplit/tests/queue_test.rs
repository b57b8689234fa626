use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bgsplit::host::memory::{
    MemoryImageSource, MemoryParticipantStore, MemorySceneStore, MemoryStorage, RecordingNotifier,
};
use bgsplit::prelude::*;
use image::{DynamicImage, RgbaImage};
use pretty_assertions::assert_eq;
use tokio::sync::Semaphore;

/// Image source that holds every load until a permit is released
struct GatedImages {
    inner: MemoryImageSource,
    entered: AtomicUsize,
    gate: Semaphore,
}

impl GatedImages {
    fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageSource for GatedImages {
    async fn load(&self, src: &str) -> Result<DynamicImage> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        self.gate.acquire().await.unwrap().forget();
        self.inner.load(src).await
    }
}

struct Fixture {
    images: Arc<GatedImages>,
    scenes: Arc<MemorySceneStore>,
    queue: SceneQueue,
}

async fn fixture(scene_ids: &[&str]) -> Fixture {
    let images = Arc::new(GatedImages {
        inner: MemoryImageSource::new(),
        entered: AtomicUsize::new(0),
        gate: Semaphore::new(0),
    });
    let scenes = Arc::new(MemorySceneStore::new());

    for id in scene_ids {
        let src = format!("maps/{id}.png");
        images
            .inner
            .insert(src.clone(), DynamicImage::ImageRgba8(RgbaImage::new(100, 80)));
        scenes.insert(Scene::new(*id, 100, 80, Some(src)));
    }

    let host = Host {
        participants: Arc::new(MemoryParticipantStore::new()),
        images: images.clone(),
        storage: Arc::new(MemoryStorage::new()),
        scenes: scenes.clone(),
        notifier: Arc::new(RecordingNotifier::new()),
    };
    let config = SplitterConfig {
        format: TileFormat::Png,
        ..SplitterConfig::for_world("test-world")
    };
    let splitter = Arc::new(Splitter::new(config, host).unwrap());
    splitter
        .report_capability(&ParticipantId::new("gm"), 40)
        .await
        .unwrap();

    Fixture {
        images,
        scenes,
        queue: SceneQueue::new(splitter),
    }
}

fn update(scene: &str) -> BackgroundUpdate {
    BackgroundUpdate {
        scene: SceneId::new(scene),
        new_src: Some(format!("maps/{scene}.png")),
        actor: Actor {
            participant: ParticipantId::new("gm"),
            privileged: true,
        },
    }
}

/// Give spawned workers a chance to run on the test runtime
async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

fn removed(outcome: SplitOutcome) -> usize {
    match outcome {
        SplitOutcome::Split(report) => report.removed,
        SplitOutcome::Skipped(reason) => panic!("expected a split, got {reason:?}"),
    }
}

#[tokio::test]
async fn test_same_scene_updates_run_one_at_a_time() {
    let fx = fixture(&["scene1"]).await;

    let first = fx.queue.submit(update("scene1"));
    let second = fx.queue.submit(update("scene1"));
    settle().await;

    // The second update waits behind the first
    assert_eq!(fx.images.entered(), 1);

    fx.images.gate.add_permits(1);
    let first = first.await.unwrap().unwrap();
    assert_eq!(removed(first), 0);

    settle().await;
    assert_eq!(fx.images.entered(), 2);

    fx.images.gate.add_permits(1);
    let second = second.await.unwrap().unwrap();
    // Only the first generation existed when the second split cleaned up
    assert_eq!(removed(second), 9);

    let doc = fx.scenes.document(&SceneId::new("scene1")).unwrap();
    assert_eq!(doc.tiles.len(), 9);
}

#[tokio::test]
async fn test_different_scenes_run_concurrently() {
    let fx = fixture(&["scene1", "scene2"]).await;

    let first = fx.queue.submit(update("scene1"));
    let second = fx.queue.submit(update("scene2"));
    settle().await;

    assert_eq!(fx.images.entered(), 2);
    assert_eq!(fx.queue.active_scenes(), 2);

    fx.images.gate.add_permits(2);
    assert_eq!(removed(first.await.unwrap().unwrap()), 0);
    assert_eq!(removed(second.await.unwrap().unwrap()), 0);
}

#[tokio::test]
async fn test_errors_are_delivered_to_the_caller() {
    let fx = fixture(&["scene1"]).await;
    fx.images.gate.add_permits(1);

    let mut event = update("scene1");
    event.new_src = Some("maps/missing.png".to_string());
    let err = fx.queue.run(event).await.unwrap_err();
    assert!(matches!(err, Error::ImageLoad { .. }));

    // The scene is still served after a failure
    fx.images.gate.add_permits(1);
    let outcome = fx.queue.run(update("scene1")).await.unwrap();
    assert_eq!(removed(outcome), 0);
}

#[tokio::test]
async fn test_idle_workers_retire() {
    let fx = fixture(&["scene1", "scene2"]).await;
    fx.images.gate.add_permits(2);

    let first = fx.queue.submit(update("scene1"));
    let second = fx.queue.submit(update("scene2"));
    assert_eq!(removed(first.await.unwrap().unwrap()), 0);
    assert_eq!(removed(second.await.unwrap().unwrap()), 0);
    settle().await;

    assert_eq!(fx.queue.active_scenes(), 0);

    // A later update starts a fresh worker for the scene
    fx.images.gate.add_permits(1);
    let outcome = fx.queue.run(update("scene1")).await.unwrap();
    assert_eq!(removed(outcome), 9);
    settle().await;
    assert_eq!(fx.queue.active_scenes(), 0);
}
