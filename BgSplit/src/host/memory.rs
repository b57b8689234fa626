//! In-memory host implementations
//!
//! Everything lives behind a `std::sync::Mutex`; no lock is held across an
//! await point. The stores can be told to fail specific operations so
//! callers can exercise error paths.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use image::DynamicImage;

use super::{ImageSource, Notification, Notifier, NotifyLevel, ParticipantStore, SceneStore, TileStorage, UploadFile};
use crate::error::{Error, Result};
use crate::scene::{ParticipantId, Scene, SceneDocument, SceneId, TileDocument, TileId};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Flags = BTreeMap<String, BTreeMap<String, u32>>;

/// Participant flags held in memory
#[derive(Debug, Default)]
pub struct MemoryParticipantStore {
    participants: Mutex<BTreeMap<ParticipantId, Flags>>,
    writes: AtomicUsize,
}

impl MemoryParticipantStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant with no flags
    pub fn add_participant(&self, participant: impl Into<ParticipantId>) {
        lock(&self.participants).entry(participant.into()).or_default();
    }

    /// Number of `set_flag` and `clear_namespace` calls served
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ParticipantStore for MemoryParticipantStore {
    async fn participants(&self) -> Result<Vec<ParticipantId>> {
        Ok(lock(&self.participants).keys().cloned().collect())
    }

    async fn get_flag(&self, participant: &ParticipantId, namespace: &str, key: &str) -> Result<Option<u32>> {
        Ok(lock(&self.participants)
            .get(participant)
            .and_then(|flags| flags.get(namespace))
            .and_then(|ns| ns.get(key))
            .copied())
    }

    async fn set_flag(&self, participant: &ParticipantId, namespace: &str, key: &str, value: u32) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        lock(&self.participants)
            .entry(participant.clone())
            .or_default()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn clear_namespace(&self, participant: &ParticipantId, namespace: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        if let Some(flags) = lock(&self.participants).get_mut(participant) {
            flags.remove(namespace);
        }
        Ok(())
    }
}

/// Images registered up front, keyed by reference
#[derive(Debug, Default)]
pub struct MemoryImageSource {
    images: Mutex<HashMap<String, DynamicImage>>,
    loads: AtomicUsize,
}

impl MemoryImageSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, src: impl Into<String>, image: DynamicImage) {
        lock(&self.images).insert(src.into(), image);
    }

    /// Number of `load` calls served
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ImageSource for MemoryImageSource {
    async fn load(&self, src: &str) -> Result<DynamicImage> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        lock(&self.images).get(src).cloned().ok_or_else(|| Error::ImageLoad {
            src: src.to_string(),
            message: "Failed to load image".to_string(),
        })
    }
}

/// Blob storage held in memory, keyed by `source:dir/name`
#[derive(Debug, Default)]
pub struct MemoryStorage {
    directories: Mutex<BTreeSet<String>>,
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
    /// Fail the upload after this many successful ones
    fail_upload_after: Mutex<Option<usize>>,
    fail_create_directory: Mutex<Option<String>>,
    uploads: AtomicUsize,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `count` uploads succeed, then fail every following one
    pub fn fail_uploads_after(&self, count: usize) {
        *lock(&self.fail_upload_after) = Some(count);
    }

    /// Make `create_directory` fail with `message`
    pub fn fail_create_directory(&self, message: impl Into<String>) {
        *lock(&self.fail_create_directory) = Some(message.into());
    }

    /// Paths of all stored blobs
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        lock(&self.blobs).keys().cloned().collect()
    }

    #[must_use]
    pub fn blob(&self, path: &str) -> Option<Vec<u8>> {
        lock(&self.blobs).get(path).cloned()
    }

    #[must_use]
    pub fn has_directory(&self, source: &str, dir: &str) -> bool {
        lock(&self.directories).contains(&format!("{source}:{dir}"))
    }
}

#[async_trait]
impl TileStorage for MemoryStorage {
    async fn create_directory(&self, source: &str, dir: &str) -> Result<()> {
        if let Some(message) = lock(&self.fail_create_directory).clone() {
            return Err(Error::DirectoryCreate {
                dir: dir.to_string(),
                message,
            });
        }
        if lock(&self.directories).insert(format!("{source}:{dir}")) {
            Ok(())
        } else {
            Err(Error::DirectoryExists { dir: dir.to_string() })
        }
    }

    async fn upload(&self, source: &str, dir: &str, file: UploadFile) -> Result<String> {
        let done = self.uploads.fetch_add(1, Ordering::Relaxed);
        if lock(&self.fail_upload_after).is_some_and(|limit| done >= limit) {
            return Err(Error::Upload {
                file_name: file.name,
                message: "storage unavailable".to_string(),
            });
        }
        let path = format!("{dir}/{}", file.name);
        lock(&self.blobs).insert(format!("{source}:{path}"), file.bytes);
        Ok(path)
    }

    async fn remove(&self, source: &str, path: &str) -> Result<()> {
        lock(&self.blobs).remove(&format!("{source}:{path}"));
        Ok(())
    }
}

/// Scene documents held in memory
#[derive(Debug, Default)]
pub struct MemorySceneStore {
    scenes: Mutex<BTreeMap<SceneId, SceneDocument>>,
    fail_create_tiles: Mutex<bool>,
    fail_delete_tiles: Mutex<bool>,
    fail_set_background: Mutex<bool>,
}

impl MemorySceneStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, scene: Scene) {
        lock(&self.scenes).insert(scene.id.clone(), SceneDocument::from(scene));
    }

    /// Attach a tile directly, bypassing the splitter
    pub fn insert_tile(&self, scene: &SceneId, tile: TileDocument) {
        if let Some(doc) = lock(&self.scenes).get_mut(scene) {
            doc.tiles.push(tile);
        }
    }

    #[must_use]
    pub fn document(&self, scene: &SceneId) -> Option<SceneDocument> {
        lock(&self.scenes).get(scene).cloned()
    }

    pub fn fail_create_tiles(&self, fail: bool) {
        *lock(&self.fail_create_tiles) = fail;
    }

    pub fn fail_delete_tiles(&self, fail: bool) {
        *lock(&self.fail_delete_tiles) = fail;
    }

    pub fn fail_set_background(&self, fail: bool) {
        *lock(&self.fail_set_background) = fail;
    }

    fn with_scene<T>(&self, id: &SceneId, f: impl FnOnce(&mut SceneDocument) -> T) -> Result<T> {
        let mut scenes = lock(&self.scenes);
        let doc = scenes
            .get_mut(id)
            .ok_or_else(|| Error::SceneNotFound(id.to_string()))?;
        Ok(f(doc))
    }
}

#[async_trait]
impl SceneStore for MemorySceneStore {
    async fn scene(&self, id: &SceneId) -> Result<Scene> {
        self.with_scene(id, |doc| doc.scene.clone())
    }

    async fn tiles(&self, id: &SceneId) -> Result<Vec<TileDocument>> {
        self.with_scene(id, |doc| doc.tiles.clone())
    }

    async fn create_tiles(&self, id: &SceneId, tiles: Vec<TileDocument>) -> Result<Vec<TileId>> {
        if *lock(&self.fail_create_tiles) {
            return Err(Error::SceneStore {
                message: "tile creation rejected".to_string(),
            });
        }
        self.with_scene(id, |doc| {
            let ids = tiles.iter().map(|t| t.id.clone()).collect();
            doc.tiles.extend(tiles);
            ids
        })
    }

    async fn delete_tiles(&self, id: &SceneId, tiles: &[TileId]) -> Result<usize> {
        if *lock(&self.fail_delete_tiles) {
            return Err(Error::SceneStore {
                message: "tile deletion rejected".to_string(),
            });
        }
        self.with_scene(id, |doc| {
            let before = doc.tiles.len();
            doc.tiles.retain(|t| !tiles.contains(&t.id));
            before - doc.tiles.len()
        })
    }

    async fn set_background(&self, id: &SceneId, src: Option<String>) -> Result<()> {
        if *lock(&self.fail_set_background) {
            return Err(Error::SceneStore {
                message: "scene update rejected".to_string(),
            });
        }
        self.with_scene(id, |doc| doc.scene.background = src)
    }
}

/// Notifier that keeps every message
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<Notification> {
        lock(&self.messages).clone()
    }

    /// Messages of one level
    #[must_use]
    pub fn at_level(&self, level: NotifyLevel) -> Vec<String> {
        lock(&self.messages)
            .iter()
            .filter(|n| n.level == level)
            .map(|n| n.message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        tracing::debug!(kind = %notification.level, message = %notification.message, "Notification");
        lock(&self.messages).push(notification);
    }
}
