//! Filesystem-backed host implementations
//!
//! Used by the `bgsplit` binary: a local directory stands in for the host's
//! data storage, and scenes/participants live in JSON files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{ImageSource, ParticipantStore, SceneStore, TileStorage, UploadFile};
use crate::error::{Error, Result};
use crate::scene::{ParticipantId, Scene, SceneDocument, SceneId, TileDocument, TileId};

/// Tile storage rooted at a local directory.
///
/// Blobs land at `<root>/<source>/<dir>/<name>`; the returned path is
/// `<dir>/<name>`, relative to the source.
#[derive(Debug, Clone)]
pub struct FsTileStorage {
    root: PathBuf,
}

impl FsTileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Absolute location of a returned upload path
    #[must_use]
    pub fn resolve(&self, source: &str, path: &str) -> PathBuf {
        self.root.join(source).join(path)
    }
}

#[async_trait]
impl TileStorage for FsTileStorage {
    async fn create_directory(&self, source: &str, dir: &str) -> Result<()> {
        let path = self.resolve(source, dir);
        if tokio::fs::try_exists(&path).await? {
            return Err(Error::DirectoryExists { dir: dir.to_string() });
        }
        tokio::fs::create_dir_all(&path).await.map_err(|e| Error::DirectoryCreate {
            dir: dir.to_string(),
            message: e.to_string(),
        })
    }

    async fn upload(&self, source: &str, dir: &str, file: UploadFile) -> Result<String> {
        let relative = format!("{}/{}", dir.trim_end_matches('/'), file.name);
        let target = self.resolve(source, &relative);
        tokio::fs::write(&target, &file.bytes).await.map_err(|e| Error::Upload {
            file_name: file.name.clone(),
            message: e.to_string(),
        })?;
        tracing::debug!(path = %target.display(), bytes = file.bytes.len(), mime = file.mime_type, "Wrote tile");
        Ok(relative)
    }

    async fn remove(&self, source: &str, path: &str) -> Result<()> {
        match tokio::fs::remove_file(self.resolve(source, path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Decodes images from local paths, relative ones resolved against `root`
#[derive(Debug, Clone)]
pub struct FsImageSource {
    root: PathBuf,
}

impl FsImageSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ImageSource for FsImageSource {
    async fn load(&self, src: &str) -> Result<DynamicImage> {
        let path = self.root.join(src);
        let owned_src = src.to_string();
        tokio::task::spawn_blocking(move || image::open(&path))
            .await
            .map_err(|e| Error::ImageLoad {
                src: owned_src.clone(),
                message: e.to_string(),
            })?
            .map_err(|e| Error::ImageLoad {
                src: owned_src,
                message: e.to_string(),
            })
    }
}

async fn read_json<T: for<'de> Deserialize<'de> + Default>(path: &Path) -> Result<T> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SceneFile {
    scenes: BTreeMap<SceneId, SceneDocument>,
}

/// Scene documents persisted as a single JSON file.
///
/// Every mutation is a read-modify-write of the whole file, serialized by an
/// async mutex.
#[derive(Debug)]
pub struct JsonSceneStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonSceneStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        }
    }

    /// Insert or replace a scene, keeping its existing tiles
    pub async fn upsert_scene(&self, scene: Scene) -> Result<()> {
        let _guard = self.guard.lock().await;
        let mut file: SceneFile = read_json(&self.path).await?;
        let id = scene.id.clone();
        match file.scenes.get_mut(&id) {
            Some(doc) => doc.scene = scene,
            None => {
                file.scenes.insert(id, SceneDocument::from(scene));
            }
        }
        write_json(&self.path, &file).await
    }

    async fn read<T>(&self, id: &SceneId, f: impl FnOnce(&SceneDocument) -> T) -> Result<T> {
        let _guard = self.guard.lock().await;
        let file: SceneFile = read_json(&self.path).await?;
        let doc = file
            .scenes
            .get(id)
            .ok_or_else(|| Error::SceneNotFound(id.to_string()))?;
        Ok(f(doc))
    }

    async fn modify<T>(&self, id: &SceneId, f: impl FnOnce(&mut SceneDocument) -> T) -> Result<T> {
        let _guard = self.guard.lock().await;
        let mut file: SceneFile = read_json(&self.path).await?;
        let doc = file
            .scenes
            .get_mut(id)
            .ok_or_else(|| Error::SceneNotFound(id.to_string()))?;
        let out = f(doc);
        write_json(&self.path, &file).await?;
        Ok(out)
    }
}

#[async_trait]
impl SceneStore for JsonSceneStore {
    async fn scene(&self, id: &SceneId) -> Result<Scene> {
        self.read(id, |doc| doc.scene.clone()).await
    }

    async fn tiles(&self, id: &SceneId) -> Result<Vec<TileDocument>> {
        self.read(id, |doc| doc.tiles.clone()).await
    }

    async fn create_tiles(&self, id: &SceneId, tiles: Vec<TileDocument>) -> Result<Vec<TileId>> {
        self.modify(id, |doc| {
            let ids = tiles.iter().map(|t| t.id.clone()).collect();
            doc.tiles.extend(tiles);
            ids
        })
        .await
    }

    async fn delete_tiles(&self, id: &SceneId, tiles: &[TileId]) -> Result<usize> {
        self.modify(id, |doc| {
            let before = doc.tiles.len();
            doc.tiles.retain(|t| !tiles.contains(&t.id));
            before - doc.tiles.len()
        })
        .await
    }

    async fn set_background(&self, id: &SceneId, src: Option<String>) -> Result<()> {
        self.modify(id, |doc| doc.scene.background = src).await
    }
}

type ParticipantFile = BTreeMap<ParticipantId, BTreeMap<String, BTreeMap<String, u32>>>;

/// Participant flags persisted as a JSON file
#[derive(Debug)]
pub struct JsonParticipantStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonParticipantStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        }
    }

    async fn modify(&self, f: impl FnOnce(&mut ParticipantFile)) -> Result<()> {
        let _guard = self.guard.lock().await;
        let mut file: ParticipantFile = read_json(&self.path).await?;
        f(&mut file);
        write_json(&self.path, &file).await
    }
}

#[async_trait]
impl ParticipantStore for JsonParticipantStore {
    async fn participants(&self) -> Result<Vec<ParticipantId>> {
        let _guard = self.guard.lock().await;
        let file: ParticipantFile = read_json(&self.path).await?;
        Ok(file.into_keys().collect())
    }

    async fn get_flag(&self, participant: &ParticipantId, namespace: &str, key: &str) -> Result<Option<u32>> {
        let _guard = self.guard.lock().await;
        let file: ParticipantFile = read_json(&self.path).await?;
        Ok(file
            .get(participant)
            .and_then(|flags| flags.get(namespace))
            .and_then(|ns| ns.get(key))
            .copied())
    }

    async fn set_flag(&self, participant: &ParticipantId, namespace: &str, key: &str, value: u32) -> Result<()> {
        self.modify(|file| {
            file.entry(participant.clone())
                .or_default()
                .entry(namespace.to_string())
                .or_default()
                .insert(key.to_string(), value);
        })
        .await
    }

    async fn clear_namespace(&self, participant: &ParticipantId, namespace: &str) -> Result<()> {
        self.modify(|file| {
            if let Some(flags) = file.get_mut(participant) {
                flags.remove(namespace);
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_fs_storage_directory_and_upload() {
        let dir = tempdir().unwrap();
        let storage = FsTileStorage::new(dir.path());

        storage.create_directory("data", "worlds/w/assets/bg-tiles").await.unwrap();
        let err = storage
            .create_directory("data", "worlds/w/assets/bg-tiles")
            .await
            .unwrap_err();
        assert!(err.is_already_exists());

        let path = storage
            .upload(
                "data",
                "worlds/w/assets/bg-tiles",
                UploadFile {
                    name: "t.png".to_string(),
                    mime_type: "image/png",
                    bytes: vec![1, 2, 3],
                },
            )
            .await
            .unwrap();
        assert_eq!(path, "worlds/w/assets/bg-tiles/t.png");
        assert_eq!(std::fs::read(storage.resolve("data", &path)).unwrap(), vec![1, 2, 3]);

        storage.remove("data", &path).await.unwrap();
        assert!(!storage.resolve("data", &path).exists());
        // Removing twice is fine
        storage.remove("data", &path).await.unwrap();
    }

    #[tokio::test]
    async fn test_json_scene_store_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scenes.json");
        let store = JsonSceneStore::new(&path);
        let id = SceneId::new("s1");

        store
            .upsert_scene(Scene::new("s1", 100, 50, Some("bg.png".to_string())))
            .await
            .unwrap();
        store.set_background(&id, None).await.unwrap();

        let reopened = JsonSceneStore::new(&path);
        let scene = reopened.scene(&id).await.unwrap();
        assert_eq!(scene.background, None);
        assert_eq!((scene.width, scene.height), (100, 50));
        assert!(reopened.tiles(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_participant_store() {
        let dir = tempdir().unwrap();
        let store = JsonParticipantStore::new(dir.path().join("users.json"));
        let player = ParticipantId::new("player-1");

        assert!(store.participants().await.unwrap().is_empty());
        store.set_flag(&player, "ns", "minTextureSize", 8192).await.unwrap();
        assert_eq!(store.get_flag(&player, "ns", "minTextureSize").await.unwrap(), Some(8192));
        assert_eq!(store.participants().await.unwrap(), vec![player.clone()]);

        store.clear_namespace(&player, "ns").await.unwrap();
        assert_eq!(store.get_flag(&player, "ns", "minTextureSize").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fs_image_source_missing_file() {
        let dir = tempdir().unwrap();
        let source = FsImageSource::new(dir.path());
        let err = source.load("nope.png").await.unwrap_err();
        assert!(matches!(err, Error::ImageLoad { .. }));
    }
}
