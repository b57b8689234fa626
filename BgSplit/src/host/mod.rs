//! Host platform contracts
//!
//! The splitter never talks to the tabletop engine directly. Everything it
//! needs from the host (participant flags, image decoding, file storage, the
//! scene document store and user notifications) goes through the traits in
//! this module, bundled together in a [`Host`].
//!
//! Two sets of implementations ship with the crate:
//! - [`memory`] - in-process stores, useful for tests and embedding
//! - [`fs`] - a local directory acting as storage plus JSON document files
//!
//! SPDX-FileCopyrightText: 2025 CyberDeco
//! SPDX-License-Identifier: MIT

pub mod fs;
pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;

use crate::error::Result;
use crate::scene::{ParticipantId, Scene, SceneId, TileDocument, TileId};

/// Per-participant key-value flags, namespaced by module id.
#[async_trait]
pub trait ParticipantStore: Send + Sync {
    /// Every participant known to the session.
    async fn participants(&self) -> Result<Vec<ParticipantId>>;

    /// Read an integer flag, `None` if unset.
    async fn get_flag(&self, participant: &ParticipantId, namespace: &str, key: &str) -> Result<Option<u32>>;

    /// Write an integer flag.
    async fn set_flag(&self, participant: &ParticipantId, namespace: &str, key: &str, value: u32) -> Result<()>;

    /// Remove every flag under `namespace` for one participant.
    async fn clear_namespace(&self, participant: &ParticipantId, namespace: &str) -> Result<()>;
}

/// Image decoding service.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Load and decode the image behind `src`.
    ///
    /// Fails with [`Error::ImageLoad`](crate::Error::ImageLoad) if the
    /// reference is unreachable or undecodable.
    async fn load(&self, src: &str) -> Result<DynamicImage>;
}

/// An encoded tile ready for upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Durable blob storage.
#[async_trait]
pub trait TileStorage: Send + Sync {
    /// Create `dir` under `source`.
    ///
    /// Returns [`Error::DirectoryExists`](crate::Error::DirectoryExists) when
    /// it is already there; callers treat that as success.
    async fn create_directory(&self, source: &str, dir: &str) -> Result<()>;

    /// Store `file` in `dir`, overwriting a blob of the same name, and return
    /// the addressable path.
    async fn upload(&self, source: &str, dir: &str, file: UploadFile) -> Result<String>;

    /// Remove a previously uploaded blob by the path `upload` returned.
    async fn remove(&self, source: &str, path: &str) -> Result<()>;
}

/// Scene document store.
#[async_trait]
pub trait SceneStore: Send + Sync {
    async fn scene(&self, id: &SceneId) -> Result<Scene>;

    /// All tile documents currently attached to the scene.
    async fn tiles(&self, id: &SceneId) -> Result<Vec<TileDocument>>;

    /// Attach tiles in one bulk operation; returns their ids in order.
    async fn create_tiles(&self, id: &SceneId, tiles: Vec<TileDocument>) -> Result<Vec<TileId>>;

    /// Delete tiles in one bulk operation; returns how many were removed.
    async fn delete_tiles(&self, id: &SceneId, tiles: &[TileId]) -> Result<usize>;

    /// Replace the scene's background reference.
    async fn set_background(&self, id: &SceneId, src: Option<String>) -> Result<()>;
}

/// Severity of a user-visible notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl fmt::Display for NotifyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Success => "success",
        })
    }
}

/// A user-visible message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotifyLevel,
    pub message: String,
}

/// Fire-and-forget notification sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Notifier that forwards every message to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let message = notification.message;
        match notification.level {
            NotifyLevel::Info | NotifyLevel::Success => tracing::info!(kind = %notification.level, "{message}"),
            NotifyLevel::Warning => tracing::warn!("{message}"),
            NotifyLevel::Error => tracing::error!("{message}"),
        }
    }
}

/// Host generation, used once at setup to pick collaborator implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HostInfo {
    /// Major version of the host platform
    pub generation: u32,
}

/// Offers a [`TileStorage`] implementation for the host generations it supports.
pub trait StorageProvider: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    fn supports(&self, host: HostInfo) -> bool;

    fn storage(&self) -> Arc<dyn TileStorage>;
}

/// Provider bound to a range of host generations
pub struct GenerationStorage {
    name: String,
    min_generation: u32,
    max_generation: Option<u32>,
    storage: Arc<dyn TileStorage>,
}

impl GenerationStorage {
    /// Provider for `min_generation..=max_generation` (unbounded when `None`)
    pub fn new(
        name: impl Into<String>,
        min_generation: u32,
        max_generation: Option<u32>,
        storage: Arc<dyn TileStorage>,
    ) -> Self {
        Self {
            name: name.into(),
            min_generation,
            max_generation,
            storage,
        }
    }
}

impl StorageProvider for GenerationStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, host: HostInfo) -> bool {
        host.generation >= self.min_generation
            && self.max_generation.is_none_or(|max| host.generation <= max)
    }

    fn storage(&self) -> Arc<dyn TileStorage> {
        Arc::clone(&self.storage)
    }
}

/// Pick the first provider that supports `host`.
pub fn select_storage(providers: &[Box<dyn StorageProvider>], host: HostInfo) -> Option<Arc<dyn TileStorage>> {
    let provider = providers.iter().find(|p| p.supports(host))?;
    tracing::debug!(provider = provider.name(), generation = host.generation, "Selected tile storage");
    Some(provider.storage())
}

/// The full set of host collaborators
#[derive(Clone)]
pub struct Host {
    pub participants: Arc<dyn ParticipantStore>,
    pub images: Arc<dyn ImageSource>,
    pub storage: Arc<dyn TileStorage>,
    pub scenes: Arc<dyn SceneStore>,
    pub notifier: Arc<dyn Notifier>,
}

impl Host {
    pub(crate) fn notify(&self, level: NotifyLevel, message: String) {
        self.notifier.notify(Notification { level, message });
    }
}
