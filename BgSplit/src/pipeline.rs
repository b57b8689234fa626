//! Background split pipeline
//!
//! ```text
//! capability check -> image load -> size check -> plan -> cleanup
//!   -> directory -> render -> publish (upload, create tiles, clear background)
//! ```
//!
//! Steps run strictly in order for one scene. Failures before publishing leave
//! the scene untouched apart from cleanup; failures while publishing are
//! rolled back by the publisher.
//!
//! SPDX-FileCopyrightText: 2025 CyberDeco
//! SPDX-License-Identifier: MIT

use std::sync::Arc;

use image::GenericImageView;

use crate::capability::{collect_capacity, report_capability};
use crate::cleanup::remove_generated_tiles;
use crate::config::SplitterConfig;
use crate::error::{Error, Result};
use crate::host::{Host, NotifyLevel};
use crate::planner::{needs_split, plan_grid};
use crate::publisher::publish_tiles;
use crate::renderer::{EncodeSettings, render_plan};
use crate::scene::{ParticipantId, SceneId, TileId};

/// The participant whose change triggered an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub participant: ParticipantId,
    /// Administrative (game-master) privileges
    pub privileged: bool,
}

/// A scene's background reference changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundUpdate {
    pub scene: SceneId,
    /// The new background reference carried by the update, if any
    pub new_src: Option<String>,
    pub actor: Actor,
}

/// Why the pipeline stopped without changing anything
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The acting participant is not privileged
    NotPrivileged,
    /// The update carries no background and the scene has none either
    NoBackground,
    /// No participant has reported a texture limit
    NoCapabilityData,
    /// The image already fits every client
    FitsWithinLimit { width: u32, height: u32, limit: u32 },
}

/// Result of a completed split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitReport {
    pub scene: SceneId,
    /// The aggregated client limit used
    pub limit: u32,
    pub cols: u32,
    pub rows: u32,
    /// Generated tiles removed before splitting
    pub removed: usize,
    pub tile_ids: Vec<TileId>,
}

impl SplitReport {
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tile_ids.len()
    }
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitOutcome {
    Skipped(SkipReason),
    Split(SplitReport),
}

/// Runs the split pipeline against a set of host collaborators
#[derive(Clone)]
pub struct Splitter {
    config: Arc<SplitterConfig>,
    host: Host,
}

impl Splitter {
    /// Validate `config` and bind it to `host`
    pub fn new(config: SplitterConfig, host: Host) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            host,
        })
    }

    #[must_use]
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    #[must_use]
    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Record this client's maximum texture dimension
    pub async fn report_capability(&self, participant: &ParticipantId, max_texture: u32) -> Result<bool> {
        report_capability(
            self.host.participants.as_ref(),
            participant,
            &self.config.module_id,
            max_texture,
        )
        .await
    }

    /// Remove this module's generated tiles from `scene`
    pub async fn cleanup(&self, scene: &SceneId) -> Result<usize> {
        remove_generated_tiles(self.host.scenes.as_ref(), scene, &self.config.module_id).await
    }

    /// Entry point for background-change events.
    ///
    /// Only privileged actors with a non-empty new background trigger a split.
    pub async fn handle_background_update(&self, event: &BackgroundUpdate) -> Result<SplitOutcome> {
        if !event.actor.privileged {
            tracing::debug!(scene = %event.scene, actor = %event.actor.participant, "Ignoring update from unprivileged actor");
            return Ok(SplitOutcome::Skipped(SkipReason::NotPrivileged));
        }
        match event.new_src.as_deref() {
            Some(src) if !src.is_empty() => self.fix_background(&event.scene, Some(src)).await,
            _ => Ok(SplitOutcome::Skipped(SkipReason::NoBackground)),
        }
    }

    /// Split the background of `scene_id` if any client cannot display it.
    ///
    /// `src` overrides the scene's current background reference.
    pub async fn fix_background(&self, scene_id: &SceneId, src: Option<&str>) -> Result<SplitOutcome> {
        let config = self.config.as_ref();

        let Some(limit) = collect_capacity(self.host.participants.as_ref(), &config.module_id).await? else {
            self.warn(
                "No player max texture sizes reported! Have everyone reconnect or pan canvas.".to_string(),
            );
            return Ok(SplitOutcome::Skipped(SkipReason::NoCapabilityData));
        };
        self.info(format!("Min player max texture: {limit}px"));

        let scene = self.host.scenes.scene(scene_id).await?;
        let Some(src) = src.map(str::to_string).or_else(|| scene.background.clone()) else {
            return Ok(SplitOutcome::Skipped(SkipReason::NoBackground));
        };

        let image = match self.host.images.load(&src).await {
            Ok(image) => image,
            Err(e) => {
                self.error(format!("Image load failed: {e}"));
                return Err(e);
            }
        };
        let (width, height) = image.dimensions();

        if width.abs_diff(scene.width) > config.dimension_tolerance
            || height.abs_diff(scene.height) > config.dimension_tolerance
        {
            self.warn(format!(
                "Scene dims ({}x{}) != image ({width}x{height}). Minor scaling possible.",
                scene.width, scene.height
            ));
        }

        if !needs_split(width, height, limit) {
            tracing::debug!(scene = %scene.id, width, height, limit, "Background fits every client");
            return Ok(SplitOutcome::Skipped(SkipReason::FitsWithinLimit { width, height, limit }));
        }

        // Reject an unusable limit before touching anything
        let plan = match plan_grid(width, height, limit, config.padding) {
            Ok(plan) => plan,
            Err(e) => {
                self.error(format!("Cannot plan tiles: {e}"));
                return Err(e);
            }
        };

        self.info(format!("Auto-splitting {width}x{height} bg..."));

        let removed = match self.cleanup(&scene.id).await {
            Ok(removed) => removed,
            Err(e) => {
                self.error(format!("Failed to remove old background tiles: {e}"));
                return Err(e);
            }
        };
        if removed > 0 {
            self.info(format!("Removed {removed} old background tiles."));
        }

        self.ensure_tile_directory().await?;

        let settings = EncodeSettings {
            format: config.format,
            quality: config.quality,
        };
        let cells = plan.clone();
        let tiles = tokio::task::spawn_blocking(move || render_plan(&image, &cells, settings))
            .await
            .map_err(|e| Error::RenderTask(e.to_string()))??;

        let report = match publish_tiles(&self.host, config, &scene, &plan, tiles).await {
            Ok(report) => report,
            Err(e) => {
                self.error(format!("Failed to publish tiles: {e}"));
                return Err(e);
            }
        };

        self.host.notify(
            NotifyLevel::Success,
            config.prefix(format!(
                "Background successfully split into {} tiles ({}x{}).",
                report.tile_ids.len(),
                report.cols,
                report.rows
            )),
        );

        Ok(SplitOutcome::Split(SplitReport {
            scene: scene.id,
            limit,
            cols: report.cols,
            rows: report.rows,
            removed,
            tile_ids: report.tile_ids,
        }))
    }

    /// Create the tile directory; an existing directory is fine.
    async fn ensure_tile_directory(&self) -> Result<()> {
        let config = self.config.as_ref();
        match self
            .host
            .storage
            .create_directory(&config.storage_source, &config.tile_directory)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_already_exists() => Ok(()),
            Err(e) => {
                tracing::error!(dir = %config.tile_directory, error = %e, "Tile directory creation failed");
                self.error(format!("Failed to create tiles directory: {e}"));
                Err(e)
            }
        }
    }

    fn info(&self, message: String) {
        self.host.notify(NotifyLevel::Info, self.config.prefix(message));
    }

    fn warn(&self, message: String) {
        self.host.notify(NotifyLevel::Warning, self.config.prefix(message));
    }

    fn error(&self, message: String) {
        self.host.notify(NotifyLevel::Error, self.config.prefix(message));
    }
}
