//! Tile publishing
//!
//! Uploads encoded tiles, attaches them to the scene and clears the original
//! background. Every side effect is journaled; if any step fails the journal
//! is replayed backwards so the scene is left without a partial tile set.
//!
//! SPDX-FileCopyrightText: 2025 CyberDeco
//! SPDX-License-Identifier: MIT

use crate::config::SplitterConfig;
use crate::error::{Error, Result};
use crate::host::{Host, UploadFile};
use crate::planner::TileGridPlan;
use crate::renderer::EncodedTile;
use crate::scene::{Scene, TileDocument, TileId, tile_file_name};

/// What a successful publish produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub cols: u32,
    pub rows: u32,
    /// Created tile ids, row-major
    pub tile_ids: Vec<TileId>,
    /// Storage paths of the uploaded blobs, row-major
    pub paths: Vec<String>,
}

/// Side effects performed so far, undone on failure
#[derive(Debug, Default)]
struct Journal {
    uploaded: Vec<String>,
    created: Vec<TileId>,
}

impl Journal {
    /// Undo everything recorded, tiles first, and hand back the error to report.
    async fn rollback(self, host: &Host, config: &SplitterConfig, scene: &Scene, cause: Error) -> Error {
        tracing::warn!(
            scene = %scene.id,
            tiles = self.created.len(),
            blobs = self.uploaded.len(),
            error = %cause,
            "Rolling back partial split"
        );

        let mut first_failure: Option<Error> = None;
        if !self.created.is_empty() {
            if let Err(e) = host.scenes.delete_tiles(&scene.id, &self.created).await {
                first_failure.get_or_insert(e);
            }
        }
        for path in &self.uploaded {
            if let Err(e) = host.storage.remove(&config.storage_source, path).await {
                tracing::warn!(path, error = %e, "Failed to remove uploaded tile");
                first_failure.get_or_insert(e);
            }
        }

        match first_failure {
            None => cause,
            Some(rollback) => Error::RollbackFailed {
                source: Box::new(cause),
                rollback: rollback.to_string(),
            },
        }
    }
}

/// Upload `tiles`, attach them to `scene`, then clear its background.
pub async fn publish_tiles(
    host: &Host,
    config: &SplitterConfig,
    scene: &Scene,
    plan: &TileGridPlan,
    tiles: Vec<EncodedTile>,
) -> Result<PublishReport> {
    let mut journal = Journal::default();
    match publish_journaled(host, config, scene, plan, tiles, &mut journal).await {
        Ok(report) => Ok(report),
        Err(cause) => Err(journal.rollback(host, config, scene, cause).await),
    }
}

async fn publish_journaled(
    host: &Host,
    config: &SplitterConfig,
    scene: &Scene,
    plan: &TileGridPlan,
    tiles: Vec<EncodedTile>,
    journal: &mut Journal,
) -> Result<PublishReport> {
    let extension = config.format.extension();
    let mut documents = Vec::with_capacity(tiles.len());

    for tile in tiles {
        let rect = tile.rect;
        let name = tile_file_name(&scene.id, rect.col, rect.row, extension);
        let path = host
            .storage
            .upload(
                &config.storage_source,
                &config.tile_directory,
                UploadFile {
                    name,
                    mime_type: config.format.mime_type(),
                    bytes: tile.bytes,
                },
            )
            .await?;
        journal.uploaded.push(path.clone());

        documents.push(TileDocument::generated(
            &scene.id,
            &rect,
            &scene.scene_rect,
            path,
            &config.module_id,
            &config.tile,
        ));
    }

    let tile_ids = host.scenes.create_tiles(&scene.id, documents).await?;
    journal.created.clone_from(&tile_ids);

    host.scenes.set_background(&scene.id, None).await?;

    tracing::info!(scene = %scene.id, cols = plan.cols, rows = plan.rows, "Published background tiles");
    Ok(PublishReport {
        cols: plan.cols,
        rows: plan.rows,
        tile_ids,
        paths: journal.uploaded.clone(),
    })
}
