//! Removal of previously generated tiles

use crate::error::Result;
use crate::host::SceneStore;
use crate::scene::{SceneId, TileId};

/// Delete every tile on `scene` carrying the generated marker of `module_id`.
///
/// Tiles are matched by marker only, never by file name, and removed in a
/// single bulk call. Returns the number removed.
pub async fn remove_generated_tiles(scenes: &dyn SceneStore, scene: &SceneId, module_id: &str) -> Result<usize> {
    let generated: Vec<TileId> = scenes
        .tiles(scene)
        .await?
        .into_iter()
        .filter(|t| t.is_generated(module_id))
        .map(|t| t.id)
        .collect();

    if generated.is_empty() {
        return Ok(0);
    }

    let removed = scenes.delete_tiles(scene, &generated).await?;
    tracing::info!(%scene, removed, "Removed generated background tiles");
    Ok(removed)
}
