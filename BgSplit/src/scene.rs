//! Scene and tile document types
//!
//! These mirror the subset of the host's scene schema the splitter reads and
//! writes. Field names serialize in the host's camelCase form.
//!
//! SPDX-FileCopyrightText: 2025 CyberDeco
//! SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::TileDefaults;
use crate::planner::TileRect;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a scene document
    SceneId
);
string_id!(
    /// Identifier of a tile document within a scene
    TileId
);
string_id!(
    /// Identifier of a connected participant (user)
    ParticipantId
);

impl TileId {
    /// Deterministic identifier for a generated tile at a grid position
    #[must_use]
    pub fn generated(scene: &SceneId, col: u32, row: u32) -> Self {
        Self(format!("split-bg-{scene}-{col}-{row}"))
    }
}

/// Storage file name for a generated tile
#[must_use]
pub fn tile_file_name(scene: &SceneId, col: u32, row: u32, extension: &str) -> String {
    format!("split-bg-{scene}-{col}-{row}.{extension}")
}

/// Scene-space rectangle occupied by the background (excludes scene padding)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// The parts of a scene the splitter works with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: SceneId,
    /// Declared scene width in pixels
    pub width: u32,
    /// Declared scene height in pixels
    pub height: u32,
    /// Background image reference; `None` once split into tiles
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub scene_rect: SceneRect,
}

impl Scene {
    /// Scene with no padding: the background starts at the origin
    #[must_use]
    pub fn new(id: impl Into<SceneId>, width: u32, height: u32, background: Option<String>) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            background,
            scene_rect: SceneRect { x: 0, y: 0, width, height },
        }
    }
}

/// Texture block of a tile document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileTexture {
    pub src: String,
    pub anchor_x: f64,
    pub anchor_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub fit: String,
    pub scale_x: f64,
    pub scale_y: f64,
    pub rotation: f64,
    pub tint: String,
    pub alpha_threshold: f64,
}

/// A tile document attached to a scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileDocument {
    pub id: TileId,
    pub texture: TileTexture,
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
    pub z: i32,
    pub rotation: f64,
    pub alpha: f64,
    pub lock_rotation: bool,
    pub hidden: bool,
    /// Namespaced flags, e.g. `{"bg-texture-size-fix": {"generated": true}}`
    #[serde(default)]
    pub flags: BTreeMap<String, Value>,
}

impl TileDocument {
    /// Build the document for a generated tile placed at `origin + cell offset`
    #[must_use]
    pub fn generated(
        scene: &SceneId,
        cell: &TileRect,
        origin: &SceneRect,
        src: String,
        module_id: &str,
        defaults: &TileDefaults,
    ) -> Self {
        let mut flags = BTreeMap::new();
        flags.insert(module_id.to_string(), serde_json::json!({ "generated": true }));

        Self {
            id: TileId::generated(scene, cell.col, cell.row),
            texture: TileTexture {
                src,
                anchor_x: defaults.anchor_x,
                anchor_y: defaults.anchor_y,
                offset_x: 0.0,
                offset_y: 0.0,
                fit: defaults.fit.clone(),
                scale_x: 1.0,
                scale_y: 1.0,
                rotation: 0.0,
                tint: defaults.tint.clone(),
                alpha_threshold: defaults.alpha_threshold,
            },
            x: origin.x + i64::from(cell.offset_x),
            y: origin.y + i64::from(cell.offset_y),
            width: cell.width,
            height: cell.height,
            z: defaults.z,
            rotation: 0.0,
            alpha: defaults.alpha,
            lock_rotation: false,
            hidden: defaults.hidden,
            flags,
        }
    }

    /// Whether this tile carries the generated marker of `module_id`
    #[must_use]
    pub fn is_generated(&self, module_id: &str) -> bool {
        self.flags
            .get(module_id)
            .and_then(|ns| ns.get("generated"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// A scene with its embedded tiles, as stored by document stores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    #[serde(flatten)]
    pub scene: Scene,
    #[serde(default)]
    pub tiles: Vec<TileDocument>,
}

impl From<Scene> for SceneDocument {
    fn from(scene: Scene) -> Self {
        Self {
            scene,
            tiles: Vec::new(),
        }
    }
}
