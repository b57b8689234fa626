//! # bgsplit
//!
//! Splits oversized virtual-tabletop scene backgrounds into a mosaic of tiles
//! that every connected client can render.
//!
//! Each client reports its maximum GPU texture dimension. When a game master
//! sets a background larger than the smallest reported limit, the image is
//! cut into a uniform grid of tiles (each at most 95% of that limit), the
//! tiles are uploaded and attached to the scene, and the original background
//! is cleared.
//!
//! ## Quick Start
//!
//! ### Planning a grid
//!
//! ```
//! use bgsplit::planner::{plan_grid, DEFAULT_PADDING};
//!
//! let plan = plan_grid(10000, 8000, 4096, DEFAULT_PADDING)?;
//! assert_eq!((plan.cols, plan.rows), (3, 3));
//! assert_eq!((plan.tile_width, plan.tile_height), (3333, 2666));
//! # Ok::<(), bgsplit::Error>(())
//! ```
//!
//! ### Running the pipeline
//!
//! ```no_run
//! use std::sync::Arc;
//! use bgsplit::prelude::*;
//! use bgsplit::host::memory::*;
//!
//! # async fn demo() -> bgsplit::Result<()> {
//! let host = Host {
//!     participants: Arc::new(MemoryParticipantStore::new()),
//!     images: Arc::new(MemoryImageSource::new()),
//!     storage: Arc::new(MemoryStorage::new()),
//!     scenes: Arc::new(MemorySceneStore::new()),
//!     notifier: Arc::new(TracingNotifier),
//! };
//! let splitter = Splitter::new(SplitterConfig::for_world("my-world"), host)?;
//! let outcome = splitter.fix_background(&SceneId::new("scene-1"), None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `bgsplit` command-line binary

pub mod capability;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod host;
pub mod pipeline;
pub mod planner;
pub mod publisher;
pub mod queue;
pub mod renderer;
pub mod scene;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::capability::{CAPABILITY_KEY, aggregate_capacity, collect_capacity, report_capability};
    pub use crate::config::{SplitterConfig, TileFormat};
    pub use crate::error::{Error, Result};
    pub use crate::host::{
        Host, ImageSource, Notifier, NotifyLevel, ParticipantStore, SceneStore, TileStorage, TracingNotifier,
    };
    pub use crate::pipeline::{Actor, BackgroundUpdate, SkipReason, SplitOutcome, SplitReport, Splitter};
    pub use crate::planner::{DEFAULT_PADDING, TileGridPlan, TileRect, needs_split, plan_grid};
    pub use crate::queue::SceneQueue;
    pub use crate::scene::{ParticipantId, Scene, SceneId, TileDocument, TileId};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
