//! CLI subcommands

pub mod plan;
pub mod report;
pub mod split;

use std::path::PathBuf;

use clap::Subcommand;

use crate::planner::DEFAULT_PADDING;

#[derive(Subcommand)]
pub enum Commands {
    /// Print the tile grid for an image size and texture limit
    Plan {
        /// Image width in pixels
        #[arg(long)]
        width: u32,

        /// Image height in pixels
        #[arg(long)]
        height: u32,

        /// Smallest max texture size among clients
        #[arg(short, long)]
        limit: u32,

        /// Fraction of the limit a tile may use
        #[arg(long, default_value_t = DEFAULT_PADDING)]
        padding: f64,

        /// List every cell instead of a summary
        #[arg(long)]
        cells: bool,
    },

    /// Split an image into tiles, using a local directory as storage
    Split {
        /// Source background image
        #[arg(short, long)]
        image: PathBuf,

        /// Output directory (tiles plus scene.json)
        #[arg(short, long)]
        output: PathBuf,

        /// Texture limit to split for
        #[arg(short, long, required_unless_present = "participants", conflicts_with = "participants")]
        limit: Option<u32>,

        /// JSON participant store with reported limits
        #[arg(long)]
        participants: Option<PathBuf>,

        /// Scene identifier used in tile names
        #[arg(long, default_value = "scene")]
        scene_id: String,

        /// TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Record a participant's max texture size in a JSON participant store
    Report {
        /// JSON participant store (created if missing)
        #[arg(long)]
        participants: PathBuf,

        /// Participant identifier
        #[arg(long)]
        participant: String,

        /// Maximum texture dimension the participant's GPU supports
        #[arg(long)]
        max_texture: u32,

        /// TOML config file (for the flag namespace)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

impl Commands {
    /// Execute the selected command.
    ///
    /// # Errors
    /// Returns an error if the underlying command fails.
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Plan {
                width,
                height,
                limit,
                padding,
                cells,
            } => plan::execute(*width, *height, *limit, *padding, *cells),
            Commands::Split {
                image,
                output,
                limit,
                participants,
                scene_id,
                config,
                quiet,
            } => split::execute(
                image,
                output,
                *limit,
                participants.as_deref(),
                scene_id,
                config.as_deref(),
                *quiet,
            ),
            Commands::Report {
                participants,
                participant,
                max_texture,
                config,
            } => report::execute(participants, participant, *max_texture, config.as_deref()),
        }
    }
}

/// Load the config file if one was given, defaults otherwise
pub(crate) fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<crate::config::SplitterConfig> {
    Ok(match path {
        Some(path) => crate::config::SplitterConfig::load(path)?,
        None => crate::config::SplitterConfig::default(),
    })
}

/// Multi-threaded runtime for the async pipeline
pub(crate) fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread().enable_all().build()?)
}
