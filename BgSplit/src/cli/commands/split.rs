//! CLI command for splitting an image against local storage

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use super::{load_config, runtime};
use crate::capability::report_capability;
use crate::cli::progress::{DISK, LOOKING_GLASS, PICTURE, RULER, print_done, print_step, simple_spinner};
use crate::host::fs::{FsImageSource, FsTileStorage, JsonParticipantStore, JsonSceneStore};
use crate::host::memory::MemoryParticipantStore;
use crate::host::{GenerationStorage, Host, HostInfo, ParticipantStore, StorageProvider, TracingNotifier, select_storage};
use crate::pipeline::{Actor, BackgroundUpdate, SkipReason, SplitOutcome, Splitter};
use crate::planner::plan_grid;
use crate::scene::{ParticipantId, Scene, SceneId};

/// Participant recorded when the limit comes from the command line
const CLI_PARTICIPANT: &str = "cli";

pub fn execute(
    image: &Path,
    output: &Path,
    limit: Option<u32>,
    participants: Option<&Path>,
    scene_id: &str,
    config: Option<&Path>,
    quiet: bool,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config)?;

    if !quiet {
        print_step(1, 3, LOOKING_GLASS, "Reading image header...");
    }
    let (width, height) = image::image_dimensions(image)?;
    let src = std::fs::canonicalize(image)?.to_string_lossy().into_owned();

    if !quiet {
        if let Some(limit) = limit {
            if let Ok(plan) = plan_grid(width, height, limit, config.padding) {
                print_step(
                    2,
                    3,
                    RULER,
                    &format!("Planning {width}x{height} as {}x{} tiles...", plan.cols, plan.rows),
                );
            }
        } else {
            print_step(2, 3, RULER, "Reading participant limits...");
        }
    }

    std::fs::create_dir_all(output)?;
    let scenes = Arc::new(JsonSceneStore::new(output.join("scene.json")));
    let participant_store: Arc<dyn ParticipantStore> = match participants {
        Some(path) => Arc::new(JsonParticipantStore::new(path)),
        None => Arc::new(MemoryParticipantStore::new()),
    };

    let providers: Vec<Box<dyn StorageProvider>> = vec![Box::new(GenerationStorage::new(
        "local-directory",
        0,
        None,
        Arc::new(FsTileStorage::new(output)),
    ))];
    let storage = select_storage(&providers, HostInfo { generation: 0 })
        .ok_or_else(|| anyhow::anyhow!("no tile storage available"))?;

    let host = Host {
        participants: Arc::clone(&participant_store),
        images: Arc::new(FsImageSource::new(".")),
        storage,
        scenes: scenes.clone(),
        notifier: Arc::new(TracingNotifier),
    };
    let splitter = Splitter::new(config, host)?;

    let scene_id = SceneId::new(scene_id);
    let event = BackgroundUpdate {
        scene: scene_id.clone(),
        new_src: Some(src.clone()),
        actor: Actor {
            participant: ParticipantId::new(CLI_PARTICIPANT),
            privileged: true,
        },
    };

    if !quiet {
        print_step(3, 3, PICTURE, "Splitting background...");
    }
    let spinner = (!quiet).then(|| simple_spinner("Rendering and writing tiles"));

    let outcome = runtime()?.block_on(async {
        scenes
            .upsert_scene(Scene::new(scene_id.clone(), width, height, Some(src)))
            .await?;
        if let Some(limit) = limit {
            report_capability(
                participant_store.as_ref(),
                &ParticipantId::new(CLI_PARTICIPANT),
                &splitter.config().module_id,
                limit,
            )
            .await?;
        }
        splitter.handle_background_update(&event).await
    });

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    match outcome? {
        SplitOutcome::Split(report) => {
            println!(
                "{}Wrote {} tiles ({}x{}) to {}",
                DISK,
                report.tile_count(),
                report.cols,
                report.rows,
                output.display()
            );
            if report.removed > 0 {
                println!("Replaced {} tiles from a previous split", report.removed);
            }
        }
        SplitOutcome::Skipped(SkipReason::FitsWithinLimit { width, height, limit }) => {
            println!("{width}x{height} already fits within {limit}px; nothing to do");
        }
        SplitOutcome::Skipped(reason) => {
            println!("Skipped: {reason:?}");
        }
    }

    if !quiet {
        print_done(start.elapsed());
    }
    Ok(())
}
