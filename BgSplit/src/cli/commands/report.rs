//! CLI command for recording a participant's texture limit

use std::path::Path;

use super::{load_config, runtime};
use crate::capability::{collect_capacity, report_capability};
use crate::host::fs::JsonParticipantStore;
use crate::scene::ParticipantId;

pub fn execute(participants: &Path, participant: &str, max_texture: u32, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let store = JsonParticipantStore::new(participants);
    let participant = ParticipantId::new(participant);

    runtime()?.block_on(async {
        let written = report_capability(&store, &participant, &config.module_id, max_texture).await?;
        if written {
            println!("Recorded {max_texture}px for {participant}");
        } else {
            println!("{participant} already reports {max_texture}px");
        }

        match collect_capacity(&store, &config.module_id).await? {
            Some(limit) => println!("Current limit across participants: {limit}px"),
            None => println!("No participant has reported a limit yet"),
        }
        Ok::<(), anyhow::Error>(())
    })
}
