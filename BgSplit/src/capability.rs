//! Client texture capability reporting and aggregation
//!
//! Each client stores its maximum texture dimension under the module's flag
//! namespace once per session. Before splitting, the smallest reported value
//! across all participants becomes the binding limit.
//!
//! SPDX-FileCopyrightText: 2025 CyberDeco
//! SPDX-License-Identifier: MIT

use crate::error::Result;
use crate::host::ParticipantStore;
use crate::scene::ParticipantId;

/// Flag key holding a participant's maximum texture dimension.
pub const CAPABILITY_KEY: &str = "minTextureSize";

/// Record `max_texture` for `participant`.
///
/// Does nothing when the stored value already matches. Otherwise the whole
/// namespace is cleared before the new value is written. Returns whether a
/// write happened.
pub async fn report_capability(
    store: &dyn ParticipantStore,
    participant: &ParticipantId,
    namespace: &str,
    max_texture: u32,
) -> Result<bool> {
    let current = store.get_flag(participant, namespace, CAPABILITY_KEY).await?;
    if current == Some(max_texture) {
        return Ok(false);
    }

    store.clear_namespace(participant, namespace).await?;
    store
        .set_flag(participant, namespace, CAPABILITY_KEY, max_texture)
        .await?;

    tracing::info!(%participant, max_texture, previous = ?current, "Updated max texture flag");
    Ok(true)
}

/// The binding limit: the minimum of all reported values, `None` if there are none.
pub fn aggregate_capacity<I>(values: I) -> Option<u32>
where
    I: IntoIterator<Item = u32>,
{
    values.into_iter().min()
}

/// Read every participant's reported limit and aggregate them.
pub async fn collect_capacity(store: &dyn ParticipantStore, namespace: &str) -> Result<Option<u32>> {
    let participants = store.participants().await?;
    let mut reported = Vec::with_capacity(participants.len());
    for participant in &participants {
        if let Some(value) = store.get_flag(participant, namespace, CAPABILITY_KEY).await? {
            reported.push(value);
        }
    }

    tracing::debug!(
        participants = participants.len(),
        reported = reported.len(),
        "Collected texture capabilities"
    );
    Ok(aggregate_capacity(reported))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryParticipantStore;

    const NS: &str = "bg-texture-size-fix";

    #[test]
    fn test_aggregate_empty_is_none() {
        assert_eq!(aggregate_capacity(Vec::new()), None);
    }

    #[test]
    fn test_aggregate_takes_minimum() {
        assert_eq!(aggregate_capacity([16384, 4096, 8192]), Some(4096));
        assert_eq!(aggregate_capacity([0, 4096]), Some(0));
    }

    #[tokio::test]
    async fn test_report_is_idempotent() {
        let store = MemoryParticipantStore::new();
        let gm = ParticipantId::new("gm");

        assert!(report_capability(&store, &gm, NS, 8192).await.unwrap());
        let writes = store.write_count();
        assert!(!report_capability(&store, &gm, NS, 8192).await.unwrap());
        assert_eq!(store.write_count(), writes);

        assert!(report_capability(&store, &gm, NS, 4096).await.unwrap());
        assert_eq!(store.get_flag(&gm, NS, CAPABILITY_KEY).await.unwrap(), Some(4096));
    }

    #[tokio::test]
    async fn test_report_clears_stale_namespace_keys() {
        let store = MemoryParticipantStore::new();
        let gm = ParticipantId::new("gm");
        store.set_flag(&gm, NS, "legacyKey", 1).await.unwrap();

        report_capability(&store, &gm, NS, 8192).await.unwrap();
        assert_eq!(store.get_flag(&gm, NS, "legacyKey").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_collect_skips_unreported() {
        let store = MemoryParticipantStore::new();
        store.add_participant("silent");
        report_capability(&store, &ParticipantId::new("gm"), NS, 16384).await.unwrap();
        report_capability(&store, &ParticipantId::new("laptop"), NS, 4096).await.unwrap();

        assert_eq!(collect_capacity(&store, NS).await.unwrap(), Some(4096));
    }

    #[tokio::test]
    async fn test_collect_with_no_reports() {
        let store = MemoryParticipantStore::new();
        store.add_participant("silent");
        assert_eq!(collect_capacity(&store, NS).await.unwrap(), None);
    }
}
