//! Per-scene serialization of background updates
//!
//! Every scene with pending work gets one worker task fed by an unbounded
//! channel, so updates for the same scene run one after another while
//! different scenes proceed concurrently. A worker retires once its channel
//! is drained. Must be used from within a tokio runtime.
//!
//! SPDX-FileCopyrightText: 2025 CyberDeco
//! SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::pipeline::{BackgroundUpdate, SplitOutcome, Splitter};
use crate::scene::SceneId;

struct Job {
    event: BackgroundUpdate,
    reply: oneshot::Sender<Result<SplitOutcome>>,
}

type Workers = Arc<Mutex<HashMap<SceneId, mpsc::UnboundedSender<Job>>>>;

fn lock(workers: &Workers) -> MutexGuard<'_, HashMap<SceneId, mpsc::UnboundedSender<Job>>> {
    workers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Dispatches background updates to one worker per scene
pub struct SceneQueue {
    splitter: Arc<Splitter>,
    // Sends and worker retirement both happen under this lock
    workers: Workers,
}

impl SceneQueue {
    #[must_use]
    pub fn new(splitter: Arc<Splitter>) -> Self {
        Self {
            splitter,
            workers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Queue `event` behind any pending work for the same scene.
    pub fn submit(&self, event: BackgroundUpdate) -> oneshot::Receiver<Result<SplitOutcome>> {
        let (reply, receiver) = oneshot::channel();
        let scene = event.scene.clone();
        let mut job = Job { event, reply };

        let mut workers = lock(&self.workers);
        if let Some(sender) = workers.get(&scene) {
            match sender.send(job) {
                Ok(()) => return receiver,
                // Worker died without retiring; start a fresh one below
                Err(mpsc::error::SendError(returned)) => job = returned,
            }
        }

        let sender = self.spawn_worker(scene.clone());
        if let Err(mpsc::error::SendError(job)) = sender.send(job) {
            let _ = job.reply.send(Err(Error::QueueClosed {
                scene: scene.to_string(),
            }));
        }
        workers.insert(scene, sender);
        receiver
    }

    /// Queue `event` and wait for its outcome.
    pub async fn run(&self, event: BackgroundUpdate) -> Result<SplitOutcome> {
        let scene = event.scene.to_string();
        self.submit(event)
            .await
            .map_err(|_| Error::QueueClosed { scene })?
    }

    /// Number of scenes with a live worker
    #[must_use]
    pub fn active_scenes(&self) -> usize {
        lock(&self.workers)
            .values()
            .filter(|sender| !sender.is_closed())
            .count()
    }

    fn spawn_worker(&self, scene: SceneId) -> mpsc::UnboundedSender<Job> {
        let (sender, mut jobs) = mpsc::unbounded_channel::<Job>();
        let splitter = Arc::clone(&self.splitter);
        let workers = Arc::clone(&self.workers);

        tokio::spawn(async move {
            tracing::debug!(%scene, "Scene worker started");
            while let Some(job) = next_job(&workers, &scene, &mut jobs) {
                let outcome = splitter.handle_background_update(&job.event).await;
                if let Err(e) = &outcome {
                    tracing::warn!(%scene, error = %e, "Background split failed");
                }
                // Caller may have stopped waiting
                let _ = job.reply.send(outcome);
            }
            tracing::debug!(%scene, "Scene worker retired");
        });

        sender
    }
}

/// Next queued job, or `None` after unregistering the idle worker.
fn next_job(workers: &Workers, scene: &SceneId, jobs: &mut mpsc::UnboundedReceiver<Job>) -> Option<Job> {
    let mut workers = lock(workers);
    match jobs.try_recv() {
        Ok(job) => Some(job),
        Err(_) => {
            workers.remove(scene);
            None
        }
    }
}
