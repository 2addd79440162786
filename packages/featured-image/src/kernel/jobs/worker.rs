//! Generation worker.
//!
//! Receives post ids from the `GenerationQueue` and runs the pipeline for
//! each one on its own task. Runs share nothing but the injected
//! dependencies; the per-post claim in the store keeps them exclusive.

use anyhow::Result;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::queue::GenerationReceiver;
use crate::common::PostId;
use crate::domains::featured_image::activities::{generate_featured_image, RunOutcome};
use crate::kernel::ServerDeps;

pub struct GenerationWorker {
    deps: ServerDeps,
    receiver: GenerationReceiver,
}

impl GenerationWorker {
    pub fn new(deps: ServerDeps, receiver: GenerationReceiver) -> Self {
        Self { deps, receiver }
    }

    /// Process runs until `shutdown` fires or every sender is dropped, then
    /// wait for in-flight runs.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        info!("Generation worker started");
        let mut in_flight: JoinSet<(PostId, Result<RunOutcome>)> = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Generation worker shutting down");
                    break;
                }
                next = self.receiver.recv() => {
                    let Some(post_id) = next else {
                        info!("Generation queue closed");
                        break;
                    };
                    if !self.deps.queue.take(post_id) {
                        debug!(post_id = %post_id, "Skipping run that is no longer pending");
                        continue;
                    }
                    let deps = self.deps.clone();
                    in_flight.spawn(async move {
                        (post_id, generate_featured_image(post_id, &deps).await)
                    });
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    report(joined);
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            report(joined);
        }
        info!("Generation worker stopped");
        Ok(())
    }
}

fn report(joined: std::result::Result<(PostId, Result<RunOutcome>), tokio::task::JoinError>) {
    match joined {
        Ok((post_id, Ok(outcome))) => {
            debug!(post_id = %post_id, outcome = ?outcome, "Generation run finished");
        }
        Ok((post_id, Err(e))) => {
            error!(post_id = %post_id, error = %e, "Generation run could not complete");
        }
        Err(e) => {
            error!(error = %e, "Generation task panicked");
        }
    }
}
