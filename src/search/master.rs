//! Master Role
//!
//! Runs the sequential core, offloads frontier slices through the manager,
//! and folds collected results back into the local view. All merging happens
//! on the caller's task between expansion steps; the core is never touched
//! concurrently.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::engine::BestFirstSearch;
use super::traits::{GraphGenerator, NodeEvaluator};
use crate::comm::{CommunicationLayer, ComputationResult, Job};
use crate::events::EventEmitter;
use crate::graph::{DomainPoint, EdgeLabel, Evaluation};
use crate::manager::{DistributedSearchManager, ManagerConfig};

type Merged<P, A, V> = mpsc::UnboundedReceiver<(Job<P, A, V>, ComputationResult<P, A, V>)>;

/// The master participant: a best-first search that distributes work.
pub struct DistributedOrSearchMaster<P, A, V> {
    core: BestFirstSearch<P, A, V>,
    manager: Arc<DistributedSearchManager<P, A, V>>,
    merged: Merged<P, A, V>,
    /// Pause while the local frontier is empty but remote work is pending.
    wait_interval: Duration,
}

impl<P, A, V> DistributedOrSearchMaster<P, A, V>
where
    P: DomainPoint,
    A: EdgeLabel,
    V: Evaluation,
{
    /// Builds the core, seeds it with the generator's roots, and starts the
    /// manager's background loops. The communication layer must already be
    /// initialized by the caller.
    pub fn new(
        generator: Arc<dyn GraphGenerator<P, A>>,
        evaluator: Arc<dyn NodeEvaluator<P, V>>,
        comm: Arc<dyn CommunicationLayer<P, A, V>>,
        config: ManagerConfig,
        events: EventEmitter<P>,
    ) -> Self {
        let mut core = BestFirstSearch::new(generator, evaluator, events.clone());
        core.init();
        let (manager, merged) = DistributedSearchManager::start(comm, config, events);
        Self {
            core,
            manager,
            merged,
            wait_interval: Duration::from_millis(50),
        }
    }

    /// Produces the next solution, or `None` once the combined search is
    /// exhausted: the local frontier is empty, no job is pending or in
    /// flight, and no collected result remains unmerged.
    pub async fn next_solution(&mut self) -> Option<Vec<P>> {
        loop {
            self.merge_collected();

            if let Some(solution) = self.core.pop_solution() {
                return Some(solution);
            }

            if self.core.open_is_empty() {
                if self.manager.is_busy() {
                    tracing::trace!("Local frontier empty; waiting for remote results");
                    tokio::time::sleep(self.wait_interval).await;
                    continue;
                }
                // A result may have been collected between the busy check and
                // now; only terminate when a final drain finds nothing.
                if self.merge_collected() {
                    continue;
                }
                tracing::info!("Search exhausted; no further solutions");
                return None;
            }

            self.offload().await;
            self.core.step();
        }
    }

    /// Number of domain points materialized locally.
    pub fn graph_size(&self) -> usize {
        self.core.graph_size()
    }

    /// Detaches all coworkers. Call after the last `next_solution`.
    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }

    /// Offloads one single-path job per spare idle coworker, keeping the
    /// current best node local.
    async fn offload(&mut self) {
        let spare = self
            .manager
            .idle_coworkers()
            .saturating_sub(self.manager.pending_jobs());
        if spare == 0 {
            return;
        }
        for path in self.core.drain_for_offload(spare) {
            self.manager.distribute_nodes_remotely(vec![path]).await;
        }
    }

    /// Folds every collected result into the core. Returns whether anything
    /// was merged. A malformed record aborts its own merge with an error log;
    /// the remaining records and the search itself continue.
    fn merge_collected(&mut self) -> bool {
        let mut merged_any = false;
        while let Ok((job, result)) = self.merged.try_recv() {
            merged_any = true;
            if result.is_dead_end() {
                tracing::warn!(
                    "Coworker {} reported a dead end for job {}",
                    result.coworker,
                    job.id.0
                );
            }
            tracing::debug!(
                "Merging result of job {}: {} open, {} solution(s)",
                job.id.0,
                result.open.len(),
                result.solutions.len()
            );

            for record in &result.open {
                if let Err(e) = self.core.reinsert_open(record) {
                    tracing::error!("Dropping unmergeable open path: {}", e);
                }
            }
            for record in &result.solutions {
                if let Err(e) = self.core.absorb_solution_path(record) {
                    tracing::error!("Dropping unmergeable solution path: {}", e);
                }
            }
            // Distributed leaves whose responsibility was not handed back as
            // open nodes are resolved remotely.
            for path in &job.paths {
                if let Some(leaf) = path.leaf() {
                    self.core.mark_closed(&leaf.point);
                }
            }
        }
        merged_any
    }
}
