//! Coworker Role
//!
//! A coworker registers with the communication layer, polls for jobs, and
//! runs each on a fresh search core bootstrapped from the job's paths. Every
//! job gets its own core from the domain factory; no state carries over
//! between jobs, so a coworker's view is always exactly the slice it was
//! handed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::engine::BestFirstSearch;
use crate::comm::{CommError, CommunicationLayer, ComputationResult, CoworkerId, Job};
use crate::graph::{DomainPoint, EdgeLabel, Evaluation};

/// Tunables of one coworker process.
#[derive(Debug, Clone)]
pub struct CoworkerConfig {
    /// Total time this coworker stays available. A job accepted before the
    /// uptime elapses is still run to completion.
    pub uptime: Duration,
    /// Wall-clock budget of a single job's sub-search.
    pub search_budget: Duration,
    /// Pause between job polls.
    pub poll_interval: Duration,
}

impl Default for CoworkerConfig {
    fn default() -> Self {
        Self {
            uptime: Duration::from_secs(30),
            search_budget: Duration::from_secs(1),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Builds a fresh search core for one job; the domain is reconstructed
/// per participant, never transmitted.
pub type SearchFactory<P, A, V> = Arc<dyn Fn() -> BestFirstSearch<P, A, V> + Send + Sync>;

/// The coworker participant.
pub struct DistributedOrSearchCoworker<P, A, V> {
    comm: Arc<dyn CommunicationLayer<P, A, V>>,
    id: CoworkerId,
    config: CoworkerConfig,
    factory: SearchFactory<P, A, V>,
}

impl<P, A, V> DistributedOrSearchCoworker<P, A, V>
where
    P: DomainPoint,
    A: EdgeLabel,
    V: Evaluation,
{
    pub fn new(
        comm: Arc<dyn CommunicationLayer<P, A, V>>,
        id: CoworkerId,
        config: CoworkerConfig,
        factory: SearchFactory<P, A, V>,
    ) -> Self {
        Self {
            comm,
            id,
            config,
            factory,
        }
    }

    pub fn id(&self) -> &CoworkerId {
        &self.id
    }

    /// Signals availability and serves jobs. Retirement takes both clocks
    /// into account: the coworker keeps polling until its uptime has elapsed
    /// and the master has released its attachment, so a job published right
    /// at the uptime boundary is still picked up and answered. On exit a
    /// coworker whose availability was never consumed unregisters; an
    /// attached one detaches.
    pub async fn cowork(&self) -> Result<(), CommError> {
        tracing::info!("Coworker {} starting (uptime {:?})", self.id, self.config.uptime);
        self.comm.register(&self.id).await?;
        let retire_at = Instant::now() + self.config.uptime;

        loop {
            if Instant::now() >= retire_at && !self.comm.is_attached(&self.id).await? {
                break;
            }
            match self.comm.fetch_job(&self.id).await {
                Ok(Some(job)) => self.process_job(job).await?,
                Ok(None) => tokio::time::sleep(self.config.poll_interval).await,
                Err(e @ CommError::Retrieval { .. }) => {
                    // The record stays in place; try again next poll.
                    tracing::warn!("Job poll failed: {}; retrying", e);
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                Err(e) => return Err(e),
            }
        }

        if self.comm.is_attached(&self.id).await? {
            tracing::info!("Coworker {} retiring; detaching", self.id);
            self.comm.detach_coworker(&self.id).await?;
        } else {
            tracing::info!("Coworker {} retiring unclaimed; unregistering", self.id);
            self.comm.unregister(&self.id).await?;
        }
        Ok(())
    }

    /// Runs one job to exhaustion or budget and reports the outcome. Jobs
    /// that cannot be run (empty, or with unreconstructable paths) are
    /// reported as empty results so the master's in-flight slot clears.
    async fn process_job(&self, job: Job<P, A, V>) -> Result<(), CommError> {
        tracing::info!(
            "Coworker {} accepted job {} ({} path(s))",
            self.id,
            job.id.0,
            job.paths.len()
        );

        if job.paths.is_empty() {
            tracing::warn!("Job {} carries no paths; skipping", job.id.0);
            return self.report(ComputationResult {
                coworker: self.id.clone(),
                open: vec![],
                solutions: vec![],
            })
            .await;
        }

        let mut core = (self.factory)();
        if let Err(e) = core.bootstrap(&job.paths) {
            tracing::error!("Job {} could not be bootstrapped: {}", job.id.0, e);
            return self.report(ComputationResult {
                coworker: self.id.clone(),
                open: vec![],
                solutions: vec![],
            })
            .await;
        }

        let deadline = Instant::now() + self.config.search_budget;
        let mut steps = 0u64;
        while Instant::now() < deadline && core.step() {
            steps += 1;
        }
        tracing::debug!("Job {} expanded {} node(s)", job.id.0, steps);

        let result = ComputationResult {
            coworker: self.id.clone(),
            open: core.open_snapshot(),
            solutions: core.drain_solution_records(),
        };
        if result.is_dead_end() {
            tracing::warn!("Job {} ran into a dead end", job.id.0);
        }
        self.report(result).await
    }

    async fn report(&self, result: ComputationResult<P, A, V>) -> Result<(), CommError> {
        self.comm.report_result(&self.id, &result).await
    }
}
