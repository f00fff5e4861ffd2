//! Manager Implementation
//!
//! Spawns and coordinates the three background loops. All shared bookkeeping
//! lives in `DashMap`s and atomics; job hand-off between the search core and
//! the dispatch loop goes through a bounded channel, never a raw shared list.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::types::{CoworkerRecord, CoworkerState, ManagerConfig};
use crate::comm::{CommunicationLayer, ComputationResult, CoworkerId, Job};
use crate::events::{EventEmitter, SearchEvent};
use crate::graph::{DomainPoint, EdgeLabel, Evaluation, PathRecord};

/// Pause before re-offering a job whose publication failed.
const PUBLISH_RETRY_DELAY: Duration = Duration::from_millis(50);

/// A collected `(original job, reported result)` pair, handed to the master
/// for merging on its own task.
pub type CollectedResult<P, A, V> = (Job<P, A, V>, ComputationResult<P, A, V>);

/// Orchestrates coworker lifecycle and job/result flow.
pub struct DistributedSearchManager<P, A, V> {
    comm: Arc<dyn CommunicationLayer<P, A, V>>,
    coworkers: Arc<DashMap<CoworkerId, CoworkerRecord>>,
    in_flight: Arc<DashMap<CoworkerId, Job<P, A, V>>>,
    job_tx: mpsc::Sender<Job<P, A, V>>,
    pending_jobs: Arc<AtomicUsize>,
    idle_count: Arc<AtomicUsize>,
    shutting_down: Arc<AtomicBool>,
}

impl<P, A, V> DistributedSearchManager<P, A, V>
where
    P: DomainPoint,
    A: EdgeLabel,
    V: Evaluation,
{
    /// Starts the three background loops and returns the manager handle
    /// together with the receiver of collected results.
    pub fn start(
        comm: Arc<dyn CommunicationLayer<P, A, V>>,
        config: ManagerConfig,
        events: EventEmitter<P>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<CollectedResult<P, A, V>>) {
        let (job_tx, job_rx) = mpsc::channel(config.job_queue_capacity);
        let (idle_tx, idle_rx) = mpsc::unbounded_channel();
        let (merge_tx, merge_rx) = mpsc::unbounded_channel();

        let manager = Arc::new(Self {
            comm,
            coworkers: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
            job_tx,
            pending_jobs: Arc::new(AtomicUsize::new(0)),
            idle_count: Arc::new(AtomicUsize::new(0)),
            shutting_down: Arc::new(AtomicBool::new(false)),
        });

        tracing::info!("Starting distributed search manager");

        {
            let manager = manager.clone();
            let idle_tx = idle_tx.clone();
            let interval = config.discovery_interval;
            tokio::spawn(async move {
                manager.discovery_loop(idle_tx, interval).await;
            });
        }

        {
            let manager = manager.clone();
            let events = events.clone();
            let idle_tx = idle_tx.clone();
            tokio::spawn(async move {
                manager.dispatch_loop(job_rx, idle_rx, idle_tx, events).await;
            });
        }

        {
            let manager = manager.clone();
            let interval = config.collection_interval;
            tokio::spawn(async move {
                manager.collection_loop(merge_tx, idle_tx, interval).await;
            });
        }

        (manager, merge_rx)
    }

    /// Enqueues a job for remote execution. Called by the search core; blocks
    /// while the bounded pending-job queue is full.
    pub async fn distribute_nodes_remotely(&self, paths: Vec<PathRecord<P, A, V>>) {
        let job = Job::new(paths);
        self.pending_jobs.fetch_add(1, Ordering::SeqCst);
        if self.job_tx.send(job).await.is_err() {
            self.pending_jobs.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!("Dispatch loop is gone; job dropped");
        }
    }

    /// True while any frontier responsibility is away from the master: a job
    /// is waiting for dispatch or a coworker holds one in flight. Termination
    /// of the master search requires this to be false.
    pub fn is_busy(&self) -> bool {
        self.pending_jobs.load(Ordering::SeqCst) > 0 || !self.in_flight.is_empty()
    }

    /// Number of coworkers currently waiting in the idle queue.
    pub fn idle_coworkers(&self) -> usize {
        self.idle_count.load(Ordering::SeqCst)
    }

    /// Number of jobs accepted but not yet paired with a coworker.
    pub fn pending_jobs(&self) -> usize {
        self.pending_jobs.load(Ordering::SeqCst)
    }

    /// Number of jobs currently held by coworkers.
    pub fn jobs_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn coworker_state(&self, id: &CoworkerId) -> Option<CoworkerState> {
        self.coworkers.get(id).map(|record| record.state)
    }

    /// Detaches every known coworker, idle or busy. In-flight jobs are not
    /// recalled; their results are still collected if they ever arrive.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        tracing::info!("Shutting down manager; detaching {} coworker(s)", self.coworkers.len());

        let ids: Vec<CoworkerId> = self.coworkers.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Err(e) = self.comm.detach_coworker(&id).await {
                tracing::warn!("Failed to detach {}: {}", id, e);
            }
            if let Some(mut record) = self.coworkers.get_mut(&id) {
                record.state = CoworkerState::Detached;
            }
        }
    }

    async fn discovery_loop(
        self: Arc<Self>,
        idle_tx: mpsc::UnboundedSender<CoworkerId>,
        interval: std::time::Duration,
    ) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if self.shutting_down.load(Ordering::SeqCst) {
                break;
            }

            let new_coworkers = match self.comm.detect_new_coworkers().await {
                Ok(ids) => ids,
                Err(e) => {
                    tracing::warn!("Coworker discovery failed: {}", e);
                    continue;
                }
            };

            for id in new_coworkers {
                if self.coworkers.contains_key(&id) {
                    tracing::warn!("Coworker {} registered twice; ignoring", id);
                    continue;
                }
                if let Err(e) = self.comm.attach_coworker(&id).await {
                    tracing::warn!("Failed to attach {}: {}", id, e);
                    continue;
                }
                tracing::info!("Attached coworker {}", id);
                self.coworkers
                    .insert(id.clone(), CoworkerRecord::idle(id.clone()));
                self.idle_count.fetch_add(1, Ordering::SeqCst);
                if idle_tx.send(id).is_err() {
                    return;
                }
            }
        }
    }

    async fn dispatch_loop(
        self: Arc<Self>,
        mut job_rx: mpsc::Receiver<Job<P, A, V>>,
        mut idle_rx: mpsc::UnboundedReceiver<CoworkerId>,
        idle_tx: mpsc::UnboundedSender<CoworkerId>,
        events: EventEmitter<P>,
    ) {
        // Blocks until both a pending job and an idle coworker exist.
        while let Some(job) = job_rx.recv().await {
            // The job stays counted in `pending_jobs` until a publish
            // succeeds, so `is_busy` covers it through every retry; a failed
            // publish never discards the job, it is offered to the next idle
            // coworker after a short pause.
            loop {
                let coworker = loop {
                    let Some(candidate) = idle_rx.recv().await else {
                        return;
                    };
                    self.idle_count.fetch_sub(1, Ordering::SeqCst);
                    let detached = self
                        .coworker_state(&candidate)
                        .map_or(true, |state| state == CoworkerState::Detached);
                    if detached {
                        tracing::debug!("Skipping detached coworker {}", candidate);
                        continue;
                    }
                    break candidate;
                };

                // The pairing is recorded before the pending count drops, so
                // `is_busy` covers the job without a gap.
                self.in_flight.insert(coworker.clone(), job.clone());
                if let Some(mut record) = self.coworkers.get_mut(&coworker) {
                    record.state = CoworkerState::Assigned;
                }

                match self.comm.create_job(&coworker, &job).await {
                    Ok(()) => {
                        self.pending_jobs.fetch_sub(1, Ordering::SeqCst);
                        tracing::debug!("Job {} handed to {}", job.id.0, coworker);
                        for path in &job.paths {
                            if let Some(leaf) = path.leaf() {
                                events.emit(SearchEvent::NodeDistributed {
                                    point: leaf.point.clone(),
                                });
                            }
                        }
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Failed to publish job {} for {}: {}; retrying",
                            job.id.0,
                            coworker,
                            e
                        );
                        self.in_flight.remove(&coworker);
                        if let Some(mut record) = self.coworkers.get_mut(&coworker) {
                            record.state = CoworkerState::Idle;
                        }
                        self.idle_count.fetch_add(1, Ordering::SeqCst);
                        let _ = idle_tx.send(coworker);
                        tokio::time::sleep(PUBLISH_RETRY_DELAY).await;
                    }
                }
            }
        }
    }

    async fn collection_loop(
        self: Arc<Self>,
        merge_tx: mpsc::UnboundedSender<CollectedResult<P, A, V>>,
        idle_tx: mpsc::UnboundedSender<CoworkerId>,
        interval: std::time::Duration,
    ) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;

            let busy: Vec<(CoworkerId, Job<P, A, V>)> = self
                .in_flight
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect();

            if busy.is_empty() && self.shutting_down.load(Ordering::SeqCst) {
                break;
            }

            for (id, job) in busy {
                let result = match self.comm.read_result(&id).await {
                    Ok(Some(result)) => result,
                    Ok(None) => {
                        tracing::trace!("No result from {} yet", id);
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!("Result poll for {} failed: {}", id, e);
                        continue;
                    }
                };

                tracing::info!(
                    "Collected result of job {} from {} ({} open, {} solutions)",
                    job.id.0,
                    id,
                    result.open.len(),
                    result.solutions.len()
                );

                // Forward before clearing the slot so `is_busy` never reads
                // false while a collected result is invisible to the master.
                if merge_tx.send((job, result)).is_err() {
                    tracing::warn!("Master is gone; dropping result of {}", id);
                }
                self.in_flight.remove(&id);

                let detached = self
                    .coworker_state(&id)
                    .map_or(true, |state| state == CoworkerState::Detached);
                if detached {
                    tracing::info!("Coworker {} detached after its final result", id);
                    continue;
                }
                if let Some(mut record) = self.coworkers.get_mut(&id) {
                    record.state = CoworkerState::Idle;
                }
                self.idle_count.fetch_add(1, Ordering::SeqCst);
                let _ = idle_tx.send(id);
            }
        }
    }
}
