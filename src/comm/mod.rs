//! Communication Layer Module
//!
//! Defines the asynchronous channel between the master's manager and its
//! coworker processes: coworker discovery, job delivery, result delivery, and
//! attach/detach presence signaling.
//!
//! ## Contract
//! Any transport (shared directory, message queue, RPC) may implement
//! [`CommunicationLayer`], but every implementation must uphold the same
//! guarantees:
//! - **Exactly-once discovery**: `detect_new_coworkers` never re-reports an
//!   identity it already delivered.
//! - **Atomic publication**: a concurrent reader of a job or result record
//!   observes either the complete prior record or the complete new one, never
//!   a partial write. The reference strategy is stage-then-atomic-rename.
//! - **Consumed-once records**: a successful `fetch_job`/`read_result` retires
//!   the published record.
//! - **Transient fault surfacing**: a record that cannot be parsed is retried
//!   a bounded number of times with backoff; exhaustion is a transient
//!   condition (the writer may still be mid-flight), never proof of job loss.
//!
//! ## Submodules
//! - **`types`**: serializable record types exchanged through the layer.
//! - **`error`**: the layer's error taxonomy.
//! - **`folder`**: reference implementation over a shared directory with one
//!   sentinel file per record.

pub mod error;
pub mod folder;
pub mod types;

pub use error::CommError;
pub use folder::FolderCommLayer;
pub use types::{ComputationResult, CoworkerId, Job, JobId};

use async_trait::async_trait;

use crate::graph::{DomainPoint, EdgeLabel, Evaluation};

/// Abstract asynchronous channel between a manager and its coworkers.
///
/// The master side calls `detect_new_coworkers`, `attach_coworker`,
/// `create_job` and `read_result`; the coworker side calls `register`,
/// `fetch_job` and `report_result`. Presence calls are shared.
#[async_trait]
pub trait CommunicationLayer<P, A, V>: Send + Sync
where
    P: DomainPoint,
    A: EdgeLabel,
    V: Evaluation,
{
    /// Non-blocking; returns identities that signaled availability since the
    /// last call, exactly once each.
    async fn detect_new_coworkers(&self) -> Result<Vec<CoworkerId>, CommError>;

    /// Marks a coworker as attached to this master. Idempotent.
    async fn attach_coworker(&self, id: &CoworkerId) -> Result<(), CommError>;

    async fn is_attached(&self, id: &CoworkerId) -> Result<bool, CommError>;

    /// Removes the attachment marker. Idempotent; must not remove a job
    /// currently in flight.
    async fn detach_coworker(&self, id: &CoworkerId) -> Result<(), CommError>;

    /// Publishes a job for the given coworker with all-or-nothing visibility.
    async fn create_job(&self, id: &CoworkerId, job: &Job<P, A, V>) -> Result<(), CommError>;

    /// Non-blocking poll for a published job; a successful read retires the
    /// record. Fails with [`CommError::Retrieval`] when the record exists but
    /// cannot be parsed after the bounded retry budget: a transient fault,
    /// not an assertion of job loss.
    async fn fetch_job(&self, id: &CoworkerId) -> Result<Option<Job<P, A, V>>, CommError>;

    /// Publishes a computation result with the same atomicity guarantee as
    /// job publication.
    async fn report_result(
        &self,
        id: &CoworkerId,
        result: &ComputationResult<P, A, V>,
    ) -> Result<(), CommError>;

    /// Non-blocking poll for a reported result; `Ok(None)` both when nothing
    /// has been published yet and when a present record stayed unreadable
    /// through the retry budget (it will be polled again). A successful read
    /// retires the record.
    async fn read_result(
        &self,
        id: &CoworkerId,
    ) -> Result<Option<ComputationResult<P, A, V>>, CommError>;

    /// Coworker-side availability signal picked up by `detect_new_coworkers`.
    async fn register(&self, id: &CoworkerId) -> Result<(), CommError>;

    /// Withdraws an availability signal that was never picked up.
    async fn unregister(&self, id: &CoworkerId) -> Result<(), CommError>;
}
