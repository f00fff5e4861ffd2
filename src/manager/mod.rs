//! Distributed Search Manager Module
//!
//! Orchestrates coworker lifecycle and job/result flow on top of a
//! [`CommunicationLayer`](crate::comm::CommunicationLayer). The manager owns
//! the idle-coworker queue, the bounded pending-job queue, and the in-flight
//! map, and runs three background loops:
//!
//! 1. **Discovery**: periodically detects newly registered coworkers, attaches
//!    them, and enqueues them as idle.
//! 2. **Dispatch**: waits until both a pending job and an idle coworker exist,
//!    records the pairing in the in-flight map, and publishes the job.
//! 3. **Collection**: periodically polls for results of busy coworkers, hands
//!    each `(job, result)` pair to the master's merge channel, and returns the
//!    coworker to the idle queue.
//!
//! ## Known limitation
//! There is no coworker-failure recovery: a coworker that accepts a job and
//! never reports keeps its in-flight slot forever, and
//! [`DistributedSearchManager::is_busy`](manager::DistributedSearchManager::is_busy)
//! stays true, which blocks master termination. A bounded job lease with
//! timeout-triggered requeue would lift this.

pub mod manager;
pub mod types;

pub use manager::DistributedSearchManager;
pub use types::{CoworkerRecord, CoworkerState, ManagerConfig};

#[cfg(test)]
mod tests;
