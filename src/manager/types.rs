use std::time::Duration;

use crate::comm::CoworkerId;

/// Manager-side view of a coworker's lifecycle.
///
/// The remote `Busy`/`ReportingResult` phases of the protocol are not
/// observable through an asynchronous layer, so the manager keeps a coworker
/// in `Assigned` from job publication until its result is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoworkerState {
    /// Attached and waiting in the idle queue.
    Idle,
    /// A job has been published for this coworker and no result has been
    /// collected yet.
    Assigned,
    /// Detach requested; takes effect once the coworker is not assigned.
    Detached,
}

/// Bookkeeping record for one known coworker.
#[derive(Debug, Clone)]
pub struct CoworkerRecord {
    pub id: CoworkerId,
    pub state: CoworkerState,
}

impl CoworkerRecord {
    pub fn idle(id: CoworkerId) -> Self {
        Self {
            id,
            state: CoworkerState::Idle,
        }
    }
}

/// Tunables of the manager's background loops.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Pause between coworker-discovery rounds.
    pub discovery_interval: Duration,
    /// Pause between result-collection rounds.
    pub collection_interval: Duration,
    /// Capacity of the pending-job queue; producers block when it is full.
    pub job_queue_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            discovery_interval: Duration::from_millis(500),
            collection_interval: Duration::from_millis(500),
            job_queue_capacity: 16,
        }
    }
}
