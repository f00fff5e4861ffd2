use serde::{Deserialize, Serialize};

use crate::graph::PathRecord;

/// Identity of a coworker process within one communication folder/channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CoworkerId(pub String);

impl CoworkerId {
    /// Generates a random UUID v4-based identity.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for CoworkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier of a dispatched job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct JobId(pub String);

impl JobId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

/// A batch of frontier-node paths dispatched to one coworker.
///
/// Each path carries the full route from a root to the frontier node, so the
/// receiving coworker can reconstruct the ancestors into its own local graph
/// before treating the leaf as an open item. Jobs are ephemeral: created by
/// the manager, retired by the coworker's fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job<P, A, V> {
    pub id: JobId,
    pub paths: Vec<PathRecord<P, A, V>>,
}

impl<P, A, V> Job<P, A, V> {
    pub fn new(paths: Vec<PathRecord<P, A, V>>) -> Self {
        Self {
            id: JobId::new(),
            paths,
        }
    }
}

/// What a coworker reports back after running one job: its residual open
/// frontier and any solutions, both as root-to-node paths. Produced once per
/// job, consumed exactly once by the manager's collection loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationResult<P, A, V> {
    pub coworker: CoworkerId,
    pub open: Vec<PathRecord<P, A, V>>,
    pub solutions: Vec<PathRecord<P, A, V>>,
}

impl<P, A, V> ComputationResult<P, A, V> {
    /// A result that carries neither residual frontier nor solutions: the
    /// coworker ran its slice into a dead end.
    pub fn is_dead_end(&self) -> bool {
        self.open.is_empty() && self.solutions.is_empty()
    }
}
