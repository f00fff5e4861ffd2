//! Best-First Search Module
//!
//! The sequential search core shared by both roles, and the two role drivers
//! built on top of it:
//!
//! - [`BestFirstSearch`] expands a min-ordered open frontier over a
//!   [`LocalGraphIndex`](crate::graph::LocalGraphIndex), one node per domain
//!   point, and exposes the frontier-manipulation hooks the distributed roles
//!   need (offload, reinsertion, solution absorption).
//! - [`DistributedOrSearchMaster`] drives a core, offloads frontier slices
//!   through a [`DistributedSearchManager`](crate::manager::DistributedSearchManager),
//!   and merges collected results back into its view.
//! - [`DistributedOrSearchCoworker`] registers with a communication layer,
//!   polls for jobs, and runs each on a fresh bootstrapped core built by a
//!   domain factory.
//!
//! The domain itself is supplied through the [`GraphGenerator`] and
//! [`NodeEvaluator`] traits; every participant reconstructs it independently.

pub mod coworker;
pub mod engine;
pub mod master;
pub mod traits;

pub use coworker::{CoworkerConfig, DistributedOrSearchCoworker, SearchFactory};
pub use engine::BestFirstSearch;
pub use master::DistributedOrSearchMaster;
pub use traits::{GraphGenerator, NodeEvaluator};

#[cfg(test)]
mod tests;
