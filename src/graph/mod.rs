//! Local Graph Module
//!
//! Each participant (master or coworker) maintains its own partial view of the
//! search space. Nodes are deduplicated by their domain point: one
//! [`SearchNode`](types::SearchNode) per point per participant, ever.
//!
//! ## Core Mechanisms
//! - **Value identity**: domain points cross process boundaries by value, never
//!   by reference. The unit of exchange is a [`PathRecord`](types::PathRecord),
//!   a root-to-node path carrying edge labels and evaluations.
//! - **Path reconstruction**: [`LocalGraphIndex::insert_path`](index::LocalGraphIndex::insert_path)
//!   rebuilds the ancestors of a reported path into the local graph. The
//!   operation is idempotent; re-inserting a fully known path mutates nothing.
//! - **Ownership**: the index owns its nodes via `Arc`; parent links are weak,
//!   so the graph is a tree rooted in the index with no reference cycles.

pub mod index;
pub mod types;

pub use index::LocalGraphIndex;
pub use types::{DomainPoint, EdgeLabel, Evaluation, GraphError, PathRecord, PathStep, SearchNode};
