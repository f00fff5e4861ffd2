//! Distributed Best-First OR-Graph Search Library
//!
//! This library crate defines the core modules of the distributed search engine.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of four loosely coupled subsystems plus an event sink:
//!
//! - **`comm`**: The asynchronous communication layer. Defines the contract every
//!   transport must satisfy (coworker discovery, atomic job/result exchange,
//!   attach/detach signaling) and the reference implementation over a shared
//!   directory with sentinel files.
//! - **`graph`**: The local view of the search space. Each participant owns a
//!   `LocalGraphIndex` that deduplicates nodes by domain point and reconstructs
//!   ancestors from root-to-node paths reported by other participants.
//! - **`manager`**: The coworker lifecycle and job-flow orchestrator. Runs three
//!   background loops (discovery, dispatch, collection) on top of a
//!   communication layer.
//! - **`search`**: The sequential best-first search core and the two roles built
//!   on it: the master (offloads frontier slices and merges results) and the
//!   coworker (runs bounded, bootstrapped sub-searches).
//! - **`events`**: Fire-and-forget observability notifications (node opened,
//!   closed, distributed, solution found) consumed by external tooling.

pub mod comm;
pub mod events;
pub mod graph;
pub mod manager;
pub mod search;
