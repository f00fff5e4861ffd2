//! Per-participant dictionary from domain point to local node.
//!
//! The index upholds the deduplication invariant: at most one node per domain
//! point per participant. Expansion and path reconstruction both go through it,
//! so independently reported paths converge on the same local nodes.

use std::collections::HashMap;
use std::sync::Arc;

use super::types::{DomainPoint, EdgeLabel, Evaluation, GraphError, PathRecord, SearchNode};

/// Mapping `DomainPoint -> SearchNode` owned by one participant.
pub struct LocalGraphIndex<P, A, V> {
    nodes: HashMap<P, Arc<SearchNode<P, A, V>>>,
}

impl<P, A, V> LocalGraphIndex<P, A, V>
where
    P: DomainPoint,
    A: EdgeLabel,
    V: Evaluation,
{
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn lookup(&self, point: &P) -> Option<&Arc<SearchNode<P, A, V>>> {
        self.nodes.get(point)
    }

    pub fn contains(&self, point: &P) -> bool {
        self.nodes.contains_key(point)
    }

    /// Registers a root node. Re-inserting a known point returns the existing
    /// node and performs no mutation.
    pub fn insert_root(&mut self, point: P, value: V, goal: bool) -> Arc<SearchNode<P, A, V>> {
        if let Some(existing) = self.nodes.get(&point) {
            return existing.clone();
        }
        let node = SearchNode::new_root(point.clone(), value, goal);
        self.nodes.insert(point, node.clone());
        node
    }

    /// Registers a successor of `parent`. Re-inserting a known point returns
    /// the existing node and performs no mutation.
    pub fn insert_child(
        &mut self,
        parent: &Arc<SearchNode<P, A, V>>,
        point: P,
        edge: A,
        value: V,
        goal: bool,
    ) -> Arc<SearchNode<P, A, V>> {
        if let Some(existing) = self.nodes.get(&point) {
            return existing.clone();
        }
        let node = SearchNode::new_child(parent, point.clone(), edge, value, goal);
        self.nodes.insert(point, node.clone());
        node
    }

    /// Reconstructs a reported root-to-node path into the local graph.
    ///
    /// Walks the record from the root end to the leaf. Known points are
    /// reused; unknown points are created parented to the local copy of their
    /// predecessor. An unknown first step is admitted only into an empty index
    /// (a fresh participant bootstrapping its first root); anywhere else it
    /// means the path is not contiguous with the local graph and the call
    /// fails with [`GraphError::MalformedPath`] without touching the index.
    ///
    /// Returns the local leaf node together with every node the call created,
    /// so the caller can mark newly materialized interior nodes as closed.
    ///
    /// Idempotent: re-inserting a fully known path returns the existing leaf
    /// and an empty creation list.
    pub fn insert_path(
        &mut self,
        record: &PathRecord<P, A, V>,
    ) -> Result<(Arc<SearchNode<P, A, V>>, Vec<Arc<SearchNode<P, A, V>>>), GraphError> {
        let first = record.steps.first().ok_or(GraphError::MalformedPath {
            step: 0,
            point: "<empty path>".to_string(),
        })?;

        if !self.contains(&first.point) && !self.is_empty() {
            return Err(GraphError::MalformedPath {
                step: 0,
                point: format!("{:?}", first.point),
            });
        }

        let mut created = Vec::new();
        let mut local_parent: Option<Arc<SearchNode<P, A, V>>> = None;

        for (i, step) in record.steps.iter().enumerate() {
            if let Some(existing) = self.nodes.get(&step.point) {
                local_parent = Some(existing.clone());
                continue;
            }

            let node = match (&local_parent, &step.edge) {
                (Some(parent), Some(edge)) => self.insert_child(
                    parent,
                    step.point.clone(),
                    edge.clone(),
                    step.value.clone(),
                    false,
                ),
                (None, None) if i == 0 => {
                    self.insert_root(step.point.clone(), step.value.clone(), false)
                }
                _ => {
                    // A non-root step without a reconstructed predecessor or
                    // without an edge label cannot be attached anywhere.
                    return Err(GraphError::MalformedPath {
                        step: i,
                        point: format!("{:?}", step.point),
                    });
                }
            };
            created.push(node.clone());
            local_parent = Some(node);
        }

        match local_parent {
            Some(leaf) => Ok((leaf, created)),
            None => Err(GraphError::MalformedPath {
                step: 0,
                point: "<empty path>".to_string(),
            }),
        }
    }
}

impl<P, A, V> Default for LocalGraphIndex<P, A, V>
where
    P: DomainPoint,
    A: EdgeLabel,
    V: Evaluation,
{
    fn default() -> Self {
        Self::new()
    }
}
