use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Weak};

/// Bound alias for search-space states.
///
/// A domain point is the externally defined state of the search space and the
/// deduplication key of the local graph: value equality and hashing decide
/// whether two participants are talking about the same node. Points are
/// serialized whenever they cross a process boundary.
pub trait DomainPoint:
    Clone + Eq + Hash + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> DomainPoint for T where
    T: Clone + Eq + Hash + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Bound alias for edge labels produced by the successor generator.
pub trait EdgeLabel: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> EdgeLabel for T where T: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Bound alias for node evaluations.
///
/// Evaluations order the open frontier, so they must carry a total order.
/// Lower is better: the frontier is expanded in ascending evaluation order.
pub trait Evaluation:
    Ord + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> Evaluation for T where
    T: Ord + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Errors raised by local graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A reported path is not contiguous with the locally known graph: some
    /// node's predecessor is unknown where it should be known. This indicates
    /// a malformed record and is fatal to the affected merge, not the engine.
    #[error("malformed path: step {step} ({point}) has no locally known predecessor")]
    MalformedPath { step: usize, point: String },

    /// `bootstrap` was invoked on a search that already initialized its roots.
    #[error("search is already initialized; bootstrapping must happen first")]
    AlreadyInitialized,
}

/// A node in a participant's local view of the search graph.
///
/// Nodes are created lazily, the first time their point is referenced by an
/// expansion or a path reconstruction, and live for the lifetime of the
/// participant. The parent link is weak; the owning [`LocalGraphIndex`]
/// keeps every ancestor alive, so upgrading a parent of an indexed node
/// cannot fail.
///
/// [`LocalGraphIndex`]: crate::graph::LocalGraphIndex
#[derive(Debug)]
pub struct SearchNode<P, A, V> {
    point: P,
    /// Label of the incoming edge; `None` for roots.
    edge: Option<A>,
    parent: Option<Weak<SearchNode<P, A, V>>>,
    value: V,
    goal: bool,
}

impl<P, A, V> SearchNode<P, A, V>
where
    P: DomainPoint,
    A: EdgeLabel,
    V: Evaluation,
{
    pub(crate) fn new_root(point: P, value: V, goal: bool) -> Arc<Self> {
        Arc::new(Self {
            point,
            edge: None,
            parent: None,
            value,
            goal,
        })
    }

    pub(crate) fn new_child(
        parent: &Arc<Self>,
        point: P,
        edge: A,
        value: V,
        goal: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            point,
            edge: Some(edge),
            parent: Some(Arc::downgrade(parent)),
            value,
            goal,
        })
    }

    pub fn point(&self) -> &P {
        &self.point
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn is_goal(&self) -> bool {
        self.goal
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Ancestors of this node, root first, excluding the node itself.
    /// Parents of an indexed node are always alive, so a dropped weak link
    /// simply truncates the walk at the root end.
    pub fn ancestry(&self) -> Vec<Arc<Self>> {
        let mut chain = Vec::new();
        let mut cursor = self.parent.as_ref().and_then(Weak::upgrade);
        while let Some(parent) = cursor {
            cursor = parent.parent.as_ref().and_then(Weak::upgrade);
            chain.push(parent);
        }
        chain.reverse();
        chain
    }

    /// Serializable root-to-self path, the unit of cross-participant exchange.
    pub fn to_record(&self) -> PathRecord<P, A, V> {
        let mut steps: Vec<PathStep<P, A, V>> = self
            .ancestry()
            .iter()
            .map(|node| PathStep {
                point: node.point.clone(),
                edge: node.edge.clone(),
                value: node.value.clone(),
            })
            .collect();
        steps.push(PathStep {
            point: self.point.clone(),
            edge: self.edge.clone(),
            value: self.value.clone(),
        });
        PathRecord { steps }
    }

    /// Sequence of domain points from the root to this node.
    pub fn external_path(&self) -> Vec<P> {
        let mut points: Vec<P> = self
            .ancestry()
            .iter()
            .map(|node| node.point.clone())
            .collect();
        points.push(self.point.clone());
        points
    }
}

/// One step of a serialized path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathStep<P, A, V> {
    pub point: P,
    /// Incoming edge label; `None` on the root step.
    pub edge: Option<A>,
    pub value: V,
}

/// An ordered root-to-node path.
///
/// Paths, not raw node references, are exchanged between participants: a
/// remote participant cannot dereference another process's in-memory nodes,
/// so every report carries the full route needed to reconstruct the target
/// node locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRecord<P, A, V> {
    pub steps: Vec<PathStep<P, A, V>>,
}

impl<P, A, V> PathRecord<P, A, V> {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The target node of the path.
    pub fn leaf(&self) -> Option<&PathStep<P, A, V>> {
        self.steps.last()
    }

    /// Edge labels along the path, root end first. Solution paths compare
    /// equal across participants iff their label sequences match.
    pub fn edge_labels(&self) -> Vec<A>
    where
        A: Clone,
    {
        self.steps.iter().filter_map(|s| s.edge.clone()).collect()
    }
}
