//! Domain collaborator traits.
//!
//! A search problem is defined entirely by these two traits. Implementations
//! must be deterministic: every participant builds its own instance from the
//! same problem description, and reconstruction of reported paths relies on
//! all participants agreeing on successors and evaluations.

/// Declarative description of the OR-graph under search.
pub trait GraphGenerator<P, A>: Send + Sync {
    /// Root points of the graph.
    fn roots(&self) -> Vec<P>;

    /// Labeled successors of a point. An empty vector marks a dead end.
    fn successors(&self, point: &P) -> Vec<(A, P)>;

    /// Whether a point is a goal. Goal points are never expanded.
    fn is_goal(&self, point: &P) -> bool;
}

/// Scores a root-to-node path; lower values are expanded first.
pub trait NodeEvaluator<P, V>: Send + Sync {
    fn evaluate(&self, path: &[P]) -> V;
}
