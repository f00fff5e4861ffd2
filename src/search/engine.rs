//! Sequential Best-First Core
//!
//! One participant's search state: the open frontier (a min-heap over node
//! evaluations with insertion order breaking ties), the local graph index, the
//! expanded set, and the queue of found solutions. The core is strictly
//! sequential; the distributed roles feed it merged remote state between
//! steps, never concurrently.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use super::traits::{GraphGenerator, NodeEvaluator};
use crate::events::{EventEmitter, SearchEvent};
use crate::graph::{
    DomainPoint, EdgeLabel, Evaluation, GraphError, LocalGraphIndex, PathRecord, SearchNode,
};

/// Frontier entry: evaluation first, then insertion sequence, so equal values
/// expand in arrival order.
struct OpenEntry<P, A, V> {
    value: V,
    seq: u64,
    node: Arc<SearchNode<P, A, V>>,
}

impl<P, A, V: Ord> PartialEq for OpenEntry<P, A, V> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.seq == other.seq
    }
}

impl<P, A, V: Ord> Eq for OpenEntry<P, A, V> {}

impl<P, A, V: Ord> PartialOrd for OpenEntry<P, A, V> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<P, A, V: Ord> Ord for OpenEntry<P, A, V> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value
            .cmp(&other.value)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// The sequential best-first engine.
pub struct BestFirstSearch<P, A, V> {
    generator: Arc<dyn GraphGenerator<P, A>>,
    evaluator: Arc<dyn NodeEvaluator<P, V>>,
    index: LocalGraphIndex<P, A, V>,
    open: BinaryHeap<Reverse<OpenEntry<P, A, V>>>,
    open_points: HashSet<P>,
    expanded: HashSet<P>,
    solutions: VecDeque<Arc<SearchNode<P, A, V>>>,
    solved_points: HashSet<P>,
    events: EventEmitter<P>,
    seq: u64,
    initialized: bool,
}

impl<P, A, V> BestFirstSearch<P, A, V>
where
    P: DomainPoint,
    A: EdgeLabel,
    V: Evaluation,
{
    pub fn new(
        generator: Arc<dyn GraphGenerator<P, A>>,
        evaluator: Arc<dyn NodeEvaluator<P, V>>,
        events: EventEmitter<P>,
    ) -> Self {
        Self {
            generator,
            evaluator,
            index: LocalGraphIndex::new(),
            open: BinaryHeap::new(),
            open_points: HashSet::new(),
            expanded: HashSet::new(),
            solutions: VecDeque::new(),
            solved_points: HashSet::new(),
            events,
            seq: 0,
            initialized: false,
        }
    }

    /// Seeds the frontier with the generator's roots. Idempotent after the
    /// first call.
    pub fn init(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        for point in self.generator.roots() {
            let value = self.evaluator.evaluate(std::slice::from_ref(&point));
            let goal = self.generator.is_goal(&point);
            let node = self.index.insert_root(point, value, goal);
            self.admit(node);
        }
        tracing::info!("Search initialized with {} open node(s)", self.open.len());
    }

    /// Initializes from reported paths instead of the default frontier: roots
    /// are materialized into the index but kept out of `open`; the record
    /// leaves become the entire frontier. This is how a coworker takes over a
    /// slice of another participant's search.
    pub fn bootstrap(&mut self, records: &[PathRecord<P, A, V>]) -> Result<(), GraphError> {
        if self.initialized {
            return Err(GraphError::AlreadyInitialized);
        }
        self.initialized = true;

        for point in self.generator.roots() {
            let value = self.evaluator.evaluate(std::slice::from_ref(&point));
            let goal = self.generator.is_goal(&point);
            self.index.insert_root(point, value, goal);
        }

        for record in records {
            self.reinsert_open(record)?;
        }
        tracing::info!(
            "Bootstrapped from {} path(s); {} open node(s)",
            records.len(),
            self.open.len()
        );
        Ok(())
    }

    pub fn open_len(&self) -> usize {
        self.open.len()
    }

    pub fn open_is_empty(&self) -> bool {
        self.open.is_empty()
    }

    pub fn graph_size(&self) -> usize {
        self.index.len()
    }

    pub fn is_open(&self, point: &P) -> bool {
        self.open_points.contains(point)
    }

    /// Expands the best open node. Returns `false` when the frontier is empty.
    pub fn step(&mut self) -> bool {
        let Some(Reverse(entry)) = self.open.pop() else {
            return false;
        };
        let node = entry.node;
        self.open_points.remove(node.point());
        self.expanded.insert(node.point().clone());
        tracing::debug!("Expanding {:?} (value {:?})", node.point(), node.value());
        self.events.emit(SearchEvent::NodeClosed {
            point: node.point().clone(),
        });

        let parent_path = node.external_path();
        for (edge, point) in self.generator.successors(node.point()) {
            // One node per point: a successor already materialized through
            // another route is not revisited.
            if self.index.contains(&point) {
                continue;
            }
            let mut path = parent_path.clone();
            path.push(point.clone());
            let value = self.evaluator.evaluate(&path);
            let goal = self.generator.is_goal(&point);
            let child = self.index.insert_child(&node, point, edge, value, goal);
            self.admit(child);
        }
        true
    }

    /// Runs until a solution is available, the frontier is exhausted, or the
    /// deadline passes.
    pub fn next_solution(&mut self, deadline: Option<Instant>) -> Option<Vec<P>> {
        loop {
            if let Some(solution) = self.pop_solution() {
                return Some(solution);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return None;
            }
            if !self.step() {
                return None;
            }
        }
    }

    /// Oldest unreturned solution as its root-to-goal point sequence.
    pub fn pop_solution(&mut self) -> Option<Vec<P>> {
        self.solutions.pop_front().map(|node| node.external_path())
    }

    /// All unreturned solutions as serializable paths, draining the queue.
    pub fn drain_solution_records(&mut self) -> Vec<PathRecord<P, A, V>> {
        self.solutions.drain(..).map(|node| node.to_record()).collect()
    }

    /// Serializable view of the entire open frontier, best node first.
    pub fn open_snapshot(&self) -> Vec<PathRecord<P, A, V>> {
        let mut entries: Vec<&Reverse<OpenEntry<P, A, V>>> = self.open.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.iter().map(|e| e.0.node.to_record()).collect()
    }

    /// Removes up to `count` nodes from the frontier for remote execution,
    /// always keeping the current best local. The removed nodes are returned
    /// best-first as serializable paths; they are expected to come back
    /// through a merged result (as residual open nodes or solutions).
    pub fn drain_for_offload(&mut self, count: usize) -> Vec<PathRecord<P, A, V>> {
        if self.open.len() < 2 || count == 0 {
            return Vec::new();
        }

        let mut entries: Vec<OpenEntry<P, A, V>> =
            std::mem::take(&mut self.open).into_iter().map(|r| r.0).collect();
        entries.sort();

        let mut offloaded = Vec::new();
        let mut kept = Vec::new();
        for (i, entry) in entries.into_iter().enumerate() {
            if i >= 1 && offloaded.len() < count {
                self.open_points.remove(entry.node.point());
                offloaded.push(entry.node.to_record());
            } else {
                kept.push(Reverse(entry));
            }
        }
        self.open = kept.into();
        offloaded
    }

    /// Merges a reported open-node path: ancestors are reconstructed into the
    /// index and the leaf joins the frontier (unless it was already expanded
    /// or is already open). Newly materialized interior nodes are closed, they
    /// were expanded by the reporting participant.
    pub fn reinsert_open(&mut self, record: &PathRecord<P, A, V>) -> Result<(), GraphError> {
        let (leaf, created) = self.index.insert_path(record)?;
        self.close_created_interiors(&leaf, created);

        let point = leaf.point().clone();
        if self.expanded.contains(&point) || self.open_points.contains(&point) {
            return Ok(());
        }
        if self.generator.is_goal(&point) {
            self.record_solution(leaf);
            return Ok(());
        }
        self.admit(leaf);
        Ok(())
    }

    /// Merges a reported solution path into the index and the solution queue.
    /// Solutions already known by leaf point are not re-queued.
    pub fn absorb_solution_path(&mut self, record: &PathRecord<P, A, V>) -> Result<(), GraphError> {
        let (leaf, created) = self.index.insert_path(record)?;
        self.close_created_interiors(&leaf, created);
        self.record_solution(leaf);
        Ok(())
    }

    /// Marks a point as resolved elsewhere. A point that is currently open
    /// again (a coworker handed it back unexpanded) is left alone.
    pub fn mark_closed(&mut self, point: &P) {
        if self.open_points.contains(point) || self.expanded.contains(point) {
            return;
        }
        self.expanded.insert(point.clone());
        self.events.emit(SearchEvent::NodeClosed {
            point: point.clone(),
        });
    }

    fn admit(&mut self, node: Arc<SearchNode<P, A, V>>) {
        let point = node.point().clone();
        if node.is_goal() || self.generator.is_goal(&point) {
            self.record_solution(node);
            return;
        }
        self.events.emit(SearchEvent::NodeOpened {
            point: point.clone(),
        });
        self.open_points.insert(point);
        self.seq += 1;
        self.open.push(Reverse(OpenEntry {
            value: node.value().clone(),
            seq: self.seq,
            node,
        }));
    }

    fn record_solution(&mut self, node: Arc<SearchNode<P, A, V>>) {
        let point = node.point().clone();
        if !self.solved_points.insert(point.clone()) {
            return;
        }
        tracing::info!("Solution found at {:?}", point);
        self.events.emit(SearchEvent::SolutionFound { point });
        self.solutions.push_back(node);
    }

    fn close_created_interiors(
        &mut self,
        leaf: &Arc<SearchNode<P, A, V>>,
        created: Vec<Arc<SearchNode<P, A, V>>>,
    ) {
        for node in created {
            if Arc::ptr_eq(&node, leaf) {
                continue;
            }
            let point = node.point().clone();
            self.expanded.insert(point.clone());
            self.events.emit(SearchEvent::NodeClosed { point });
        }
    }
}
