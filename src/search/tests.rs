//! Search Tests
//!
//! ## Test Scopes
//! - **Core**: expansion order, exhaustion, bootstrap, frontier offloading.
//! - **Distribution**: the same interval-splitting domain searched with zero
//!   and with several coworkers over a shared folder yields the same
//!   solution set.
//!
//! The fixture domain splits an integer interval in halves; unit intervals
//! at configured target values are the goals.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use super::coworker::SearchFactory;
use super::{
    BestFirstSearch, CoworkerConfig, DistributedOrSearchCoworker, DistributedOrSearchMaster,
    GraphGenerator, NodeEvaluator,
};
use crate::comm::{CommunicationLayer, CoworkerId, FolderCommLayer, Job};
use crate::events::EventEmitter;
use crate::graph::GraphError;
use crate::manager::ManagerConfig;

type Pt = (u64, u64);

/// Splits `(lo, hi)` into its halves; unit intervals at target values are
/// goals.
struct IntervalSplit {
    size: u64,
    targets: Vec<u64>,
}

impl GraphGenerator<Pt, String> for IntervalSplit {
    fn roots(&self) -> Vec<Pt> {
        vec![(0, self.size)]
    }

    fn successors(&self, &(lo, hi): &Pt) -> Vec<(String, Pt)> {
        if hi - lo <= 1 {
            return vec![];
        }
        let mid = (lo + hi) / 2;
        vec![
            ("left".to_string(), (lo, mid)),
            ("right".to_string(), (mid, hi)),
        ]
    }

    fn is_goal(&self, &(lo, hi): &Pt) -> bool {
        hi - lo == 1 && self.targets.contains(&lo)
    }
}

/// Prefers narrow intervals close to a target. An optional per-evaluation
/// delay stands in for an expensive real-world scoring function.
struct MidpointDistance {
    targets: Vec<u64>,
    delay: Duration,
}

impl NodeEvaluator<Pt, i64> for MidpointDistance {
    fn evaluate(&self, path: &[Pt]) -> i64 {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let (lo, hi) = *path.last().unwrap();
        let mid = (lo + hi) / 2;
        let dist = self
            .targets
            .iter()
            .map(|t| mid.abs_diff(*t))
            .min()
            .unwrap_or(0);
        (hi - lo + dist) as i64
    }
}

fn domain(
    size: u64,
    targets: &[u64],
    delay: Duration,
) -> (Arc<IntervalSplit>, Arc<MidpointDistance>) {
    (
        Arc::new(IntervalSplit {
            size,
            targets: targets.to_vec(),
        }),
        Arc::new(MidpointDistance {
            targets: targets.to_vec(),
            delay,
        }),
    )
}

fn core(size: u64, targets: &[u64]) -> BestFirstSearch<Pt, String, i64> {
    let (generator, evaluator) = domain(size, targets, Duration::ZERO);
    BestFirstSearch::new(generator, evaluator, EventEmitter::disabled())
}

fn factory(size: u64, targets: &[u64], delay: Duration) -> SearchFactory<Pt, String, i64> {
    let (generator, evaluator) = domain(size, targets, delay);
    Arc::new(move || {
        BestFirstSearch::new(generator.clone(), evaluator.clone(), EventEmitter::disabled())
    })
}

fn fast_manager_config() -> ManagerConfig {
    ManagerConfig {
        discovery_interval: Duration::from_millis(10),
        collection_interval: Duration::from_millis(10),
        job_queue_capacity: 16,
    }
}

fn fast_coworker_config() -> CoworkerConfig {
    CoworkerConfig {
        uptime: Duration::from_secs(3),
        search_budget: Duration::from_millis(500),
        poll_interval: Duration::from_millis(10),
    }
}

/// Runs a master over `dir` to exhaustion and returns the goal values found.
async fn run_master(
    dir: &std::path::Path,
    size: u64,
    targets: &[u64],
    delay: Duration,
) -> BTreeSet<u64> {
    let layer = FolderCommLayer::new(dir);
    layer.init().await.unwrap();
    let comm: Arc<dyn CommunicationLayer<Pt, String, i64>> = Arc::new(layer);

    let (generator, evaluator) = domain(size, targets, delay);
    let mut master = DistributedOrSearchMaster::new(
        generator,
        evaluator,
        comm,
        fast_manager_config(),
        EventEmitter::disabled(),
    );

    let mut found = BTreeSet::new();
    while let Some(path) = master.next_solution().await {
        found.insert(path.last().unwrap().0);
    }
    master.shutdown().await;
    found
}

fn spawn_coworkers(dir: &std::path::Path, count: usize, size: u64, targets: &[u64]) {
    for i in 0..count {
        let comm: Arc<dyn CommunicationLayer<Pt, String, i64>> =
            Arc::new(FolderCommLayer::new(dir));
        let coworker = DistributedOrSearchCoworker::new(
            comm,
            CoworkerId(format!("w{i}")),
            fast_coworker_config(),
            factory(size, targets, Duration::ZERO),
        );
        tokio::spawn(async move {
            if let Err(e) = coworker.cowork().await {
                tracing::error!("Coworker failed: {}", e);
            }
        });
    }
}

#[test]
fn test_sequential_search_finds_every_target_once() {
    let mut search = core(16, &[3, 11, 13]);
    search.init();

    let mut found = Vec::new();
    while let Some(path) = search.next_solution(None) {
        assert_eq!(path.first().unwrap(), &(0, 16));
        found.push(path.last().unwrap().0);
    }

    found.sort();
    assert_eq!(found, vec![3, 11, 13]);
    // Exhausted for good.
    assert!(search.next_solution(None).is_none());
}

#[test]
fn test_search_without_goals_exhausts_to_none() {
    let mut search = core(8, &[]);
    search.init();
    assert!(search.next_solution(None).is_none());
    assert!(search.open_is_empty());
}

#[test]
fn test_expansion_follows_evaluation_order() {
    // Target 1 lies in the left half; the left child scores better and its
    // subtree is expanded before the right one.
    let mut search = core(8, &[1]);
    search.init();
    let path = search.next_solution(None).unwrap();
    assert_eq!(path.last().unwrap(), &(1, 2));
    // The right half was never needed.
    assert!(search.graph_size() < 15);
}

#[test]
fn test_bootstrap_seeds_leaves_not_roots() {
    let mut seed = core(8, &[6]);
    seed.init();
    seed.step();
    let paths = seed.drain_for_offload(1);
    assert_eq!(paths.len(), 1);

    let mut search = core(8, &[6]);
    search.bootstrap(&paths).unwrap();
    // Only the handed-over leaf is open; the root is materialized but closed.
    assert_eq!(search.open_len(), 1);
    assert!(search.graph_size() >= 2);
    assert!(!search.is_open(&(0, 8)));
}

#[test]
fn test_bootstrap_after_init_is_rejected() {
    let mut seed = core(8, &[6]);
    seed.init();
    seed.step();
    let paths = seed.drain_for_offload(1);

    let mut search = core(8, &[6]);
    search.init();
    assert!(matches!(
        search.bootstrap(&paths),
        Err(GraphError::AlreadyInitialized)
    ));
}

#[test]
fn test_drain_for_offload_keeps_the_best_node() {
    let mut search = core(8, &[1]);
    search.init();
    search.step();
    assert_eq!(search.open_len(), 2);

    // However much is asked for, the best node stays local.
    let offloaded = search.drain_for_offload(5);
    assert_eq!(offloaded.len(), 1);
    assert_eq!(search.open_len(), 1);
    // Target 1 is on the left; the right half went remote.
    assert_eq!(offloaded[0].leaf().unwrap().point, (4, 8));
    assert!(search.is_open(&(0, 4)));
}

#[test]
fn test_drain_for_offload_never_empties_the_frontier() {
    let mut search = core(8, &[1]);
    search.init();
    assert_eq!(search.open_len(), 1);
    assert!(search.drain_for_offload(5).is_empty());
    assert_eq!(search.open_len(), 1);
}

#[test]
fn test_mark_closed_leaves_open_points_alone() {
    let mut search = core(8, &[6]);
    search.init();
    search.step();
    assert!(search.is_open(&(0, 4)));

    search.mark_closed(&(0, 4));
    assert!(search.is_open(&(0, 4)));
}

#[tokio::test]
async fn test_single_job_round_trip_through_folder_layer() {
    let dir = tempfile::tempdir().unwrap();
    let id = CoworkerId("w1".to_string());

    // Both halves contain a target, so whichever half is offloaded, the
    // coworker's sub-search finds a solution.
    let mut seed = core(8, &[1, 6]);
    seed.init();
    seed.step();
    let paths = seed.drain_for_offload(1);
    let job = Job::new(paths);

    let layer = FolderCommLayer::new(dir.path());
    let comm: Arc<dyn CommunicationLayer<Pt, String, i64>> = Arc::new(layer);
    comm.create_job(&id, &job).await.unwrap();

    let coworker = DistributedOrSearchCoworker::new(
        comm.clone(),
        id.clone(),
        CoworkerConfig {
            uptime: Duration::from_millis(300),
            ..fast_coworker_config()
        },
        factory(8, &[1, 6], Duration::ZERO),
    );
    coworker.cowork().await.unwrap();

    let result = comm.read_result(&id).await.unwrap().unwrap();
    assert_eq!(result.coworker, id);
    // The offloaded subtree was exhausted within the budget.
    assert!(result.open.is_empty());
    assert_eq!(result.solutions.len(), 1);
    let solution = &result.solutions[0];
    assert_eq!(solution.steps.first().unwrap().point, (0, 8));
    let goal = solution.leaf().unwrap().point.0;
    assert!(goal == 1 || goal == 6);
}

#[tokio::test]
async fn test_attached_coworker_serves_past_uptime_until_released() {
    let dir = tempfile::tempdir().unwrap();
    let id = CoworkerId("w1".to_string());
    let comm: Arc<dyn CommunicationLayer<Pt, String, i64>> =
        Arc::new(FolderCommLayer::new(dir.path()));

    let coworker = DistributedOrSearchCoworker::new(
        comm.clone(),
        id.clone(),
        CoworkerConfig {
            uptime: Duration::from_millis(100),
            ..fast_coworker_config()
        },
        factory(8, &[1, 6], Duration::ZERO),
    );
    let handle = tokio::spawn(async move { coworker.cowork().await });

    // The master claims the coworker inside its uptime window.
    tokio::time::sleep(Duration::from_millis(40)).await;
    comm.attach_coworker(&id).await.unwrap();

    // Well past the uptime the attachment keeps the coworker serving.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!handle.is_finished());

    // A job published after the uptime elapsed is still picked up.
    let mut seed = core(8, &[1, 6]);
    seed.init();
    seed.step();
    let job = Job::new(seed.drain_for_offload(1));
    comm.create_job(&id, &job).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(comm.read_result(&id).await.unwrap().is_some());

    // Releasing the attachment lets the coworker retire.
    comm.detach_coworker(&id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(handle.is_finished());
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_master_alone_finds_every_target() {
    let dir = tempfile::tempdir().unwrap();
    let found = run_master(dir.path(), 16, &[3, 11, 13], Duration::ZERO).await;
    assert_eq!(found, BTreeSet::from([3, 11, 13]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distributed_search_matches_sequential_solutions() {
    let targets = [3, 500, 997];

    let alone = {
        let dir = tempfile::tempdir().unwrap();
        run_master(dir.path(), 1024, &targets, Duration::ZERO).await
    };

    // The master's evaluations are slowed down so the coworkers attach while
    // the frontier is still alive and actually receive work.
    let distributed = {
        let dir = tempfile::tempdir().unwrap();
        spawn_coworkers(dir.path(), 3, 1024, &targets);
        run_master(dir.path(), 1024, &targets, Duration::from_millis(1)).await
    };

    assert_eq!(alone, distributed);
    assert_eq!(distributed, BTreeSet::from([3, 500, 997]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_distributed_search_without_goals_terminates() {
    let dir = tempfile::tempdir().unwrap();
    spawn_coworkers(dir.path(), 2, 16, &[]);
    let found = run_master(dir.path(), 16, &[], Duration::from_millis(5)).await;
    assert!(found.is_empty());
}
