//! Manager Tests
//!
//! ## Test Scopes
//! - **Discovery**: registered coworkers are attached and become idle.
//! - **Dispatch**: a coworker never holds two jobs at once; jobs wait for
//!   capacity.
//! - **Collection**: results flow to the merge channel and free the coworker.
//! - **Faults**: an unreadable result delays collection, it never loses the
//!   job.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;

use super::{CoworkerState, DistributedSearchManager, ManagerConfig};
use crate::comm::{CommError, CommunicationLayer, ComputationResult, CoworkerId, Job};
use crate::events::EventEmitter;
use crate::graph::{PathRecord, PathStep};

type TestJob = Job<u64, String, i64>;
type TestResult = ComputationResult<u64, String, i64>;

/// In-memory communication layer with injectable result faults.
#[derive(Default)]
struct InMemoryComm {
    registrations: Mutex<Vec<CoworkerId>>,
    attached: DashMap<CoworkerId, ()>,
    jobs: DashMap<CoworkerId, TestJob>,
    results: DashMap<CoworkerId, TestResult>,
    /// Number of upcoming `read_result` calls that report the record as
    /// unreadable (returning `Ok(None)` while a result is pending).
    result_faults: AtomicU32,
    /// Number of upcoming `create_job` calls that fail with an I/O error.
    publish_faults: AtomicU32,
}

impl InMemoryComm {
    fn push_result(&self, id: &CoworkerId, result: TestResult) {
        self.results.insert(id.clone(), result);
    }
}

#[async_trait]
impl CommunicationLayer<u64, String, i64> for InMemoryComm {
    async fn detect_new_coworkers(&self) -> Result<Vec<CoworkerId>, CommError> {
        Ok(self.registrations.lock().unwrap().drain(..).collect())
    }

    async fn attach_coworker(&self, id: &CoworkerId) -> Result<(), CommError> {
        self.attached.insert(id.clone(), ());
        Ok(())
    }

    async fn is_attached(&self, id: &CoworkerId) -> Result<bool, CommError> {
        Ok(self.attached.contains_key(id))
    }

    async fn detach_coworker(&self, id: &CoworkerId) -> Result<(), CommError> {
        self.attached.remove(id);
        Ok(())
    }

    async fn create_job(&self, id: &CoworkerId, job: &TestJob) -> Result<(), CommError> {
        if self.publish_faults.load(Ordering::SeqCst) > 0 {
            self.publish_faults.fetch_sub(1, Ordering::SeqCst);
            return Err(CommError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "shared folder unavailable",
            )));
        }
        self.jobs.insert(id.clone(), job.clone());
        Ok(())
    }

    async fn fetch_job(&self, id: &CoworkerId) -> Result<Option<TestJob>, CommError> {
        Ok(self.jobs.remove(id).map(|(_, job)| job))
    }

    async fn report_result(&self, id: &CoworkerId, result: &TestResult) -> Result<(), CommError> {
        self.results.insert(id.clone(), result.clone());
        Ok(())
    }

    async fn read_result(&self, id: &CoworkerId) -> Result<Option<TestResult>, CommError> {
        if self.results.contains_key(id) {
            let faults = self.result_faults.load(Ordering::SeqCst);
            if faults > 0 {
                self.result_faults.fetch_sub(1, Ordering::SeqCst);
                return Ok(None);
            }
        }
        Ok(self.results.remove(id).map(|(_, result)| result))
    }

    async fn register(&self, id: &CoworkerId) -> Result<(), CommError> {
        self.registrations.lock().unwrap().push(id.clone());
        Ok(())
    }

    async fn unregister(&self, id: &CoworkerId) -> Result<(), CommError> {
        self.registrations.lock().unwrap().retain(|r| r != id);
        Ok(())
    }
}

fn fast_config() -> ManagerConfig {
    ManagerConfig {
        discovery_interval: Duration::from_millis(10),
        collection_interval: Duration::from_millis(10),
        job_queue_capacity: 16,
    }
}

fn path(points: &[u64]) -> PathRecord<u64, String, i64> {
    PathRecord {
        steps: points
            .iter()
            .enumerate()
            .map(|(i, p)| PathStep {
                point: *p,
                edge: (i > 0).then(|| "step".to_string()),
                value: *p as i64,
            })
            .collect(),
    }
}

fn empty_result(id: &CoworkerId) -> TestResult {
    ComputationResult {
        coworker: id.clone(),
        open: vec![],
        solutions: vec![],
    }
}

async fn settle() {
    sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_discovery_attaches_and_idles_registered_coworker() {
    let comm = Arc::new(InMemoryComm::default());
    let id = CoworkerId("w1".to_string());
    comm.register(&id).await.unwrap();

    let (manager, _merged) =
        DistributedSearchManager::start(comm.clone(), fast_config(), EventEmitter::disabled());
    settle().await;

    assert!(comm.attached.contains_key(&id));
    assert_eq!(manager.coworker_state(&id), Some(CoworkerState::Idle));
    assert_eq!(manager.idle_coworkers(), 1);
    assert!(!manager.is_busy());
}

#[tokio::test]
async fn test_no_double_dispatch_to_a_single_coworker() {
    let comm = Arc::new(InMemoryComm::default());
    let id = CoworkerId("w1".to_string());
    comm.register(&id).await.unwrap();

    let (manager, _merged) =
        DistributedSearchManager::start(comm.clone(), fast_config(), EventEmitter::disabled());
    settle().await;

    manager.distribute_nodes_remotely(vec![path(&[1, 2])]).await;
    manager.distribute_nodes_remotely(vec![path(&[1, 3])]).await;
    settle().await;

    // Only the first job reached the coworker; the second waits.
    assert_eq!(manager.jobs_in_flight(), 1);
    assert_eq!(manager.pending_jobs(), 1);
    assert_eq!(manager.coworker_state(&id), Some(CoworkerState::Assigned));
    assert!(manager.is_busy());

    // The coworker finishes; the waiting job goes out next.
    comm.jobs.remove(&id);
    comm.push_result(&id, empty_result(&id));
    settle().await;

    assert_eq!(manager.jobs_in_flight(), 1);
    assert_eq!(manager.pending_jobs(), 0);
}

#[tokio::test]
async fn test_collected_result_reaches_merge_channel_and_frees_coworker() {
    let comm = Arc::new(InMemoryComm::default());
    let id = CoworkerId("w1".to_string());
    comm.register(&id).await.unwrap();

    let (manager, mut merged) =
        DistributedSearchManager::start(comm.clone(), fast_config(), EventEmitter::disabled());
    settle().await;

    manager.distribute_nodes_remotely(vec![path(&[1, 2])]).await;
    settle().await;

    let reported = ComputationResult {
        coworker: id.clone(),
        open: vec![path(&[1, 2, 4])],
        solutions: vec![path(&[1, 2, 5])],
    };
    comm.jobs.remove(&id);
    comm.push_result(&id, reported);
    settle().await;

    let (job, result) = merged.try_recv().unwrap();
    assert_eq!(job.paths[0].leaf().unwrap().point, 2);
    assert_eq!(result.open.len(), 1);
    assert_eq!(result.solutions.len(), 1);

    assert!(!manager.is_busy());
    assert_eq!(manager.coworker_state(&id), Some(CoworkerState::Idle));
    assert_eq!(manager.idle_coworkers(), 1);
}

#[tokio::test]
async fn test_is_busy_holds_from_enqueue_to_collection() {
    let comm = Arc::new(InMemoryComm::default());
    let id = CoworkerId("w1".to_string());

    let (manager, mut merged) =
        DistributedSearchManager::start(comm.clone(), fast_config(), EventEmitter::disabled());
    settle().await;

    // No coworker exists yet; the job still counts as outstanding work.
    manager.distribute_nodes_remotely(vec![path(&[1])]).await;
    assert!(manager.is_busy());

    comm.register(&id).await.unwrap();
    settle().await;
    assert!(manager.is_busy());

    comm.jobs.remove(&id);
    comm.push_result(&id, empty_result(&id));
    settle().await;

    // The result is in the merge channel before busy drops.
    assert!(!manager.is_busy());
    assert!(merged.try_recv().is_ok());
}

#[tokio::test]
async fn test_shutdown_detaches_all_coworkers() {
    let comm = Arc::new(InMemoryComm::default());
    let a = CoworkerId("w1".to_string());
    let b = CoworkerId("w2".to_string());
    comm.register(&a).await.unwrap();
    comm.register(&b).await.unwrap();

    let (manager, _merged) =
        DistributedSearchManager::start(comm.clone(), fast_config(), EventEmitter::disabled());
    settle().await;

    manager.shutdown().await;

    assert!(!comm.attached.contains_key(&a));
    assert!(!comm.attached.contains_key(&b));
    assert_eq!(manager.coworker_state(&a), Some(CoworkerState::Detached));
    assert_eq!(manager.coworker_state(&b), Some(CoworkerState::Detached));
}

#[tokio::test]
async fn test_failed_publish_keeps_job_busy_and_retries() {
    let comm = Arc::new(InMemoryComm::default());
    let id = CoworkerId("w1".to_string());
    comm.register(&id).await.unwrap();

    let (manager, mut merged) =
        DistributedSearchManager::start(comm.clone(), fast_config(), EventEmitter::disabled());
    settle().await;

    // The first two publish attempts fail.
    comm.publish_faults.store(2, Ordering::SeqCst);
    manager.distribute_nodes_remotely(vec![path(&[1, 2])]).await;

    // While publication keeps failing the job is neither lost nor invisible.
    sleep(Duration::from_millis(30)).await;
    assert!(manager.is_busy());

    // The retry eventually lands the job on the coworker.
    sleep(Duration::from_millis(200)).await;
    assert_eq!(manager.jobs_in_flight(), 1);
    assert_eq!(manager.pending_jobs(), 0);
    assert!(comm.jobs.contains_key(&id));
    assert!(manager.is_busy());

    comm.jobs.remove(&id);
    comm.push_result(&id, empty_result(&id));
    settle().await;
    assert!(merged.try_recv().is_ok());
    assert!(!manager.is_busy());
}

#[tokio::test]
async fn test_unreadable_result_delays_collection_without_losing_it() {
    let comm = Arc::new(InMemoryComm::default());
    let id = CoworkerId("w1".to_string());
    comm.register(&id).await.unwrap();

    let (manager, mut merged) =
        DistributedSearchManager::start(comm.clone(), fast_config(), EventEmitter::disabled());
    settle().await;

    manager.distribute_nodes_remotely(vec![path(&[1, 2])]).await;
    settle().await;

    // The next two polls see the record but cannot read it.
    comm.result_faults.store(2, Ordering::SeqCst);
    comm.jobs.remove(&id);
    comm.push_result(&id, empty_result(&id));
    settle().await;

    assert!(merged.try_recv().is_ok());
    assert!(!manager.is_busy());
}
