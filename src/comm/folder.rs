//! Folder-Based Communication Layer
//!
//! Reference implementation of [`CommunicationLayer`] over a directory shared
//! by all participants (e.g. a network mount). Every record is one file named
//! by coworker identity and record kind:
//!
//! - `register-<id>`: coworker availability signal, deleted on discovery.
//! - `attach-<id>`: presence marker owned by the master.
//! - `job-<id>`: the currently published job, deleted on fetch.
//! - `results-<id>`: the reported result, deleted on read.
//!
//! Publication is atomic: records are staged to `<name>.tmp` and moved into
//! place with a rename, so a reader never observes a partial write. Reads that
//! race a writer retry a bounded number of times with a jittered backoff.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::CommError;
use super::types::{ComputationResult, CoworkerId, Job};
use super::CommunicationLayer;
use crate::graph::{DomainPoint, EdgeLabel, Evaluation};

const READ_ATTEMPTS: u32 = 4;
const READ_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Shared-directory realization of the communication contract.
pub struct FolderCommLayer {
    folder: PathBuf,
}

impl FolderCommLayer {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    /// Master-side startup: creates the folder if needed and clears stale job
    /// and result records from a previous run. Registration sentinels are
    /// preserved so coworkers that signaled availability early are not lost.
    pub async fn init(&self) -> Result<(), CommError> {
        tokio::fs::create_dir_all(&self.folder).await?;
        let mut entries = tokio::fs::read_dir(&self.folder).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with("register-") {
                tracing::info!("Deleting stale record {}", name);
                if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                    tracing::warn!("Could not delete {}: {}", name, e);
                }
            }
        }
        Ok(())
    }

    fn register_path(&self, id: &CoworkerId) -> PathBuf {
        self.folder.join(format!("register-{}", id))
    }

    fn attach_path(&self, id: &CoworkerId) -> PathBuf {
        self.folder.join(format!("attach-{}", id))
    }

    fn job_path(&self, id: &CoworkerId) -> PathBuf {
        self.folder.join(format!("job-{}", id))
    }

    fn result_path(&self, id: &CoworkerId) -> PathBuf {
        self.folder.join(format!("results-{}", id))
    }

    /// Stage-then-rename publication; the rename makes the record visible
    /// all-or-nothing.
    async fn write_record<T: Serialize>(&self, target: &Path, record: &T) -> Result<(), CommError> {
        let mut staged = target.as_os_str().to_owned();
        staged.push(".tmp");
        let staged = PathBuf::from(staged);
        let encoded = serde_json::to_vec(record)?;
        tokio::fs::write(&staged, encoded).await?;
        tokio::fs::rename(&staged, target).await?;
        Ok(())
    }

    /// Reads and retires a record, retrying parse failures with a jittered
    /// backoff (the writer may still be renaming). `Ok(None)` when no record
    /// exists; `Err(Retrieval)` when the retry budget is exhausted.
    async fn consume_record<T: DeserializeOwned>(
        &self,
        target: &Path,
        kind: &'static str,
    ) -> Result<Option<T>, CommError> {
        if !tokio::fs::try_exists(target).await? {
            return Ok(None);
        }

        for attempt in 1..=READ_ATTEMPTS {
            match tokio::fs::read(target).await {
                Ok(bytes) => match serde_json::from_slice::<T>(&bytes) {
                    Ok(record) => {
                        tokio::fs::remove_file(target).await?;
                        return Ok(Some(record));
                    }
                    Err(e) => {
                        tracing::debug!(
                            "Attempt {}/{} to parse {} record failed: {}",
                            attempt,
                            READ_ATTEMPTS,
                            kind,
                            e
                        );
                    }
                },
                // The file vanished between the existence check and the read;
                // somebody else consumed it.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => {
                    tracing::debug!(
                        "Attempt {}/{} to read {} record failed: {}",
                        attempt,
                        READ_ATTEMPTS,
                        kind,
                        e
                    );
                }
            }

            let jitter = rand::random::<u64>() % 50;
            tokio::time::sleep(READ_RETRY_DELAY + Duration::from_millis(jitter)).await;
        }

        Err(CommError::Retrieval {
            kind,
            attempts: READ_ATTEMPTS,
        })
    }
}

#[async_trait]
impl<P, A, V> CommunicationLayer<P, A, V> for FolderCommLayer
where
    P: DomainPoint,
    A: EdgeLabel,
    V: Evaluation,
{
    async fn detect_new_coworkers(&self) -> Result<Vec<CoworkerId>, CommError> {
        let mut new_coworkers = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.folder).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(id) = name.strip_prefix("register-") {
                // Deleting the sentinel makes delivery exactly-once.
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => {
                        tracing::info!("Recognized coworker {}", id);
                        new_coworkers.push(CoworkerId(id.to_string()));
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(new_coworkers)
    }

    async fn attach_coworker(&self, id: &CoworkerId) -> Result<(), CommError> {
        tokio::fs::write(self.attach_path(id), b"").await?;
        Ok(())
    }

    async fn is_attached(&self, id: &CoworkerId) -> Result<bool, CommError> {
        Ok(tokio::fs::try_exists(self.attach_path(id)).await?)
    }

    async fn detach_coworker(&self, id: &CoworkerId) -> Result<(), CommError> {
        match tokio::fs::remove_file(self.attach_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_job(&self, id: &CoworkerId, job: &Job<P, A, V>) -> Result<(), CommError> {
        tracing::info!(
            "Writing job {} with {} path(s) for {}",
            job.id.0,
            job.paths.len(),
            id
        );
        self.write_record(&self.job_path(id), job).await
    }

    async fn fetch_job(&self, id: &CoworkerId) -> Result<Option<Job<P, A, V>>, CommError> {
        self.consume_record(&self.job_path(id), "job").await
    }

    async fn report_result(
        &self,
        id: &CoworkerId,
        result: &ComputationResult<P, A, V>,
    ) -> Result<(), CommError> {
        tracing::info!(
            "Reporting result of {}: {} open path(s), {} solution(s)",
            id,
            result.open.len(),
            result.solutions.len()
        );
        self.write_record(&self.result_path(id), result).await
    }

    async fn read_result(
        &self,
        id: &CoworkerId,
    ) -> Result<Option<ComputationResult<P, A, V>>, CommError> {
        match self.consume_record(&self.result_path(id), "result").await {
            Ok(record) => Ok(record),
            // Exhausted retries surface as "no result yet": the record stays
            // in place and the next collection round tries again.
            Err(CommError::Retrieval { attempts, .. }) => {
                tracing::error!(
                    "Result record of {} unreadable after {} attempts; will retry next poll",
                    id,
                    attempts
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn register(&self, id: &CoworkerId) -> Result<(), CommError> {
        // A leftover attachment from a previous life must not make the master
        // believe this coworker is already paired.
        if CommunicationLayer::<P, A, V>::is_attached(self, id).await? {
            CommunicationLayer::<P, A, V>::detach_coworker(self, id).await?;
        }
        tokio::fs::create_dir_all(&self.folder).await?;
        tokio::fs::write(self.register_path(id), b"").await?;
        tracing::info!("Registered coworker {}", id);
        Ok(())
    }

    async fn unregister(&self, id: &CoworkerId) -> Result<(), CommError> {
        match tokio::fs::remove_file(self.register_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
