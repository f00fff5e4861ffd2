/// Communication layer errors.
///
/// `Retrieval` is the transient-fault case of the contract: a published
/// record exists but could not be parsed within the bounded retry budget,
/// usually because the read raced the writer. It degrades throughput, never
/// correctness; callers retry later instead of treating the job as lost.
#[derive(Debug, thiserror::Error)]
pub enum CommError {
    #[error("I/O error on communication channel: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("could not retrieve {kind} record after {attempts} attempts")]
    Retrieval { kind: &'static str, attempts: u32 },
}
