use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tracing::{error, info};

use crate::{Record, RecordQuery, StoreResult, TriggerError};

/// Request handed to a trigger by the host runtime.
#[derive(Debug, Clone)]
pub struct TriggerRequest {
    pub object: Record,
    pub installation_id: Option<String>,
}

impl TriggerRequest {
    pub fn new(object: Record) -> Self {
        Self {
            object,
            installation_id: None,
        }
    }

    /// Attribute the request to the client installation that issued it.
    pub fn with_installation(mut self, installation_id: Option<String>) -> Self {
        self.installation_id = installation_id;
        self
    }
}

pub type TriggerFuture<T> = BoxFuture<'static, Result<T, TriggerError>>;

/// Runs before a write is committed. Resolves to the record that should be
/// written; failing vetoes the write.
pub type BeforeSaveTrigger =
    Arc<dyn Fn(TriggerRequest) -> TriggerFuture<Record> + Send + Sync>;

/// Post-write, pre-delete and post-delete triggers.
pub type Trigger =
    Arc<dyn Fn(TriggerRequest) -> TriggerFuture<()> + Send + Sync>;

/// A long running job. It reports progress and its final outcome through
/// the status handle.
pub type JobFn =
    Arc<dyn Fn(Arc<dyn JobStatus>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Query and persistence surface of the host store.
#[async_trait]
pub trait HostStore: Send + Sync {
    /// All records matching the query, ordered by identifier.
    async fn find(&self, query: &RecordQuery) -> StoreResult<Vec<Record>>;

    /// Persist one record, running the class triggers around the write.
    async fn save(&self, record: Record) -> StoreResult<Record>;

    /// Persist several records in one call.
    async fn save_all(&self, records: Vec<Record>) -> StoreResult<Vec<Record>>;
}

/// Registration surface of the host's trigger-invocation runtime.
pub trait TriggerRuntime: Send + Sync {
    fn before_save(&self, class_name: &str, trigger: BeforeSaveTrigger);
    fn after_save(&self, class_name: &str, trigger: Trigger);
    fn before_delete(&self, class_name: &str, trigger: Trigger);
    fn after_delete(&self, class_name: &str, trigger: Trigger);
    fn job(&self, name: &str, job: JobFn);
}

/// Status channel of a running job.
pub trait JobStatus: Send + Sync {
    /// Incremental progress message.
    fn message(&self, message: &str);
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Job status that only writes to the log.
#[derive(Debug, Clone)]
pub struct LogJobStatus {
    job_name: String,
}

impl LogJobStatus {
    pub fn new<S: Into<String>>(job_name: S) -> Self {
        Self {
            job_name: job_name.into(),
        }
    }
}

impl JobStatus for LogJobStatus {
    fn message(&self, message: &str) {
        info!(job = %self.job_name, "{}", message);
    }

    fn success(&self, message: &str) {
        info!(job = %self.job_name, "job succeeded: {}", message);
    }

    fn error(&self, message: &str) {
        error!(job = %self.job_name, "job failed: {}", message);
    }
}
