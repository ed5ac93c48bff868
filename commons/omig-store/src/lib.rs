//! Host store capability used by the migrator: the record model, queries,
//! trigger and job registration, and an in-process implementation.

mod error;
mod memory;
mod query;
mod record;
mod traits;

pub use error::{StoreError, StoreResult, TriggerError};
pub use memory::MemoryHostStore;
pub use query::RecordQuery;
pub use record::{OBJECT_ID_KEY, Record};
pub use traits::{
    BeforeSaveTrigger, HostStore, JobFn, JobStatus, LogJobStatus, Trigger,
    TriggerFuture, TriggerRequest, TriggerRuntime,
};
