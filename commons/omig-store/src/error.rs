use std::error::Error;

/// Errors surfaced by a host store implementation.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// A trigger vetoed the write or delete.
    #[error("Rejected: {0}")]
    Rejected(String),
    #[error("No record `{id}` of class `{class}`")]
    NotFound { class: String, id: String },
    #[error("No job `{0}` registered")]
    NoJob(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Error returned by triggers and user hooks.
///
/// A trigger that fails before a write is committed vetoes that write; the
/// host reports the message back to whoever issued it.
#[derive(thiserror::Error, Debug)]
pub enum TriggerError {
    #[error("{0}")]
    Rejected(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("UnknownError: {0}")]
    Unknown(Box<dyn Error + Send + Sync + 'static>),
}

impl TriggerError {
    pub fn reject<T: Into<String>>(msg: T) -> Self {
        Self::Rejected(msg.into())
    }

    pub fn other<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::Unknown(Box::new(error))
    }
}
