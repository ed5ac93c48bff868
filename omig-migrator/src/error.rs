use omig_store::{StoreError, TriggerError};

use crate::HookKind;

#[derive(thiserror::Error, Debug)]
pub enum MigratorError {
    #[error("Already registered a {kind} hook for {class}")]
    DuplicateRegistration { class: String, kind: HookKind },
    #[error("{0}")]
    InvalidArgument(String),
    #[error("No migration registered for class `{0}`")]
    NoMigration(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Hook failed: {0}")]
    Hook(#[from] TriggerError),
}

impl MigratorError {
    pub fn invalid_argument<T: Into<String>>(msg: T) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
