//! Live migration of records from a host store to a destination store.
//!
//! User code registers per-class hooks in a [`HookRegistry`]. A
//! [`Migrator`] turns them into host triggers that migrate every write as
//! it happens, and into a sweep job that backfills records written before
//! migration was enabled. Progress lives in the records themselves, under
//! the [`MIGRATION_KEY`] field.

mod adhoc;
mod composer;
mod config;
mod error;
mod gate;
mod importer;
mod migrator;
mod registry;
mod status;
mod sweep;

pub use adhoc::MigrationTarget;
pub use composer::{READ_ONLY_MESSAGE, TriggerComposer};
pub use config::{ClassNames, MigratorConfig, VersionGates};
pub use error::MigratorError;
pub use gate::INSTALLATION_CLASS;
pub use migrator::Migrator;
pub use registry::{
    BeforeSaveHook, BulkImportHook, ClassHooks, EventHook, HookKind,
    HookOutcome, HookRegistry, MigrateDeleteHook, MigrateHook,
};
pub use status::{
    IMPORT_BATCH_SIZE, MAX_JOB_DURATION, MIGRATION_KEY, MigrationRecordExt,
    MigrationStatus, SAVE_BATCH_SIZE,
};
pub use sweep::{INITIAL_IMPORT_DONE, IMPORT_PASS_DONE, ImportReport};
