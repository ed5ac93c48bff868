use std::sync::Arc;

use futures_util::future;
use omig_store::{HostStore, Record, TriggerError, TriggerRequest};
use tracing::{debug, info, warn};

use crate::{
    ClassHooks, MIGRATION_KEY, MigrationRecordExt, MigrationStatus,
    VersionGates, gate,
};

pub const READ_ONLY_MESSAGE: &str =
    "Sorry, we are currently performing scheduled maintenance.";

/// Lifecycle callbacks of one class, combining the user hooks with the
/// migration state machine.
///
/// The host runs these around every create, update and delete. A failure
/// returned before the write (or delete) is committed rejects it.
#[derive(Clone)]
pub struct TriggerComposer {
    class_name: String,
    hooks: ClassHooks,
    store: Arc<dyn HostStore>,
    read_only: bool,
    gates: VersionGates,
}

impl TriggerComposer {
    pub fn new(
        class_name: impl Into<String>,
        hooks: ClassHooks,
        store: Arc<dyn HostStore>,
        read_only: bool,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            hooks,
            store,
            read_only,
            gates: VersionGates::default(),
        }
    }

    /// Leave writes of clients that migrate themselves to those clients.
    pub fn with_version_gates(mut self, gates: VersionGates) -> Self {
        self.gates = gates;
        self
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Pre-write trigger. Resolves to the record the host should persist.
    pub async fn before_save(
        &self,
        request: TriggerRequest,
    ) -> Result<Record, TriggerError> {
        let installation_id = request.installation_id.clone();
        let object = &request.object;
        if object.is_dirty(MIGRATION_KEY)
            && object.migration_status() == Some(MigrationStatus::JustImported)
        {
            return Ok(request.object);
        }
        if self.read_only {
            debug!("rejecting write to {} in read-only mode", self.class_name);
            return Err(TriggerError::reject(READ_ONLY_MESSAGE));
        }

        // a write that only moves the status must not re-run the user hook
        let status_only = object.only_dirty(MIGRATION_KEY);
        let mut record = match &self.hooks.before_save {
            Some(hook) if !status_only => {
                let current = request.object.clone();
                hook(request).await?.resolve(current)
            }
            _ => request.object,
        };

        let Some(migrate) = &self.hooks.migrate_object else {
            return Ok(record);
        };
        if record.migration_status() == Some(MigrationStatus::IsMigrated) {
            return Ok(record);
        }
        if record.is_new() {
            // migrated on the second pass once the record has an id
            return Ok(record);
        }
        if !self.migrates_writes_of(installation_id.as_deref()).await {
            debug!(
                "client migrates its own write to {} {}",
                self.class_name,
                record.id().unwrap_or_default()
            );
            return Ok(record);
        }

        let next = match record.migration_status() {
            Some(MigrationStatus::NeedsSecondPass) => {
                MigrationStatus::FinishedSecondPass
            }
            _ => MigrationStatus::IsMigrated,
        };
        record.set_migration_status(next);
        let current = record.clone();
        let record = migrate(record).await?.resolve(current);
        debug!(
            "migrated {} {} ({})",
            self.class_name,
            record.id().unwrap_or_default(),
            next
        );
        Ok(record)
    }

    /// Post-write trigger. The user hook and the second-pass save run
    /// concurrently; the write itself is already committed.
    pub async fn after_save(
        &self,
        request: TriggerRequest,
    ) -> Result<(), TriggerError> {
        let needs_second_pass = !request.object.existed()
            && self.hooks.migrate_object.is_some()
            && self
                .migrates_writes_of(request.installation_id.as_deref())
                .await;
        let object = request.object.clone();

        let user_hook = async {
            match &self.hooks.after_save {
                Some(hook) => hook(request).await,
                None => Ok(()),
            }
        };
        let second_pass = async {
            if needs_second_pass {
                let mut record = object;
                info!(
                    "scheduling second pass for new {} {}",
                    self.class_name,
                    record.id().unwrap_or_default()
                );
                record.set_migration_status(MigrationStatus::NeedsSecondPass);
                self.store.save(record).await?;
            }
            Ok::<_, TriggerError>(())
        };

        let (user_result, second_pass_result) =
            future::join(user_hook, second_pass).await;
        if let Err(e) = &user_result {
            warn!("afterSave hook of {} failed: {}", self.class_name, e);
        }
        user_result.and(second_pass_result)
    }

    /// Pre-delete trigger. The user hook may veto; the delete is then
    /// propagated to the destination before the host commits it.
    pub async fn before_delete(
        &self,
        request: TriggerRequest,
    ) -> Result<(), TriggerError> {
        if self.read_only {
            debug!("rejecting delete in {} in read-only mode", self.class_name);
            return Err(TriggerError::reject(READ_ONLY_MESSAGE));
        }
        let object = request.object.clone();
        if let Some(hook) = &self.hooks.before_delete {
            hook(request).await?;
        }
        if let Some(migrate_delete) = &self.hooks.migrate_delete {
            migrate_delete(object).await?;
        }
        Ok(())
    }

    async fn migrates_writes_of(&self, installation_id: Option<&str>) -> bool {
        gate::needs_migration(self.store.as_ref(), &self.gates, installation_id)
            .await
    }

    pub async fn after_delete(
        &self,
        request: TriggerRequest,
    ) -> Result<(), TriggerError> {
        match &self.hooks.after_delete {
            Some(hook) => hook(request).await,
            None => Ok(()),
        }
    }
}
