use std::sync::Arc;

use futures_util::future::try_join_all;
use omig_store::{HostStore, Record};
use tracing::debug;

use crate::{
    BulkImportHook, ClassHooks, MigrateHook, MigrationRecordExt,
    MigrationStatus, MigratorError,
};

enum ImportHook {
    Bulk(BulkImportHook),
    PerRecord(MigrateHook),
}

/// Migrates one page of records and stamps them `JustImported`.
pub(crate) struct BatchImporter {
    class_name: String,
    hook: ImportHook,
    store: Arc<dyn HostStore>,
    save_batch_size: usize,
}

impl BatchImporter {
    /// `None` when the class has neither a bulk nor a per-record hook.
    pub(crate) fn for_class(
        class_name: &str,
        hooks: &ClassHooks,
        store: Arc<dyn HostStore>,
        save_batch_size: usize,
    ) -> Option<Self> {
        let hook = match (&hooks.bulk_import, &hooks.migrate_object) {
            (Some(bulk), _) => ImportHook::Bulk(bulk.clone()),
            (None, Some(migrate)) => ImportHook::PerRecord(migrate.clone()),
            (None, None) => return None,
        };
        Some(Self {
            class_name: class_name.to_string(),
            hook,
            store,
            save_batch_size: save_batch_size.max(1),
        })
    }

    /// Returns the number of records stamped and saved back.
    pub(crate) async fn import(
        &self,
        records: Vec<Record>,
    ) -> Result<usize, MigratorError> {
        if records.is_empty() {
            return Ok(0);
        }
        let migrated = match &self.hook {
            ImportHook::Bulk(bulk) => bulk(records).await?,
            ImportHook::PerRecord(migrate) => {
                try_join_all(records.into_iter().map(|record| {
                    let current = record.clone();
                    let migration = migrate(record);
                    async move {
                        migration.await.map(|outcome| outcome.resolve(current))
                    }
                }))
                .await?
            }
        };

        let count = migrated.len();
        let mut pending = migrated.into_iter().map(|mut record| {
            record.set_migration_status(MigrationStatus::JustImported);
            record
        });
        loop {
            let batch: Vec<Record> =
                pending.by_ref().take(self.save_batch_size).collect();
            if batch.is_empty() {
                break;
            }
            debug!("saving {} imported {}", batch.len(), self.class_name);
            self.store.save_all(batch).await?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use omig_store::{MemoryHostStore, RecordQuery};
    use serde_json::{Map, json};

    use super::*;
    use crate::{HookOutcome, HookRegistry};

    async fn seeded(n: usize) -> MemoryHostStore {
        let store = MemoryHostStore::new();
        for i in 0..n {
            let mut fields = Map::new();
            fields.insert("n".into(), json!(i));
            store.seed("Foo", fields).await;
        }
        store
    }

    async fn all(store: &MemoryHostStore) -> Vec<Record> {
        store.find(&RecordQuery::new("Foo")).await.unwrap()
    }

    #[tokio::test]
    async fn test_per_record_import_stamps_every_record() {
        let store = seeded(5).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut registry = HookRegistry::new();
        registry
            .migrate_object("Foo", move |_record| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(HookOutcome::Unchanged) }
            })
            .unwrap();
        let importer = BatchImporter::for_class(
            "Foo",
            registry.get("Foo").unwrap(),
            Arc::new(store.clone()),
            2,
        )
        .unwrap();

        let count = importer.import(all(&store).await).await.unwrap();
        assert_eq!(count, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(store.save_count(), 5);
        for record in all(&store).await {
            assert_eq!(
                record.migration_status(),
                Some(MigrationStatus::JustImported)
            );
        }
    }

    #[tokio::test]
    async fn test_bulk_hook_wins_over_per_record() {
        let store = seeded(3).await;
        let mut registry = HookRegistry::new();
        registry
            .migrate_object("Foo", |_record| async {
                Err(omig_store::TriggerError::reject("not used"))
            })
            .unwrap()
            .bulk_import("Foo", |records: Vec<Record>| async move {
                Ok(records
                    .into_iter()
                    .map(|mut r| {
                        r.set("bulk", true);
                        r
                    })
                    .collect::<Vec<_>>())
            })
            .unwrap();
        let importer = BatchImporter::for_class(
            "Foo",
            registry.get("Foo").unwrap(),
            Arc::new(store.clone()),
            50,
        )
        .unwrap();

        assert_eq!(importer.import(all(&store).await).await.unwrap(), 3);
        for record in all(&store).await {
            assert_eq!(record.get("bulk"), Some(&json!(true)));
        }
    }

    #[tokio::test]
    async fn test_failed_migration_saves_nothing() {
        let store = seeded(3).await;
        let mut registry = HookRegistry::new();
        registry
            .migrate_object("Foo", |record: Record| async move {
                if record.get("n") == Some(&json!(1)) {
                    Err(omig_store::TriggerError::reject("boom"))
                } else {
                    Ok(HookOutcome::Unchanged)
                }
            })
            .unwrap();
        let importer = BatchImporter::for_class(
            "Foo",
            registry.get("Foo").unwrap(),
            Arc::new(store.clone()),
            50,
        )
        .unwrap();

        assert!(importer.import(all(&store).await).await.is_err());
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn test_not_applicable_without_hooks() {
        let mut registry = HookRegistry::new();
        registry
            .after_save("Foo", |_request| async { Ok(()) })
            .unwrap();
        assert!(
            BatchImporter::for_class(
                "Foo",
                registry.get("Foo").unwrap(),
                Arc::new(MemoryHostStore::new()),
                50,
            )
            .is_none()
        );
    }
}
