use omig_dest::DestinationRef;
use omig_migrator::{HookOutcome, HookRegistry, MigratorError};
use omig_store::{MemoryHostStore, Record, TriggerError};
use rand::Rng;
use serde_json::{Map, json};

pub fn init_log() {
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::{
        EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("OMIG_LOG")
                .from_env_lossy(),
        )
        .init();
}

/// Copy every record of `class_name` to `<dest>/<class>/<id>` and remove
/// it there when it is deleted.
pub fn copy_to_destination(
    registry: &mut HookRegistry,
    class_name: &str,
    dest: DestinationRef,
) -> Result<(), MigratorError> {
    let put_dest = dest.clone();
    registry.migrate_object(class_name, move |record: Record| {
        let dest = put_dest.clone();
        async move {
            record_ref(&dest, &record)?
                .put(&record.to_json())
                .await
                .map_err(TriggerError::other)?;
            Ok(HookOutcome::Unchanged)
        }
    })?;
    registry.migrate_delete(class_name, move |record: Record| {
        let dest = dest.clone();
        async move {
            record_ref(&dest, &record)?
                .delete()
                .await
                .map_err(TriggerError::other)
        }
    })?;
    Ok(())
}

fn record_ref(
    dest: &DestinationRef,
    record: &Record,
) -> Result<DestinationRef, TriggerError> {
    let id = record
        .id()
        .ok_or_else(|| TriggerError::reject("record has no id yet"))?;
    dest.child(record.class_name())
        .and_then(|class| class.child(id))
        .map_err(TriggerError::other)
}

/// Seed records that predate the migration.
pub async fn seed_records(
    store: &MemoryHostStore,
    class_name: &str,
    count: usize,
) {
    let batch: Vec<Map<String, _>> = {
        let mut rng = rand::rng();
        (0..count)
            .map(|i| {
                let mut fields = Map::new();
                fields.insert("seq".into(), json!(i));
                fields.insert("score".into(), json!(rng.random_range(0..100)));
                fields
            })
            .collect()
    };
    for fields in batch {
        store.seed(class_name, fields).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use omig_dest::MemoryTransport;
    use omig_migrator::{Migrator, MigratorConfig};
    use omig_store::LogJobStatus;
    use serde_json::Value;

    use super::*;

    #[tokio::test]
    async fn test_sweep_copies_seeded_records() {
        let store = MemoryHostStore::new();
        seed_records(&store, "Score", 3).await;
        let transport = Arc::new(MemoryTransport::new());
        let dest =
            DestinationRef::new("https://x.example/dev", None, transport.clone());
        let mut registry = HookRegistry::new();
        copy_to_destination(&mut registry, "Score", dest).unwrap();
        let migrator = Migrator::new(
            registry,
            Arc::new(store.clone()),
            MigratorConfig::default(),
        );
        migrator.export_triggers(&store);

        store
            .run_job("import", Arc::new(LogJobStatus::new("import")))
            .await
            .unwrap();
        let copied = transport.value_at("dev/Score").await;
        assert_eq!(copied.as_object().map(|m| m.len()), Some(3));
        assert_eq!(copied["0000000002"]["seq"], json!(1));

        let first = store.get("Score", "0000000001").await.unwrap();
        store.delete(first).await.unwrap();
        assert_eq!(
            transport.value_at("dev/Score/0000000001").await,
            Value::Null
        );
    }

    #[test]
    fn test_copy_hooks_register_once_per_class() {
        let dest = DestinationRef::new(
            "https://x.example",
            None,
            Arc::new(MemoryTransport::new()),
        );
        let mut registry = HookRegistry::new();
        copy_to_destination(&mut registry, "Score", dest.clone()).unwrap();
        assert!(copy_to_destination(&mut registry, "Score", dest).is_err());
    }
}
