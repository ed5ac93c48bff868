use futures_util::future::try_join_all;
use omig_store::RecordQuery;
use tracing::info;

use crate::{Migrator, MigratorError};

/// Records selected for an ad-hoc migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationTarget {
    One(String),
    Many(Vec<String>),
}

impl MigrationTarget {
    fn into_ids(self) -> Vec<String> {
        let ids = match self {
            MigrationTarget::One(id) => vec![id],
            MigrationTarget::Many(ids) => ids,
        };
        ids.into_iter().filter(|id| !id.is_empty()).collect()
    }
}

impl Migrator {
    /// Run the migrate-one hook on the given records right away.
    ///
    /// Every loaded record is migrated concurrently. Migration status is
    /// left alone and nothing is saved back. Resolves to the number of
    /// records found and migrated.
    pub async fn migrate_records(
        &self,
        class_name: &str,
        target: MigrationTarget,
    ) -> Result<usize, MigratorError> {
        if class_name.is_empty() {
            return Err(MigratorError::invalid_argument(
                "Missing mandatory param 'class'",
            ));
        }
        let ids = target.into_ids();
        if ids.is_empty() {
            return Err(MigratorError::invalid_argument(
                "Must provide param objectId or [objectIds]",
            ));
        }
        let migrate = self
            .registry
            .get(class_name)
            .and_then(|hooks| hooks.migrate_object.clone())
            .ok_or_else(|| MigratorError::NoMigration(class_name.into()))?;

        info!("Migrating {} {:?}", class_name, ids);
        let records = self
            .store
            .find(&RecordQuery::new(class_name).id_in(ids))
            .await?;
        let count = records.len();
        try_join_all(records.into_iter().map(|record| migrate(record))).await?;
        Ok(count)
    }
}
