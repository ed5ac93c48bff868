use std::{collections::BTreeMap, fmt, future::Future, sync::Arc};

use futures_util::FutureExt;
use omig_store::{Record, TriggerError, TriggerFuture, TriggerRequest};

use crate::MigratorError;

/// Result of a hook that may substitute the record being processed.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HookOutcome {
    /// Keep the record the hook was given, including any changes the
    /// composer made before calling it.
    #[default]
    Unchanged,
    Replaced(Record),
}

impl HookOutcome {
    pub fn resolve(self, current: Record) -> Record {
        match self {
            HookOutcome::Unchanged => current,
            HookOutcome::Replaced(record) => record,
        }
    }
}

impl From<Record> for HookOutcome {
    fn from(record: Record) -> Self {
        HookOutcome::Replaced(record)
    }
}

impl From<Option<Record>> for HookOutcome {
    fn from(record: Option<Record>) -> Self {
        record.map_or(HookOutcome::Unchanged, HookOutcome::Replaced)
    }
}

pub type BeforeSaveHook =
    Arc<dyn Fn(TriggerRequest) -> TriggerFuture<HookOutcome> + Send + Sync>;
pub type EventHook =
    Arc<dyn Fn(TriggerRequest) -> TriggerFuture<()> + Send + Sync>;
pub type MigrateHook =
    Arc<dyn Fn(Record) -> TriggerFuture<HookOutcome> + Send + Sync>;
pub type MigrateDeleteHook =
    Arc<dyn Fn(Record) -> TriggerFuture<()> + Send + Sync>;
pub type BulkImportHook =
    Arc<dyn Fn(Vec<Record>) -> TriggerFuture<Vec<Record>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    BeforeSave,
    AfterSave,
    BeforeDelete,
    AfterDelete,
    MigrateObject,
    MigrateDelete,
    BulkImport,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookKind::BeforeSave => "beforeSave",
            HookKind::AfterSave => "afterSave",
            HookKind::BeforeDelete => "beforeDelete",
            HookKind::AfterDelete => "afterDelete",
            HookKind::MigrateObject => "migrateObject",
            HookKind::MigrateDelete => "migrateDelete",
            HookKind::BulkImport => "bulkImport",
        };
        f.write_str(name)
    }
}

/// User hooks of one class.
#[derive(Default, Clone)]
pub struct ClassHooks {
    pub before_save: Option<BeforeSaveHook>,
    pub after_save: Option<EventHook>,
    pub before_delete: Option<EventHook>,
    pub after_delete: Option<EventHook>,
    pub migrate_object: Option<MigrateHook>,
    pub migrate_delete: Option<MigrateDeleteHook>,
    pub bulk_import: Option<BulkImportHook>,
}

impl ClassHooks {
    pub fn has(&self, kind: HookKind) -> bool {
        match kind {
            HookKind::BeforeSave => self.before_save.is_some(),
            HookKind::AfterSave => self.after_save.is_some(),
            HookKind::BeforeDelete => self.before_delete.is_some(),
            HookKind::AfterDelete => self.after_delete.is_some(),
            HookKind::MigrateObject => self.migrate_object.is_some(),
            HookKind::MigrateDelete => self.migrate_delete.is_some(),
            HookKind::BulkImport => self.bulk_import.is_some(),
        }
    }

    /// Whether the sweep has anything to run for this class.
    pub fn can_import(&self) -> bool {
        self.migrate_object.is_some() || self.bulk_import.is_some()
    }
}

impl fmt::Debug for ClassHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<String> = [
            HookKind::BeforeSave,
            HookKind::AfterSave,
            HookKind::BeforeDelete,
            HookKind::AfterDelete,
            HookKind::MigrateObject,
            HookKind::MigrateDelete,
            HookKind::BulkImport,
        ]
        .into_iter()
        .filter(|kind| self.has(*kind))
        .map(|kind| kind.to_string())
        .collect();
        f.debug_tuple("ClassHooks").field(&kinds).finish()
    }
}

/// Registration table: at most one hook per (class, kind).
///
/// Hooks are plain async closures. Registering a second hook of the same
/// kind for a class fails instead of replacing the first one.
#[derive(Default, Debug)]
pub struct HookRegistry {
    classes: BTreeMap<String, ClassHooks>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered classes in name order.
    pub fn classes(&self) -> impl Iterator<Item = (&str, &ClassHooks)> {
        self.classes.iter().map(|(name, hooks)| (name.as_str(), hooks))
    }

    pub fn get(&self, class_name: &str) -> Option<&ClassHooks> {
        self.classes.get(class_name)
    }

    fn slot(
        &mut self,
        class_name: &str,
        kind: HookKind,
    ) -> Result<&mut ClassHooks, MigratorError> {
        let hooks = self.classes.entry(class_name.to_string()).or_default();
        if hooks.has(kind) {
            return Err(MigratorError::DuplicateRegistration {
                class: class_name.to_string(),
                kind,
            });
        }
        Ok(hooks)
    }

    /// Runs before a write; may veto it or replace the record.
    pub fn before_save<F, Fut>(
        &mut self,
        class_name: &str,
        hook: F,
    ) -> Result<&mut Self, MigratorError>
    where
        F: Fn(TriggerRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookOutcome, TriggerError>> + Send + 'static,
    {
        let hook: BeforeSaveHook =
            Arc::new(move |request: TriggerRequest| hook(request).boxed());
        self.slot(class_name, HookKind::BeforeSave)?.before_save = Some(hook);
        Ok(self)
    }

    pub fn after_save<F, Fut>(
        &mut self,
        class_name: &str,
        hook: F,
    ) -> Result<&mut Self, MigratorError>
    where
        F: Fn(TriggerRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TriggerError>> + Send + 'static,
    {
        let hook: EventHook =
            Arc::new(move |request: TriggerRequest| hook(request).boxed());
        self.slot(class_name, HookKind::AfterSave)?.after_save = Some(hook);
        Ok(self)
    }

    /// Runs before a delete; failing vetoes it.
    pub fn before_delete<F, Fut>(
        &mut self,
        class_name: &str,
        hook: F,
    ) -> Result<&mut Self, MigratorError>
    where
        F: Fn(TriggerRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TriggerError>> + Send + 'static,
    {
        let hook: EventHook =
            Arc::new(move |request: TriggerRequest| hook(request).boxed());
        self.slot(class_name, HookKind::BeforeDelete)?.before_delete =
            Some(hook);
        Ok(self)
    }

    pub fn after_delete<F, Fut>(
        &mut self,
        class_name: &str,
        hook: F,
    ) -> Result<&mut Self, MigratorError>
    where
        F: Fn(TriggerRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TriggerError>> + Send + 'static,
    {
        let hook: EventHook =
            Arc::new(move |request: TriggerRequest| hook(request).boxed());
        self.slot(class_name, HookKind::AfterDelete)?.after_delete =
            Some(hook);
        Ok(self)
    }

    /// Copies one record to the destination. Used by live writes, the
    /// sweep and ad-hoc migration.
    pub fn migrate_object<F, Fut>(
        &mut self,
        class_name: &str,
        hook: F,
    ) -> Result<&mut Self, MigratorError>
    where
        F: Fn(Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookOutcome, TriggerError>> + Send + 'static,
    {
        let hook: MigrateHook =
            Arc::new(move |record: Record| hook(record).boxed());
        self.slot(class_name, HookKind::MigrateObject)?.migrate_object =
            Some(hook);
        Ok(self)
    }

    /// Propagates a delete before the host commits it.
    pub fn migrate_delete<F, Fut>(
        &mut self,
        class_name: &str,
        hook: F,
    ) -> Result<&mut Self, MigratorError>
    where
        F: Fn(Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TriggerError>> + Send + 'static,
    {
        let hook: MigrateDeleteHook =
            Arc::new(move |record: Record| hook(record).boxed());
        self.slot(class_name, HookKind::MigrateDelete)?.migrate_delete =
            Some(hook);
        Ok(self)
    }

    /// Migrates a whole sweep page in one call; preferred over
    /// `migrate_object` by the sweep when both exist.
    pub fn bulk_import<F, Fut>(
        &mut self,
        class_name: &str,
        hook: F,
    ) -> Result<&mut Self, MigratorError>
    where
        F: Fn(Vec<Record>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Record>, TriggerError>> + Send + 'static,
    {
        let hook: BulkImportHook =
            Arc::new(move |records: Vec<Record>| hook(records).boxed());
        self.slot(class_name, HookKind::BulkImport)?.bulk_import = Some(hook);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = HookRegistry::new();
        registry
            .migrate_object("Foo", |_record| async {
                Ok(HookOutcome::Unchanged)
            })
            .unwrap()
            .after_save("Foo", |_request| async { Ok(()) })
            .unwrap();

        let err = registry
            .migrate_object("Foo", |_record| async {
                Ok(HookOutcome::Unchanged)
            })
            .unwrap_err();
        assert!(matches!(
            err,
            MigratorError::DuplicateRegistration {
                kind: HookKind::MigrateObject,
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "Already registered a migrateObject hook for Foo"
        );

        // same kind on another class is fine
        registry
            .migrate_object("Bar", |_record| async {
                Ok(HookOutcome::Unchanged)
            })
            .unwrap();
        let names: Vec<&str> = registry.classes().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Bar", "Foo"]);
    }

    #[test]
    fn test_class_hooks_kinds() {
        let mut registry = HookRegistry::new();
        registry
            .before_delete("Foo", |_request| async { Ok(()) })
            .unwrap();
        let hooks = registry.get("Foo").unwrap();
        assert!(hooks.has(HookKind::BeforeDelete));
        assert!(!hooks.has(HookKind::AfterDelete));
        assert!(!hooks.can_import());
        assert_eq!(format!("{:?}", hooks), r#"ClassHooks(["beforeDelete"])"#);
    }

    #[test]
    fn test_outcome_resolve() {
        let current = Record::new("Foo");
        let mut other = Record::new("Foo");
        other.set("x", 1);
        assert_eq!(HookOutcome::Unchanged.resolve(current.clone()), current);
        assert_eq!(HookOutcome::from(other.clone()).resolve(current), other);
        assert_eq!(HookOutcome::from(None::<Record>), HookOutcome::Unchanged);
    }
}
