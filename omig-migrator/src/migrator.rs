use std::sync::Arc;

use futures_util::FutureExt;
use omig_store::{
    HostStore, JobFn, JobStatus, TriggerRequest, TriggerRuntime,
};
use tracing::{error, info};

use crate::{ClassHooks, HookRegistry, MigratorConfig, TriggerComposer};

/// Orchestrator holding the registration table, the host store handle and
/// the tuning knobs. Cheap to clone.
#[derive(Clone)]
pub struct Migrator {
    pub(crate) registry: Arc<HookRegistry>,
    pub(crate) store: Arc<dyn HostStore>,
    pub(crate) config: MigratorConfig,
}

impl Migrator {
    pub fn new(
        registry: HookRegistry,
        store: Arc<dyn HostStore>,
        config: MigratorConfig,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            store,
            config,
        }
    }

    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// Composed callbacks for one class. Classes without hooks get a
    /// composer that only enforces read-only mode.
    pub fn composer(&self, class_name: &str) -> TriggerComposer {
        let hooks = self.registry.get(class_name).cloned().unwrap_or_default();
        TriggerComposer::new(
            class_name,
            hooks,
            self.store.clone(),
            self.config.read_only,
        )
        .with_version_gates(self.config.do_not_migrate_versions.clone())
    }

    /// Register the composed triggers of every class and the sweep job
    /// with the host. Returns the number of triggers registered, the job
    /// excluded.
    pub fn export_triggers(&self, runtime: &dyn TriggerRuntime) -> usize {
        let read_only = self.config.read_only;
        let mut exported = 0;
        for (class_name, hooks) in self.exported_classes() {
            let class_name = class_name.as_str();
            let composer = Arc::new(self.composer(class_name));
            let kinds = ExportedKinds::of(&hooks, read_only);

            if kinds.before_save {
                let composer = composer.clone();
                runtime.before_save(
                    class_name,
                    Arc::new(move |request: TriggerRequest| {
                        let composer = composer.clone();
                        async move { composer.before_save(request).await }
                            .boxed()
                    }),
                );
                exported += 1;
            }
            if kinds.after_save {
                let composer = composer.clone();
                runtime.after_save(
                    class_name,
                    Arc::new(move |request: TriggerRequest| {
                        let composer = composer.clone();
                        async move { composer.after_save(request).await }
                            .boxed()
                    }),
                );
                exported += 1;
            }
            if kinds.before_delete {
                let composer = composer.clone();
                runtime.before_delete(
                    class_name,
                    Arc::new(move |request: TriggerRequest| {
                        let composer = composer.clone();
                        async move { composer.before_delete(request).await }
                            .boxed()
                    }),
                );
                exported += 1;
            }
            if kinds.after_delete {
                runtime.after_delete(
                    class_name,
                    Arc::new(move |request: TriggerRequest| {
                        let composer = composer.clone();
                        async move { composer.after_delete(request).await }
                            .boxed()
                    }),
                );
                exported += 1;
            }
            info!("exported triggers for class {} ({:?})", class_name, kinds);
        }
        runtime.job(&self.config.job_name, self.import_job());
        info!(
            "exported {} triggers and job `{}`",
            exported, self.config.job_name
        );
        exported
    }

    /// Registered classes plus, in read-only mode, the extra classes that
    /// only need locking.
    fn exported_classes(&self) -> Vec<(String, ClassHooks)> {
        let mut classes: Vec<_> = self
            .registry
            .classes()
            .map(|(name, hooks)| (name.to_string(), hooks.clone()))
            .collect();
        if self.config.read_only {
            classes.extend(
                self.config
                    .read_only_classes
                    .iter()
                    .filter(|name| self.registry.get(name).is_none())
                    .map(|name| (name.to_string(), ClassHooks::default())),
            );
        }
        classes
    }

    /// The sweep as a host job. The outcome is reported through the job
    /// status handle.
    pub fn import_job(&self) -> JobFn {
        let migrator = self.clone();
        Arc::new(move |status: Arc<dyn JobStatus>| {
            let migrator = migrator.clone();
            async move {
                match migrator.run_import(status.as_ref()).await {
                    Ok(report) => status.success(report.completion_message()),
                    Err(e) => {
                        error!("import pass failed: {}", e);
                        status.error(&e.to_string());
                    }
                }
            }
            .boxed()
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct ExportedKinds {
    before_save: bool,
    after_save: bool,
    before_delete: bool,
    after_delete: bool,
}

impl ExportedKinds {
    fn of(hooks: &ClassHooks, read_only: bool) -> Self {
        let migrates = hooks.migrate_object.is_some();
        Self {
            before_save: read_only || hooks.before_save.is_some() || migrates,
            after_save: hooks.after_save.is_some() || migrates,
            before_delete: read_only
                || hooks.before_delete.is_some()
                || hooks.migrate_delete.is_some(),
            after_delete: hooks.after_delete.is_some(),
        }
    }
}
