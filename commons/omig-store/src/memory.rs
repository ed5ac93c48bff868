use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{
    BeforeSaveTrigger, HostStore, JobFn, JobStatus, Record, RecordQuery,
    StoreError, StoreResult, Trigger, TriggerRequest, TriggerRuntime,
};

type Fields = Map<String, Value>;

#[derive(Default, Clone)]
struct ClassTriggers {
    before_save: Option<BeforeSaveTrigger>,
    after_save: Option<Trigger>,
    before_delete: Option<Trigger>,
    after_delete: Option<Trigger>,
}

#[derive(Default)]
struct Inner {
    data: RwLock<BTreeMap<String, BTreeMap<String, Fields>>>,
    triggers: StdRwLock<HashMap<String, ClassTriggers>>,
    jobs: StdRwLock<HashMap<String, JobFn>>,
    next_id: AtomicU64,
    saves: AtomicUsize,
}

/// In-process host store and trigger runtime.
///
/// Writes go through the registered class triggers exactly like a hosted
/// backend would run them: pre-write (may veto or replace the record),
/// commit, then post-write. Identifiers are zero padded counters so that
/// lexical order matches creation order.
#[derive(Default, Clone)]
pub struct MemoryHostStore {
    inner: Arc<Inner>,
}

impl MemoryHostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly, bypassing every trigger. Models data that
    /// existed before migration was enabled.
    pub async fn seed<S: Into<String>>(
        &self,
        class_name: S,
        fields: Fields,
    ) -> String {
        let id = self.next_id();
        let mut data = self.inner.data.write().await;
        data.entry(class_name.into())
            .or_default()
            .insert(id.clone(), fields);
        id
    }

    pub async fn get(&self, class_name: &str, id: &str) -> Option<Record> {
        let data = self.inner.data.read().await;
        data.get(class_name)
            .and_then(|records| records.get(id))
            .map(|fields| {
                Record::from_fields(class_name, Some(id.into()), fields.clone())
            })
    }

    pub async fn count(&self, class_name: &str) -> usize {
        let data = self.inner.data.read().await;
        data.get(class_name).map(BTreeMap::len).unwrap_or_default()
    }

    /// Number of `save` calls issued so far, including the ones made by
    /// `save_all`.
    pub fn save_count(&self) -> usize {
        self.inner.saves.load(Ordering::Relaxed)
    }

    pub async fn delete(&self, record: Record) -> StoreResult<()> {
        let class_name = record.class_name().to_string();
        let id = record.id().map(str::to_string).ok_or_else(|| {
            StoreError::NotFound {
                class: class_name.clone(),
                id: String::new(),
            }
        })?;
        let triggers = self.triggers_for(&class_name);
        if let Some(before) = &triggers.before_delete {
            before(TriggerRequest::new(record.clone()))
                .await
                .map_err(|e| StoreError::Rejected(e.to_string()))?;
        }
        let removed = {
            let mut data = self.inner.data.write().await;
            data.get_mut(&class_name).and_then(|records| records.remove(&id))
        };
        if removed.is_none() {
            return Err(StoreError::NotFound {
                class: class_name,
                id,
            });
        }
        if let Some(after) = &triggers.after_delete {
            if let Err(e) = after(TriggerRequest::new(record)).await {
                warn!("afterDelete trigger of {} failed: {}", class_name, e);
            }
        }
        Ok(())
    }

    /// Save on behalf of a client installation. Triggers see the id in
    /// their request.
    pub async fn save_from(
        &self,
        mut record: Record,
        installation_id: Option<String>,
    ) -> StoreResult<Record> {
        self.inner.saves.fetch_add(1, Ordering::Relaxed);
        let class_name = record.class_name().to_string();
        let existed = match record.id() {
            Some(id) => self.get(&class_name, id).await.is_some(),
            None => false,
        };
        record.set_existed(existed);

        let triggers = self.triggers_for(&class_name);
        if let Some(before) = &triggers.before_save {
            let request = TriggerRequest::new(record)
                .with_installation(installation_id.clone());
            record = before(request)
                .await
                .map_err(|e| StoreError::Rejected(e.to_string()))?;
        }

        let (id, fields) = self.commit(&record).await;
        debug!("saved {} {}", class_name, id);
        let mut saved = record;
        saved.mark_persisted(id.clone());

        if let Some(after) = &triggers.after_save {
            let mut request = saved.clone();
            request.set_existed(existed);
            let request =
                TriggerRequest::new(request).with_installation(installation_id);
            if let Err(e) = after(request).await {
                warn!("afterSave trigger of {} {} failed: {}", class_name, id, e);
            }
        }
        Ok(Record::from_fields(class_name, Some(id), fields))
    }

    pub async fn run_job(
        &self,
        name: &str,
        status: Arc<dyn JobStatus>,
    ) -> StoreResult<()> {
        let job = {
            let jobs = self
                .inner
                .jobs
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            jobs.get(name).cloned()
        };
        match job {
            Some(job) => {
                job(status).await;
                Ok(())
            }
            None => Err(StoreError::NoJob(name.into())),
        }
    }

    fn next_id(&self) -> String {
        let n = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{:010}", n)
    }

    fn triggers_for(&self, class_name: &str) -> ClassTriggers {
        let triggers = self
            .inner
            .triggers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        triggers.get(class_name).cloned().unwrap_or_default()
    }

    fn update_triggers<F>(&self, class_name: &str, f: F)
    where
        F: FnOnce(&mut ClassTriggers),
    {
        let mut triggers = self
            .inner
            .triggers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(triggers.entry(class_name.to_string()).or_default());
    }

    async fn commit(&self, record: &Record) -> (String, Fields) {
        let mut data = self.inner.data.write().await;
        let records = data.entry(record.class_name().to_string()).or_default();
        let id = match record.id() {
            Some(id) => id.to_string(),
            None => self.next_id(),
        };
        let stored = records.entry(id.clone()).or_default();
        if record.existed() {
            for key in record.dirty_keys() {
                match record.get(key) {
                    Some(value) => {
                        stored.insert(key.to_string(), value.clone());
                    }
                    None => {
                        stored.remove(key);
                    }
                }
            }
        } else {
            *stored = record.fields().clone();
        }
        (id, stored.clone())
    }
}

#[async_trait]
impl HostStore for MemoryHostStore {
    async fn find(&self, query: &RecordQuery) -> StoreResult<Vec<Record>> {
        let data = self.inner.data.read().await;
        let Some(records) = data.get(&query.class_name) else {
            return Ok(vec![]);
        };
        let limit = query.limit.unwrap_or(usize::MAX);
        let out = records
            .iter()
            .map(|(id, fields)| {
                Record::from_fields(
                    query.class_name.clone(),
                    Some(id.clone()),
                    fields.clone(),
                )
            })
            .filter(|record| query.matches(record))
            .take(limit)
            .collect();
        Ok(out)
    }

    async fn save(&self, record: Record) -> StoreResult<Record> {
        self.save_from(record, None).await
    }

    async fn save_all(&self, records: Vec<Record>) -> StoreResult<Vec<Record>> {
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            out.push(self.save(record).await?);
        }
        Ok(out)
    }
}

impl TriggerRuntime for MemoryHostStore {
    fn before_save(&self, class_name: &str, trigger: BeforeSaveTrigger) {
        self.update_triggers(class_name, |t| t.before_save = Some(trigger));
    }

    fn after_save(&self, class_name: &str, trigger: Trigger) {
        self.update_triggers(class_name, |t| t.after_save = Some(trigger));
    }

    fn before_delete(&self, class_name: &str, trigger: Trigger) {
        self.update_triggers(class_name, |t| t.before_delete = Some(trigger));
    }

    fn after_delete(&self, class_name: &str, trigger: Trigger) {
        self.update_triggers(class_name, |t| t.after_delete = Some(trigger));
    }

    fn job(&self, name: &str, job: JobFn) {
        let mut jobs = self
            .inner
            .jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        jobs.insert(name.to_string(), job);
    }
}
