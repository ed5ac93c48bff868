use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use omig_store::{
    HostStore, JobStatus, MemoryHostStore, Record, RecordQuery, StoreResult,
};
use serde_json::{Map, json};

/// Job status that records everything reported to it.
#[derive(Default)]
pub struct RecordingStatus {
    pub messages: Mutex<Vec<String>>,
    pub outcome: Mutex<Option<Result<String, String>>>,
}

#[allow(dead_code)]
impl RecordingStatus {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn outcome(&self) -> Option<Result<String, String>> {
        self.outcome.lock().unwrap().clone()
    }
}

impl JobStatus for RecordingStatus {
    fn message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn success(&self, message: &str) {
        *self.outcome.lock().unwrap() = Some(Ok(message.to_string()));
    }

    fn error(&self, message: &str) {
        *self.outcome.lock().unwrap() = Some(Err(message.to_string()));
    }
}

#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

#[allow(dead_code)]
impl Counter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Seed `n` records without a migration status.
#[allow(dead_code)]
pub async fn seed(store: &MemoryHostStore, class_name: &str, n: usize) {
    for i in 0..n {
        let mut fields = Map::new();
        fields.insert("n".into(), json!(i));
        store.seed(class_name, fields).await;
    }
}

/// Host store that records the size of every `save_all` call and how many
/// of them were in flight at once.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct RecordingStore {
    pub inner: MemoryHostStore,
    batches: Arc<Mutex<Vec<usize>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl RecordingStore {
    pub fn batches(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostStore for RecordingStore {
    async fn find(&self, query: &RecordQuery) -> StoreResult<Vec<Record>> {
        self.inner.find(query).await
    }

    async fn save(&self, record: Record) -> StoreResult<Record> {
        self.inner.save(record).await
    }

    async fn save_all(&self, records: Vec<Record>) -> StoreResult<Vec<Record>> {
        self.batches.lock().unwrap().push(records.len());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let saved = self.inner.save_all(records).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        saved
    }
}
