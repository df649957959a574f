//! Async job store
//!
//! Tracks API messages sent one-way on the bus until their completion event
//! arrives. The gateway only needs `save`, `query` and `complete`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::error::JobStoreError;
use crate::logger;
use crate::message::{ApiEvent, ApiMessage};

/// Job state as seen by a polling client
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Processing,
    /// Terminal; the event says whether the job succeeded
    Done(ApiEvent),
    /// Terminal; also reported for ids the store never saw
    Expired,
}

impl JobStatus {
    pub const fn state(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Done(_) => "done",
            Self::Expired => "expired",
        }
    }
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Register a message about to be sent; returns the job id
    async fn save(&self, msg: &dyn ApiMessage) -> Result<String, JobStoreError>;

    async fn query(&self, id: &str) -> JobStatus;

    /// Record the completion event of a saved job
    async fn complete(&self, event: ApiEvent);
}

#[derive(Debug)]
struct JobRecord {
    api_type: &'static str,
    created: Instant,
    result: Option<ApiEvent>,
}

/// In-process job store with time-based expiry
#[derive(Debug)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, JobRecord>>,
    expiry: Duration,
}

impl MemoryJobStore {
    pub fn new(expiry: Duration) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            expiry,
        }
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    fn is_expired(&self, record: &JobRecord) -> bool {
        record.created.elapsed() >= self.expiry
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn save(&self, msg: &dyn ApiMessage) -> Result<String, JobStoreError> {
        let id = msg.header().id.clone();
        let mut jobs = self.jobs.write().await;
        // jobs nobody polled would otherwise stay forever
        jobs.retain(|_, record| !self.is_expired(record));
        if jobs.contains_key(&id) {
            return Err(JobStoreError::Save {
                type_name: msg.type_name(),
                reason: format!("job {id} already exists"),
            });
        }

        jobs.insert(
            id.clone(),
            JobRecord {
                api_type: msg.type_name(),
                created: Instant::now(),
                result: None,
            },
        );
        Ok(id)
    }

    async fn query(&self, id: &str) -> JobStatus {
        {
            let jobs = self.jobs.read().await;
            match jobs.get(id) {
                None => return JobStatus::Expired,
                Some(record) if !self.is_expired(record) => {
                    return record
                        .result
                        .clone()
                        .map_or(JobStatus::Processing, JobStatus::Done);
                }
                Some(_) => {}
            }
        }

        self.jobs.write().await.remove(id);
        JobStatus::Expired
    }

    async fn complete(&self, event: ApiEvent) {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&event.api_id) {
            Some(record) if record.result.is_none() => {
                logger::log_job_completed(&event.api_id, record.api_type, event.success);
                record.result = Some(event);
            }
            Some(_) => {
                logger::log_warning(&format!("job {} completed twice, ignored", event.api_id));
            }
            None => {
                logger::log_debug(&format!(
                    "event {} for unknown job {} ignored",
                    event.type_name, event.api_id
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CreateVmInstanceMsg;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_then_processing() {
        let store = MemoryJobStore::new(Duration::from_secs(60));
        let msg = CreateVmInstanceMsg::default();
        let id = store.save(&msg).await.unwrap();
        assert_eq!(id, msg.header().id);
        let status = store.query(&id).await;
        assert_eq!(status, JobStatus::Processing);
        assert_eq!(status.state(), "processing");
        assert!(store.save(&msg).await.is_err());
    }

    #[tokio::test]
    async fn test_complete_transitions_to_done() {
        let store = MemoryJobStore::new(Duration::from_secs(60));
        let msg = CreateVmInstanceMsg::default();
        let id = store.save(&msg).await.unwrap();

        let event = ApiEvent::ok(&id, "APICreateVmInstanceEvent", json!({"inventory": {}}));
        store.complete(event.clone()).await;
        let status = store.query(&id).await;
        assert_eq!(status.state(), "done");
        assert_eq!(status, JobStatus::Done(event.clone()));

        // a second event does not overwrite the first
        let late = ApiEvent::failed(&id, "APICreateVmInstanceEvent", crate::message::ErrorCode::new("SYS.1000", "late"));
        store.complete(late).await;
        assert_eq!(store.query(&id).await, JobStatus::Done(event));
    }

    #[tokio::test]
    async fn test_unknown_and_stale_jobs_are_expired() {
        let store = MemoryJobStore::new(Duration::ZERO);
        assert_eq!(store.query("missing").await, JobStatus::Expired);

        let msg = CreateVmInstanceMsg::default();
        let id = store.save(&msg).await.unwrap();
        assert_eq!(store.query(&id).await, JobStatus::Expired);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_save_sweeps_expired_jobs() {
        let store = MemoryJobStore::new(Duration::ZERO);
        for _ in 0..1010 {
            store.save(&CreateVmInstanceMsg::default()).await.unwrap();
        }
        // only the job saved last survives its own sweep
        assert_eq!(store.len().await, 1);

        let store = MemoryJobStore::new(Duration::from_secs(60));
        for _ in 0..3 {
            store.save(&CreateVmInstanceMsg::default()).await.unwrap();
        }
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_event_for_unknown_job_is_ignored() {
        let store = MemoryJobStore::new(Duration::from_secs(60));
        store
            .complete(ApiEvent::ok("nope", "APICreateVmInstanceEvent", json!({})))
            .await;
        assert_eq!(store.len().await, 0);
    }
}
