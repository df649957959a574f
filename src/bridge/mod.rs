//! Message bridge
//!
//! Puts API messages on the bus. Synchronous kinds wait for the reply;
//! everything else is registered as an async job and answered with a
//! polling location right away.

pub mod bus;
pub mod store;

use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

use crate::error::GatewayResult;
use crate::message::{ApiEvent, ApiMessage, MessageKind, MessageReply};

pub use bus::{Bus, EventListener, LocalBus, LocalBusBuilder, MessageHandler};
pub use store::{JobStatus, JobStore, MemoryJobStore};

/// Source of the externally visible base address
pub trait BaseUrlProvider: Send + Sync {
    fn base_url(&self) -> String;
}

impl BaseUrlProvider for Url {
    fn base_url(&self) -> String {
        self.as_str().to_string()
    }
}

/// Builds `<base>/<api version>/<job path>/<id>` polling locations
pub struct JobLocator {
    base: Arc<dyn BaseUrlProvider>,
    api_version: String,
    job_path: String,
}

impl JobLocator {
    pub fn new(base: Arc<dyn BaseUrlProvider>, api_version: &str, job_path: &str) -> Self {
        Self {
            base,
            api_version: api_version.to_string(),
            job_path: job_path.to_string(),
        }
    }

    pub fn location(&self, job_id: &str) -> String {
        let mut location = self.base.base_url().trim_end_matches('/').to_string();
        for segment in [self.api_version.as_str(), self.job_path.as_str(), job_id] {
            let segment = segment.trim_matches('/');
            if !segment.is_empty() {
                location.push('/');
                location.push_str(segment);
            }
        }
        location
    }
}

/// What happened to a message handed to the bridge
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Replied(MessageReply),
    Accepted { location: String },
}

pub struct MessageBridge {
    bus: Arc<dyn Bus>,
    store: Arc<dyn JobStore>,
    locator: JobLocator,
}

impl MessageBridge {
    pub fn new(bus: Arc<dyn Bus>, store: Arc<dyn JobStore>, locator: JobLocator) -> Self {
        Self {
            bus,
            store,
            locator,
        }
    }

    /// Subscribe the job store to completion events
    pub fn listen(&self) {
        self.bus.subscribe(Arc::new(JobCompletion {
            store: Arc::clone(&self.store),
        }));
    }

    pub async fn send(&self, msg: Box<dyn ApiMessage>, kind: MessageKind) -> GatewayResult<Delivery> {
        if kind.is_sync() {
            return Ok(Delivery::Replied(self.bus.call(msg).await));
        }

        let job_id = self.store.save(msg.as_ref()).await?;
        let location = self.locator.location(&job_id);
        self.bus.send(msg);
        Ok(Delivery::Accepted { location })
    }

    pub async fn query_job(&self, job_id: &str) -> JobStatus {
        self.store.query(job_id).await
    }
}

/// Moves jobs out of `processing` when their event arrives
struct JobCompletion {
    store: Arc<dyn JobStore>,
}

#[async_trait]
impl EventListener for JobCompletion {
    async fn handle_event(&self, event: ApiEvent) {
        self.store.complete(event).await;
    }
}
