//! Request handling between the NATS transport and the inference pipeline

use crate::error::PipelineError;
use crate::models::inference::InferencePipeline;
use crate::types::request::PredictionRequest;
use crate::types::response::{PredictionFailure, PredictionReply, PredictionResponse};
use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tracing::info;

/// Turn one raw request payload into a reply.
///
/// Every per-request error becomes a structured failure; nothing is thrown
/// across the transport boundary.
pub fn handle_payload(pipeline: &InferencePipeline, payload: &[u8]) -> PredictionReply {
    let request = match PredictionRequest::from_slice(payload) {
        Ok(request) => request,
        Err(e) => {
            let request_id = PredictionRequest::request_id_of(payload)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            return failure(request_id, &e);
        }
    };
    handle_request(pipeline, request)
}

/// Run a decoded request through the pipeline.
pub fn handle_request(pipeline: &InferencePipeline, request: PredictionRequest) -> PredictionReply {
    let features = match request.feature_vector() {
        Ok(features) => features,
        Err(e) => return failure(request.request_id, &e),
    };

    match pipeline.predict(&features) {
        Ok(result) => {
            PredictionReply::Ok(PredictionResponse::new(request.request_id, features, result))
        }
        Err(e) => failure(request.request_id, &e),
    }
}

fn failure(request_id: String, err: &PipelineError) -> PredictionReply {
    PredictionReply::Error(PredictionFailure::new(request_id, err))
}

/// Bounds the number of requests handled concurrently.
///
/// Each in-flight request holds one permit; [`WorkerPool::drain`] waits for
/// all of them to come back.
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    workers: u32,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        let workers = u32::try_from(workers.max(1)).unwrap_or(u32::MAX);
        Self {
            semaphore: Arc::new(Semaphore::new(workers as usize)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers as usize
    }

    /// Requests currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.workers().saturating_sub(self.semaphore.available_permits())
    }

    /// Wait for a free worker. Fails once the pool has been drained.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        self.semaphore.clone().acquire_owned().await
    }

    /// Wait for every in-flight request to finish, then refuse new work.
    pub async fn drain(&self) {
        let in_flight = self.in_flight();
        if in_flight > 0 {
            info!(in_flight, "Waiting for in-flight requests");
        }
        // Err only if already closed, in which case there is nothing to wait for
        let _all = self.semaphore.acquire_many(self.workers).await;
        self.semaphore.close();
    }
}
