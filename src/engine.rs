use crate::{
    endpoint::{EndpointState, ScoringEndpoint},
    error::ScoringError,
    messages::{InferenceRequest, PredictionResult, ScoringResponse},
    model::Classifier,
};
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError, mpsc},
    thread::JoinHandle,
    time::{Duration, Instant},
};
use tokio::sync::oneshot;

/// Represents the current state of the inference thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for the next request.
    Idle,
    /// Scoring a request.
    Processing,
}

impl WorkerState {
    /// Returns the state as a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Processing => "processing",
        }
    }
}

/// Internal job wrapper used by the engine to track scoring requests.
struct ScoringJob {
    id: u64,
    request: InferenceRequest,
    reply: oneshot::Sender<EngineResponse>,
}

/// Response returned by the engine with the endpoint's answer and telemetry.
#[derive(Debug)]
pub struct EngineResponse {
    /// Identifier assigned when the request was scheduled.
    pub id: u64,
    /// Number of images in the request.
    pub images: usize,
    /// Time spent scoring the request, excluding time in the queue.
    pub duration: Duration,
    /// The endpoint's answer.
    pub response: ScoringResponse,
}

/// Serves a ready endpoint from a dedicated inference thread.
///
/// The endpoint, and with it the classifier, is moved into the thread and
/// dropped when the engine stops. Requests are queued and scored one at a
/// time in arrival order.
pub struct ScoringEngine {
    state: Arc<Mutex<WorkerState>>,
    req_tx: Option<mpsc::Sender<ScoringJob>>,
    inference_handle: Option<JoinHandle<()>>,
    id_counter: Mutex<u64>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScoringEngine {
    /// Creates a new engine around a ready endpoint.
    ///
    /// Fails with [`ScoringError::NotReady`] if the endpoint has no
    /// classifier loaded.
    pub fn new<C>(endpoint: ScoringEndpoint<C>) -> Result<Self, ScoringError>
    where
        C: Classifier + Send + 'static,
    {
        if endpoint.state() != EndpointState::Ready {
            return Err(ScoringError::NotReady);
        }

        let (req_tx, req_rx) = mpsc::channel::<ScoringJob>();
        let state = Arc::new(Mutex::new(WorkerState::Idle));

        let inference_handle = std::thread::spawn({
            let state = state.clone();
            move || {
                while let Ok(job) = req_rx.recv() {
                    log::debug!("Scoring request {} with {} images", job.id, job.request.len());

                    *lock(&state) = WorkerState::Processing;
                    let start_time = Instant::now();

                    // The endpoint is ready, so `handle` cannot fail here.
                    let response = endpoint.handle(&job.request).unwrap_or_else(|e| {
                        ScoringResponse::Failure(PredictionResult::failure(e.to_string()))
                    });

                    let duration = start_time.elapsed();
                    log::debug!("Request {} scored in {:?}", job.id, duration);

                    if job
                        .reply
                        .send(EngineResponse {
                            id: job.id,
                            images: job.request.len(),
                            duration,
                            response,
                        })
                        .is_err()
                    {
                        log::warn!("Caller of request {} went away before the reply", job.id);
                    }

                    *lock(&state) = WorkerState::Idle;
                }
                log::info!("Inference thread stopped");
            }
        });

        Ok(Self {
            state,
            req_tx: Some(req_tx),
            inference_handle: Some(inference_handle),
            id_counter: Mutex::new(0),
        })
    }

    /// Whether the inference thread is still alive to take requests.
    pub fn is_running(&self) -> bool {
        self.req_tx.is_some()
            && self
                .inference_handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    /// Returns the current state of the inference thread.
    pub fn state(&self) -> WorkerState {
        *lock(&self.state)
    }

    /// Queues a request and waits for its response.
    pub async fn score(&self, request: InferenceRequest) -> Result<EngineResponse, ScoringError> {
        let tx = self.req_tx.as_ref().ok_or(ScoringError::EngineStopped)?;

        let id = {
            let mut counter = lock(&self.id_counter);
            let id = *counter;
            *counter = counter.wrapping_add(1);
            id
        };

        let (reply, rx) = oneshot::channel();
        tx.send(ScoringJob { id, request, reply })
            .map_err(|_| ScoringError::EngineStopped)?;

        rx.await.map_err(|_| {
            log::error!("Inference thread dropped request {id}");
            ScoringError::EngineStopped
        })
    }

    /// Stops the engine and joins the inference thread.
    ///
    /// Requests already queued are scored before the thread exits.
    pub fn stop(&mut self) {
        self.req_tx.take();
        if let Some(handle) = self.inference_handle.take() {
            if handle.join().is_err() {
                log::error!("Inference thread panicked");
            }
        }
    }
}

impl Drop for ScoringEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
