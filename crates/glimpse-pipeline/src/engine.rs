//! Recognition engine: runs providers on the blocking pool and hands
//! completions to a single sink under a per-lane delivery policy.

use glimpse_core::{ImageBuffer, ObservationProvider, ProviderKind, RecognitionError, ResultSet};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no tokio runtime available to run recognition workers")]
    NoRuntime,
    #[error("completion sink closed")]
    SinkClosed,
}

/// Identifies one submitted image until its completion is delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a lane treats frames that arrive while it is busy, and which
/// completions reach the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// Every submission runs; completions are delivered in submission order.
    Ordered,
    /// New frames are dropped while a request is in flight.
    DropWhileBusy,
    /// One pending slot; each new arrival replaces the pending frame.
    CoalesceLatest,
    /// Every submission runs concurrently; a completion older than one
    /// already delivered is discarded.
    Latest,
}

impl FromStr for DeliveryPolicy {
    type Err = glimpse_core::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ordered" => Ok(Self::Ordered),
            "drop" => Ok(Self::DropWhileBusy),
            "coalesce" => Ok(Self::CoalesceLatest),
            "latest" => Ok(Self::Latest),
            other => Err(glimpse_core::ParseEnumError {
                kind: "delivery policy",
                value: other.to_string(),
            }),
        }
    }
}

/// Outcome of one request, as handed to the presentation context.
#[derive(Debug, Clone)]
pub struct Completion {
    pub request: RequestId,
    pub provider: String,
    pub kind: ProviderKind,
    pub outcome: Result<ResultSet, RecognitionError>,
}

/// What `submit` did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Started immediately.
    Accepted(RequestId),
    /// Parked as the lane's pending frame; `replaced` was discarded.
    Coalesced {
        id: RequestId,
        replaced: Option<RequestId>,
    },
    /// Lane busy; the frame was discarded.
    Dropped,
}

/// Per-lane counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneStats {
    pub submitted: u64,
    pub dropped: u64,
    /// Pending frames replaced by a newer arrival.
    pub coalesced: u64,
    pub delivered: u64,
    /// Completions discarded because a newer one was already delivered.
    pub superseded: u64,
}

struct Job {
    id: RequestId,
    seq: u64,
    image: ImageBuffer,
    provider: Arc<dyn ObservationProvider>,
}

#[derive(Default)]
struct Lane {
    in_flight: usize,
    next_seq: u64,
    pending: Option<Job>,
    // Ordered lanes: the next sequence number to hand over, and completions
    // that finished early.
    next_delivery: u64,
    parked: BTreeMap<u64, Completion>,
    // Latest-wins lanes: highest sequence number delivered so far.
    last_delivered: Option<u64>,
    stats: LaneStats,
}

impl Lane {
    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

struct Inner {
    policy: DeliveryPolicy,
    runtime: Handle,
    sink: mpsc::UnboundedSender<Completion>,
    lanes: Mutex<HashMap<String, Lane>>,
    next_request: AtomicU64,
}

/// Clone-safe handle to the engine. Safe to use from any thread.
#[derive(Clone)]
pub struct RecognitionEngine {
    inner: Arc<Inner>,
}

impl RecognitionEngine {
    /// Create an engine on the current tokio runtime.
    pub fn new(
        policy: DeliveryPolicy,
        sink: mpsc::UnboundedSender<Completion>,
    ) -> Result<Self, EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        Ok(Self::with_runtime(policy, sink, runtime))
    }

    pub fn with_runtime(
        policy: DeliveryPolicy,
        sink: mpsc::UnboundedSender<Completion>,
        runtime: Handle,
    ) -> Self {
        tracing::info!(?policy, "recognition engine started");
        Self {
            inner: Arc::new(Inner {
                policy,
                runtime,
                sink,
                lanes: Mutex::new(HashMap::new()),
                next_request: AtomicU64::new(1),
            }),
        }
    }

    /// Engine plus the receiving end of its completion queue.
    pub fn channel(
        policy: DeliveryPolicy,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Completion>), EngineError> {
        let (tx, rx) = mpsc::unbounded_channel();
        Ok((Self::new(policy, tx)?, rx))
    }

    pub fn policy(&self) -> DeliveryPolicy {
        self.inner.policy
    }

    /// Submit one frame. Never blocks on the provider; the result arrives on
    /// the completion sink.
    pub fn submit(
        &self,
        image: ImageBuffer,
        provider: &Arc<dyn ObservationProvider>,
    ) -> Result<Submission, EngineError> {
        if self.inner.sink.is_closed() {
            return Err(EngineError::SinkClosed);
        }

        let mut lanes = self.inner.lock_lanes();
        let lane = lanes.entry(provider.id().to_string()).or_default();
        lane.stats.submitted += 1;
        let busy = lane.in_flight > 0;

        match self.inner.policy {
            DeliveryPolicy::DropWhileBusy if busy => {
                lane.stats.dropped += 1;
                tracing::debug!(provider = provider.id(), "lane busy, frame dropped");
                return Ok(Submission::Dropped);
            }
            DeliveryPolicy::CoalesceLatest if busy => {
                let id = self.inner.next_id();
                let seq = lane.take_seq();
                let replaced = lane
                    .pending
                    .replace(Job {
                        id,
                        seq,
                        image,
                        provider: Arc::clone(provider),
                    })
                    .map(|job| job.id);
                if let Some(old) = replaced {
                    lane.stats.coalesced += 1;
                    tracing::debug!(provider = provider.id(), %old, new = %id, "pending frame replaced");
                }
                return Ok(Submission::Coalesced { id, replaced });
            }
            _ => {}
        }

        let id = self.inner.next_id();
        let seq = lane.take_seq();
        lane.in_flight += 1;
        drop(lanes);

        tracing::trace!(provider = provider.id(), request = %id, "request accepted");
        self.inner.spawn(Job {
            id,
            seq,
            image,
            provider: Arc::clone(provider),
        });
        Ok(Submission::Accepted(id))
    }

    /// Run one recognition and await its result directly, bypassing the
    /// completion sink and lane policy.
    pub async fn recognize(
        &self,
        image: ImageBuffer,
        provider: Arc<dyn ObservationProvider>,
    ) -> Result<ResultSet, RecognitionError> {
        let id = provider.id().to_string();
        self.inner
            .runtime
            .spawn_blocking(move || run_provider(provider.as_ref(), &image))
            .await
            .unwrap_or_else(|e| Err(RecognitionError::provider_failure(&id, e)))
    }

    pub fn stats(&self, provider_id: &str) -> Option<LaneStats> {
        self.inner.lock_lanes().get(provider_id).map(|lane| lane.stats)
    }
}

impl Inner {
    fn lock_lanes(&self) -> MutexGuard<'_, HashMap<String, Lane>> {
        // Lane bookkeeping stays consistent even if a holder panicked.
        self.lanes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_id(&self) -> RequestId {
        RequestId(self.next_request.fetch_add(1, Ordering::Relaxed))
    }

    fn spawn(self: &Arc<Self>, job: Job) {
        let inner = Arc::clone(self);
        self.runtime.spawn_blocking(move || {
            let Job {
                id,
                seq,
                image,
                provider,
            } = job;
            let outcome = run_provider(provider.as_ref(), &image);
            drop(image);
            inner.complete(provider, id, seq, outcome);
        });
    }

    fn complete(
        self: &Arc<Self>,
        provider: Arc<dyn ObservationProvider>,
        id: RequestId,
        seq: u64,
        outcome: Result<ResultSet, RecognitionError>,
    ) {
        let completion = Completion {
            request: id,
            provider: provider.id().to_string(),
            kind: provider.kind(),
            outcome,
        };

        let mut next_job = None;
        let mut lanes = self.lock_lanes();
        let Some(lane) = lanes.get_mut(provider.id()) else {
            return;
        };
        lane.in_flight = lane.in_flight.saturating_sub(1);

        match self.policy {
            DeliveryPolicy::Ordered => {
                lane.parked.insert(seq, completion);
                while let Some(ready) = lane.parked.remove(&lane.next_delivery) {
                    lane.next_delivery += 1;
                    self.deliver(&mut lane.stats, ready);
                }
            }
            DeliveryPolicy::DropWhileBusy | DeliveryPolicy::CoalesceLatest | DeliveryPolicy::Latest => {
                if lane.last_delivered.map_or(true, |last| seq > last) {
                    lane.last_delivered = Some(seq);
                    self.deliver(&mut lane.stats, completion);
                } else {
                    lane.stats.superseded += 1;
                    tracing::debug!(provider = provider.id(), request = %id, "stale result discarded");
                }
                if let Some(job) = lane.pending.take() {
                    lane.in_flight += 1;
                    next_job = Some(job);
                }
            }
        }
        drop(lanes);

        if let Some(job) = next_job {
            tracing::trace!(provider = provider.id(), request = %job.id, "starting pending frame");
            self.spawn(job);
        }
    }

    // Called with the lane lock held so sends from concurrent workers keep
    // the lane's delivery order.
    fn deliver(&self, stats: &mut LaneStats, completion: Completion) {
        let request = completion.request;
        if self.sink.send(completion).is_err() {
            tracing::debug!(%request, "completion sink closed, result discarded");
            return;
        }
        stats.delivered += 1;
    }
}

/// Invoke a provider, turning errors, panics and variant mismatches into
/// `ProviderFailure`.
fn run_provider(
    provider: &dyn ObservationProvider,
    image: &ImageBuffer,
) -> Result<ResultSet, RecognitionError> {
    let started = std::time::Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| provider.detect(image)));
    let elapsed = started.elapsed();

    let outcome = match result {
        Ok(Ok(set)) if set.kind() != provider.kind() => Err(RecognitionError::provider_failure(
            provider.id(),
            format!("returned {} observations from a {} provider", set.kind(), provider.kind()),
        )),
        Ok(Ok(set)) => Ok(set),
        Ok(Err(err)) => Err(RecognitionError::provider_failure(provider.id(), err)),
        Err(_) => Err(RecognitionError::provider_failure(provider.id(), "provider panicked")),
    };

    match &outcome {
        Ok(set) => tracing::debug!(
            provider = provider.id(),
            observations = set.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "recognition complete"
        ),
        Err(err) => tracing::warn!(provider = provider.id(), error = %err, "recognition failed"),
    }
    outcome
}
