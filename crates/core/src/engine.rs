use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use toolgate_channel::{ChannelError, RequestChannel};
use toolgate_interfaces::{DecisionListener, DialogShower};
use toolgate_memory::{DecisionMemory, MemoryKey};
use toolgate_protocol::{Decision, PermissionRequest, PermissionResponse};

use crate::notifier::DecisionNotifier;
use crate::source::{resolve_fallback, DecisionSource};

const ERROR_BACKOFF: Duration = Duration::from_secs(1);
const STATUS_LOG_EVERY: u64 = 100;
const STOP_JOIN_BOUND: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct EngineTimings {
    /// Sleep between poll passes over the mailbox.
    pub poll_interval: Duration,
    /// Delay before reading a discovered request, so a requester still
    /// mid-write gets to finish.
    pub grace_delay: Duration,
    /// Bound on the blocking fallback prompt; expiry means deny.
    pub fallback_timeout: Duration,
}

impl Default for EngineTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            grace_delay: Duration::from_millis(100),
            fallback_timeout: Duration::from_secs(30),
        }
    }
}

/// Dedup entry for one request id. Dropping the guard releases the entry,
/// so every exit path (including a panicking continuation) frees the id
/// for a later retry.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl InFlightGuard {
    fn try_acquire(set: &Arc<Mutex<HashSet<String>>>, id: &str) -> Option<Self> {
        if !set.lock().insert(id.to_string()) {
            return None;
        }
        Some(Self {
            set: Arc::clone(set),
            id: id.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.id);
    }
}

struct EngineInner {
    channel: Arc<RequestChannel>,
    memory: Arc<DecisionMemory>,
    source: DecisionSource,
    notifier: Arc<DecisionNotifier>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    timings: EngineTimings,
    running: AtomicBool,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

/// Orchestrates permission arbitration: polls the request channel,
/// deduplicates in-flight requests, consults decision memory, asks the
/// decision source when memory misses, writes the response and notifies
/// the listener.
///
/// Explicitly constructed and owned; clones share one engine, so the host
/// builds it once and hands copies to collaborators. The fail-safe default
/// everywhere is deny: the agent never sees `allow=true` without an
/// explicit, successfully resolved allow verdict.
#[derive(Clone)]
pub struct ArbitrationEngine {
    inner: Arc<EngineInner>,
}

impl ArbitrationEngine {
    pub fn new(
        channel: Arc<RequestChannel>,
        memory: Arc<DecisionMemory>,
        source: DecisionSource,
    ) -> Self {
        Self::with_timings(channel, memory, source, EngineTimings::default())
    }

    pub fn with_timings(
        channel: Arc<RequestChannel>,
        memory: Arc<DecisionMemory>,
        source: DecisionSource,
        timings: EngineTimings,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                channel,
                memory,
                source,
                notifier: Arc::new(DecisionNotifier::new()),
                in_flight: Arc::new(Mutex::new(HashSet::new())),
                timings,
                running: AtomicBool::new(false),
                poll_task: Mutex::new(None),
            }),
        }
    }

    pub fn set_listener(&self, listener: Arc<dyn DecisionListener>) {
        self.inner.notifier.set_listener(listener);
    }

    pub fn reset_memory(&self) {
        self.inner.memory.reset();
    }

    /// Spawns the poll loop. Idempotent: a second call while running is a
    /// no-op.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            debug!("Arbitration engine already running, skipping start");
            return;
        }
        let engine = self.clone();
        let handle = tokio::spawn(async move { engine.poll_loop().await });
        *self.inner.poll_task.lock() = Some(handle);
        info!("Arbitration engine polling {:?}", self.inner.channel.dir());
    }

    /// Signals the loop and waits briefly for it to wind down. A fallback
    /// prompt still open when stop is called keeps its thread; we do not
    /// wait out its 30 s bound here.
    pub async fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        let handle = self.inner.poll_task.lock().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(STOP_JOIN_BOUND, handle).await.is_err() {
                warn!("Poll loop did not stop within {:?}", STOP_JOIN_BOUND);
            }
        }
        info!("Arbitration engine stopped");
    }

    async fn poll_loop(&self) {
        debug!("Poll loop started on {:?}", self.inner.channel.dir());
        let mut ticks: u64 = 0;
        while self.inner.running.load(Ordering::SeqCst) {
            ticks += 1;
            match self.tick().await {
                Ok(pending) => {
                    if ticks % STATUS_LOG_EVERY == 0 {
                        debug!("Poll #{}: {} pending request(s)", ticks, pending);
                    }
                    tokio::time::sleep(self.inner.timings.poll_interval).await;
                }
                Err(e) => {
                    // A failed pass never kills the loop; pause and retry.
                    error!("Poll tick failed: {}", e);
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
        debug!("Poll loop ended");
    }

    /// Runs one poll pass and returns the number of candidates seen.
    /// Public so tests can drive the engine without the interval.
    pub async fn tick(&self) -> Result<usize, ChannelError> {
        let candidates = self.inner.channel.scan().await?;
        let pending = candidates.len();
        for request_id in candidates {
            self.handle_request(&request_id).await;
        }
        Ok(pending)
    }

    async fn handle_request(&self, request_id: &str) {
        let Some(guard) = InFlightGuard::try_acquire(&self.inner.in_flight, request_id) else {
            debug!("Request {} already in flight, skipping", request_id);
            return;
        };
        // Malformed or unreadable requests are abandoned: no response is
        // written, the file stays behind for retry or manual cleanup, and
        // the guard drop frees the id.
        if let Err(e) = self.arbitrate(request_id, guard).await {
            warn!("Abandoning request {}: {}", request_id, e);
        }
    }

    async fn arbitrate(&self, request_id: &str, guard: InFlightGuard) -> Result<(), ChannelError> {
        tokio::time::sleep(self.inner.timings.grace_delay).await;
        let request = self.inner.channel.read(request_id).await?;
        debug!(
            "Arbitrating request {} for tool {}",
            request.request_id, request.tool_name
        );

        // Tool-level memory outranks everything else.
        if let Some(allow) = self.inner.memory.lookup_tool(&request.tool_name) {
            debug!(
                "Tool-level memory hit for {}: allow={}",
                request.tool_name, allow
            );
            let decision = if allow {
                Decision::AllowAlways
            } else {
                Decision::Deny
            };
            self.respond(&request, allow, decision).await;
            return Ok(());
        }

        let key = MemoryKey::derive(&request.tool_name, &request.inputs);
        if let Some(decision) = self.inner.memory.lookup_params(&key) {
            debug!("Parameter-level memory hit for {}", key);
            self.respond(&request, decision.is_allow(), decision).await;
            return Ok(());
        }

        match &self.inner.source {
            DecisionSource::Frontend(shower) => {
                // Delete before awaiting so the next tick cannot rediscover
                // the file while the dialog is open.
                if let Err(e) = self.inner.channel.delete_request(request_id).await {
                    warn!("Failed to delete request {}: {}", request_id, e);
                }
                self.spawn_frontend_continuation(request, Arc::clone(shower), guard);
            }
            DecisionSource::Fallback(prompt) => {
                // Awaited inline: the poll task sees nothing else until the
                // prompt resolves or the bound expires.
                let decision = match resolve_fallback(
                    Arc::clone(prompt),
                    request.tool_name.clone(),
                    request.inputs.clone(),
                    self.inner.timings.fallback_timeout,
                )
                .await
                {
                    Ok(decision) => decision,
                    Err(e) => {
                        warn!("Fallback prompt failed for {}: {}", request.tool_name, e);
                        Decision::Deny
                    }
                };
                if decision == Decision::AllowAlways {
                    self.inner.memory.record_params(key, decision);
                }
                self.respond(&request, decision.is_allow(), decision).await;
            }
        }
        Ok(())
    }

    /// Resolution of the front-end dialog runs on its own task so the poll
    /// loop keeps discovering other requests. The in-flight guard travels
    /// with the continuation and is released on every outcome.
    fn spawn_frontend_continuation(
        &self,
        request: PermissionRequest,
        shower: Arc<dyn DialogShower>,
        guard: InFlightGuard,
    ) {
        let channel = Arc::clone(&self.inner.channel);
        let memory = Arc::clone(&self.inner.memory);
        let notifier = Arc::clone(&self.inner.notifier);
        tokio::spawn(async move {
            let _guard = guard;
            let decision = match shower.show(&request.tool_name, &request.inputs).await {
                Ok(code) => Decision::from_code(code).unwrap_or_else(|| {
                    warn!("Unknown decision code {}, defaulting to deny", code);
                    Decision::Deny
                }),
                Err(e) => {
                    warn!("Frontend dialog failed for {}: {}", request.tool_name, e);
                    Decision::Deny
                }
            };
            if decision == Decision::AllowAlways {
                memory.record_tool_always(&request.tool_name);
            }
            let response = PermissionResponse {
                allow: decision.is_allow(),
            };
            if let Err(e) = channel.write_response(&request.request_id, &response).await {
                // Memory above already stuck, so a retried request at least
                // hits the cache.
                error!("Failed to write response for {}: {}", request.request_id, e);
            }
            notifier.notify(&request.tool_name, &request.inputs, decision);
        });
    }

    /// Writes the response, removes the request file and notifies. Write
    /// and delete failures are logged and swallowed; the in-memory
    /// bookkeeping that led here always stands.
    async fn respond(&self, request: &PermissionRequest, allow: bool, decision: Decision) {
        let response = PermissionResponse { allow };
        if let Err(e) = self
            .inner
            .channel
            .write_response(&request.request_id, &response)
            .await
        {
            error!("Failed to write response for {}: {}", request.request_id, e);
        }
        if let Err(e) = self.inner.channel.delete_request(&request.request_id).await {
            warn!("Failed to delete request {}: {}", request.request_id, e);
        }
        self.inner
            .notifier
            .notify(&request.tool_name, &request.inputs, decision);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_guard_deduplicates() {
        let set = Arc::new(Mutex::new(HashSet::new()));
        let guard = InFlightGuard::try_acquire(&set, "r1");
        assert!(guard.is_some());
        assert!(InFlightGuard::try_acquire(&set, "r1").is_none());
        assert!(InFlightGuard::try_acquire(&set, "r2").is_some());
    }

    #[test]
    fn test_in_flight_guard_releases_on_drop() {
        let set = Arc::new(Mutex::new(HashSet::new()));
        {
            let _guard = InFlightGuard::try_acquire(&set, "r1").unwrap();
            assert!(set.lock().contains("r1"));
        }
        assert!(!set.lock().contains("r1"));
        assert!(InFlightGuard::try_acquire(&set, "r1").is_some());
    }
}
