//! Session timer: turns `show`/`hide` signals into one create and one
//! update against the record store.
//!
//! Handlers may run concurrently (each inbound message is dispatched on
//! its own task), so every state check and transition happens under a
//! short lock that is never held across a store call. Each handler is
//! split in two: [`SessionTimer::claim`] applies the transition
//! synchronously, [`SessionTimer::complete`] awaits the store call. A
//! `show` claims the open slot before its create is awaited, which keeps a
//! burst of duplicate `show` messages down to a single create.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use super::clock::{Clock, SystemClock};
use super::state::SessionState;
use crate::config::FailurePolicy;
use crate::embed::EmbedAction;
use crate::error::ProtocolViolation;
use crate::store::{RecordId, RecordStore};

/// What a single handler invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// A session opened and its record was created.
    Opened {
        /// Id returned by the store.
        record_id: RecordId,
        /// Start time written to the record.
        started_at: DateTime<Utc>,
    },
    /// A session opened but the create call failed.
    CreateFailed,
    /// The open session's record was closed.
    Closed {
        /// Id of the closed record.
        record_id: RecordId,
        /// Duration written to the record.
        duration_ms: i64,
    },
    /// The update call failed.
    UpdateFailed {
        /// Id of the record that could not be closed.
        record_id: RecordId,
    },
    /// The signal did not fit the current state; nothing was sent.
    Rejected(ProtocolViolation),
    /// The action is not a session boundary.
    Ignored,
    /// The timer was torn down; state was left alone.
    Detached,
}

/// Counters kept for diagnostics and replay summaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimerStats {
    /// Create calls issued.
    pub create_calls: u64,
    /// Update calls issued.
    pub update_calls: u64,
    /// Sessions closed successfully.
    pub sessions_recorded: u64,
    /// Store calls that failed.
    pub store_failures: u64,
    /// Signals rejected as protocol violations.
    pub protocol_violations: u64,
    /// Messages that were not acted on at all.
    pub ignored_messages: u64,
}

/// Point-in-time view of a timer.
#[derive(Debug, Clone, Serialize)]
pub struct TimerSnapshot {
    /// Current session state.
    pub session: SessionState,
    /// Lifetime counters.
    pub stats: TimerStats,
    /// Store calls not yet answered.
    pub in_flight: usize,
    /// Whether teardown has run.
    pub torn_down: bool,
}

#[derive(Debug, Default)]
struct TimerInner {
    state: SessionState,
    stats: TimerStats,
    torn_down: bool,
}

/// Records streaming sessions into a [`RecordStore`].
pub struct SessionTimer {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    policy: FailurePolicy,
    inner: Mutex<TimerInner>,
    in_flight: Arc<AtomicUsize>,
}

/// Counts a store call as in flight for as long as it lives.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

enum StoreCall {
    Create {
        started_at: DateTime<Utc>,
    },
    Update {
        record_id: RecordId,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    },
}

/// A store call whose state transition has already been applied.
///
/// It counts as in flight from the moment it is claimed until
/// [`SessionTimer::complete`] has its response.
pub struct PendingCall {
    call: StoreCall,
    in_flight: InFlight,
}

/// Result of the synchronous half of a handler.
pub enum Claim {
    /// The state moved; the store call still has to run.
    Pending(PendingCall),
    /// Nothing to send; the handler is finished.
    Done(HandleOutcome),
}

impl SessionTimer {
    /// Create a timer using the wall clock.
    pub fn new(store: Arc<dyn RecordStore>, policy: FailurePolicy) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), policy)
    }

    /// Create a timer with an explicit clock.
    pub fn with_clock(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
            inner: Mutex::new(TimerInner::default()),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn inner(&self) -> MutexGuard<'_, TimerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Dispatch an accepted embed action.
    pub async fn handle(&self, action: EmbedAction) -> HandleOutcome {
        let claim = self.claim(action);
        self.complete(claim).await
    }

    /// Open a session and create its record.
    pub async fn on_show(&self) -> HandleOutcome {
        let claim = self.claim_show();
        self.complete(claim).await
    }

    /// Close the open session and update its record.
    pub async fn on_hide(&self) -> HandleOutcome {
        let claim = self.claim_hide();
        self.complete(claim).await
    }

    /// Apply the state transition for `action` without awaiting anything.
    ///
    /// Claims made in arrival order see the state in arrival order, even
    /// when their store calls complete out of order.
    pub fn claim(&self, action: EmbedAction) -> Claim {
        match action {
            EmbedAction::Show => self.claim_show(),
            EmbedAction::Hide => self.claim_hide(),
            EmbedAction::Init => {
                self.record_ignored();
                Claim::Done(HandleOutcome::Ignored)
            }
        }
    }

    /// Closed -> Open, reserving the create call.
    pub fn claim_show(&self) -> Claim {
        let started_at = self.clock.now();
        let mut inner = self.inner();
        if inner.torn_down {
            debug!(action = "show", "Timer torn down; ignoring show");
            return Claim::Done(HandleOutcome::Detached);
        }
        if let Err(violation) = inner.state.open(started_at) {
            inner.stats.protocol_violations += 1;
            warn!(action = "show", %violation, "Ignoring duplicate show");
            return Claim::Done(HandleOutcome::Rejected(violation));
        }
        inner.stats.create_calls += 1;
        Claim::Pending(PendingCall {
            call: StoreCall::Create { started_at },
            in_flight: InFlight::enter(&self.in_flight),
        })
    }

    /// Mark the open session closing, reserving the update call.
    pub fn claim_hide(&self) -> Claim {
        let ended_at = self.clock.now();
        let mut inner = self.inner();
        if inner.torn_down {
            debug!(action = "hide", "Timer torn down; ignoring hide");
            return Claim::Done(HandleOutcome::Detached);
        }
        match inner.state.begin_close() {
            Ok((record_id, started_at)) => {
                inner.stats.update_calls += 1;
                Claim::Pending(PendingCall {
                    call: StoreCall::Update {
                        record_id,
                        started_at,
                        ended_at,
                    },
                    in_flight: InFlight::enter(&self.in_flight),
                })
            }
            Err(violation) => {
                inner.stats.protocol_violations += 1;
                warn!(action = "hide", %violation, "Skipping session end update");
                Claim::Done(HandleOutcome::Rejected(violation))
            }
        }
    }

    /// Run the store call of a claim and apply its response.
    pub async fn complete(&self, claim: Claim) -> HandleOutcome {
        let pending = match claim {
            Claim::Pending(pending) => pending,
            Claim::Done(outcome) => return outcome,
        };
        let PendingCall { call, in_flight } = pending;
        match call {
            StoreCall::Create { started_at } => self.finish_create(started_at, in_flight).await,
            StoreCall::Update {
                record_id,
                started_at,
                ended_at,
            } => {
                self.finish_update(record_id, started_at, ended_at, in_flight)
                    .await
            }
        }
    }

    async fn finish_create(&self, started_at: DateTime<Utc>, in_flight: InFlight) -> HandleOutcome {
        info!(start_time = %started_at, "Session started; creating timing record");
        let result = self.store.create(started_at).await;
        drop(in_flight);

        let mut inner = self.inner();
        if inner.torn_down {
            debug!(start_time = %started_at, "Create answered after teardown; discarding");
            return HandleOutcome::Detached;
        }

        match result {
            Ok(record_id) => {
                if !inner.state.attach_record(started_at, record_id.clone()) {
                    warn!(record_id = %record_id, "Create answered for a session that is no longer open");
                }
                info!(record_id = %record_id, start_time = %started_at, "Stored session start");
                HandleOutcome::Opened {
                    record_id,
                    started_at,
                }
            }
            Err(e) => {
                inner.stats.store_failures += 1;
                error!(start_time = %started_at, error = %e, "Failed to store start time");
                if self.policy == FailurePolicy::Close {
                    inner.state.abandon(started_at);
                }
                HandleOutcome::CreateFailed
            }
        }
    }

    async fn finish_update(
        &self,
        record_id: RecordId,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        in_flight: InFlight,
    ) -> HandleOutcome {
        let duration_ms = (ended_at - started_at).num_milliseconds();
        info!(
            record_id = %record_id,
            end_time = %ended_at,
            duration_ms,
            "Session ended; updating timing record"
        );
        let result = self.store.update(&record_id, ended_at, duration_ms).await;
        drop(in_flight);

        let mut inner = self.inner();
        if inner.torn_down {
            debug!(record_id = %record_id, "Update answered after teardown; discarding");
            return HandleOutcome::Detached;
        }

        match result {
            Ok(()) => {
                inner.state.close(&record_id);
                inner.stats.sessions_recorded += 1;
                info!(record_id = %record_id, duration_ms, "Stored session end");
                HandleOutcome::Closed {
                    record_id,
                    duration_ms,
                }
            }
            Err(e) => {
                inner.stats.store_failures += 1;
                error!(record_id = %record_id, error = %e, "Failed to store end time");
                match self.policy {
                    FailurePolicy::StayOpen => inner.state.abort_close(&record_id),
                    FailurePolicy::Close => {
                        inner.state.close(&record_id);
                    }
                }
                HandleOutcome::UpdateFailed { record_id }
            }
        }
    }

    /// Count a message that was filtered out before reaching a handler.
    pub fn record_ignored(&self) {
        self.inner().stats.ignored_messages += 1;
    }

    /// Stop reacting to signals and store responses.
    ///
    /// Outstanding store calls are not cancelled; their responses are
    /// discarded. Returns how many were still in flight.
    pub fn teardown(&self) -> usize {
        let mut inner = self.inner();
        inner.torn_down = true;
        let outstanding = self.in_flight.load(Ordering::SeqCst);
        if outstanding > 0 {
            info!(outstanding, "Timer torn down with store requests in flight");
        } else {
            debug!("Timer torn down");
        }
        outstanding
    }

    /// Whether teardown has run.
    pub fn is_torn_down(&self) -> bool {
        self.inner().torn_down
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.inner().state.clone()
    }

    /// Store calls not yet answered.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Snapshot of state and counters.
    pub fn snapshot(&self) -> TimerSnapshot {
        let inner = self.inner();
        TimerSnapshot {
            session: inner.state.clone(),
            stats: inner.stats.clone(),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            torn_down: inner.torn_down,
        }
    }
}
