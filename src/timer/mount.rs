//! Mounting a session timer onto a page.
//!
//! Mounting injects the embed loader once and registers a listener on the
//! message bus. Each accepted message claims its state transition in
//! arrival order, then awaits its store call on its own task, the way a
//! browser runs async `message` listeners up to their first `await`.
//! Unmounting deregisters the listener, removes the script and tears the
//! timer down; in-flight store calls are left to finish on their own.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::session_timer::{Claim, SessionTimer};
use crate::embed::{
    EmbedScript, HostPage, InboundMessage, ListenerId, MessageBus, OriginFilter, ScriptHandle,
};
use crate::error::Result;

/// What unmount found when it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownReport {
    /// Store calls still in flight at teardown.
    pub outstanding_requests: usize,
    /// Whether the injected script was removed.
    pub script_removed: bool,
}

/// A timer attached to a page and a message bus.
pub struct MountedTimer {
    timer: Arc<SessionTimer>,
    bus: Arc<MessageBus>,
    page: Arc<dyn HostPage>,
    listener: ListenerId,
    script: ScriptHandle,
    processed: watch::Receiver<u64>,
    dispatcher: JoinHandle<()>,
}

impl MountedTimer {
    /// Inject `script` into `page` and start listening on `bus`.
    ///
    /// # Errors
    ///
    /// Returns an error if the page refuses the script; no listener is
    /// registered in that case.
    pub fn mount(
        timer: Arc<SessionTimer>,
        filter: OriginFilter,
        bus: Arc<MessageBus>,
        page: Arc<dyn HostPage>,
        script: &EmbedScript,
    ) -> Result<Self> {
        let handle = page.inject_script(script)?;
        let (listener, rx) = bus.add_listener();
        let (processed_tx, processed) = watch::channel(0u64);

        info!(
            filters = %filter.summary(),
            widget = %script.widget_url(),
            "Mounted session timer"
        );

        let dispatcher = tokio::spawn(dispatch(timer.clone(), filter, rx, Arc::new(processed_tx)));

        Ok(Self {
            timer,
            bus,
            page,
            listener,
            script: handle,
            processed,
            dispatcher,
        })
    }

    /// The mounted timer.
    pub fn timer(&self) -> &Arc<SessionTimer> {
        &self.timer
    }

    /// Wait until at least `count` messages have been fully handled.
    ///
    /// Returns `false` if the dispatcher stopped first.
    pub async fn wait_processed(&self, count: u64) -> bool {
        let mut processed = self.processed.clone();
        let reached = processed.wait_for(|n| *n >= count).await.is_ok();
        reached
    }

    /// Number of messages fully handled so far.
    pub fn processed(&self) -> u64 {
        *self.processed.borrow()
    }

    /// Deregister the listener, remove the script and tear the timer down.
    pub async fn unmount(self) -> TeardownReport {
        self.bus.remove_listener(self.listener);

        let script_removed = match self.page.remove_script(self.script) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Embed script already gone at unmount");
                false
            }
        };

        let outstanding_requests = self.timer.teardown();

        // The listener is gone, so the dispatcher drains what was queued
        // and stops; handlers it spawned are not awaited.
        if let Err(e) = self.dispatcher.await {
            warn!(error = %e, "Message dispatcher ended abnormally");
        }

        info!(outstanding_requests, "Unmounted session timer");
        TeardownReport {
            outstanding_requests,
            script_removed,
        }
    }
}

async fn dispatch(
    timer: Arc<SessionTimer>,
    filter: OriginFilter,
    mut rx: mpsc::UnboundedReceiver<InboundMessage>,
    processed: Arc<watch::Sender<u64>>,
) {
    while let Some(message) = rx.recv().await {
        let Some(action) = filter.accept(&message) else {
            trace!(origin = %message.origin, "Ignoring message");
            timer.record_ignored();
            processed.send_modify(|n| *n += 1);
            continue;
        };

        debug!(origin = %message.origin, %action, "Dispatching embed message");
        // Claim in arrival order; only the store call runs on its own task.
        let pending = match timer.claim(action) {
            Claim::Pending(pending) => pending,
            Claim::Done(_) => {
                processed.send_modify(|n| *n += 1);
                continue;
            }
        };

        let timer = timer.clone();
        let processed = processed.clone();
        tokio::spawn(async move {
            timer.complete(Claim::Pending(pending)).await;
            processed.send_modify(|n| *n += 1);
        });
    }
    debug!("Message listener closed");
}
