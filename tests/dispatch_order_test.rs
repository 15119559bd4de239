//! Arrival-order handling of embed messages on a multi-threaded runtime.

mod common;

use std::sync::Arc;
use tokio::sync::Semaphore;

use common::{LogBuffer, ScriptedStore};
use session_timing::config::{EmbedConfig, FailurePolicy};
use session_timing::embed::{
    EmbedAction, EmbedScript, InboundMessage, MessageBus, OriginFilter, OriginMatch,
    ScriptRegistry,
};
use session_timing::timer::{MountedTimer, SessionTimer};

const HOST: &str = "https://labs.heygen.com";
const ROUNDS: usize = 200;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_back_to_back_show_hide_are_claimed_in_order() {
    let logs = LogBuffer::default();
    logs.capture_global();

    let script = EmbedScript::from_config(&EmbedConfig::default()).unwrap();
    for _ in 0..ROUNDS {
        let gate = Arc::new(Semaphore::new(0));
        let store = Arc::new(ScriptedStore::gated(gate.clone()));
        let timer = Arc::new(SessionTimer::new(store.clone(), FailurePolicy::StayOpen));
        let bus = Arc::new(MessageBus::new());
        let filter = OriginFilter::new(HOST, OriginMatch::Exact).unwrap();
        let mounted = MountedTimer::mount(
            timer.clone(),
            filter,
            bus.clone(),
            Arc::new(ScriptRegistry::new()),
            &script,
        )
        .unwrap();

        bus.post(InboundMessage::embed(HOST, EmbedAction::Show));
        bus.post(InboundMessage::embed(HOST, EmbedAction::Hide));
        assert!(mounted.wait_processed(1).await);
        gate.add_permits(1);
        assert!(mounted.wait_processed(2).await);

        assert_eq!(store.creates().len(), 1);
        assert!(store.updates().is_empty());
        assert!(timer.state().is_open());
        mounted.unmount().await;
    }

    assert_eq!(logs.count("hide received while no session is open"), 0);
    assert_eq!(
        logs.count("hide received but the open session holds no record id"),
        ROUNDS
    );
}
