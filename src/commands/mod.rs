//! Command handlers for session-timing
//!
//! Each submodule backs one CLI subcommand. The shared helpers below turn
//! configuration into the store, filter and loader every command needs.

use std::sync::Arc;

use crate::config::{Config, StoreKind};
use crate::embed::{EmbedScript, OriginFilter};
use crate::error::{Result, SessionTimingError};
use crate::store::{MemoryStore, PostgrestStore, PostgrestStoreConfig, RecordStore};

/// A configured record store, plus the in-memory handle when there is one.
pub struct StoreHandle {
    /// Store the timer writes to.
    pub store: Arc<dyn RecordStore>,
    /// Same store, when it is the in-memory one, for summaries.
    pub memory: Option<Arc<MemoryStore>>,
}

/// Build the record store selected by configuration.
///
/// # Errors
///
/// Returns a configuration error if a PostgREST store lacks its URL or key.
pub fn build_store(config: &Config) -> Result<StoreHandle> {
    match config.store.kind {
        StoreKind::Memory => {
            let memory = Arc::new(MemoryStore::new());
            Ok(StoreHandle {
                store: memory.clone(),
                memory: Some(memory),
            })
        }
        StoreKind::Postgrest => {
            let base_url = config.store.url.clone().ok_or_else(|| {
                SessionTimingError::Config("store.url is required for the postgrest store".into())
            })?;
            let api_key = config.store.api_key.clone().ok_or_else(|| {
                SessionTimingError::Config(
                    "store.api_key is required for the postgrest store".into(),
                )
            })?;
            let store = PostgrestStore::new(PostgrestStoreConfig {
                base_url,
                api_key,
                table: config.store.table.clone(),
                timeout_secs: config.store.timeout_seconds,
            })
            .map_err(SessionTimingError::Store)?;
            Ok(StoreHandle {
                store: Arc::new(store),
                memory: None,
            })
        }
    }
}

/// Build the trusted-origin filter from configuration.
pub fn build_filter(config: &Config) -> Result<OriginFilter> {
    OriginFilter::new(config.embed.trusted_origin(), config.embed.origin_match)
}

/// Build the embed loader from configuration.
pub fn build_script(config: &Config) -> Result<EmbedScript> {
    EmbedScript::from_config(&config.embed)
}

// Relay server command
pub mod serve {
    //! `serve`: mount a timer behind the relay server until Ctrl-C.

    use super::*;
    use crate::embed::{MessageBus, ScriptRegistry};
    use crate::server::{self, RelayState};
    use crate::timer::{MountedTimer, SessionTimer};
    use tokio::net::TcpListener;
    use tracing::{info, warn};

    /// Run the relay server.
    ///
    /// When no relay URL is configured, the served loader forwards to this
    /// server's own `/messages` endpoint.
    pub async fn run_serve(mut config: Config, bind: Option<String>) -> Result<()> {
        if let Some(bind) = bind {
            config.server.bind = bind;
        }

        let listener = TcpListener::bind(&config.server.bind).await.map_err(|e| {
            SessionTimingError::Server(format!("Failed to bind {}: {}", config.server.bind, e))
        })?;
        let local_addr = listener.local_addr()?;

        if config.embed.relay_url.is_none() {
            config.embed.relay_url = Some(format!("http://{}/messages", local_addr));
        }

        let handle = build_store(&config)?;
        let timer = Arc::new(SessionTimer::new(handle.store, config.timer.on_store_failure));
        let bus = Arc::new(MessageBus::new());
        let page = Arc::new(ScriptRegistry::new());

        let mounted = MountedTimer::mount(
            timer.clone(),
            build_filter(&config)?,
            bus.clone(),
            page.clone(),
            &build_script(&config)?,
        )?;

        let state = RelayState { bus, page, timer };
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
        };

        let served = server::serve(listener, state, shutdown).await;
        let report = mounted.unmount().await;
        info!(
            outstanding_requests = report.outstanding_requests,
            "Session timer stopped"
        );
        served
    }
}

// Replay command
pub mod replay {
    //! `replay`: drive a timer from recorded messages.

    use super::*;
    use crate::embed::{InboundMessage, MessageBus, ScriptRegistry};
    use crate::store::SessionTiming;
    use crate::timer::{MountedTimer, SessionState, SessionTimer, TimerStats};
    use colored::Colorize;
    use serde::Serialize;
    use std::io::Read;
    use std::path::Path;

    /// Outcome of a replay run.
    #[derive(Debug, Clone, Serialize)]
    pub struct ReplaySummary {
        /// Messages read from the input.
        pub messages: u64,
        /// Timer counters at the end of the run.
        pub stats: TimerStats,
        /// Session state when the timer was unmounted.
        pub final_state: SessionState,
        /// Store calls still in flight at unmount.
        pub outstanding_requests: usize,
        /// Rows written, when the in-memory store was used.
        #[serde(skip_serializing_if = "Option::is_none")]
        pub records: Option<Vec<SessionTiming>>,
    }

    /// Parse newline-delimited inbound messages.
    ///
    /// Blank lines and lines starting with `#` are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first line that is not a valid message.
    pub fn parse_messages(contents: &str) -> Result<Vec<InboundMessage>> {
        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with('#')
            })
            .map(|(index, line)| {
                serde_json::from_str::<InboundMessage>(line).map_err(|e| {
                    anyhow::Error::from(SessionTimingError::Config(format!(
                        "Invalid message on line {}: {}",
                        index + 1,
                        e
                    )))
                })
            })
            .collect()
    }

    fn read_input(input: &Path) -> Result<String> {
        if input == Path::new("-") {
            let mut contents = String::new();
            std::io::stdin().read_to_string(&mut contents)?;
            Ok(contents)
        } else {
            Ok(std::fs::read_to_string(input)?)
        }
    }

    /// Replay `messages` through a freshly mounted timer.
    ///
    /// Each message is fully handled before the next is posted, so the
    /// result does not depend on store latency.
    pub async fn replay_messages(
        config: &Config,
        messages: Vec<InboundMessage>,
    ) -> Result<ReplaySummary> {
        let handle = build_store(config)?;
        let timer = Arc::new(SessionTimer::new(
            handle.store.clone(),
            config.timer.on_store_failure,
        ));
        let bus = Arc::new(MessageBus::new());
        let page = Arc::new(ScriptRegistry::new());
        let mounted = MountedTimer::mount(
            timer.clone(),
            build_filter(config)?,
            bus.clone(),
            page,
            &build_script(config)?,
        )?;

        let mut posted = 0u64;
        for message in messages {
            bus.post(message);
            posted += 1;
            mounted.wait_processed(posted).await;
        }

        let snapshot = timer.snapshot();
        let report = mounted.unmount().await;

        Ok(ReplaySummary {
            messages: posted,
            stats: snapshot.stats,
            final_state: snapshot.session,
            outstanding_requests: report.outstanding_requests,
            records: handle.memory.map(|m| m.records()),
        })
    }

    /// Run the replay command and print its summary.
    pub async fn run_replay(config: Config, input: &Path, json: bool) -> Result<ReplaySummary> {
        let messages = parse_messages(&read_input(input)?)?;
        let summary = replay_messages(&config, messages).await?;

        if json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_summary(&summary);
        }

        Ok(summary)
    }

    fn print_summary(summary: &ReplaySummary) {
        let stats = &summary.stats;
        println!("{}", "Replay summary".bold());
        println!("  messages:            {}", summary.messages);
        println!("  create calls:        {}", stats.create_calls);
        println!("  update calls:        {}", stats.update_calls);
        println!(
            "  sessions recorded:   {}",
            stats.sessions_recorded.to_string().green()
        );
        if stats.store_failures > 0 {
            println!(
                "  store failures:      {}",
                stats.store_failures.to_string().red()
            );
        } else {
            println!("  store failures:      0");
        }
        println!(
            "  protocol violations: {}",
            stats.protocol_violations.to_string().yellow()
        );
        println!("  ignored messages:    {}", stats.ignored_messages);

        let state = match &summary.final_state {
            SessionState::Closed => "closed".to_string(),
            SessionState::Open { record_id, .. } => match record_id {
                Some(id) => format!("open (record {})", id),
                None => "open (no record)".to_string(),
            },
        };
        println!("  final state:         {}", state);

        if let Some(records) = &summary.records {
            for record in records {
                let duration = record
                    .duration
                    .map(|d| format!("{} ms", d))
                    .unwrap_or_else(|| "open".to_string());
                println!(
                    "  record {:>4}  {}  {}",
                    record.id.to_string().cyan(),
                    record.start_time.to_rfc3339(),
                    duration
                );
            }
        }
    }
}

// Embed loader command
pub mod embed {
    //! `embed`: print the loader script.

    use super::*;

    /// Render the loader, optionally pointing it at `relay_url`.
    pub fn render_embed(mut config: Config, relay_url: Option<String>) -> Result<String> {
        if relay_url.is_some() {
            config.embed.relay_url = relay_url;
        }
        Ok(build_script(&config)?.render())
    }

    /// Print the loader to stdout.
    pub fn print_embed(config: Config, relay_url: Option<String>) -> Result<()> {
        println!("{}", render_embed(config, relay_url)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::{EmbedAction, InboundMessage};
    use crate::timer::SessionState;

    const HOST: &str = "https://labs.heygen.com";

    fn memory_config() -> Config {
        let mut config = Config::default();
        config.store.kind = StoreKind::Memory;
        config
    }

    #[test]
    fn test_build_store_memory() {
        let handle = build_store(&memory_config()).unwrap();
        assert!(handle.memory.is_some());
    }

    #[test]
    fn test_build_store_postgrest_requires_url() {
        assert!(build_store(&Config::default()).is_err());
    }

    #[test]
    fn test_parse_messages_skips_blank_and_comment_lines() {
        let contents = r#"
# recorded from the demo page
{"origin": "https://labs.heygen.com", "data": {"type": "streaming-embed", "action": "show"}}

{"origin": "https://labs.heygen.com", "data": {"type": "streaming-embed", "action": "hide"}}
"#;
        let messages = replay::parse_messages(contents).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].embed_action(), Some(EmbedAction::Hide));
    }

    #[test]
    fn test_parse_messages_reports_line() {
        let contents = "{\"origin\": \"x\"}\nnot json\n";
        let err = replay::parse_messages(contents).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_replay_records_one_session() {
        let messages = vec![
            InboundMessage::embed(HOST, EmbedAction::Init),
            InboundMessage::embed(HOST, EmbedAction::Show),
            InboundMessage::embed(HOST, EmbedAction::Show),
            InboundMessage::embed(HOST, EmbedAction::Hide),
            InboundMessage::embed("https://evil.example", EmbedAction::Show),
        ];

        let summary = replay::replay_messages(&memory_config(), messages)
            .await
            .unwrap();
        assert_eq!(summary.messages, 5);
        assert_eq!(summary.stats.create_calls, 1);
        assert_eq!(summary.stats.update_calls, 1);
        assert_eq!(summary.stats.protocol_violations, 1);
        assert_eq!(summary.stats.ignored_messages, 2);
        assert_eq!(summary.final_state, SessionState::Closed);
        assert_eq!(summary.records.unwrap().len(), 1);
    }

    #[test]
    fn test_render_embed_with_relay_override() {
        let source =
            embed::render_embed(memory_config(), Some("http://localhost:8787/messages".into()))
                .unwrap();
        assert!(source.contains("http://localhost:8787/messages"));
    }
}
