//! Application state wiring all services together.
//!
//! AppState pins the generic engine to the SQLite repository and holds the
//! in-process event bus that live viewers subscribe to, plus the presence
//! tracker they announce themselves through. Outbound HTTP
//! (channels, text provider, hosted realtime) shares one `reqwest::Client`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use hourglass_core::HourglassEngine;
use hourglass_core::analytics::TracingAnalytics;
use hourglass_core::event::{EventBus, FanoutPublisher, PresenceTracker, RealtimePublisher};
use hourglass_infra::config::{load_config, secret_from_env};
use hourglass_infra::llm::create_fallback;
use hourglass_infra::notify::{ChannelSecrets, build_dispatcher};
use hourglass_infra::realtime::RestRealtimePublisher;
use hourglass_infra::sqlite::{DatabasePool, SqliteSessionRepository};
use hourglass_types::config::HourglassConfig;

pub type Engine = HourglassEngine<SqliteSessionRepository>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub event_bus: EventBus,
    pub presence: Arc<PresenceTracker>,
    pub db_pool: DatabasePool,
    pub config: Arc<HourglassConfig>,
    pub data_dir: PathBuf,
    realtime: Option<Arc<RestRealtimePublisher>>,
}

impl AppState {
    /// Load `config.toml` from `data_dir`, open the database and wire the engine.
    pub async fn init(data_dir: &Path) -> anyhow::Result<Self> {
        let config = load_config(data_dir).await;
        Self::build(data_dir, config).await
    }

    pub async fn build(data_dir: &Path, config: HourglassConfig) -> anyhow::Result<Self> {
        let db_pool = DatabasePool::open(data_dir).await?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(
                config.fallback.timeout_secs.max(config.notify.channel_timeout_secs),
            ))
            .build()?;

        let event_bus = EventBus::new(config.realtime.bus_capacity);
        let mut publisher = FanoutPublisher::new().with(Arc::new(event_bus.clone()));

        let realtime = match config.realtime.rest_endpoint.as_deref() {
            Some(endpoint) => match secret_from_env(&config.realtime.api_key_env) {
                Some(key) => {
                    let rest = Arc::new(RestRealtimePublisher::new(client.clone(), endpoint, key));
                    rest.open();
                    publisher = publisher.with(rest.clone());
                    Some(rest)
                }
                None => {
                    tracing::warn!(
                        env = %config.realtime.api_key_env,
                        "realtime endpoint configured without an API key, hosted fan-out disabled"
                    );
                    None
                }
            },
            None => None,
        };

        let dispatcher = build_dispatcher(
            &config.notify,
            client.clone(),
            ChannelSecrets::from_env(&config.notify),
        );
        let fallback = create_fallback(
            &config.fallback,
            client,
            secret_from_env(&config.fallback.api_key_env),
        );

        let publisher: Arc<dyn RealtimePublisher> = Arc::new(publisher);
        let presence = Arc::new(PresenceTracker::new(Arc::clone(&publisher)));
        let engine = HourglassEngine::new(
            Arc::new(SqliteSessionRepository::new(db_pool.clone())),
            publisher,
            dispatcher,
            fallback,
            Arc::new(TracingAnalytics),
            &config.scheduler,
        );

        Ok(Self {
            engine,
            event_bus,
            presence,
            db_pool,
            config: Arc::new(config),
            data_dir: data_dir.to_path_buf(),
            realtime,
        })
    }

    /// Close the hosted realtime client and the database pools.
    pub async fn shutdown(&self) {
        if let Some(realtime) = &self.realtime {
            realtime.close();
        }
        self.db_pool.close().await;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// State over a fresh SQLite database in a leaked temp dir.
    pub async fn test_state() -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        std::mem::forget(dir);
        AppState::build(&path, HourglassConfig::default()).await.unwrap()
    }
}
