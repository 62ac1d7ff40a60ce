//! Setlist HTTP service entry point.
//!
//! # Purpose
//! Wires configuration, storage, the queue engine, and the HTTP router, then
//! starts the main API server and the metrics listener.
//!
//! # Notes
//! The `build_state` helper keeps wiring testable and minimizes main setup
//! logic.
use anyhow::Context;
use setlist::app::{build_router, AppState};
use setlist::config::{SetlistConfig, StorageBackend};
use setlist::engine::Engine;
use setlist::fanout::Fanout;
use setlist::observability;
use setlist::playback::LogOnlyPlayback;
use setlist::store::memory::InMemoryStore;
use setlist::store::postgres::PostgresStore;
use setlist::store::QueueStore;
use std::future::Future;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SetlistConfig::from_env_or_yaml().context("setlist config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: SetlistConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability();
    let state = build_state(config.clone()).await?;
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let app = build_router(state);

    let addr = config.bind_addr;
    tracing::info!(%addr, "setlist listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tokio::pin!(shutdown);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
        _ = &mut shutdown => {}
    }

    metrics_task.abort();
    let _ = metrics_task.await;
    Ok(())
}

async fn build_state(config: SetlistConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn QueueStore> = match config.storage {
        StorageBackend::Memory => Arc::new(InMemoryStore::new()),
        StorageBackend::Postgres => {
            let pg = config
                .postgres
                .as_ref()
                .context("postgres configuration missing")?;
            Arc::new(PostgresStore::connect(pg).await?)
        }
    };
    let fanout = Arc::new(Fanout::new(config.fanout_capacity));
    let engine = Arc::new(Engine::new(
        Arc::clone(&store),
        Arc::clone(&fanout),
        Arc::new(LogOnlyPlayback),
    ));

    Ok(AppState {
        api_version: "v1".to_string(),
        store,
        engine,
        fanout,
        support_token: config.support_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use setlist::config::DEFAULT_FANOUT_CAPACITY;

    fn memory_config() -> SetlistConfig {
        SetlistConfig {
            bind_addr: "127.0.0.1:0".parse().expect("bind"),
            metrics_bind: "127.0.0.1:0".parse().expect("metrics"),
            storage: StorageBackend::Memory,
            postgres: None,
            fanout_capacity: DEFAULT_FANOUT_CAPACITY,
            support_token: Some("support-secret".to_string()),
        }
    }

    #[tokio::test]
    async fn build_state_memory_backend() {
        let state = build_state(memory_config()).await.expect("state");
        assert_eq!(state.store.backend_name(), "memory");
        assert!(!state.store.is_durable());
        assert_eq!(state.api_version, "v1");
    }

    #[tokio::test]
    async fn server_starts_and_stops_on_shutdown() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(run_with_shutdown(memory_config(), async {
            let _ = rx.await;
        }));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        tx.send(()).expect("signal shutdown");
        server
            .await
            .expect("join")
            .expect("server exits cleanly");
    }
}
