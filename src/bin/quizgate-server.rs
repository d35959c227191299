use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tower_http::services::ServeDir;
use tracing_subscriber::EnvFilter;

use quizgate::api::axum::{AppState, QuestionBank, gate_routes};
use quizgate::events::listeners::{LoggingListener, TracingListener};
use quizgate::{
    FileKeyValueStore, GateConfig, InMemoryKeyValueStore, KeyValueStore, register_event_listeners,
};

const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

struct ServerConfig {
    bind_addr: SocketAddr,
    quiz_dir: PathBuf,
    questions_path: PathBuf,
    store_dir: Option<PathBuf>,
}

impl ServerConfig {
    fn from_env() -> anyhow::Result<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8080".to_owned())
            .parse()
            .context("BIND_ADDR must be a socket address")?;

        Ok(Self {
            bind_addr,
            quiz_dir: var("QUIZ_DIR").unwrap_or_else(|| "quiz".to_owned()).into(),
            questions_path: var("QUESTIONS_PATH")
                .unwrap_or_else(|| "data/questions.json".to_owned())
                .into(),
            store_dir: var("ONE_TIME_STORE_DIR").map(PathBuf::from),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = GateConfig::from_env().context("invalid gate configuration")?;
    let server = ServerConfig::from_env()?;

    register_event_listeners(|registry| {
        registry
            .listen(LoggingListener::new())
            .listen(TracingListener);
    });

    let store: Arc<dyn KeyValueStore> = match &server.store_dir {
        Some(dir) => {
            let store = Arc::new(FileKeyValueStore::new(dir)?);
            let pruned = Arc::clone(&store);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(PRUNE_INTERVAL);
                loop {
                    interval.tick().await;
                    if let Err(e) = pruned.prune_expired() {
                        tracing::warn!(error = %e, "one-time store prune failed");
                    }
                }
            });
            store as Arc<dyn KeyValueStore>
        }
        None => {
            let store = InMemoryKeyValueStore::new();
            let pruned = store.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(PRUNE_INTERVAL);
                loop {
                    interval.tick().await;
                    pruned.prune_expired();
                }
            });
            Arc::new(store)
        }
    };

    let protected = config.protected_path.trim_end_matches('/').to_owned();
    let mut state = AppState::new(config, store);
    match QuestionBank::load(&server.questions_path) {
        Ok(bank) => state = state.with_questions(bank),
        Err(e) => tracing::warn!(error = %e, "question bank not loaded"),
    }

    let origin = if protected.is_empty() {
        Router::new().fallback_service(ServeDir::new(&server.quiz_dir))
    } else {
        Router::new().nest_service(&protected, ServeDir::new(&server.quiz_dir))
    };
    let app = gate_routes(state, origin);

    let listener = tokio::net::TcpListener::bind(server.bind_addr)
        .await
        .with_context(|| format!("cannot bind {}", server.bind_addr))?;
    tracing::info!(addr = %server.bind_addr, quiz_dir = %server.quiz_dir.display(), "quizgate listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
