use crate::config::Config;
use crate::error::VerseError;
use crate::handlers::{
    count_verses, health_check, list_verses, method_not_allowed, missing_verse_id, next_verse,
    not_found, previous_verse, random_verse, AppState, SharedState,
};
use crate::middleware::{logging_middleware, rate_limit_middleware, security_headers};
use crate::rate_limiter::{now_ms, LocalWindows};
use axum::handler::Handler;
use axum::routing::{get, MethodRouter};
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// GET only. HEAD is refused explicitly since `get` would otherwise answer it.
fn get_only<H, T>(handler: H) -> MethodRouter<SharedState>
where
    H: Handler<T, SharedState>,
    T: 'static,
{
    get(handler)
        .head(method_not_allowed)
        .fallback(method_not_allowed)
}

/// Verse endpoints, each answering GET and refusing every other method.
fn verse_routes() -> Router<SharedState> {
    Router::new()
        .route("/verses", get_only(list_verses))
        .route("/verses/count", get_only(count_verses))
        .route("/verses/random", get_only(random_verse))
        .route("/verses/next/", get_only(missing_verse_id))
        .route("/verses/next/:id", get_only(next_verse))
        .route("/verses/previous/", get_only(missing_verse_id))
        .route("/verses/previous/:id", get_only(previous_verse))
}

/// Build the application router around `state`.
///
/// Verse routes are mounted at the root and under `/api`. The rate limit runs
/// before routing reaches any verse handler or the 405 fallback, OPTIONS
/// included; `/health` and unmatched paths are not limited. CORS headers come
/// from `security_headers`.
pub fn create_app(state: SharedState) -> Router {
    let verses = verse_routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        rate_limit_middleware,
    ));

    Router::new()
        .merge(verses.clone())
        .nest("/api", verses)
        .route("/health", get(health_check))
        .fallback(not_found)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(logging_middleware))
                .layer(middleware::from_fn(security_headers)),
        )
}

pub struct Server {
    app: Router,
    state: SharedState,
    bind_addr: SocketAddr,
    cleanup_interval: Duration,
    preload: bool,
}

impl Server {
    pub fn new(config: Config) -> Result<Self, VerseError> {
        let state: SharedState = Arc::new(AppState::from_config(&config)?);
        let app = create_app(state.clone());

        Ok(Self {
            app,
            state,
            bind_addr: config.bind_addr,
            cleanup_interval: Duration::from_secs(config.cleanup_interval_secs),
            preload: config.preload,
        })
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        if self.preload {
            let count = self.state.queries.count();
            tracing::info!("Preloaded {} verses", count);
        }

        if let Some(windows) = self.state.local_windows.clone() {
            if !self.cleanup_interval.is_zero() {
                spawn_window_sweeper(windows, self.cleanup_interval);
            }
        }

        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        tracing::info!("Verse server starting on {}", self.bind_addr);
        tracing::info!(
            "Rate limit: {} requests per {:?} ({})",
            self.state.governor.limit(),
            self.state.governor.window(),
            self.state.governor.backend()
        );
        tracing::info!("Health check available at /health");

        // Run server with graceful shutdown
        axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        Ok(())
    }
}

/// Periodically drop expired in-memory rate windows.
pub fn spawn_window_sweeper(windows: LocalWindows, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match windows.sweep(now_ms()) {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(
                    target: "shloka::server",
                    removed,
                    remaining = windows.len(),
                    "Swept expired rate windows"
                ),
                Err(e) => tracing::warn!(target: "shloka::server", error = %e, "Rate window sweep failed"),
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
