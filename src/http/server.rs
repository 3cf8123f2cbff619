//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared application state (racer, runner, store, remote)
//! - Create the Axum router with scenario and admin routes
//! - Wire up middleware (request ID, body limit, timeout, tracing)
//! - Apply config updates from the watcher
//! - Shut down gracefully: stop accepting, drain background jobs, close remote

use arc_swap::ArcSwap;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin;
use crate::background::{BackgroundRunner, ScopeFactory};
use crate::config::ScenarioConfig;
use crate::http::handlers;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::Shutdown;
use crate::observability::FailureLog;
use crate::remote::LazyRemoteConnection;
use crate::resilience::DeadlineRacer;
use crate::storage::PokemonStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<ScenarioConfig>>,
    pub racer: DeadlineRacer,
    pub runner: BackgroundRunner,
    pub failures: Arc<FailureLog>,
    pub remote: Arc<LazyRemoteConnection>,
    pub store: Arc<PokemonStore>,
    pub shutdown: Shutdown,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: ScenarioConfig, shutdown: Shutdown) -> Self {
        let store = Arc::new(PokemonStore::from_config(&config.storage));
        let failures = Arc::new(FailureLog::new(config.background.failure_log_capacity));
        let runner = BackgroundRunner::from_config(
            &config.background,
            ScopeFactory::new(Arc::clone(&store)),
            failures.clone(),
        );
        let remote = Arc::new(LazyRemoteConnection::new(config.remote.clone()));

        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            racer: DeadlineRacer::new(),
            runner,
            failures,
            remote,
            store,
            shutdown,
            started_at: Instant::now(),
        }
    }

    /// Swap in a reloaded config.
    ///
    /// Live settings take effect for the next request or job. Changes to
    /// settings read only at startup are logged and wait for a restart.
    pub fn apply_config(&self, new_config: ScenarioConfig) {
        let current = self.config.load_full();
        if *current == new_config {
            tracing::debug!("Reloaded configuration is unchanged");
            return;
        }

        for field in current.restart_required(&new_config) {
            tracing::warn!(field, "Configuration change requires a restart to take effect");
        }

        self.runner
            .set_start_delay(Duration::from_millis(new_config.background.start_delay_ms));
        self.config.store(Arc::new(new_config));
        tracing::info!("Configuration reloaded");
    }
}

/// Settings fixed when the router is built; hot reload does not change them.
struct RouterLimits {
    request_timeout: Duration,
    max_body_bytes: usize,
    admin_enabled: bool,
}

/// HTTP server for the scenario endpoints.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ScenarioConfig, shutdown: Shutdown) -> Self {
        let limits = RouterLimits {
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
            max_body_bytes: config.listener.max_body_bytes,
            admin_enabled: config.admin.enabled,
        };
        let state = AppState::new(config, shutdown);
        let router = Self::build_router(state.clone(), limits);
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, limits: RouterLimits) -> Router {
        let mut router = Router::new()
            .route("/pokemon", post(handlers::create_pokemon))
            .route("/fire-and-forget", get(handlers::fire_and_forget))
            .route("/publish", get(handlers::publish))
            .route("/publish/cancellable", get(handlers::publish_cancellable))
            .route("/pokemon/count", get(handlers::pokemon_count))
            .with_state(state.clone());

        if limits.admin_enabled {
            router = router.merge(admin::setup_admin_router(state));
        }

        router
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(limits.max_body_bytes))
            .layer(TimeoutLayer::new(limits.request_timeout))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Shared state, for inspection by embedders and tests.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ScenarioConfig>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let updates_state = self.state.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(new_config) => updates_state.apply_config(new_config),
                        None => break,
                    },
                    _ = updates_state.shutdown.wait() => break,
                }
            }
        });

        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("HTTP server stopped accepting requests");

        let drain_timeout =
            Duration::from_secs(self.state.config.load().background.drain_timeout_secs);
        self.state.runner.drain(drain_timeout).await;
        self.state.remote.close();

        let races = self.state.racer.snapshot();
        tracing::info!(
            races = races.total(),
            pending_timers = races.pending_timers,
            background_failures = self.state.failures.total(),
            "HTTP server stopped"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn server() -> HttpServer {
        let mut config = ScenarioConfig::default();
        config.admin.api_key = "k".to_string();
        HttpServer::new(config, Shutdown::new())
    }

    #[tokio::test]
    async fn routes_count_and_assigns_request_id() {
        let server = server();
        let res = server
            .router
            .clone()
            .oneshot(Request::get("/pokemon/count").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key("x-request-id"));
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"count":0}"#);
    }

    #[tokio::test]
    async fn admin_routes_are_guarded() {
        let server = server();
        let res = server
            .router
            .clone()
            .oneshot(Request::get("/admin/races").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = server
            .router
            .clone()
            .oneshot(
                Request::get("/admin/races")
                    .header("authorization", "Bearer k")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn applied_config_reaches_runner_and_handlers() {
        let server = server();
        let state = server.state();
        assert_eq!(state.runner.start_delay(), Duration::from_millis(1000));

        let mut next = (**state.config.load()).clone();
        next.timeouts.publish_ms = 40;
        next.background.start_delay_ms = 0;
        next.timeouts.request_secs = 1;
        state.apply_config(next);

        assert_eq!(state.runner.start_delay(), Duration::ZERO);
        let live = state.config.load();
        assert_eq!(live.timeouts.publish_or(None), Duration::from_millis(40));
        assert_eq!(live.timeouts.request_secs, 1);
    }

    #[tokio::test]
    async fn admin_can_be_disabled() {
        let mut config = ScenarioConfig::default();
        config.admin.enabled = false;
        let server = HttpServer::new(config, Shutdown::new());
        let res = server
            .router
            .clone()
            .oneshot(Request::get("/admin/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
