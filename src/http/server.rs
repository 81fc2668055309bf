//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router sending every method and path to the race handler
//! - Build the shared outbound client, buffer pool and targets
//! - Wire up middleware (tracing)
//! - Bind server to listener and serve until shutdown
//! - Record request metrics around the race engine

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::buffer::BufferPool;
use crate::config::ProxyConfig;
use crate::http::request::request_id;
use crate::http::response::emit;
use crate::net;
use crate::observability::metrics;
use crate::race::{Race, RaceOutcome, Side, Target, TargetError};

/// Errors building the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Target(#[from] TargetError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub race: Race,
    pub pool: BufferPool,
}

/// HTTP server for the redundant-request proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    pool: BufferPool,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// The configuration is expected to have passed validation.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let targets = [
            Arc::new(Target::parse(Side::A, &config.targets.a)?),
            Arc::new(Target::parse(Side::B, &config.targets.b)?),
        ];

        // Every attempt gets its own connection so cancelling it closes the socket.
        let client = net::build_client(
            config.timeouts.connect_secs.map(Duration::from_secs),
            net::load_client_config(),
        );

        let pool = BufferPool::new(config.buffers.size, config.buffers.max_idle);
        let race = Race::new(
            targets,
            client,
            pool.clone(),
            config.request_body.channel_capacity,
        );

        let state = AppState {
            race,
            pool: pool.clone(),
        };
        let router = Self::build_router(state);

        Ok(Self {
            router,
            config,
            pool,
        })
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            target_a = %self.config.targets.a,
            target_b = %self.config.targets.b,
            buffer_size = self.pool.buffer_size(),
            "HTTP server starting"
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// The read-ahead buffer pool shared by all requests.
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }
}

/// Race the request against both targets and answer with the winner.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let span = tracing::info_span!(
        "race",
        request_id = %request_id(request.headers()),
        client = %client,
        method = %method,
        path = %request.uri().path(),
    );

    let outcome = state.race.run(request).instrument(span.clone()).await;
    let _entered = span.enter();

    let response = match outcome {
        RaceOutcome::Won(winner) => {
            metrics::record_request(&method, winner.success.status.as_u16(), winner.side.as_str(), start_time);
            emit(winner)
        }
        RaceOutcome::BothFailed(failures) => {
            for failure in &failures {
                metrics::record_target_failure(failure.side.as_str(), failure.reason.kind());
            }
            tracing::warn!("Both failed, answering 503");
            metrics::record_request(&method, 503, "none", start_time);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    };
    metrics::record_pool(state.pool.stats());
    response
}
