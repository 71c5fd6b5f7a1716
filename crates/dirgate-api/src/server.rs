//! API server implementation

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use dirgate_core::{DirgateConfig, Error, Result};
use dirgate_directory::DirectoryConnector;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceExt;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::{info, warn};

use crate::metrics::{metrics_handler, metrics_middleware, MetricsRecorder};
use crate::routes;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DirgateConfig>,
    pub connector: Arc<dyn DirectoryConnector>,
    pub metrics: Arc<MetricsRecorder>,
}

/// Admin API server
pub struct ApiServer {
    config: DirgateConfig,
    connector: Arc<dyn DirectoryConnector>,
}

impl ApiServer {
    pub fn new(config: DirgateConfig, connector: Arc<dyn DirectoryConnector>) -> Self {
        Self { config, connector }
    }

    pub async fn run(self) -> Result<()> {
        let metrics = MetricsRecorder::install()
            .map_err(|e| Error::Config(format!("cannot install metrics recorder: {}", e)))?;
        info!("Prometheus metrics initialized");

        let addr = self.config.server.bind_address();
        let state = AppState {
            config: Arc::new(self.config),
            connector: self.connector,
            metrics: Arc::new(metrics),
        };

        info!(
            directory = state.connector.name(),
            url = %state.config.ldap.url,
            base_dn = %state.config.ldap.base_dn,
            write_mode = state.config.membership.write_mode.as_str(),
            "Directory configured"
        );
        if let Some(dir) = &state.config.server.static_dir {
            info!(dir = %dir.display(), "Serving static files");
        }

        let app = create_router(state);
        let listener = TcpListener::bind(&addr).await?;

        info!("dirgate listening on http://{}", addr);
        info!("Admin API available at http://{}/api", addr);
        info!("Prometheus metrics at http://{}/metrics", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("dirgate stopped");
        Ok(())
    }
}

/// Create the router
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .nest("/api", routes::api_routes())
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ));

    if state.config.server.static_dir.is_some() {
        router = router.fallback(serve_static);
    }

    router
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the bundled front end. Paths without an extension that match no
/// file are client-side routes and get `index.html`.
async fn serve_static(State(state): State<AppState>, request: Request<Body>) -> Response {
    let Some(dir) = state.config.server.static_dir.clone() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let is_asset = Path::new(request.uri().path()).extension().is_some();
    let method = request.method().clone();

    let response = match ServeDir::new(&dir).oneshot(request).await {
        Ok(response) => response,
        Err(e) => match e {},
    };
    if response.status() != StatusCode::NOT_FOUND || is_asset {
        return response.into_response();
    }

    let mut index = Request::new(Body::empty());
    *index.method_mut() = method;
    match ServeFile::new(dir.join("index.html")).oneshot(index).await {
        Ok(response) => response.into_response(),
        Err(e) => match e {},
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
