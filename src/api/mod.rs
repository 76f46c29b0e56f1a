//! Task board HTTP API.
//!
//! Serves task CRUD and client registration to the web frontend. Errors
//! are rendered as `{"detail": "..."}` bodies.

pub mod extract;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info};

use crate::persistence::client_repo::ClientRepo;
use crate::persistence::db::Database;
use crate::persistence::task_repo::TaskRepo;
use crate::{AppError, Result};

/// Repositories shared by every request handler.
#[derive(Clone)]
pub struct ApiState {
    /// Task store.
    pub tasks: TaskRepo,
    /// Client registry.
    pub clients: ClientRepo,
}

impl ApiState {
    /// Build handler state over one database pool.
    #[must_use]
    pub fn new(db: &Arc<Database>) -> Self {
        Self {
            tasks: TaskRepo::new(Arc::clone(db)),
            clients: ClientRepo::new(Arc::clone(db)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidInput(_) | Self::Malformed(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(err = %self, "request failed");
        }
        let detail = match self {
            Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::InvalidInput(msg)
            | Self::Malformed(msg) => msg,
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

/// Build a CORS layer allowing the configured frontend origins.
///
/// # Errors
///
/// Returns `AppError::Config` if an origin is not a valid header value.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|err| AppError::Config(format!("invalid cors origin {origin}: {err}")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true))
}

/// Assemble the API router.
#[must_use]
pub fn router(state: ApiState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route(
            "/api/tasks",
            get(routes::list_tasks).post(routes::create_task),
        )
        .route(
            "/api/tasks/{id}",
            put(routes::update_task).delete(routes::delete_task),
        )
        .route(
            "/api/clients",
            get(routes::list_clients).post(routes::register_client),
        )
        .layer(cors)
        .with_state(state)
}

/// Serve `router` on an already-bound listener until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Io` if the server fails while running.
pub async fn serve_listener(
    listener: TcpListener,
    router: Router,
    ct: CancellationToken,
) -> Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Io(format!("api server error: {err}")))
}

/// Bind `0.0.0.0:{port}` and serve the API until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the port cannot be bound or a CORS
/// origin is invalid, and `AppError::Io` if the server fails.
pub async fn serve_api(
    state: ApiState,
    port: u16,
    cors_origins: &[String],
    ct: CancellationToken,
) -> Result<()> {
    let app = router(state, cors_layer(cors_origins)?);
    let bind = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind api on {bind}: {err}")))?;

    info!(%bind, "starting task api");
    serve_listener(listener, app, ct).await?;
    info!("task api shut down");
    Ok(())
}
