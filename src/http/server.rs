//! Axum server for the contact relay and voice widget routes
//!
//! Every route answers JSON. Request bodies that cannot be parsed are caught
//! here and turned into a generic failure instead of propagating.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::contact::{ContactService, ContactSubmission};
use crate::voice::{Command, StartOptions, WidgetRegistry, CLIENT_HEADER};

use super::protocol::{ContactResponse, ErrorResponse, HealthResponse, ValidationResponse};

const PARSE_FAILURE: &str = "Failed to process contact form submission";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub contact: Arc<ContactService>,
    pub voice: Arc<WidgetRegistry>,
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(CLIENT_HEADER)]);

    Router::new()
        .route("/healthz", get(health))
        .route("/api/contact", post(submit_contact))
        .route("/api/contact/validate", post(validate_contact))
        .route("/api/voice", get(voice_status))
        .route("/api/voice/toggle", post(voice_toggle))
        .route("/api/voice/close", post(voice_close))
        .route("/api/voice/start", post(voice_start))
        .route("/api/voice/stop", post(voice_stop))
        .route("/api/voice/reset", post(voice_reset))
        .route("/api/voice/dismiss-error", post(voice_dismiss_error))
        .route("/api/voice/reconnect", post(voice_reconnect))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(message))).into_response()
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        email_configured: state.contact.is_configured(),
        voice_clients: state.voice.client_count(),
    })
}

/// `POST /api/contact`
async fn submit_contact(
    State(state): State<AppState>,
    payload: Result<Json<ContactSubmission>, JsonRejection>,
) -> Response {
    let Json(submission) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            error!(error = %rejection.body_text(), "error processing contact form");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, PARSE_FAILURE);
        }
    };

    match state.contact.submit(&submission).await {
        Ok(result) => (StatusCode::OK, Json(ContactResponse::from(result))).into_response(),
        Err(err) => {
            let status = StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(ErrorResponse::from(&err))).into_response()
        }
    }
}

/// `POST /api/contact/validate`; the form's inline checks, nothing is sent
async fn validate_contact(payload: Result<Json<ContactSubmission>, JsonRejection>) -> Response {
    let Json(submission) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "unreadable form for validation");
            return error_response(StatusCode::BAD_REQUEST, PARSE_FAILURE);
        }
    };

    match submission.validate_form() {
        Ok(()) => Json(ValidationResponse { valid: true }).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

/// Route a command to the caller's own widget and echo its client id
async fn drive_widget(state: &AppState, headers: &HeaderMap, command: Command) -> Response {
    let requested = headers.get(CLIENT_HEADER).and_then(|v| v.to_str().ok());
    let (client, widget) = state.voice.handle_for(requested);

    let mut response = match widget.send(command).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(e) => {
            warn!(?e, ?command, %client, "voice widget unavailable");
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    };

    if let Ok(value) = HeaderValue::from_str(&client) {
        response.headers_mut().insert(CLIENT_HEADER, value);
    }
    response
}

async fn voice_status(State(state): State<AppState>, headers: HeaderMap) -> Response {
    drive_widget(&state, &headers, Command::Snapshot).await
}

async fn voice_toggle(State(state): State<AppState>, headers: HeaderMap) -> Response {
    drive_widget(&state, &headers, Command::Toggle).await
}

async fn voice_close(State(state): State<AppState>, headers: HeaderMap) -> Response {
    drive_widget(&state, &headers, Command::ClickOutside).await
}

/// `POST /api/voice/start`; an absent or unreadable body means desktop with microphone granted
async fn voice_start(
    State(state): State<AppState>,
    headers: HeaderMap,
    options: Option<Json<StartOptions>>,
) -> Response {
    let options = options.map(|Json(o)| o).unwrap_or_default();
    drive_widget(&state, &headers, Command::Start(options)).await
}

async fn voice_stop(State(state): State<AppState>, headers: HeaderMap) -> Response {
    drive_widget(&state, &headers, Command::Stop).await
}

async fn voice_reset(State(state): State<AppState>, headers: HeaderMap) -> Response {
    drive_widget(&state, &headers, Command::Reset).await
}

async fn voice_dismiss_error(State(state): State<AppState>, headers: HeaderMap) -> Response {
    drive_widget(&state, &headers, Command::DismissError).await
}

async fn voice_reconnect(State(state): State<AppState>, headers: HeaderMap) -> Response {
    drive_widget(&state, &headers, Command::Reconnect).await
}

/// HTTP server bound to a local address
pub struct Server {
    listener: TcpListener,
    router: Router,
}

impl Server {
    /// Bind the listener; the server does not accept until `run`
    pub async fn bind(addr: SocketAddr, state: AppState) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        info!(%addr, "HTTP server listening");

        Ok(Self {
            listener,
            router: build_router(state),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server error")?;

        info!("HTTP server shutdown complete");
        Ok(())
    }
}
