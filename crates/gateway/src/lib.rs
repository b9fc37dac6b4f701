//! HTTP ingress for Kudachat.
//!
//! Discord events reach the bot through `POST /v1/events`: a relay (or a
//! test harness) posts a JSON [`ChannelEvent`] which is injected into the
//! running [`DiscordChannel`] and picked up by the dispatcher. When a shared
//! secret is configured every request must carry an
//! `X-Kudachat-Signature: sha256=<hex>` header computed over the raw body.
//!
//! Built on Axum.

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, info, warn};

use kudachat_channels::DiscordChannel;
use kudachat_config::GatewayConfig;
use kudachat_core::channel::ChannelEvent;
use kudachat_core::error::ChannelError;

/// Header carrying the HMAC-SHA256 of the request body.
pub const SIGNATURE_HEADER: &str = "x-kudachat-signature";

const MAX_BODY_BYTES: usize = 1024 * 1024;

type HmacSha256 = Hmac<Sha256>;

/// Shared state for the ingress handlers.
pub struct GatewayState {
    pub channel: Arc<DiscordChannel>,
    pub shared_secret: Option<String>,
}

impl GatewayState {
    pub fn new(channel: Arc<DiscordChannel>, shared_secret: Option<String>) -> Self {
        Self {
            channel,
            shared_secret,
        }
    }

    /// Check `signature` against the body. Passes when no secret is set.
    pub fn validate_signature(&self, payload: &[u8], signature: Option<&str>) -> bool {
        let secret = match self.shared_secret.as_deref() {
            None | Some("") => return true,
            Some(secret) => secret,
        };
        let Some(signature) = signature else {
            return false;
        };
        let sig_hex = signature.strip_prefix("sha256=").unwrap_or(signature);
        let Ok(provided) = hex::decode(sig_hex) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(payload);
        mac.verify_slice(&provided).is_ok()
    }
}

/// Compute the `sha256=<hex>` signature header value for a body.
pub fn sign(secret: &str, payload: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all ingress routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/events", post(events_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the ingress until the listener fails.
pub async fn start(
    config: &GatewayConfig,
    channel: Arc<DiscordChannel>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("{}:{}", config.host, config.port);
    if config.shared_secret.as_deref().is_none_or(str::is_empty) {
        warn!("No gateway shared secret configured; inbound events are not authenticated");
    }

    let state = Arc::new(GatewayState::new(channel, config.shared_secret.clone()));
    let app = build_router(state);

    info!(address = %addr, "Kudachat gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    channel_started: bool,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        channel_started: state.channel.is_started().await,
    })
}

#[derive(Debug, Serialize)]
struct EventAccepted {
    accepted: bool,
    event_id: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

async fn events_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<EventAccepted>), (StatusCode, Json<ErrorBody>)> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    if !state.validate_signature(&body, signature) {
        warn!("Rejected event with invalid signature");
        return Err(error(StatusCode::UNAUTHORIZED, "Invalid signature"));
    }

    let event: ChannelEvent = serde_json::from_slice(&body)
        .map_err(|e| error(StatusCode::BAD_REQUEST, format!("Invalid event: {e}")))?;

    let event_id = uuid::Uuid::new_v4().to_string();
    debug!(event_id = %event_id, "Injecting event");

    match state.channel.inject_event(event).await {
        Ok(()) => Ok((
            StatusCode::ACCEPTED,
            Json(EventAccepted {
                accepted: true,
                event_id,
            }),
        )),
        Err(ChannelError::ConnectionLost(reason)) => {
            Err(error(StatusCode::SERVICE_UNAVAILABLE, reason))
        }
        Err(e) => Err(error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}
