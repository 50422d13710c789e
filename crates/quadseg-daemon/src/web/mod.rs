//! JSON control API and event intake.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use quadseg_hw::{BlinkRate, Bus};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::presenter::{EventOutcome, Presenter, StageStatus};
use crate::tally::Event;

/// Bus type the daemon runs with.
pub type PanelBus = Box<dyn Bus>;

type AppState = Presenter<PanelBus>;

/// Errors returned by API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("display error: {0}")]
    Display(#[from] quadseg_hw::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!("API request failed: {}", self);
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Static text request.
#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
    #[serde(default)]
    pub dots: Vec<bool>,
}

/// Scroll request.
#[derive(Debug, Deserialize)]
pub struct ScrollRequest {
    pub text: String,
    /// Step interval; the configured default when absent.
    #[serde(default)]
    pub interval_ms: Option<u64>,
    #[serde(default)]
    pub dots: Vec<bool>,
    /// Stop after one pass instead of looping.
    #[serde(default)]
    pub stop: bool,
}

/// Brightness request.
#[derive(Debug, Deserialize)]
pub struct BrightnessRequest {
    pub level: i32,
}

/// Blink rate request (0=off, 1=2Hz, 2=1Hz, 3=0.5Hz).
#[derive(Debug, Deserialize)]
pub struct BlinkRequest {
    pub rate: i64,
}

#[derive(Debug, Serialize)]
struct BrightnessResponse {
    level: u8,
}

#[derive(Debug, Serialize)]
struct BlinkResponse {
    rate: String,
}

/// Creates the API router.
pub fn create_router(presenter: AppState) -> Router {
    Router::new()
        // Event feed
        .route("/api/events", post(event))
        // Display control
        .route("/api/status", get(status))
        .route("/api/text", post(text))
        .route("/api/scroll", post(scroll))
        .route("/api/clear", post(clear))
        .route("/api/brightness", post(brightness))
        .route("/api/blink", post(blink))
        .with_state(presenter)
}

/// POST /api/events - Count an event
async fn event(
    State(presenter): State<AppState>,
    Json(event): Json<Event>,
) -> Result<Json<EventOutcome>, ApiError> {
    Ok(Json(presenter.record_event(&event)?))
}

/// GET /api/status - Stage snapshot
async fn status(State(presenter): State<AppState>) -> Json<StageStatus> {
    Json(presenter.status())
}

/// POST /api/text - Show static text
async fn text(
    State(presenter): State<AppState>,
    Json(request): Json<TextRequest>,
) -> Result<StatusCode, ApiError> {
    presenter.show_text(&request.text, &request.dots)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/scroll - Start scrolling text
async fn scroll(
    State(presenter): State<AppState>,
    Json(request): Json<ScrollRequest>,
) -> StatusCode {
    let interval = request.interval_ms.map(Duration::from_millis);
    presenter.scroll(&request.text, interval, &request.dots, request.stop);
    StatusCode::ACCEPTED
}

/// POST /api/clear - Blank the display
async fn clear(State(presenter): State<AppState>) -> Result<StatusCode, ApiError> {
    presenter.clear()?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/brightness - Set brightness (clamped to 0-15)
async fn brightness(
    State(presenter): State<AppState>,
    Json(request): Json<BrightnessRequest>,
) -> Result<Json<BrightnessResponse>, ApiError> {
    let level = presenter.set_brightness(request.level)?;
    info!("Brightness set to {}", level);
    Ok(Json(BrightnessResponse { level }))
}

/// POST /api/blink - Set blink rate (out-of-range rates turn blinking off)
async fn blink(
    State(presenter): State<AppState>,
    Json(request): Json<BlinkRequest>,
) -> Result<Json<BlinkResponse>, ApiError> {
    let rate = BlinkRate::from_raw(request.rate);
    presenter.set_blink_rate(rate)?;
    info!("Blink rate set to {}", rate);
    Ok(Json(BlinkResponse {
        rate: rate.to_string(),
    }))
}
