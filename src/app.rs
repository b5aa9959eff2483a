use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;
use crate::downloader::{self, CSV_FILE_NAME, XLSX_FILE_NAME};
use crate::error::Error;
use crate::loader::{CompoundInput, Limits, UploadedFile, normalize};
use crate::predictor::{DEFAULT_PERCENTAGE, HttpPredictionClient, PredictionClient, PredictionRequest};
use crate::results::{PredictionResponse, ShapedResults};
use crate::views::ViewCounter;

/// Room for multipart framing and the non-file fields on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub struct AppState {
    client: Arc<dyn PredictionClient>,
    views: ViewCounter,
    limits: Limits,
}

impl AppState {
    pub fn new(client: Arc<dyn PredictionClient>, views: ViewCounter, limits: Limits) -> Self {
        Self {
            client,
            views,
            limits,
        }
    }
}

#[derive(Deserialize)]
struct PredictPayload {
    #[serde(default)]
    text: String,
    #[serde(default = "default_percentage")]
    percentage: u8,
}

fn default_percentage() -> u8 {
    DEFAULT_PERCENTAGE
}

#[derive(Deserialize, Default, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum ExportFormat {
    #[default]
    Csv,
    Xlsx,
}

#[derive(Deserialize)]
struct ExportQuery {
    #[serde(default)]
    format: ExportFormat,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: String,
}

/// Build the API router around shared state
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.limits.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route("/api/views", get(get_views))
        .route("/api/predict", post(predict_text))
        .route("/api/predict/upload", post(predict_upload))
        .route("/api/export", post(export_results))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client = HttpPredictionClient::new(&config.predictor.api_url, config.predictor.timeout())?;
    info!("Forwarding predictions to {}", client.url());

    let app_state = Arc::new(AppState::new(
        Arc::new(client),
        ViewCounter::new(&config.views_file),
        config.predictor.limits(),
    ));

    let listener = TcpListener::bind(&config.bind).await?;
    info!("Listening on http://{}", config.bind);
    axum::serve(listener, router(app_state)).await?;

    Ok(())
}

async fn get_views(State(state): State<Arc<AppState>>) -> Response {
    // File I/O under the counter's lock stays off the async workers
    let counter = Arc::clone(&state);
    let views = tokio::task::spawn_blocking(move || counter.views.increment())
        .await
        .unwrap_or_else(|e| Err(io::Error::new(io::ErrorKind::Other, e)));

    match views {
        Ok(views) => Json(serde_json::json!({ "views": views })).into_response(),
        Err(e) => {
            error!("Error processing view count: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "Failed to update or retrieve view count",
                    "details": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

async fn predict_text(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PredictPayload>,
) -> Response {
    let input = CompoundInput::Text(&payload.text);
    match predict(&state, input, payload.percentage).await {
        Ok(shaped) => Json(shaped).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn predict_upload(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut file: Option<UploadedFile> = None;
    let mut text = String::new();
    let mut percentage = DEFAULT_PERCENTAGE;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(&multipart_error(e, &state.limits)),
        };

        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                let name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = match field.bytes().await {
                    Ok(data) => data.to_vec(),
                    Err(e) => return error_response(&multipart_error(e, &state.limits)),
                };
                // Browsers send an empty part when no file was chosen
                if name.is_empty() && data.is_empty() {
                    continue;
                }
                file = Some(UploadedFile {
                    name,
                    content_type,
                    data,
                });
            }
            "text" => {
                text = match field.text().await {
                    Ok(text) => text,
                    Err(e) => return error_response(&multipart_error(e, &state.limits)),
                };
            }
            "percentage" => {
                let value = match field.text().await {
                    Ok(value) => value,
                    Err(e) => return error_response(&multipart_error(e, &state.limits)),
                };
                percentage = match value.trim().parse() {
                    Ok(percentage) => percentage,
                    Err(_) => return error_response(&Error::InvalidPercentage(value)),
                };
            }
            _ => {}
        }
    }

    let input = match &file {
        Some(file) => CompoundInput::File(file),
        None => CompoundInput::Text(&text),
    };
    match predict(&state, input, percentage).await {
        Ok(shaped) => Json(shaped).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn export_results(
    Query(query): Query<ExportQuery>,
    Json(response): Json<PredictionResponse>,
) -> Response {
    let shaped = ShapedResults::from_response(&response);
    if shaped.rows.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse {
                status: "error".to_string(),
                message: "No results to export.".to_string(),
            }),
        )
            .into_response();
    }

    let exported = match query.format {
        ExportFormat::Csv => downloader::to_csv(&shaped)
            .map(|csv| (csv.into_bytes(), "text/csv; charset=utf-8", CSV_FILE_NAME)),
        ExportFormat::Xlsx => {
            downloader::to_xlsx(&shaped).map(|xlsx| (xlsx, XLSX_CONTENT_TYPE, XLSX_FILE_NAME))
        }
    };

    match exported {
        Ok((body, content_type, file_name)) => (
            [
                (header::CONTENT_TYPE, content_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", file_name),
                ),
            ],
            body,
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn predict(
    state: &AppState,
    input: CompoundInput<'_>,
    percentage: u8,
) -> crate::error::Result<ShapedResults> {
    let compounds = normalize(input, &state.limits)?;
    let request = PredictionRequest::new(compounds, percentage)?;
    let response = state.client.predict(&request).await?;
    Ok(ShapedResults::from_response(&response))
}

/// Requests over the body limit surface as 413 from the multipart reader
fn multipart_error(error: MultipartError, limits: &Limits) -> Error {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::FileTooLarge {
            limit: limits.max_upload_bytes,
        }
    } else {
        Error::FileParseFailed(error.to_string())
    }
}

fn error_response(error: &Error) -> Response {
    let status = match error {
        e if e.is_input_error() => StatusCode::BAD_REQUEST,
        Error::Network(_) => StatusCode::BAD_GATEWAY,
        Error::Busy => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Request failed: {}", error);
    }

    (
        status,
        Json(StatusResponse {
            status: "error".to_string(),
            message: error.to_string(),
        }),
    )
        .into_response()
}
