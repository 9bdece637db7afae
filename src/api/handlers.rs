//! API request handlers
//!
//! Handlers for all REST API endpoints.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::server::AppState;
use crate::progress::ProgressEntry;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const XLSM_CONTENT_TYPE: &str = "application/vnd.ms-excel.sheet.macroEnabled.12";
pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Standard API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            request_id: Uuid::new_v4().to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self
    where
        T: Default,
    {
        Self {
            success: false,
            request_id: Uuid::new_v4().to_string(),
            data: None,
            error: Some(message.into()),
        }
    }

    /// Tie the response to a caller-visible request id
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }
}

/// Root endpoint response
#[derive(Serialize)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Serialize)]
pub struct EndpointInfo {
    pub path: String,
    pub method: String,
    pub description: String,
}

impl EndpointInfo {
    fn new(method: &str, path: &str, description: &str) -> Self {
        Self {
            path: path.to_string(),
            method: method.to_string(),
            description: description.to_string(),
        }
    }
}

/// GET / - Root info
pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = RootResponse {
        name: "Sheet Migration Server".to_string(),
        version: state.version.clone(),
        description: "Migrates an old workbook's data into the current macro-enabled template"
            .to_string(),
        endpoints: vec![
            EndpointInfo::new("GET", "/health", "Health check endpoint"),
            EndpointInfo::new("GET", "/version", "Get server version"),
            EndpointInfo::new(
                "POST",
                "/upload",
                "Upload an old workbook (multipart field 'file'); returns the migrated workbook",
            ),
            EndpointInfo::new("GET", "/progress/:id", "Progress of a running or finished upload"),
        ],
    };
    Json(ApiResponse::ok(response))
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_message: String,
}

/// GET /health - Health check
pub async fn health() -> impl IntoResponse {
    Json(ApiResponse::ok(HealthResponse {
        status: "healthy".to_string(),
        uptime_message: "Server is running".to_string(),
    }))
}

/// Version response
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub features: Vec<String>,
}

/// GET /version - Server version
pub async fn version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut features = vec!["upload".to_string(), "progress".to_string()];
    if state.macro_enabled {
        features.push("macros".to_string());
    }
    Json(ApiResponse::ok(VersionResponse {
        version: state.version.clone(),
        features,
    }))
}

/// Query parameters accepted by `POST /upload`
#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    pub request_id: Option<String>,
}

/// POST /upload - Migrate an uploaded workbook into the template
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let request_id = request_id(&headers, &query);

    let mut file: Option<(String, Bytes)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") {
                    continue;
                }
                let filename = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => {
                        file = Some((filename, bytes));
                        break;
                    }
                    Err(e) => {
                        warn!(%request_id, "Upload body rejected: {}", e);
                        return failure(e.status(), &request_id, e.body_text());
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(%request_id, "Malformed multipart body: {}", e);
                return failure(e.status(), &request_id, e.body_text());
            }
        }
    }

    let Some((filename, bytes)) = file else {
        return failure(StatusCode::BAD_REQUEST, &request_id, "No file part");
    };
    if filename.is_empty() {
        return failure(StatusCode::BAD_REQUEST, &request_id, "No selected file");
    }
    info!(%request_id, file = %filename, bytes = bytes.len(), "Upload received");

    state.progress.begin(&request_id);
    let sink = state.progress.handle(request_id.clone());
    let worker = Arc::clone(&state);
    let outcome = tokio::task::spawn_blocking(move || {
        let result = worker
            .migrator
            .migrate_bytes_with_report(&bytes, &worker.template, &sink);
        // recorded on the worker so a dropped request still ends its entry
        match &result {
            Ok(_) => sink.complete("Migration complete"),
            Err(e) => sink.fail(&format!("Error processing file: {}", e)),
        }
        result
    })
    .await;

    match outcome {
        Ok(Ok((workbook, report))) => {
            info!(
                %request_id,
                cells = report.cells_copied,
                substitutions = report.substitutions,
                ad_hoc = report.ad_hoc_sheets.len(),
                "Migration finished"
            );
            download(&state, &request_id, workbook)
        }
        Ok(Err(e)) => {
            let message = format!("Error processing file: {}", e);
            let status = if e.is_client_error() {
                StatusCode::UNPROCESSABLE_ENTITY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            warn!(%request_id, %status, "{}", message);
            failure(status, &request_id, message)
        }
        Err(e) => {
            let message = format!("Error processing file: {}", e);
            state.progress.fail(&request_id, &message);
            error!(%request_id, "Migration worker failed: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, &request_id, message)
        }
    }
}

/// GET /progress/:id - Progress of one upload
pub async fn progress(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.progress.get(&id) {
        Some(entry) => {
            (StatusCode::OK, Json(ApiResponse::<ProgressEntry>::ok(entry).with_request_id(id)))
                .into_response()
        }
        None => failure(
            StatusCode::NOT_FOUND,
            &id,
            format!("No progress recorded for request '{}'", id),
        ),
    }
}

/// The caller's request id (header first, then query), or a fresh UUID.
/// Ids outside `[A-Za-z0-9._-]` or longer than 128 characters are replaced.
fn request_id(headers: &HeaderMap, query: &UploadQuery) -> String {
    let from_header = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim);
    let from_query = query.request_id.as_deref().map(str::trim);

    from_header
        .into_iter()
        .chain(from_query)
        .find(|id| is_valid_request_id(id))
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn is_valid_request_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn download(state: &AppState, request_id: &str, workbook: Vec<u8>) -> Response {
    let (content_type, filename) = if state.macro_enabled {
        (XLSM_CONTENT_TYPE, "updated_template.xlsm")
    } else {
        (XLSX_CONTENT_TYPE, "updated_template.xlsx")
    };
    let disposition = format!("attachment; filename=\"{}\"", filename);
    let mut response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        workbook,
    )
        .into_response();
    attach_request_id(&mut response, request_id);
    response
}

fn failure(status: StatusCode, request_id: &str, message: impl Into<String>) -> Response {
    let body = ApiResponse::<()>::err(message).with_request_id(request_id);
    let mut response = (status, Json(body)).into_response();
    attach_request_id(&mut response, request_id);
    response
}

fn attach_request_id(response: &mut Response, request_id: &str) {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
}
