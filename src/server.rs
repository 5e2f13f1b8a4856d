//! HTTP front end.
//!
//! Serves the single-page UI and the JSON endpoints it calls. The active
//! business is carried in a signed session cookie (see [`crate::session`]).
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | UI page |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/get_business_info` | Name of the active business, or `null` |
//! | `POST` | `/upload` | Multipart upload (`file`, `business_name`), runs the pipeline |
//! | `POST` | `/send_message` | RAG answer for `{"message": ...}` |
//! | `GET`  | `/get_faqs` | Stored FAQs of the active business |
//! | `GET`  | `/get_products` | Stored products of the active business |
//! | `GET`  | `/get_business_details` | Stored business info of the active business |
//!
//! # Error Contract
//!
//! Upload errors are `{"success": false, "message": ...}`, chat errors are
//! `{"response": ...}` so the UI can show them as a bot message. Whenever
//! the session points at a business that no longer exists, the response
//! also clears the session cookie. An upload that fails after its business
//! record was created clears the cookie too; one rejected earlier leaves
//! the current session untouched.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app::AppContext;
use crate::business;
use crate::config::Config;
use crate::extract::{allowed_file, stored_filename};
use crate::ingest;
use crate::models::{empty_object, Business};
use crate::rag;
use crate::session::{clear_cookie, SessionSigner};
use crate::vector_store;

const INDEX_HTML: &str = include_str!("../static/index.html");

const UPLOAD_SUCCESS_MESSAGE: &str = "File uploaded and processed successfully. AI is ready.";
const UPLOAD_FAILURE_MESSAGE: &str = "An internal error occurred during processing.";
const CHAT_EMPTY_MESSAGE: &str = "Please enter a message.";
const CHAT_NO_SESSION: &str = "Please upload business documents first.";
const CHAT_STALE_SESSION: &str = "Your session seems invalid. Please upload documents again.";
const CHAT_FAILURE_MESSAGE: &str = "Sorry, an unexpected error occurred. Please try again.";

/// Shared state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    ctx: AppContext,
    sessions: SessionSigner,
}

/// Build the router over an already-initialized [`AppContext`].
pub fn router(ctx: AppContext) -> anyhow::Result<Router> {
    if ctx.config.server.secret_key.is_none() {
        tracing::warn!(
            "no session secret configured, using the built-in default; set BIZDESK_SECRET_KEY"
        );
    }
    let sessions = SessionSigner::new(ctx.config.server.secret_key())?;
    let max_upload = ctx.config.upload.max_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/get_business_info", get(handle_business_info))
        .route(
            "/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(max_upload)),
        )
        .route("/send_message", post(handle_send_message))
        .route("/get_faqs", get(handle_get_faqs))
        .route("/get_products", get(handle_get_products))
        .route("/get_business_details", get(handle_business_details))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { ctx, sessions });

    Ok(app)
}

/// Open the stores, build the providers and serve on `[server].bind` until
/// the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let ctx = AppContext::new(config.clone()).await?;
    let app = router(ctx)?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("bizdesk listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

struct AppError {
    status: StatusCode,
    body: Value,
    clear_session: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let response = (self.status, Json(self.body)).into_response();
        if self.clear_session {
            with_cookie(response, clear_cookie())
        } else {
            response
        }
    }
}

fn upload_error(status: StatusCode, message: &str) -> AppError {
    AppError {
        status,
        body: json!({"success": false, "message": message}),
        clear_session: false,
    }
}

fn chat_error(status: StatusCode, message: &str) -> AppError {
    AppError {
        status,
        body: json!({"response": message}),
        clear_session: false,
    }
}

fn internal_error(err: anyhow::Error) -> AppError {
    tracing::error!("request failed: {:#}", err);
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: json!({"error": "internal server error"}),
        clear_session: false,
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    let status = err.status();
    tracing::warn!(%status, "rejected upload body: {}", err.body_text());
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        upload_error(status, "File is too large")
    } else {
        upload_error(StatusCode::BAD_REQUEST, "Malformed upload request")
    }
}

fn with_cookie(mut response: Response, cookie: HeaderValue) -> Response {
    response.headers_mut().append(header::SET_COOKIE, cookie);
    response
}

// ============ Session lookup ============

enum ActiveBusiness {
    None,
    /// Valid signature, but the business row is gone.
    Stale,
    Found(Business),
}

async fn active_business(state: &AppState, headers: &HeaderMap) -> anyhow::Result<ActiveBusiness> {
    let Some(business_id) = state.sessions.business_id(headers) else {
        return Ok(ActiveBusiness::None);
    };

    match business::get_business(&state.ctx.pool, &business_id).await? {
        Some(business) => Ok(ActiveBusiness::Found(business)),
        None => {
            tracing::warn!(business_id, "clearing session for unknown business");
            Ok(ActiveBusiness::Stale)
        }
    }
}

/// Render a read-only endpoint for the active business, if any.
async fn session_read<F>(
    state: &AppState,
    headers: &HeaderMap,
    render: F,
) -> Result<Response, AppError>
where
    F: FnOnce(Option<&Business>) -> Value,
{
    let active = active_business(state, headers).await.map_err(internal_error)?;
    let response = match &active {
        ActiveBusiness::Found(business) => Json(render(Some(business))).into_response(),
        ActiveBusiness::None | ActiveBusiness::Stale => Json(render(None)).into_response(),
    };
    Ok(match active {
        ActiveBusiness::Stale => with_cookie(response, clear_cookie()),
        _ => response,
    })
}

// ============ GET / ============

async fn handle_index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let page = Html(INDEX_HTML).into_response();
    match active_business(&state, &headers).await {
        Ok(ActiveBusiness::Stale) => with_cookie(page, clear_cookie()),
        Ok(_) => page,
        Err(e) => {
            tracing::error!("session lookup failed: {:#}", e);
            page
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /get_business_info and friends ============

async fn handle_business_info(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    session_read(&state, &headers, |business| {
        json!({"business_name": business.map(|b| b.name.clone())})
    })
    .await
}

async fn handle_get_faqs(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    session_read(&state, &headers, |business| {
        json!({"faqs": business.map(Business::faqs).unwrap_or_default()})
    })
    .await
}

async fn handle_get_products(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    session_read(&state, &headers, |business| {
        json!({"products": business.map(Business::products).unwrap_or_default()})
    })
    .await
}

async fn handle_business_details(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    session_read(&state, &headers, |business| {
        json!({"business_info": business.map(Business::business_info).unwrap_or_else(empty_object)})
    })
    .await
}

// ============ POST /upload ============

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut business_name = String::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                file = Some((filename, data));
            }
            "business_name" => {
                business_name = field.text().await.map_err(multipart_error)?;
            }
            _ => {}
        }
    }

    let Some((raw_filename, data)) = file else {
        return Err(upload_error(StatusCode::BAD_REQUEST, "No file part in request"));
    };
    let business_name = business_name.trim();
    if business_name.is_empty() {
        return Err(upload_error(StatusCode::BAD_REQUEST, "Business name is required"));
    }
    if raw_filename.is_empty() {
        return Err(upload_error(StatusCode::BAD_REQUEST, "No file selected"));
    }
    if !allowed_file(&raw_filename, &state.ctx.config.upload.allowed_extensions) {
        return Err(upload_error(StatusCode::BAD_REQUEST, "File type not allowed"));
    }

    let filename = stored_filename(&raw_filename);
    tracing::info!(business_name, filename, bytes = data.len(), "upload received");

    let result =
        ingest::ingest_document(&state.ctx, business_name, &filename, data.to_vec()).await;
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(business_name, "upload processing failed: {:#}", e);
            let mut err = upload_error(StatusCode::INTERNAL_SERVER_ERROR, UPLOAD_FAILURE_MESSAGE);
            // Only a failure after the record existed invalidates the session.
            err.clear_session = e.record_created();
            return Err(err);
        }
    };

    let cookie = state
        .sessions
        .set_cookie(&outcome.business_id)
        .map_err(internal_error)?;
    let body = json!({
        "success": true,
        "business_name": outcome.business_name,
        "business_id": outcome.business_id,
        "message": UPLOAD_SUCCESS_MESSAGE,
    });
    Ok(with_cookie(Json(body).into_response(), cookie))
}

// ============ POST /send_message ============

#[derive(Deserialize, Default)]
struct SendMessageRequest {
    #[serde(default)]
    message: String,
}

async fn handle_send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let request: SendMessageRequest = serde_json::from_slice(&body).unwrap_or_default();
    let message = request.message.trim();
    if message.is_empty() {
        return Err(chat_error(StatusCode::BAD_REQUEST, CHAT_EMPTY_MESSAGE));
    }

    let business = match active_business(&state, &headers).await {
        Ok(ActiveBusiness::Found(business)) => business,
        Ok(ActiveBusiness::None) => {
            return Err(chat_error(StatusCode::BAD_REQUEST, CHAT_NO_SESSION));
        }
        Ok(ActiveBusiness::Stale) => {
            let mut err = chat_error(StatusCode::BAD_REQUEST, CHAT_STALE_SESSION);
            err.clear_session = true;
            return Err(err);
        }
        Err(e) => {
            tracing::error!("session lookup failed: {:#}", e);
            return Err(chat_error(StatusCode::INTERNAL_SERVER_ERROR, CHAT_FAILURE_MESSAGE));
        }
    };

    let ctx = &state.ctx;
    let chunks = vector_store::retrieve(
        &ctx.vectors,
        ctx.embedder.as_ref(),
        &business.id,
        message,
        ctx.config.retrieval.top_k,
    )
    .await;

    let answer = rag::generate_response(
        ctx.chat.as_ref(),
        &ctx.config.llm,
        &business.name,
        message,
        &chunks,
        &business.faqs(),
        &business.products(),
    )
    .await;

    Ok(Json(json!({"response": answer})))
}
