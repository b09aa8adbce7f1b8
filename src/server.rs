//! JSON HTTP API.
//!
//! One route per user intent, all backed by the same [`LedgerService`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Liveness, version, store and AI backends |
//! | `GET`  | `/ledger` | Every collection plus `loading` / `dirty` |
//! | `GET`  | `/overview` | Total receivables, payables and net balance |
//! | `POST` | `/receivables` | `{ payer, amount }` |
//! | `POST` | `/receivables/{id}/clear` | Move to history |
//! | `POST` | `/payables` | `{ payee, amount, dueDate }` |
//! | `POST` | `/payables/{id}/clear` | Move to history |
//! | `POST` | `/purchases` | `{ notes, analyze?, ... }` |
//! | `POST` | `/purchases/analyze` | `{ notes }`, extraction only |
//! | `POST` | `/contacts` | `{ name, contactInfo }` |
//! | `POST` | `/contacts/import` | Array of contacts (see [`contacts_import`](crate::contacts_import)) |
//! | `POST` | `/summary` | Generate a financial summary |
//!
//! Successful intents answer `{ "message": "Receivable added.", "data": { ... } }`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "validation", "message": "Payer name is required" } }
//! ```
//!
//! Error codes: `validation` (400), `not_found` (404), `loading` (503),
//! `extraction_failed` (502), `summary_failed` (502), `sync_failed` (502),
//! `internal` (500).

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use talctrack_core::error::ValidationError;
use talctrack_core::ledger::ImportReport;
use talctrack_core::models::{
    parse_due_date, DealerContact, Payable, Purchase, PurchaseAnalysis, PurchaseDraft, Receivable,
};
use talctrack_core::report::Overview;

use crate::config::Config;
use crate::contacts_import::parse_contacts;
use crate::error::TalcError;
use crate::service::{LedgerService, LedgerView, Notice};
use crate::sync::LoadState;

type AppState = Arc<LedgerService>;

/// Build the router. Exposed so tests can serve it on an ephemeral port.
pub fn router(service: Arc<LedgerService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/ledger", get(handle_ledger))
        .route("/overview", get(handle_overview))
        .route("/receivables", post(handle_add_receivable))
        .route("/receivables/{id}/clear", post(handle_clear_receivable))
        .route("/payables", post(handle_add_payable))
        .route("/payables/{id}/clear", post(handle_clear_payable))
        .route("/purchases", post(handle_add_purchase))
        .route("/purchases/analyze", post(handle_analyze))
        .route("/contacts", post(handle_add_contact))
        .route("/contacts/import", post(handle_import_contacts))
        .route("/summary", post(handle_summary))
        .layer(cors)
        .with_state(service)
}

/// Serve the API on `[server].bind` until Ctrl-C, then release the
/// subscription.
pub async fn run_server(config: &Config, service: LedgerService) -> anyhow::Result<()> {
    let service = Arc::new(service);
    let app = router(service.clone());

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("TalcTrack API listening on http://{}", config.server.bind);
    tracing::info!(bind = %config.server.bind, "server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    if let Ok(service) = Arc::try_unwrap(service) {
        service.close().await;
    }
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<TalcError> for AppError {
    fn from(err: TalcError) -> Self {
        let (status, code) = match &err {
            TalcError::Validation(_) => (StatusCode::BAD_REQUEST, err.code()),
            TalcError::NotFound { .. } => (StatusCode::NOT_FOUND, err.code()),
            TalcError::Loading => (StatusCode::SERVICE_UNAVAILABLE, err.code()),
            TalcError::Extraction(_) | TalcError::Summary(_) => (StatusCode::BAD_GATEWAY, err.code()),
            TalcError::SyncRead(_) | TalcError::SyncWrite(_) => (StatusCode::BAD_GATEWAY, err.code()),
            TalcError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        AppError {
            status,
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        TalcError::from(err).into()
    }
}

/// Unwrap a JSON body, reporting malformed input as a validation error.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(v)| v).map_err(|rejection| AppError {
        status: StatusCode::BAD_REQUEST,
        code: "validation".to_string(),
        message: rejection.body_text(),
    })
}

type Reply<T> = Result<Json<Notice<T>>, AppError>;

// ============ Read-only ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    store: String,
    ai: String,
    loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
}

async fn handle_health(State(service): State<AppState>) -> Json<HealthResponse> {
    let session = service.session();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        store: session.backend().to_string(),
        ai: service.ai_provider().to_string(),
        loaded: session.load_state() == LoadState::Loaded,
        last_error: session.last_error(),
    })
}

async fn handle_ledger(State(service): State<AppState>) -> Json<LedgerView> {
    Json(service.view().await)
}

async fn handle_overview(State(service): State<AppState>) -> Json<Overview> {
    Json(service.overview().await)
}

// ============ Receivables and payables ============

#[derive(Deserialize)]
struct NewReceivable {
    payer: String,
    amount: f64,
}

async fn handle_add_receivable(
    State(service): State<AppState>,
    payload: Result<Json<NewReceivable>, JsonRejection>,
) -> Reply<Receivable> {
    let req = body(payload)?;
    Ok(Json(service.add_receivable(&req.payer, req.amount).await?))
}

async fn handle_clear_receivable(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Reply<Receivable> {
    Ok(Json(service.clear_receivable(&id).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewPayable {
    payee: String,
    amount: f64,
    #[serde(default)]
    due_date: String,
}

async fn handle_add_payable(
    State(service): State<AppState>,
    payload: Result<Json<NewPayable>, JsonRejection>,
) -> Reply<Payable> {
    let req = body(payload)?;
    let due_date = parse_due_date(&req.due_date)?;
    Ok(Json(
        service.add_payable(&req.payee, req.amount, due_date).await?,
    ))
}

async fn handle_clear_payable(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Reply<Payable> {
    Ok(Json(service.clear_payable(&id).await?))
}

// ============ Purchases ============

#[derive(Deserialize)]
struct NewPurchase {
    #[serde(default)]
    analyze: bool,
    #[serde(flatten)]
    draft: PurchaseDraft,
}

async fn handle_add_purchase(
    State(service): State<AppState>,
    payload: Result<Json<NewPurchase>, JsonRejection>,
) -> Reply<Purchase> {
    let req = body(payload)?;
    Ok(Json(service.add_purchase(req.draft, req.analyze).await?))
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    #[serde(default)]
    notes: String,
}

async fn handle_analyze(
    State(service): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Reply<PurchaseAnalysis> {
    let req = body(payload)?;
    Ok(Json(service.analyze(&req.notes).await?))
}

// ============ Contacts ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewContact {
    #[serde(default)]
    name: String,
    #[serde(default)]
    contact_info: String,
}

async fn handle_add_contact(
    State(service): State<AppState>,
    payload: Result<Json<NewContact>, JsonRejection>,
) -> Reply<DealerContact> {
    let req = body(payload)?;
    Ok(Json(
        service
            .add_dealer_contact(&req.name, &req.contact_info)
            .await?,
    ))
}

async fn handle_import_contacts(
    State(service): State<AppState>,
    raw: String,
) -> Reply<ImportReport> {
    let candidates = parse_contacts(&raw).map_err(|e| AppError {
        status: StatusCode::BAD_REQUEST,
        code: "validation".to_string(),
        message: format!("{:#}", e),
    })?;
    Ok(Json(service.import_dealer_contacts(candidates).await?))
}

// ============ Summary ============

async fn handle_summary(State(service): State<AppState>) -> Reply<String> {
    Ok(Json(service.summary().await?))
}
