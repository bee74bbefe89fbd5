//! 稅費試算 HTTP API
//!
//! # 端點
//!
//! | Method | Path | 說明 |
//! |--------|------|------|
//! | `GET`  | `/hts/search?query=&chapter=&limit=` | 依描述搜尋稅則，相關度高者在前 |
//! | `GET`  | `/hts/{code}` | 查詢單一稅則代碼 |
//! | `POST` | `/tariff/calculate` | 單筆到岸成本試算 |
//! | `POST` | `/tariff/compare-sourcing` | 多國到岸成本比較 |
//! | `POST` | `/admin/reload` | 重新載入參考資料 CSV 並整批替換 |
//! | `GET`  | `/health` | 健康檢查與資料筆數 |
//!
//! # 錯誤格式
//!
//! ```json
//! { "error": { "code": "not_found", "message": "HTS code not found: 9999.99.9999" } }
//! ```
//!
//! `not_found` → 404，`invalid_input` → 400（含無法解析的 JSON 請求），
//! `ambiguous_rate` → 422，其餘 → 500。

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::core::engine::{TableStats, TariffEngine};
use crate::domain::model::{
    CalculationRequest, CalculationResult, HtsRecord, ProductSpec, SearchHit, SortKey,
    SourcingReport, TransportMode,
};
use crate::domain::ports::ReferenceSource;
use crate::utils::error::{ErrorCategory, TariffError};

/// 各路由共用的狀態
#[derive(Clone)]
pub struct AppState {
    engine: TariffEngine,
    source: Arc<dyn ReferenceSource>,
}

impl AppState {
    pub fn new(engine: TariffEngine, source: Arc<dyn ReferenceSource>) -> Self {
        Self { engine, source }
    }
}

/// 建立路由但不綁定埠號
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/hts/search", get(handle_search))
        .route("/hts/{code}", get(handle_lookup))
        .route("/tariff/calculate", post(handle_calculate))
        .route("/tariff/compare-sourcing", post(handle_compare))
        .route("/admin/reload", post(handle_reload))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// 綁定 `bind_addr` 並持續服務直到程序結束
pub async fn run_server(state: AppState, bind_addr: &str) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("🚀 Tariff API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ 錯誤回應 ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// 引擎錯誤轉成 HTTP 回應
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl From<TariffError> for AppError {
    fn from(err: TariffError) -> Self {
        let category = err.category();
        let status = match category {
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorCategory::AmbiguousRate => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCategory::Configuration | ErrorCategory::ReferenceData | ErrorCategory::System => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!("❌ {}", err);
        } else {
            tracing::debug!("request rejected: {}", err);
        }
        Self {
            status,
            code: category.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("request body rejected: {}", rejection.body_text());
        Self {
            status: StatusCode::BAD_REQUEST,
            code: ErrorCategory::InvalidInput.code().to_string(),
            message: rejection.body_text(),
        }
    }
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

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    #[serde(flatten)]
    tables: TableStats,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tables: state.engine.stats(),
    })
}

// ============ GET /hts/search ============

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
    chapter: Option<String>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResponse> {
    let results = state
        .engine
        .search(&params.query, params.chapter.as_deref(), params.limit);
    Json(SearchResponse { results })
}

// ============ GET /hts/{code} ============

async fn handle_lookup(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<HtsRecord>, AppError> {
    Ok(Json(state.engine.lookup(&code)?))
}

// ============ POST /tariff/calculate ============

async fn handle_calculate(
    State(state): State<AppState>,
    payload: Result<Json<CalculationRequest>, JsonRejection>,
) -> Result<Json<CalculationResult>, AppError> {
    let Json(request) = payload?;
    Ok(Json(state.engine.calculate(&request)?))
}

// ============ POST /tariff/compare-sourcing ============

fn default_quantity() -> u32 {
    1
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Deserialize)]
struct CompareBody {
    hts_code: String,
    product_value: f64,
    #[serde(default = "default_quantity")]
    quantity: u32,
    current_country: String,
    target_countries: Vec<String>,
    #[serde(default)]
    freight_cost: f64,
    #[serde(default)]
    insurance_cost: f64,
    #[serde(default)]
    other_costs: f64,
    #[serde(default = "default_currency")]
    currency: String,
    #[serde(default)]
    transport_mode: TransportMode,
    #[serde(default)]
    entry_date: Option<chrono::NaiveDate>,
    #[serde(default)]
    sort_by: SortKey,
}

async fn handle_compare(
    State(state): State<AppState>,
    payload: Result<Json<CompareBody>, JsonRejection>,
) -> Result<Json<SourcingReport>, AppError> {
    let Json(body) = payload?;
    let spec = ProductSpec {
        hts_code: body.hts_code,
        product_value: body.product_value,
        quantity: body.quantity,
        freight_cost: body.freight_cost,
        insurance_cost: body.insurance_cost,
        other_costs: body.other_costs,
        currency: body.currency,
        transport_mode: body.transport_mode,
        entry_date: body.entry_date,
    };
    let report = state
        .engine
        .compare_sourcing_parallel(
            &body.current_country,
            &body.target_countries,
            &spec,
            body.sort_by,
        )
        .await?;
    Ok(Json(report))
}

// ============ POST /admin/reload ============

async fn handle_reload(State(state): State<AppState>) -> Result<Json<TableStats>, AppError> {
    Ok(Json(state.engine.reload(state.source.as_ref()).await?))
}
