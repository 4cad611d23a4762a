use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};

use crate::database::Database;
use crate::handlers::handle_stock_error;
use crate::models::stock_models::{LoteConProducto, LotesBatchRequest, LotesBatchResult};
use crate::services::StockService;

/// Create lot routes
pub fn create_lotes_routes() -> Router<Database> {
    Router::new()
        .route("/", get(get_lotes))
        .route("/vencimientos", get(get_lotes_vencimientos))
        .route("/vencidos", get(get_lotes_vencidos))
        .route("/batch", post(create_lotes_batch))
        .route("/producto/{producto_id}", get(get_lotes_by_producto))
}

/// List every lot with its product, soonest expiry first
/// GET /api/lotes
async fn get_lotes(
    State(database): State<Database>,
) -> Result<Json<Vec<LoteConProducto>>, (StatusCode, Json<serde_json::Value>)> {
    let service = StockService::new(database);

    match service.get_lotes().await {
        Ok(lotes) => Ok(Json(lotes)),
        Err(e) => handle_stock_error(e),
    }
}

/// List active lots (positive balance) for expiry review
/// GET /api/lotes/vencimientos
async fn get_lotes_vencimientos(
    State(database): State<Database>,
) -> Result<Json<Vec<LoteConProducto>>, (StatusCode, Json<serde_json::Value>)> {
    let service = StockService::new(database);

    match service.get_lotes_activos().await {
        Ok(lotes) => Ok(Json(lotes)),
        Err(e) => handle_stock_error(e),
    }
}

/// List active lots already past their expiry date, for write-off review
/// GET /api/lotes/vencidos
async fn get_lotes_vencidos(
    State(database): State<Database>,
) -> Result<Json<Vec<LoteConProducto>>, (StatusCode, Json<serde_json::Value>)> {
    let service = StockService::new(database);

    match service.get_lotes_vencidos().await {
        Ok(lotes) => Ok(Json(lotes)),
        Err(e) => handle_stock_error(e),
    }
}

/// All-or-nothing intake of a batch of new lots
/// POST /api/lotes/batch
async fn create_lotes_batch(
    State(database): State<Database>,
    Json(request): Json<LotesBatchRequest>,
) -> Result<(StatusCode, Json<LotesBatchResult>), (StatusCode, Json<serde_json::Value>)> {
    let service = StockService::new(database);

    match service.crear_lotes_batch(request).await {
        Ok(result) => Ok((StatusCode::CREATED, Json(result))),
        Err(e) => handle_stock_error(e),
    }
}

/// Active lots of one product in allocation order (depletion preview)
/// GET /api/lotes/producto/{producto_id}
async fn get_lotes_by_producto(
    State(database): State<Database>,
    Path(producto_id): Path<i32>,
) -> Result<Json<Vec<LoteConProducto>>, (StatusCode, Json<serde_json::Value>)> {
    let service = StockService::new(database);

    match service.get_lotes_by_producto(producto_id).await {
        Ok(lotes) => Ok(Json(lotes)),
        Err(e) => handle_stock_error(e),
    }
}
