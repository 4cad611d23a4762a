use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};

use crate::database::Database;
use crate::handlers::handle_stock_error;
use crate::models::stock_models::{SalidaStockRequest, SalidaStockResult, StockHealthResponse};
use crate::services::StockService;

/// Create stock routes
pub fn create_stock_routes() -> Router<Database> {
    Router::new()
        .route("/stock/salida", post(registrar_salida))
        .route("/stock/health", get(get_health))
}

/// Deplete stock of one product lot-by-lot in FEFO order
/// POST /api/stock/salida
async fn registrar_salida(
    State(database): State<Database>,
    Json(request): Json<SalidaStockRequest>,
) -> Result<Json<SalidaStockResult>, (StatusCode, Json<serde_json::Value>)> {
    let service = StockService::new(database);

    match service.registrar_salida(request).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => handle_stock_error(e),
    }
}

/// Get service health status
/// GET /api/stock/health
async fn get_health(State(database): State<Database>) -> Json<StockHealthResponse> {
    let service = StockService::new(database);
    Json(service.get_health().await)
}
