use axum::http::StatusCode;
use axum::response::Json;
use serde_json::json;

use crate::models::stock_models::StockError;

pub mod lotes;
pub mod productos;
pub mod stock;

/// Map engine errors onto HTTP responses. Validation problems and stock
/// shortfalls carry their message verbatim so the client can render them;
/// store failures are logged server-side and answered generically.
pub(crate) fn handle_stock_error<T>(
    error: StockError,
) -> Result<T, (StatusCode, Json<serde_json::Value>)> {
    match error {
        StockError::ProductoNotFound { codigo_barra } => Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Producto no encontrado",
                "message": format!("Producto no encontrado: {codigo_barra}"),
                "codigo_barra": codigo_barra
            })),
        )),
        StockError::InsufficientStock {
            requested,
            available,
        } => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Stock insuficiente",
                "message": format!("Stock insuficiente. Disponible: {available}, pedido: {requested}"),
                "requested": requested,
                "available": available
            })),
        )),
        StockError::DuplicateBarcode { codigo_barra } => Err((
            StatusCode::CONFLICT,
            Json(json!({
                "error": "Código de barras duplicado",
                "message": format!("Ya existe un producto con el código de barras {codigo_barra}")
            })),
        )),
        StockError::ValidationError(msg) => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Validation error",
                "message": msg
            })),
        )),
        StockError::DatabaseError(msg) => {
            tracing::error!("Database error: {msg}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Database error",
                    "message": "Internal server error occurred"
                })),
            ))
        }
        StockError::TransactionError(msg) => {
            tracing::error!("Transaction error: {msg}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Transaction error",
                    "message": "Failed to complete transaction"
                })),
            ))
        }
    }
}
