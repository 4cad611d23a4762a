use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the stock engine and the product catalog.
/// Every variant rolls back the enclosing transaction (if any was opened)
/// before it is returned to the handler layer.
#[derive(Debug, Error)]
pub enum StockError {
    #[error("Producto no encontrado: {codigo_barra}")]
    ProductoNotFound { codigo_barra: String },

    #[error("Stock insuficiente. Disponible: {available}, pedido: {requested}")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("Ya existe un producto con el código de barras {codigo_barra}")]
    DuplicateBarcode { codigo_barra: String },

    #[error("{0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Transaction error: {0}")]
    TransactionError(String),
}

/// Product catalog row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Producto {
    pub id: i32,
    pub codigo_barra: String,
    pub nombre: String,
    pub descripcion: Option<String>,
}

/// Lot row joined with its product, as returned by every lot listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoteConProducto {
    pub id: i32,
    pub producto_id: i32,
    pub fecha_vencimiento: NaiveDate,
    pub cantidad: i64,
    pub fecha_alta: NaiveDateTime,
    pub producto_nombre: String,
    pub codigo_barra: String,
}

/// Request body for POST /api/stock/salida
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalidaStockRequest {
    pub codigo_barra: String,
    pub cantidad: i64,
    pub origen: Option<String>,
    pub observacion: Option<String>,
}

/// Confirmation returned by a successful depletion
#[derive(Debug, Serialize)]
pub struct SalidaStockResult {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
}

/// One entry of a batch intake request. Fields are optional so that
/// incomplete entries reach the validator and reject the whole batch,
/// instead of failing JSON deserialization entry by entry.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NuevoLoteEntry {
    pub producto_id: Option<i32>,
    pub fecha_vencimiento: Option<String>,
    pub cantidad: Option<i64>,
}

/// Request body for POST /api/lotes/batch
#[derive(Debug, Deserialize)]
pub struct LotesBatchRequest {
    pub lotes: Option<Vec<NuevoLoteEntry>>,
}

/// A validated intake entry, ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NuevoLote {
    pub producto_id: i32,
    pub fecha_vencimiento: NaiveDate,
    pub cantidad: i64,
}

/// Confirmation returned by a successful batch intake
#[derive(Debug, Serialize)]
pub struct LotesBatchResult {
    pub success: bool,
    pub message: String,
    pub lotes_creados: usize,
    pub timestamp: String,
}

/// Request body for POST /api/productos
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NuevoProductoRequest {
    pub codigo_barra: String,
    pub nombre: String,
    pub descripcion: Option<String>,
}

/// Request body for PUT /api/productos/by-codigo/{codigo}
#[derive(Debug, Deserialize)]
pub struct UpdateProductoRequest {
    pub nombre: String,
    pub descripcion: Option<String>,
}

/// Service health payload for GET /api/stock/health
#[derive(Debug, Serialize)]
pub struct StockHealthResponse {
    pub success: bool,
    pub status: String,
    pub database: String,
    pub timestamp: String,
}
