use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use std::collections::HashMap;
use serde_json::json;

use crate::database::Database;
use crate::handlers::handle_stock_error;
use crate::models::stock_models::{NuevoProductoRequest, Producto, UpdateProductoRequest};
use crate::services::StockService;

/// Create product catalog routes
pub fn create_productos_routes() -> Router<Database> {
    Router::new()
        .route("/", get(get_productos))
        .route("/", post(create_producto))
        .route("/search", get(search_productos))
        .route("/by-codigo/{codigo_barra}", get(get_producto_by_codigo))
        .route("/by-codigo/{codigo_barra}", put(update_producto_by_codigo))
}

/// List all products ordered by name
/// GET /api/productos
async fn get_productos(
    State(database): State<Database>,
) -> Result<Json<Vec<Producto>>, (StatusCode, Json<serde_json::Value>)> {
    let service = StockService::new(database);

    match service.get_productos().await {
        Ok(productos) => Ok(Json(productos)),
        Err(e) => handle_stock_error(e),
    }
}

/// Resolve a scanned or typed barcode to a product
/// GET /api/productos/by-codigo/{codigo_barra}
async fn get_producto_by_codigo(
    State(database): State<Database>,
    Path(codigo_barra): Path<String>,
) -> Result<Json<Producto>, (StatusCode, Json<serde_json::Value>)> {
    let service = StockService::new(database);

    match service.find_producto_by_codigo(&codigo_barra).await {
        Ok(Some(producto)) => Ok(Json(producto)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Producto no encontrado",
                "message": format!("Producto no encontrado: {codigo_barra}")
            })),
        )),
        Err(e) => handle_stock_error(e),
    }
}

/// Register a new product
/// POST /api/productos
async fn create_producto(
    State(database): State<Database>,
    Json(request): Json<NuevoProductoRequest>,
) -> Result<(StatusCode, Json<Producto>), (StatusCode, Json<serde_json::Value>)> {
    let service = StockService::new(database);

    match service.create_producto(request).await {
        Ok(producto) => Ok((StatusCode::CREATED, Json(producto))),
        Err(e) => handle_stock_error(e),
    }
}

/// Text search over barcode and name
/// GET /api/productos/search?q={term}
async fn search_productos(
    State(database): State<Database>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Producto>>, (StatusCode, Json<serde_json::Value>)> {
    let service = StockService::new(database);

    let term = params.get("q").map(|s| s.as_str()).unwrap_or("");

    match service.search_productos(term).await {
        Ok(productos) => Ok(Json(productos)),
        Err(e) => handle_stock_error(e),
    }
}

/// Update product name and description by barcode
/// PUT /api/productos/by-codigo/{codigo_barra}
async fn update_producto_by_codigo(
    State(database): State<Database>,
    Path(codigo_barra): Path<String>,
    Json(request): Json<UpdateProductoRequest>,
) -> Result<Json<Producto>, (StatusCode, Json<serde_json::Value>)> {
    let service = StockService::new(database);

    match service.update_producto_by_codigo(&codigo_barra, request).await {
        Ok(producto) => Ok(Json(producto)),
        Err(e) => handle_stock_error(e),
    }
}
