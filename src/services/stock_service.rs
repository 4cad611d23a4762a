use chrono::NaiveDate;

use crate::constants;
use crate::database::stock_db::StockDatabase;
use crate::database::Database;
use crate::models::stock_models::{
    LoteConProducto, LotesBatchRequest, LotesBatchResult, NuevoLote, NuevoLoteEntry,
    NuevoProductoRequest, Producto, SalidaStockRequest, SalidaStockResult, StockError,
    StockHealthResponse, UpdateProductoRequest,
};
use crate::utils::{deposito_now_rfc3339, deposito_today};

/// Orchestrates the stock engine: validates input, applies the boundary
/// defaults and delegates to the ledger. All transactional discipline
/// lives in [`StockDatabase`].
pub struct StockService {
    db: StockDatabase,
    database_name: String,
}

impl StockService {
    pub fn new(database: Database) -> Self {
        let database_name = database.get_database_name().to_string();
        Self {
            db: StockDatabase::new(database),
            database_name,
        }
    }

    /// FEFO stock depletion for one product, identified by barcode
    pub async fn registrar_salida(
        &self,
        request: SalidaStockRequest,
    ) -> Result<SalidaStockResult, StockError> {
        let codigo_barra = request.codigo_barra.trim();
        if codigo_barra.is_empty() {
            return Err(StockError::ValidationError(
                "Datos inválidos para salida de stock".to_string(),
            ));
        }
        if request.cantidad <= 0 {
            return Err(StockError::ValidationError(
                "La cantidad solicitada debe ser mayor a 0".to_string(),
            ));
        }

        // Defaults are decided here at the boundary; the allocation
        // algorithm never sees a missing origin or note
        let origen = non_empty_or(request.origen, constants::DEFAULT_ORIGEN_SALIDA);
        let observacion = non_empty_or(request.observacion, constants::DEFAULT_OBSERVACION_SALIDA);

        let lotes_afectados = self
            .db
            .execute_salida_transaction(codigo_barra, request.cantidad, &origen, &observacion)
            .await?;

        tracing::info!(
            codigo_barra,
            cantidad = request.cantidad,
            lotes_afectados,
            "Salida de stock registrada"
        );

        Ok(SalidaStockResult {
            success: true,
            message: "Stock descontado correctamente".to_string(),
            timestamp: deposito_now_rfc3339(),
        })
    }

    /// Batch intake of new lots; validates every entry up front so that a
    /// bad entry rejects the whole batch before any row is written
    pub async fn crear_lotes_batch(
        &self,
        request: LotesBatchRequest,
    ) -> Result<LotesBatchResult, StockError> {
        let nuevos = validate_lotes_batch(request.lotes)?;

        let insertados = self.db.insert_lotes_batch(&nuevos).await?;

        tracing::info!(lotes = insertados, "Ingreso de lotes registrado");

        Ok(LotesBatchResult {
            success: true,
            message: "Lotes guardados correctamente".to_string(),
            lotes_creados: insertados,
            timestamp: deposito_now_rfc3339(),
        })
    }

    pub async fn get_lotes(&self) -> Result<Vec<LoteConProducto>, StockError> {
        self.db.get_lotes().await
    }

    pub async fn get_lotes_activos(&self) -> Result<Vec<LoteConProducto>, StockError> {
        self.db.get_lotes_activos().await
    }

    /// Active lots already expired as of today in the warehouse timezone
    pub async fn get_lotes_vencidos(&self) -> Result<Vec<LoteConProducto>, StockError> {
        self.db.get_lotes_vencidos(deposito_today()).await
    }

    pub async fn get_lotes_by_producto(
        &self,
        producto_id: i32,
    ) -> Result<Vec<LoteConProducto>, StockError> {
        self.db.get_lotes_by_producto(producto_id).await
    }

    pub async fn get_productos(&self) -> Result<Vec<Producto>, StockError> {
        self.db.get_productos().await
    }

    pub async fn find_producto_by_codigo(
        &self,
        codigo_barra: &str,
    ) -> Result<Option<Producto>, StockError> {
        self.db.find_producto_by_codigo(codigo_barra).await
    }

    pub async fn create_producto(
        &self,
        request: NuevoProductoRequest,
    ) -> Result<Producto, StockError> {
        let codigo_barra = request.codigo_barra.trim();
        let nombre = request.nombre.trim();
        if codigo_barra.is_empty() || nombre.is_empty() {
            return Err(StockError::ValidationError(
                "codigoBarra y nombre son obligatorios".to_string(),
            ));
        }

        self.db
            .create_producto(codigo_barra, nombre, request.descripcion.as_deref())
            .await
    }

    pub async fn search_productos(&self, term: &str) -> Result<Vec<Producto>, StockError> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }
        self.db.search_productos(term).await
    }

    pub async fn update_producto_by_codigo(
        &self,
        codigo_barra: &str,
        request: UpdateProductoRequest,
    ) -> Result<Producto, StockError> {
        let nombre = request.nombre.trim();
        if nombre.is_empty() {
            return Err(StockError::ValidationError(
                "El nombre es obligatorio para actualizar".to_string(),
            ));
        }

        self.db
            .update_producto_by_codigo(codigo_barra, nombre, request.descripcion.as_deref())
            .await
    }

    pub async fn get_health(&self) -> StockHealthResponse {
        StockHealthResponse {
            success: true,
            status: "healthy".to_string(),
            database: self.database_name.clone(),
            timestamp: deposito_now_rfc3339(),
        }
    }
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}

/// Validate a whole intake batch before anything touches the store.
/// The first invalid entry rejects the batch; a valid result covers every
/// entry, preserving input order.
pub fn validate_lotes_batch(
    entries: Option<Vec<NuevoLoteEntry>>,
) -> Result<Vec<NuevoLote>, StockError> {
    let entries = entries.unwrap_or_default();
    if entries.is_empty() {
        return Err(StockError::ValidationError(
            "Se requiere un array de lotes para guardar".to_string(),
        ));
    }

    let mut nuevos = Vec::with_capacity(entries.len());

    for entry in entries {
        let producto_id = entry
            .producto_id
            .ok_or_else(|| StockError::ValidationError("Datos de lote incompletos".to_string()))?;

        let fecha = entry
            .fecha_vencimiento
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StockError::ValidationError("Datos de lote incompletos".to_string()))?;

        let fecha_vencimiento = NaiveDate::parse_from_str(fecha, "%Y-%m-%d").map_err(|_| {
            StockError::ValidationError(format!("Fecha de vencimiento inválida: {fecha}"))
        })?;

        let cantidad = entry
            .cantidad
            .ok_or_else(|| StockError::ValidationError("Datos de lote incompletos".to_string()))?;
        if cantidad <= 0 {
            return Err(StockError::ValidationError(
                "La cantidad del lote debe ser mayor a 0".to_string(),
            ));
        }

        nuevos.push(NuevoLote {
            producto_id,
            fecha_vencimiento,
            cantidad,
        });
    }

    Ok(nuevos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(
        producto_id: Option<i32>,
        fecha: Option<&str>,
        cantidad: Option<i64>,
    ) -> NuevoLoteEntry {
        NuevoLoteEntry {
            producto_id,
            fecha_vencimiento: fecha.map(|s| s.to_string()),
            cantidad,
        }
    }

    #[test]
    fn valid_batch_preserves_order_and_parses_dates() {
        let nuevos = validate_lotes_batch(Some(vec![
            entry(Some(1), Some("2025-03-01"), Some(10)),
            entry(Some(2), Some("2025-01-15"), Some(5)),
        ]))
        .unwrap();

        assert_eq!(nuevos.len(), 2);
        assert_eq!(nuevos[0].producto_id, 1);
        assert_eq!(
            nuevos[0].fecha_vencimiento,
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
        );
        assert_eq!(nuevos[1].cantidad, 5);
    }

    #[test]
    fn missing_expiry_rejects_the_whole_batch() {
        // Second entry has an empty expiry string; no entry may survive
        let result = validate_lotes_batch(Some(vec![
            entry(Some(1), Some("2025-03-01"), Some(10)),
            entry(Some(1), Some(""), Some(5)),
        ]));

        assert!(matches!(result, Err(StockError::ValidationError(_))));
    }

    #[test]
    fn empty_or_absent_batch_is_rejected() {
        assert!(matches!(
            validate_lotes_batch(Some(Vec::new())),
            Err(StockError::ValidationError(_))
        ));
        assert!(matches!(
            validate_lotes_batch(None),
            Err(StockError::ValidationError(_))
        ));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let result = validate_lotes_batch(Some(vec![entry(Some(1), Some("2025-03-01"), Some(0))]));
        assert!(matches!(result, Err(StockError::ValidationError(_))));

        let result = validate_lotes_batch(Some(vec![entry(Some(1), Some("2025-03-01"), Some(-3))]));
        assert!(matches!(result, Err(StockError::ValidationError(_))));
    }

    #[test]
    fn unparseable_date_is_rejected() {
        let result =
            validate_lotes_batch(Some(vec![entry(Some(1), Some("01/03/2025"), Some(10))]));
        assert!(matches!(result, Err(StockError::ValidationError(_))));
    }

    #[test]
    fn missing_product_id_is_rejected() {
        let result = validate_lotes_batch(Some(vec![entry(None, Some("2025-03-01"), Some(10))]));
        assert!(matches!(result, Err(StockError::ValidationError(_))));
    }

    #[test]
    fn non_empty_or_keeps_caller_value_and_defaults_blank() {
        assert_eq!(non_empty_or(Some("SUCURSAL".to_string()), "DEPOSITO"), "SUCURSAL");
        assert_eq!(non_empty_or(Some("   ".to_string()), "DEPOSITO"), "DEPOSITO");
        assert_eq!(non_empty_or(None, "DEPOSITO"), "DEPOSITO");
    }
}
