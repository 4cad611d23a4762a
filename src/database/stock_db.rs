use crate::constants;
use crate::database::Database;
use crate::models::allocation::{plan_fefo, LoteSaldo};
use crate::models::stock_models::{LoteConProducto, NuevoLote, Producto, StockError};
use crate::utils::deposito_now;
use chrono::{NaiveDate, NaiveDateTime};

/// Data access layer for lot balances, the movement trail and the product
/// catalog. This is the only component that mutates `lotes.cantidad` and
/// the only writer of `movimientos_stock`.
pub struct StockDatabase {
    db: Database,
}

/// SQL Server error numbers raised on unique constraint (2627) and unique
/// index (2601) violations
fn is_unique_violation(code: u32) -> bool {
    code == 2627 || code == 2601
}

impl StockDatabase {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn map_lote_row(row: &tiberius::Row) -> LoteConProducto {
        LoteConProducto {
            id: row.get::<i32, _>("id").unwrap_or(0),
            producto_id: row.get::<i32, _>("producto_id").unwrap_or(0),
            fecha_vencimiento: row
                .get::<NaiveDate, _>("fecha_vencimiento")
                .unwrap_or_default(),
            cantidad: row.get::<i64, _>("cantidad").unwrap_or(0),
            fecha_alta: row.get::<NaiveDateTime, _>("fecha_alta").unwrap_or_default(),
            producto_nombre: row
                .get::<&str, _>("producto_nombre")
                .unwrap_or("")
                .to_string(),
            codigo_barra: row.get::<&str, _>("codigo_barra").unwrap_or("").to_string(),
        }
    }

    fn map_producto_row(row: &tiberius::Row) -> Producto {
        Producto {
            id: row.get::<i32, _>("id").unwrap_or(0),
            codigo_barra: row.get::<&str, _>("codigo_barra").unwrap_or("").to_string(),
            nombre: row.get::<&str, _>("nombre").unwrap_or("").to_string(),
            descripcion: row.get::<&str, _>("descripcion").map(|s| s.to_string()),
        }
    }

    /// Execute a complete FEFO stock depletion as one atomic transaction.
    ///
    /// The candidate lot rows are read `WITH (UPDLOCK, ROWLOCK)` before the
    /// available total is computed, so two concurrent depletions of the same
    /// product serialize on those row locks instead of both observing the
    /// same balance and jointly over-drawing a lot below zero.
    ///
    /// Returns the number of lots that were drawn from.
    pub async fn execute_salida_transaction(
        &self,
        codigo_barra: &str,
        cantidad_solicitada: i64,
        origen: &str,
        observacion: &str,
    ) -> Result<usize, StockError> {
        let mut client = self
            .db
            .get_client()
            .await
            .map_err(|e| StockError::DatabaseError(e.to_string()))?;

        client
            .simple_query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .await
            .map_err(|e| {
                StockError::DatabaseError(format!("Failed to set isolation level: {e}"))
            })?;

        client
            .simple_query("BEGIN TRANSACTION")
            .await
            .map_err(|e| StockError::DatabaseError(format!("Failed to begin transaction: {e}")))?;

        let transaction_result: Result<usize, StockError> = async {
            // 1. Resolve the product inside the transaction
            let producto_result = client
                .query(
                    "SELECT id FROM productos WHERE codigo_barra = @P1",
                    &[&codigo_barra],
                )
                .await
                .map_err(|e| StockError::DatabaseError(e.to_string()))?;

            let producto_id: i32 = match producto_result
                .into_row()
                .await
                .map_err(|e| StockError::DatabaseError(e.to_string()))?
            {
                Some(row) => row.get("id").ok_or_else(|| {
                    StockError::DatabaseError("Product row without id".to_string())
                })?,
                None => {
                    return Err(StockError::ProductoNotFound {
                        codigo_barra: codigo_barra.to_string(),
                    })
                }
            };

            // 2. Lock and read the product's active lots in FEFO order.
            // The lock must cover every candidate row before availability
            // is summed; ties on expiry break by id for deterministic order.
            let lotes_query = r#"
                SELECT id, cantidad
                FROM lotes WITH (UPDLOCK, ROWLOCK)
                WHERE producto_id = @P1 AND cantidad > 0
                ORDER BY fecha_vencimiento ASC, id ASC
            "#;

            let rows = client
                .query(lotes_query, &[&producto_id])
                .await
                .map_err(|e| StockError::DatabaseError(format!("Failed to lock lot rows: {e}")))?
                .into_first_result()
                .await
                .map_err(|e| StockError::DatabaseError(e.to_string()))?;

            let lotes: Vec<LoteSaldo> = rows
                .iter()
                .map(|row| LoteSaldo {
                    id: row.get::<i32, _>("id").unwrap_or(0),
                    cantidad: row.get::<i64, _>("cantidad").unwrap_or(0),
                })
                .collect();

            // 3. Plan the greedy draw; fails whole on insufficient stock
            let plan = plan_fefo(&lotes, cantidad_solicitada)?;

            let now = deposito_now().naive_local();

            // 4. Apply the plan: decrement each lot and append one movement
            // per lot touched, in FEFO order
            for descuento in &plan {
                client
                    .execute(
                        "UPDATE lotes SET cantidad = @P1 WHERE id = @P2",
                        &[&descuento.saldo_restante, &descuento.lote_id],
                    )
                    .await
                    .map_err(|e| {
                        StockError::TransactionError(format!("Failed to update lot balance: {e}"))
                    })?;

                client
                    .execute(
                        r#"
                        INSERT INTO movimientos_stock
                            (tipo, producto_id, lote_id, cantidad, origen, observacion, fecha)
                        VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7)
                        "#,
                        &[
                            &constants::TIPO_MOVIMIENTO_SALIDA,
                            &producto_id,
                            &descuento.lote_id,
                            &descuento.cantidad,
                            &origen,
                            &observacion,
                            &now,
                        ],
                    )
                    .await
                    .map_err(|e| {
                        StockError::TransactionError(format!("Failed to record movement: {e}"))
                    })?;
            }

            Ok(plan.len())
        }
        .await;

        let outcome = match transaction_result {
            Ok(lotes_afectados) => {
                client.simple_query("COMMIT").await.map_err(|e| {
                    StockError::DatabaseError(format!("Failed to commit transaction: {e}"))
                })?;
                Ok(lotes_afectados)
            }
            Err(e) => {
                // Any failure rolls the whole depletion back; no partially
                // deducted lots are ever committed
                let _ = client.simple_query("ROLLBACK").await;
                Err(e)
            }
        };

        // The isolation level is session-scoped and the connection goes back
        // to the pool; restore the server default so later queries on this
        // connection do not inherit REPEATABLE READ
        let _ = client
            .simple_query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
            .await;

        outcome
    }

    /// Insert a validated batch of new lots as one atomic transaction.
    /// Intake writes no movement rows; the initial quantity lives entirely
    /// in the lot's own balance.
    pub async fn insert_lotes_batch(&self, lotes: &[NuevoLote]) -> Result<usize, StockError> {
        let mut client = self
            .db
            .get_client()
            .await
            .map_err(|e| StockError::DatabaseError(e.to_string()))?;

        client
            .simple_query("BEGIN TRANSACTION")
            .await
            .map_err(|e| StockError::DatabaseError(format!("Failed to begin transaction: {e}")))?;

        let transaction_result: Result<usize, StockError> = async {
            let now = deposito_now().naive_local();

            for lote in lotes {
                client
                    .execute(
                        r#"
                        INSERT INTO lotes (producto_id, fecha_vencimiento, cantidad, fecha_alta)
                        VALUES (@P1, @P2, @P3, @P4)
                        "#,
                        &[
                            &lote.producto_id,
                            &lote.fecha_vencimiento,
                            &lote.cantidad,
                            &now,
                        ],
                    )
                    .await
                    .map_err(|e| {
                        StockError::TransactionError(format!("Failed to insert lot: {e}"))
                    })?;
            }

            Ok(lotes.len())
        }
        .await;

        match transaction_result {
            Ok(insertados) => {
                client.simple_query("COMMIT").await.map_err(|e| {
                    StockError::DatabaseError(format!("Failed to commit transaction: {e}"))
                })?;
                Ok(insertados)
            }
            Err(e) => {
                let _ = client.simple_query("ROLLBACK").await;
                Err(e)
            }
        }
    }

    /// All lots joined with product metadata, soonest expiry first
    pub async fn get_lotes(&self) -> Result<Vec<LoteConProducto>, StockError> {
        let query = r#"
            SELECT
                l.id, l.producto_id, l.fecha_vencimiento, l.cantidad, l.fecha_alta,
                p.nombre AS producto_nombre, p.codigo_barra
            FROM lotes l WITH (NOLOCK)
            JOIN productos p WITH (NOLOCK) ON p.id = l.producto_id
            ORDER BY l.fecha_vencimiento ASC, l.id ASC
        "#;

        self.query_lotes(query, &[]).await
    }

    /// Active lots only (positive balance), soonest expiry first
    pub async fn get_lotes_activos(&self) -> Result<Vec<LoteConProducto>, StockError> {
        let query = r#"
            SELECT
                l.id, l.producto_id, l.fecha_vencimiento, l.cantidad, l.fecha_alta,
                p.nombre AS producto_nombre, p.codigo_barra
            FROM lotes l WITH (NOLOCK)
            JOIN productos p WITH (NOLOCK) ON p.id = l.producto_id
            WHERE l.cantidad > 0
            ORDER BY l.fecha_vencimiento ASC, l.id ASC
        "#;

        self.query_lotes(query, &[]).await
    }

    /// Active lots already expired as of the given date, for write-off review
    pub async fn get_lotes_vencidos(
        &self,
        asof: NaiveDate,
    ) -> Result<Vec<LoteConProducto>, StockError> {
        let query = r#"
            SELECT
                l.id, l.producto_id, l.fecha_vencimiento, l.cantidad, l.fecha_alta,
                p.nombre AS producto_nombre, p.codigo_barra
            FROM lotes l WITH (NOLOCK)
            JOIN productos p WITH (NOLOCK) ON p.id = l.producto_id
            WHERE l.cantidad > 0
              AND l.fecha_vencimiento < @P1
            ORDER BY l.fecha_vencimiento ASC, l.id ASC
        "#;

        self.query_lotes(query, &[&asof]).await
    }

    /// Active lots of one product in allocation order, used by callers to
    /// preview what a depletion would consume
    pub async fn get_lotes_by_producto(
        &self,
        producto_id: i32,
    ) -> Result<Vec<LoteConProducto>, StockError> {
        let query = r#"
            SELECT
                l.id, l.producto_id, l.fecha_vencimiento, l.cantidad, l.fecha_alta,
                p.nombre AS producto_nombre, p.codigo_barra
            FROM lotes l WITH (NOLOCK)
            JOIN productos p WITH (NOLOCK) ON p.id = l.producto_id
            WHERE l.producto_id = @P1 AND l.cantidad > 0
            ORDER BY l.fecha_vencimiento ASC, l.id ASC
        "#;

        self.query_lotes(query, &[&producto_id]).await
    }

    async fn query_lotes(
        &self,
        query: &str,
        params: &[&dyn tiberius::ToSql],
    ) -> Result<Vec<LoteConProducto>, StockError> {
        let mut client = self
            .db
            .get_client()
            .await
            .map_err(|e| StockError::DatabaseError(e.to_string()))?;

        let rows = client
            .query(query, params)
            .await
            .map_err(|e| StockError::DatabaseError(e.to_string()))?
            .into_first_result()
            .await
            .map_err(|e| StockError::DatabaseError(e.to_string()))?;

        Ok(rows.iter().map(Self::map_lote_row).collect())
    }

    /// All products ordered by name
    pub async fn get_productos(&self) -> Result<Vec<Producto>, StockError> {
        let mut client = self
            .db
            .get_client()
            .await
            .map_err(|e| StockError::DatabaseError(e.to_string()))?;

        let query = r#"
            SELECT id, codigo_barra, nombre, descripcion
            FROM productos WITH (NOLOCK)
            ORDER BY nombre
        "#;

        let rows = client
            .query(query, &[])
            .await
            .map_err(|e| StockError::DatabaseError(e.to_string()))?
            .into_first_result()
            .await
            .map_err(|e| StockError::DatabaseError(e.to_string()))?;

        Ok(rows.iter().map(Self::map_producto_row).collect())
    }

    /// Look up one product by its barcode
    pub async fn find_producto_by_codigo(
        &self,
        codigo_barra: &str,
    ) -> Result<Option<Producto>, StockError> {
        let mut client = self
            .db
            .get_client()
            .await
            .map_err(|e| StockError::DatabaseError(e.to_string()))?;

        let query = r#"
            SELECT id, codigo_barra, nombre, descripcion
            FROM productos WITH (NOLOCK)
            WHERE codigo_barra = @P1
        "#;

        let row = client
            .query(query, &[&codigo_barra])
            .await
            .map_err(|e| StockError::DatabaseError(e.to_string()))?
            .into_row()
            .await
            .map_err(|e| StockError::DatabaseError(e.to_string()))?;

        Ok(row.as_ref().map(Self::map_producto_row))
    }

    /// Register a new product; barcode must be unique
    pub async fn create_producto(
        &self,
        codigo_barra: &str,
        nombre: &str,
        descripcion: Option<&str>,
    ) -> Result<Producto, StockError> {
        let mut client = self
            .db
            .get_client()
            .await
            .map_err(|e| StockError::DatabaseError(e.to_string()))?;

        let existing = client
            .query(
                "SELECT id FROM productos WHERE codigo_barra = @P1",
                &[&codigo_barra],
            )
            .await
            .map_err(|e| StockError::DatabaseError(e.to_string()))?
            .into_row()
            .await
            .map_err(|e| StockError::DatabaseError(e.to_string()))?;

        if existing.is_some() {
            return Err(StockError::DuplicateBarcode {
                codigo_barra: codigo_barra.to_string(),
            });
        }

        let insert_query = r#"
            INSERT INTO productos (codigo_barra, nombre, descripcion)
            OUTPUT INSERTED.id
            VALUES (@P1, @P2, @P3)
        "#;

        // The pre-check above is racy: a concurrent registration of the same
        // barcode can slip between the SELECT and this INSERT, in which case
        // the UNIQUE constraint fires and must surface as the same conflict
        let row = client
            .query(insert_query, &[&codigo_barra, &nombre, &descripcion])
            .await
            .map_err(|e| match &e {
                tiberius::error::Error::Server(te) if is_unique_violation(te.code()) => {
                    StockError::DuplicateBarcode {
                        codigo_barra: codigo_barra.to_string(),
                    }
                }
                _ => StockError::DatabaseError(format!("Failed to insert product: {e}")),
            })?
            .into_row()
            .await
            .map_err(|e| StockError::DatabaseError(e.to_string()))?
            .ok_or_else(|| {
                StockError::DatabaseError("Product insert returned no id".to_string())
            })?;

        Ok(Producto {
            id: row.get("id").unwrap_or(0),
            codigo_barra: codigo_barra.to_string(),
            nombre: nombre.to_string(),
            descripcion: descripcion.map(|s| s.to_string()),
        })
    }

    /// Text search over barcode and name, capped result set
    pub async fn search_productos(&self, term: &str) -> Result<Vec<Producto>, StockError> {
        let mut client = self
            .db
            .get_client()
            .await
            .map_err(|e| StockError::DatabaseError(e.to_string()))?;

        let query = r#"
            SELECT id, codigo_barra, nombre, descripcion
            FROM productos WITH (NOLOCK)
            WHERE codigo_barra LIKE @P1 OR nombre LIKE @P1
            ORDER BY nombre
            OFFSET 0 ROWS FETCH NEXT @P2 ROWS ONLY
        "#;

        let pattern = format!("%{term}%");
        let rows = client
            .query(query, &[&pattern, &constants::MAX_SEARCH_RESULTS])
            .await
            .map_err(|e| StockError::DatabaseError(e.to_string()))?
            .into_first_result()
            .await
            .map_err(|e| StockError::DatabaseError(e.to_string()))?;

        Ok(rows.iter().map(Self::map_producto_row).collect())
    }

    /// Update name and description of the product with the given barcode
    pub async fn update_producto_by_codigo(
        &self,
        codigo_barra: &str,
        nombre: &str,
        descripcion: Option<&str>,
    ) -> Result<Producto, StockError> {
        let mut client = self
            .db
            .get_client()
            .await
            .map_err(|e| StockError::DatabaseError(e.to_string()))?;

        // Update first; rows_affected distinguishes a missing product
        // without a separate existence check
        let result = client
            .execute(
                "UPDATE productos SET nombre = @P1, descripcion = @P2 WHERE codigo_barra = @P3",
                &[&nombre, &descripcion, &codigo_barra],
            )
            .await
            .map_err(|e| StockError::DatabaseError(format!("Failed to update product: {e}")))?;

        if result.rows_affected().iter().copied().sum::<u64>() == 0 {
            return Err(StockError::ProductoNotFound {
                codigo_barra: codigo_barra.to_string(),
            });
        }

        let row = client
            .query(
                "SELECT id FROM productos WHERE codigo_barra = @P1",
                &[&codigo_barra],
            )
            .await
            .map_err(|e| StockError::DatabaseError(e.to_string()))?
            .into_row()
            .await
            .map_err(|e| StockError::DatabaseError(e.to_string()))?
            .ok_or_else(|| {
                StockError::DatabaseError("Updated product row not found".to_string())
            })?;

        Ok(Producto {
            id: row.get("id").unwrap_or(0),
            codigo_barra: codigo_barra.to_string(),
            nombre: nombre.to_string(),
            descripcion: descripcion.map(|s| s.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_maps_only_duplicate_key_error_numbers() {
        assert!(is_unique_violation(2627)); // UNIQUE constraint
        assert!(is_unique_violation(2601)); // unique index
        assert!(!is_unique_violation(547)); // foreign key
        assert!(!is_unique_violation(1205)); // deadlock victim
        assert!(!is_unique_violation(0));
    }

    // The tests below need a live SQL Server with the schema from
    // sql/schema.sql and DATABASE_* environment variables set.
    // Run serially: `cargo test -- --ignored --test-threads=1`

    async fn test_database() -> Option<Database> {
        dotenv::dotenv().ok();
        if std::env::var("DATABASE_SERVER").is_err() {
            return None;
        }
        Some(Database::new().await.expect("database pool"))
    }

    fn unique_codigo(prefix: &str) -> String {
        format!(
            "{prefix}-{}",
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        )
    }

    #[tokio::test]
    #[ignore]
    async fn concurrent_salidas_never_overdraw_a_lot() {
        let Some(database) = test_database().await else {
            return;
        };
        let stock = StockDatabase::new(database);

        // One product, one lot holding 10 units
        let codigo = unique_codigo("CONC");
        let producto = stock
            .create_producto(&codigo, "Prueba de salidas concurrentes", None)
            .await
            .unwrap();
        stock
            .insert_lotes_batch(&[NuevoLote {
                producto_id: producto.id,
                fecha_vencimiento: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
                cantidad: 10,
            }])
            .await
            .unwrap();

        // Two overlapping depletions of 6 units each; combined demand
        // exceeds the balance, so at most one may commit
        let (a, b) = tokio::join!(
            stock.execute_salida_transaction(&codigo, 6, "DEPOSITO", "salida concurrente"),
            stock.execute_salida_transaction(&codigo, 6, "DEPOSITO", "salida concurrente"),
        );

        let exitos = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(exitos, 1, "exactly one salida may commit: {a:?} / {b:?}");
        for resultado in [&a, &b] {
            if let Err(e) = resultado {
                assert!(
                    matches!(e, StockError::InsufficientStock { available: 4, requested: 6 }),
                    "loser must see the post-commit balance, got {e:?}"
                );
            }
        }

        // Conservation: committed movements plus the remaining balance
        // equal the intake quantity, and the balance never goes negative
        let mut client = stock.db.get_client().await.unwrap();
        let row = client
            .query(
                r#"
                SELECT l.cantidad AS saldo,
                       (SELECT ISNULL(SUM(m.cantidad), 0)
                        FROM movimientos_stock m
                        WHERE m.lote_id = l.id) AS salidas
                FROM lotes l
                WHERE l.producto_id = @P1
                "#,
                &[&producto.id],
            )
            .await
            .unwrap()
            .into_row()
            .await
            .unwrap()
            .expect("lot row");

        let saldo: i64 = row.get("saldo").unwrap_or(-1);
        let salidas: i64 = row.get("salidas").unwrap_or(-1);
        assert!(saldo >= 0);
        assert_eq!(salidas, 6);
        assert_eq!(saldo + salidas, 10);
    }

    #[tokio::test]
    #[ignore]
    async fn salida_leaves_pooled_session_at_read_committed() {
        // Pin the pool to one connection so the session the depletion ran
        // on is the one handed back afterwards
        std::env::set_var("DATABASE_MAX_CONNECTIONS", "1");
        std::env::set_var("DATABASE_MIN_CONNECTIONS", "1");
        let Some(database) = test_database().await else {
            return;
        };
        let stock = StockDatabase::new(database);

        let codigo = unique_codigo("ISO");
        let producto = stock
            .create_producto(&codigo, "Prueba de nivel de aislamiento", None)
            .await
            .unwrap();
        stock
            .insert_lotes_batch(&[NuevoLote {
                producto_id: producto.id,
                fecha_vencimiento: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
                cantidad: 5,
            }])
            .await
            .unwrap();

        stock
            .execute_salida_transaction(&codigo, 2, "DEPOSITO", "salida de prueba")
            .await
            .unwrap();

        // 2 = READ COMMITTED in sys.dm_exec_sessions
        let mut client = stock.db.get_client().await.unwrap();
        let row = client
            .query(
                "SELECT transaction_isolation_level AS nivel FROM sys.dm_exec_sessions WHERE session_id = @@SPID",
                &[],
            )
            .await
            .unwrap()
            .into_row()
            .await
            .unwrap()
            .expect("session row");

        let nivel: i16 = row.get("nivel").unwrap_or(-1);
        assert_eq!(nivel, 2);
    }
}
