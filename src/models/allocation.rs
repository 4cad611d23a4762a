use crate::models::stock_models::StockError;

/// Balance of one active lot as read (and locked) inside the depletion
/// transaction. Callers must supply lots already ordered by ascending
/// expiry date, ties broken by id ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoteSaldo {
    pub id: i32,
    pub cantidad: i64,
}

/// One planned draw against one lot: how much leaves it and the balance
/// the lot row must be updated to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoteDescuento {
    pub lote_id: i32,
    pub cantidad: i64,
    pub saldo_restante: i64,
}

/// Greedy FEFO allocation over the ordered active lots of one product.
///
/// Walks the lots in the order given and draws `min(balance, still needed)`
/// from each until the request is covered. Fails with `InsufficientStock`
/// before planning anything when the total available balance cannot cover
/// the request, so a failed plan never produces partial draws.
pub fn plan_fefo(lotes: &[LoteSaldo], solicitado: i64) -> Result<Vec<LoteDescuento>, StockError> {
    if solicitado <= 0 {
        return Err(StockError::ValidationError(
            "La cantidad solicitada debe ser mayor a 0".to_string(),
        ));
    }

    let disponible: i64 = lotes.iter().map(|l| l.cantidad.max(0)).sum();
    if disponible < solicitado {
        return Err(StockError::InsufficientStock {
            requested: solicitado,
            available: disponible,
        });
    }

    let mut restante = solicitado;
    let mut descuentos = Vec::new();

    for lote in lotes {
        if restante <= 0 {
            break;
        }
        if lote.cantidad <= 0 {
            continue;
        }

        let desc = lote.cantidad.min(restante);
        descuentos.push(LoteDescuento {
            lote_id: lote.id,
            cantidad: desc,
            saldo_restante: lote.cantidad - desc,
        });
        restante -= desc;
    }

    Ok(descuentos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lote(id: i32, cantidad: i64) -> LoteSaldo {
        LoteSaldo { id, cantidad }
    }

    #[test]
    fn drains_oldest_lot_first_then_spills_into_next() {
        // Lot 1 expires before lot 2; drawing 7 must fully drain lot 1 (5)
        // and take 2 from lot 2, producing exactly two draws.
        let lotes = vec![lote(1, 5), lote(2, 5)];

        let plan = plan_fefo(&lotes, 7).unwrap();

        assert_eq!(
            plan,
            vec![
                LoteDescuento { lote_id: 1, cantidad: 5, saldo_restante: 0 },
                LoteDescuento { lote_id: 2, cantidad: 2, saldo_restante: 3 },
            ]
        );
    }

    #[test]
    fn exact_drain_leaves_lot_at_zero_not_negative() {
        let lotes = vec![lote(1, 5)];

        let plan = plan_fefo(&lotes, 5).unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].saldo_restante, 0);
    }

    #[test]
    fn shortfall_fails_whole_request_with_available_total() {
        let lotes = vec![lote(1, 5), lote(2, 5)];

        match plan_fefo(&lotes, 11) {
            Err(StockError::InsufficientStock { requested, available }) => {
                assert_eq!(requested, 11);
                assert_eq!(available, 10);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn zero_active_lots_behaves_as_insufficient_with_zero_available() {
        match plan_fefo(&[], 3) {
            Err(StockError::InsufficientStock { requested, available }) => {
                assert_eq!(requested, 3);
                assert_eq!(available, 0);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn non_positive_request_is_rejected_before_planning() {
        let lotes = vec![lote(1, 5)];

        assert!(matches!(
            plan_fefo(&lotes, 0),
            Err(StockError::ValidationError(_))
        ));
        assert!(matches!(
            plan_fefo(&lotes, -4),
            Err(StockError::ValidationError(_))
        ));
    }

    #[test]
    fn drained_lots_in_input_are_skipped_without_a_draw() {
        let lotes = vec![lote(1, 0), lote(2, 4)];

        let plan = plan_fefo(&lotes, 3).unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].lote_id, 2);
    }

    #[test]
    fn conservation_sum_of_draws_equals_requested() {
        let lotes = vec![lote(1, 3), lote(2, 8), lote(3, 2), lote(4, 6)];

        for solicitado in 1..=19 {
            let plan = plan_fefo(&lotes, solicitado).unwrap();
            let total: i64 = plan.iter().map(|d| d.cantidad).sum();
            assert_eq!(total, solicitado);

            // Balances never go negative and match intake minus draw
            for d in &plan {
                assert!(d.saldo_restante >= 0);
                let original = lotes.iter().find(|l| l.id == d.lote_id).unwrap();
                assert_eq!(original.cantidad - d.cantidad, d.saldo_restante);
            }
        }
    }

    #[test]
    fn stops_at_first_lot_that_covers_the_request() {
        let lotes = vec![lote(1, 10), lote(2, 10)];

        let plan = plan_fefo(&lotes, 6).unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].lote_id, 1);
        assert_eq!(plan[0].saldo_restante, 4);
    }
}
