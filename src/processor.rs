use crate::{
    detect::{self, OrderTable, SettlementTable},
    errors::ReconError,
    models::{JoinKey, OrderVariant, Row, STATUS_COLUMN, SettlementSource, Status, Table},
    summary::Summary,
};
use anyhow::Result;
use getset::Getters;
use std::collections::HashSet;
use tracing::info;

/// Outcome of reconciling one order table against one settlement table.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct Reconciliation {
    #[getset(get = "pub")]
    variant: OrderVariant,
    #[getset(get = "pub")]
    source: SettlementSource,
    /// Order rows with the status column appended.
    #[getset(get = "pub")]
    result: Table,
    /// Settlement rows as classified, unfiltered.
    #[getset(get = "pub")]
    settlements: Table,
    #[getset(get = "pub")]
    summary: Summary,
}

/// Runs detection, key sanitization and matching over two loaded tables.
///
/// # Arguments
/// * `orders` - The unioned INSALÉS export.
/// * `settlements` - The unioned settlement export.
///
/// # Returns
/// The reconciliation, or an error when either side has no usable key column.
pub fn reconcile(orders: Table, settlements: Table) -> Result<Reconciliation> {
    let orders = detect::detect_order_schema(orders);
    let settlements = detect::detect_settlement_source(settlements);
    info!(
        variant = %orders.variant(),
        source = %settlements.source(),
        "input formats detected"
    );

    let (variant, order_key, mut orders) = split_orders(orders)?;
    let (source, settlement_key, mut settlements) = split_settlements(settlements)?;

    let order_keys = sanitize_keys(&mut orders, &order_key, "insales")?;
    let settlement_keys = sanitize_keys(&mut settlements, &settlement_key, "liquidaciones")?;

    let result = match_orders(orders, &order_keys, &settlement_keys);
    let summary = Summary::from_result(&result);
    info!(
        total = summary.total(),
        matched = summary.matched(),
        unmatched = summary.unmatched(),
        "reconciliation finished"
    );

    Ok(Reconciliation {
        variant,
        source,
        result,
        settlements,
        summary,
    })
}

fn split_orders(orders: OrderTable) -> Result<(OrderVariant, String, Table)> {
    let variant = *orders.variant();
    let key = orders.key_column().clone().ok_or(ReconError::NoOrderKey)?;
    Ok((variant, key, orders.into_table()))
}

fn split_settlements(settlements: SettlementTable) -> Result<(SettlementSource, String, Table)> {
    let source = *settlements.source();
    let key = settlements
        .key_column()
        .clone()
        .ok_or(ReconError::NoSettlementKey)?;
    if !settlements.table().has_column(&key) {
        return Err(ReconError::MissingColumn {
            table: "liquidaciones",
            column: key,
        })?;
    }
    Ok((source, key, settlements.into_table()))
}

/// Trims the key column in place, nulls stringified nulls, and returns the
/// canonical keys row by row.
pub fn sanitize_keys(
    table: &mut Table,
    column: &str,
    table_name: &'static str,
) -> Result<Vec<Option<JoinKey>>> {
    let keys: Vec<Option<JoinKey>> = table
        .column(column)
        .ok_or_else(|| ReconError::MissingColumn {
            table: table_name,
            column: column.to_string(),
        })?
        .into_iter()
        .map(JoinKey::parse)
        .collect();

    let cleaned = keys
        .iter()
        .map(|key| key.as_ref().map(|k| k.as_str().to_string()))
        .collect();
    table.set_column(column, cleaned);

    Ok(keys)
}

/// Left-outer join of orders against the distinct settlement keys.
///
/// Orders with a key come first in their original order, followed by the
/// orders without one, which are always unmatched. The output has exactly as
/// many rows as `orders`.
pub fn match_orders(
    orders: Table,
    order_keys: &[Option<JoinKey>],
    settlement_keys: &[Option<JoinKey>],
) -> Table {
    debug_assert_eq!(orders.len(), order_keys.len());
    let known: HashSet<&JoinKey> = settlement_keys.iter().flatten().collect();

    let (mut columns, rows) = orders.into_parts();
    columns.push(STATUS_COLUMN.to_string());

    let mut keyed: Vec<Row> = Vec::with_capacity(rows.len());
    let mut keyless: Vec<Row> = Vec::new();
    for (mut row, key) in rows.into_iter().zip(order_keys) {
        match key {
            Some(key) => {
                let status = if known.contains(key) {
                    Status::Matched
                } else {
                    Status::Unmatched
                };
                row.push(Some(status.label().to_string()));
                keyed.push(row);
            }
            None => {
                row.push(Some(Status::Unmatched.label().to_string()));
                keyless.push(row);
            }
        }
    }

    keyed.append(&mut keyless);
    Table::from_rows(columns, keyed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        detect::YUNO_KEY_COLUMN,
        models::{SOURCE_COLUMN, VARIANT_COLUMN},
    };
    use proptest::prelude::*;

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        Table::from_rows(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|row| {
                    row.iter()
                        .map(|v| if v.is_empty() { None } else { Some(v.to_string()) })
                        .collect()
                })
                .collect(),
        )
    }

    fn keys(values: &[Option<&str>]) -> Vec<Option<JoinKey>> {
        values.iter().map(|v| JoinKey::parse(*v)).collect()
    }

    fn statuses(result: &Table) -> Vec<String> {
        result
            .column(STATUS_COLUMN)
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_duplicate_settlement_keys_do_not_duplicate_orders() {
        let orders = table(&["id"], &[&["A"], &["B"], &[""]]);
        let result = match_orders(
            orders,
            &keys(&[Some("A"), Some("B"), None]),
            &keys(&[Some("A"), Some("A"), Some("C")]),
        );

        assert_eq!(result.len(), 3);
        assert_eq!(statuses(&result), vec!["OK", "No Encontrado", "No Encontrado"]);
        assert_eq!(result.column("id"), Some(vec![Some("A"), Some("B"), None]));
    }

    #[test]
    fn test_keyless_orders_move_to_the_end() {
        let orders = table(&["id"], &[&[""], &["A"], &["nan"], &["B"]]);
        let result = match_orders(
            orders,
            &keys(&[None, Some("A"), Some("nan"), Some("B")]),
            &keys(&[Some("B"), None]),
        );

        assert_eq!(result.column("id"), Some(vec![Some("A"), Some("B"), None, Some("nan")]));
        assert_eq!(
            statuses(&result),
            vec!["No Encontrado", "OK", "No Encontrado", "No Encontrado"]
        );
        assert_eq!(result.columns().last().map(String::as_str), Some(STATUS_COLUMN));
    }

    #[test]
    fn test_keyless_orders_never_match_null_settlements() {
        let orders = table(&["id"], &[&[""], &["None"]]);
        let result = match_orders(orders, &keys(&[None, Some("None")]), &keys(&[None, Some("")]));
        assert_eq!(statuses(&result), vec!["No Encontrado", "No Encontrado"]);
    }

    #[test]
    fn test_sanitize_keys_rewrites_column() -> Result<()> {
        let mut orders = table(&["id"], &[&["  A "], &["nan"], &["None"], &["  nan  "], &[""]]);
        let sanitized = sanitize_keys(&mut orders, "id", "insales")?;

        assert_eq!(sanitized, keys(&[Some("A"), None, None, None, None]));
        assert_eq!(orders.column("id"), Some(vec![Some("A"), None, None, None, None]));
        Ok(())
    }

    #[test]
    fn test_sanitize_keys_missing_column() {
        let mut orders = table(&["id"], &[]);
        let err = sanitize_keys(&mut orders, "other", "insales").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReconError>(),
            Some(ReconError::MissingColumn { column, .. }) if column == "other"
        ));
    }

    #[test]
    fn test_reconcile_yuno_against_intermedio() -> Result<()> {
        let orders = table(
            &["ID Pedido", "Local", "Total"],
            &[&["100", "Centro", "10"], &["", "Norte", "5"], &["200 ", "Sur", "7"], &["300", "Sur", "1"]],
        );
        let settlements = table(
            &["merchant_order_id", "transaction_id"],
            &[&["YUNO-100", "T-1"], &["", "TX-200"], &["YUNO-100", "T-3"], &["", ""]],
        );

        let reconciliation = reconcile(orders, settlements)?;

        assert_eq!(*reconciliation.variant(), OrderVariant::Intermedio);
        assert_eq!(*reconciliation.source(), SettlementSource::Yuno);

        let result = reconciliation.result();
        assert_eq!(result.len(), 4);
        assert_eq!(
            result.column("id pedido"),
            Some(vec![Some("100"), Some("200"), Some("300"), None])
        );
        assert_eq!(statuses(result), vec!["OK", "OK", "No Encontrado", "No Encontrado"]);
        assert!(result.has_column("restaurante"));
        assert!(result.has_column(VARIANT_COLUMN));

        let settlements = reconciliation.settlements();
        assert_eq!(settlements.len(), 4);
        assert!(settlements.has_column(SOURCE_COLUMN));
        assert_eq!(
            settlements.column(YUNO_KEY_COLUMN),
            Some(vec![Some("100"), Some("200"), Some("100"), None])
        );

        assert_eq!(*reconciliation.summary().total(), 4);
        assert_eq!(*reconciliation.summary().matched(), 2);
        Ok(())
    }

    #[test]
    fn test_reconcile_nubceo() -> Result<()> {
        let orders = table(&["ID de Orden (Partner)"], &[&["R1"], &["R2"]]);
        let settlements = table(&["Sucursal/Comercio", "Referencia"], &[&["X", " R2 "]]);

        let reconciliation = reconcile(orders, settlements)?;

        assert_eq!(*reconciliation.variant(), OrderVariant::DigitalFlex);
        assert_eq!(*reconciliation.source(), SettlementSource::Nubceo);
        assert_eq!(statuses(reconciliation.result()), vec!["No Encontrado", "OK"]);
        Ok(())
    }

    #[test]
    fn test_reconcile_preserves_row_count() -> Result<()> {
        let orders = table(
            &["id pedido"],
            &[&["1"], &["1"], &[""], &["2"], &["None"], &["3"], &["1"]],
        );
        let settlements = table(&["merchant_order_id"], &[&["a-1"], &["a-1"], &["b-2"], &["c-2"]]);

        let reconciliation = reconcile(orders, settlements)?;

        assert_eq!(reconciliation.result().len(), 7);
        assert_eq!(*reconciliation.summary().matched(), 4);
        Ok(())
    }

    #[test]
    fn test_reconcile_unknown_order_schema_fails() {
        let orders = table(&["fecha"], &[&["1"]]);
        let settlements = table(&["merchant_order_id"], &[&["a-1"]]);
        let err = reconcile(orders, settlements).unwrap_err();
        assert!(matches!(err.downcast_ref::<ReconError>(), Some(ReconError::NoOrderKey)));
    }

    #[test]
    fn test_reconcile_unknown_source_fails() {
        let orders = table(&["id pedido"], &[&["1"]]);
        let settlements = table(&["monto"], &[&["1"]]);
        let err = reconcile(orders, settlements).unwrap_err();
        assert!(matches!(err.downcast_ref::<ReconError>(), Some(ReconError::NoSettlementKey)));
    }

    #[test]
    fn test_reconcile_nubceo_without_referencia_fails() {
        let orders = table(&["id pedido"], &[&["1"]]);
        let settlements = table(&["liquidacion - referencia"], &[&["1"]]);
        let err = reconcile(orders, settlements).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReconError>(),
            Some(ReconError::MissingColumn { table: "liquidaciones", column }) if column == "referencia"
        ));
    }

    #[test]
    fn test_reconcile_merges_colliding_headers_past_blank_cells() -> Result<()> {
        let orders = table(&["ID Pedido", "id pedido"], &[&["  ", "3"], &["4", ""]]);
        let settlements = table(&["merchant_order_id"], &[&["x-3"], &["y-4"]]);

        let reconciliation = reconcile(orders, settlements)?;

        let result = reconciliation.result();
        assert_eq!(result.column("id pedido"), Some(vec![Some("3"), Some("4")]));
        assert_eq!(statuses(result), vec!["OK", "OK"]);
        Ok(())
    }

    /// Key cells as exports carry them: padded, duplicated, blank or a stringified null.
    fn arb_key_cell() -> impl Strategy<Value = String> {
        prop_oneof![
            4 => r"[A-D]{1,2}",
            2 => r" {1,2}[A-D] {0,2}",
            1 => Just("".to_string()),
            1 => Just("  ".to_string()),
            1 => Just("nan".to_string()),
            1 => Just("None".to_string()),
        ]
    }

    fn key_column(name: &str, cells: &[String]) -> Table {
        Table::from_rows(
            vec![name.to_string()],
            cells
                .iter()
                .map(|v| vec![if v.is_empty() { None } else { Some(v.clone()) }])
                .collect(),
        )
    }

    fn expected_key(cell: &str) -> Option<String> {
        let trimmed = cell.trim();
        (!["", "nan", "None"].contains(&trimmed)).then(|| trimmed.to_string())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn test_match_orders_keeps_every_order(
            orders in proptest::collection::vec(arb_key_cell(), 0..40),
            settlements in proptest::collection::vec(arb_key_cell(), 0..40),
        ) {
            let order_keys: Vec<Option<JoinKey>> =
                orders.iter().map(|v| JoinKey::parse(Some(v))).collect();
            let settlement_keys: Vec<Option<JoinKey>> =
                settlements.iter().map(|v| JoinKey::parse(Some(v))).collect();
            let known: HashSet<&JoinKey> = settlement_keys.iter().flatten().collect();
            let keyed = order_keys.iter().flatten().count();
            let matched = order_keys.iter().flatten().filter(|k| known.contains(k)).count();

            let result = match_orders(key_column("id", &orders), &order_keys, &settlement_keys);
            let statuses = statuses(&result);

            prop_assert_eq!(result.len(), orders.len());
            prop_assert_eq!(statuses.iter().filter(|s| *s == "OK").count(), matched);
            prop_assert!(statuses[keyed..].iter().all(|s| s == "No Encontrado"));
        }

        #[test]
        fn test_reconcile_marks_exactly_the_settled_orders(
            orders in proptest::collection::vec(arb_key_cell(), 0..40),
            settlements in proptest::collection::vec(arb_key_cell(), 0..40),
        ) {
            let mut settlement_table = key_column("Referencia", &settlements);
            settlement_table.fill_column("Sucursal/Comercio", "Centro");
            let known: HashSet<String> =
                settlements.iter().filter_map(|v| expected_key(v)).collect();
            let matched = orders
                .iter()
                .filter_map(|v| expected_key(v))
                .filter(|k| known.contains(k))
                .count();

            let Ok(reconciliation) = reconcile(key_column("id pedido", &orders), settlement_table)
            else {
                return Err(TestCaseError::fail("reconcile rejected a well-formed input"));
            };
            let result = reconciliation.result();
            let summary = reconciliation.summary();

            prop_assert_eq!(result.len(), orders.len());
            prop_assert_eq!(*summary.total(), orders.len());
            prop_assert_eq!(*summary.matched(), matched);
            prop_assert_eq!(summary.matched() + summary.unmatched(), orders.len());

            let ids = result.column("id pedido").unwrap_or_default();
            for (id, status) in ids.into_iter().zip(statuses(result)) {
                let settled = id.is_some_and(|k| known.contains(k));
                prop_assert_eq!(status == "OK", settled);
            }
        }
    }
}
