//! Header-based classification of order and settlement tables.
//!
//! Both detectors normalize the headers, then walk an ordered rule list and
//! stop at the first rule whose marker header is present. Classification
//! looks at the unioned column set once; a directory mixing files of
//! different layouts is classified as a whole.

use getset::Getters;
use tracing::debug;

use crate::{
    models::{OrderVariant, SOURCE_COLUMN, SettlementSource, Table, VARIANT_COLUMN},
    normalize::normalize,
};

pub const LOCAL_COLUMN: &str = "local";
pub const RESTAURANT_COLUMN: &str = "restaurante";

pub const MERCHANT_ORDER_COLUMN: &str = "merchant_order_id";
pub const TRANSACTION_COLUMN: &str = "transaction_id";
pub const YUNO_KEY_COLUMN: &str = "merchant_order_id_real";
pub const NUBCEO_KEY_COLUMN: &str = "referencia";

struct OrderRule {
    header: &'static str,
    variant: OrderVariant,
}

/// Priority order matters: exports carrying several id headers take the first.
const ORDER_RULES: &[OrderRule] = &[
    OrderRule {
        header: "id orden especial de venta",
        variant: OrderVariant::VentasFlex,
    },
    OrderRule {
        header: "id pedido",
        variant: OrderVariant::Intermedio,
    },
    OrderRule {
        header: "id de orden (partner)",
        variant: OrderVariant::DigitalFlex,
    },
];

struct SettlementRule {
    markers: &'static [&'static str],
    source: SettlementSource,
    key: fn(&mut Table) -> String,
}

const SETTLEMENT_RULES: &[SettlementRule] = &[
    SettlementRule {
        markers: &[MERCHANT_ORDER_COLUMN],
        source: SettlementSource::Yuno,
        key: derive_yuno_key,
    },
    SettlementRule {
        markers: &["liquidacion - referencia", "sucursal/comercio"],
        source: SettlementSource::Nubceo,
        key: nubceo_key,
    },
];

#[derive(Debug, Clone, PartialEq, Getters)]
pub struct OrderTable {
    #[getset(get = "pub")]
    table: Table,
    #[getset(get = "pub")]
    variant: OrderVariant,
    #[getset(get = "pub")]
    key_column: Option<String>,
}

impl OrderTable {
    pub fn into_table(self) -> Table {
        self.table
    }
}

#[derive(Debug, Clone, PartialEq, Getters)]
pub struct SettlementTable {
    #[getset(get = "pub")]
    table: Table,
    #[getset(get = "pub")]
    source: SettlementSource,
    #[getset(get = "pub")]
    key_column: Option<String>,
}

impl SettlementTable {
    pub fn into_table(self) -> Table {
        self.table
    }
}

/// Classifies an INSALÉS export and picks its join-key column.
///
/// An `Unknown` variant comes back with no key column; the caller decides
/// whether that is fatal.
pub fn detect_order_schema(mut table: Table) -> OrderTable {
    table.rename_headers(normalize);

    let (variant, key_column) = ORDER_RULES
        .iter()
        .find(|rule| table.has_column(rule.header))
        .map_or((OrderVariant::Unknown, None), |rule| {
            (rule.variant, Some(rule.header.to_string()))
        });

    if table.has_column(LOCAL_COLUMN) && !table.has_column(RESTAURANT_COLUMN) {
        table.rename_column(LOCAL_COLUMN, RESTAURANT_COLUMN);
    }

    table.fill_column(VARIANT_COLUMN, variant.label());
    debug!(%variant, key = ?key_column, "order schema detected");

    OrderTable {
        table,
        variant,
        key_column,
    }
}

/// Classifies a settlement export by processor and prepares its key column.
pub fn detect_settlement_source(mut table: Table) -> SettlementTable {
    table.rename_headers(normalize);

    let rule = SETTLEMENT_RULES
        .iter()
        .find(|rule| rule.markers.iter().any(|m| table.has_column(m)));

    let (source, key_column) = match rule {
        Some(rule) => (rule.source, Some((rule.key)(&mut table))),
        None => (SettlementSource::Unknown, None),
    };

    table.fill_column(SOURCE_COLUMN, source.label());
    debug!(%source, key = ?key_column, "settlement source detected");

    SettlementTable {
        table,
        source,
        key_column,
    }
}

/// Processor ids look like `<prefix>-<order id>`; only the part after the
/// first dash is comparable with INSALÉS ids.
fn trailing_segment(raw: &str) -> &str {
    raw.split_once('-').map_or(raw, |(_, rest)| rest).trim()
}

fn derive_yuno_key(table: &mut Table) -> String {
    let merchant = table.column_index(MERCHANT_ORDER_COLUMN);
    let transaction = table.column_index(TRANSACTION_COLUMN);

    let derived: Vec<Option<String>> = (0..table.len())
        .map(|row| {
            let from_merchant = merchant
                .and_then(|col| table.value(row, col))
                .map(trailing_segment)
                .filter(|id| !id.is_empty());
            match (from_merchant, transaction) {
                (Some(id), _) => Some(id.to_string()),
                (None, Some(col)) => table.value(row, col).map(|v| trailing_segment(v).to_string()),
                (None, None) => None,
            }
        })
        .collect();

    table.set_column(YUNO_KEY_COLUMN, derived);
    YUNO_KEY_COLUMN.to_string()
}

/// NUBCEO exports carry the key as-is; its presence is checked by the pipeline.
fn nubceo_key(_: &mut Table) -> String {
    NUBCEO_KEY_COLUMN.to_string()
}
