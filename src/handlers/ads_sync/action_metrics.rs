//! Conversion funnel extraction from the Graph API action arrays
//!
//! Insight rows carry three parallel `{action_type, value}` arrays: counts in
//! `actions`, monetary totals in `action_values` and unit costs in
//! `cost_per_action_type`. Only four funnel stages are stored; every other
//! action type lands in the `unrecognized` bucket and is otherwise ignored.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::services::meta_ads::types::{ActionEntry, RawInsightDay};

/// Funnel stages persisted per entity-day
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionKind {
    ViewContent,
    AddToCart,
    InitiateCheckout,
    Purchase,
}

impl ActionKind {
    /// Exact match on the API's `action_type` string
    pub fn from_action_type(action_type: &str) -> Option<Self> {
        match action_type {
            "view_content" => Some(ActionKind::ViewContent),
            "add_to_cart" => Some(ActionKind::AddToCart),
            "initiate_checkout" => Some(ActionKind::InitiateCheckout),
            "purchase" => Some(ActionKind::Purchase),
            _ => None,
        }
    }
}

/// One action array folded into typed totals
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionTotals {
    pub recognized: BTreeMap<ActionKind, f64>,
    pub unrecognized: BTreeMap<String, f64>,
}

impl ActionTotals {
    /// Folds an optional action array; a repeated action type keeps the last value
    pub fn from_entries(entries: Option<&[ActionEntry]>) -> Self {
        let mut totals = ActionTotals::default();
        for entry in entries.unwrap_or_default() {
            let value = parse_metric_f64(entry.value.as_deref());
            match ActionKind::from_action_type(&entry.action_type) {
                Some(kind) => {
                    totals.recognized.insert(kind, value);
                }
                None => {
                    totals.unrecognized.insert(entry.action_type.clone(), value);
                }
            }
        }
        totals
    }

    pub fn get(&self, kind: ActionKind) -> f64 {
        self.recognized.get(&kind).copied().unwrap_or(0.0)
    }

    /// Value truncated to a whole count
    pub fn count(&self, kind: ActionKind) -> i64 {
        truncate_to_i64(self.get(kind))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionMetrics {
    pub view_content: i64,
    pub add_to_cart: i64,
    pub initiate_checkout: i64,
    pub purchase: i64,
    pub purchase_value: f64,
    pub cost_per_view_content: f64,
    pub cost_per_add_to_cart: f64,
    pub cost_per_initiate_checkout: f64,
    pub cost_per_purchase: f64,
    pub roas: f64,
}

/// Lenient float parse: absent, unparseable or non-finite values become 0
pub fn parse_metric_f64(value: Option<&str>) -> f64 {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Lenient integer parse; `"3.0"` and `"3.7"` both give 3
pub fn parse_metric_i64(value: Option<&str>) -> i64 {
    let Some(raw) = value.map(str::trim) else {
        return 0;
    };
    raw.parse::<i64>()
        .unwrap_or_else(|_| truncate_to_i64(parse_metric_f64(Some(raw))))
}

fn truncate_to_i64(value: f64) -> i64 {
    if value.is_finite() {
        // `as` saturates at the i64 bounds
        value.trunc() as i64
    } else {
        0
    }
}

/// Normalize one entity-day's action arrays into funnel metrics
pub fn extract(day: &RawInsightDay) -> ConversionMetrics {
    let counts = ActionTotals::from_entries(day.actions.as_deref());
    let values = ActionTotals::from_entries(day.action_values.as_deref());
    let costs = ActionTotals::from_entries(day.cost_per_action_type.as_deref());

    let spend = parse_metric_f64(day.spend.as_deref());
    let purchase_value = values.get(ActionKind::Purchase);
    let roas = if spend > 0.0 {
        purchase_value / spend
    } else {
        0.0
    };

    ConversionMetrics {
        view_content: counts.count(ActionKind::ViewContent),
        add_to_cart: counts.count(ActionKind::AddToCart),
        initiate_checkout: counts.count(ActionKind::InitiateCheckout),
        purchase: counts.count(ActionKind::Purchase),
        purchase_value,
        cost_per_view_content: costs.get(ActionKind::ViewContent),
        cost_per_add_to_cart: costs.get(ActionKind::AddToCart),
        cost_per_initiate_checkout: costs.get(ActionKind::InitiateCheckout),
        cost_per_purchase: costs.get(ActionKind::Purchase),
        roas,
    }
}
