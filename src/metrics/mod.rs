//! Cost metrics and analytics
//!
//! Aggregates ledger history into a summary: totals grouped by service,
//! operation, organization, and day, plus a trend direction from the
//! trailing seven-day window against the seven days before it.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::ledger::CostEvent;
use crate::types::TrendDirection;

/// Relative change (percent) beyond which a trend counts as moving
const TREND_CHANGE_CUTOFF: f64 = 10.0;

/// Number of top expenses included in the summary
const TOP_EXPENSE_LIMIT: usize = 10;

/// Aggregated cost summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostMetrics {
    pub total_cost: Decimal,
    pub cost_by_service: HashMap<String, Decimal>,
    pub cost_by_operation: HashMap<String, Decimal>,
    pub cost_by_organization: HashMap<String, Decimal>,
    /// Day-bucketed totals, keyed YYYY-MM-DD
    pub cost_by_period: BTreeMap<String, Decimal>,
    pub average_cost: Decimal,
    pub trend: TrendDirection,
    /// Largest single costs, descending
    pub top_expenses: Vec<CostEvent>,
}

/// Compute the summary over a set of cost events
pub fn compute(events: &[CostEvent]) -> CostMetrics {
    let total_cost: Decimal = events.iter().map(|e| e.amount).sum();

    let mut cost_by_service: HashMap<String, Decimal> = HashMap::new();
    let mut cost_by_operation: HashMap<String, Decimal> = HashMap::new();
    let mut cost_by_organization: HashMap<String, Decimal> = HashMap::new();
    let mut cost_by_period: BTreeMap<String, Decimal> = BTreeMap::new();

    for event in events {
        *cost_by_service.entry(group_key(&event.service)).or_default() += event.amount;
        *cost_by_operation.entry(group_key(&event.operation)).or_default() += event.amount;
        *cost_by_organization
            .entry(group_key(&event.organization_id))
            .or_default() += event.amount;
        *cost_by_period
            .entry(event.timestamp.format("%Y-%m-%d").to_string())
            .or_default() += event.amount;
    }

    let average_cost = if events.is_empty() {
        Decimal::ZERO
    } else {
        total_cost / Decimal::from(events.len())
    };

    let trend = trend_direction(&cost_by_period);

    let mut top_expenses: Vec<CostEvent> = events.to_vec();
    top_expenses.sort_by(|a, b| b.amount.cmp(&a.amount));
    top_expenses.truncate(TOP_EXPENSE_LIMIT);

    CostMetrics {
        total_cost,
        cost_by_service,
        cost_by_operation,
        cost_by_organization,
        cost_by_period,
        average_cost,
        trend,
        top_expenses,
    }
}

fn group_key(value: &str) -> String {
    if value.is_empty() {
        "unknown".to_string()
    } else {
        value.to_string()
    }
}

/// Trend from daily buckets: average of the last seven days against the
/// seven before; stable when there is no prior window to compare
pub fn trend_direction(daily: &BTreeMap<String, Decimal>) -> TrendDirection {
    if daily.len() < 2 {
        return TrendDirection::Stable;
    }

    let values: Vec<f64> = daily.values().filter_map(|v| v.to_f64()).collect();
    let recent_start = values.len().saturating_sub(7);
    let older_start = values.len().saturating_sub(14);

    let recent = &values[recent_start..];
    let older = &values[older_start..recent_start];
    if older.is_empty() {
        return TrendDirection::Stable;
    }

    let recent_avg = recent.iter().sum::<f64>() / recent.len() as f64;
    let older_avg = older.iter().sum::<f64>() / older.len() as f64;
    if older_avg == 0.0 {
        return TrendDirection::Stable;
    }

    let change = (recent_avg - older_avg) / older_avg * 100.0;
    if change > TREND_CHANGE_CUTOFF {
        TrendDirection::Increasing
    } else if change < -TREND_CHANGE_CUTOFF {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    }
}

/// Cutoff timestamp for a relative period label
///
/// Unrecognized labels return the epoch, i.e. no filtering.
pub fn period_cutoff(period: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    match period {
        "1h" => now - Duration::hours(1),
        "24h" => now - Duration::hours(24),
        "7d" => now - Duration::days(7),
        "30d" => now - Duration::days(30),
        "90d" => now - Duration::days(90),
        _ => DateTime::<Utc>::MIN_UTC,
    }
}
