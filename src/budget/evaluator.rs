//! Budget evaluation and alerting
//!
//! Computes current-period spend for every active budget of an
//! organization and raises threshold/exceeded alerts. At most one
//! unacknowledged alert of a given (budget, type) pair exists at a time;
//! duplicate triggers are suppressed until the alert is acknowledged.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AlertBands;
use crate::ledger::CostLedger;
use crate::types::{FinOpsError, Severity};

use super::period::period_bounds;
use super::{Budget, BudgetRegistry};

/// Kind of budget alert
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Threshold,
    Exceeded,
    PredictedExceeded,
    Anomaly,
}

/// One alert instance tied to a budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetAlert {
    pub id: Uuid,
    pub budget_id: Uuid,
    pub organization_id: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    pub current_amount: Decimal,
    pub budget_amount: Decimal,
    pub percentage: f64,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Map an alert type and spend percentage to a severity
///
/// Pure so the band edges can be unit-tested apart from alert creation.
pub fn severity_for(alert_type: AlertType, percentage: f64, bands: &AlertBands) -> Severity {
    match alert_type {
        AlertType::Threshold => {
            if percentage >= bands.high_band {
                Severity::High
            } else if percentage >= bands.medium_band {
                Severity::Medium
            } else {
                Severity::Low
            }
        }
        AlertType::Exceeded => Severity::Critical,
        AlertType::PredictedExceeded => Severity::High,
        AlertType::Anomaly => Severity::Medium,
    }
}

/// Evaluates budgets against the cost ledger and manages alerts
#[derive(Clone)]
pub struct BudgetEvaluator {
    ledger: CostLedger,
    registry: BudgetRegistry,
    alerts: Arc<RwLock<HashMap<Uuid, BudgetAlert>>>,
    bands: AlertBands,
}

impl BudgetEvaluator {
    pub fn new(ledger: CostLedger, registry: BudgetRegistry, bands: AlertBands) -> Self {
        Self {
            ledger,
            registry,
            alerts: Arc::new(RwLock::new(HashMap::new())),
            bands,
        }
    }

    /// Evaluate every active budget of an organization, returning any
    /// newly created alerts
    ///
    /// A budget that cannot be evaluated is logged and skipped; it never
    /// blocks evaluation of the organization's other budgets.
    pub async fn evaluate(&self, organization_id: &str) -> Vec<BudgetAlert> {
        let budgets = self.registry.active_for_organization(organization_id).await;
        let mut created = Vec::new();

        for budget in budgets {
            match self.evaluate_budget(&budget).await {
                Ok(Some(alert)) => created.push(alert),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        budget_id = %budget.id,
                        error = %e,
                        "Skipping budget during evaluation"
                    );
                }
            }
        }

        created
    }

    async fn evaluate_budget(&self, budget: &Budget) -> Result<Option<BudgetAlert>, FinOpsError> {
        let current_amount = self.current_spend(budget).await;

        let budget_amount = budget.amount.to_f64().filter(|a| *a > 0.0).ok_or_else(|| {
            FinOpsError::Internal(format!("budget {} has unusable amount", budget.id))
        })?;
        let spent = current_amount.to_f64().unwrap_or(0.0);
        let percentage = spent / budget_amount * 100.0;

        // Check-and-insert under one write lock so concurrent evaluations
        // cannot double-fire the same (budget, type) pair.
        let mut alerts = self.alerts.write().await;

        let unacknowledged = |alerts: &HashMap<Uuid, BudgetAlert>, alert_type: AlertType| {
            alerts
                .values()
                .any(|a| a.budget_id == budget.id && a.alert_type == alert_type && !a.acknowledged)
        };

        // The dedupe is part of each condition: a budget past 100% whose
        // exceeded alert is still open falls through to the threshold
        // check instead of firing nothing.
        let alert_type = if percentage >= 100.0 && !unacknowledged(&alerts, AlertType::Exceeded) {
            AlertType::Exceeded
        } else if percentage >= budget.threshold
            && !unacknowledged(&alerts, AlertType::Threshold)
        {
            AlertType::Threshold
        } else {
            return Ok(None);
        };

        let message = match alert_type {
            AlertType::Threshold => format!(
                "Budget {} has reached {:.1}% of its limit",
                budget.name, percentage
            ),
            AlertType::Exceeded => format!(
                "Budget {} has been exceeded by {:.1}%",
                budget.name,
                percentage - 100.0
            ),
            AlertType::PredictedExceeded => {
                format!("Budget {} is predicted to exceed its limit", budget.name)
            }
            AlertType::Anomaly => {
                format!("Unusual spending pattern detected for budget {}", budget.name)
            }
        };

        let alert = BudgetAlert {
            id: Uuid::new_v4(),
            budget_id: budget.id,
            organization_id: budget.organization_id.clone(),
            alert_type,
            severity: severity_for(alert_type, percentage, &self.bands),
            message,
            current_amount,
            budget_amount: budget.amount,
            percentage,
            triggered_at: Utc::now(),
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
            metadata: HashMap::from([("budget_name".to_string(), budget.name.clone())]),
        };

        alerts.insert(alert.id, alert.clone());

        warn!(
            alert_id = %alert.id,
            budget_id = %budget.id,
            alert_type = ?alert_type,
            percentage,
            message = %alert.message,
            "Budget alert created"
        );

        Ok(Some(alert))
    }

    /// Sum ledger spend for the budget's current period and categories
    pub async fn current_spend(&self, budget: &Budget) -> Decimal {
        let (start, end) = period_bounds(
            budget.period,
            Utc::now(),
            budget.start_date,
            budget.end_date,
        );

        let filter = crate::ledger::CostFilter {
            organization_id: Some(budget.organization_id.clone()),
            start_date: Some(start),
            end_date: Some(end),
            ..Default::default()
        };

        self.ledger
            .query(&filter)
            .await
            .iter()
            .filter(|e| budget.covers(&e.service))
            .map(|e| e.amount)
            .sum()
    }

    /// Spend percentage for one budget, 0 when the budget is unknown
    pub async fn usage_percentage(&self, budget_id: Uuid) -> f64 {
        let Some(budget) = self.registry.get(budget_id).await else {
            return 0.0;
        };
        let spent = self.current_spend(&budget).await.to_f64().unwrap_or(0.0);
        let amount = budget.amount.to_f64().unwrap_or(0.0);
        if amount > 0.0 {
            spent / amount * 100.0
        } else {
            0.0
        }
    }

    /// Mark an alert acknowledged; idempotent
    ///
    /// Re-acknowledging succeeds without overwriting the original actor
    /// or timestamp.
    pub async fn acknowledge(&self, alert_id: Uuid, by: &str) -> Result<bool, FinOpsError> {
        let mut alerts = self.alerts.write().await;
        let alert = alerts
            .get_mut(&alert_id)
            .ok_or_else(|| FinOpsError::not_found("alert", alert_id.to_string()))?;

        if alert.acknowledged {
            return Ok(true);
        }

        alert.acknowledged = true;
        alert.acknowledged_by = Some(by.to_string());
        alert.acknowledged_at = Some(Utc::now());

        info!(alert_id = %alert_id, acknowledged_by = by, "Budget alert acknowledged");
        Ok(true)
    }

    /// Unacknowledged alerts, optionally scoped to one organization,
    /// newest first
    pub async fn active_alerts(&self, organization_id: Option<&str>) -> Vec<BudgetAlert> {
        let alerts = self.alerts.read().await;
        let mut active: Vec<BudgetAlert> = alerts
            .values()
            .filter(|a| !a.acknowledged)
            .filter(|a| organization_id.map_or(true, |org| a.organization_id == org))
            .cloned()
            .collect();
        active.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        active
    }

    pub async fn active_alert_count(&self) -> usize {
        self.alerts.read().await.values().filter(|a| !a.acknowledged).count()
    }

    /// Remove every alert belonging to a budget (delete cascade)
    pub async fn remove_for_budget(&self, budget_id: Uuid) -> usize {
        let mut alerts = self.alerts.write().await;
        let before = alerts.len();
        alerts.retain(|_, a| a.budget_id != budget_id);
        before - alerts.len()
    }

    /// Drop alerts triggered before the cutoff
    pub async fn clear_old_data(&self, cutoff: DateTime<Utc>) -> usize {
        let mut alerts = self.alerts.write().await;
        let before = alerts.len();
        alerts.retain(|_, a| a.triggered_at >= cutoff);
        before - alerts.len()
    }
}
