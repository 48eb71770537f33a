//! Cost ledger
//!
//! Append-only, queryable store of cost events. Every aggregation in the
//! service (budgets, anomalies, metrics) reads from this ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::FinOpsError;

/// One recorded unit of spend
///
/// Immutable once appended. Negative amounts are permitted (refunds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub organization_id: String,
    /// Service category, e.g. "openai"
    pub service: String,
    /// Operation or subcategory within the service
    pub operation: String,
    pub resource: String,
    pub amount: Decimal,
    /// ISO currency code
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Input for recording a cost; id and timestamp are assigned at append
/// time when absent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCostEvent {
    pub organization_id: String,
    pub service: String,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub resource: String,
    pub amount: Decimal,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub department_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Optional filters for querying the ledger
///
/// All fields combine with AND; date bounds are inclusive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostFilter {
    pub organization_id: Option<String>,
    pub service: Option<String>,
    pub operation: Option<String>,
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub department_id: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl CostFilter {
    pub fn for_organization(organization_id: &str) -> Self {
        Self {
            organization_id: Some(organization_id.to_string()),
            ..Default::default()
        }
    }

    fn matches(&self, event: &CostEvent) -> bool {
        if let Some(ref org) = self.organization_id {
            if &event.organization_id != org {
                return false;
            }
        }
        if let Some(ref service) = self.service {
            if &event.service != service {
                return false;
            }
        }
        if let Some(ref operation) = self.operation {
            if &event.operation != operation {
                return false;
            }
        }
        if let Some(ref user_id) = self.user_id {
            if event.user_id.as_ref() != Some(user_id) {
                return false;
            }
        }
        if let Some(ref project_id) = self.project_id {
            if event.project_id.as_ref() != Some(project_id) {
                return false;
            }
        }
        if let Some(ref department_id) = self.department_id {
            if event.department_id.as_ref() != Some(department_id) {
                return false;
            }
        }
        if let Some(start) = self.start_date {
            if event.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if event.timestamp > end {
                return false;
            }
        }
        true
    }
}

/// Append-only store of cost events
///
/// Events live in an id-indexed map plus a chronological history list.
/// Queries are full scans; acceptable at in-memory scale.
#[derive(Clone)]
pub struct CostLedger {
    events: Arc<RwLock<HashMap<Uuid, CostEvent>>>,
    history: Arc<RwLock<Vec<CostEvent>>>,
}

impl CostLedger {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(HashMap::new())),
            history: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Append a cost event, assigning id and timestamp
    pub async fn record(&self, new: NewCostEvent) -> Result<CostEvent, FinOpsError> {
        let mut problems = Vec::new();
        if new.organization_id.trim().is_empty() {
            problems.push("organization id is required".to_string());
        }
        if new.service.trim().is_empty() {
            problems.push("service is required".to_string());
        }
        if !problems.is_empty() {
            return Err(FinOpsError::Validation(problems));
        }

        let event = CostEvent {
            id: Uuid::new_v4(),
            timestamp: new.timestamp.unwrap_or_else(Utc::now),
            organization_id: new.organization_id,
            service: new.service,
            operation: new.operation,
            resource: new.resource,
            amount: new.amount,
            currency: new.currency,
            user_id: new.user_id,
            project_id: new.project_id,
            department_id: new.department_id,
            tags: new.tags,
            metadata: new.metadata,
        };

        {
            let mut events = self.events.write().await;
            let mut history = self.history.write().await;
            events.insert(event.id, event.clone());
            history.push(event.clone());
        }

        debug!(
            cost_id = %event.id,
            service = %event.service,
            amount = %event.amount,
            organization_id = %event.organization_id,
            "Cost recorded"
        );

        Ok(event)
    }

    /// Query events matching the filter, newest first
    pub async fn query(&self, filter: &CostFilter) -> Vec<CostEvent> {
        let history = self.history.read().await;
        let mut matched: Vec<CostEvent> = history
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matched
    }

    /// Exact lookup by id
    pub async fn get(&self, id: Uuid) -> Option<CostEvent> {
        self.events.read().await.get(&id).cloned()
    }

    /// Prior amounts for the same service and organization, strictly
    /// before the given timestamp (anomaly detection history)
    pub async fn amounts_before(
        &self,
        service: &str,
        organization_id: &str,
        before: DateTime<Utc>,
    ) -> Vec<Decimal> {
        let history = self.history.read().await;
        history
            .iter()
            .filter(|e| {
                e.service == service
                    && e.organization_id == organization_id
                    && e.timestamp < before
            })
            .map(|e| e.amount)
            .collect()
    }

    /// Number of events in the ledger
    pub async fn len(&self) -> usize {
        self.history.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop events older than the cutoff; returns how many were removed
    pub async fn clear_old_data(&self, cutoff: DateTime<Utc>) -> usize {
        let mut events = self.events.write().await;
        let mut history = self.history.write().await;

        let before = history.len();
        history.retain(|e| e.timestamp >= cutoff);
        events.retain(|_, e| e.timestamp >= cutoff);
        let removed = before - history.len();

        if removed > 0 {
            info!(removed, cutoff = %cutoff, "Old cost events cleared");
        }
        removed
    }
}

impl Default for CostLedger {
    fn default() -> Self {
        Self::new()
    }
}
