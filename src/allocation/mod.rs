//! Cost allocation
//!
//! Splits a single recorded cost across internal cost centers by
//! percentage. The split must total exactly 100 percent; anything else
//! fails the whole call with no allocation lines written.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::ledger::CostLedger;
use crate::types::FinOpsError;

/// One requested split line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationLine {
    pub organization_id: String,
    #[serde(default)]
    pub department_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub percentage: Decimal,
    /// Free-form method label, e.g. "usage_based"
    #[serde(default)]
    pub method: String,
}

/// A stored percentage split of one cost event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostAllocation {
    pub id: Uuid,
    pub cost_id: Uuid,
    pub organization_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub percentage: Decimal,
    pub amount: Decimal,
    pub method: String,
    /// Copied from the source cost
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

/// Splits cost events into allocation lines
#[derive(Clone)]
pub struct CostAllocator {
    ledger: CostLedger,
    allocations: Arc<RwLock<Vec<CostAllocation>>>,
}

impl CostAllocator {
    pub fn new(ledger: CostLedger) -> Self {
        Self {
            ledger,
            allocations: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Allocate a cost across the given lines
    ///
    /// Fails with NotFound for an unknown cost id, and with Validation
    /// when percentages do not total exactly 100 (no tolerance). On
    /// failure nothing is written.
    pub async fn allocate(
        &self,
        cost_id: Uuid,
        lines: Vec<AllocationLine>,
        created_by: &str,
    ) -> Result<Vec<CostAllocation>, FinOpsError> {
        let cost = self
            .ledger
            .get(cost_id)
            .await
            .ok_or_else(|| FinOpsError::not_found("cost", cost_id.to_string()))?;

        let total: Decimal = lines.iter().map(|l| l.percentage).sum();
        if total != dec!(100) {
            return Err(FinOpsError::validation(format!(
                "allocation percentages must total exactly 100, got {}",
                total
            )));
        }

        let now = Utc::now();
        let created: Vec<CostAllocation> = lines
            .into_iter()
            .map(|line| CostAllocation {
                id: Uuid::new_v4(),
                cost_id,
                organization_id: line.organization_id,
                department_id: line.department_id,
                project_id: line.project_id,
                user_id: line.user_id,
                percentage: line.percentage,
                amount: cost.amount * line.percentage / dec!(100),
                method: line.method,
                tags: cost.tags.clone(),
                created_at: now,
                created_by: created_by.to_string(),
            })
            .collect();

        self.allocations.write().await.extend(created.iter().cloned());

        info!(
            cost_id = %cost_id,
            total_amount = %cost.amount,
            lines = created.len(),
            "Cost allocated"
        );
        Ok(created)
    }

    /// Stored allocations, optionally for one cost
    pub async fn allocations_for(&self, cost_id: Option<Uuid>) -> Vec<CostAllocation> {
        self.allocations
            .read()
            .await
            .iter()
            .filter(|a| cost_id.map_or(true, |id| a.cost_id == id))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.allocations.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::NewCostEvent;

    fn line(org: &str, percentage: Decimal) -> AllocationLine {
        AllocationLine {
            organization_id: org.to_string(),
            department_id: None,
            project_id: None,
            user_id: None,
            percentage,
            method: "custom".to_string(),
        }
    }

    async fn recorded_cost(ledger: &CostLedger, amount: Decimal) -> Uuid {
        ledger
            .record(NewCostEvent {
                organization_id: "org-1".to_string(),
                service: "openai".to_string(),
                amount,
                currency: "USD".to_string(),
                tags: vec!["ai".to_string()],
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_sum_under_100_rejected_with_no_writes() {
        let ledger = CostLedger::new();
        let allocator = CostAllocator::new(ledger.clone());
        let cost_id = recorded_cost(&ledger, dec!(100)).await;

        let result = allocator
            .allocate(cost_id, vec![line("a", dec!(60)), line("b", dec!(39))], "tester")
            .await;

        assert!(matches!(result, Err(FinOpsError::Validation(_))));
        assert_eq!(allocator.len().await, 0);
    }

    #[tokio::test]
    async fn test_exact_100_splits_amount() {
        let ledger = CostLedger::new();
        let allocator = CostAllocator::new(ledger.clone());
        let cost_id = recorded_cost(&ledger, dec!(100)).await;

        let created = allocator
            .allocate(cost_id, vec![line("a", dec!(60)), line("b", dec!(40))], "tester")
            .await
            .unwrap();

        assert_eq!(created.len(), 2);
        assert_eq!(created[0].amount, dec!(60));
        assert_eq!(created[1].amount, dec!(40));
        let total: Decimal = created.iter().map(|a| a.amount).sum();
        assert_eq!(total, dec!(100));

        // Tags copied from the source cost
        assert_eq!(created[0].tags, vec!["ai".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_cost_is_not_found() {
        let ledger = CostLedger::new();
        let allocator = CostAllocator::new(ledger);

        let result = allocator
            .allocate(Uuid::new_v4(), vec![line("a", dec!(100))], "tester")
            .await;
        assert!(matches!(result, Err(FinOpsError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_allocations_for_filters_by_cost() {
        let ledger = CostLedger::new();
        let allocator = CostAllocator::new(ledger.clone());
        let first = recorded_cost(&ledger, dec!(100)).await;
        let second = recorded_cost(&ledger, dec!(50)).await;

        allocator.allocate(first, vec![line("a", dec!(100))], "tester").await.unwrap();
        allocator.allocate(second, vec![line("b", dec!(100))], "tester").await.unwrap();

        assert_eq!(allocator.allocations_for(Some(first)).await.len(), 1);
        assert_eq!(allocator.allocations_for(None).await.len(), 2);
    }
}
