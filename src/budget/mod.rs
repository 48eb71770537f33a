//! Budget registry
//!
//! CRUD for spending caps plus the period-boundary math the evaluator
//! depends on. Creates and updates are all-or-nothing: a budget that
//! fails any invariant is never stored, and validation reports every
//! failing field at once.

pub mod evaluator;
pub mod period;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::types::FinOpsError;

use self::period::period_bounds;

/// Recurrence of a budget's cap window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Monthly,
    Quarterly,
    Yearly,
    Custom,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    Active,
    Paused,
    Expired,
}

/// A spending cap scoped to an organization, period, and category set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: Uuid,
    pub organization_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub period: BudgetPeriod,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Percentage of the cap at which a warning alert fires
    pub threshold: f64,
    pub status: BudgetStatus,
    /// Service names this budget covers, or the sentinel "all"
    pub categories: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub last_modified_by: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Budget {
    /// Whether a service category counts against this budget
    pub fn covers(&self, service: &str) -> bool {
        self.categories.iter().any(|c| c == service || c == "all")
    }
}

/// Input for creating a budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBudget {
    pub organization_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub period: BudgetPeriod,
    /// Required for custom periods; derived from the calendar otherwise
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    pub threshold: f64,
    #[serde(default = "default_status")]
    pub status: BudgetStatus,
    pub categories: Vec<String>,
    #[serde(default = "default_actor")]
    pub created_by: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn default_status() -> BudgetStatus {
    BudgetStatus::Active
}

fn default_actor() -> String {
    "system".to_string()
}

/// Partial update; unset fields keep their current value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub period: Option<BudgetPeriod>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub threshold: Option<f64>,
    pub status: Option<BudgetStatus>,
    pub categories: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<HashMap<String, String>>,
    pub last_modified_by: Option<String>,
}

/// Check every budget invariant, collecting all problems
fn validate(budget: &Budget) -> Vec<String> {
    let mut problems = Vec::new();

    if budget.amount <= Decimal::ZERO {
        problems.push("amount must be greater than 0".to_string());
    }
    if !(0.0..=100.0).contains(&budget.threshold) {
        problems.push("threshold must be between 0 and 100".to_string());
    }
    if budget.start_date >= budget.end_date {
        problems.push("start date must be before end date".to_string());
    }
    if budget.organization_id.trim().is_empty() {
        problems.push("organization id is required".to_string());
    }

    problems
}

/// In-memory budget store
#[derive(Clone)]
pub struct BudgetRegistry {
    budgets: Arc<RwLock<HashMap<Uuid, Budget>>>,
}

impl BudgetRegistry {
    pub fn new() -> Self {
        Self {
            budgets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a budget; rejected wholesale if any invariant fails
    ///
    /// Calendar-period budgets derive missing dates from the current
    /// period bounds; custom budgets must supply both.
    pub async fn create(&self, new: NewBudget) -> Result<Budget, FinOpsError> {
        let now = Utc::now();
        let mut problems = Vec::new();

        let (start_date, end_date) = match new.period {
            BudgetPeriod::Custom => {
                if new.start_date.is_none() {
                    problems.push("start date is required for custom periods".to_string());
                }
                if new.end_date.is_none() {
                    problems.push("end date is required for custom periods".to_string());
                }
                let start = new.start_date.unwrap_or(now);
                (start, new.end_date.unwrap_or(start + Duration::days(1)))
            }
            _ => {
                let (period_start, period_end) = period_bounds(new.period, now, now, now);
                (
                    new.start_date.unwrap_or(period_start),
                    new.end_date.unwrap_or(period_end),
                )
            }
        };

        let budget = Budget {
            id: Uuid::new_v4(),
            organization_id: new.organization_id,
            name: new.name,
            description: new.description,
            amount: new.amount,
            currency: new.currency,
            period: new.period,
            start_date,
            end_date,
            threshold: new.threshold,
            status: new.status,
            categories: new.categories,
            created_at: now,
            updated_at: now,
            created_by: new.created_by.clone(),
            last_modified_by: new.created_by,
            tags: new.tags,
            metadata: new.metadata,
        };

        problems.extend(validate(&budget));
        if !problems.is_empty() {
            return Err(FinOpsError::Validation(problems));
        }
        self.budgets.write().await.insert(budget.id, budget.clone());

        info!(
            budget_id = %budget.id,
            name = %budget.name,
            amount = %budget.amount,
            organization_id = %budget.organization_id,
            "Budget created"
        );
        Ok(budget)
    }

    /// Merge a patch onto an existing budget, re-validate, and replace
    /// atomically; the stored budget is untouched on failure
    pub async fn update(&self, id: Uuid, patch: BudgetPatch) -> Result<Budget, FinOpsError> {
        let mut budgets = self.budgets.write().await;
        let current = budgets
            .get(&id)
            .ok_or_else(|| FinOpsError::not_found("budget", id.to_string()))?;

        let mut merged = current.clone();
        if let Some(name) = patch.name {
            merged.name = name;
        }
        if let Some(description) = patch.description {
            merged.description = description;
        }
        if let Some(amount) = patch.amount {
            merged.amount = amount;
        }
        if let Some(currency) = patch.currency {
            merged.currency = currency;
        }
        if let Some(period) = patch.period {
            merged.period = period;
        }
        if let Some(start_date) = patch.start_date {
            merged.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            merged.end_date = end_date;
        }
        if let Some(threshold) = patch.threshold {
            merged.threshold = threshold;
        }
        if let Some(status) = patch.status {
            merged.status = status;
        }
        if let Some(categories) = patch.categories {
            merged.categories = categories;
        }
        if let Some(tags) = patch.tags {
            merged.tags = tags;
        }
        if let Some(metadata) = patch.metadata {
            merged.metadata = metadata;
        }
        if let Some(actor) = patch.last_modified_by {
            merged.last_modified_by = actor;
        }
        merged.updated_at = Utc::now();

        let problems = validate(&merged);
        if !problems.is_empty() {
            return Err(FinOpsError::Validation(problems));
        }
        budgets.insert(id, merged.clone());

        info!(budget_id = %id, "Budget updated");
        Ok(merged)
    }

    /// Remove a budget; the caller cascades alert removal
    pub async fn remove(&self, id: Uuid) -> Option<Budget> {
        let removed = self.budgets.write().await.remove(&id);
        if removed.is_some() {
            info!(budget_id = %id, "Budget deleted");
        }
        removed
    }

    pub async fn get(&self, id: Uuid) -> Option<Budget> {
        self.budgets.read().await.get(&id).cloned()
    }

    /// Active budgets for one organization
    pub async fn active_for_organization(&self, organization_id: &str) -> Vec<Budget> {
        self.budgets
            .read()
            .await
            .values()
            .filter(|b| b.organization_id == organization_id && b.status == BudgetStatus::Active)
            .cloned()
            .collect()
    }

    /// All budgets for one organization, any status
    pub async fn for_organization(&self, organization_id: &str) -> Vec<Budget> {
        self.budgets
            .read()
            .await
            .values()
            .filter(|b| b.organization_id == organization_id)
            .cloned()
            .collect()
    }

    /// Every organization that has at least one budget (sweep targets)
    pub async fn organization_ids(&self) -> HashSet<String> {
        self.budgets
            .read()
            .await
            .values()
            .map(|b| b.organization_id.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.budgets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for BudgetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_budget(org: &str, amount: Decimal, threshold: f64) -> NewBudget {
        NewBudget {
            organization_id: org.to_string(),
            name: "AI Operations Budget".to_string(),
            description: String::new(),
            amount,
            currency: "USD".to_string(),
            period: BudgetPeriod::Monthly,
            start_date: None,
            end_date: None,
            threshold,
            status: BudgetStatus::Active,
            categories: vec!["openai".to_string()],
            created_by: "tester".to_string(),
            tags: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_create_valid_budget() {
        let registry = BudgetRegistry::new();
        let budget = registry.create(new_budget("org-1", dec!(1000), 80.0)).await.unwrap();

        assert_eq!(budget.threshold, 80.0);
        assert!(registry.get(budget.id).await.is_some());
    }

    #[tokio::test]
    async fn test_create_zero_amount_rejected_and_not_stored() {
        let registry = BudgetRegistry::new();
        let result = registry.create(new_budget("org-1", dec!(0), 80.0)).await;

        assert!(matches!(result, Err(FinOpsError::Validation(_))));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_validation_collects_all_problems() {
        let registry = BudgetRegistry::new();
        let now = Utc::now();
        let mut new = new_budget("", dec!(-1), 150.0);
        new.start_date = Some(now);
        new.end_date = Some(now);

        match registry.create(new).await {
            Err(FinOpsError::Validation(problems)) => assert_eq!(problems.len(), 4),
            other => panic!("expected validation error, got {:?}", other.map(|b| b.id)),
        }
    }

    #[tokio::test]
    async fn test_calendar_budget_derives_period_dates() {
        use chrono::Datelike;

        let registry = BudgetRegistry::new();
        let budget = registry.create(new_budget("org-1", dec!(1000), 80.0)).await.unwrap();

        assert_eq!(budget.start_date.day(), 1);
        assert!(budget.end_date > budget.start_date);
    }

    #[tokio::test]
    async fn test_custom_budget_requires_both_dates() {
        let registry = BudgetRegistry::new();
        let mut new = new_budget("org-1", dec!(1000), 80.0);
        new.period = BudgetPeriod::Custom;

        match registry.create(new).await {
            Err(FinOpsError::Validation(problems)) => assert_eq!(problems.len(), 2),
            other => panic!("expected validation error, got {:?}", other.map(|b| b.id)),
        }
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_merges_and_revalidates() {
        let registry = BudgetRegistry::new();
        let budget = registry.create(new_budget("org-1", dec!(1000), 80.0)).await.unwrap();

        let updated = registry
            .update(
                budget.id,
                BudgetPatch {
                    amount: Some(dec!(2000)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.amount, dec!(2000));
        assert_eq!(updated.threshold, 80.0);

        // Invalid patch leaves the stored budget untouched
        let result = registry
            .update(
                budget.id,
                BudgetPatch {
                    amount: Some(dec!(-1)),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(FinOpsError::Validation(_))));
        assert_eq!(registry.get(budget.id).await.unwrap().amount, dec!(2000));
    }

    #[tokio::test]
    async fn test_update_missing_budget_is_not_found() {
        let registry = BudgetRegistry::new();
        let result = registry.update(Uuid::new_v4(), BudgetPatch::default()).await;
        assert!(matches!(result, Err(FinOpsError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_active_filter_excludes_paused() {
        let registry = BudgetRegistry::new();
        let mut paused = new_budget("org-1", dec!(500), 80.0);
        paused.status = BudgetStatus::Paused;
        registry.create(paused).await.unwrap();
        registry.create(new_budget("org-1", dec!(1000), 80.0)).await.unwrap();

        assert_eq!(registry.active_for_organization("org-1").await.len(), 1);
        assert_eq!(registry.for_organization("org-1").await.len(), 2);
    }

    #[tokio::test]
    async fn test_covers_category_and_all_sentinel() {
        let registry = BudgetRegistry::new();
        let budget = registry.create(new_budget("org-1", dec!(1000), 80.0)).await.unwrap();
        assert!(budget.covers("openai"));
        assert!(!budget.covers("storage"));

        let mut all = new_budget("org-1", dec!(1000), 80.0);
        all.categories = vec!["all".to_string()];
        let all = registry.create(all).await.unwrap();
        assert!(all.covers("anything"));
    }
}
