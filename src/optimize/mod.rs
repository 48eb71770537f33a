//! Optimization advisor
//!
//! Rule-based savings recommendations derived from resource utilization
//! samples and cost categories. Generation is an idempotent upsert keyed
//! on (type, resource set), so repeated runs refresh rather than
//! duplicate suggestions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::ledger::{CostFilter, CostLedger};
use crate::types::FinOpsError;

/// Utilization below this efficiency triggers a right-sizing suggestion
const RIGHT_SIZING_EFFICIENCY_CUTOFF: f64 = 30.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    RightSizing,
    StorageOptimization,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    Pending,
    InProgress,
    Implemented,
    Dismissed,
}

/// Savings projection for a recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatedSavings {
    pub monthly: Decimal,
    pub yearly: Decimal,
    pub percentage: f64,
}

/// A heuristic savings suggestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRecommendation {
    pub id: Uuid,
    pub organization_id: String,
    pub rec_type: RecommendationType,
    pub title: String,
    pub description: String,
    pub potential_savings: Decimal,
    /// 0-100
    pub confidence: u8,
    pub effort: Rating,
    pub impact: Rating,
    pub resources: Vec<String>,
    pub implementation: String,
    pub estimated_savings: EstimatedSavings,
    pub status: RecommendationStatus,
    pub priority: Rating,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A point-in-time resource utilization sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUtilization {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub organization_id: String,
    pub service: String,
    pub resource_id: String,
    pub resource_type: String,
    /// Utilization efficiency, percent
    pub efficiency: f64,
    /// Cost of running the resource over the sample period
    pub cost: Decimal,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Input for recording a utilization sample
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewResourceUtilization {
    pub organization_id: String,
    pub service: String,
    pub resource_id: String,
    #[serde(default)]
    pub resource_type: String,
    pub efficiency: f64,
    pub cost: Decimal,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Generates and stores optimization recommendations
#[derive(Clone)]
pub struct OptimizationAdvisor {
    ledger: CostLedger,
    utilizations: Arc<RwLock<Vec<ResourceUtilization>>>,
    recommendations: Arc<RwLock<Vec<OptimizationRecommendation>>>,
}

impl OptimizationAdvisor {
    pub fn new(ledger: CostLedger) -> Self {
        Self {
            ledger,
            utilizations: Arc::new(RwLock::new(Vec::new())),
            recommendations: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Record a resource utilization sample
    pub async fn record_utilization(
        &self,
        new: NewResourceUtilization,
    ) -> Result<ResourceUtilization, FinOpsError> {
        let mut problems = Vec::new();
        if new.organization_id.trim().is_empty() {
            problems.push("organization id is required".to_string());
        }
        if new.resource_id.trim().is_empty() {
            problems.push("resource id is required".to_string());
        }
        if !(0.0..=100.0).contains(&new.efficiency) {
            problems.push("efficiency must be between 0 and 100".to_string());
        }
        if !problems.is_empty() {
            return Err(FinOpsError::Validation(problems));
        }

        let sample = ResourceUtilization {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            organization_id: new.organization_id,
            service: new.service,
            resource_id: new.resource_id,
            resource_type: new.resource_type,
            efficiency: new.efficiency,
            cost: new.cost,
            metadata: new.metadata,
        };

        self.utilizations.write().await.push(sample.clone());

        info!(
            resource_id = %sample.resource_id,
            efficiency = sample.efficiency,
            "Resource utilization recorded"
        );
        Ok(sample)
    }

    pub async fn utilizations_for(&self, organization_id: &str) -> Vec<ResourceUtilization> {
        self.utilizations
            .read()
            .await
            .iter()
            .filter(|u| u.organization_id == organization_id)
            .cloned()
            .collect()
    }

    /// Generate recommendations for an organization
    ///
    /// Right-sizing: each resource sample under the efficiency cutoff is
    /// worth 30% of its cost. Storage: aggregate "storage"-service spend
    /// is worth 20% via lifecycle policies.
    pub async fn generate(
        &self,
        organization_id: &str,
    ) -> Result<Vec<OptimizationRecommendation>, FinOpsError> {
        let mut generated = Vec::new();
        let now = Utc::now();

        let underutilized: Vec<ResourceUtilization> = self
            .utilizations_for(organization_id)
            .await
            .into_iter()
            .filter(|u| u.efficiency < RIGHT_SIZING_EFFICIENCY_CUTOFF)
            .collect();

        for sample in underutilized {
            let savings = sample.cost * dec!(0.3);
            generated.push(OptimizationRecommendation {
                id: Uuid::new_v4(),
                organization_id: organization_id.to_string(),
                rec_type: RecommendationType::RightSizing,
                title: format!("Right-size {}", sample.resource_id),
                description: format!(
                    "Resource {} is only {}% utilized",
                    sample.resource_id, sample.efficiency
                ),
                potential_savings: savings,
                confidence: 85,
                effort: Rating::Medium,
                impact: Rating::Medium,
                resources: vec![sample.resource_id.clone()],
                implementation: "Consider downsizing to a smaller instance type".to_string(),
                estimated_savings: EstimatedSavings {
                    monthly: savings,
                    yearly: savings * dec!(12),
                    percentage: 30.0,
                },
                status: RecommendationStatus::Pending,
                priority: Rating::Medium,
                created_at: now,
                metadata: HashMap::from([
                    ("current_utilization".to_string(), sample.efficiency.to_string()),
                    ("current_cost".to_string(), sample.cost.to_string()),
                ]),
                tags: vec!["right-sizing".to_string(), "cost-optimization".to_string()],
            });
        }

        let storage_filter = CostFilter {
            organization_id: Some(organization_id.to_string()),
            service: Some("storage".to_string()),
            ..Default::default()
        };
        let storage_costs = self.ledger.query(&storage_filter).await;
        if !storage_costs.is_empty() {
            let total: Decimal = storage_costs.iter().map(|c| c.amount).sum();
            let savings = total * dec!(0.2);
            generated.push(OptimizationRecommendation {
                id: Uuid::new_v4(),
                organization_id: organization_id.to_string(),
                rec_type: RecommendationType::StorageOptimization,
                title: "Optimize Storage Classes".to_string(),
                description:
                    "Consider moving infrequently accessed data to cheaper storage classes"
                        .to_string(),
                potential_savings: savings,
                confidence: 75,
                effort: Rating::Low,
                impact: Rating::Medium,
                resources: storage_costs.iter().map(|c| c.resource.clone()).collect(),
                implementation:
                    "Implement lifecycle policies to automatically move data to cheaper storage classes"
                        .to_string(),
                estimated_savings: EstimatedSavings {
                    monthly: savings,
                    yearly: savings * dec!(12),
                    percentage: 20.0,
                },
                status: RecommendationStatus::Pending,
                priority: Rating::Low,
                created_at: now,
                metadata: HashMap::from([
                    ("total_storage_cost".to_string(), total.to_string()),
                    ("affected_resources".to_string(), storage_costs.len().to_string()),
                ]),
                tags: vec![
                    "storage".to_string(),
                    "lifecycle".to_string(),
                    "cost-optimization".to_string(),
                ],
            });
        }

        self.upsert(&generated).await;

        info!(
            organization_id,
            count = generated.len(),
            "Optimization recommendations generated"
        );
        Ok(generated)
    }

    /// Replace any prior recommendation with the same organization, type,
    /// and primary resource; append otherwise
    async fn upsert(&self, generated: &[OptimizationRecommendation]) {
        let mut store = self.recommendations.write().await;
        for rec in generated {
            let existing = store.iter().position(|r| {
                r.organization_id == rec.organization_id
                    && r.rec_type == rec.rec_type
                    && r.resources.first() == rec.resources.first()
            });
            match existing {
                Some(pos) => store[pos] = rec.clone(),
                None => store.push(rec.clone()),
            }
        }
    }

    /// Stored recommendations, optionally scoped to one organization,
    /// highest savings first
    pub async fn recommendations(
        &self,
        organization_id: Option<&str>,
    ) -> Vec<OptimizationRecommendation> {
        let store = self.recommendations.read().await;
        let mut matched: Vec<OptimizationRecommendation> = store
            .iter()
            .filter(|r| organization_id.map_or(true, |org| r.organization_id == org))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.potential_savings.cmp(&a.potential_savings));
        matched
    }

    pub async fn len(&self) -> usize {
        self.recommendations.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::NewCostEvent;

    fn utilization(org: &str, resource: &str, efficiency: f64, cost: Decimal) -> NewResourceUtilization {
        NewResourceUtilization {
            organization_id: org.to_string(),
            service: "compute".to_string(),
            resource_id: resource.to_string(),
            resource_type: "instance".to_string(),
            efficiency,
            cost,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_right_sizing_below_cutoff() {
        let ledger = CostLedger::new();
        let advisor = OptimizationAdvisor::new(ledger);
        advisor.record_utilization(utilization("org-1", "vm-1", 20.0, dec!(100))).await.unwrap();
        advisor.record_utilization(utilization("org-1", "vm-2", 75.0, dec!(100))).await.unwrap();

        let recs = advisor.generate("org-1").await.unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].rec_type, RecommendationType::RightSizing);
        assert_eq!(recs[0].potential_savings, dec!(30.0));
    }

    #[tokio::test]
    async fn test_storage_recommendation_from_ledger() {
        let ledger = CostLedger::new();
        let advisor = OptimizationAdvisor::new(ledger.clone());
        ledger
            .record(NewCostEvent {
                organization_id: "org-1".to_string(),
                service: "storage".to_string(),
                resource: "bucket-a".to_string(),
                amount: dec!(500),
                currency: "USD".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let recs = advisor.generate("org-1").await.unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].rec_type, RecommendationType::StorageOptimization);
        assert_eq!(recs[0].potential_savings, dec!(100.0));
    }

    #[tokio::test]
    async fn test_generate_twice_does_not_duplicate() {
        let ledger = CostLedger::new();
        let advisor = OptimizationAdvisor::new(ledger);
        advisor.record_utilization(utilization("org-1", "vm-1", 20.0, dec!(100))).await.unwrap();

        advisor.generate("org-1").await.unwrap();
        advisor.generate("org-1").await.unwrap();

        assert_eq!(advisor.len().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_utilization_rejected() {
        let ledger = CostLedger::new();
        let advisor = OptimizationAdvisor::new(ledger);

        let result = advisor.record_utilization(utilization("", "vm-1", 120.0, dec!(1))).await;
        assert!(matches!(result, Err(FinOpsError::Validation(_))));
    }

    #[tokio::test]
    async fn test_recommendations_sorted_by_savings() {
        let ledger = CostLedger::new();
        let advisor = OptimizationAdvisor::new(ledger);
        advisor.record_utilization(utilization("org-1", "vm-small", 20.0, dec!(10))).await.unwrap();
        advisor.record_utilization(utilization("org-1", "vm-big", 20.0, dec!(1000))).await.unwrap();

        advisor.generate("org-1").await.unwrap();
        let recs = advisor.recommendations(Some("org-1")).await;
        assert_eq!(recs[0].resources[0], "vm-big");
    }
}
