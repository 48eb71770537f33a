//! FinOps service facade
//!
//! Wires the ledger, budget registry, evaluator, anomaly detector,
//! allocator, and advisor behind one handle. Constructed once at startup
//! and passed by reference; tests build fresh instances for isolation.
//!
//! Recording a cost runs the pipeline synchronously: append, anomaly
//! detection, then budget evaluation for the event's organization.
//! Callers therefore observe fully updated alert state as soon as
//! `record_cost` returns (zero staleness).

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::allocation::{AllocationLine, CostAllocation, CostAllocator};
use crate::anomaly::{AnomalyDetector, CostAnomaly};
use crate::budget::evaluator::{BudgetAlert, BudgetEvaluator};
use crate::budget::{Budget, BudgetPatch, BudgetPeriod, BudgetRegistry, BudgetStatus, NewBudget};
use crate::config::Config;
use crate::ledger::{CostEvent, CostFilter, CostLedger, NewCostEvent};
use crate::metrics::{self, CostMetrics};
use crate::optimize::{
    NewResourceUtilization, OptimizationAdvisor, OptimizationRecommendation, ResourceUtilization,
};
use crate::types::FinOpsError;

/// Store counters for the status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    pub total_costs: usize,
    pub total_budgets: usize,
    pub active_alerts: usize,
    pub anomalies: usize,
    pub allocations: usize,
    pub recommendations: usize,
}

/// The FinOps service
#[derive(Clone)]
pub struct FinOpsService {
    config: Config,
    ledger: CostLedger,
    budgets: BudgetRegistry,
    evaluator: BudgetEvaluator,
    detector: AnomalyDetector,
    allocator: CostAllocator,
    advisor: OptimizationAdvisor,
    shutdown_tx: broadcast::Sender<()>,
}

impl FinOpsService {
    pub fn new(config: Config) -> Self {
        let ledger = CostLedger::new();
        let budgets = BudgetRegistry::new();
        let evaluator =
            BudgetEvaluator::new(ledger.clone(), budgets.clone(), config.alerts.clone());
        let detector = AnomalyDetector::new(ledger.clone(), config.anomaly.clone());
        let allocator = CostAllocator::new(ledger.clone());
        let advisor = OptimizationAdvisor::new(ledger.clone());
        let (shutdown_tx, _) = broadcast::channel(1);

        info!("FinOps service initialized");

        Self {
            config,
            ledger,
            budgets,
            evaluator,
            detector,
            allocator,
            advisor,
            shutdown_tx,
        }
    }

    // ==================== Cost tracking ====================

    /// Record a cost event and run the detection/evaluation pipeline
    ///
    /// Detection or evaluation failures are logged and do not fail the
    /// append; the event is already durable in the ledger at that point.
    pub async fn record_cost(&self, new: NewCostEvent) -> Result<CostEvent, FinOpsError> {
        let event = self.ledger.record(new).await?;

        self.detector.inspect(&event).await;
        self.evaluator.evaluate(&event.organization_id).await;

        Ok(event)
    }

    /// Query cost events, newest first
    pub async fn list_costs(&self, filter: &CostFilter) -> Vec<CostEvent> {
        self.ledger.query(filter).await
    }

    pub async fn get_cost(&self, id: Uuid) -> Option<CostEvent> {
        self.ledger.get(id).await
    }

    // ==================== Budgets ====================

    pub async fn create_budget(&self, new: NewBudget) -> Result<Budget, FinOpsError> {
        self.budgets.create(new).await
    }

    pub async fn update_budget(
        &self,
        id: Uuid,
        patch: BudgetPatch,
    ) -> Result<Budget, FinOpsError> {
        self.budgets.update(id, patch).await
    }

    /// Delete a budget and cascade its alerts
    pub async fn delete_budget(&self, id: Uuid) -> bool {
        let removed = self.budgets.remove(id).await.is_some();
        if removed {
            self.evaluator.remove_for_budget(id).await;
        }
        removed
    }

    pub async fn get_budget(&self, id: Uuid) -> Option<Budget> {
        self.budgets.get(id).await
    }

    pub async fn budgets_for_organization(&self, organization_id: &str) -> Vec<Budget> {
        self.budgets.for_organization(organization_id).await
    }

    /// Evaluate all active budgets of an organization now
    pub async fn evaluate_budgets(&self, organization_id: &str) -> Vec<BudgetAlert> {
        self.evaluator.evaluate(organization_id).await
    }

    /// Current spend percentage for one budget
    pub async fn budget_usage_percentage(&self, budget_id: Uuid) -> f64 {
        self.evaluator.usage_percentage(budget_id).await
    }

    // ==================== Alerts ====================

    pub async fn acknowledge_alert(&self, alert_id: Uuid, by: &str) -> Result<bool, FinOpsError> {
        self.evaluator.acknowledge(alert_id, by).await
    }

    pub async fn active_alerts(&self, organization_id: Option<&str>) -> Vec<BudgetAlert> {
        self.evaluator.active_alerts(organization_id).await
    }

    // ==================== Anomalies ====================

    pub async fn anomalies(&self, organization_id: Option<&str>) -> Vec<CostAnomaly> {
        self.detector.anomalies(organization_id).await
    }

    // ==================== Allocation ====================

    pub async fn allocate_cost(
        &self,
        cost_id: Uuid,
        lines: Vec<AllocationLine>,
        created_by: &str,
    ) -> Result<Vec<CostAllocation>, FinOpsError> {
        self.allocator.allocate(cost_id, lines, created_by).await
    }

    pub async fn allocations(&self, cost_id: Option<Uuid>) -> Vec<CostAllocation> {
        self.allocator.allocations_for(cost_id).await
    }

    // ==================== Optimization ====================

    pub async fn record_utilization(
        &self,
        new: NewResourceUtilization,
    ) -> Result<ResourceUtilization, FinOpsError> {
        self.advisor.record_utilization(new).await
    }

    pub async fn generate_recommendations(
        &self,
        organization_id: &str,
    ) -> Result<Vec<OptimizationRecommendation>, FinOpsError> {
        self.advisor.generate(organization_id).await
    }

    pub async fn recommendations(
        &self,
        organization_id: Option<&str>,
    ) -> Vec<OptimizationRecommendation> {
        self.advisor.recommendations(organization_id).await
    }

    // ==================== Metrics ====================

    /// Cost summary, optionally scoped to an organization and a relative
    /// period ("1h", "24h", "7d", "30d", "90d")
    pub async fn metrics(
        &self,
        organization_id: Option<&str>,
        period: Option<&str>,
    ) -> CostMetrics {
        let filter = CostFilter {
            organization_id: organization_id.map(str::to_string),
            start_date: period.map(|p| metrics::period_cutoff(p, Utc::now())),
            ..Default::default()
        };
        let events = self.ledger.query(&filter).await;
        metrics::compute(&events)
    }

    // ==================== Maintenance ====================

    pub async fn stats(&self) -> ServiceStats {
        ServiceStats {
            total_costs: self.ledger.len().await,
            total_budgets: self.budgets.len().await,
            active_alerts: self.evaluator.active_alert_count().await,
            anomalies: self.detector.len().await,
            allocations: self.allocator.len().await,
            recommendations: self.advisor.len().await,
        }
    }

    /// Drop cost events, alerts, and anomalies older than the retention
    /// window (or an explicit day count)
    pub async fn clear_old_data(&self, days: Option<u32>) {
        let days = days.unwrap_or(self.config.retention.days);
        let cutoff = Utc::now() - Duration::days(i64::from(days));

        let costs = self.ledger.clear_old_data(cutoff).await;
        let alerts = self.evaluator.clear_old_data(cutoff).await;
        let anomalies = self.detector.clear_old_data(cutoff).await;

        info!(days, costs, alerts, anomalies, "Old data cleared");
    }

    /// Seed a pair of demo budgets (config/CLI gated)
    pub async fn seed_demo_data(&self) -> Result<(), FinOpsError> {
        let budgets = [
            NewBudget {
                organization_id: "demo-org-1".to_string(),
                name: "AI Operations Budget".to_string(),
                description: "Monthly budget for AI operations".to_string(),
                amount: dec!(1000),
                currency: "USD".to_string(),
                period: BudgetPeriod::Monthly,
                start_date: None,
                end_date: None,
                threshold: 80.0,
                status: BudgetStatus::Active,
                categories: vec![
                    "ai".to_string(),
                    "openai".to_string(),
                    "azure-openai".to_string(),
                ],
                created_by: "system".to_string(),
                tags: vec!["ai".to_string(), "operations".to_string()],
                metadata: HashMap::new(),
            },
            NewBudget {
                organization_id: "demo-org-1".to_string(),
                name: "Search Operations Budget".to_string(),
                description: "Monthly budget for search operations".to_string(),
                amount: dec!(500),
                currency: "USD".to_string(),
                period: BudgetPeriod::Monthly,
                start_date: None,
                end_date: None,
                threshold: 80.0,
                status: BudgetStatus::Active,
                categories: vec![
                    "search".to_string(),
                    "bing".to_string(),
                    "google".to_string(),
                ],
                created_by: "system".to_string(),
                tags: vec!["search".to_string(), "operations".to_string()],
                metadata: HashMap::new(),
            },
        ];

        for budget in budgets {
            self.budgets.create(budget).await?;
        }
        info!("Demo budgets seeded");
        Ok(())
    }

    // ==================== Background sweep ====================

    /// Spawn the periodic budget sweep
    ///
    /// Re-evaluates every organization that has a budget, so threshold
    /// crossings caused purely by period rollover are caught without new
    /// spend. Each organization gets a bounded deadline; an org that
    /// times out is logged and skipped, never blocking the others.
    pub fn spawn_sweep(&self) {
        let budgets = self.budgets.clone();
        let evaluator = self.evaluator.clone();
        let interval_secs = self.config.sweep.interval_secs;
        let org_timeout = std::time::Duration::from_secs(self.config.sweep.org_timeout_secs);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            // The first tick fires immediately; skip it so startup does
            // not race seed data.
            interval.tick().await;

            info!(interval_secs, "Budget sweep started");

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Budget sweep received shutdown signal");
                        break;
                    }
                    _ = interval.tick() => {
                        let orgs = budgets.organization_ids().await;
                        for org in orgs {
                            match tokio::time::timeout(org_timeout, evaluator.evaluate(&org)).await {
                                Ok(created) => {
                                    if !created.is_empty() {
                                        warn!(
                                            organization_id = %org,
                                            alerts = created.len(),
                                            "Sweep raised budget alerts"
                                        );
                                    }
                                }
                                Err(_) => {
                                    error!(
                                        organization_id = %org,
                                        "Budget evaluation timed out during sweep"
                                    );
                                }
                            }
                        }
                    }
                }
            }
        });
    }

    /// Stop the background sweep
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
