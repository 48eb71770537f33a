//! Statistical anomaly detection
//!
//! Flags a newly recorded cost as anomalous relative to the same-service,
//! same-organization history: a spike above mean + 2 standard deviations,
//! escalating to critical above mean + 3. Detection is spike-only; drops
//! below the mean are deliberately not flagged.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::config::AnomalyConfig;
use crate::ledger::{CostEvent, CostLedger};
use crate::types::Severity;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyType {
    Spike,
    Drop,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyStatus {
    Detected,
    Investigating,
    Resolved,
    FalsePositive,
}

/// Cost delta attributable to the anomalous event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyImpact {
    pub cost_increase: Decimal,
    /// None when the historical mean is zero (percentage undefined)
    pub percentage_increase: Option<f64>,
}

/// History statistics behind a detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyStats {
    pub average_cost: f64,
    pub standard_deviation: f64,
    pub threshold: f64,
}

/// A detected statistical outlier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostAnomaly {
    pub id: Uuid,
    pub organization_id: String,
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub description: String,
    pub detected_at: DateTime<Utc>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub affected_services: Vec<String>,
    pub affected_resources: Vec<String>,
    pub impact: AnomalyImpact,
    pub status: AnomalyStatus,
    pub stats: AnomalyStats,
}

/// Mean and population standard deviation
pub fn mean_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Detects cost spikes against per-(service, organization) history
#[derive(Clone)]
pub struct AnomalyDetector {
    ledger: CostLedger,
    anomalies: Arc<RwLock<Vec<CostAnomaly>>>,
    config: AnomalyConfig,
}

impl AnomalyDetector {
    pub fn new(ledger: CostLedger, config: AnomalyConfig) -> Self {
        Self {
            ledger,
            anomalies: Arc::new(RwLock::new(Vec::new())),
            config,
        }
    }

    /// Inspect a just-recorded cost event; returns the anomaly if one
    /// was detected
    ///
    /// Skips when fewer than `min_history` prior samples exist, and on
    /// zero-variance histories (a flat history makes the threshold
    /// degenerate and any increase would false-positive).
    pub async fn inspect(&self, event: &CostEvent) -> Option<CostAnomaly> {
        let history = self
            .ledger
            .amounts_before(&event.service, &event.organization_id, event.timestamp)
            .await;

        if history.len() < self.config.min_history {
            return None;
        }

        let amounts: Vec<f64> = history.iter().filter_map(|a| a.to_f64()).collect();
        let (mean, stddev) = mean_stddev(&amounts);
        if stddev == 0.0 {
            return None;
        }

        let amount = event.amount.to_f64()?;
        let threshold = mean + self.config.sigma_threshold * stddev;
        if amount <= threshold {
            return None;
        }

        let severity = if amount > mean + self.config.critical_sigma * stddev {
            Severity::Critical
        } else {
            Severity::High
        };

        let percentage_increase = if mean != 0.0 {
            Some((amount - mean) / mean * 100.0)
        } else {
            None
        };

        let mean_dec = Decimal::from_f64_retain(mean).unwrap_or_default();
        let anomaly = CostAnomaly {
            id: Uuid::new_v4(),
            organization_id: event.organization_id.clone(),
            anomaly_type: AnomalyType::Spike,
            severity,
            description: format!(
                "Cost spike detected for {}: {} (avg: {:.2})",
                event.service, event.amount, mean
            ),
            detected_at: Utc::now(),
            period_start: event.timestamp,
            period_end: event.timestamp,
            affected_services: vec![event.service.clone()],
            affected_resources: vec![event.resource.clone()],
            impact: AnomalyImpact {
                cost_increase: event.amount - mean_dec,
                percentage_increase,
            },
            status: AnomalyStatus::Detected,
            stats: AnomalyStats {
                average_cost: mean,
                standard_deviation: stddev,
                threshold,
            },
        };

        self.anomalies.write().await.push(anomaly.clone());

        warn!(
            service = %event.service,
            amount = %event.amount,
            average_cost = mean,
            severity = %anomaly.severity,
            "Cost anomaly detected"
        );

        Some(anomaly)
    }

    /// Detected anomalies, optionally scoped to one organization,
    /// newest first
    pub async fn anomalies(&self, organization_id: Option<&str>) -> Vec<CostAnomaly> {
        let anomalies = self.anomalies.read().await;
        let mut matched: Vec<CostAnomaly> = anomalies
            .iter()
            .filter(|a| organization_id.map_or(true, |org| a.organization_id == org))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        matched
    }

    pub async fn len(&self) -> usize {
        self.anomalies.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop anomalies detected before the cutoff
    pub async fn clear_old_data(&self, cutoff: DateTime<Utc>) -> usize {
        let mut anomalies = self.anomalies.write().await;
        let before = anomalies.len();
        anomalies.retain(|a| a.detected_at >= cutoff);
        before - anomalies.len()
    }
}
