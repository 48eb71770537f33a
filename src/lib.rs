//! FinOps - cost tracking and budget enforcement library
//!
//! An in-memory FinOps service with:
//! - Append-only cost ledger with filtered queries
//! - Budget registry with calendar-period math and threshold alerting
//! - Statistical (z-score style) cost anomaly detection
//! - Percentage-based cost allocation across cost centers
//! - Heuristic optimization recommendations and cost analytics
//!
//! # Example
//!
//! ```ignore
//! use finops::config::Config;
//! use finops::service::FinOpsService;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = FinOpsService::new(Config::load()?);
//!     let event = service.record_cost(my_cost).await?;
//!     println!("recorded {}", event.id);
//!     Ok(())
//! }
//! ```

// Core modules (order matters for cross-module dependencies)
pub mod types;
pub mod config;
pub mod ledger; // Must come before budget/anomaly since both read the ledger
pub mod budget;
pub mod anomaly;
pub mod allocation;
pub mod optimize;
pub mod metrics;
pub mod service;
pub mod server;
pub mod cli;

// Re-export commonly used types for convenience
pub use types::{FinOpsError, Severity, TrendDirection};

pub use ledger::{CostEvent, CostFilter, CostLedger, NewCostEvent};

pub use budget::{
    evaluator::{AlertType, BudgetAlert, BudgetEvaluator},
    Budget, BudgetPatch, BudgetPeriod, BudgetRegistry, BudgetStatus, NewBudget,
};

pub use anomaly::{AnomalyDetector, AnomalyType, CostAnomaly};

pub use allocation::{AllocationLine, CostAllocation, CostAllocator};

pub use optimize::{
    NewResourceUtilization, OptimizationAdvisor, OptimizationRecommendation, ResourceUtilization,
};

pub use metrics::CostMetrics;

pub use service::FinOpsService;

pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - FinOps cost tracking and budget enforcement", NAME, VERSION)
}
