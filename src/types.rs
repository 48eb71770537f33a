//! Shared types used across modules
//!
//! This module contains types that are used by multiple modules
//! to avoid circular dependencies.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity of an alert or anomaly
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Direction of spend over the trailing analysis window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Increasing => write!(f, "increasing"),
            TrendDirection::Decreasing => write!(f, "decreasing"),
            TrendDirection::Stable => write!(f, "stable"),
        }
    }
}

/// Service error taxonomy
///
/// Validation failures carry every failing field so a caller can fix the
/// whole request in one round trip. Mutating operations never partially
/// apply on error.
#[derive(Debug, Error)]
pub enum FinOpsError {
    /// One or more invariants were violated; no state was changed
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// The referenced entity does not exist
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// Unexpected failure inside a computation; logged at the boundary
    #[error("internal error: {0}")]
    Internal(String),
}

impl FinOpsError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        FinOpsError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn validation(problem: impl Into<String>) -> Self {
        FinOpsError::Validation(vec![problem.into()])
    }
}
