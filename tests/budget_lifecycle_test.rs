//! End-to-end test for the budget alerting pipeline
//!
//! Walks a monthly budget from quiet spend through a threshold warning
//! and into exceeded state, checking alert severities and independence
//! at every step.

use finops::budget::{BudgetPeriod, BudgetStatus, NewBudget};
use finops::ledger::NewCostEvent;
use finops::{AlertType, Config, FinOpsService, Severity};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

fn cost(org: &str, service: &str, amount: Decimal) -> NewCostEvent {
    NewCostEvent {
        organization_id: org.to_string(),
        service: service.to_string(),
        operation: "completion".to_string(),
        resource: "gpt-4".to_string(),
        amount,
        currency: "USD".to_string(),
        ..Default::default()
    }
}

fn monthly_budget(org: &str, amount: Decimal, threshold: f64) -> NewBudget {
    NewBudget {
        organization_id: org.to_string(),
        name: "AI Operations Budget".to_string(),
        description: "Monthly budget for AI operations".to_string(),
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
async fn test_budget_walks_from_quiet_to_exceeded() -> anyhow::Result<()> {
    let service = FinOpsService::new(Config::default());
    let budget = service
        .create_budget(monthly_budget("org-a", dec!(1000), 80.0))
        .await?;

    // 500 of 1000 (50%): below threshold, no alert
    service.record_cost(cost("org-a", "openai", dec!(500))).await?;
    assert!(service.active_alerts(Some("org-a")).await.is_empty());
    let pct = service.budget_usage_percentage(budget.id).await;
    assert!((pct - 50.0).abs() < 0.001, "expected 50%, got {pct}");

    // +400 = 900 (90%): threshold alert, medium severity (>=85, <95)
    service.record_cost(cost("org-a", "openai", dec!(400))).await?;
    let alerts = service.active_alerts(Some("org-a")).await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::Threshold);
    assert_eq!(alerts[0].severity, Severity::Medium);
    assert!((alerts[0].percentage - 90.0).abs() < 0.001);

    // +200 = 1100 (110%): exceeded alert joins the threshold alert
    service.record_cost(cost("org-a", "openai", dec!(200))).await?;
    let alerts = service.active_alerts(Some("org-a")).await;
    assert_eq!(alerts.len(), 2);

    let exceeded = alerts
        .iter()
        .find(|a| a.alert_type == AlertType::Exceeded)
        .expect("exceeded alert present");
    assert_eq!(exceeded.severity, Severity::Critical);

    let threshold = alerts
        .iter()
        .find(|a| a.alert_type == AlertType::Threshold)
        .expect("threshold alert still present");
    assert!(!threshold.acknowledged);

    // Acknowledging one leaves the other active
    assert!(service.acknowledge_alert(exceeded.id, "ops").await?);
    let remaining = service.active_alerts(Some("org-a")).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].alert_type, AlertType::Threshold);

    Ok(())
}

#[tokio::test]
async fn test_costs_outside_categories_do_not_count() -> anyhow::Result<()> {
    let service = FinOpsService::new(Config::default());
    let budget = service
        .create_budget(monthly_budget("org-b", dec!(100), 80.0))
        .await?;

    service.record_cost(cost("org-b", "storage", dec!(1000))).await?;
    assert!(service.active_alerts(Some("org-b")).await.is_empty());
    assert_eq!(service.budget_usage_percentage(budget.id).await, 0.0);

    Ok(())
}

#[tokio::test]
async fn test_all_sentinel_counts_every_service() -> anyhow::Result<()> {
    let service = FinOpsService::new(Config::default());
    let mut budget = monthly_budget("org-c", dec!(100), 80.0);
    budget.categories = vec!["all".to_string()];
    service.create_budget(budget).await?;

    service.record_cost(cost("org-c", "storage", dec!(50))).await?;
    service.record_cost(cost("org-c", "openai", dec!(45))).await?;

    let alerts = service.active_alerts(Some("org-c")).await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::Threshold);
    assert_eq!(alerts[0].severity, Severity::High);

    Ok(())
}
