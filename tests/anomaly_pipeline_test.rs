//! End-to-end tests for anomaly detection, allocation, and metrics
//! through the service facade

use finops::allocation::AllocationLine;
use finops::ledger::{CostFilter, NewCostEvent};
use finops::{AnomalyType, Config, FinOpsError, FinOpsService, Severity};

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn cost_at(org: &str, service: &str, amount: Decimal, seconds_ago: i64) -> NewCostEvent {
    NewCostEvent {
        organization_id: org.to_string(),
        service: service.to_string(),
        operation: "completion".to_string(),
        resource: "gpt-4".to_string(),
        amount,
        currency: "USD".to_string(),
        timestamp: Some(Utc::now() - Duration::seconds(seconds_ago)),
        ..Default::default()
    }
}

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

#[tokio::test]
async fn test_spike_detected_after_enough_history() -> anyhow::Result<()> {
    let service = FinOpsService::new(Config::default());

    // Eight alternating costs: mean 10, population stddev 2
    for i in 0..8 {
        let amount = if i % 2 == 0 { dec!(8) } else { dec!(12) };
        service
            .record_cost(cost_at("org-a", "openai", amount, 100 - i))
            .await?;
    }
    assert!(service.anomalies(Some("org-a")).await.is_empty());

    // 15 exceeds mean + 2 sigma (14) but not mean + 3 sigma (16)
    service.record_cost(cost_at("org-a", "openai", dec!(15), 10)).await?;
    let anomalies = service.anomalies(Some("org-a")).await;
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].anomaly_type, AnomalyType::Spike);
    assert_eq!(anomalies[0].severity, Severity::High);
    assert_eq!(anomalies[0].affected_services, vec!["openai".to_string()]);

    // Other organizations are unaffected
    assert!(service.anomalies(Some("org-b")).await.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_flat_history_never_flags() -> anyhow::Result<()> {
    let service = FinOpsService::new(Config::default());

    for i in 0..10 {
        service
            .record_cost(cost_at("org-a", "openai", dec!(10), 100 - i))
            .await?;
    }
    service.record_cost(cost_at("org-a", "openai", dec!(10.01), 10)).await?;

    assert!(service.anomalies(Some("org-a")).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_allocation_all_or_nothing() -> anyhow::Result<()> {
    let service = FinOpsService::new(Config::default());
    let event = service
        .record_cost(cost_at("org-a", "openai", dec!(200), 0))
        .await?;

    // 99% split rejected wholesale
    let result = service
        .allocate_cost(
            event.id,
            vec![line("dept-a", dec!(60)), line("dept-b", dec!(39))],
            "tester",
        )
        .await;
    assert!(matches!(result, Err(FinOpsError::Validation(_))));
    assert!(service.allocations(Some(event.id)).await.is_empty());

    // Exact 100% produces lines summing to the original amount
    let created = service
        .allocate_cost(
            event.id,
            vec![line("dept-a", dec!(60)), line("dept-b", dec!(40))],
            "tester",
        )
        .await?;
    let total: Decimal = created.iter().map(|a| a.amount).sum();
    assert_eq!(total, dec!(200));

    Ok(())
}

#[tokio::test]
async fn test_metrics_summary() -> anyhow::Result<()> {
    let service = FinOpsService::new(Config::default());

    service.record_cost(cost_at("org-a", "openai", dec!(30), 0)).await?;
    service.record_cost(cost_at("org-a", "storage", dec!(70), 0)).await?;
    service.record_cost(cost_at("org-b", "openai", dec!(900), 0)).await?;

    let metrics = service.metrics(Some("org-a"), None).await;
    assert_eq!(metrics.total_cost, dec!(100));
    assert_eq!(metrics.average_cost, dec!(50));
    assert_eq!(metrics.cost_by_service["openai"], dec!(30));
    assert_eq!(metrics.top_expenses[0].amount, dec!(70));

    // Newest-first ordering on the raw query path
    let costs = service.list_costs(&CostFilter::for_organization("org-a")).await;
    assert_eq!(costs.len(), 2);
    assert!(costs[0].timestamp >= costs[1].timestamp);

    Ok(())
}
