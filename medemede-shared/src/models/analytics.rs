//! Daily sales summaries computed from orders

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::BTreeMap;

use super::order::{Order, OrderStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub date: NaiveDate,

    pub total_orders: i64,

    pub completed_orders: i64,

    pub cancelled_orders: i64,

    /// Sum of non-cancelled order totals, MWK
    pub revenue: i64,

    /// Revenue over non-cancelled orders, MWK, rounded down
    pub average_order_value: i64,
}

impl AnalyticsSummary {
    fn new(
        date: NaiveDate,
        total_orders: i64,
        completed_orders: i64,
        cancelled_orders: i64,
        revenue: i64,
    ) -> Self {
        let billable = total_orders - cancelled_orders;
        Self {
            date,
            total_orders,
            completed_orders,
            cancelled_orders,
            revenue,
            average_order_value: if billable > 0 { revenue / billable } else { 0 },
        }
    }
}

/// Groups orders placed in the last `days` days by UTC date, newest first
pub fn summarize(orders: &[Order], days: u32, now: DateTime<Utc>) -> Vec<AnalyticsSummary> {
    let since = now - Duration::days(i64::from(days));
    // (total, completed, cancelled, revenue)
    let mut by_day: BTreeMap<NaiveDate, (i64, i64, i64, i64)> = BTreeMap::new();

    for order in orders.iter().filter(|o| o.created_at >= since) {
        let entry = by_day.entry(order.created_at.date_naive()).or_default();
        entry.0 += 1;
        match order.status {
            OrderStatus::Completed => entry.1 += 1,
            OrderStatus::Cancelled => entry.2 += 1,
            _ => {}
        }
        if order.status != OrderStatus::Cancelled {
            entry.3 += order.total_amount;
        }
    }

    by_day
        .into_iter()
        .rev()
        .map(|(date, (total, completed, cancelled, revenue))| {
            AnalyticsSummary::new(date, total, completed, cancelled, revenue)
        })
        .collect()
}

#[derive(sqlx::FromRow)]
struct DailyRow {
    date: NaiveDate,
    total_orders: i64,
    completed_orders: i64,
    cancelled_orders: i64,
    revenue: i64,
}

/// Same aggregation as [`summarize`], pushed down to Postgres
pub async fn daily_summaries(pool: &PgPool, days: u32) -> Result<Vec<AnalyticsSummary>, sqlx::Error> {
    let rows = sqlx::query_as::<_, DailyRow>(
        r#"
        SELECT
            (created_at AT TIME ZONE 'UTC')::date AS date,
            COUNT(*) AS total_orders,
            COUNT(*) FILTER (WHERE status = 'completed') AS completed_orders,
            COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled_orders,
            COALESCE(SUM(total_amount) FILTER (WHERE status <> 'cancelled'), 0)::BIGINT AS revenue
        FROM orders
        WHERE created_at >= NOW() - make_interval(days => $1)
        GROUP BY 1
        ORDER BY 1 DESC
        "#,
    )
    .bind(days as i32)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| {
            AnalyticsSummary::new(
                r.date,
                r.total_orders,
                r.completed_orders,
                r.cancelled_orders,
                r.revenue,
            )
        })
        .collect())
}
