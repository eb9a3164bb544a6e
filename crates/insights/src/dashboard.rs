use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeline_core::Money;
use storeline_customers::{Customer, CustomerId};

use crate::segmentation::PopulationSegment;

pub const BEST_CUSTOMERS_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationCounts {
    pub new: usize,
    pub inactive: usize,
    pub vip: usize,
    pub frequent: usize,
    pub regular: usize,
    pub occasional: usize,
}

impl PopulationCounts {
    fn add(&mut self, segment: PopulationSegment) {
        match segment {
            PopulationSegment::New => self.new += 1,
            PopulationSegment::Inactive => self.inactive += 1,
            PopulationSegment::Vip => self.vip += 1,
            PopulationSegment::Frequent => self.frequent += 1,
            PopulationSegment::Regular => self.regular += 1,
            PopulationSegment::Occasional => self.occasional += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerValue {
    pub id: CustomerId,
    pub name: String,
    pub total_spent: Money,
    pub total_purchases: u64,
    pub average_ticket: Money,
}

/// Portfolio-level view over all customers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioDashboard {
    pub total_customers: usize,
    pub active_customers: usize,
    pub segmentation: PopulationCounts,
    pub total_revenue: Money,
    pub average_customer_value: Money,
    /// Percentage of customers with at least one purchase, one decimal.
    pub retention_rate: f64,
    pub best_customers: Vec<CustomerValue>,
    pub inactive_alert: usize,
    /// One decimal.
    pub vip_percentage: f64,
}

impl PortfolioDashboard {
    pub fn build(customers: &[Customer], now: DateTime<Utc>) -> Self {
        let mut segmentation = PopulationCounts::default();
        let mut best: Vec<CustomerValue> = Vec::new();
        let mut total_revenue = Money::ZERO;

        for customer in customers {
            let agg = &customer.aggregate;
            total_revenue = total_revenue.saturating_add(agg.total_spent);
            segmentation.add(PopulationSegment::classify(
                agg.total_purchases,
                agg.last_purchase_date,
                now,
            ));

            if !agg.total_spent.is_zero() {
                best.push(CustomerValue {
                    id: customer.id,
                    name: customer.name.clone(),
                    total_spent: agg.total_spent,
                    total_purchases: agg.total_purchases,
                    average_ticket: agg.average_ticket,
                });
            }
        }

        best.sort_by(|a, b| b.total_spent.cmp(&a.total_spent));
        best.truncate(BEST_CUSTOMERS_LIMIT);

        let total = customers.len();
        let with_purchases = customers
            .iter()
            .filter(|c| c.aggregate.has_purchases())
            .count();

        Self {
            total_customers: total,
            active_customers: customers.iter().filter(|c| c.is_active()).count(),
            segmentation,
            total_revenue,
            average_customer_value: total_revenue.div_rounded(total as u64),
            retention_rate: percentage(with_purchases, total),
            best_customers: best,
            inactive_alert: segmentation.inactive,
            vip_percentage: percentage(segmentation.vip, total),
        }
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = part as f64 / total as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use storeline_customers::CustomerRegistration;

    fn customer_with(name: &str, purchases: u64, spent_each: u64, last_days_ago: i64, now: DateTime<Utc>) -> Customer {
        let mut c = Customer::register(
            CustomerId::generate(),
            &CustomerRegistration::new(name, "555-0101"),
            now,
        )
        .unwrap();
        for _ in 0..purchases {
            c.record_purchase(Money::from_major(spent_each), now - Duration::days(last_days_ago));
        }
        c
    }

    #[test]
    fn empty_portfolio_is_all_zero() {
        let dash = PortfolioDashboard::build(&[], Utc::now());
        assert_eq!(dash.total_customers, 0);
        assert_eq!(dash.retention_rate, 0.0);
        assert_eq!(dash.vip_percentage, 0.0);
        assert_eq!(dash.average_customer_value, Money::ZERO);
    }

    #[test]
    fn segments_and_ranks_customers() {
        let now = Utc::now();
        let customers = vec![
            customer_with("New", 0, 0, 0, now),
            customer_with("Vip", 10, 20, 1, now),
            customer_with("Gone", 3, 100, 120, now),
        ];

        let dash = PortfolioDashboard::build(&customers, now);

        assert_eq!(dash.total_customers, 3);
        assert_eq!(dash.active_customers, 3);
        assert_eq!(dash.segmentation.new, 1);
        assert_eq!(dash.segmentation.vip, 1);
        assert_eq!(dash.segmentation.inactive, 1);
        assert_eq!(dash.inactive_alert, 1);
        assert_eq!(dash.total_revenue, Money::from_major(500));
        assert_eq!(dash.retention_rate, 66.7);
        assert_eq!(dash.vip_percentage, 33.3);

        let names: Vec<_> = dash.best_customers.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Gone", "Vip"]);
    }
}
