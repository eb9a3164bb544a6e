//! Catalog and sales reporting over committed state.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use storeline_catalog::{ProductId, StockStatus};
use storeline_core::Money;
use storeline_sales::{Sale, SellerId};

use crate::clock::Clock;
use crate::error::ServiceResult;
use crate::store::{RetailStore, SaleFilter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStats {
    pub total_products: usize,
    pub low_stock: usize,
    pub out_of_stock: usize,
    /// Product count per category.
    pub categories: BTreeMap<String, usize>,
    pub average_price: Money,
    pub inventory_value: Money,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub count: u64,
    pub revenue: Money,
}

impl PeriodTotals {
    fn add(&mut self, sale: &Sale) {
        self.count += 1;
        self.revenue = self.revenue.saturating_add(sale.total());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesStats {
    pub total: PeriodTotals,
    pub today: PeriodTotals,
    /// Since the most recent Sunday, 00:00 UTC.
    pub week: PeriodTotals,
    pub month: PeriodTotals,
    pub average_ticket: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopProduct {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i64,
    pub revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopSeller {
    pub seller_id: SellerId,
    pub name: String,
    pub sales: u64,
    pub revenue: Money,
}

#[derive(Debug, Clone)]
pub struct SalesReports<S, C> {
    store: S,
    clock: C,
}

impl<S: RetailStore, C: Clock> SalesReports<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn product_stats(&self) -> ServiceResult<ProductStats> {
        let products = self.store.products()?;

        let mut categories = BTreeMap::new();
        let mut low_stock = 0;
        let mut out_of_stock = 0;
        let mut price_sum = Money::ZERO;
        let mut inventory_value = Money::ZERO;

        for product in &products {
            *categories.entry(product.category.clone()).or_insert(0) += 1;
            match product.stock_status() {
                StockStatus::Low => low_stock += 1,
                StockStatus::OutOfStock => out_of_stock += 1,
                StockStatus::InStock => {}
            }
            price_sum = price_sum.saturating_add(product.price);
            inventory_value = inventory_value.saturating_add(product.inventory_value());
        }

        Ok(ProductStats {
            total_products: products.len(),
            low_stock,
            out_of_stock,
            categories,
            average_price: price_sum.div_rounded(products.len() as u64),
            inventory_value,
        })
    }

    /// Counts and revenue for all time, today, this week and this month,
    /// optionally restricted to one seller.
    pub fn sales_stats(&self, seller_id: Option<&SellerId>) -> ServiceResult<SalesStats> {
        let filter = SaleFilter {
            seller_id: seller_id.cloned(),
            ..SaleFilter::default()
        };
        let sales = self.store.sales(&filter)?;

        let now = self.clock.now();
        let today_start = start_of_day(now);
        let week_start =
            today_start - Duration::days(i64::from(now.weekday().num_days_from_sunday()));
        let month_start = today_start - Duration::days(i64::from(now.day0()));

        let mut stats = SalesStats {
            total: PeriodTotals::default(),
            today: PeriodTotals::default(),
            week: PeriodTotals::default(),
            month: PeriodTotals::default(),
            average_ticket: Money::ZERO,
        };

        for sale in &sales {
            let at = sale.recorded_at();
            stats.total.add(sale);
            if at >= today_start {
                stats.today.add(sale);
            }
            if at >= week_start {
                stats.week.add(sale);
            }
            if at >= month_start {
                stats.month.add(sale);
            }
        }
        stats.average_ticket = stats.total.revenue.div_rounded(stats.total.count);
        Ok(stats)
    }

    /// Best sellers by quantity. Ties keep the product first sold.
    pub fn top_products(&self, limit: usize) -> ServiceResult<Vec<TopProduct>> {
        let mut order: Vec<ProductId> = Vec::new();
        let mut totals: HashMap<ProductId, TopProduct> = HashMap::new();

        for sale in self.store.sales(&SaleFilter::all())? {
            for line in sale.lines() {
                let entry = totals.entry(line.product_id).or_insert_with(|| {
                    order.push(line.product_id);
                    TopProduct {
                        product_id: line.product_id,
                        name: line.name.clone(),
                        quantity: 0,
                        revenue: Money::ZERO,
                    }
                });
                entry.quantity += line.quantity;
                entry.revenue = entry
                    .revenue
                    .saturating_add(line.subtotal().unwrap_or(Money::ZERO));
            }
        }

        let mut ranked: Vec<TopProduct> =
            order.iter().filter_map(|id| totals.remove(id)).collect();
        ranked.sort_by(|a, b| b.quantity.cmp(&a.quantity));
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// Sellers by revenue.
    pub fn top_sellers(&self, limit: usize) -> ServiceResult<Vec<TopSeller>> {
        let mut totals: BTreeMap<SellerId, TopSeller> = BTreeMap::new();

        for sale in self.store.sales(&SaleFilter::all())? {
            let Some(seller) = sale.seller() else {
                continue;
            };
            let entry = totals
                .entry(seller.id.clone())
                .or_insert_with(|| TopSeller {
                    seller_id: seller.id.clone(),
                    name: seller.name.clone(),
                    sales: 0,
                    revenue: Money::ZERO,
                });
            entry.sales += 1;
            entry.revenue = entry.revenue.saturating_add(sale.total());
        }

        let mut ranked: Vec<TopSeller> = totals.into_values().collect();
        ranked.sort_by(|a, b| b.revenue.cmp(&a.revenue));
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// A seller's most recent sales, newest first.
    pub fn sales_by_seller(&self, seller_id: &SellerId, limit: usize) -> ServiceResult<Vec<Sale>> {
        let mut sales = self.store.sales(&SaleFilter::for_seller(seller_id.clone()))?;
        sales.reverse();
        sales.truncate(limit);
        Ok(sales)
    }
}

fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&at.date_naive().and_time(NaiveTime::MIN))
}
