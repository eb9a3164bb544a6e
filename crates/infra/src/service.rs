//! `RetailService`: the facade the point of sale and back office talk to.
//!
//! Wires the sale writer, catalog, registry, reports and insights over one
//! shared [`RetailStore`]. The store's commit timeout is fixed when the store
//! is built (see [`RetailConfig::commit_timeout`]).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use storeline_catalog::{NewProduct, Product, ProductId, ProductPatch};
use storeline_customers::{Customer, CustomerId, CustomerRegistration, CustomerSuggestion};
use storeline_insights::{
    CustomerInsights, DiscountSource, PortfolioDashboard, Promotion, PromotionComposer,
    RandomDiscounts,
};
use storeline_sales::{CustomerRef, Sale, SaleId, SellerId};

use crate::catalog::CatalogService;
use crate::clock::{Clock, SystemClock};
use crate::config::{RetailConfig, StockPolicy};
use crate::customer_stats::CustomerStatsAggregator;
use crate::error::{SaleWriteError, ServiceError, ServiceResult};
use crate::insights::InsightsService;
use crate::inventory::InventoryLedger;
use crate::registry::{CustomerRegistry, InactiveCustomer};
use crate::reports::{ProductStats, SalesReports, SalesStats, TopProduct, TopSeller};
use crate::sale_writer::{SaleFollowUp, SaleSubmission, TransactionalSaleWriter};
use crate::store::{RetailStore, StoreError};

type SharedStore = Arc<dyn RetailStore>;
type SharedClock = Arc<dyn Clock>;

/// Which customer a sale is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CustomerSelector {
    Existing { id: CustomerId },
    /// Create the customer, or update the one with the same id or phone.
    Register(CustomerRegistration),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSaleRequest {
    pub submission: SaleSubmission,
    #[serde(default)]
    pub customer: Option<CustomerSelector>,
}

impl RecordSaleRequest {
    pub fn anonymous(submission: SaleSubmission) -> Self {
        Self {
            submission,
            customer: None,
        }
    }

    pub fn for_customer(submission: SaleSubmission, id: CustomerId) -> Self {
        Self {
            submission,
            customer: Some(CustomerSelector::Existing { id }),
        }
    }

    pub fn registering(submission: SaleSubmission, registration: CustomerRegistration) -> Self {
        Self {
            submission,
            customer: Some(CustomerSelector::Register(registration)),
        }
    }
}

pub struct RetailServiceBuilder {
    store: SharedStore,
    clock: Option<SharedClock>,
    discounts: Option<Arc<dyn DiscountSource>>,
    follow_up: Option<Arc<dyn SaleFollowUp>>,
    config: RetailConfig,
}

impl RetailServiceBuilder {
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn discounts(mut self, discounts: Arc<dyn DiscountSource>) -> Self {
        self.discounts = Some(discounts);
        self
    }

    /// Replace the default post-commit step (inline customer stats update),
    /// e.g. with a bus publisher feeding the stats worker.
    pub fn follow_up(mut self, follow_up: Arc<dyn SaleFollowUp>) -> Self {
        self.follow_up = Some(follow_up);
        self
    }

    pub fn config(mut self, config: RetailConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> RetailService {
        let config = self.config;
        let store = self.store;
        let clock: SharedClock = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let discounts: Arc<dyn DiscountSource> = match self.discounts {
            Some(discounts) => discounts,
            None => Arc::new(RandomDiscounts),
        };
        let follow_up: Arc<dyn SaleFollowUp> = match self.follow_up {
            Some(follow_up) => follow_up,
            None => Arc::new(
                CustomerStatsAggregator::new(store.clone())
                    .with_max_attempts(config.stats_max_attempts),
            ),
        };

        RetailService {
            writer: TransactionalSaleWriter::new(store.clone(), clock.clone(), follow_up)
                .with_stock_policy(config.stock_policy),
            catalog: CatalogService::new(
                InventoryLedger::new(store.clone(), config.stock_policy),
                clock.clone(),
                config.low_stock_threshold,
            ),
            registry: CustomerRegistry::new(store.clone(), clock.clone()),
            reports: SalesReports::new(store.clone(), clock.clone()),
            insights: InsightsService::new(store.clone(), clock, discounts).with_composer(
                PromotionComposer::new().with_validity_days(config.promotion_validity_days),
            ),
            store,
            config,
        }
    }
}

pub struct RetailService {
    store: SharedStore,
    config: RetailConfig,
    writer: TransactionalSaleWriter<SharedStore, SharedClock, Arc<dyn SaleFollowUp>>,
    catalog: CatalogService<SharedStore, SharedClock>,
    registry: CustomerRegistry<SharedStore, SharedClock>,
    reports: SalesReports<SharedStore, SharedClock>,
    insights: InsightsService<SharedStore, SharedClock>,
}

impl RetailService {
    pub fn builder(store: SharedStore) -> RetailServiceBuilder {
        RetailServiceBuilder {
            store,
            clock: None,
            discounts: None,
            follow_up: None,
            config: RetailConfig::default(),
        }
    }

    pub fn config(&self) -> &RetailConfig {
        &self.config
    }

    pub fn stock_policy(&self) -> StockPolicy {
        self.writer.stock_policy()
    }

    // --- sales ---

    /// Validate, resolve the customer, then commit the sale with its stock
    /// decrements. Nothing is written when validation fails.
    ///
    /// A customer registered by the request is committed in the sale's
    /// transaction, so a failed sale leaves no customer behind.
    #[instrument(skip_all, fields(seller_id = %request.submission.seller_id), err)]
    pub fn record_sale(&self, request: RecordSaleRequest) -> ServiceResult<Sale> {
        let RecordSaleRequest {
            mut submission,
            customer,
        } = request;
        submission.validate()?;

        let registration = match customer {
            Some(CustomerSelector::Existing { id }) => {
                submission.customer = Some(customer_ref(self.registry.customer(id)?));
                return Ok(self.writer.record(submission)?);
            }
            Some(CustomerSelector::Register(registration)) => registration,
            None => return Ok(self.writer.record(submission)?),
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            let (customer, op) = self.registry.prepare(&registration)?;
            let mut attempt = submission.clone();
            attempt.customer = Some(customer_ref(customer));
            match self.writer.record_with(attempt, vec![op]) {
                // The customer's version moved between read and commit.
                Err(SaleWriteError::Transaction(StoreError::Conflict(reason)))
                    if attempts < self.config.stats_max_attempts =>
                {
                    debug!(attempts, reason = %reason, "registering sale conflicted; retrying");
                }
                result => return Ok(result?),
            }
        }
    }

    pub fn sale(&self, id: SaleId) -> ServiceResult<Sale> {
        self.store
            .sale(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("sale {id}")))
    }

    // --- customers ---

    pub fn register_customer(&self, registration: &CustomerRegistration) -> ServiceResult<Customer> {
        self.registry.register(registration)
    }

    pub fn customer(&self, id: CustomerId) -> ServiceResult<Customer> {
        self.registry.customer(id)
    }

    pub fn customer_by_phone(&self, phone: &str) -> ServiceResult<Option<Customer>> {
        self.registry.by_phone(phone)
    }

    pub fn customer_by_email(&self, email: &str) -> ServiceResult<Option<Customer>> {
        self.registry.by_email(email)
    }

    pub fn search_customers(&self, term: &str) -> ServiceResult<Vec<CustomerSuggestion>> {
        self.registry.search(term)
    }

    /// `days` defaults to the configured inactivity window.
    pub fn inactive_customers(&self, days: Option<i64>) -> ServiceResult<Vec<InactiveCustomer>> {
        self.registry
            .inactive(days.unwrap_or(self.config.inactive_days))
    }

    // --- insights ---

    pub fn customer_insights(&self, id: CustomerId) -> ServiceResult<CustomerInsights> {
        self.insights.customer_insights(id)
    }

    pub fn compose_promotion(&self, id: CustomerId) -> ServiceResult<Promotion> {
        self.insights.compose_promotion(id)
    }

    pub fn promotion_history(&self, id: CustomerId) -> ServiceResult<Vec<Promotion>> {
        self.insights.promotion_history(id)
    }

    pub fn portfolio_dashboard(&self) -> ServiceResult<PortfolioDashboard> {
        self.insights.portfolio_dashboard()
    }

    // --- catalog ---

    pub fn add_product(&self, product: NewProduct) -> ServiceResult<Product> {
        self.catalog.add(product)
    }

    pub fn update_product(&self, id: ProductId, patch: &ProductPatch) -> ServiceResult<Product> {
        self.catalog.update(id, patch)
    }

    pub fn remove_product(&self, id: ProductId) -> ServiceResult<()> {
        self.catalog.remove(id)
    }

    pub fn product(&self, id: ProductId) -> ServiceResult<Product> {
        self.catalog.product(id)
    }

    pub fn products(&self) -> ServiceResult<Vec<Product>> {
        self.catalog.products()
    }

    pub fn restock(&self, id: ProductId, quantity: i64) -> ServiceResult<Product> {
        self.catalog.restock(id, quantity)
    }

    pub fn low_stock(&self) -> ServiceResult<Vec<Product>> {
        self.catalog.low_stock()
    }

    // --- reports ---

    pub fn product_stats(&self) -> ServiceResult<ProductStats> {
        self.reports.product_stats()
    }

    pub fn sales_stats(&self, seller_id: Option<&SellerId>) -> ServiceResult<SalesStats> {
        self.reports.sales_stats(seller_id)
    }

    pub fn top_products(&self, limit: usize) -> ServiceResult<Vec<TopProduct>> {
        self.reports.top_products(limit)
    }

    pub fn top_sellers(&self, limit: usize) -> ServiceResult<Vec<TopSeller>> {
        self.reports.top_sellers(limit)
    }

    pub fn sales_by_seller(&self, seller_id: &SellerId, limit: usize) -> ServiceResult<Vec<Sale>> {
        self.reports.sales_by_seller(seller_id, limit)
    }
}

fn customer_ref(customer: Customer) -> CustomerRef {
    CustomerRef {
        id: customer.id,
        name: customer.name,
        phone: customer.phone,
    }
}
