//! Customer insights and promotions over committed history.

use std::sync::Arc;

use tracing::{debug, info, warn};

use storeline_core::ExpectedVersion;
use storeline_customers::{Customer, CustomerId};
use storeline_insights::{CustomerInsights, DiscountSource, PortfolioDashboard, Promotion, PromotionComposer};

use crate::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::store::{RetailStore, SaleFilter, WriteOp};

pub struct InsightsService<S, C> {
    store: S,
    clock: C,
    composer: PromotionComposer,
    discounts: Arc<dyn DiscountSource>,
}

impl<S: RetailStore, C: Clock> InsightsService<S, C> {
    pub fn new(store: S, clock: C, discounts: Arc<dyn DiscountSource>) -> Self {
        Self {
            store,
            clock,
            composer: PromotionComposer::new(),
            discounts,
        }
    }

    pub fn with_composer(mut self, composer: PromotionComposer) -> Self {
        self.composer = composer;
        self
    }

    /// Favorites, purchase patterns and recommendations for one customer.
    ///
    /// The computed favorites are written back to the customer aggregate; a
    /// failed write-back is logged and does not fail the query.
    pub fn customer_insights(&self, customer_id: CustomerId) -> ServiceResult<CustomerInsights> {
        let customer = self.load_customer(customer_id)?;
        let insights = self.build(&customer)?;
        self.write_back_favorites(customer, &insights);
        Ok(insights)
    }

    /// Compose and persist a personalized promotion.
    pub fn compose_promotion(&self, customer_id: CustomerId) -> ServiceResult<Promotion> {
        let customer = self.load_customer(customer_id)?;
        let insights = self.build(&customer)?;

        let promotion =
            self.composer
                .compose(&customer, &insights, self.discounts.as_ref(), self.clock.now())?;
        self.store
            .commit(vec![WriteOp::AppendPromotion(promotion.clone())])?;

        info!(
            customer_id = %customer_id,
            promotion_id = %promotion.id,
            segment = promotion.segment.as_str(),
            products = promotion.recommendations.len(),
            "promotion composed"
        );
        Ok(promotion)
    }

    /// Promotions generated for a customer, oldest first.
    pub fn promotion_history(&self, customer_id: CustomerId) -> ServiceResult<Vec<Promotion>> {
        self.load_customer(customer_id)?;
        Ok(self.store.promotions_for(customer_id)?)
    }

    pub fn portfolio_dashboard(&self) -> ServiceResult<PortfolioDashboard> {
        let customers = self.store.customers()?;
        Ok(PortfolioDashboard::build(&customers, self.clock.now()))
    }

    fn load_customer(&self, id: CustomerId) -> ServiceResult<Customer> {
        self.store
            .customer(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("customer {id}")))
    }

    fn build(&self, customer: &Customer) -> ServiceResult<CustomerInsights> {
        let history = self.store.sales(&SaleFilter::for_customer(customer.id))?;
        let catalog = self.store.products()?;
        debug!(customer_id = %customer.id, sales = history.len(), "building insights");
        Ok(CustomerInsights::build(&history, &catalog, &catalog))
    }

    fn write_back_favorites(&self, mut customer: Customer, insights: &CustomerInsights) {
        let categories = insights.favorite_category_names();
        let products = insights.favorite_product_ids();
        if customer.aggregate.favorite_categories == categories
            && customer.aggregate.favorite_products == products
        {
            return;
        }

        let expected = ExpectedVersion::Exact(customer.version);
        let customer_id = customer.id;
        customer.set_favorites(categories, products, self.clock.now());
        if let Err(err) = self
            .store
            .commit(vec![WriteOp::PutCustomer { customer, expected }])
        {
            warn!(customer_id = %customer_id, error = %err, "favorites write-back failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::InMemoryRetailStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use storeline_catalog::{NewProduct, Product, ProductId};
    use storeline_core::Money;
    use storeline_customers::CustomerRegistration;
    use storeline_insights::{FixedDiscount, FrequencySegment, Incentive, PromotionKind};
    use storeline_sales::{CustomerRef, LineItemInput, RecordSale, Sale, SaleId};

    struct Fixture {
        store: Arc<InMemoryRetailStore>,
        clock: Arc<FixedClock>,
        service: InsightsService<Arc<InMemoryRetailStore>, Arc<FixedClock>>,
        customer: Customer,
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap()
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryRetailStore::new());
        let clock = Arc::new(FixedClock::new(now()));
        let customer = Customer::register(
            CustomerId::generate(),
            &CustomerRegistration::new("Ana", "5550101"),
            now(),
        )
        .unwrap();
        store
            .commit(vec![WriteOp::PutCustomer {
                customer: customer.clone(),
                expected: ExpectedVersion::Absent,
            }])
            .unwrap();
        let service = InsightsService::new(store.clone(), clock.clone(), Arc::new(FixedDiscount(15)));
        Fixture {
            store,
            clock,
            service,
            customer,
        }
    }

    fn product(store: &InMemoryRetailStore, name: &str, category: &str, price: u64, stock: i64) -> Product {
        let product = NewProduct::new(name, category, Money::from_major(price))
            .with_stock(stock)
            .into_product(ProductId::generate(), 2, now())
            .unwrap();
        store
            .commit(vec![WriteOp::InsertProduct(product.clone())])
            .unwrap();
        product
    }

    fn purchase(f: &Fixture, at: DateTime<Utc>, lines: &[(&Product, i64)]) {
        let (sale, _) = Sale::record(RecordSale {
            sale_id: SaleId::generate(),
            seller_id: "S1".to_string(),
            seller_name: None,
            customer: Some(CustomerRef {
                id: f.customer.id,
                name: f.customer.name.clone(),
                phone: f.customer.phone.clone(),
            }),
            lines: lines
                .iter()
                .map(|(p, q)| LineItemInput::new(p.id, p.name.clone(), *q, p.price))
                .collect(),
            claimed_total: None,
            idempotency_key: None,
            occurred_at: at,
        })
        .unwrap();
        f.store.commit(vec![WriteOp::InsertSale(sale)]).unwrap();
    }

    #[test]
    fn insights_recommend_unbought_products_and_write_back_favorites() {
        let f = fixture();
        let beans = product(&f.store, "Beans", "Coffee", 30, 10);
        let filter = product(&f.store, "Filter", "Coffee", 10, 10);
        product(&f.store, "Kettle", "Coffee", 80, 0);
        product(&f.store, "Mug", "Kitchen", 12, 10);

        purchase(&f, now() - Duration::days(20), &[(&beans, 2)]);
        purchase(&f, now() - Duration::days(10), &[(&beans, 1)]);

        let insights = f.service.customer_insights(f.customer.id).unwrap();

        assert_eq!(insights.purchase_patterns.total_purchases, 2);
        assert_eq!(insights.purchase_patterns.frequency, FrequencySegment::Frequent);
        assert_eq!(insights.favorite_products[0].product_id, beans.id);
        let recommended: Vec<ProductId> = insights.recommendations.iter().map(|p| p.id).collect();
        assert_eq!(recommended, vec![filter.id]);

        let stored = f.store.customer(f.customer.id).unwrap().unwrap();
        assert_eq!(stored.aggregate.favorite_categories, vec!["Coffee".to_string()]);
        assert_eq!(stored.aggregate.favorite_products, vec![beans.id]);
        assert_eq!(stored.version, f.customer.version + 1);
    }

    #[test]
    fn insights_for_unknown_customer_are_not_found() {
        let f = fixture();

        let err = f.service.customer_insights(CustomerId::generate()).unwrap_err();

        assert!(err.is_not_found());
    }

    #[test]
    fn promotions_are_persisted_in_history() {
        let f = fixture();
        let beans = product(&f.store, "Beans", "Coffee", 50, 10);
        let grinder = product(&f.store, "Grinder", "Coffee", 100, 10);
        purchase(&f, now() - Duration::days(1), &[(&beans, 3)]);

        let promotion = f.service.compose_promotion(f.customer.id).unwrap();

        assert_eq!(promotion.kind, PromotionKind::Welcome);
        assert_eq!(promotion.valid_until, now() + Duration::days(7));
        assert_eq!(promotion.recommendations.len(), 1);
        assert_eq!(promotion.recommendations[0].product_id, grinder.id);
        assert_eq!(promotion.recommendations[0].promo_price, Money::from_major(85));
        assert!(matches!(promotion.incentive, Incentive::FreeShipping { .. }));

        f.clock.advance(Duration::days(1));
        f.service.compose_promotion(f.customer.id).unwrap();

        let history = f.service.promotion_history(f.customer.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], promotion);
    }

    #[test]
    fn dashboard_counts_all_customers() {
        let f = fixture();

        let dashboard = f.service.portfolio_dashboard().unwrap();

        assert_eq!(dashboard.total_customers, 1);
        assert_eq!(dashboard.segmentation.new, 1);
        assert_eq!(dashboard.total_revenue, Money::ZERO);
    }
}
