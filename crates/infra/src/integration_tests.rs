//! End-to-end tests over the full pipeline:
//! facade → sale writer → store commit → bus → stats worker → insights.
//!
//! Everything runs on the in-memory store with a fixed clock, so timings and
//! promotion contents are deterministic.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration as StdDuration, Instant};

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::Value as JsonValue;

    use storeline_catalog::{NewProduct, Product};
    use storeline_core::Money;
    use storeline_customers::{Customer, CustomerId, CustomerRegistration};
    use storeline_events::{EventEnvelope, InMemoryEventBus};
    use storeline_insights::{FixedDiscount, FrequencySegment, Incentive, SeededDiscounts};
    use storeline_sales::{LineItemInput, SellerId};

    use crate::clock::FixedClock;
    use crate::config::{RetailConfig, StockPolicy};
    use crate::customer_stats::CustomerStatsAggregator;
    use crate::sale_writer::{BusPublisher, SaleSubmission};
    use crate::service::{RecordSaleRequest, RetailService};
    use crate::store::{InMemoryRetailStore, RetailStore, SaleFilter, StoreError};
    use crate::error::ServiceError;
    use crate::workers::CustomerStatsWorker;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 5, 9, 30, 0).unwrap()
    }

    struct Shop {
        store: Arc<InMemoryRetailStore>,
        clock: Arc<FixedClock>,
        service: RetailService,
    }

    fn shop_with(config: RetailConfig) -> Shop {
        storeline_observability::init_for_tests();

        let store = Arc::new(InMemoryRetailStore::new().with_commit_timeout(config.commit_timeout));
        let clock = Arc::new(FixedClock::new(start()));
        let service = RetailService::builder(store.clone())
            .clock(clock.clone())
            .discounts(Arc::new(SeededDiscounts::new(7)))
            .config(config)
            .build();
        Shop {
            store,
            clock,
            service,
        }
    }

    fn shop() -> Shop {
        shop_with(RetailConfig::default())
    }

    fn stock(shop: &Shop, name: &str, category: &str, price: u64, stock: i64) -> Product {
        shop.service
            .add_product(NewProduct::new(name, category, Money::from_major(price)).with_stock(stock))
            .unwrap()
    }

    fn line(product: &Product, quantity: i64) -> LineItemInput {
        LineItemInput::new(product.id, product.name.clone(), quantity, product.price)
    }

    fn buy(shop: &Shop, customer: &Customer, lines: Vec<LineItemInput>) {
        shop.service
            .record_sale(RecordSaleRequest::for_customer(
                SaleSubmission::new("S1", lines),
                customer.id,
            ))
            .unwrap();
    }

    fn register(shop: &Shop, name: &str, phone: &str) -> Customer {
        shop.service
            .register_customer(&CustomerRegistration::new(name, phone))
            .unwrap()
    }

    #[test]
    fn sale_total_is_recomputed_and_stock_decremented() {
        let shop = shop();
        let a = stock(&shop, "A", "Coffee", 10, 5);
        let b = stock(&shop, "B", "Coffee", 5, 5);
        let other = stock(&shop, "C", "Coffee", 7, 5);

        let sale = shop
            .service
            .record_sale(RecordSaleRequest::registering(
                SaleSubmission::new("S1", vec![line(&a, 2), line(&b, 1)])
                    .with_claimed_total(Money::from_major(1)),
                CustomerRegistration::new("Ana", "5550101"),
            ))
            .unwrap();

        assert_eq!(sale.total(), Money::from_cents(2_500));
        assert_eq!(shop.service.product(a.id).unwrap().stock, 3);
        assert_eq!(shop.service.product(b.id).unwrap().stock, 4);
        assert_eq!(shop.service.product(other.id).unwrap().stock, 5);

        let customer = shop.service.customer_by_phone("5550101").unwrap().unwrap();
        assert_eq!(customer.aggregate.total_purchases, 1);
        assert_eq!(customer.aggregate.total_spent, Money::from_major(25));
        assert_eq!(customer.aggregate.last_purchase_date, Some(start()));
    }

    #[test]
    fn failed_commit_leaves_no_partial_state() {
        let shop = shop();
        let a = stock(&shop, "A", "Coffee", 10, 5);
        let b = stock(&shop, "B", "Coffee", 5, 5);
        let ana = register(&shop, "Ana", "5550101");

        shop.store.inject_commit_failure(2);
        let err = shop
            .service
            .record_sale(RecordSaleRequest::for_customer(
                SaleSubmission::new("S1", vec![line(&a, 2), line(&b, 1)]),
                ana.id,
            ))
            .unwrap_err();

        assert!(matches!(err, ServiceError::Transaction(StoreError::Unavailable(_))));
        assert_eq!(shop.service.product(a.id).unwrap().stock, 5);
        assert_eq!(shop.service.product(b.id).unwrap().stock, 5);
        assert!(shop.store.sales(&SaleFilter::all()).unwrap().is_empty());
        let ana = shop.service.customer(ana.id).unwrap();
        assert_eq!(ana.aggregate.total_purchases, 0);
    }

    #[test]
    fn missing_product_in_the_middle_fails_the_whole_sale() {
        let shop = shop();
        let a = stock(&shop, "A", "Coffee", 10, 5);
        let gone = stock(&shop, "Gone", "Coffee", 3, 5);
        let c = stock(&shop, "C", "Coffee", 5, 5);
        shop.service.remove_product(gone.id).unwrap();

        let err = shop
            .service
            .record_sale(RecordSaleRequest::anonymous(SaleSubmission::new(
                "S1",
                vec![line(&a, 1), line(&gone, 1), line(&c, 1)],
            )))
            .unwrap_err();

        assert!(matches!(err, ServiceError::Transaction(StoreError::NotFound(_))));
        assert_eq!(shop.service.product(a.id).unwrap().stock, 5);
        assert_eq!(shop.service.product(c.id).unwrap().stock, 5);
        assert!(shop.store.sales(&SaleFilter::all()).unwrap().is_empty());
    }

    #[test]
    fn duplicate_submission_commits_once() {
        let shop = shop();
        let a = stock(&shop, "A", "Coffee", 10, 5);
        let ana = register(&shop, "Ana", "5550101");
        let submission = SaleSubmission::new("S1", vec![line(&a, 2)]).with_idempotency_key("pos-1-0001");

        let first = shop
            .service
            .record_sale(RecordSaleRequest::for_customer(submission.clone(), ana.id))
            .unwrap();
        let second = shop
            .service
            .record_sale(RecordSaleRequest::for_customer(submission, ana.id))
            .unwrap();

        assert_eq!(first.id_typed(), second.id_typed());
        assert_eq!(shop.service.product(a.id).unwrap().stock, 3);
        assert_eq!(shop.store.sales(&SaleFilter::all()).unwrap().len(), 1);
        assert_eq!(shop.service.customer(ana.id).unwrap().aggregate.total_purchases, 1);
    }

    #[test]
    fn reject_negative_policy_refuses_overselling() {
        let shop = shop_with(RetailConfig::default().with_stock_policy(StockPolicy::RejectNegative));
        let a = stock(&shop, "A", "Coffee", 10, 1);
        let b = stock(&shop, "B", "Coffee", 5, 5);

        let err = shop
            .service
            .record_sale(RecordSaleRequest::anonymous(SaleSubmission::new(
                "S1",
                vec![line(&b, 1), line(&a, 2)],
            )))
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Transaction(StoreError::InsufficientStock { available: 1, requested: 2, .. })
        ));
        assert_eq!(shop.service.product(b.id).unwrap().stock, 5);
    }

    #[test]
    fn default_policy_allows_overselling() {
        let shop = shop();
        let a = stock(&shop, "A", "Coffee", 10, 1);

        shop.service
            .record_sale(RecordSaleRequest::anonymous(SaleSubmission::new("S1", vec![line(&a, 3)])))
            .unwrap();

        assert_eq!(shop.service.product(a.id).unwrap().stock, -2);
        assert_eq!(shop.service.product_stats().unwrap().out_of_stock, 1);
    }

    #[test]
    fn concurrent_sales_keep_stock_and_aggregate_consistent() {
        let shop = Arc::new(shop_with(RetailConfig::default().with_stats_max_attempts(64)));
        let a = stock(&shop, "A", "Coffee", 10, 100);
        let ana = register(&shop, "Ana", "5550101");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shop = shop.clone();
                let a = a.clone();
                let ana = ana.clone();
                thread::spawn(move || {
                    for _ in 0..5 {
                        buy(&shop, &ana, vec![line(&a, 1)]);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(shop.service.product(a.id).unwrap().stock, 60);
        let ana = shop.service.customer(ana.id).unwrap();
        assert_eq!(ana.aggregate.total_purchases, 40);
        assert_eq!(ana.aggregate.total_spent, Money::from_major(400));
    }

    #[test]
    fn stats_worker_applies_published_sales() {
        storeline_observability::init_for_tests();
        let store = Arc::new(InMemoryRetailStore::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let worker = CustomerStatsWorker::spawn(
            &bus,
            Arc::new(CustomerStatsAggregator::new(store.clone())),
        )
        .unwrap();
        let service = RetailService::builder(store.clone())
            .clock(Arc::new(FixedClock::new(start())))
            .discounts(Arc::new(FixedDiscount(10)))
            .follow_up(Arc::new(BusPublisher::new(bus.clone())))
            .build();

        let a = service
            .add_product(NewProduct::new("A", "Coffee", Money::from_major(10)).with_stock(5))
            .unwrap();
        let ana = service
            .register_customer(&CustomerRegistration::new("Ana", "5550101"))
            .unwrap();
        service
            .record_sale(RecordSaleRequest::for_customer(
                SaleSubmission::new("S1", vec![line(&a, 2)]),
                ana.id,
            ))
            .unwrap();

        let deadline = Instant::now() + StdDuration::from_secs(2);
        let mut purchases = 0;
        while purchases == 0 && Instant::now() < deadline {
            thread::sleep(StdDuration::from_millis(5));
            purchases = service.customer(ana.id).unwrap().aggregate.total_purchases;
        }
        worker.shutdown();

        assert_eq!(purchases, 1);
        assert_eq!(service.customer(ana.id).unwrap().aggregate.total_spent, Money::from_major(20));
    }

    #[test]
    fn purchase_spacing_drives_the_frequency_segment() {
        let shop = shop();
        let a = stock(&shop, "A", "Coffee", 10, 100);
        let steady = register(&shop, "Steady", "1111");
        let eager = register(&shop, "Eager", "2222");
        let once = register(&shop, "Once", "3333");

        buy(&shop, &once, vec![line(&a, 1)]);
        for _ in 0..3 {
            buy(&shop, &steady, vec![line(&a, 1)]);
            buy(&shop, &eager, vec![line(&a, 1)]);
            shop.clock.advance(Duration::days(3));
            buy(&shop, &eager, vec![line(&a, 1)]);
            shop.clock.advance(Duration::days(7));
        }

        let segment = |c: &Customer| {
            shop.service
                .customer_insights(c.id)
                .unwrap()
                .purchase_patterns
                .frequency
        };
        assert_eq!(segment(&steady), FrequencySegment::Frequent);
        assert_eq!(segment(&eager), FrequencySegment::VeryFrequent);
        assert_eq!(segment(&once), FrequencySegment::FirstPurchase);
    }

    #[test]
    fn big_spenders_get_free_shipping_and_others_a_coupon() {
        let shop = shop();
        let coffee = stock(&shop, "Beans", "Coffee", 150, 50);
        let mug = stock(&shop, "Mug", "Kitchen", 50, 50);
        let grinder = stock(&shop, "Grinder", "Coffee", 200, 5);
        stock(&shop, "Kettle", "Kitchen", 40, 5);
        let big = register(&shop, "Big", "1111");
        let small = register(&shop, "Small", "2222");

        buy(&shop, &big, vec![line(&coffee, 1)]);
        buy(&shop, &small, vec![line(&mug, 1)]);

        let promotion = shop.service.compose_promotion(big.id).unwrap();
        assert_eq!(
            promotion.incentive,
            Incentive::FreeShipping {
                minimum_order: Money::from_major(120)
            }
        );
        assert_eq!(promotion.recommendations.len(), 1);
        assert_eq!(promotion.recommendations[0].product_id, grinder.id);
        let pct = promotion.recommendations[0].discount_percent;
        assert!((10..25).contains(&pct));
        assert!(promotion.message.contains("Based on your interest in Coffee"));

        let promotion = shop.service.compose_promotion(small.id).unwrap();
        assert!(matches!(promotion.incentive, Incentive::Coupon { percent: 10, .. }));

        assert_eq!(shop.service.promotion_history(big.id).unwrap().len(), 1);
        assert!(
            shop.service
                .promotion_history(CustomerId::generate())
                .unwrap_err()
                .is_not_found()
        );
    }

    #[test]
    fn back_office_views_reflect_committed_sales() {
        let shop = shop();
        let a = stock(&shop, "A", "Coffee", 10, 20);
        let b = stock(&shop, "B", "Kitchen", 30, 20);
        let ana = register(&shop, "Ana", "5550101");
        let bia = register(&shop, "Bia", "5550102");

        buy(&shop, &ana, vec![line(&a, 3)]);
        shop.service
            .record_sale(RecordSaleRequest::for_customer(
                SaleSubmission::new("S2", vec![line(&b, 2)]).with_seller_name("Rita"),
                bia.id,
            ))
            .unwrap();

        let stats = shop.service.sales_stats(None).unwrap();
        assert_eq!(stats.today.count, 2);
        assert_eq!(stats.total.revenue, Money::from_major(90));

        let top = shop.service.top_products(1).unwrap();
        assert_eq!(top[0].product_id, a.id);
        let sellers = shop.service.top_sellers(5).unwrap();
        assert_eq!(sellers[0].name, "Rita");

        let rita = SellerId::parse("S2").unwrap();
        assert_eq!(shop.service.sales_by_seller(&rita, 10).unwrap().len(), 1);

        let dashboard = shop.service.portfolio_dashboard().unwrap();
        assert_eq!(dashboard.total_customers, 2);
        assert_eq!(dashboard.total_revenue, Money::from_major(90));
        assert_eq!(dashboard.best_customers[0].id, bia.id);
        assert_eq!(dashboard.retention_rate, 100.0);

        shop.clock.advance(Duration::days(31));
        let inactive = shop.service.inactive_customers(None).unwrap();
        assert_eq!(inactive.len(), 2);
        assert_eq!(inactive[0].days_since_last_purchase, 31);

        let hits = shop.service.search_customers("bi").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].label, "Bia - 5550102");
    }
}
