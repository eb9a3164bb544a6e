//! Customer registration, lookup and search.

use serde::{Deserialize, Serialize};
use tracing::info;

use storeline_core::ExpectedVersion;
use storeline_customers::{
    Customer, CustomerId, CustomerRegistration, CustomerSuggestion, normalize_email,
    normalize_phone,
};

use crate::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::store::{RetailStore, WriteOp};

/// Shorter search terms return nothing.
pub const MIN_SEARCH_TERM_CHARS: usize = 2;
pub const SEARCH_RESULT_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InactiveCustomer {
    pub customer: Customer,
    pub days_since_last_purchase: i64,
}

#[derive(Debug, Clone)]
pub struct CustomerRegistry<S, C> {
    store: S,
    clock: C,
}

impl<S: RetailStore, C: Clock> CustomerRegistry<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    /// Create a customer, or update the contact fields of the one matching
    /// the registration's id or phone. The purchase aggregate is never
    /// touched here.
    pub fn register(&self, registration: &CustomerRegistration) -> ServiceResult<Customer> {
        let (customer, op) = self.prepare(registration)?;
        let created = matches!(
            op,
            WriteOp::PutCustomer {
                expected: ExpectedVersion::Absent,
                ..
            }
        );
        self.store.commit(vec![op])?;
        if created {
            info!(customer_id = %customer.id, "customer registered");
        } else {
            info!(customer_id = %customer.id, "customer updated");
        }
        Ok(customer)
    }

    /// The customer a registration resolves to and the write that persists it,
    /// for callers that commit it alongside other ops.
    pub fn prepare(&self, registration: &CustomerRegistration) -> ServiceResult<(Customer, WriteOp)> {
        registration.validate()?;

        let by_id = match registration.id {
            Some(id) => self.store.customer(id)?,
            None => None,
        };
        let existing = match by_id {
            Some(customer) => Some(customer),
            None => self.store.customer_by_phone(&registration.normalized_phone())?,
        };

        let now = self.clock.now();
        let (customer, expected) = match existing {
            Some(mut customer) => {
                let expected = ExpectedVersion::Exact(customer.version);
                customer.update_contact(registration, now)?;
                (customer, expected)
            }
            None => {
                let id = registration.id.unwrap_or_else(CustomerId::generate);
                (Customer::register(id, registration, now)?, ExpectedVersion::Absent)
            }
        };
        let op = WriteOp::PutCustomer {
            customer: customer.clone(),
            expected,
        };
        Ok((customer, op))
    }

    pub fn customer(&self, id: CustomerId) -> ServiceResult<Customer> {
        self.store
            .customer(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("customer {id}")))
    }

    pub fn by_phone(&self, phone: &str) -> ServiceResult<Option<Customer>> {
        let digits = normalize_phone(phone);
        if digits.is_empty() {
            return Ok(None);
        }
        Ok(self.store.customer_by_phone(&digits)?)
    }

    pub fn by_email(&self, email: &str) -> ServiceResult<Option<Customer>> {
        match normalize_email(email) {
            Some(email) => Ok(self.store.customer_by_email(&email)?),
            None => Ok(None),
        }
    }

    /// Up to ten suggestions whose name, email or phone matches `term`.
    pub fn search(&self, term: &str) -> ServiceResult<Vec<CustomerSuggestion>> {
        let term = term.trim();
        if term.chars().count() < MIN_SEARCH_TERM_CHARS {
            return Ok(Vec::new());
        }

        Ok(self
            .store
            .customers()?
            .iter()
            .filter(|c| c.matches_term(term))
            .take(SEARCH_RESULT_LIMIT)
            .map(Customer::suggestion)
            .collect())
    }

    /// Customers whose last purchase is at least `days` ago, most recent
    /// purchase first. Customers without purchases are not listed.
    pub fn inactive(&self, days: i64) -> ServiceResult<Vec<InactiveCustomer>> {
        let now = self.clock.now();
        let mut inactive: Vec<InactiveCustomer> = self
            .store
            .customers()?
            .into_iter()
            .filter_map(|customer| {
                let idle = customer.aggregate.days_since_last_purchase(now)?;
                (idle >= days).then_some(InactiveCustomer {
                    customer,
                    days_since_last_purchase: idle,
                })
            })
            .collect();

        inactive.sort_by(|a, b| {
            b.customer
                .aggregate
                .last_purchase_date
                .cmp(&a.customer.aggregate.last_purchase_date)
        });
        Ok(inactive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::InMemoryRetailStore;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;
    use storeline_core::Money;

    fn registry() -> CustomerRegistry<Arc<InMemoryRetailStore>, Arc<FixedClock>> {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ));
        CustomerRegistry::new(Arc::new(InMemoryRetailStore::new()), clock)
    }

    #[test]
    fn registering_the_same_phone_updates_contact_fields() {
        let registry = registry();
        let first = registry
            .register(&CustomerRegistration::new("Ana", "(555) 010-1"))
            .unwrap();
        let second = registry
            .register(&CustomerRegistration::new("Ana Souza", "5550101").with_email("ANA@Mail.com"))
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Ana Souza");
        assert_eq!(second.email.as_deref(), Some("ana@mail.com"));
        assert_eq!(second.version, first.version + 1);
        assert_eq!(
            registry.by_email(" ana@mail.com ").unwrap().map(|c| c.id),
            Some(first.id)
        );
    }

    #[test]
    fn registration_keeps_the_purchase_aggregate() {
        let registry = registry();
        let mut customer = registry
            .register(&CustomerRegistration::new("Ana", "5550101"))
            .unwrap();
        let expected = ExpectedVersion::Exact(customer.version);
        customer.record_purchase(Money::from_major(20), Utc::now());
        registry
            .store
            .commit(vec![WriteOp::PutCustomer {
                customer: customer.clone(),
                expected,
            }])
            .unwrap();

        let updated = registry
            .register(&CustomerRegistration::new("Ana B", "5550101").with_id(customer.id))
            .unwrap();

        assert_eq!(updated.aggregate.total_purchases, 1);
        assert_eq!(updated.aggregate.total_spent, Money::from_major(20));
    }

    #[test]
    fn invalid_registration_is_rejected() {
        let registry = registry();

        let err = registry
            .register(&CustomerRegistration::new("", "5550101"))
            .unwrap_err();

        assert!(err.is_validation());
        assert!(registry.store.customers().unwrap().is_empty());
    }

    #[test]
    fn unknown_id_is_not_found() {
        let registry = registry();

        assert!(registry.customer(CustomerId::generate()).unwrap_err().is_not_found());
        assert!(registry.by_phone("---").unwrap().is_none());
    }

    #[test]
    fn search_needs_two_characters_and_caps_results() {
        let registry = registry();
        for i in 0..12 {
            registry
                .register(&CustomerRegistration::new(format!("Maria {i:02}"), format!("55501{i:02}")))
                .unwrap();
        }
        registry
            .register(&CustomerRegistration::new("Joao", "5559999"))
            .unwrap();

        assert!(registry.search("m").unwrap().is_empty());

        let hits = registry.search("maria").unwrap();
        assert_eq!(hits.len(), SEARCH_RESULT_LIMIT);
        assert_eq!(hits[0].label, "Maria 00 - 5550100");

        let by_phone = registry.search("9999").unwrap();
        assert_eq!(by_phone.len(), 1);
        assert_eq!(by_phone[0].name, "Joao");
    }

    #[test]
    fn inactive_customers_are_listed_most_recent_first() {
        let registry = registry();
        let now = registry.clock.now();

        for (name, phone, days_ago) in [("Old", "1111", 90), ("Recent", "2222", 5), ("Mid", "3333", 45)] {
            let mut customer = registry
                .register(&CustomerRegistration::new(name, phone))
                .unwrap();
            let expected = ExpectedVersion::Exact(customer.version);
            customer.record_purchase(Money::from_major(10), now - Duration::days(days_ago));
            registry
                .store
                .commit(vec![WriteOp::PutCustomer { customer, expected }])
                .unwrap();
        }
        registry
            .register(&CustomerRegistration::new("Never", "4444"))
            .unwrap();

        let inactive = registry.inactive(30).unwrap();

        let names: Vec<&str> = inactive.iter().map(|i| i.customer.name.as_str()).collect();
        assert_eq!(names, vec!["Mid", "Old"]);
        assert_eq!(inactive[0].days_since_last_purchase, 45);
        assert_eq!(inactive[1].days_since_last_purchase, 90);
    }
}
