use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeline_catalog::ProductId;
use storeline_core::{AggregateRoot, DomainResult, Money, domain_id};

use crate::purchase_aggregate::PurchaseAggregate;
use crate::registration::{CustomerRegistration, normalize_phone};

domain_id!(
    /// Customer identifier.
    CustomerId
);

/// Customer status lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    #[default]
    Active,
    Inactive,
}

/// Aggregate root: Customer.
///
/// `version` guards the rolling aggregate: every mutation bumps it, and stores
/// accept a write only at the version the writer read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    /// Digits only; dedupe key.
    pub phone: String,
    pub email: Option<String>,
    pub document: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: CustomerStatus,
    pub aggregate: PurchaseAggregate,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Search hit rendered for pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSuggestion {
    pub id: CustomerId,
    /// `"name - phone"`
    pub label: String,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

impl Customer {
    /// New active customer with an empty purchase aggregate.
    pub fn register(
        id: CustomerId,
        registration: &CustomerRegistration,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        registration.validate()?;

        Ok(Self {
            id,
            name: registration.name.trim().to_string(),
            phone: registration.normalized_phone(),
            email: registration.normalized_email(),
            document: non_blank(&registration.document),
            address: non_blank(&registration.address),
            notes: non_blank(&registration.notes),
            tags: registration.tags.clone(),
            status: CustomerStatus::Active,
            aggregate: PurchaseAggregate::default(),
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    /// Overwrite contact fields. The purchase aggregate is left untouched.
    pub fn update_contact(
        &mut self,
        registration: &CustomerRegistration,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        registration.validate()?;

        self.name = registration.name.trim().to_string();
        self.phone = registration.normalized_phone();
        self.email = registration.normalized_email();
        self.document = non_blank(&registration.document);
        self.address = non_blank(&registration.address);
        self.notes = non_blank(&registration.notes);
        self.tags = registration.tags.clone();
        self.touch(now);
        Ok(())
    }

    /// Fold a committed sale total into the rolling aggregate.
    pub fn record_purchase(&mut self, total: Money, at: DateTime<Utc>) {
        self.aggregate = self.aggregate.with_purchase(total, at);
        self.touch(at);
    }

    pub fn set_favorites(
        &mut self,
        categories: Vec<String>,
        products: Vec<ProductId>,
        now: DateTime<Utc>,
    ) {
        self.aggregate.favorite_categories = categories;
        self.aggregate.favorite_products = products;
        self.touch(now);
    }

    pub fn is_active(&self) -> bool {
        self.status == CustomerStatus::Active
    }

    /// Case-insensitive match on name or email, substring match on phone digits.
    pub fn matches_term(&self, term: &str) -> bool {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }
        if self.name.to_lowercase().contains(&needle) {
            return true;
        }
        if self
            .email
            .as_deref()
            .is_some_and(|e| e.to_lowercase().contains(&needle))
        {
            return true;
        }
        let digits = normalize_phone(&needle);
        !digits.is_empty() && self.phone.contains(&digits)
    }

    pub fn suggestion(&self) -> CustomerSuggestion {
        CustomerSuggestion {
            id: self.id,
            label: format!("{} - {}", self.name, self.phone),
            name: self.name.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl AggregateRoot for Customer {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
