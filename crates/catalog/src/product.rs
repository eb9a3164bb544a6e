use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeline_core::{DomainError, DomainResult, Entity, Money, domain_id};

domain_id!(
    /// Product identifier.
    ProductId
);

/// Threshold used when a product is added without an explicit one.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

/// Stock level classification used by reports and alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    /// `0 < stock <= low_stock_threshold`
    Low,
    /// `stock <= 0` (negative when oversold)
    OutOfStock,
}

/// Catalog product.
///
/// `stock` is signed: overselling is permitted under the default stock policy,
/// so a counter may legitimately go below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub price: Money,
    pub stock: i64,
    pub low_stock_threshold: i64,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn stock_status(&self) -> StockStatus {
        if self.stock <= 0 {
            StockStatus::OutOfStock
        } else if self.stock <= self.low_stock_threshold {
            StockStatus::Low
        } else {
            StockStatus::InStock
        }
    }

    /// Whether the product can be offered (positive stock).
    pub fn is_available(&self) -> bool {
        self.stock > 0
    }

    /// `price × stock`, counting negative stock as zero.
    pub fn inventory_value(&self) -> Money {
        let units = u64::try_from(self.stock).unwrap_or(0);
        self.price.checked_mul(units).unwrap_or(Money::from_cents(u64::MAX))
    }

    /// Apply a patch of descriptive fields. Stock is never patched.
    pub fn apply_patch(&mut self, patch: &ProductPatch, now: DateTime<Utc>) -> DomainResult<()> {
        patch.validate()?;

        if let Some(name) = &patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(category) = &patch.category {
            self.category = category.trim().to_string();
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(threshold) = patch.low_stock_threshold {
            self.low_stock_threshold = threshold;
        }
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Input for adding a product to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub price: Money,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub low_stock_threshold: Option<i64>,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, category: impl Into<String>, price: Money) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            price,
            stock: 0,
            low_stock_threshold: None,
        }
    }

    pub fn with_stock(mut self, stock: i64) -> Self {
        self.stock = stock;
        self
    }

    pub fn with_low_stock_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = Some(threshold);
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("product name is required"));
        }
        if self.category.trim().is_empty() {
            return Err(DomainError::validation("product category is required"));
        }
        if self.stock < 0 {
            return Err(DomainError::validation("initial stock cannot be negative"));
        }
        if matches!(self.low_stock_threshold, Some(t) if t < 0) {
            return Err(DomainError::validation("low stock threshold cannot be negative"));
        }
        Ok(())
    }

    /// Build the catalog record, falling back to `default_threshold`.
    pub fn into_product(
        self,
        id: ProductId,
        default_threshold: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<Product> {
        self.validate()?;

        Ok(Product {
            id,
            name: self.name.trim().to_string(),
            category: self.category.trim().to_string(),
            price: self.price,
            stock: self.stock,
            low_stock_threshold: self.low_stock_threshold.unwrap_or(default_threshold),
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update of a product's descriptive fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<Money>,
    pub low_stock_threshold: Option<i64>,
}

impl ProductPatch {
    pub fn validate(&self) -> DomainResult<()> {
        if matches!(&self.name, Some(n) if n.trim().is_empty()) {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        if matches!(&self.category, Some(c) if c.trim().is_empty()) {
            return Err(DomainError::validation("product category cannot be empty"));
        }
        if matches!(self.low_stock_threshold, Some(t) if t < 0) {
            return Err(DomainError::validation("low stock threshold cannot be negative"));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.price.is_none()
            && self.low_stock_threshold.is_none()
    }
}
