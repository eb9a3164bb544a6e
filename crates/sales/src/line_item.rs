use serde::{Deserialize, Serialize};

use storeline_catalog::ProductId;
use storeline_core::{DomainError, DomainResult, Money, ValueObject};

/// Line item as submitted by the caller, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemInput {
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl LineItemInput {
    pub fn new(product_id: ProductId, name: impl Into<String>, quantity: i64, unit_price: Money) -> Self {
        Self {
            product_id: Some(product_id),
            name: name.into(),
            quantity,
            unit_price,
        }
    }

    /// Validate into a frozen line item. `position` is 1-based, for messages.
    pub fn validate(&self, position: usize) -> DomainResult<LineItem> {
        let product_id = self.product_id.ok_or_else(|| {
            DomainError::validation(format!("line {position}: product id is required"))
        })?;

        if self.quantity <= 0 {
            return Err(DomainError::validation(format!(
                "line {position}: quantity must be positive (got {})",
                self.quantity
            )));
        }

        Ok(LineItem {
            product_id,
            name: self.name.trim().to_string(),
            quantity: self.quantity,
            unit_price: self.unit_price,
        })
    }
}

/// One product/quantity/unit-price tuple within a committed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub name: String,
    /// Always > 0.
    pub quantity: i64,
    pub unit_price: Money,
}

impl ValueObject for LineItem {}

impl LineItem {
    pub fn subtotal(&self) -> Option<Money> {
        let quantity = u64::try_from(self.quantity).ok()?;
        self.unit_price.checked_mul(quantity)
    }
}

/// Σ quantity × unit_price with overflow detection.
pub fn recompute_total(lines: &[LineItem]) -> DomainResult<Money> {
    lines.iter().try_fold(Money::ZERO, |acc, line| {
        line.subtotal()
            .and_then(|subtotal| acc.checked_add(subtotal))
            .ok_or_else(|| DomainError::validation("sale total overflows"))
    })
}
