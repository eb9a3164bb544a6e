//! Segment-keyed promotional messages.

use std::sync::Mutex;

use chrono::{DateTime, Datelike, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use storeline_catalog::ProductId;
use storeline_core::{Money, domain_id};
use storeline_customers::{Customer, CustomerId};

use crate::error::InsightsError;
use crate::insights::CustomerInsights;
use crate::segmentation::FrequencySegment;

domain_id!(
    /// Promotion history entry identifier.
    PromotionId
);

pub const PROMOTED_PRODUCTS_LIMIT: usize = 3;
pub const MIN_DISCOUNT_PERCENT: u8 = 10;
/// Exclusive upper bound.
pub const MAX_DISCOUNT_PERCENT: u8 = 25;
pub const COUPON_PERCENT: u8 = 10;
pub const DEFAULT_VALIDITY_DAYS: i64 = 7;

/// Average ticket above which the free-shipping incentive is offered.
pub const FREE_SHIPPING_TICKET: Money = Money::from_major(100);

/// Source of per-product discount percentages in `[10, 25)`.
pub trait DiscountSource: Send + Sync {
    fn next_percent(&self) -> u8;
}

/// Thread-local RNG; not reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomDiscounts;

impl DiscountSource for RandomDiscounts {
    fn next_percent(&self) -> u8 {
        rand::thread_rng().gen_range(MIN_DISCOUNT_PERCENT..MAX_DISCOUNT_PERCENT)
    }
}

/// Deterministic sequence for a given seed.
#[derive(Debug)]
pub struct SeededDiscounts {
    rng: Mutex<StdRng>,
}

impl SeededDiscounts {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl DiscountSource for SeededDiscounts {
    fn next_percent(&self) -> u8 {
        self.rng
            .lock()
            .map(|mut rng| rng.gen_range(MIN_DISCOUNT_PERCENT..MAX_DISCOUNT_PERCENT))
            .unwrap_or(MIN_DISCOUNT_PERCENT)
    }
}

/// Always the same percentage (clamped into range by the composer).
#[derive(Debug, Clone, Copy)]
pub struct FixedDiscount(pub u8);

impl DiscountSource for FixedDiscount {
    fn next_percent(&self) -> u8 {
        self.0
    }
}

/// Promotion family, one per frequency segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionKind {
    Vip,
    Loyalty,
    Return,
    ReEngagement,
    Reactivation,
    Welcome,
}

impl PromotionKind {
    pub fn for_segment(segment: FrequencySegment) -> Self {
        match segment {
            FrequencySegment::VeryFrequent => PromotionKind::Vip,
            FrequencySegment::Frequent => PromotionKind::Loyalty,
            FrequencySegment::Regular => PromotionKind::Return,
            FrequencySegment::Occasional => PromotionKind::ReEngagement,
            FrequencySegment::Rare => PromotionKind::Reactivation,
            FrequencySegment::FirstPurchase => PromotionKind::Welcome,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PromotionKind::Vip => "VIP",
            PromotionKind::Loyalty => "Loyalty",
            PromotionKind::Return => "Return",
            PromotionKind::ReEngagement => "Re-engagement",
            PromotionKind::Reactivation => "Reactivation",
            PromotionKind::Welcome => "Welcome",
        }
    }

    fn greeting(&self, name: &str) -> String {
        match self {
            PromotionKind::Vip => format!("Hello {name}! We missed you!"),
            PromotionKind::Loyalty => format!("Hi {name}! Great to have you back!"),
            PromotionKind::Return => format!("Hello {name}! How are you doing?"),
            PromotionKind::ReEngagement => format!("Hi {name}! It has been a while!"),
            PromotionKind::Reactivation => format!("Hello {name}! We really missed you!"),
            PromotionKind::Welcome => format!("Hi {name}! Welcome aboard!"),
        }
    }

    fn hook(&self) -> &'static str {
        match self {
            PromotionKind::Vip => "As one of our VIP customers, we prepared an exclusive offer for you!",
            PromotionKind::Loyalty => "We have new arrivals that match your style!",
            PromotionKind::Return => "We put together special offers with you in mind!",
            PromotionKind::ReEngagement => "How about these offers you cannot miss?",
            PromotionKind::Reactivation => "We have a special surprise to welcome you back!",
            PromotionKind::Welcome => "As a new customer, we have a special gift for you!",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotedProduct {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub original_price: Money,
    pub discount_percent: u8,
    pub promo_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Incentive {
    FreeShipping { minimum_order: Money },
    Coupon { code: String, percent: u8 },
}

impl Incentive {
    /// Free shipping above ⌊0.8 × average⌋ when the average ticket exceeds
    /// [`FREE_SHIPPING_TICKET`]; otherwise a coupon tagged with the month.
    ///
    /// Decided on the exact totals, not the cent-rounded average.
    pub fn for_spending(total_spent: Money, total_purchases: u64, now: DateTime<Utc>) -> Self {
        let spent = u128::from(total_spent.cents());
        let count = u128::from(total_purchases);
        if count > 0 && spent > u128::from(FREE_SHIPPING_TICKET.cents()) * count {
            let minimum_units = spent * 4 / (count * 500);
            Incentive::FreeShipping {
                minimum_order: Money::from_major(u64::try_from(minimum_units).unwrap_or(u64::MAX / 100)),
            }
        } else {
            Incentive::Coupon {
                code: format!("COMEBACK{}", now.month()),
                percent: COUPON_PERCENT,
            }
        }
    }

    fn render(&self) -> String {
        match self {
            Incentive::FreeShipping { minimum_order } => {
                format!("FREE SHIPPING on orders above {minimum_order}!")
            }
            Incentive::Coupon { code, percent } => {
                format!("Get an extra {percent}% off with coupon: {code}")
            }
        }
    }
}

/// Immutable promotion-history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: PromotionId,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub segment: FrequencySegment,
    pub kind: PromotionKind,
    pub message: String,
    pub recommendations: Vec<PromotedProduct>,
    pub incentive: Incentive,
    pub generated_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

/// Renders a promotion from a customer's insights.
#[derive(Debug, Clone)]
pub struct PromotionComposer {
    validity_days: i64,
}

impl Default for PromotionComposer {
    fn default() -> Self {
        Self {
            validity_days: DEFAULT_VALIDITY_DAYS,
        }
    }
}

impl PromotionComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validity_days(mut self, days: i64) -> Self {
        self.validity_days = days;
        self
    }

    pub fn validity_days(&self) -> i64 {
        self.validity_days
    }

    pub fn compose(
        &self,
        customer: &Customer,
        insights: &CustomerInsights,
        discounts: &dyn DiscountSource,
        now: DateTime<Utc>,
    ) -> Result<Promotion, InsightsError> {
        if self.validity_days <= 0 {
            return Err(InsightsError::InvalidInput(format!(
                "promotion validity must be positive (got {} days)",
                self.validity_days
            )));
        }
        if customer.name.trim().is_empty() {
            return Err(InsightsError::InvalidInput(
                "customer name is required to address a promotion".to_string(),
            ));
        }

        let segment = insights.purchase_patterns.frequency;
        let kind = PromotionKind::for_segment(segment);
        let valid_until = now + Duration::days(self.validity_days);

        let recommendations: Vec<PromotedProduct> = insights
            .recommendations
            .iter()
            .take(PROMOTED_PRODUCTS_LIMIT)
            .map(|p| {
                let pct = discounts
                    .next_percent()
                    .clamp(MIN_DISCOUNT_PERCENT, MAX_DISCOUNT_PERCENT - 1);
                PromotedProduct {
                    product_id: p.id,
                    name: p.name.clone(),
                    category: p.category.clone(),
                    original_price: p.price,
                    discount_percent: pct,
                    promo_price: p.price.percent_off(pct),
                }
            })
            .collect();

        let patterns = &insights.purchase_patterns;
        let incentive =
            Incentive::for_spending(patterns.total_spent, patterns.total_purchases, now);

        let mut message = format!("{}\n\n{}\n\n", kind.greeting(&customer.name), kind.hook());

        if let Some(top) = insights.favorite_categories.first() {
            message.push_str(&format!("Based on your interest in {}:\n", top.category));
            for item in &recommendations {
                message.push_str(&format!(
                    "\n- {}\n   From {} to {} ({}% OFF!)\n",
                    item.name, item.original_price, item.promo_price, item.discount_percent
                ));
            }
        }

        message.push('\n');
        message.push_str(&incentive.render());
        message.push_str(&format!("\n\nValid until {}", valid_until.format("%Y-%m-%d")));
        message.push_str("\n\nEnjoy! We look forward to seeing you!");

        Ok(Promotion {
            id: PromotionId::generate(),
            customer_id: customer.id,
            customer_name: customer.name.clone(),
            segment,
            kind,
            message,
            recommendations,
            incentive,
            generated_at: now,
            valid_until,
        })
    }
}
