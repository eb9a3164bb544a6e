//! `storeline-insights`
//!
//! Customer intelligence derived from committed state:
//! - frequency and population segmentation
//! - favorite products/categories and recommendations
//! - promotion composition
//! - portfolio-level dashboard
//!
//! Everything here is a pure function of its inputs. Reading history and
//! persisting promotions is left to the infrastructure layer.

pub mod dashboard;
pub mod error;
pub mod insights;
pub mod preferences;
pub mod promotion;
pub mod recommendation;
pub mod segmentation;

pub use dashboard::{CustomerValue, PopulationCounts, PortfolioDashboard};
pub use error::InsightsError;
pub use insights::{CustomerInsights, PurchasePatterns};
pub use preferences::{CategoryStat, Preferences, ProductLookup, ProductStat};
pub use promotion::{
    DiscountSource, FixedDiscount, Incentive, PromotedProduct, Promotion, PromotionComposer,
    PromotionId, PromotionKind, RandomDiscounts, SeededDiscounts,
};
pub use recommendation::recommend;
pub use segmentation::{FrequencySegment, PopulationSegment, mean_gap_days};
