use serde::{Deserialize, Serialize};

use storeline_core::{DomainError, DomainResult};

/// Display name used when a sale arrives without one.
pub const UNKNOWN_SELLER_NAME: &str = "Unknown seller";

/// Seller identity as supplied by the calling layer (user id, badge code, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SellerId(String);

impl SellerId {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("seller id is required"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for SellerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seller {
    pub id: SellerId,
    pub name: String,
}

impl Seller {
    pub fn new(id: &str, name: Option<&str>) -> DomainResult<Self> {
        let id = SellerId::parse(id)?;
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_SELLER_NAME)
            .to_string();
        Ok(Self { id, name })
    }
}
