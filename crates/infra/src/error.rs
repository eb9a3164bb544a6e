use thiserror::Error;

use storeline_core::DomainError;
use storeline_insights::InsightsError;

use crate::store::StoreError;

/// Failure of the transactional sale write.
///
/// `Validation` is raised before anything is written; `Transaction` means
/// the atomic commit failed and nothing from it is visible.
#[derive(Debug, Error)]
pub enum SaleWriteError {
    #[error("invalid sale: {0}")]
    Validation(#[source] DomainError),

    #[error("sale transaction failed: {0}")]
    Transaction(#[source] StoreError),
}

impl From<DomainError> for SaleWriteError {
    fn from(err: DomainError) -> Self {
        SaleWriteError::Validation(err)
    }
}

impl From<StoreError> for SaleWriteError {
    fn from(err: StoreError) -> Self {
        SaleWriteError::Transaction(err)
    }
}

/// Error surfaced by the retail service facade.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(DomainError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("transaction failed: {0}")]
    Transaction(#[source] StoreError),

    #[error(transparent)]
    Insights(#[from] InsightsError),
}

impl ServiceError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ServiceError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound(_))
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound(what) => ServiceError::NotFound(what),
            other => ServiceError::Validation(other),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ServiceError::NotFound(what),
            other => ServiceError::Transaction(other),
        }
    }
}

impl From<SaleWriteError> for ServiceError {
    fn from(err: SaleWriteError) -> Self {
        match err {
            SaleWriteError::Validation(e) => ServiceError::Validation(e),
            // A missing product fails the sale transaction as a whole.
            SaleWriteError::Transaction(e) => ServiceError::Transaction(e),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
