//! Per-aggregate repositories over the row store
//!
//! Thin find/create/update accessors in the shape the rest of the core
//! expects. Mutating accessors assume the caller holds the corresponding
//! row lock; they never check domain state themselves.

mod claim;
mod courier;
mod delivery;
mod point;
mod product;
mod reservation;
mod user;

pub use claim::ClaimRepository;
pub use courier::CourierRepository;
pub use delivery::DeliveryRepository;
pub use point::PointRepository;
pub use product::ProductRepository;
pub use reservation::ReservationRepository;
pub use user::UserRepository;

use crate::core::error::CoreError;
use thiserror::Error;

/// Repository errors
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("duplicate display code: {0}")]
    DuplicateCode(String),
}

impl RepoError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        RepoError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<RepoError> for CoreError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound { kind, id } => CoreError::NotFound { kind, id },
            RepoError::DuplicateCode(code) => {
                CoreError::Domain(format!("이미 사용 중인 주문 코드입니다: {code}"))
            }
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;
