use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid transaction hash: {0}")]
    InvalidHash(String),
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),
    #[error("invalid log payload: {0}")]
    InvalidLog(String),
    #[error("value does not fit the target type: {0}")]
    ValueOutOfRange(String),
}
