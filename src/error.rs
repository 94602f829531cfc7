use crate::config::ConfigError;
use crate::domain::OrderId;
use crate::engine::WindowError;
use crate::store::StoreError;
use thiserror::Error;

/// Error returned by direct (non-batch) settlement calls.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// User-correctable rejection, reported back to the requester.
    #[error(transparent)]
    Validation(#[from] WindowError),
    #[error("Rejected: {0}")]
    Rejected(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Earning already recorded for order {0}")]
    AlreadyRecorded(OrderId),
    /// Store write or read failed; the record keeps its prior state.
    #[error("Transaction failed: {0}")]
    Transaction(StoreError),
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl SettlementError {
    /// True for errors the caller can fix by changing the request.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            SettlementError::Validation(_) | SettlementError::Rejected(_)
        )
    }
}

impl From<StoreError> for SettlementError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => {
                SettlementError::NotFound(format!("{} {}", entity, id))
            }
            other => SettlementError::Transaction(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_not_found() {
        let err: SettlementError = StoreError::not_found("order", "o-9").into();
        match err {
            SettlementError::NotFound(msg) => assert_eq!(msg, "order o-9"),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_store_failure_maps_to_transaction() {
        let err: SettlementError = StoreError::Unavailable("disk full".to_string()).into();
        assert!(matches!(err, SettlementError::Transaction(_)));
        assert!(!err.is_user_error());
    }

    #[test]
    fn test_config_error_display() {
        let err: SettlementError = ConfigError::MissingEnv("DATABASE_PATH".to_string()).into();
        assert!(!err.is_user_error());
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required environment variable: DATABASE_PATH"
        );
    }

    #[test]
    fn test_window_rejection_is_user_error() {
        let err: SettlementError = WindowError::InvalidDay.into();
        assert!(err.is_user_error());
        assert_eq!(
            err.to_string(),
            "Pickups can only be scheduled on a Saturday or Sunday"
        );
    }
}
