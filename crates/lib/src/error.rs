use serde::{Deserialize, Serialize};
use solana_client::client_error::ClientError;
use solana_sdk::{pubkey::ParsePubkeyError, signature::SignerError};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq, Serialize, Deserialize, Clone)]
pub enum ReclaimError {
    #[error("Account {0} not found")]
    AccountNotFound(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Signing error: {0}")]
    SigningError(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Simulation failed: {0}")]
    SimulationFailed(String),

    #[error("Transaction submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Emergency stop is active: {0}")]
    EmergencyStop(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),
}

impl From<ClientError> for ReclaimError {
    fn from(e: ClientError) -> Self {
        let error_string = e.to_string();
        if error_string.contains("AccountNotFound")
            || error_string.contains("could not find account")
        {
            ReclaimError::AccountNotFound(error_string)
        } else {
            ReclaimError::RpcError(error_string)
        }
    }
}

impl From<SignerError> for ReclaimError {
    fn from(e: SignerError) -> Self {
        ReclaimError::SigningError(e.to_string())
    }
}

impl From<ParsePubkeyError> for ReclaimError {
    fn from(e: ParsePubkeyError) -> Self {
        ReclaimError::ValidationError(e.to_string())
    }
}

impl From<bs58::decode::Error> for ReclaimError {
    fn from(e: bs58::decode::Error) -> Self {
        ReclaimError::SerializationError(e.to_string())
    }
}

impl From<serde_json::Error> for ReclaimError {
    fn from(e: serde_json::Error) -> Self {
        ReclaimError::SerializationError(e.to_string())
    }
}

impl From<std::io::Error> for ReclaimError {
    fn from(e: std::io::Error) -> Self {
        ReclaimError::InternalError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReclaimError::AccountNotFound("abc123".to_string());
        assert_eq!(err.to_string(), "Account abc123 not found");

        let err = ReclaimError::EmergencyStop("manual stop".to_string());
        assert_eq!(err.to_string(), "Emergency stop is active: manual stop");
    }

    #[test]
    fn test_pubkey_parse_error_conversion() {
        let parse_err = "not-a-pubkey".parse::<solana_sdk::pubkey::Pubkey>().unwrap_err();
        let err: ReclaimError = parse_err.into();
        assert!(matches!(err, ReclaimError::ValidationError(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ReclaimError = io_err.into();
        assert!(matches!(err, ReclaimError::InternalError(_)));
    }
}
