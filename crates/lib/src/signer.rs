use solana_sdk::signature::Keypair;

use crate::{config::OperatorConfig, constant::OPERATOR_PRIVATE_KEY_ENV, error::ReclaimError};

/// Load the operator keypair, preferring a configured JSON keypair file and
/// falling back to the OPERATOR_PRIVATE_KEY environment variable (base58).
///
/// A missing or unparsable key is a startup failure; the pipeline must not
/// come up with a partially-working signer.
pub fn load_operator_keypair(operator: &OperatorConfig) -> Result<Keypair, ReclaimError> {
    if let Some(path) = &operator.keypair_path {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ReclaimError::ConfigurationError(format!("Failed to read keypair file {path}: {e}"))
        })?;
        return from_json_keypair(&contents);
    }

    let encoded = std::env::var(OPERATOR_PRIVATE_KEY_ENV).map_err(|_| {
        ReclaimError::ConfigurationError(format!(
            "{OPERATOR_PRIVATE_KEY_ENV} is not set and no operator.keypair_path is configured"
        ))
    })?;

    from_base58(encoded.trim())
}

fn from_base58(encoded: &str) -> Result<Keypair, ReclaimError> {
    let bytes = bs58::decode(encoded).into_vec().map_err(|_| {
        ReclaimError::ConfigurationError(
            "Operator key must be a base58-encoded secret key".to_string(),
        )
    })?;

    Keypair::try_from(&bytes[..]).map_err(|e| {
        ReclaimError::ConfigurationError(format!("Operator key is not a valid keypair: {e}"))
    })
}

fn from_json_keypair(json_content: &str) -> Result<Keypair, ReclaimError> {
    let byte_array: Vec<u8> = serde_json::from_str(json_content).map_err(|e| {
        ReclaimError::ConfigurationError(format!("Keypair file is not a JSON byte array: {e}"))
    })?;

    Keypair::try_from(&byte_array[..]).map_err(|e| {
        ReclaimError::ConfigurationError(format!("Keypair file is not a valid keypair: {e}"))
    })
}
