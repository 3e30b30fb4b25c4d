use derive_builder::UninitializedFieldError;
use hmac::digest::InvalidLength;
use reqwest::{Method, StatusCode};
use thiserror::Error;

use crate::types::ObjectId;

/// JSON-RPC error codes the node uses for conditions worth retrying.
const RETRYABLE_RPC_CODES: &[i64] = &[-32000, -32002, -32050, -32603];

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Base64Decode(#[from] base64::DecodeError),
    #[error(transparent)]
    Base58Decode(#[from] bs58::decode::Error),
    #[error(transparent)]
    Bcs(#[from] bcs::Error),
    #[error("request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
    #[error(transparent)]
    InvalidLength(#[from] InvalidLength),
    #[error("invalid mnemonic: {0}")]
    Mnemonic(#[from] bip39::Error),
    #[error("no key derived for account {0}")]
    UnknownAccount(u32),
    #[error("object {0} could not be fetched: {1}")]
    ObjectUnavailable(ObjectId, String),
    #[error("pagination did not terminate: {0}")]
    Pagination(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error("error({status_code}) making {method} call to {path} with {message}")]
    Status {
        status_code: StatusCode,
        method: Method,
        path: String,
        message: String,
    },
    #[error("{method} timed out after {elapsed_ms}ms")]
    Timeout { method: String, elapsed_ms: u128 },
    #[error("transaction {digest} failed on chain: {reason}")]
    TransactionFailed { digest: String, reason: String },
    #[error(transparent)]
    UninitializedField(#[from] UninitializedFieldError),
    #[error(transparent)]
    UrlParse(#[from] url::ParseError),
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Whether retrying the same request later can reasonably succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Timeout { .. } => true,
            Self::Status { status_code, .. } => {
                status_code.is_server_error() || *status_code == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Rpc { code, .. } => RETRYABLE_RPC_CODES.contains(code),
            _ => false,
        }
    }
}
