//! Error taxonomy for portal operations.

use crate::portal::crypto::CryptoError;
use crate::portal::endpoints::ConfigurationError;
use crate::portal::envelope::ResultCode;
use crate::portal::json::JsonDecodeError;

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unexpected portal response: {0}")]
    Protocol(String),
    #[error("not logged in or the session has expired, please log in again")]
    SessionExpired,
    #[error("request to the portal timed out")]
    Timeout,
    #[error("request to the portal failed")]
    Transport(#[source] reqwest::Error),
    #[error("{0}")]
    Business(String),
    /// A well-formed response that simply carries no records.
    #[error("no content returned")]
    Empty,
    #[error("failed to decode response from {url} (status {status})")]
    Decode {
        status: u16,
        url: String,
        #[source]
        source: JsonDecodeError,
    },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<reqwest::Error> for PortalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err)
        }
    }
}

impl PortalError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// The envelope code this failure is reported under.
    pub fn code(&self) -> ResultCode {
        match self {
            Self::Configuration(_)
            | Self::Crypto(_)
            | Self::Protocol(_)
            | Self::Transport(_)
            | Self::Decode { .. } => ResultCode::ServiceFailure,
            Self::InvalidInput(_) => ResultCode::InvalidInput,
            Self::SessionExpired => ResultCode::SessionExpired,
            Self::Timeout => ResultCode::Timeout,
            Self::Business(_) => ResultCode::PortalRejected,
            Self::Empty => ResultCode::Empty,
            Self::Internal(_) => ResultCode::Unclassified,
        }
    }
}
