//! Uniform `{code, msg, data?}` result envelope returned by every public operation.

use serde::Serialize;

use crate::portal::errors::PortalError;

/// Numeric outcome codes understood by downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u16")]
pub enum ResultCode {
    Success,
    CaptchaRequired,
    WrongCredentials,
    Timeout,
    WrongCaptcha,
    Empty,
    SessionExpired,
    PortalRejected,
    Unclassified,
    ServiceFailure,
    InvalidInput,
}

impl ResultCode {
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::Success => 1000,
            Self::CaptchaRequired => 1001,
            Self::WrongCredentials => 1002,
            Self::Timeout => 1003,
            Self::WrongCaptcha => 1004,
            Self::Empty => 1005,
            Self::SessionExpired => 1006,
            Self::PortalRejected => 998,
            Self::Unclassified => 999,
            Self::ServiceFailure => 2333,
            Self::InvalidInput => 400,
        }
    }
}

impl From<ResultCode> for u16 {
    fn from(code: ResultCode) -> Self {
        code.as_u16()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub code: ResultCode,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(msg: impl Into<String>, data: T) -> Self {
        Self {
            code: ResultCode::Success,
            msg: msg.into(),
            data: Some(data),
        }
    }

    pub fn with_code(code: ResultCode, msg: impl Into<String>, data: Option<T>) -> Self {
        Self {
            code,
            msg: msg.into(),
            data,
        }
    }

    pub fn from_error(err: &PortalError) -> Self {
        Self {
            code: err.code(),
            msg: err.to_string(),
            data: None,
        }
    }

    /// Wrap an operation result, using `success_msg` when it succeeded.
    pub fn from_result(result: Result<T, PortalError>, success_msg: &str) -> Self {
        match result {
            Ok(data) => Self::success(success_msg, data),
            Err(err) => Self::from_error(&err),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == ResultCode::Success
    }
}
