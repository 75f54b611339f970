use thiserror::Error;

use super::{LoginFlow, SessionState};
use crate::api::ApiError;
use crate::host::IdentityError;
use crate::storage::StorageError;

/// Server code for a rejected identity code
pub const INVALID_IDENTITY_CODE: i64 = 40029;

/// What ultimately sank a login exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFailureKind {
    Network,
    InvalidIdentityCode,
    Other,
}

impl LoginFailureKind {
    pub fn classify(err: &ApiError) -> Self {
        match err {
            e if e.is_network() => LoginFailureKind::Network,
            ApiError::ServerStatus { code, .. } if *code == INVALID_IDENTITY_CODE => {
                LoginFailureKind::InvalidIdentityCode
            }
            _ => LoginFailureKind::Other,
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Identity code is empty")]
    EmptyIdentityCode,

    #[error("A {0} login is already in progress")]
    LoginInProgress(LoginFlow),

    #[error("Cannot {operation} while the session is {from}")]
    InvalidTransition {
        from: SessionState,
        operation: &'static str,
    },

    #[error("Login failed after {attempts} attempt(s): {source}")]
    LoginExhausted {
        attempts: u32,
        kind: LoginFailureKind,
        #[source]
        source: ApiError,
    },

    #[error("Malformed login response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("Failed to persist session: {0}")]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Text shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::EmptyIdentityCode => "Authorization code is missing".to_string(),
            SessionError::LoginInProgress(_) => "Logging in, please wait".to_string(),
            SessionError::InvalidTransition { .. } => self.to_string(),
            SessionError::LoginExhausted { kind, source, .. } => match kind {
                LoginFailureKind::Network => {
                    "Network connection failed, please check your network settings".to_string()
                }
                LoginFailureKind::InvalidIdentityCode => {
                    "The authorization code is invalid, please try again".to_string()
                }
                LoginFailureKind::Other => match source {
                    ApiError::ServerStatus { message, .. } | ApiError::ServerError { message } => {
                        message.clone()
                    }
                    _ => "Login service is temporarily unavailable".to_string(),
                },
            },
            SessionError::MalformedResponse(_) => "Unexpected login response".to_string(),
            SessionError::Identity(_) => "Failed to obtain authorization".to_string(),
            SessionError::Storage(_) => "Failed to save login state".to_string(),
        }
    }
}
