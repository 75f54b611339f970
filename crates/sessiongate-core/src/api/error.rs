use thiserror::Error;

use super::transport::TransportFailure;
use crate::auth::SessionState;

/// Message a transport uses for a connection that never got a response.
pub const NETWORK_ERROR_SIGNATURE: &str = "Network Error";

/// Prefix a transport uses for HTTP status failures, followed by the code.
pub const STATUS_FAILURE_SIGNATURE: &str = "Request failed with status code";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Backend unreachable: {0}")]
    Connectivity(#[source] TransportFailure),

    #[error("Request timed out: {0}")]
    Timeout(#[source] TransportFailure),

    #[error("HTTP status {status}")]
    TransportStatus {
        status: u16,
        #[source]
        failure: TransportFailure,
    },

    #[error("Transport failure: {0}")]
    Transport(#[source] TransportFailure),

    #[error("Server returned code {code}: {message}")]
    ServerStatus { code: i64, message: String },

    #[error("Server error: {message}")]
    ServerError { message: String },

    #[error("Invalid session, or the session has expired. Please log in again.")]
    SessionExpired,

    #[error("Timed out waiting for login to complete")]
    DeferralTimeout,

    #[error("Not authenticated (session is {state})")]
    NotAuthenticated { state: SessionState },
}

impl ApiError {
    /// Classify a transport failure by its signature.
    pub fn from_transport(failure: TransportFailure) -> Self {
        let lower = failure.message.to_lowercase();
        if failure.message == NETWORK_ERROR_SIGNATURE {
            ApiError::Connectivity(failure)
        } else if lower.contains("timeout") || lower.contains("timed out") {
            ApiError::Timeout(failure)
        } else if let Some(status) = failure.status.or_else(|| status_from_message(&failure.message)) {
            ApiError::TransportStatus { status, failure }
        } else {
            ApiError::Transport(failure)
        }
    }

    /// Text shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Connectivity(_) => "Unable to reach the server".to_string(),
            ApiError::Timeout(_) => "The server request timed out".to_string(),
            ApiError::TransportStatus { status, .. } => {
                format!("The server request failed ({})", status)
            }
            ApiError::Transport(failure) => failure.message.clone(),
            ApiError::ServerStatus { message, .. } | ApiError::ServerError { message } => {
                message.clone()
            }
            ApiError::SessionExpired => self.to_string(),
            ApiError::DeferralTimeout => "Login is taking too long, please try again".to_string(),
            ApiError::NotAuthenticated { .. } => "Please log in first".to_string(),
        }
    }

    /// True for failures where no structured response ever arrived.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ApiError::Connectivity(_)
                | ApiError::Timeout(_)
                | ApiError::TransportStatus { .. }
                | ApiError::Transport(_)
        )
    }
}

/// Pull a trailing three-digit status out of a status failure message.
fn status_from_message(message: &str) -> Option<u16> {
    let rest = message.strip_prefix(STATUS_FAILURE_SIGNATURE)?;
    rest.trim().parse().ok()
}
